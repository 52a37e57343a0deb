use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pantin", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a scene document and report every violation.
    Validate(ValidateArgs),
    /// Print a summary of a scene document.
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Info(args) => cmd_info(args),
    }
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read '{}'", args.in_path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parse '{}'", args.in_path.display()))?;

    match pantin::doc::validate_document(&value) {
        Ok(()) => {
            eprintln!("{}: ok", args.in_path.display());
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("{}: {error}", args.in_path.display());
            }
            anyhow::bail!("{} validation error(s)", errors.len());
        }
    }
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let doc = pantin::doc::read_document(&args.in_path)?;

    let settings = &doc.settings;
    println!(
        "frames {}..{} @ {} fps, canvas {}x{}",
        settings.start_frame,
        settings.end_frame,
        settings.fps,
        settings.scene_width,
        settings.scene_height
    );
    if let Some(bg) = &settings.background_path {
        println!("background {bg}");
    }
    println!("objects: {}", doc.objects.len());
    for (name, state) in &doc.objects {
        let attachment = state
            .attached_to
            .as_ref()
            .map(|a| format!(" -> {}:{}", a.puppet, a.member))
            .unwrap_or_default();
        println!("  {name} at ({}, {}){attachment}", state.x, state.y);
    }
    println!("puppets: {}", doc.puppets_data.len());
    for (name, record) in &doc.puppets_data {
        println!(
            "  {name} scale {} z-offset {}{}",
            record.scale,
            record.z_offset,
            record
                .path
                .as_ref()
                .map(|p| format!(" ({p})"))
                .unwrap_or_default()
        );
    }
    let indices: Vec<String> = doc.keyframes.iter().map(|kf| kf.index.to_string()).collect();
    println!("keyframes: {} [{}]", doc.keyframes.len(), indices.join(", "));
    Ok(())
}
