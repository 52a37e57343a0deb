//! Naming helpers: unique object names and composite puppet-member keys.

/// Separator for composite keys addressing puppet members on a stage.
pub const MEMBER_KEY_SEP: char = ':';

/// Canonical composite key for a puppet member, e.g. `"manu:main_droite"`.
pub fn member_key(puppet: &str, member: &str) -> String {
    format!("{puppet}{MEMBER_KEY_SEP}{member}")
}

/// Split a composite key on the first separator. Returns `None` when the
/// separator is absent.
pub fn split_member_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(MEMBER_KEY_SEP)
}

/// Return `base` if free in `existing`, otherwise `base_1`, `base_2`, ...
pub fn unique_name<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: std::collections::BTreeSet<&str> = existing.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut i = 1usize;
    loop {
        let candidate = format!("{base}_{i}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_key_roundtrip() {
        let key = member_key("manu", "main_droite");
        assert_eq!(key, "manu:main_droite");
        assert_eq!(split_member_key(&key), Some(("manu", "main_droite")));
        assert_eq!(split_member_key("no-separator"), None);
    }

    #[test]
    fn split_is_lenient_on_extra_separators() {
        assert_eq!(split_member_key("a:b:c"), Some(("a", "b:c")));
    }

    #[test]
    fn unique_name_picks_first_free_suffix() {
        assert_eq!(unique_name("rock", [].into_iter()), "rock");
        assert_eq!(unique_name("rock", ["rock"].into_iter()), "rock_1");
        assert_eq!(
            unique_name("rock", ["rock", "rock_1", "rock_2"].into_iter()),
            "rock_3"
        );
    }
}
