use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

/// Whether variable names compare case-insensitively on this platform.
pub const CASE_INSENSITIVE_NAMES: bool = cfg!(windows);

/// Merge overrides on top of an inherited environment. Overrides win on collision.
pub fn merge_environment<I>(
    inherited: I,
    overrides: &BTreeMap<String, String>,
    case_insensitive: bool,
) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let same_name = |a: &OsStr, b: &OsStr| {
        if case_insensitive {
            a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy())
        } else {
            a == b
        }
    };

    let mut merged: Vec<(OsString, OsString)> = inherited
        .into_iter()
        .filter(|(name, _)| !overrides.keys().any(|k| same_name(name.as_os_str(), OsStr::new(k))))
        .collect();

    merged.extend(
        overrides
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v))),
    );
    merged
}

/// Look up a variable in a merged environment table
pub fn lookup<'a>(
    environment: &'a [(OsString, OsString)],
    name: &str,
    case_insensitive: bool,
) -> Option<&'a OsStr> {
    environment
        .iter()
        .find(|(k, _)| {
            if case_insensitive {
                k.to_string_lossy().eq_ignore_ascii_case(name)
            } else {
                k == name
            }
        })
        .map(|(_, v)| v.as_os_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inherited() -> Vec<(OsString, OsString)> {
        vec![
            (OsString::from("PATH"), OsString::from("/usr/bin")),
            (OsString::from("Home"), OsString::from("/home/build")),
        ]
    }

    fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_merge_without_overrides_keeps_inherited() {
        let merged = merge_environment(inherited(), &BTreeMap::new(), false);
        assert_eq!(merged, inherited());
    }

    #[test]
    fn test_merge_override_wins() {
        let merged = merge_environment(inherited(), &overrides(&[("PATH", "/opt/bin")]), false);
        assert_eq!(lookup(&merged, "PATH", false), Some(OsStr::new("/opt/bin")));
        assert_eq!(merged.iter().filter(|(k, _)| k == "PATH").count(), 1);
    }

    #[test]
    fn test_merge_adds_new_variable() {
        let merged = merge_environment(inherited(), &overrides(&[("CONFIGURATION", "Release")]), false);
        assert_eq!(merged.len(), 3);
        assert_eq!(lookup(&merged, "CONFIGURATION", false), Some(OsStr::new("Release")));
    }

    #[test]
    fn test_merge_case_insensitive_replaces_differently_cased_name() {
        let merged = merge_environment(inherited(), &overrides(&[("HOME", "/srv")]), true);
        assert_eq!(merged.len(), 2);
        assert_eq!(lookup(&merged, "home", true), Some(OsStr::new("/srv")));
    }

    #[test]
    fn test_merge_case_sensitive_keeps_both_names() {
        let merged = merge_environment(inherited(), &overrides(&[("HOME", "/srv")]), false);
        assert_eq!(merged.len(), 3);
        assert_eq!(lookup(&merged, "Home", false), Some(OsStr::new("/home/build")));
        assert_eq!(lookup(&merged, "HOME", false), Some(OsStr::new("/srv")));
    }

    #[test]
    fn test_lookup_missing() {
        assert_eq!(lookup(&inherited(), "MISSING", true), None);
    }
}
