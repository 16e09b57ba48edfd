use std::path::PathBuf;

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a tilde are returned unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_plain_paths_alone() {
        assert_eq!(expand_tilde("/var/lib/plank"), PathBuf::from("/var/lib/plank"));
    }

    #[test]
    fn expands_home_prefix() {
        let expanded = expand_tilde("~/plank/db.sqlite");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("plank/db.sqlite"));
    }
}
