use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static BASE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory relative paths are resolved against (the working directory).
pub fn get_base_dir() -> &'static PathBuf {
    BASE_DIR.get_or_init(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Returns the logs directory: `<base_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_base_dir().join("logs")
}

/// Returns the per-user tessdata download directory.
pub fn get_tessdata_download_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gym-occupancy-ocr")
        .join("tessdata")
}

/// Expands a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

/// Expands `~/` and resolves relative paths against the base directory.
pub fn resolve(path: &str) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        get_base_dir().join(expanded)
    }
}

/// Returns true if the file name carries one of the given extensions (case-insensitive).
pub fn has_extension(name: &str, extensions: &[String]) -> bool {
    let lower = name.to_lowercase();
    extensions
        .iter()
        .any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Returns the file name component as a UTF-8 string, if any.
pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("screenshots/inbox"), PathBuf::from("screenshots/inbox"));
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_expand_home_with_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/My_Gym"), home.join("My_Gym"));
        }
    }

    #[test]
    fn test_has_extension_case_insensitive() {
        let exts = vec![".png".to_string(), ".jpg".to_string()];
        assert!(has_extension("FP24_20250815_222321.PNG", &exts));
        assert!(has_extension("a.jpg", &exts));
        assert!(!has_extension("notes.txt", &exts));
        assert!(!has_extension("png", &exts));
    }
}
