use std::path::Path;

/// Renders `path` relative to the current working directory.
///
/// Relative paths are returned unchanged; absolute paths that cannot be
/// related to the working directory are returned as-is.
pub fn relative_to_cwd(path: &Path) -> String {
    if path.is_relative() {
        return normalize_path_separator(&path.to_string_lossy());
    }
    let relative = std::env::current_dir()
        .ok()
        .and_then(|cwd| pathdiff::diff_paths(path, cwd));
    match relative {
        Some(rel) => normalize_path_separator(&rel.to_string_lossy()),
        None => normalize_path_separator(&path.to_string_lossy()),
    }
}

// Helper function for cross-platform path comparison
pub fn normalize_path_separator(s: &str) -> String {
    s.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_relative_path_when_relativizing_then_unchanged() {
        assert_eq!(relative_to_cwd(Path::new("src/lib.rs")), "src/lib.rs");
    }

    #[test]
    fn given_absolute_path_below_cwd_when_relativizing_then_strips_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let file = cwd.join("src").join("lib.rs");
        assert_eq!(relative_to_cwd(&file), "src/lib.rs");
    }
}
