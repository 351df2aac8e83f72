//! Path helpers

use std::path::{Component, Path, PathBuf};

/// Render a relative path with `/` separators regardless of platform.
pub fn normalize_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Sibling of `root` whose name is the root's name plus `suffix`.
///
/// `src` becomes `src_fixed`; a trailing separator or `.` is resolved first so
/// the sibling never lands inside the input tree.
pub fn sibling_with_suffix(root: &Path, suffix: &str) -> PathBuf {
    let resolved = if root.file_name().is_some() {
        root.to_path_buf()
    } else {
        std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
    };
    let name = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    resolved.with_file_name(format!("{name}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_components() {
        assert_eq!(normalize_path(Path::new("./src/lib.rs")), "src/lib.rs");
        assert_eq!(normalize_path(Path::new("a/b/c.txt")), "a/b/c.txt");
    }

    #[test]
    fn sibling_gets_suffix() {
        assert_eq!(
            sibling_with_suffix(Path::new("/work/app"), "_fixed"),
            PathBuf::from("/work/app_fixed")
        );
        assert_eq!(
            sibling_with_suffix(Path::new("/work/app/"), "_rewritten"),
            PathBuf::from("/work/app_rewritten")
        );
    }
}
