//! Discovery of native SQLite extension libraries on disk.

use std::path::{Path, PathBuf};

use tracing::debug;

/// A loadable extension library found in the extensions directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredExtension {
    /// File stem, used as the extension name in the API.
    pub name: String,
    pub path: PathBuf,
}

/// Platform suffix for native libraries.
pub fn native_library_suffix() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// List extension libraries under `dir`, sorted by name. A missing directory
/// yields an empty list rather than an error; extensions are optional.
pub fn discover_extensions(dir: &Path) -> Vec<DiscoveredExtension> {
    let suffix = native_library_suffix();
    let mut found = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            debug!(dir = %dir.display(), "Extensions directory not readable, skipping discovery");
            return found;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches_suffix = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(suffix))
            .unwrap_or(false);
        if !matches_suffix {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            found.push(DiscoveredExtension {
                name: stem.to_string(),
                path: path.clone(),
            });
        }
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_is_known_value() {
        assert!(matches!(native_library_suffix(), "so" | "dylib" | "dll"));
    }

    #[test]
    fn test_missing_directory_yields_empty() {
        let found = discover_extensions(Path::new("/nonexistent/extensions"));
        assert!(found.is_empty());
    }

    #[test]
    fn test_discovers_only_native_libraries() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let suffix = native_library_suffix();
        std::fs::write(dir.path().join(format!("crypto.{suffix}")), b"")?;
        std::fs::write(dir.path().join(format!("stats.{suffix}")), b"")?;
        std::fs::write(dir.path().join("readme.txt"), b"")?;

        let found = discover_extensions(dir.path());
        let names: Vec<&str> = found.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["crypto", "stats"]);
        Ok(())
    }
}
