//! Filesystem discovery of plugin engines

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use crate::manifest::{Manifest, MANIFEST_FILE};

/// Environment variable overriding the search paths
/// (colon-separated list)
pub const PLUGIN_PATH_ENV: &str = "ORBITA_PLUGIN_PATH";

/// System-wide plugin directory
pub const SYSTEM_PLUGIN_DIR: &str = "/usr/local/share/orbita/plugins";

/// A manifest found on disk, with the directory it lives in
#[derive(Debug, Clone)]
pub struct DiscoveredEngine {
    pub manifest: Manifest,
    pub directory: PathBuf,
}

/// Everything one discovery pass produced
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    pub engines: Vec<DiscoveredEngine>,
    pub errors: Vec<String>,
}

/// The configured search paths: env override first, then the user and
/// system directories
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(override_paths) = std::env::var(PLUGIN_PATH_ENV) {
        paths.extend(
            override_paths
                .split(':')
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".orbita").join("plugins"));
    }
    paths.push(PathBuf::from(SYSTEM_PLUGIN_DIR));
    paths
}

/// Discover plugins across the configured search paths
pub fn discover() -> DiscoveryResult {
    discover_in(&search_paths())
}

/// Walk each path's immediate subdirectories and load their manifests.
///
/// Missing directories are skipped silently. Duplicate engine ids keep the
/// first manifest found; later ones surface as errors. Parse and
/// validation failures are collected, never fatal.
pub fn discover_in(paths: &[PathBuf]) -> DiscoveryResult {
    let mut result = DiscoveryResult::default();
    let mut seen: HashSet<String> = HashSet::new();

    for path in paths {
        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            let directory = entry.path();
            if !directory.is_dir() || !directory.join(MANIFEST_FILE).is_file() {
                continue;
            }

            match Manifest::load(&directory) {
                Ok(manifest) => {
                    if seen.contains(&manifest.id) {
                        result.errors.push(format!(
                            "duplicate engine id {} at {}",
                            manifest.id,
                            directory.display()
                        ));
                        continue;
                    }
                    debug!(id = %manifest.id, dir = %directory.display(), "discovered engine");
                    seen.insert(manifest.id.clone());
                    result.engines.push(DiscoveredEngine {
                        manifest,
                        directory,
                    });
                }
                Err(e) => result
                    .errors
                    .push(format!("{}: {}", directory.display(), e)),
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_plugin(root: &Path, dir_name: &str, id: &str) {
        let dir = root.join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            format!(
                r#"{{"id": "{}", "name": "{}", "version": "1.0.0", "kind": "classifier", "min_sdk_version": "1.0.0"}}"#,
                id, id
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_discover_finds_plugins() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "alpha", "acme.alpha");
        write_plugin(root.path(), "beta", "acme.beta");
        // Directory without a manifest is ignored
        fs::create_dir_all(root.path().join("not-a-plugin")).unwrap();

        let result = discover_in(&[root.path().to_path_buf()]);
        assert_eq!(result.engines.len(), 2);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_duplicate_id_first_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_plugin(first.path(), "alpha", "acme.alpha");
        write_plugin(second.path(), "alpha-copy", "acme.alpha");

        let result = discover_in(&[first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(result.engines.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("duplicate engine id"));
    }

    #[test]
    fn test_missing_directory_is_silent() {
        let result = discover_in(&[PathBuf::from("/nonexistent/orbita/plugins")]);
        assert!(result.engines.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_broken_manifest_collected_as_error() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), "{ not json").unwrap();
        write_plugin(root.path(), "ok", "acme.ok");

        let result = discover_in(&[root.path().to_path_buf()]);
        assert_eq!(result.engines.len(), 1);
        assert_eq!(result.errors.len(), 1);
    }
}
