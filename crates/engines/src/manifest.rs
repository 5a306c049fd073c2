//! Plugin manifest parsing and validation.
//!
//! The path-validation rules run at load time even though engines are
//! executed in-process today, so a later subprocess host inherits launch
//! arguments that cannot smuggle shell syntax.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::sdk::{sdk_compatible, EngineKind};

/// Manifest file name inside a plugin directory
pub const MANIFEST_FILE: &str = "engine.json";

/// Characters never allowed in a binary path
pub const FORBIDDEN_PATH_CHARS: &[char] = &[
    ';', '&', '|', '$', '`', '(', ')', '{', '}', '<', '>', '!', '\'', '"', '\n',
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub version: String,
    pub kind: String,
    pub min_sdk_version: String,
    #[serde(default)]
    pub binary_path: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub config_defaults: Value,
}

impl Manifest {
    /// Load and validate `engine.json` from a plugin directory
    pub fn load(directory: &Path) -> EngineResult<Manifest> {
        let path = directory.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path)?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .map_err(|e| EngineError::InvalidManifest(format!("{}: {}", path.display(), e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check required fields, kind, version syntax and SDK compatibility
    pub fn validate(&self) -> EngineResult<()> {
        for (field, value) in [
            ("id", &self.id),
            ("name", &self.name),
            ("version", &self.version),
            ("kind", &self.kind),
            ("min_sdk_version", &self.min_sdk_version),
        ] {
            if value.trim().is_empty() {
                return Err(EngineError::InvalidManifest(format!(
                    "missing required field: {}",
                    field
                )));
            }
        }

        self.engine_kind()?;

        semver::Version::parse(&self.version)
            .map_err(|e| EngineError::InvalidManifest(format!("bad version: {}", e)))?;
        sdk_compatible(&self.min_sdk_version)?;
        Ok(())
    }

    pub fn engine_kind(&self) -> EngineResult<EngineKind> {
        self.kind.parse()
    }

    /// Resolve the declared binary, if any: join relative paths to the
    /// manifest directory, reject forbidden characters, canonicalize (which
    /// resolves symlinks) and verify the checksum when one is declared.
    pub fn resolve_binary(&self, directory: &Path) -> EngineResult<Option<PathBuf>> {
        let Some(declared) = &self.binary_path else {
            return Ok(None);
        };

        let joined = if Path::new(declared).is_absolute() {
            PathBuf::from(declared)
        } else {
            directory.join(declared)
        };

        let as_str = joined.to_string_lossy();
        if let Some(bad) = as_str.chars().find(|c| FORBIDDEN_PATH_CHARS.contains(c)) {
            return Err(EngineError::ForbiddenPathCharacter(bad));
        }

        let canonical = joined.canonicalize()?;

        if let Some(declared_checksum) = &self.checksum {
            verify_checksum(&canonical, declared_checksum)?;
        }
        Ok(Some(canonical))
    }
}

/// Compare the file's SHA-256 against the declared digest,
/// case-insensitively and with or without an `sha256:` prefix
fn verify_checksum(path: &Path, declared: &str) -> EngineResult<()> {
    let expected = declared
        .strip_prefix("sha256:")
        .or_else(|| declared.strip_prefix("SHA256:"))
        .unwrap_or(declared);

    let contents = std::fs::read(path)?;
    let actual = hex::encode(Sha256::digest(&contents));

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(EngineError::ChecksumMismatch {
            path: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn manifest_json(extra: &str) -> String {
        format!(
            r#"{{
                "id": "acme.priority-eisenhower",
                "name": "Eisenhower Priority",
                "version": "0.3.1",
                "kind": "priority",
                "min_sdk_version": "1.0.0"{}
            }}"#,
            extra
        )
    }

    fn write_manifest(dir: &Path, json: &str) {
        fs::write(dir.join(MANIFEST_FILE), json).unwrap();
    }

    #[test]
    fn test_load_valid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), &manifest_json(""));
        let manifest = Manifest::load(dir.path()).unwrap();
        assert_eq!(manifest.id, "acme.priority-eisenhower");
        assert_eq!(manifest.engine_kind().unwrap(), EngineKind::Priority);
    }

    #[test]
    fn test_missing_required_field() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"id": "", "name": "X", "version": "1.0.0", "kind": "priority", "min_sdk_version": "1.0.0"}"#,
        );
        let result = Manifest::load(dir.path());
        assert!(matches!(result, Err(EngineError::InvalidManifest(_))));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"id": "x", "name": "X", "version": "1.0.0", "kind": "optimizer", "min_sdk_version": "1.0.0"}"#,
        );
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(EngineError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_incompatible_sdk_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"id": "x", "name": "X", "version": "1.0.0", "kind": "priority", "min_sdk_version": "2.0.0"}"#,
        );
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(EngineError::IncompatibleSdk { .. })
        ));
    }

    #[test]
    fn test_forbidden_path_character() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            &manifest_json(r#", "binary_path": "/bin/engine; rm -rf /""#),
        );
        let manifest = Manifest::load(dir.path()).unwrap();
        let result = manifest.resolve_binary(dir.path());
        assert!(matches!(
            result,
            Err(EngineError::ForbiddenPathCharacter(';'))
        ));
    }

    #[test]
    fn test_relative_binary_resolves_against_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("engine-bin"), b"#!/bin/sh\n").unwrap();
        write_manifest(dir.path(), &manifest_json(r#", "binary_path": "engine-bin""#));

        let manifest = Manifest::load(dir.path()).unwrap();
        let resolved = manifest.resolve_binary(dir.path()).unwrap().unwrap();
        assert!(resolved.ends_with("engine-bin"));
        assert!(resolved.is_absolute());
    }

    #[test]
    fn test_checksum_match_and_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"engine payload";
        fs::write(dir.path().join("engine-bin"), body).unwrap();
        let digest = hex::encode(Sha256::digest(body));

        // Uppercase digest with prefix still matches
        write_manifest(
            dir.path(),
            &manifest_json(&format!(
                r#", "binary_path": "engine-bin", "checksum": "sha256:{}""#,
                digest.to_uppercase()
            )),
        );
        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.resolve_binary(dir.path()).is_ok());

        write_manifest(
            dir.path(),
            &manifest_json(
                r#", "binary_path": "engine-bin", "checksum": "sha256:deadbeef""#,
            ),
        );
        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(matches!(
            manifest.resolve_binary(dir.path()),
            Err(EngineError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_binary_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), &manifest_json(r#", "binary_path": "missing""#));
        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(matches!(
            manifest.resolve_binary(dir.path()),
            Err(EngineError::Io(_))
        ));
    }
}
