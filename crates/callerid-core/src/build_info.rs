//! # Build snapshot
//!
//! The process's record of its own crate and its dependencies' versions.
//!
//! Rust binaries carry no dependency list by default. Executables built with
//! [`cargo auditable`](https://github.com/rust-secure-code/cargo-auditable)
//! embed one: a zlib-compressed JSON manifest in a `.dep-v0` section:
//!
//! ```json
//! {"packages": [
//!     {"name": "my-app", "version": "0.3.1", "source": "local", "root": true},
//!     {"name": "serde_json", "version": "1.0.120", "source": "crates.io"},
//!     {"name": "cc", "version": "1.0.83", "source": "crates.io", "kind": "build"}
//! ]}
//! ```
//!
//! The root package becomes the main module, the remaining runtime packages
//! the dependency list (build-only packages never appear in stack traces).
//! Crate names are converted to the spelling used in symbol paths
//! (`my-app` -> `my_app`).
//!
//! The process snapshot is loaded at most once. Binaries built without
//! `cargo auditable` (including test harnesses) have no manifest; the
//! snapshot is then absent and attribution falls back to path heuristics.
//! That is logged at `debug` and never reported to callers.

use std::borrow::Cow;
use std::io::Read;
use std::sync::Arc;
use std::{env, fs, io};

use flate2::read::ZlibDecoder;
use object::{Object, ObjectSection};
use once_cell::sync::Lazy;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::types::ModuleIdentity;

/// Section the manifest is stored under, in every object format.
const MANIFEST_SECTIONS: &[&str] = &[".dep-v0"];

/// Decompressed manifests larger than this are rejected.
pub const MAX_MANIFEST_SIZE: usize = 8 * 1024 * 1024;

static PROCESS_BUILD: Lazy<Option<Arc<BuildSnapshot>>> = Lazy::new(|| BuildSnapshot::load().map(Arc::new));

/// Build snapshot of the running process, loaded on first use.
pub fn process_build() -> Option<Arc<BuildSnapshot>>
{
    PROCESS_BUILD.clone()
}

/// Why a build snapshot could not be loaded.
#[derive(Error, Debug)]
pub enum BuildInfoError
{
    /// The executable could not be located or read
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The executable is not an object file `object` understands
    #[error("Failed to parse executable: {0}")]
    Object(#[from] object::Error),

    /// The binary has no embedded dependency manifest
    #[error("No embedded dependency manifest (binary not built with `cargo auditable`)")]
    MissingManifest,

    /// The manifest section is not a valid zlib stream
    #[error("Corrupt dependency manifest: {0}")]
    Decompress(#[source] io::Error),

    /// The decompressed manifest exceeds [`MAX_MANIFEST_SIZE`]
    #[error("Dependency manifest larger than {limit} bytes")]
    TooLarge
    {
        /// Size limit that was exceeded
        limit: usize,
    },

    /// The manifest is not the expected JSON document
    #[error("Invalid dependency manifest: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct Manifest
{
    packages: Vec<ManifestPackage>,
}

#[derive(Debug, Deserialize)]
struct ManifestPackage
{
    name: String,
    version: String,
    #[serde(default)]
    kind: PackageKind,
    #[serde(default)]
    root: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PackageKind
{
    #[default]
    Runtime,
    Build,
}

impl ManifestPackage
{
    fn identity(&self) -> ModuleIdentity
    {
        ModuleIdentity::new(self.name.replace('-', "_"), self.version.clone())
    }
}

/// Main module identity plus the ordered dependency list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSnapshot
{
    main: ModuleIdentity,
    dependencies: Vec<ModuleIdentity>,
}

impl BuildSnapshot
{
    /// Snapshot from a main module and dependencies in manifest order.
    pub fn new(main: ModuleIdentity, dependencies: Vec<ModuleIdentity>) -> Self
    {
        Self { main, dependencies }
    }

    /// The executable's own crate.
    pub fn main_module(&self) -> &ModuleIdentity
    {
        &self.main
    }

    /// Dependencies in manifest order.
    pub fn dependencies(&self) -> &[ModuleIdentity]
    {
        &self.dependencies
    }

    /// Snapshot of the running executable, or `None` if it carries no usable
    /// manifest.
    pub fn load() -> Option<Self>
    {
        match Self::from_current_exe() {
            Ok(snapshot) => {
                debug!(
                    main = %snapshot.main,
                    dependencies = snapshot.dependencies.len(),
                    "loaded build snapshot"
                );
                Some(snapshot)
            }
            Err(err) => {
                debug!("build snapshot unavailable, attributing by path: {err}");
                None
            }
        }
    }

    /// Read the manifest embedded in the running executable.
    ///
    /// ## Errors
    ///
    /// Any [`BuildInfoError`]; most commonly
    /// [`MissingManifest`](BuildInfoError::MissingManifest).
    pub fn from_current_exe() -> Result<Self, BuildInfoError>
    {
        let path = env::current_exe()?;
        let bytes = fs::read(&path)?;
        Self::from_binary(&bytes)
    }

    /// Read the manifest embedded in an executable image.
    ///
    /// ## Errors
    ///
    /// [`Object`](BuildInfoError::Object) if `bytes` is not an object file,
    /// [`MissingManifest`](BuildInfoError::MissingManifest) if it has no
    /// manifest section, otherwise as [`from_section_data`](Self::from_section_data).
    pub fn from_binary(bytes: &[u8]) -> Result<Self, BuildInfoError>
    {
        let file = object::File::parse(bytes)?;
        let section = file
            .sections()
            .find(|section| section.name().is_ok_and(|name| MANIFEST_SECTIONS.contains(&name)))
            .ok_or(BuildInfoError::MissingManifest)?;

        let data: Cow<'_, [u8]> = section.uncompressed_data()?;
        Self::from_section_data(&data)
    }

    /// Decode the zlib-compressed manifest stored in the section.
    ///
    /// ## Errors
    ///
    /// [`Decompress`](BuildInfoError::Decompress),
    /// [`TooLarge`](BuildInfoError::TooLarge) or
    /// [`Json`](BuildInfoError::Json).
    pub fn from_section_data(compressed: &[u8]) -> Result<Self, BuildInfoError>
    {
        let mut json = Vec::new();
        ZlibDecoder::new(compressed)
            .take(MAX_MANIFEST_SIZE as u64 + 1)
            .read_to_end(&mut json)
            .map_err(BuildInfoError::Decompress)?;
        if json.len() > MAX_MANIFEST_SIZE {
            return Err(BuildInfoError::TooLarge {
                limit: MAX_MANIFEST_SIZE,
            });
        }
        Self::from_manifest_json(&json)
    }

    /// Build a snapshot from the manifest JSON.
    ///
    /// ## Errors
    ///
    /// [`Json`](BuildInfoError::Json) if the document does not parse.
    pub fn from_manifest_json(json: &[u8]) -> Result<Self, BuildInfoError>
    {
        let manifest: Manifest = serde_json::from_slice(json)?;

        let main = manifest
            .packages
            .iter()
            .find(|package| package.root)
            .map(ManifestPackage::identity)
            .unwrap_or_default();
        let dependencies = manifest
            .packages
            .iter()
            .filter(|package| !package.root && package.kind == PackageKind::Runtime)
            .map(ManifestPackage::identity)
            .collect();

        Ok(Self { main, dependencies })
    }
}

#[cfg(test)]
mod tests
{
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    use super::*;

    const MANIFEST: &str = r#"{
        "format": 1,
        "packages": [
            {"name": "cc", "version": "1.0.83", "source": "crates.io", "kind": "build"},
            {"name": "my-app", "version": "0.3.1", "source": "local", "root": true, "dependencies": [2, 3]},
            {"name": "serde", "version": "1.0.200", "source": "crates.io"},
            {"name": "serde_json", "version": "1.0.120", "source": "crates.io", "dependencies": [2]},
            {"name": "tokio-util", "version": "0.7.11", "source": "crates.io", "kind": "runtime"}
        ]
    }"#;

    fn compress(bytes: &[u8]) -> Vec<u8>
    {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn manifest_splits_root_and_runtime_dependencies()
    {
        let snapshot = BuildSnapshot::from_manifest_json(MANIFEST.as_bytes()).unwrap();

        assert_eq!(snapshot.main_module(), &ModuleIdentity::new("my_app", "0.3.1"));
        assert_eq!(
            snapshot.dependencies(),
            &[
                ModuleIdentity::new("serde", "1.0.200"),
                ModuleIdentity::new("serde_json", "1.0.120"),
                ModuleIdentity::new("tokio_util", "0.7.11"),
            ]
        );
    }

    #[test]
    fn manifest_without_root_has_unknown_main()
    {
        let json = r#"{"packages": [{"name": "serde", "version": "1.0.200"}]}"#;
        let snapshot = BuildSnapshot::from_manifest_json(json.as_bytes()).unwrap();
        assert!(snapshot.main_module().is_unknown());
        assert_eq!(snapshot.dependencies().len(), 1);
    }

    #[test]
    fn compressed_section_round_trips()
    {
        let section = compress(MANIFEST.as_bytes());
        let snapshot = BuildSnapshot::from_section_data(&section).unwrap();
        assert_eq!(snapshot.main_module().path, "my_app");
        assert_eq!(snapshot.dependencies().len(), 3);
    }

    #[test]
    fn corrupt_section_is_decompress_error()
    {
        let err = BuildSnapshot::from_section_data(b"definitely not zlib").unwrap_err();
        assert!(matches!(err, BuildInfoError::Decompress(_)), "{err:?}");
    }

    #[test]
    fn bad_json_is_json_error()
    {
        let section = compress(br#"{"packages": "nope"}"#);
        let err = BuildSnapshot::from_section_data(&section).unwrap_err();
        assert!(matches!(err, BuildInfoError::Json(_)), "{err:?}");
    }

    #[test]
    fn oversized_manifest_is_rejected()
    {
        let section = compress(&vec![b' '; MAX_MANIFEST_SIZE + 16]);
        let err = BuildSnapshot::from_section_data(&section).unwrap_err();
        assert!(matches!(err, BuildInfoError::TooLarge { limit } if limit == MAX_MANIFEST_SIZE));
    }

    #[test]
    fn non_object_bytes_are_object_error()
    {
        let err = BuildSnapshot::from_binary(b"plain text, not an executable").unwrap_err();
        assert!(matches!(err, BuildInfoError::Object(_)), "{err:?}");
    }

    #[test]
    fn test_binary_loads_or_reports_missing_manifest()
    {
        // Test harnesses are normally built without `cargo auditable`.
        match BuildSnapshot::from_current_exe() {
            Ok(snapshot) => assert!(!snapshot.main_module().path.is_empty()),
            Err(BuildInfoError::MissingManifest) => assert!(BuildSnapshot::load().is_none()),
            Err(other) => panic!("unexpected loader failure: {other}"),
        }
    }
}
