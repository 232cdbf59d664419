//! # Manifest
//!
//! Cookbook content manifests: every file a cookbook ships, hashed with
//! BLAKE3 and tagged with the specificity of the variant directory it
//! lives in. The resolver picks the most specific variant for a node,
//! by hostname, platform + version, platform, or default.
//!
//! ## Example
//!
//! ```no_run
//! use manifest::{Manifest, SpecificityQuery};
//! use std::path::Path;
//!
//! let manifest = Manifest::scan(Path::new("/var/cookbooks/apache2"))?;
//!
//! let query = SpecificityQuery {
//!     fqdn: Some("web1.example.org".into()),
//!     platform: Some("ubuntu".into()),
//!     platform_version: Some("9.10".into()),
//! };
//!
//! if let Some(entry) = manifest.preferred_record(&query, "files", "apache2.conf") {
//!     println!("{} ({})", entry.path.display(), entry.specificity);
//! }
//! # Ok::<(), manifest::Error>(())
//! ```

mod error;
pub mod preference;
mod types;

pub use error::{Error, Result};
pub use preference::{best_group, first_match};
pub use types::{ManifestEntry, SpecificityQuery};

use blake3::Hasher;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use walkdir::WalkDir;

/// Content segments that carry specificity variant directories
pub const SEGMENTS: [&str; 2] = ["files", "templates"];

/// The manifest of one cookbook's shipped content
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Build a manifest from an on-disk cookbook layout
    ///
    /// Each segment directory holds one variant directory per
    /// specificity tag, e.g. `files/default/afile.rb`,
    /// `files/ubuntu-9.10/afile.rb`, `files/host-web1.example.org/...`.
    pub fn scan(cookbook_dir: &Path) -> Result<Self> {
        if !cookbook_dir.is_dir() {
            return Err(Error::PathNotFound(cookbook_dir.to_path_buf()));
        }

        let mut entries = Vec::new();
        for segment in SEGMENTS {
            let segment_dir = cookbook_dir.join(segment);
            if !segment_dir.is_dir() {
                continue;
            }
            for variant in std::fs::read_dir(&segment_dir)? {
                let variant = variant?;
                if !variant.file_type()?.is_dir() {
                    continue;
                }
                let specificity = variant.file_name().to_string_lossy().to_string();
                scan_variant(segment, &specificity, &variant.path(), &mut entries)?;
            }
        }

        entries.sort_by(|a, b| {
            (&a.segment, &a.specificity, &a.name).cmp(&(&b.segment, &b.specificity, &b.name))
        });
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Most specific variant of a single file for this node, if any
    pub fn preferred_record(
        &self,
        query: &SpecificityQuery,
        segment: &str,
        name: &str,
    ) -> Option<&ManifestEntry> {
        let candidates: Vec<&ManifestEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.segment == segment && entry.name == name)
            .collect();
        let preferences = query.preference_order();
        preference::first_match(&preferences, &candidates, |entry| &entry.specificity).copied()
    }

    /// Every entry under `dir_name` at the single best-matching
    /// specificity level for this node; levels are never mixed
    pub fn preferred_records_for_directory(
        &self,
        query: &SpecificityQuery,
        segment: &str,
        dir_name: &str,
    ) -> Vec<&ManifestEntry> {
        let prefix = format!("{dir_name}/");
        let candidates: Vec<&ManifestEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.segment == segment && entry.name.starts_with(&prefix))
            .collect();
        let preferences = query.preference_order();
        preference::best_group(&preferences, &candidates, |entry| &entry.specificity)
            .into_iter()
            .copied()
            .collect()
    }
}

/// Collect every file under one specificity variant directory
fn scan_variant(
    segment: &str,
    specificity: &str,
    dir: &Path,
    entries: &mut Vec<ManifestEntry>,
) -> Result<()> {
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            Error::InvalidPath(format!("{}: {e}", dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let checksum = hash_file(entry.path())?;
        entries.push(ManifestEntry {
            segment: segment.to_string(),
            name,
            path: entry.path().to_path_buf(),
            checksum,
            specificity: specificity.to_string(),
        });
    }
    Ok(())
}

/// BLAKE3 hex digest of a file, streaming
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|source| Error::HashFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 65536];
    loop {
        let read = reader.read(&mut buffer).map_err(|source| Error::HashFailed {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn entry(segment: &str, name: &str, specificity: &str) -> ManifestEntry {
        ManifestEntry {
            segment: segment.to_string(),
            name: name.to_string(),
            path: Path::new("/tmp").join(specificity).join(name),
            checksum: String::new(),
            specificity: specificity.to_string(),
        }
    }

    fn ubuntu_query(fqdn: &str) -> SpecificityQuery {
        SpecificityQuery {
            fqdn: Some(fqdn.to_string()),
            platform: Some("ubuntu".to_string()),
            platform_version: Some("9.10".to_string()),
        }
    }

    #[test]
    fn platform_version_variant_beats_platform_and_default() {
        let manifest = Manifest::new(vec![
            entry("files", "afile.rb", "host-examplehost.example.org"),
            entry("files", "afile.rb", "ubuntu-9.10"),
            entry("files", "afile.rb", "ubuntu"),
            entry("files", "afile.rb", "default"),
        ]);

        // host tag does not match this fqdn, so the exact platform
        // version wins
        let found = manifest
            .preferred_record(&ubuntu_query("other.example.org"), "files", "afile.rb")
            .unwrap();
        assert_eq!(found.specificity, "ubuntu-9.10");
    }

    #[test]
    fn host_variant_wins_when_fqdn_matches() {
        let manifest = Manifest::new(vec![
            entry("files", "afile.rb", "host-examplehost.example.org"),
            entry("files", "afile.rb", "ubuntu-9.10"),
            entry("files", "afile.rb", "default"),
        ]);

        let found = manifest
            .preferred_record(&ubuntu_query("examplehost.example.org"), "files", "afile.rb")
            .unwrap();
        assert_eq!(found.specificity, "host-examplehost.example.org");
    }

    #[test]
    fn major_version_variant_is_tried_before_bare_platform() {
        let manifest = Manifest::new(vec![
            entry("files", "afile.rb", "ubuntu-9"),
            entry("files", "afile.rb", "ubuntu"),
            entry("files", "afile.rb", "default"),
        ]);

        let found = manifest
            .preferred_record(&ubuntu_query("x.example.org"), "files", "afile.rb")
            .unwrap();
        assert_eq!(found.specificity, "ubuntu-9");
    }

    #[test]
    fn falls_through_to_default_and_then_not_found() {
        let manifest = Manifest::new(vec![entry("files", "afile.rb", "default")]);
        let found = manifest
            .preferred_record(&ubuntu_query("x.example.org"), "files", "afile.rb")
            .unwrap();
        assert_eq!(found.specificity, "default");

        assert!(
            manifest
                .preferred_record(&ubuntu_query("x"), "files", "missing.rb")
                .is_none()
        );
    }

    #[test]
    fn directory_selection_never_mixes_levels() {
        let manifest = Manifest::new(vec![
            entry("files", "adir/one.rb", "ubuntu"),
            entry("files", "adir/two.rb", "ubuntu"),
            entry("files", "adir/one.rb", "default"),
            entry("files", "adir/three.rb", "default"),
        ]);

        let records =
            manifest.preferred_records_for_directory(&ubuntu_query("x"), "files", "adir");
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["adir/one.rb", "adir/two.rb"]);
        assert!(records.iter().all(|r| r.specificity == "ubuntu"));
    }

    #[test]
    fn scan_builds_tagged_checksummed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("files");
        fs::create_dir_all(files.join("default")).unwrap();
        fs::create_dir_all(files.join("ubuntu-9.10/conf")).unwrap();
        fs::write(files.join("default/afile.rb"), "default variant").unwrap();
        fs::write(files.join("ubuntu-9.10/afile.rb"), "ubuntu variant").unwrap();
        fs::write(files.join("ubuntu-9.10/conf/extra.rb"), "nested").unwrap();

        let manifest = Manifest::scan(dir.path()).unwrap();
        assert_eq!(manifest.len(), 3);

        let found = manifest
            .preferred_record(&ubuntu_query("x"), "files", "afile.rb")
            .unwrap();
        assert_eq!(found.specificity, "ubuntu-9.10");
        assert_eq!(found.checksum, blake3::hash(b"ubuntu variant").to_hex().to_string());

        let nested = manifest
            .preferred_record(&ubuntu_query("x"), "files", "conf/extra.rb")
            .unwrap();
        assert_eq!(nested.name, "conf/extra.rb");
    }

    #[test]
    fn scan_of_missing_cookbook_errors() {
        assert!(matches!(
            Manifest::scan(Path::new("/nonexistent/cookbook")),
            Err(Error::PathNotFound(_))
        ));
    }
}
