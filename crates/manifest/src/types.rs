//! Data types for the manifest crate

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file shipped by a cookbook, tagged with its specificity
///
/// The specificity tag is the variant directory the file was found
/// under: `host-<fqdn>`, `<platform>-<version>`, `<platform>`, or
/// `default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Content segment the file belongs to ("files", "templates", ...)
    pub segment: String,
    /// Name relative to the specificity directory, e.g. "afile.rb"
    /// or "conf/nested.erb"
    pub name: String,
    /// Full on-disk path
    pub path: PathBuf,
    /// BLAKE3 hex digest of the file content
    pub checksum: String,
    /// Specificity tag (variant directory name)
    pub specificity: String,
}

/// The node facts the specificity resolver matches against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecificityQuery {
    pub fqdn: Option<String>,
    pub platform: Option<String>,
    pub platform_version: Option<String>,
}

impl SpecificityQuery {
    /// Candidate tags, most to least specific:
    /// 1. `host-<fqdn>`
    /// 2. `<platform>-<full version>`
    /// 3. `<platform>-<major version>`
    /// 4. `<platform>`
    /// 5. `default`
    pub fn preference_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(5);
        if let Some(fqdn) = &self.fqdn {
            order.push(format!("host-{fqdn}"));
        }
        if let Some(platform) = &self.platform {
            if let Some(version) = &self.platform_version {
                order.push(format!("{platform}-{version}"));
                if let Some(major) = major_version(version) {
                    if major != *version {
                        order.push(format!("{platform}-{major}"));
                    }
                }
            }
            order.push(platform.clone());
        }
        order.push("default".to_string());
        order
    }
}

/// Leading numeric segment of a version string: "9.10" -> "9"
fn major_version(version: &str) -> Option<String> {
    let major: String = version.chars().take_while(char::is_ascii_digit).collect();
    if major.is_empty() { None } else { Some(major) }
}
