//! On-disk metadata documents the sack can load. The documents are plain
//! JSON; parsing the actual repository wire formats is the host's business,
//! this module only defines what the sack consumes.

use serde::{Deserialize, Serialize};
use url::Url;

/// One package record of a repository document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name.
    pub name: String,
    /// Epoch; omitted in the document when the package has none, which is
    /// distinct from an explicit `0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    /// Version.
    pub version: String,
    /// Release.
    pub release: String,
    /// Architecture.
    pub arch: String,

    /// `Provides:` entries as `name [OP evr]` strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<String>,
    /// `Requires:` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// `Conflicts:` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
    /// `Obsoletes:` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obsoletes: Vec<String>,
    /// `Recommends:` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommends: Vec<String>,
    /// `Suggests:` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggests: Vec<String>,
    /// `Enhances:` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enhances: Vec<String>,
    /// `Supplements:` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplements: Vec<String>,

    /// Owned files; only present when the repository ships filelists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// One-line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Upstream URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Repository-relative download location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Source RPM file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcerpm: Option<String>,
    /// Package digest as published by the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkgid: Option<String>,
    /// Download size in bytes.
    #[serde(default)]
    pub download_size: u64,
    /// Installed size in bytes.
    #[serde(default)]
    pub install_size: u64,
}

impl PackageRecord {
    /// The `[epoch:]version-release` string of the record.
    pub fn evr(&self) -> String {
        match self.epoch {
            Some(epoch) => format!("{epoch}:{}-{}", self.version, self.release),
            None => format!("{}-{}", self.version, self.release),
        }
    }
}

/// One advisory of a repository document's update-info section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    /// Advisory id.
    pub id: String,
    /// Advisory class (`security`, `bugfix`, ...); unknown values map to
    /// [`flywheel_solv::AdvisoryKind::Unknown`].
    #[serde(default)]
    pub kind: Option<String>,
    /// Severity label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    /// Referenced bug ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bugs: Vec<String>,
    /// Referenced CVE ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cves: Vec<String>,
    /// NEVRAs of the shipped packages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collection: Vec<String>,
}

/// A remote repository's metadata document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoDocument {
    /// Base URL the package locations are relative to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Url>,
    /// Whether installs from this repo must pass the signature check.
    #[serde(default)]
    pub gpgcheck: bool,
    /// Relative repository cost; cheaper repos win candidate ties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u32>,
    /// The package records.
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
    /// Update advisories, consumed only when the load asks for update-info.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<AdvisoryRecord>,
}

/// The installed-system state document consumed by
/// [`crate::Sack::load_system_repo`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStateDocument {
    /// The installed package records.
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
}

#[cfg(test)]
mod test {
    use super::{PackageRecord, RepoDocument};

    #[test]
    fn test_record_evr() {
        let record = PackageRecord {
            name: "foo".into(),
            epoch: Some(8),
            version: "3.6.9".into(),
            release: "11.fc100".into(),
            arch: "x86_64".into(),
            ..PackageRecord::default()
        };
        assert_eq!(record.evr(), "8:3.6.9-11.fc100");

        let record = PackageRecord {
            epoch: None,
            ..record
        };
        assert_eq!(record.evr(), "3.6.9-11.fc100");
    }

    #[test]
    fn test_document_defaults() {
        let doc: RepoDocument = serde_json::from_str(
            r#"{"packages": [{"name": "a", "version": "1", "release": "1", "arch": "noarch"}]}"#,
        )
        .expect("minimal document parses");
        assert_eq!(doc.packages.len(), 1);
        assert_eq!(doc.packages[0].epoch, None);
        assert!(!doc.gpgcheck);
    }
}
