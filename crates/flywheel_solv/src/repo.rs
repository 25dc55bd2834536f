use crate::SolvableId;

/// The distinguished repository name that holds the installed packages.
pub const SYSTEM_REPO_NAME: &str = "@System";

/// Identifies a repository in a [`crate::Pool`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId(pub u32);

/// A named metadata source. Solvables belong to exactly one repo; the repo
/// named [`SYSTEM_REPO_NAME`] is the installed system.
#[derive(Debug, Clone)]
pub struct Repo {
    /// The repository name as configured by the host.
    pub name: String,
    /// Whether the repository takes part in solving at all.
    pub enabled: bool,
    /// Whether downloaded packages from this repo must pass a signature
    /// check.
    pub gpgcheck: bool,
    /// Relative cost; cheaper repositories win ties between equal candidates.
    pub cost: u32,
    /// Solvables loaded from this repo, in load order.
    pub solvables: Vec<SolvableId>,
    /// Advisories (update-info) attached to this repo, when loaded.
    pub advisories: Vec<Advisory>,
}

impl Repo {
    /// A new enabled repository with the default cost.
    pub fn new(name: impl Into<String>) -> Self {
        Repo {
            name: name.into(),
            enabled: true,
            gpgcheck: false,
            cost: 1000,
            solvables: Vec::new(),
            advisories: Vec::new(),
        }
    }

    /// True when this is the installed-system repository.
    pub fn is_system(&self) -> bool {
        self.name == SYSTEM_REPO_NAME
    }
}

/// The class of an advisory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AdvisoryKind {
    /// A security fix.
    Security,
    /// A plain bug fix.
    Bugfix,
    /// A feature update.
    Enhancement,
    /// A newly added package.
    Newpackage,
    /// Anything the repository did not classify.
    Unknown,
}

/// A single update advisory as published in a repository's update-info
/// metadata. Advisories reference the fixed packages by NEVRA.
#[derive(Debug, Clone)]
pub struct Advisory {
    /// Advisory id, e.g. `FEDORA-2026-1a2b3c`.
    pub id: String,
    /// Advisory class.
    pub kind: AdvisoryKind,
    /// Severity label as published (`Critical`, `Moderate`, ...).
    pub severity: Option<String>,
    /// Referenced bug tracker ids.
    pub bugs: Vec<String>,
    /// Referenced CVE ids.
    pub cves: Vec<String>,
    /// NEVRAs of the packages the advisory ships.
    pub collection: Vec<String>,
}

/// An advisory paired with the repo it came from, as yielded by
/// [`crate::Pool::advisories`].
#[derive(Debug, Copy, Clone)]
pub struct AdvisoryRef<'pool> {
    /// The owning repository.
    pub repo: RepoId,
    /// The advisory record.
    pub advisory: &'pool Advisory,
}
