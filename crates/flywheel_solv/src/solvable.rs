use crate::{ReldepId, RepoId, StringId};

/// Identifies a solvable in a [`crate::Pool`].
///
/// Ids are dense and stable for the lifetime of the owning pool. Id `0` means
/// "none" and id `1` is reserved for the system solvable; real packages start
/// at `2`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SolvableId(pub u32);

impl SolvableId {
    /// The "no solvable" sentinel.
    pub const NONE: SolvableId = SolvableId(0);
    /// The reserved system solvable.
    pub const SYSTEM: SolvableId = SolvableId(1);

    /// True for the `NONE` sentinel.
    pub fn is_none(self) -> bool {
        self == SolvableId::NONE
    }
}

/// A single package candidate in the pool, installed or available.
///
/// Name, arch and EVR are interned; dependency arrays hold interned reldep
/// ids in the order the repository listed them. The remaining attributes form
/// the typed attribute bag reachable through [`crate::DataIterator`].
#[derive(Debug, Clone, Default)]
pub struct Solvable {
    /// Interned package name.
    pub name: StringId,
    /// Interned `[epoch:]version-release` string used for the total order.
    pub evr: StringId,
    /// Interned architecture.
    pub arch: StringId,
    /// The repository this solvable was loaded from.
    pub repo: RepoId,

    /// `Provides:` entries. Every package implicitly provides
    /// `name = evr`; the loader is responsible for adding that self-provide.
    pub provides: Vec<ReldepId>,
    /// `Requires:` entries.
    pub requires: Vec<ReldepId>,
    /// `Conflicts:` entries.
    pub conflicts: Vec<ReldepId>,
    /// `Obsoletes:` entries.
    pub obsoletes: Vec<ReldepId>,
    /// Weak forward dependencies.
    pub recommends: Vec<ReldepId>,
    /// Very weak forward dependencies.
    pub suggests: Vec<ReldepId>,
    /// Weak reverse dependencies.
    pub enhances: Vec<ReldepId>,
    /// Very weak reverse dependencies.
    pub supplements: Vec<ReldepId>,

    /// Files owned by the package (absolute paths).
    pub files: Vec<String>,
    /// One-line summary.
    pub summary: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Upstream URL.
    pub url: Option<String>,
    /// Repository-relative download location.
    pub location: Option<String>,
    /// Source RPM file name.
    pub sourcerpm: Option<String>,
    /// Package id digest (SHA) as published by the repository.
    pub pkgid: Option<String>,
    /// Download size in bytes.
    pub downloadsize: u64,
    /// Installed size in bytes.
    pub installsize: u64,
}

impl Solvable {
    /// All dependency arrays of the given kind share this accessor so the
    /// query engine can dispatch on a keyname.
    pub fn dep_array(&self, kind: DepKind) -> &[ReldepId] {
        match kind {
            DepKind::Provides => &self.provides,
            DepKind::Requires => &self.requires,
            DepKind::Conflicts => &self.conflicts,
            DepKind::Obsoletes => &self.obsoletes,
            DepKind::Recommends => &self.recommends,
            DepKind::Suggests => &self.suggests,
            DepKind::Enhances => &self.enhances,
            DepKind::Supplements => &self.supplements,
        }
    }
}

/// The eight relational dependency arrays of a solvable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DepKind {
    /// `Provides:`
    Provides,
    /// `Requires:`
    Requires,
    /// `Conflicts:`
    Conflicts,
    /// `Obsoletes:`
    Obsoletes,
    /// `Recommends:`
    Recommends,
    /// `Suggests:`
    Suggests,
    /// `Enhances:`
    Enhances,
    /// `Supplements:`
    Supplements,
}
