use std::any::Any;
use std::fmt;
use std::rc::Rc;

use flywheel_solv::{DepKind, SolvableId};
use flywheel_types::split_evr;

use crate::Sack;

/// A package handle: a solvable id bound to the sack that owns it.
///
/// Handles are cheap to clone and only valid as long as their sack. When the
/// sack carries a package-init hook, every handle also carries the host value
/// the hook produced for its id.
#[derive(Clone)]
pub struct Package<'sack> {
    sack: &'sack Sack,
    id: SolvableId,
    user_data: Option<Rc<dyn Any>>,
}

impl<'sack> Package<'sack> {
    pub(crate) fn new(
        sack: &'sack Sack,
        id: SolvableId,
        user_data: Option<Rc<dyn Any>>,
    ) -> Package<'sack> {
        Package {
            sack,
            id,
            user_data,
        }
    }

    /// The underlying solvable id.
    pub fn id(&self) -> SolvableId {
        self.id
    }

    /// The owning sack.
    pub fn sack(&self) -> &'sack Sack {
        self.sack
    }

    /// The value produced by the sack's package-init hook, if one is set.
    pub fn user_data(&self) -> Option<&dyn Any> {
        self.user_data.as_deref()
    }

    /// Package name.
    pub fn name(&self) -> &str {
        self.sack.pool().name_of(self.id)
    }

    /// Full `[epoch:]version-release` string.
    pub fn evr(&self) -> &str {
        self.sack.pool().evr_of(self.id)
    }

    /// The epoch, `None` when the package spells none out.
    pub fn epoch(&self) -> Option<u64> {
        self.sack.pool().epoch_of(self.id)
    }

    /// The version part of the EVR.
    pub fn version(&self) -> &str {
        split_evr(self.evr()).version
    }

    /// The release part of the EVR, when present.
    pub fn release(&self) -> Option<&str> {
        split_evr(self.evr()).release
    }

    /// Architecture.
    pub fn arch(&self) -> &str {
        self.sack.pool().arch_of(self.id)
    }

    /// Canonical NEVRA render.
    pub fn nevra(&self) -> String {
        self.sack.pool().nevra_of(self.id)
    }

    /// Name of the repository the package came from.
    pub fn reponame(&self) -> &str {
        let repo = self.sack.pool().solvable(self.id).repo;
        &self.sack.pool().repo(repo).name
    }

    /// True when the package belongs to the installed system.
    pub fn is_installed(&self) -> bool {
        self.sack.pool().is_installed(self.id)
    }

    /// One-line summary.
    pub fn summary(&self) -> Option<&str> {
        self.sack.pool().solvable(self.id).summary.as_deref()
    }

    /// Long description.
    pub fn description(&self) -> Option<&str> {
        self.sack.pool().solvable(self.id).description.as_deref()
    }

    /// Upstream URL.
    pub fn url(&self) -> Option<&str> {
        self.sack.pool().solvable(self.id).url.as_deref()
    }

    /// Repository-relative download location.
    pub fn location(&self) -> Option<&str> {
        self.sack.pool().solvable(self.id).location.as_deref()
    }

    /// Source RPM file name.
    pub fn sourcerpm(&self) -> Option<&str> {
        self.sack.pool().solvable(self.id).sourcerpm.as_deref()
    }

    /// Package digest as published by the repository.
    pub fn pkgid(&self) -> Option<&str> {
        self.sack.pool().solvable(self.id).pkgid.as_deref()
    }

    /// Download size in bytes.
    pub fn download_size(&self) -> u64 {
        self.sack.pool().solvable(self.id).downloadsize
    }

    /// Files owned by the package.
    pub fn files(&self) -> &[String] {
        &self.sack.pool().solvable(self.id).files
    }

    /// A dependency array, rendered.
    pub fn deps(&self, kind: DepKind) -> Vec<String> {
        let pool = self.sack.pool();
        pool.solvable(self.id)
            .dep_array(kind)
            .iter()
            .map(|dep| pool.reldep_str(*dep))
            .collect()
    }
}

impl fmt::Debug for Package<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Package").field(&self.nevra()).finish()
    }
}

impl fmt::Display for Package<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nevra())
    }
}

impl PartialEq for Package<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.sack, other.sack)
    }
}

impl Eq for Package<'_> {}
