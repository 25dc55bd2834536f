//! The depsolve → download → commit pipeline that turns a solved goal into
//! on-disk changes through the external RPM runtime.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use flywheel_solv::SolvableId;

use crate::goal::{Goal, GoalReason, GoalRunFlags};
use crate::reason_store::ReasonStore;
use crate::{Error, Package, Sack};

pub mod progress;
pub mod rpm;

use progress::{DriverState, ProgressTracker};
use rpm::{Keyring, RpmProblemFilter, RpmRuntime, RpmTransFlags};

/// Behavior switches of one commit run.
#[derive(Debug, Copy, Clone)]
pub struct TransactionFlags {
    /// Run the transaction without touching the disk.
    pub test: bool,
    /// Refuse packages whose signature does not verify, whatever the repo
    /// policy says.
    pub only_trusted: bool,
    /// Tolerate reinstalling an identical package.
    pub allow_reinstall: bool,
    /// Tolerate replacing a package with an older version.
    pub allow_downgrade: bool,
    /// Do not install documentation files.
    pub nodocs: bool,
    /// Check free space at the cache directory before committing.
    pub check_free_space: bool,
}

impl Default for TransactionFlags {
    fn default() -> Self {
        TransactionFlags {
            test: false,
            only_trusted: false,
            allow_reinstall: false,
            allow_downgrade: false,
            nodocs: false,
            check_free_space: true,
        }
    }
}

/// What a transaction element does, from the driver's point of view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ItemAction {
    /// A fresh install.
    Install,
    /// A same-NEVRA replacement.
    Reinstall,
    /// The incoming side of an upgrade.
    Upgrade,
    /// The incoming side of a downgrade.
    Downgrade,
    /// A plain removal.
    Erase,
    /// A removal caused by an obsoleting package.
    Obsolete,
    /// A removal that is really bookkeeping for a replacement.
    Cleanup,
}

/// One element of the driver's install or remove lists.
#[derive(Debug, Clone)]
pub struct TransactionItem {
    /// The package.
    pub id: SolvableId,
    /// What happens to it.
    pub action: ItemAction,
    /// The package digest, read before the commit invalidates the sack.
    pub pkgid: Option<String>,
}

/// Orchestrates depsolve, download hand-off and the seven-phase commit over
/// the external RPM runtime, and propagates install reasons to the reason
/// store.
pub struct TransactionDriver<'sack> {
    sack: &'sack Sack,
    runtime: Box<dyn RpmRuntime>,
    keyring: Box<dyn Keyring>,
    reasons: ReasonStore,
    uid: u32,
    releasever: Option<String>,
    flags: TransactionFlags,
    progress: ProgressTracker,

    install: Vec<TransactionItem>,
    remove: Vec<TransactionItem>,
    remove_helper: Vec<TransactionItem>,
    pkgs_to_download: Vec<SolvableId>,
    erased_by_package: HashMap<String, String>,
}

impl<'sack> TransactionDriver<'sack> {
    /// A driver over the sack, the given runtime and keyring, and a reason
    /// store.
    pub fn new(
        sack: &'sack Sack,
        runtime: Box<dyn RpmRuntime>,
        keyring: Box<dyn Keyring>,
        reasons: ReasonStore,
    ) -> TransactionDriver<'sack> {
        TransactionDriver {
            sack,
            runtime,
            keyring,
            reasons,
            uid: 0,
            releasever: None,
            flags: TransactionFlags::default(),
            progress: ProgressTracker::default(),
            install: Vec::new(),
            remove: Vec::new(),
            remove_helper: Vec::new(),
            pkgs_to_download: Vec::new(),
            erased_by_package: HashMap::new(),
        }
    }

    /// The uid recorded as `installed_by` in the reason store.
    pub fn set_uid(&mut self, uid: u32) {
        self.uid = uid;
    }

    /// The release version recorded in the reason store.
    pub fn set_releasever(&mut self, releasever: impl Into<String>) {
        self.releasever = Some(releasever.into());
    }

    /// Commit behavior switches.
    pub fn set_flags(&mut self, flags: TransactionFlags) {
        self.flags = flags;
    }

    /// The commit pipeline's current state.
    pub fn state(&self) -> DriverState {
        self.progress.state()
    }

    /// The reason store this driver writes to.
    pub fn reason_store(&self) -> &ReasonStore {
        &self.reasons
    }

    /// The classified incoming packages of the current run.
    pub fn install_items(&self) -> &[TransactionItem] {
        &self.install
    }

    /// The classified removals of the current run.
    pub fn remove_items(&self) -> &[TransactionItem] {
        &self.remove
    }

    /// Removals that are bookkeeping for replacements.
    pub fn remove_helper_items(&self) -> &[TransactionItem] {
        &self.remove_helper
    }

    // --- depsolve --------------------------------------------------------

    /// Resolves the goal (with blanket uninstall permission), classifies the
    /// incoming packages and works out what still needs downloading.
    pub fn depsolve(&mut self, goal: &mut Goal<'sack>) -> Result<(), Error> {
        self.reset();
        goal.run(GoalRunFlags {
            allow_uninstall: true,
            ..GoalRunFlags::default()
        })?;

        let mut install = Vec::new();
        let groups = [
            (goal.list_installs(), ItemAction::Install),
            (goal.list_reinstalls(), ItemAction::Reinstall),
            (goal.list_upgrades(), ItemAction::Upgrade),
            (goal.list_downgrades(), ItemAction::Downgrade),
        ];
        for (packages, action) in groups {
            for package in packages {
                // Every incoming package must come from somewhere.
                if package.location().is_none() {
                    return Err(Error::PackageNotFound(package.nevra()));
                }
                install.push(TransactionItem {
                    id: package.id(),
                    action,
                    pkgid: package.pkgid().map(str::to_string),
                });
            }
        }

        self.pkgs_to_download = install
            .iter()
            .filter(|item| {
                self.package_path(item.id)
                    .map(|path| !path.exists())
                    .unwrap_or(true)
            })
            .map(|item| item.id)
            .collect();
        self.install = install;

        tracing::debug!(
            install = self.install.len(),
            download = self.pkgs_to_download.len(),
            "depsolve finished"
        );
        Ok(())
    }

    /// Packages whose files are not in the cache yet; the host's downloader
    /// fills these in before [`TransactionDriver::commit`].
    pub fn pkgs_to_download(&self) -> Vec<Package<'sack>> {
        self.pkgs_to_download
            .iter()
            .map(|id| self.sack.package(*id))
            .collect()
    }

    /// Total bytes [`TransactionDriver::pkgs_to_download`] will fetch.
    pub fn download_size(&self) -> u64 {
        self.pkgs_to_download
            .iter()
            .map(|id| self.sack.pool().solvable(*id).downloadsize)
            .sum()
    }

    // --- commit ----------------------------------------------------------

    /// Runs the seven-phase commit. On failure the driver is reset so the
    /// caller can fix inputs and retry.
    pub fn commit(&mut self, goal: &Goal<'sack>) -> Result<(), Error> {
        let result = self.commit_inner(goal);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn commit_inner(&mut self, goal: &Goal<'sack>) -> Result<(), Error> {
        self.progress = ProgressTracker::default();

        // Enough room to download everything?
        if self.flags.check_free_space {
            if let Some(cachedir) = self.sack.cachedir() {
                let needed = self.download_size();
                let available = free_bytes(cachedir)?;
                if needed > available {
                    return Err(Error::NoSpace {
                        path: cachedir.to_path_buf(),
                        needed,
                        available,
                    });
                }
            }
        }

        self.runtime.set_root(self.sack.rootdir())?;

        // Phase 1: queue the installs, checking trust per package.
        for item in &self.install {
            let package = self.sack.package(item.id);
            let path = self.package_path(item.id)?;
            if !path.exists() {
                return Err(Error::FileNotFound(path));
            }
            if let Err(reason) = self.keyring.verify(&path) {
                let repo = self.sack.pool().solvable(item.id).repo;
                if self.sack.pool().repo(repo).gpgcheck || self.flags.only_trusted {
                    return Err(Error::GpgSignatureInvalid {
                        nevra: package.nevra(),
                        reason,
                    });
                }
                tracing::warn!(nevra = %package.nevra(), %reason, "ignoring failed signature check");
            }
            let is_upgrade = matches!(
                item.action,
                ItemAction::Upgrade | ItemAction::Downgrade | ItemAction::Reinstall
            );
            self.runtime.add_install(
                &path,
                &package.nevra(),
                is_upgrade,
                !self.flags.only_trusted,
            )?;
        }

        // Phase 2: queue the removals, pre-reading pkgids since the sack is
        // stale after the commit. A removal whose name is also incoming is
        // bookkeeping, not a user-visible erase.
        let incoming_names: HashSet<String> = self
            .install
            .iter()
            .map(|item| self.sack.pool().name_of(item.id).to_string())
            .collect();
        let mut remove = Vec::new();
        let groups = [
            (goal.list_erasures(), ItemAction::Erase),
            (goal.list_obsoleted(), ItemAction::Obsolete),
        ];
        for (packages, action) in groups {
            for package in packages {
                let action = if incoming_names.contains(package.name()) {
                    ItemAction::Cleanup
                } else {
                    action
                };
                remove.push(TransactionItem {
                    id: package.id(),
                    action,
                    pkgid: package.pkgid().map(str::to_string),
                });
            }
        }
        for item in &remove {
            self.runtime.add_remove(&self.sack.pool().nevra_of(item.id))?;
        }
        self.remove = remove;

        // Phase 3: the displaced predecessors of updates and downgrades are
        // removals too, labelled as cleanup.
        for item in &self.install {
            if !matches!(item.action, ItemAction::Upgrade | ItemAction::Downgrade) {
                continue;
            }
            let package = self.sack.package(item.id);
            for old in goal.list_obsoleted_by_package(&package) {
                self.remove_helper.push(TransactionItem {
                    id: old.id(),
                    action: ItemAction::Cleanup,
                    pkgid: old.pkgid().map(str::to_string),
                });
                self.runtime.add_remove(&old.nevra())?;
            }
        }

        // Phase 4: map every replacement to its displaced predecessor so
        // reasons can be carried over.
        for item in &self.install {
            if !matches!(
                item.action,
                ItemAction::Upgrade | ItemAction::Downgrade | ItemAction::Reinstall
            ) {
                continue;
            }
            if let Some(old) = goal.transaction().and_then(|t| t.obs_pkg(item.id)) {
                self.erased_by_package.insert(
                    self.sack.pool().nevra_of(item.id),
                    self.sack.pool().nevra_of(old),
                );
            }
        }

        // Phase 5: ordering, then a test pass whose progress is discarded.
        self.runtime.order()?;
        let filter = self.problems_filter();
        self.progress.set_state(DriverState::Ignore);
        let problems = {
            let progress = &mut self.progress;
            self.runtime.run(
                RpmTransFlags {
                    test: true,
                    nodocs: self.flags.nodocs,
                },
                filter,
                &mut |event| progress.handle(&event),
            )?
        };
        if !problems.is_empty() {
            return Err(Error::internal(format!(
                "transaction test failed: {}",
                problems.join("; ")
            )));
        }

        // Phase 6: the real run.
        self.progress.set_state(DriverState::Preparing);
        let problems = {
            let progress = &mut self.progress;
            self.runtime.run(
                RpmTransFlags {
                    test: self.flags.test,
                    nodocs: self.flags.nodocs,
                },
                filter,
                &mut |event| progress.handle(&event),
            )?
        };
        if !problems.is_empty() {
            return Err(Error::internal(format!(
                "transaction failed: {}",
                problems.join("; ")
            )));
        }
        if self.flags.test {
            // Nothing landed on disk, so nothing to record or clean.
            self.reset();
            return Ok(());
        }
        if self.progress.state() != DriverState::Writing {
            return Err(Error::internal(
                "transaction finished without reaching the writing state",
            ));
        }

        // Phase 7: reason store and cache cleanup.
        self.write_reasons(goal)?;
        self.clean_cache();
        tracing::debug!(
            installed = self.install.len(),
            removed = self.remove.len() + self.remove_helper.len(),
            "commit finished"
        );
        Ok(())
    }

    fn problems_filter(&self) -> RpmProblemFilter {
        let mut filter = RpmProblemFilter::default();
        if self.flags.allow_reinstall {
            filter |= RpmProblemFilter::REPLACEPKG;
        }
        if self.flags.allow_downgrade {
            filter |= RpmProblemFilter::OLDPACKAGE;
        }
        if !self.flags.check_free_space {
            filter |= RpmProblemFilter::DISKSPACE;
        }
        filter
    }

    fn write_reasons(&self, goal: &Goal<'sack>) -> Result<(), Error> {
        for item in &self.install {
            let package = self.sack.package(item.id);
            let nevra = package.nevra();
            let reason = self.reason_for(goal, item)?;
            self.reasons
                .set_string(&nevra, "from_repo", package.reponame())?;
            self.reasons
                .set_string(&nevra, "installed_by", &self.uid.to_string())?;
            self.reasons.set_string(&nevra, "reason", &reason)?;
            if let Some(releasever) = &self.releasever {
                self.reasons.set_string(&nevra, "releasever", releasever)?;
            }
        }
        for item in self.remove.iter().chain(&self.remove_helper) {
            self.reasons.remove_all(&self.sack.pool().nevra_of(item.id))?;
        }
        Ok(())
    }

    /// The reason recorded for an incoming package: install-only packages
    /// are always wanted, replacements inherit their predecessor's reason,
    /// everything else follows the goal's decision.
    fn reason_for(&self, goal: &Goal<'sack>, item: &TransactionItem) -> Result<String, Error> {
        let package = self.sack.package(item.id);
        if self
            .sack
            .installonly()
            .iter()
            .any(|name| name == package.name())
        {
            return Ok("user".to_string());
        }
        if matches!(
            item.action,
            ItemAction::Upgrade | ItemAction::Downgrade | ItemAction::Reinstall
        ) {
            if let Some(old) = self.erased_by_package.get(&package.nevra()) {
                if let Some(stored) = self.reasons.get_string(old, "reason")? {
                    return Ok(stored);
                }
            }
            return Ok("dep".to_string());
        }
        Ok(match goal.reason(&package) {
            GoalReason::User => "user".to_string(),
            _ => "dep".to_string(),
        })
    }

    /// Deletes the downloaded files of this transaction from the cache.
    /// Files outside the cache directory (command-line and local installs)
    /// are left alone.
    fn clean_cache(&self) {
        let Some(cachedir) = self.sack.cachedir() else {
            return;
        };
        for item in &self.install {
            let Ok(path) = self.package_path(item.id) else {
                continue;
            };
            if path.starts_with(cachedir) && path.exists() {
                if let Err(err) = fs_err::remove_file(&path) {
                    tracing::warn!(path = %path.display(), %err, "leaving cached package behind");
                }
            }
        }
    }

    fn package_path(&self, id: SolvableId) -> Result<PathBuf, Error> {
        let location = self
            .sack
            .pool()
            .solvable(id)
            .location
            .clone()
            .ok_or_else(|| Error::PackageNotFound(self.sack.pool().nevra_of(id)))?;
        if location.starts_with('/') {
            return Ok(PathBuf::from(location));
        }
        let cachedir = self
            .sack
            .cachedir()
            .ok_or_else(|| Error::internal("no cache directory configured"))?;
        Ok(cachedir.join(location))
    }

    fn reset(&mut self) {
        self.install.clear();
        self.remove.clear();
        self.remove_helper.clear();
        self.pkgs_to_download.clear();
        self.erased_by_package.clear();
        self.progress = ProgressTracker::default();
    }
}

/// Free bytes available to unprivileged writers at `path`.
#[cfg(unix)]
fn free_bytes(path: &Path) -> Result<u64, Error> {
    use std::os::unix::ffi::OsStrExt;

    let c_path =
        std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::FileInvalid {
            path: path.to_path_buf(),
            reason: "path contains a NUL byte".to_string(),
        })?;
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    // Safe: the path is a valid NUL-terminated string and stats is sized.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
    if rc != 0 {
        return Err(Error::FileInvalid {
            path: path.to_path_buf(),
            reason: std::io::Error::last_os_error().to_string(),
        });
    }
    Ok(stats.f_bavail as u64 * stats.f_frsize as u64)
}

#[cfg(not(unix))]
fn free_bytes(_path: &Path) -> Result<u64, Error> {
    Ok(u64::MAX)
}
