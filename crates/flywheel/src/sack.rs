use std::any::Any;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use flywheel_solv::{Advisory, AdvisoryKind, Pool, Repo, RepoId, Solvable, SolvableId, SYSTEM_REPO_NAME};
use flywheel_types::{evr_cmp, is_valid_arch, parse_reldep_str, split_evr};

use crate::metadata::{AdvisoryRecord, PackageRecord, RepoDocument, SystemStateDocument};
use crate::{Error, Package, PackageSet};

/// Hook invoked whenever the sack hands a package id across the API
/// boundary, letting the host attach its own value to every handle.
pub type PackageInit = Box<dyn Fn(SolvableId) -> Rc<dyn Any>>;

/// Construction options for a [`Sack`]. All fields are optional; the
/// defaults give an in-memory sack for the `x86_64` architecture rooted at
/// `/`.
#[derive(Default)]
pub struct SackOptions {
    /// Directory for downloaded packages and cache documents.
    pub cachedir: Option<PathBuf>,
    /// Base architecture of the universe; must be a recognised value.
    pub arch: Option<String>,
    /// Root of the installed system.
    pub rootdir: Option<PathBuf>,
    /// Create the cache directory when it is missing.
    pub make_cache_dir: bool,
    /// Where the host wants sack activity logged. The sack itself only
    /// records the wish; wiring a `tracing` subscriber to it is up to the
    /// host.
    pub logfile: Option<PathBuf>,
    /// See [`PackageInit`].
    pub package_init: Option<PackageInit>,
}

/// What to pull in when loading a remote repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadRepoFlags {
    /// Write the parsed document back into the cache directory.
    pub build_cache: bool,
    /// Load the per-package file lists.
    pub load_filelists: bool,
    /// Load delta-rpm metadata. Accepted for interface compatibility; the
    /// document model carries no delta section.
    pub load_presto: bool,
    /// Load the update advisories.
    pub load_updateinfo: bool,
}

/// Options for [`Sack::knows`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KnowsFlags {
    /// Only consider package names, not provides.
    pub name_only: bool,
    /// Case-insensitive matching.
    pub icase: bool,
    /// Treat the name as a glob pattern.
    pub glob: bool,
}

/// The package universe: the solvable pool, the loaded repositories and the
/// policy knobs that shape every query and goal built on top.
///
/// A sack is mutated only while repositories load and policies are
/// configured; afterwards queries and goals borrow it shared. The caller
/// serialises operations, the sack is not `Sync`.
pub struct Sack {
    pool: Pool,
    arch: String,
    cachedir: Option<PathBuf>,
    rootdir: PathBuf,
    logfile: Option<PathBuf>,
    package_init: Option<PackageInit>,

    excludes: Option<PackageSet>,
    includes: Option<PackageSet>,
    considered: RefCell<Option<PackageSet>>,

    installonly: Vec<String>,
    installonly_limit: u32,

    kernel_release: Option<String>,
    running_kernel: RefCell<Option<Option<SolvableId>>>,
}

impl Sack {
    /// Builds a sack from the given options. Fails with
    /// [`Error::InvalidArchitecture`] for an unrecognised arch and
    /// [`Error::FileInvalid`] when the cache directory cannot be created.
    pub fn new(options: SackOptions) -> Result<Sack, Error> {
        let arch = options.arch.unwrap_or_else(|| "x86_64".to_string());
        if !is_valid_arch(&arch) {
            return Err(Error::InvalidArchitecture(arch));
        }
        if options.make_cache_dir {
            if let Some(cachedir) = &options.cachedir {
                fs_err::create_dir_all(cachedir).map_err(|err| Error::FileInvalid {
                    path: cachedir.clone(),
                    reason: err.to_string(),
                })?;
            }
        }
        tracing::debug!(%arch, "creating sack");
        Ok(Sack {
            pool: Pool::new(),
            arch,
            cachedir: options.cachedir,
            rootdir: options.rootdir.unwrap_or_else(|| PathBuf::from("/")),
            logfile: options.logfile,
            package_init: options.package_init,
            excludes: None,
            includes: None,
            considered: RefCell::new(None),
            installonly: Vec::new(),
            installonly_limit: 0,
            kernel_release: None,
            running_kernel: RefCell::new(None),
        })
    }

    /// The solvable pool. Queries and goals go through this.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// The configured base architecture.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// The configured cache directory.
    pub fn cachedir(&self) -> Option<&Path> {
        self.cachedir.as_deref()
    }

    /// The configured system root.
    pub fn rootdir(&self) -> &Path {
        &self.rootdir
    }

    /// The log destination the host asked for at construction.
    pub fn logfile(&self) -> Option<&Path> {
        self.logfile.as_deref()
    }

    /// Wraps a solvable id into a [`Package`] handle, running the
    /// package-init hook when one is set.
    pub fn package(&self, id: SolvableId) -> Package<'_> {
        let user_data = self.package_init.as_ref().map(|init| init(id));
        Package::new(self, id, user_data)
    }

    // --- install-only policy ---------------------------------------------

    /// Names for which several versions may stay installed concurrently.
    pub fn set_installonly(&mut self, names: &[&str]) {
        self.installonly = names.iter().map(|n| n.to_string()).collect();
    }

    /// See [`Sack::set_installonly`].
    pub fn installonly(&self) -> &[String] {
        &self.installonly
    }

    /// How many concurrent versions of an install-only name may stay; `0`
    /// disables the policy.
    pub fn set_installonly_limit(&mut self, limit: u32) {
        self.installonly_limit = limit;
    }

    /// See [`Sack::set_installonly_limit`].
    pub fn installonly_limit(&self) -> u32 {
        self.installonly_limit
    }

    // --- excludes / includes ---------------------------------------------

    /// Accumulates excluded packages; they vanish from every query that does
    /// not opt out.
    pub fn add_excludes(&mut self, set: &PackageSet) {
        match &mut self.excludes {
            Some(excludes) => excludes.union_with(set),
            None => self.excludes = Some(set.clone()),
        }
        self.considered.replace(None);
    }

    /// Accumulates included packages; when any are set, only they are
    /// considered.
    pub fn add_includes(&mut self, set: &PackageSet) {
        match &mut self.includes {
            Some(includes) => includes.union_with(set),
            None => self.includes = Some(set.clone()),
        }
        self.considered.replace(None);
    }

    /// The effective universe after excludes/includes, `None` when neither
    /// is set (everything is considered). Recomputation is lazy and
    /// idempotent.
    pub fn considered(&self) -> Option<PackageSet> {
        if self.excludes.is_none() && self.includes.is_none() {
            return None;
        }
        let mut cache = self.considered.borrow_mut();
        if cache.is_none() {
            let mut set = self.all_packages();
            if let Some(includes) = &self.includes {
                set.intersect_with(includes);
            }
            if let Some(excludes) = &self.excludes {
                set.subtract(excludes);
            }
            *cache = Some(set);
        }
        cache.clone()
    }

    /// A set holding every package of every enabled repository.
    pub fn all_packages(&self) -> PackageSet {
        let mut set = PackageSet::with_capacity(self.pool.solvable_count());
        for id in self.pool.package_ids() {
            set.insert(id);
        }
        set
    }

    // --- repository loading ----------------------------------------------

    /// Loads the installed-package state as the distinguished `@System`
    /// repository.
    pub fn load_system_repo(
        &mut self,
        state: SystemStateDocument,
        build_cache: bool,
    ) -> Result<RepoId, Error> {
        let repo_id = self.pool.add_repo(Repo::new(SYSTEM_REPO_NAME));
        self.pool.set_installed_repo(repo_id);
        let count = state.packages.len();
        for record in &state.packages {
            self.add_record(repo_id, record, true);
        }
        if build_cache {
            self.write_cache(SYSTEM_REPO_NAME, &state)?;
        }
        self.invalidate_caches();
        tracing::debug!(packages = count, "loaded system repo");
        Ok(repo_id)
    }

    /// Reads the installed-package state from a JSON document on disk.
    pub fn load_system_repo_path(
        &mut self,
        path: &Path,
        build_cache: bool,
    ) -> Result<RepoId, Error> {
        let state = read_document(path)?;
        self.load_system_repo(state, build_cache)
    }

    /// Loads a remote repository's metadata under the given name. May block
    /// on I/O when writing the cache document.
    pub fn load_repo(
        &mut self,
        name: &str,
        document: RepoDocument,
        flags: LoadRepoFlags,
    ) -> Result<RepoId, Error> {
        let mut repo = Repo::new(name);
        repo.gpgcheck = document.gpgcheck;
        if let Some(cost) = document.cost {
            repo.cost = cost;
        }
        let repo_id = self.pool.add_repo(repo);

        for record in &document.packages {
            self.add_record(repo_id, record, flags.load_filelists);
        }
        if flags.load_updateinfo {
            for advisory in &document.advisories {
                let advisory = convert_advisory(advisory);
                self.pool.repo_mut(repo_id).advisories.push(advisory);
            }
        }
        if flags.build_cache {
            self.write_cache(name, &document)?;
        }
        self.invalidate_caches();
        tracing::debug!(
            repo = name,
            packages = document.packages.len(),
            advisories = document.advisories.len(),
            "loaded repo"
        );
        Ok(repo_id)
    }

    /// Reads a remote repository's metadata from a JSON document on disk.
    pub fn load_repo_path(
        &mut self,
        name: &str,
        path: &Path,
        flags: LoadRepoFlags,
    ) -> Result<RepoId, Error> {
        let document = read_document(path)?;
        self.load_repo(name, document, flags)
    }

    /// Enables or disables a loaded repository by name.
    pub fn repo_enabled(&mut self, name: &str, enabled: bool) -> Result<(), Error> {
        let repo_id = self
            .pool
            .find_repo(name)
            .ok_or_else(|| Error::internal(format!("no repository named '{name}'")))?;
        self.pool.set_repo_enabled(repo_id, enabled);
        self.invalidate_caches();
        Ok(())
    }

    fn add_record(&mut self, repo: RepoId, record: &PackageRecord, with_files: bool) {
        let pool = &mut self.pool;
        let name = pool.intern_str(&record.name);
        let evr = pool.intern_str(record.evr());
        let arch = pool.intern_str(&record.arch);

        let mut solvable = Solvable {
            name,
            evr,
            arch,
            summary: record.summary.clone(),
            description: record.description.clone(),
            url: record.url.clone(),
            location: record.location.clone(),
            sourcerpm: record.sourcerpm.clone(),
            pkgid: record.pkgid.clone(),
            downloadsize: record.download_size,
            installsize: record.install_size,
            files: if with_files {
                record.files.clone()
            } else {
                Vec::new()
            },
            ..Solvable::default()
        };

        solvable.provides = intern_deps(pool, &record.provides);
        // The implicit self-provide `name = evr`.
        let self_evr = record.evr();
        solvable.provides.push(pool.intern_reldep(
            &record.name,
            Some((flywheel_types::ReldepOp::Eq, self_evr.as_str())),
        ));
        solvable.requires = intern_deps(pool, &record.requires);
        solvable.conflicts = intern_deps(pool, &record.conflicts);
        solvable.obsoletes = intern_deps(pool, &record.obsoletes);
        solvable.recommends = intern_deps(pool, &record.recommends);
        solvable.suggests = intern_deps(pool, &record.suggests);
        solvable.enhances = intern_deps(pool, &record.enhances);
        solvable.supplements = intern_deps(pool, &record.supplements);

        pool.add_solvable(repo, solvable);
    }

    fn write_cache<T: serde::Serialize>(&self, name: &str, document: &T) -> Result<(), Error> {
        let Some(cachedir) = &self.cachedir else {
            return Ok(());
        };
        let path = cachedir.join(format!("{}.solv.json", name.replace('/', "_")));
        let contents = serde_json::to_string(document)
            .map_err(|err| Error::internal(format!("cache serialization failed: {err}")))?;
        fs_err::write(&path, contents).map_err(|err| Error::FileInvalid {
            path,
            reason: err.to_string(),
        })
    }

    fn invalidate_caches(&mut self) {
        self.considered.replace(None);
        self.running_kernel.replace(None);
    }

    // --- lookups ---------------------------------------------------------

    /// Total EVR order between two EVR strings.
    pub fn evr_cmp(&self, a: &str, b: &str) -> Ordering {
        evr_cmp(a, b)
    }

    /// Cheap existence probe: `0` for unknown, `1` for a known package name
    /// (with a matching version, when one is given), `2` for a name that is
    /// only known as a provide.
    pub fn knows(&self, name: &str, version: Option<&str>, flags: KnowsFlags) -> u8 {
        if name.is_empty() {
            return 0;
        }
        let matches = |candidate: &str| -> bool {
            if flags.glob {
                let options = glob::MatchOptions {
                    case_sensitive: !flags.icase,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                };
                glob::Pattern::new(name)
                    .map(|pattern| pattern.matches_with(candidate, options))
                    .unwrap_or(false)
            } else if flags.icase {
                candidate.eq_ignore_ascii_case(name)
            } else {
                candidate == name
            }
        };

        for id in self.pool.package_ids() {
            if !matches(self.pool.name_of(id)) {
                continue;
            }
            match version {
                None => return 1,
                Some(version) => {
                    let evr = split_evr(self.pool.evr_of(id));
                    if evr.version == version || self.pool.evr_of(id) == version {
                        return 1;
                    }
                }
            }
        }

        if !flags.name_only && version.is_none() {
            for id in self.pool.package_ids() {
                let solvable = self.pool.solvable(id);
                for provide in &solvable.provides {
                    let dep_name = self.pool.id_to_str(self.pool.reldep(*provide).name);
                    if dep_name != self.pool.name_of(id) && matches(dep_name) {
                        return 2;
                    }
                }
            }
        }
        0
    }

    // --- running kernel --------------------------------------------------

    /// Overrides the booted kernel release normally read from
    /// `<rootdir>/proc/sys/kernel/osrelease`.
    pub fn set_running_kernel_release(&mut self, release: impl Into<String>) {
        self.kernel_release = Some(release.into());
        self.running_kernel.replace(None);
    }

    /// The installed package backing the currently booted kernel, when it
    /// can be determined. The result is cached.
    pub fn running_kernel(&self) -> Option<SolvableId> {
        let mut cache = self.running_kernel.borrow_mut();
        if cache.is_none() {
            *cache = Some(self.detect_running_kernel());
        }
        cache.unwrap_or_default()
    }

    fn detect_running_kernel(&self) -> Option<SolvableId> {
        let release = match &self.kernel_release {
            Some(release) => release.clone(),
            None => {
                let path = self.rootdir.join("proc/sys/kernel/osrelease");
                fs_err::read_to_string(path).ok()?.trim().to_string()
            }
        };
        let installed = self.pool.installed_repo()?;
        self.pool
            .repo(installed)
            .solvables
            .iter()
            .copied()
            .find(|id| {
                self.provides_kernel(*id) && {
                    let evr = self.pool.evr_of(*id);
                    let evr_arch = format!("{evr}.{}", self.pool.arch_of(*id));
                    evr_arch == release || release == evr
                }
            })
    }

    fn provides_kernel(&self, id: SolvableId) -> bool {
        if self.pool.name_of(id).starts_with("kernel") {
            return true;
        }
        self.pool.solvable(id).provides.iter().any(|provide| {
            self.pool.id_to_str(self.pool.reldep(*provide).name) == "kernel"
        })
    }
}

fn intern_deps(pool: &mut Pool, deps: &[String]) -> Vec<flywheel_solv::ReldepId> {
    deps.iter()
        .filter_map(|dep| {
            // Unparseable entries are dropped with a trace; a repo shipping
            // one is broken, not fatal.
            match parse_reldep_str(dep) {
                Ok(expr) => Some(pool.intern_reldep_expr(&expr)),
                Err(err) => {
                    tracing::warn!(%err, "skipping malformed dependency");
                    None
                }
            }
        })
        .collect()
}

fn convert_advisory(record: &AdvisoryRecord) -> Advisory {
    let kind = record
        .kind
        .as_deref()
        .and_then(|kind| kind.parse().ok())
        .unwrap_or(AdvisoryKind::Unknown);
    Advisory {
        id: record.id.clone(),
        kind,
        severity: record.severity.clone(),
        bugs: record.bugs.clone(),
        cves: record.cves.clone(),
        collection: record.collection.clone(),
    }
}

fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let contents = match fs_err::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound(path.to_path_buf()))
        }
        Err(err) => {
            return Err(Error::FileInvalid {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
        }
    };
    serde_json::from_str(&contents).map_err(|err| Error::FailedConfigParsing {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod test {
    use super::{KnowsFlags, LoadRepoFlags, Sack, SackOptions};
    use crate::metadata::{PackageRecord, RepoDocument, SystemStateDocument};

    fn record(name: &str, version: &str, release: &str, arch: &str) -> PackageRecord {
        PackageRecord {
            name: name.into(),
            version: version.into(),
            release: release.into(),
            arch: arch.into(),
            ..PackageRecord::default()
        }
    }

    fn test_sack() -> Sack {
        let mut sack = Sack::new(SackOptions::default()).unwrap();
        sack.load_system_repo(
            SystemStateDocument {
                packages: vec![record("grateful", "1.0", "1.fc100", "x86_64")],
            },
            false,
        )
        .unwrap();
        sack.load_repo(
            "main",
            RepoDocument {
                packages: vec![{
                    let mut r = record("penny-lib", "4", "1.fc100", "x86_64");
                    r.provides = vec!["penny-dep = 4".to_string()];
                    r
                }],
                ..RepoDocument::default()
            },
            LoadRepoFlags::default(),
        )
        .unwrap();
        sack
    }

    #[test]
    fn test_bad_arch() {
        let result = Sack::new(SackOptions {
            arch: Some("magic".to_string()),
            ..SackOptions::default()
        });
        assert!(matches!(result, Err(crate::Error::InvalidArchitecture(_))));
    }

    #[test]
    fn test_knows() {
        let sack = test_sack();
        assert_eq!(sack.knows("penny-lib", None, KnowsFlags::default()), 1);
        assert_eq!(
            sack.knows("penny-lib", Some("4"), KnowsFlags::default()),
            1
        );
        assert_eq!(
            sack.knows("penny-lib", Some("5"), KnowsFlags::default()),
            0
        );
        assert_eq!(sack.knows("penny-dep", None, KnowsFlags::default()), 2);
        assert_eq!(
            sack.knows(
                "penny-dep",
                None,
                KnowsFlags {
                    name_only: true,
                    ..KnowsFlags::default()
                }
            ),
            0
        );
        assert_eq!(
            sack.knows(
                "PENNY-*",
                None,
                KnowsFlags {
                    glob: true,
                    icase: true,
                    ..KnowsFlags::default()
                }
            ),
            1
        );
        assert_eq!(sack.knows("", None, KnowsFlags::default()), 0);
    }

    #[test]
    fn test_package_init_hook() {
        let mut options = SackOptions::default();
        options.package_init = Some(Box::new(|id| std::rc::Rc::new(format!("wrapped-{}", id.0))));
        let mut sack = Sack::new(options).unwrap();
        sack.load_repo(
            "main",
            crate::metadata::RepoDocument {
                packages: vec![record("flask", "2.0", "1", "noarch")],
                ..crate::metadata::RepoDocument::default()
            },
            LoadRepoFlags::default(),
        )
        .unwrap();

        let id = sack.pool().package_ids().next().unwrap();
        let package = sack.package(id);
        let wrapped = package
            .user_data()
            .and_then(|data| data.downcast_ref::<String>())
            .expect("hook ran");
        assert_eq!(wrapped, &format!("wrapped-{}", id.0));
    }

    #[test]
    fn test_running_kernel_detection() {
        let mut sack = Sack::new(SackOptions::default()).unwrap();
        sack.load_system_repo(
            SystemStateDocument {
                packages: vec![
                    record("kernel", "6.2.9", "100.fc100", "x86_64"),
                    record("kernel", "6.2.11", "200.fc100", "x86_64"),
                ],
            },
            false,
        )
        .unwrap();
        sack.set_running_kernel_release("6.2.11-200.fc100.x86_64");
        let id = sack.running_kernel().expect("kernel found");
        assert_eq!(sack.pool().evr_of(id), "6.2.11-200.fc100");
    }
}
