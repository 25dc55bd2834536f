use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use flywheel_types::{evr_cmp, split_evr, ReldepExpr, ReldepOp};

use crate::{Advisory, AdvisoryRef, Reldep, ReldepId, Repo, RepoId, Solvable, SolvableId};

/// Identifies an interned string in a [`Pool`]. Id `0` is the empty string.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

/// The interning data structure shared by every other part of the library.
///
/// The pool owns all strings, reldeps, repositories and solvables. Interning
/// stores unique instances only; equal values share an id, so id equality is
/// value equality. Solvable ids are dense, id `0` means "none" and id `1` is
/// the reserved system solvable.
pub struct Pool {
    strings: Vec<String>,
    string_ids: HashMap<String, StringId>,

    reldeps: Vec<Reldep>,
    reldep_ids: HashMap<Reldep, ReldepId>,

    solvables: Vec<Solvable>,
    repos: Vec<Repo>,
    installed_repo: Option<RepoId>,

    obsolete_uses_provides: bool,

    // Lazily built provides index, invalidated by any solvable mutation.
    // Maps a provide name to (provider, provide reldep); file paths get their
    // own table since they are matched without an EVR.
    whatprovides: RefCell<Option<ProvidesIndex>>,
}

#[derive(Default)]
struct ProvidesIndex {
    by_name: HashMap<StringId, Vec<(SolvableId, ReldepId)>>,
    by_file: HashMap<String, Vec<SolvableId>>,
}

impl Default for Pool {
    fn default() -> Self {
        let mut pool = Pool {
            strings: Vec::new(),
            string_ids: HashMap::new(),
            reldeps: Vec::new(),
            reldep_ids: HashMap::new(),
            solvables: Vec::new(),
            repos: Vec::new(),
            installed_repo: None,
            obsolete_uses_provides: true,
            whatprovides: RefCell::new(None),
        };
        // Id 0: the empty string, the null reldep and the null solvable.
        pool.intern_str("");
        pool.reldeps.push(Reldep::name_only(StringId(0)));
        pool.solvables.push(Solvable::default());
        // Id 1: the system solvable.
        pool.solvables.push(Solvable::default());
        pool
    }
}

impl Pool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    // --- strings ---------------------------------------------------------

    /// Interns a string, returning the shared id.
    pub fn intern_str(&mut self, s: impl AsRef<str>) -> StringId {
        let s = s.as_ref();
        if let Some(id) = self.string_ids.get(s) {
            return *id;
        }
        let id = StringId(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.string_ids.insert(s.to_string(), id);
        id
    }

    /// Finds a previously interned string without interning it.
    pub fn find_interned_str(&self, s: impl AsRef<str>) -> Option<StringId> {
        self.string_ids.get(s.as_ref()).copied()
    }

    /// Resolves a string id.
    pub fn id_to_str(&self, id: StringId) -> &str {
        &self.strings[id.0 as usize]
    }

    // --- reldeps ---------------------------------------------------------

    /// Interns a `(name, op, evr)` triple.
    pub fn intern_reldep(
        &mut self,
        name: &str,
        constraint: Option<(ReldepOp, &str)>,
    ) -> ReldepId {
        let name = self.intern_str(name);
        let (op, evr) = match constraint {
            Some((op, evr)) => (Some(op), Some(self.intern_str(evr))),
            None => (None, None),
        };
        let reldep = Reldep { name, op, evr };
        if let Some(id) = self.reldep_ids.get(&reldep) {
            return *id;
        }
        let id = ReldepId(self.reldeps.len() as u32);
        self.reldeps.push(reldep);
        self.reldep_ids.insert(reldep, id);
        id
    }

    /// Interns a parsed dependency expression.
    pub fn intern_reldep_expr(&mut self, expr: &ReldepExpr) -> ReldepId {
        self.intern_reldep(
            &expr.name,
            expr.constraint
                .as_ref()
                .map(|(op, evr)| (*op, evr.as_str())),
        )
    }

    /// Resolves a reldep id.
    pub fn reldep(&self, id: ReldepId) -> Reldep {
        self.reldeps[id.0 as usize]
    }

    /// Renders a reldep back to its `name [OP evr]` form.
    pub fn reldep_str(&self, id: ReldepId) -> String {
        let reldep = self.reldep(id);
        match (reldep.op, reldep.evr) {
            (Some(op), Some(evr)) => format!(
                "{} {op} {}",
                self.id_to_str(reldep.name),
                self.id_to_str(evr)
            ),
            _ => self.id_to_str(reldep.name).to_string(),
        }
    }

    // --- repos -----------------------------------------------------------

    /// Registers a repository.
    pub fn add_repo(&mut self, repo: Repo) -> RepoId {
        let id = RepoId(self.repos.len() as u32);
        self.repos.push(repo);
        id
    }

    /// Looks up a repository.
    pub fn repo(&self, id: RepoId) -> &Repo {
        &self.repos[id.0 as usize]
    }

    /// Mutable repository access.
    pub fn repo_mut(&mut self, id: RepoId) -> &mut Repo {
        &mut self.repos[id.0 as usize]
    }

    /// All repositories with their ids, in registration order.
    pub fn repos(&self) -> impl Iterator<Item = (RepoId, &Repo)> {
        self.repos
            .iter()
            .enumerate()
            .map(|(i, repo)| (RepoId(i as u32), repo))
    }

    /// Enables or disables a repository. Disabled repos drop out of package
    /// iteration and the provides index.
    pub fn set_repo_enabled(&mut self, id: RepoId, enabled: bool) {
        self.repos[id.0 as usize].enabled = enabled;
        self.whatprovides.replace(None);
    }

    /// Finds a repository by its configured name.
    pub fn find_repo(&self, name: &str) -> Option<RepoId> {
        self.repos()
            .find(|(_, repo)| repo.name == name)
            .map(|(id, _)| id)
    }

    /// Marks the repository holding the installed packages.
    pub fn set_installed_repo(&mut self, id: RepoId) {
        self.installed_repo = Some(id);
    }

    /// The repository holding the installed packages, if one was loaded.
    pub fn installed_repo(&self) -> Option<RepoId> {
        self.installed_repo
    }

    /// Whether a solvable belongs to the installed repository.
    pub fn is_installed(&self, id: SolvableId) -> bool {
        self.installed_repo
            .is_some_and(|repo| self.solvable(id).repo == repo)
    }

    // --- solvables -------------------------------------------------------

    /// Adds a solvable to a repository and returns its id. Invalidates the
    /// provides index.
    pub fn add_solvable(&mut self, repo: RepoId, mut solvable: Solvable) -> SolvableId {
        let id = SolvableId(self.solvables.len() as u32);
        solvable.repo = repo;
        self.solvables.push(solvable);
        self.repos[repo.0 as usize].solvables.push(id);
        self.whatprovides.replace(None);
        id
    }

    /// Looks up a solvable.
    pub fn solvable(&self, id: SolvableId) -> &Solvable {
        &self.solvables[id.0 as usize]
    }

    /// Number of slots in the solvable table, including the two reserved
    /// ids. Useful for sizing bitmaps.
    pub fn solvable_count(&self) -> u32 {
        self.solvables.len() as u32
    }

    /// All real package ids, skipping the reserved slots and disabled repos.
    pub fn package_ids(&self) -> impl Iterator<Item = SolvableId> + '_ {
        (2..self.solvables.len() as u32).map(SolvableId).filter(|id| {
            let repo = self.solvable(*id).repo;
            self.repo(repo).enabled
        })
    }

    /// The package name of a solvable.
    pub fn name_of(&self, id: SolvableId) -> &str {
        self.id_to_str(self.solvable(id).name)
    }

    /// The EVR string of a solvable.
    pub fn evr_of(&self, id: SolvableId) -> &str {
        self.id_to_str(self.solvable(id).evr)
    }

    /// The arch of a solvable.
    pub fn arch_of(&self, id: SolvableId) -> &str {
        self.id_to_str(self.solvable(id).arch)
    }

    /// The epoch of a solvable; `None` when the EVR spells none out, which
    /// is distinct from an explicit `0`.
    pub fn epoch_of(&self, id: SolvableId) -> Option<u64> {
        split_evr(self.evr_of(id))
            .epoch
            .map(|digits| digits.parse().unwrap_or(u64::MAX))
    }

    /// Canonical `name-[epoch:]version-release.arch` render.
    pub fn nevra_of(&self, id: SolvableId) -> String {
        let solvable = self.solvable(id);
        format!(
            "{}-{}.{}",
            self.id_to_str(solvable.name),
            self.id_to_str(solvable.evr),
            self.id_to_str(solvable.arch)
        )
    }

    /// Total EVR order between two solvables.
    pub fn evr_cmp(&self, a: SolvableId, b: SolvableId) -> Ordering {
        evr_cmp(self.evr_of(a), self.evr_of(b))
    }

    // --- dependency matching ---------------------------------------------

    /// Controls whether `Obsoletes:` entries match against the provides of
    /// installed packages or only against their name and EVR.
    pub fn set_obsolete_uses_provides(&mut self, value: bool) {
        self.obsolete_uses_provides = value;
    }

    /// See [`Pool::set_obsolete_uses_provides`].
    pub fn obsolete_uses_provides(&self) -> bool {
        self.obsolete_uses_provides
    }

    /// Whether two reldeps with equal names overlap, per the RPM range rules.
    /// A side without an EVR bound overlaps everything.
    pub fn match_dep(&self, a: ReldepId, b: ReldepId) -> bool {
        let a = self.reldep(a);
        let b = self.reldep(b);
        if a.name != b.name {
            return false;
        }
        self.ranges_overlap(a, b)
    }

    fn ranges_overlap(&self, a: Reldep, b: Reldep) -> bool {
        let to_constraint = |reldep: Reldep| match (reldep.op, reldep.evr) {
            (Some(op), Some(evr)) => Some((op, self.id_to_str(evr))),
            _ => None,
        };
        constraints_overlap(to_constraint(a), to_constraint(b))
    }

    /// Like [`Pool::match_dep`] but against a parsed expression that need
    /// not be interned. Lets shared borrowers match without mutating the
    /// pool.
    pub fn match_dep_expr(&self, dep: ReldepId, expr: &ReldepExpr) -> bool {
        let dep = self.reldep(dep);
        if self.id_to_str(dep.name) != expr.name {
            return false;
        }
        let dep_constraint = match (dep.op, dep.evr) {
            (Some(op), Some(evr)) => Some((op, self.id_to_str(evr))),
            _ => None,
        };
        let expr_constraint = expr
            .constraint
            .as_ref()
            .map(|(op, evr)| (*op, evr.as_str()));
        constraints_overlap(dep_constraint, expr_constraint)
    }

    /// Like [`Pool::whatprovides`] for a parsed, un-interned expression.
    pub fn whatprovides_expr(&self, expr: &ReldepExpr) -> Vec<SolvableId> {
        self.create_whatprovides();
        let guard = self.whatprovides.borrow();
        let index = guard.as_ref().expect("index built above");

        let mut result = Vec::new();
        if let Some(name) = self.find_interned_str(&expr.name) {
            if let Some(providers) = index.by_name.get(&name) {
                for (id, provide) in providers {
                    if self.match_dep_expr(*provide, expr) {
                        result.push(*id);
                    }
                }
            }
        }
        if expr.name.starts_with('/') {
            if let Some(owners) = index.by_file.get(&expr.name) {
                result.extend(owners.iter().copied());
            }
        }
        result.sort_unstable();
        result.dedup();
        result
    }

    /// Whether a solvable's own name and EVR satisfy a reldep. This is the
    /// strict predicate used when obsoletes may not use provides.
    pub fn match_nevr(&self, id: SolvableId, reldep: ReldepId) -> bool {
        let solvable = self.solvable(id);
        let reldep = self.reldep(reldep);
        if solvable.name != reldep.name {
            return false;
        }
        match (reldep.op, reldep.evr) {
            (Some(op), Some(evr)) => op.accepts(evr_cmp(
                self.id_to_str(solvable.evr),
                self.id_to_str(evr),
            )),
            _ => true,
        }
    }

    // --- provides index --------------------------------------------------

    /// Builds the provides index now. Calling this is optional; lookups
    /// build it on demand. It only helps to front-load the cost.
    pub fn create_whatprovides(&self) {
        let mut guard = self.whatprovides.borrow_mut();
        if guard.is_none() {
            *guard = Some(self.build_provides_index());
        }
    }

    fn build_provides_index(&self) -> ProvidesIndex {
        let mut index = ProvidesIndex::default();
        for id in 2..self.solvables.len() as u32 {
            let id = SolvableId(id);
            let solvable = self.solvable(id);
            if !self.repo(solvable.repo).enabled {
                continue;
            }
            for provide in &solvable.provides {
                let name = self.reldep(*provide).name;
                index.by_name.entry(name).or_default().push((id, *provide));
            }
            for file in &solvable.files {
                index.by_file.entry(file.clone()).or_default().push(id);
            }
        }
        index
    }

    /// All solvables providing the given reldep: packages whose provides
    /// entry overlaps it, plus file list owners for absolute path names.
    pub fn whatprovides(&self, reldep: ReldepId) -> Vec<SolvableId> {
        self.create_whatprovides();
        let guard = self.whatprovides.borrow();
        let index = guard.as_ref().expect("index built above");

        let want = self.reldep(reldep);
        let mut result = Vec::new();
        if let Some(providers) = index.by_name.get(&want.name) {
            for (id, provide) in providers {
                if self.ranges_overlap(self.reldep(*provide), want) {
                    result.push(*id);
                }
            }
        }
        let name = self.id_to_str(want.name);
        if name.starts_with('/') {
            if let Some(owners) = index.by_file.get(name) {
                result.extend(owners.iter().copied());
            }
        }
        result.sort_unstable();
        result.dedup();
        result
    }

    /// The installed package the given available solvable would upgrade:
    /// same name, arch-compatible, strictly lower EVR. `None` when nothing
    /// qualifies.
    pub fn what_upgrades(&self, id: SolvableId) -> Option<SolvableId> {
        self.what_updown(id, Ordering::Greater)
    }

    /// The installed package the given available solvable would downgrade.
    pub fn what_downgrades(&self, id: SolvableId) -> Option<SolvableId> {
        self.what_updown(id, Ordering::Less)
    }

    fn what_updown(&self, id: SolvableId, direction: Ordering) -> Option<SolvableId> {
        if self.is_installed(id) {
            return None;
        }
        let installed_repo = self.installed_repo?;
        let candidate = self.solvable(id);
        self.repo(installed_repo)
            .solvables
            .iter()
            .copied()
            .find(|installed| {
                let solvable = self.solvable(*installed);
                solvable.name == candidate.name
                    && self.arch_compatible(*installed, id)
                    && self.evr_cmp(id, *installed) == direction
            })
    }

    /// Whether two solvables can replace each other arch-wise: equal arch,
    /// or either side is `noarch`.
    pub fn arch_compatible(&self, a: SolvableId, b: SolvableId) -> bool {
        let arch_a = self.arch_of(a);
        let arch_b = self.arch_of(b);
        arch_a == arch_b || arch_a == "noarch" || arch_b == "noarch"
    }

    // --- advisories ------------------------------------------------------

    /// Walks every advisory of every enabled repository.
    pub fn advisories(&self) -> impl Iterator<Item = AdvisoryRef<'_>> {
        self.repos().filter(|(_, repo)| repo.enabled).flat_map(
            |(id, repo): (RepoId, &Repo)| {
                repo.advisories.iter().map(move |advisory: &Advisory| AdvisoryRef {
                    repo: id,
                    advisory,
                })
            },
        )
    }
}

/// Whether two EVR ranges intersect, per the RPM rules. A side without a
/// bound intersects everything.
fn constraints_overlap(
    a: Option<(ReldepOp, &str)>,
    b: Option<(ReldepOp, &str)>,
) -> bool {
    let (Some((op_a, evr_a)), Some((op_b, evr_b))) = (a, b) else {
        return true;
    };
    match evr_cmp(evr_a, evr_b) {
        Ordering::Less => op_a.allows_greater() || op_b.allows_less(),
        Ordering::Greater => op_a.allows_less() || op_b.allows_greater(),
        Ordering::Equal => {
            (op_a.allows_equal() && op_b.allows_equal())
                || (op_a.allows_less() && op_b.allows_less())
                || (op_a.allows_greater() && op_b.allows_greater())
        }
    }
}

#[cfg(test)]
mod test {
    use flywheel_types::{ReldepExpr, ReldepOp};

    use super::Pool;
    use crate::{Repo, Solvable};

    fn add_pkg(pool: &mut Pool, repo: crate::RepoId, name: &str, evr: &str, arch: &str) -> crate::SolvableId {
        let name_id = pool.intern_str(name);
        let evr_id = pool.intern_str(evr);
        let arch_id = pool.intern_str(arch);
        let self_provide = pool.intern_reldep(name, Some((ReldepOp::Eq, evr)));
        pool.add_solvable(
            repo,
            Solvable {
                name: name_id,
                evr: evr_id,
                arch: arch_id,
                provides: vec![self_provide],
                ..Solvable::default()
            },
        )
    }

    #[test]
    fn test_string_interning() {
        let mut pool = Pool::new();
        let a = pool.intern_str("foobar");
        let b = pool.intern_str("foobar");
        assert_eq!(a, b);
        assert_eq!(pool.id_to_str(a), "foobar");
        assert_eq!(pool.find_interned_str("missing"), None);
    }

    #[test]
    fn test_whatprovides_ranges() {
        let mut pool = Pool::new();
        let repo = pool.add_repo(Repo::new("test"));
        let old = add_pkg(&mut pool, repo, "foo", "1.0-1", "x86_64");
        let new = add_pkg(&mut pool, repo, "foo", "2.0-1", "x86_64");

        let want = pool.intern_reldep_expr(&ReldepExpr::with_constraint("foo", ReldepOp::Ge, "1.5"));
        assert_eq!(pool.whatprovides(want), vec![new]);

        let any = pool.intern_reldep_expr(&ReldepExpr::name_only("foo"));
        assert_eq!(pool.whatprovides(any), vec![old, new]);
    }

    #[test]
    fn test_file_provides() {
        let mut pool = Pool::new();
        let repo = pool.add_repo(Repo::new("test"));
        let name_id = pool.intern_str("tar");
        let evr_id = pool.intern_str("1.34-1");
        let arch_id = pool.intern_str("x86_64");
        let id = pool.add_solvable(
            repo,
            Solvable {
                name: name_id,
                evr: evr_id,
                arch: arch_id,
                files: vec!["/usr/bin/tar".to_string()],
                ..Solvable::default()
            },
        );

        let want = pool.intern_reldep_expr(&ReldepExpr::name_only("/usr/bin/tar"));
        assert_eq!(pool.whatprovides(want), vec![id]);
    }

    #[test]
    fn test_what_upgrades() {
        let mut pool = Pool::new();
        let system = pool.add_repo(Repo::new(crate::SYSTEM_REPO_NAME));
        pool.set_installed_repo(system);
        let installed = add_pkg(&mut pool, system, "foo", "1.0-1", "x86_64");
        let repo = pool.add_repo(Repo::new("updates"));
        let newer = add_pkg(&mut pool, repo, "foo", "2.0-1", "x86_64");
        let older = add_pkg(&mut pool, repo, "foo", "0.5-1", "x86_64");

        assert_eq!(pool.what_upgrades(newer), Some(installed));
        assert_eq!(pool.what_upgrades(older), None);
        assert_eq!(pool.what_downgrades(older), Some(installed));
        assert_eq!(pool.what_downgrades(newer), None);
    }
}
