use std::collections::{HashMap, HashSet};

use flywheel_solv::{DataIterator, DepKind, SearchFlags, SolvableAttr, SolvableId, StringId};
use itertools::Itertools;
use flywheel_types::{evr_cmp, split_evr, ReldepExpr};

use crate::{Error, Package, PackageSet, Sack};

/// Comparison bits of a filter, combined by `|`. `NOT` is always handled at
/// evaluation time by subtracting the filter's matches from the result.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CmpFlags(u32);

impl CmpFlags {
    /// Equality.
    pub const EQ: CmpFlags = CmpFlags(1 << 0);
    /// Greater-than.
    pub const GT: CmpFlags = CmpFlags(1 << 1);
    /// Less-than.
    pub const LT: CmpFlags = CmpFlags(1 << 2);
    /// Substring containment.
    pub const SUBSTR: CmpFlags = CmpFlags(1 << 3);
    /// Shell-style glob.
    pub const GLOB: CmpFlags = CmpFlags(1 << 4);
    /// Case-insensitive matching.
    pub const ICASE: CmpFlags = CmpFlags(1 << 5);
    /// Invert: subtract the matches instead of intersecting them.
    pub const NOT: CmpFlags = CmpFlags(1 << 6);
    /// Inequality, the inverted equality.
    pub const NEQ: CmpFlags = CmpFlags(Self::NOT.0 | Self::EQ.0);
    /// `>=`.
    pub const GTE: CmpFlags = CmpFlags(Self::GT.0 | Self::EQ.0);
    /// `<=`.
    pub const LTE: CmpFlags = CmpFlags(Self::LT.0 | Self::EQ.0);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: CmpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn without(self, other: CmpFlags) -> CmpFlags {
        CmpFlags(self.0 & !other.0)
    }
}

impl std::ops::BitOr for CmpFlags {
    type Output = CmpFlags;

    fn bitor(self, rhs: CmpFlags) -> CmpFlags {
        CmpFlags(self.0 | rhs.0)
    }
}

/// The attributes a query can filter on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Keyname {
    /// Package name.
    Name,
    /// Architecture.
    Arch,
    /// Epoch as a number; absent epochs count as `-1`.
    Epoch,
    /// Version part of the EVR.
    Version,
    /// Release part of the EVR.
    Release,
    /// The full EVR string, compared by the RPM rules.
    Evr,
    /// One-line summary.
    Summary,
    /// Long description.
    Description,
    /// Upstream URL.
    Url,
    /// Repository-relative location.
    Location,
    /// Source RPM file name.
    Sourcerpm,
    /// Canonical NEVRA render.
    Nevra,
    /// Owned file paths.
    File,
    /// Name of the owning repository.
    Reponame,
    /// Explicit package set membership.
    Pkg,
    /// `Provides:` entries.
    Provides,
    /// `Requires:` entries.
    Requires,
    /// `Conflicts:` entries.
    Conflicts,
    /// `Obsoletes:` entries; also accepts a package set to cross-match
    /// against.
    Obsoletes,
    /// `Recommends:` entries.
    Recommends,
    /// `Suggests:` entries.
    Suggests,
    /// `Enhances:` entries.
    Enhances,
    /// `Supplements:` entries.
    Supplements,
    /// Advisory id of an advisory shipping the package.
    AdvisoryId,
    /// Advisory kind.
    AdvisoryKind,
    /// Advisory severity.
    AdvisorySeverity,
    /// Advisory bug reference.
    AdvisoryBug,
    /// Advisory CVE reference.
    AdvisoryCve,
    /// The whole-universe sentinel used by [`Query::filter_empty`].
    All,
}

impl Keyname {
    fn dep_kind(self) -> Option<DepKind> {
        match self {
            Keyname::Provides => Some(DepKind::Provides),
            Keyname::Requires => Some(DepKind::Requires),
            Keyname::Conflicts => Some(DepKind::Conflicts),
            Keyname::Obsoletes => Some(DepKind::Obsoletes),
            Keyname::Recommends => Some(DepKind::Recommends),
            Keyname::Suggests => Some(DepKind::Suggests),
            Keyname::Enhances => Some(DepKind::Enhances),
            Keyname::Supplements => Some(DepKind::Supplements),
            _ => None,
        }
    }

    fn string_attr(self) -> Option<SolvableAttr> {
        match self {
            Keyname::Name => Some(SolvableAttr::Name),
            Keyname::Arch => Some(SolvableAttr::Arch),
            Keyname::Summary => Some(SolvableAttr::Summary),
            Keyname::Description => Some(SolvableAttr::Description),
            Keyname::Url => Some(SolvableAttr::Url),
            Keyname::File => Some(SolvableAttr::File),
            Keyname::Location => Some(SolvableAttr::Location),
            Keyname::Sourcerpm => Some(SolvableAttr::Sourcerpm),
            _ => None,
        }
    }

    fn is_advisory(self) -> bool {
        matches!(
            self,
            Keyname::AdvisoryId
                | Keyname::AdvisoryKind
                | Keyname::AdvisorySeverity
                | Keyname::AdvisoryBug
                | Keyname::AdvisoryCve
        )
    }
}

#[derive(Debug, Clone)]
enum MatchValue {
    Str(String),
    Num(i64),
    Reldep(ReldepExpr),
    PkgSet(PackageSet),
}

#[derive(Debug, Clone)]
struct Filter {
    keyname: Keyname,
    cmp: CmpFlags,
    matches: Vec<MatchValue>,
}

/// Flags fixed at query construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFlags {
    /// Evaluate against the full universe, ignoring the sack's excludes and
    /// includes.
    pub ignore_excludes: bool,
}

/// A lazily evaluated, composable filter pipeline over the solvables of a
/// sack.
///
/// Filters are staged and only folded into the result bitmap by
/// [`Query::apply`] (which [`Query::run`] and friends call for you). Staging
/// another filter after an apply resumes refinement from the current result,
/// it does not start over.
#[derive(Clone)]
pub struct Query<'sack> {
    sack: &'sack Sack,
    flags: QueryFlags,
    applied: bool,
    initialized: bool,
    result: PackageSet,
    filters: Vec<Filter>,

    downgradable: bool,
    downgrades: bool,
    updatable: bool,
    updates: bool,
    latest: bool,
    latest_per_arch: bool,
}

impl<'sack> Query<'sack> {
    /// A query over everything the sack considers.
    pub fn new(sack: &'sack Sack) -> Query<'sack> {
        Query::with_flags(sack, QueryFlags::default())
    }

    /// A query with construction flags.
    pub fn with_flags(sack: &'sack Sack, flags: QueryFlags) -> Query<'sack> {
        Query {
            sack,
            flags,
            applied: false,
            initialized: false,
            result: PackageSet::default(),
            filters: Vec::new(),
            downgradable: false,
            downgrades: false,
            updatable: false,
            updates: false,
            latest: false,
            latest_per_arch: false,
        }
    }

    /// The owning sack.
    pub fn sack(&self) -> &'sack Sack {
        self.sack
    }

    /// Whether the staged filters have been folded into the result.
    pub fn applied(&self) -> bool {
        self.applied
    }

    // --- staging ---------------------------------------------------------

    /// Stages a single-string filter.
    pub fn filter_str(
        &mut self,
        keyname: Keyname,
        cmp: CmpFlags,
        value: impl Into<String>,
    ) -> Result<&mut Self, Error> {
        let value = value.into();
        self.filter_strs(keyname, cmp, &[value.as_str()])
    }

    /// Stages a string filter; the matches OR together.
    pub fn filter_strs(
        &mut self,
        keyname: Keyname,
        cmp: CmpFlags,
        values: &[&str],
    ) -> Result<&mut Self, Error> {
        validate_str(keyname, cmp)?;
        self.stage(Filter {
            keyname,
            cmp,
            matches: values
                .iter()
                .map(|v| MatchValue::Str((*v).to_string()))
                .collect(),
        });
        Ok(self)
    }

    /// Stages a numeric filter.
    pub fn filter_num(
        &mut self,
        keyname: Keyname,
        cmp: CmpFlags,
        value: i64,
    ) -> Result<&mut Self, Error> {
        self.filter_nums(keyname, cmp, &[value])
    }

    /// Stages a numeric filter; the matches OR together.
    pub fn filter_nums(
        &mut self,
        keyname: Keyname,
        cmp: CmpFlags,
        values: &[i64],
    ) -> Result<&mut Self, Error> {
        match keyname {
            Keyname::Epoch if is_subset(cmp, CmpFlags::EQ | CmpFlags::GT | CmpFlags::LT | CmpFlags::NOT) => {}
            Keyname::All if cmp == CmpFlags::EQ && matches!(values, [-1]) => {}
            _ => return Err(bad_query(keyname, cmp, "number")),
        }
        self.stage(Filter {
            keyname,
            cmp,
            matches: values.iter().map(|v| MatchValue::Num(*v)).collect(),
        });
        Ok(self)
    }

    /// Stages a reldep filter.
    pub fn filter_reldep(
        &mut self,
        keyname: Keyname,
        value: ReldepExpr,
    ) -> Result<&mut Self, Error> {
        self.filter_reldeps(keyname, vec![value])
    }

    /// Stages a reldep filter; the matches OR together.
    pub fn filter_reldeps(
        &mut self,
        keyname: Keyname,
        values: Vec<ReldepExpr>,
    ) -> Result<&mut Self, Error> {
        if keyname.dep_kind().is_none() {
            return Err(bad_query(keyname, CmpFlags::EQ, "reldep"));
        }
        self.stage(Filter {
            keyname,
            cmp: CmpFlags::EQ,
            matches: values.into_iter().map(MatchValue::Reldep).collect(),
        });
        Ok(self)
    }

    /// Stages a package-set filter (`PKG` membership or `OBSOLETES`
    /// cross-matching).
    pub fn filter_pkgset(
        &mut self,
        keyname: Keyname,
        cmp: CmpFlags,
        set: &PackageSet,
    ) -> Result<&mut Self, Error> {
        let valid_key = matches!(keyname, Keyname::Pkg | Keyname::Obsoletes);
        if !valid_key || !(cmp == CmpFlags::EQ || cmp == CmpFlags::NEQ) {
            return Err(bad_query(keyname, cmp, "package set"));
        }
        self.stage(Filter {
            keyname,
            cmp,
            matches: vec![MatchValue::PkgSet(set.clone())],
        });
        Ok(self)
    }

    /// Forces the result to be empty, whatever else was staged.
    pub fn filter_empty(&mut self) {
        self.filter_num(Keyname::All, CmpFlags::EQ, -1)
            .expect("the sentinel shape is always valid");
    }

    fn stage(&mut self, filter: Filter) {
        self.filters.push(filter);
        self.applied = false;
    }

    // --- modifiers -------------------------------------------------------

    /// Keep only the highest EVR of every name.
    pub fn filter_latest(&mut self, value: bool) {
        self.latest = value;
        if value {
            self.latest_per_arch = false;
        }
        self.applied = false;
    }

    /// Keep only the highest EVR of every `(name, arch)` pair.
    pub fn filter_latest_per_arch(&mut self, value: bool) {
        self.latest_per_arch = value;
        if value {
            self.latest = false;
        }
        self.applied = false;
    }

    /// Keep only available packages that upgrade something installed.
    pub fn filter_upgrades(&mut self, value: bool) {
        self.updates = value;
        self.applied = false;
    }

    /// Keep only installed packages some available package upgrades.
    pub fn filter_upgradable(&mut self, value: bool) {
        self.updatable = value;
        self.applied = false;
    }

    /// Keep only available packages that downgrade something installed.
    pub fn filter_downgrades(&mut self, value: bool) {
        self.downgrades = value;
        self.applied = false;
    }

    /// Keep only installed packages some available package downgrades.
    pub fn filter_downgradable(&mut self, value: bool) {
        self.downgradable = value;
        self.applied = false;
    }

    // --- evaluation ------------------------------------------------------

    /// Folds the staged filters into the result bitmap. Idempotent; the
    /// staged filter list is consumed.
    pub fn apply(&mut self) {
        if !self.initialized {
            self.result = self.initial_set();
            self.initialized = true;
        }
        let filters = std::mem::take(&mut self.filters);
        for filter in &filters {
            let matches = self.compute_filter(filter);
            if filter.cmp.contains(CmpFlags::NOT) {
                self.result.subtract(&matches);
            } else {
                self.result.intersect_with(&matches);
            }
        }
        self.apply_modifiers();
        self.applied = true;
    }

    /// Materialises the result as package handles, in id order.
    pub fn run(&mut self) -> Vec<Package<'sack>> {
        self.apply();
        self.result.iter().map(|id| self.sack.package(id)).collect()
    }

    /// Materialises the result as a package set.
    pub fn run_set(&mut self) -> PackageSet {
        self.apply();
        self.result.clone()
    }

    /// Number of packages in the result.
    pub fn count(&mut self) -> u32 {
        self.apply();
        self.result.cardinality()
    }

    // --- set algebra -----------------------------------------------------

    /// `self ∪ other`; both sides are applied first.
    pub fn union(&mut self, mut other: Query<'sack>) {
        self.apply();
        other.apply();
        self.result.union_with(&other.result);
    }

    /// `self ∩ other`; both sides are applied first.
    pub fn intersection(&mut self, mut other: Query<'sack>) {
        self.apply();
        other.apply();
        self.result.intersect_with(&other.result);
    }

    /// `self − other`; both sides are applied first.
    pub fn difference(&mut self, mut other: Query<'sack>) {
        self.apply();
        other.apply();
        self.result.subtract(&other.result);
    }

    // --- internals -------------------------------------------------------

    fn initial_set(&self) -> PackageSet {
        let mut set = self.sack.all_packages();
        if !self.flags.ignore_excludes {
            if let Some(considered) = self.sack.considered() {
                set.intersect_with(&considered);
            }
        }
        set
    }

    fn empty_set(&self) -> PackageSet {
        PackageSet::with_capacity(self.sack.pool().solvable_count())
    }

    /// The per-filter bitmap: the union over the filter's matches of the
    /// packages each match selects.
    fn compute_filter(&self, filter: &Filter) -> PackageSet {
        let mut matches = self.empty_set();
        if let Some(attr) = filter.keyname.string_attr() {
            self.string_filter(attr, filter, &mut matches);
            return matches;
        }
        match filter.keyname {
            Keyname::Epoch => self.epoch_filter(filter, &mut matches),
            Keyname::Evr => self.evr_filter(filter, &mut matches),
            Keyname::Version => self.version_release_filter(filter, &mut matches, true),
            Keyname::Release => self.version_release_filter(filter, &mut matches, false),
            Keyname::Nevra => self.nevra_filter(filter, &mut matches),
            Keyname::Reponame => self.reponame_filter(filter, &mut matches),
            Keyname::Pkg => {
                for value in &filter.matches {
                    if let MatchValue::PkgSet(set) = value {
                        matches.union_with(set);
                    }
                }
            }
            Keyname::Obsoletes if filter.is_pkgset() => {
                self.obsoletes_set_filter(filter, &mut matches);
            }
            Keyname::Provides => self.provides_filter(filter, &mut matches),
            _ if filter.keyname.dep_kind().is_some() => self.dep_filter(filter, &mut matches),
            _ if filter.keyname.is_advisory() => self.advisory_filter(filter, &mut matches),
            Keyname::All => {
                // The `-1` sentinel selects nothing; the bitmap stays empty.
            }
            _ => {}
        }
        matches
    }

    fn string_filter(&self, attr: SolvableAttr, filter: &Filter, out: &mut PackageSet) {
        let mut search = if filter.cmp.contains(CmpFlags::GLOB) {
            SearchFlags::GLOB
        } else if filter.cmp.contains(CmpFlags::SUBSTR) {
            SearchFlags::SUBSTRING
        } else {
            SearchFlags::STRING
        };
        if filter.cmp.contains(CmpFlags::ICASE) {
            search = search | SearchFlags::NOCASE;
        }
        if attr == SolvableAttr::File {
            search = search | SearchFlags::FILES | SearchFlags::COMPLETE_FILELIST;
        }
        for value in &filter.matches {
            let MatchValue::Str(needle) = value else {
                continue;
            };
            for id in DataIterator::new(self.sack.pool(), attr, needle, search) {
                out.insert(id);
            }
        }
    }

    fn epoch_filter(&self, filter: &Filter, out: &mut PackageSet) {
        for id in self.result.iter() {
            // Absent epochs compare as -1 so they never equal an explicit 0.
            let epoch = self
                .sack
                .pool()
                .epoch_of(id)
                .map_or(-1, |epoch| epoch as i64);
            for value in &filter.matches {
                let MatchValue::Num(num) = value else { continue };
                let hit = (filter.cmp.contains(CmpFlags::EQ) && epoch == *num)
                    || (filter.cmp.contains(CmpFlags::GT) && epoch > *num)
                    || (filter.cmp.contains(CmpFlags::LT) && epoch < *num);
                if hit {
                    out.insert(id);
                }
            }
        }
    }

    fn evr_filter(&self, filter: &Filter, out: &mut PackageSet) {
        for id in self.result.iter() {
            let evr = self.sack.pool().evr_of(id);
            for value in &filter.matches {
                let MatchValue::Str(target) = value else { continue };
                if ordering_hit(filter.cmp, evr_cmp(evr, target)) {
                    out.insert(id);
                }
            }
        }
    }

    fn version_release_filter(&self, filter: &Filter, out: &mut PackageSet, version: bool) {
        for id in self.result.iter() {
            let evr = split_evr(self.sack.pool().evr_of(id));
            let part = if version {
                Some(evr.version)
            } else {
                evr.release
            };
            let Some(part) = part else { continue };
            for value in &filter.matches {
                let MatchValue::Str(target) = value else { continue };
                let hit = if filter.cmp.contains(CmpFlags::GLOB) {
                    glob_matches(target, part, false)
                } else if version {
                    // Anchoring `-0` keeps the release field out of the
                    // comparison.
                    ordering_hit(filter.cmp, evr_cmp(&format!("{part}-0"), &format!("{target}-0")))
                } else {
                    ordering_hit(filter.cmp, evr_cmp(&format!("0-{part}"), &format!("0-{target}")))
                };
                if hit {
                    out.insert(id);
                }
            }
        }
    }

    fn nevra_filter(&self, filter: &Filter, out: &mut PackageSet) {
        let icase = filter.cmp.contains(CmpFlags::ICASE);
        for id in self.result.iter() {
            let pool = self.sack.pool();
            let canonical = pool.nevra_of(id);
            // An epoch-less package also answers to its explicit `0:` form.
            let zero_epoch = (pool.epoch_of(id).is_none()).then(|| {
                let solvable = pool.solvable(id);
                format!(
                    "{}-0:{}.{}",
                    pool.id_to_str(solvable.name),
                    pool.id_to_str(solvable.evr),
                    pool.id_to_str(solvable.arch)
                )
            });
            for value in &filter.matches {
                let MatchValue::Str(target) = value else { continue };
                let hit = if filter.cmp.contains(CmpFlags::GLOB) {
                    glob_matches(target, &canonical, icase)
                        || zero_epoch
                            .as_deref()
                            .is_some_and(|render| glob_matches(target, render, icase))
                } else if icase {
                    canonical.eq_ignore_ascii_case(target)
                        || zero_epoch
                            .as_deref()
                            .is_some_and(|render| render.eq_ignore_ascii_case(target))
                } else {
                    canonical == *target || zero_epoch.as_deref() == Some(target.as_str())
                };
                if hit {
                    out.insert(id);
                }
            }
        }
    }

    fn reponame_filter(&self, filter: &Filter, out: &mut PackageSet) {
        // Match repos up front, then do a cheap table lookup per package.
        let pool = self.sack.pool();
        let matched: HashSet<flywheel_solv::RepoId> = pool
            .repos()
            .filter(|(_, repo)| {
                filter.matches.iter().any(|value| match value {
                    MatchValue::Str(name) => repo.name == *name,
                    _ => false,
                })
            })
            .map(|(id, _)| id)
            .collect();
        for id in self.result.iter() {
            if matched.contains(&pool.solvable(id).repo) {
                out.insert(id);
            }
        }
    }

    fn obsoletes_set_filter(&self, filter: &Filter, out: &mut PackageSet) {
        let pool = self.sack.pool();
        for value in &filter.matches {
            let MatchValue::PkgSet(targets) = value else {
                continue;
            };
            for id in self.result.iter() {
                let hit = pool.solvable(id).obsoletes.iter().any(|obsolete| {
                    if pool.obsolete_uses_provides() {
                        pool.whatprovides(*obsolete)
                            .into_iter()
                            .any(|provider| targets.contains(provider))
                    } else {
                        targets
                            .iter()
                            .any(|target| pool.match_nevr(target, *obsolete))
                    }
                });
                if hit {
                    out.insert(id);
                }
            }
        }
    }

    fn provides_filter(&self, filter: &Filter, out: &mut PackageSet) {
        let pool = self.sack.pool();
        for value in &filter.matches {
            match value {
                MatchValue::Reldep(expr) => {
                    for id in pool.whatprovides_expr(expr) {
                        out.insert(id);
                    }
                }
                MatchValue::Str(pattern) => {
                    // The glob string form matches provide names.
                    for id in self.result.iter() {
                        let hit = pool.solvable(id).provides.iter().any(|provide| {
                            let name = pool.id_to_str(pool.reldep(*provide).name);
                            glob_matches(pattern, name, filter.cmp.contains(CmpFlags::ICASE))
                        });
                        if hit {
                            out.insert(id);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn dep_filter(&self, filter: &Filter, out: &mut PackageSet) {
        let pool = self.sack.pool();
        let kind = filter
            .keyname
            .dep_kind()
            .expect("caller dispatched on dep_kind");
        for id in self.result.iter() {
            let deps = pool.solvable(id).dep_array(kind);
            let hit = filter.matches.iter().any(|value| match value {
                MatchValue::Reldep(expr) => {
                    deps.iter().any(|dep| pool.match_dep_expr(*dep, expr))
                }
                MatchValue::Str(pattern) => deps.iter().any(|dep| {
                    let name = pool.id_to_str(pool.reldep(*dep).name);
                    glob_matches(pattern, name, filter.cmp.contains(CmpFlags::ICASE))
                }),
                _ => false,
            });
            if hit {
                out.insert(id);
            }
        }
    }

    fn advisory_filter(&self, filter: &Filter, out: &mut PackageSet) {
        let pool = self.sack.pool();
        // Collect the NEVRAs of every matched advisory, deduped, then mark
        // the packages whose NEVRA was collected.
        let mut collected: HashSet<&str> = HashSet::new();
        for advisory_ref in pool.advisories() {
            let advisory = advisory_ref.advisory;
            let hit = filter.matches.iter().any(|value| {
                let MatchValue::Str(target) = value else {
                    return false;
                };
                match filter.keyname {
                    Keyname::AdvisoryId => advisory.id == *target,
                    Keyname::AdvisoryKind => advisory.kind.to_string() == *target,
                    Keyname::AdvisorySeverity => advisory
                        .severity
                        .as_deref()
                        .is_some_and(|severity| severity.eq_ignore_ascii_case(target)),
                    Keyname::AdvisoryBug => advisory.bugs.iter().any(|bug| bug == target),
                    Keyname::AdvisoryCve => advisory.cves.iter().any(|cve| cve == target),
                    _ => false,
                }
            });
            if hit {
                collected.extend(advisory.collection.iter().map(String::as_str));
            }
        }
        for id in self.result.iter() {
            if collected.contains(pool.nevra_of(id).as_str()) {
                out.insert(id);
            }
        }
    }

    // --- modifiers -------------------------------------------------------

    /// The fixed order: downgradable, downgrades, updatable, updates, then
    /// the latest selection.
    fn apply_modifiers(&mut self) {
        let pool = self.sack.pool();
        if self.downgradable {
            let mut keep = self.empty_set();
            for id in pool.package_ids() {
                if let Some(installed) = pool.what_downgrades(id) {
                    keep.insert(installed);
                }
            }
            self.result.intersect_with(&keep);
        }
        if self.downgrades {
            let mut keep = self.empty_set();
            for id in self.result.iter() {
                if pool.what_downgrades(id).is_some() {
                    keep.insert(id);
                }
            }
            self.result = keep;
        }
        if self.updatable {
            let mut keep = self.empty_set();
            for id in pool.package_ids() {
                if let Some(installed) = pool.what_upgrades(id) {
                    keep.insert(installed);
                }
            }
            self.result.intersect_with(&keep);
        }
        if self.updates {
            let mut keep = self.empty_set();
            for id in self.result.iter() {
                if pool.what_upgrades(id).is_some() {
                    keep.insert(id);
                }
            }
            self.result = keep;
        }
        if self.latest || self.latest_per_arch {
            self.apply_latest();
        }
    }

    fn apply_latest(&mut self) {
        let pool = self.sack.pool();
        let groups: HashMap<(StringId, Option<StringId>), Vec<SolvableId>> = self
            .result
            .iter()
            .map(|id| {
                let solvable = pool.solvable(id);
                let key = (
                    solvable.name,
                    self.latest_per_arch.then_some(solvable.arch),
                );
                (key, id)
            })
            .into_group_map();
        let mut keep = self.empty_set();
        for ids in groups.into_values() {
            // Highest EVR wins; equal EVRs fall back to the highest id.
            let best = ids
                .into_iter()
                .max_by(|a, b| pool.evr_cmp(*a, *b).then(a.cmp(b)))
                .expect("groups are never empty");
            keep.insert(best);
        }
        self.result = keep;
    }
}

impl Filter {
    fn is_pkgset(&self) -> bool {
        self.matches
            .iter()
            .all(|value| matches!(value, MatchValue::PkgSet(_)))
    }
}

fn ordering_hit(cmp: CmpFlags, ordering: std::cmp::Ordering) -> bool {
    (cmp.contains(CmpFlags::EQ) && ordering.is_eq())
        || (cmp.contains(CmpFlags::GT) && ordering.is_gt())
        || (cmp.contains(CmpFlags::LT) && ordering.is_lt())
}

pub(crate) fn glob_matches(pattern: &str, value: &str, icase: bool) -> bool {
    let options = glob::MatchOptions {
        case_sensitive: !icase,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    glob::Pattern::new(pattern)
        .map(|pattern| pattern.matches_with(value, options))
        .unwrap_or(false)
}

fn is_subset(cmp: CmpFlags, allowed: CmpFlags) -> bool {
    allowed.contains(cmp) && cmp != CmpFlags::default() && cmp.without(CmpFlags::NOT) != CmpFlags::default()
}

fn validate_str(keyname: Keyname, cmp: CmpFlags) -> Result<(), Error> {
    let plain = cmp.without(CmpFlags::ICASE).without(CmpFlags::NOT);
    let ok = match keyname {
        Keyname::Name
        | Keyname::Arch
        | Keyname::Summary
        | Keyname::Description
        | Keyname::Url
        | Keyname::File => matches!(plain, CmpFlags::EQ | CmpFlags::SUBSTR | CmpFlags::GLOB),
        Keyname::Location | Keyname::Sourcerpm | Keyname::Reponame => plain == CmpFlags::EQ,
        Keyname::Nevra => matches!(plain, CmpFlags::EQ | CmpFlags::GLOB),
        Keyname::Evr => {
            cmp.contains(CmpFlags::EQ) || cmp.contains(CmpFlags::GT) || cmp.contains(CmpFlags::LT)
        }
        Keyname::Version | Keyname::Release => {
            plain == CmpFlags::GLOB
                || cmp.contains(CmpFlags::EQ)
                || cmp.contains(CmpFlags::GT)
                || cmp.contains(CmpFlags::LT)
        }
        Keyname::AdvisoryId
        | Keyname::AdvisoryKind
        | Keyname::AdvisorySeverity
        | Keyname::AdvisoryBug
        | Keyname::AdvisoryCve => plain == CmpFlags::EQ,
        // The glob string form of the reldep keynames.
        _ if keyname.dep_kind().is_some() => plain == CmpFlags::GLOB,
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(bad_query(keyname, cmp, "string"))
    }
}

fn bad_query(keyname: Keyname, cmp: CmpFlags, shape: &str) -> Error {
    Error::BadQuery(format!(
        "keyname {keyname} does not accept a {shape} match with comparison {cmp:?}"
    ))
}
