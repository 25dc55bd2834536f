use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::{
    JobFlags, JobTarget, Pool, Queue, ReldepId, SolvableId, StringId, Transaction, TransactionStep,
};

/// Tunable solver behaviors, set through [`Solver::set_flag`] before
/// [`Solver::solve`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SolverFlag {
    /// Installed packages may be removed without a replacement.
    AllowUninstall,
    /// Installed packages may be replaced by a lower EVR.
    AllowDowngrade,
    /// Replacements may come from another vendor.
    AllowVendorChange,
    /// Do not drop installed packages that lost their repository.
    KeepOrphans,
    /// `FORCEBEST` jobs still honor repo priorities and policies.
    BestObeyPolicy,
    /// Obsoletes may fan out to several incoming packages (package splits).
    YumObsoletes,
    /// Do not pull in weak dependencies.
    IgnoreRecommended,
    /// Prefer keeping installed versions when choosing candidates.
    FocusInstalled,
}

/// Why the solver decided to install or erase a package.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    /// A job asked for it.
    Job,
    /// Pulled in (or pushed out) to satisfy a hard dependency.
    Dep,
    /// Pulled in through a weak dependency.
    Weakdep,
    /// Swept by a cleandeps erase.
    CleandepsErase,
}

/// A single reason the solve failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Problem {
    /// A dependency has no remaining provider.
    #[error("nothing provides {dep}{}", needed_by(.required_by))]
    NothingProvides {
        /// The unsatisfied dependency.
        dep: String,
        /// The package that needs it, when the dependency came from one.
        required_by: Option<String>,
    },
    /// A job's selection matched nothing.
    #[error("no package matches {target}")]
    NoMatchForJob {
        /// Rendered job target.
        target: String,
    },
    /// Two packages cannot coexist.
    #[error("package {package} conflicts with {conflicting}")]
    Conflict {
        /// The package whose conflict fired.
        package: String,
        /// The package it conflicts with.
        conflicting: String,
    },
}

fn needed_by(required_by: &Option<String>) -> String {
    match required_by {
        Some(pkg) => format!(" needed by {pkg}"),
        None => String::new(),
    }
}

#[derive(Debug, Default)]
struct SolverFlags {
    allow_uninstall: bool,
    allow_downgrade: bool,
    allow_vendor_change: bool,
    keep_orphans: bool,
    best_obey_policy: bool,
    yum_obsoletes: bool,
    ignore_recommended: bool,
    focus_installed: bool,
}

/// Drives dependency resolution over a [`Pool`].
///
/// The algorithm is a deterministic greedy walk: jobs are applied in queue
/// order, then the requires/obsoletes/conflicts closure of every new install
/// is resolved, always picking the highest-EVR cheapest-repo candidate.
/// After a failed solve the problems stay readable until the next call.
pub struct Solver<'pool> {
    pool: &'pool Pool,
    flags: SolverFlags,
    problems: Vec<Problem>,

    installs: BTreeMap<SolvableId, DecisionReason>,
    erases: BTreeMap<SolvableId, DecisionReason>,
    displaced_by: BTreeMap<SolvableId, SolvableId>,
    displaces: BTreeMap<SolvableId, Vec<SolvableId>>,
    multiversion: HashSet<StringId>,
    uninstall_ok: HashSet<SolvableId>,
    userinstalled: HashSet<SolvableId>,
    worklist: VecDeque<SolvableId>,
}

impl<'pool> Solver<'pool> {
    /// A fresh solver over the pool.
    pub fn new(pool: &'pool Pool) -> Solver<'pool> {
        Solver {
            pool,
            flags: SolverFlags::default(),
            problems: Vec::new(),
            installs: BTreeMap::new(),
            erases: BTreeMap::new(),
            displaced_by: BTreeMap::new(),
            displaces: BTreeMap::new(),
            multiversion: HashSet::new(),
            uninstall_ok: HashSet::new(),
            userinstalled: HashSet::new(),
            worklist: VecDeque::new(),
        }
    }

    /// Sets a behavior flag. Must happen before [`Solver::solve`].
    pub fn set_flag(&mut self, flag: SolverFlag, value: bool) {
        match flag {
            SolverFlag::AllowUninstall => self.flags.allow_uninstall = value,
            SolverFlag::AllowDowngrade => self.flags.allow_downgrade = value,
            SolverFlag::AllowVendorChange => self.flags.allow_vendor_change = value,
            SolverFlag::KeepOrphans => self.flags.keep_orphans = value,
            SolverFlag::BestObeyPolicy => self.flags.best_obey_policy = value,
            SolverFlag::YumObsoletes => self.flags.yum_obsoletes = value,
            SolverFlag::IgnoreRecommended => self.flags.ignore_recommended = value,
            SolverFlag::FocusInstalled => self.flags.focus_installed = value,
        }
    }

    /// Number of problems of the last solve.
    pub fn problem_count(&self) -> usize {
        self.problems.len()
    }

    /// The problems of the last solve.
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Renders problem `index` for humans, `None` when out of range.
    pub fn describe_problem(&self, index: usize) -> Option<String> {
        self.problems.get(index).map(Problem::to_string)
    }

    /// Why the given solvable was decided, `None` when the last solve left
    /// it alone.
    pub fn decision_reason(&self, id: SolvableId) -> Option<DecisionReason> {
        self.installs
            .get(&id)
            .or_else(|| self.erases.get(&id))
            .copied()
    }

    /// Installed packages that nothing in the post-transaction system needs:
    /// not marked userinstalled and not reachable through the requires
    /// closure of the userinstalled set and the incoming packages.
    pub fn unneeded(&self) -> Vec<SolvableId> {
        let remaining: Vec<SolvableId> = self
            .installed_ids()
            .into_iter()
            .filter(|id| !self.erases.contains_key(id))
            .collect();

        let mut needed: BTreeSet<SolvableId> = self
            .userinstalled
            .iter()
            .copied()
            .filter(|id| remaining.contains(id))
            .collect();
        let mut queue: VecDeque<SolvableId> =
            needed.iter().copied().chain(self.installs.keys().copied()).collect();

        while let Some(id) = queue.pop_front() {
            for require in &self.pool.solvable(id).requires {
                for provider in self.pool.whatprovides(*require) {
                    if remaining.contains(&provider) && needed.insert(provider) {
                        queue.push_back(provider);
                    }
                }
            }
        }

        remaining
            .into_iter()
            .filter(|id| !needed.contains(id) && !self.userinstalled.contains(id))
            .collect()
    }

    /// Solves the queued jobs. On success the transaction owns its steps and
    /// outlives the solver; on failure the problems are retained for
    /// [`Solver::describe_problem`].
    pub fn solve(&mut self, queue: &Queue) -> Result<Transaction, Vec<Problem>> {
        self.reset();

        // Policy jobs first, they change how the action jobs behave.
        for job in queue.jobs() {
            if job.flags.contains(JobFlags::MULTIVERSION) {
                for name in self.target_names(&job.target) {
                    self.multiversion.insert(name);
                }
            }
            if job.flags.contains(JobFlags::ALLOWUNINSTALL) {
                if let JobTarget::Solvable(id) = job.target {
                    self.uninstall_ok.insert(id);
                }
            }
            if job.flags.contains(JobFlags::USERINSTALLED) {
                if let JobTarget::Solvable(id) = job.target {
                    self.userinstalled.insert(id);
                }
            }
        }

        for job in queue.jobs() {
            let flags = job.flags;
            if flags.contains(JobFlags::INSTALL) {
                self.run_install(job);
            } else if flags.contains(JobFlags::ERASE) {
                self.run_erase(job);
            } else if flags.contains(JobFlags::UPDATE) {
                self.run_update(job, false);
            } else if flags.contains(JobFlags::DISTUPGRADE) {
                self.run_update(job, true);
            } else if flags.contains(JobFlags::VERIFY) {
                self.run_verify();
            }
        }

        self.resolve_closure();

        if self.problems.is_empty() {
            tracing::debug!(
                installs = self.installs.len(),
                erases = self.erases.len(),
                "solve succeeded"
            );
            Ok(self.build_transaction())
        } else {
            tracing::debug!(problems = self.problems.len(), "solve failed");
            Err(self.problems.clone())
        }
    }

    fn reset(&mut self) {
        self.problems.clear();
        self.installs.clear();
        self.erases.clear();
        self.displaced_by.clear();
        self.displaces.clear();
        self.multiversion.clear();
        self.uninstall_ok.clear();
        self.userinstalled.clear();
        self.worklist.clear();
    }

    // --- job application -------------------------------------------------

    fn run_install(&mut self, job: &crate::Job) {
        let mut candidates = self.available_candidates(&job.target, job.repo);
        self.sort_candidates(&mut candidates);
        let Some(best) = candidates.first().copied() else {
            if !job.flags.contains(JobFlags::WEAK) {
                self.problems.push(Problem::NoMatchForJob {
                    target: self.render_target(&job.target),
                });
            }
            return;
        };
        // Installing something the system already has at the best EVR is a
        // no-op; an installed lower EVR gets displaced through the install.
        let keeps_best = |id: &SolvableId| {
            self.pool.is_installed(*id)
                && !self.erases.contains_key(id)
                && self.pool.evr_cmp(*id, best) == std::cmp::Ordering::Equal
        };
        if self.pool.is_installed(best) && !self.erases.contains_key(&best) {
            return;
        }
        if candidates.iter().any(keeps_best) {
            return;
        }
        let reason = if job.flags.contains(JobFlags::WEAK) {
            DecisionReason::Weakdep
        } else {
            DecisionReason::Job
        };
        self.decide_install(best, reason);
    }

    fn run_erase(&mut self, job: &crate::Job) {
        let victims = self.installed_candidates(&job.target);
        if victims.is_empty() {
            if !job.flags.contains(JobFlags::WEAK) {
                self.problems.push(Problem::NoMatchForJob {
                    target: self.render_target(&job.target),
                });
            }
            return;
        }
        for victim in victims {
            self.decide_erase(victim, DecisionReason::Job);
            if job.flags.contains(JobFlags::CLEANDEPS) {
                self.clean_deps(victim);
            }
        }
    }

    fn run_update(&mut self, job: &crate::Job, dist: bool) {
        match &job.target {
            JobTarget::All => {
                for installed in self.installed_ids() {
                    if !self.erases.contains_key(&installed) {
                        self.update_one(installed, None, dist);
                    }
                }
            }
            target => {
                // A targeted update names available candidates; each one is
                // matched up against the installed package it would replace.
                let candidates = self.available_candidates(target, job.repo);
                let mut by_installed: BTreeMap<SolvableId, Vec<SolvableId>> = BTreeMap::new();
                for candidate in candidates {
                    let replaced = self
                        .pool
                        .what_upgrades(candidate)
                        .or_else(|| self.pool.what_downgrades(candidate));
                    if let Some(installed) = replaced {
                        by_installed.entry(installed).or_default().push(candidate);
                    }
                }
                for (installed, pool_candidates) in by_installed {
                    self.update_one(installed, Some(pool_candidates), dist);
                }
            }
        }
    }

    fn update_one(
        &mut self,
        installed: SolvableId,
        candidates: Option<Vec<SolvableId>>,
        dist: bool,
    ) {
        let name = self.pool.solvable(installed).name;
        let mut candidates = candidates.unwrap_or_else(|| {
            self.pool
                .package_ids()
                .filter(|id| {
                    !self.pool.is_installed(*id)
                        && self.pool.solvable(*id).name == name
                        && self.pool.arch_compatible(*id, installed)
                })
                .collect()
        });
        self.sort_candidates(&mut candidates);

        let chosen = candidates.into_iter().find(|candidate| {
            let cmp = self.pool.evr_cmp(*candidate, installed);
            if dist {
                cmp != std::cmp::Ordering::Equal
            } else {
                cmp == std::cmp::Ordering::Greater
                    || (self.flags.allow_downgrade && cmp == std::cmp::Ordering::Less)
            }
        });
        if let Some(candidate) = chosen {
            self.decide_install(candidate, DecisionReason::Job);
        }
    }

    fn run_verify(&mut self) {
        for installed in self.installed_ids() {
            if self.erases.contains_key(&installed) {
                continue;
            }
            for require in self.pool.solvable(installed).requires.clone() {
                if !self.dep_satisfied(require) {
                    self.problems.push(Problem::NothingProvides {
                        dep: self.pool.reldep_str(require),
                        required_by: Some(self.pool.nevra_of(installed)),
                    });
                }
            }
        }
    }

    // --- decisions -------------------------------------------------------

    fn decide_install(&mut self, id: SolvableId, reason: DecisionReason) {
        if self.installs.contains_key(&id) {
            return;
        }
        if self.pool.is_installed(id) && !self.erases.contains_key(&id) {
            return;
        }
        self.installs.insert(id, reason);
        self.worklist.push_back(id);

        // Implicit same-name obsoletion, switched off for multiversion
        // (install-only) names.
        let name = self.pool.solvable(id).name;
        if !self.multiversion.contains(&name) {
            for installed in self.installed_ids() {
                if installed != id
                    && !self.erases.contains_key(&installed)
                    && self.pool.solvable(installed).name == name
                    && self.pool.arch_compatible(installed, id)
                {
                    self.displace(installed, id);
                }
            }
        }
    }

    fn decide_erase(&mut self, id: SolvableId, reason: DecisionReason) {
        self.erases.entry(id).or_insert(reason);
    }

    fn displace(&mut self, old: SolvableId, new: SolvableId) {
        self.decide_erase(old, DecisionReason::Dep);
        self.displaced_by.insert(old, new);
        self.displaces.entry(new).or_default().push(old);
    }

    // --- closure ---------------------------------------------------------

    fn resolve_closure(&mut self) {
        while let Some(id) = self.worklist.pop_front() {
            self.apply_obsoletes(id);
            self.apply_conflicts(id);

            for require in self.pool.solvable(id).requires.clone() {
                if self.is_rpmlib_dep(require) || self.dep_satisfied(require) {
                    continue;
                }
                let mut candidates: Vec<SolvableId> = self
                    .pool
                    .whatprovides(require)
                    .into_iter()
                    .filter(|p| !self.pool.is_installed(*p) && !self.installs.contains_key(p))
                    .collect();
                self.sort_candidates(&mut candidates);
                match candidates.first() {
                    Some(best) => self.decide_install(*best, DecisionReason::Dep),
                    None => self.problems.push(Problem::NothingProvides {
                        dep: self.pool.reldep_str(require),
                        required_by: Some(self.pool.nevra_of(id)),
                    }),
                }
            }

            if self.flags.ignore_recommended {
                continue;
            }
            for recommend in self.pool.solvable(id).recommends.clone() {
                if self.dep_satisfied(recommend) {
                    continue;
                }
                let mut candidates: Vec<SolvableId> = self
                    .pool
                    .whatprovides(recommend)
                    .into_iter()
                    .filter(|p| !self.pool.is_installed(*p) && !self.installs.contains_key(p))
                    .collect();
                self.sort_candidates(&mut candidates);
                if let Some(best) = candidates.first() {
                    self.decide_install(*best, DecisionReason::Weakdep);
                }
            }
        }
    }

    fn apply_obsoletes(&mut self, id: SolvableId) {
        for obsolete in self.pool.solvable(id).obsoletes.clone() {
            for installed in self.installed_ids() {
                if installed == id || self.erases.contains_key(&installed) {
                    continue;
                }
                let hit = if self.pool.obsolete_uses_provides() {
                    self.pool
                        .solvable(installed)
                        .provides
                        .iter()
                        .any(|provide| self.pool.match_dep(*provide, obsolete))
                } else {
                    self.pool.match_nevr(installed, obsolete)
                };
                if hit {
                    self.displace(installed, id);
                }
            }
        }
    }

    fn apply_conflicts(&mut self, id: SolvableId) {
        for conflict in self.pool.solvable(id).conflicts.clone() {
            for other in self.pool.whatprovides(conflict) {
                if other == id {
                    continue;
                }
                if self.installs.contains_key(&other) {
                    self.problems.push(Problem::Conflict {
                        package: self.pool.nevra_of(id),
                        conflicting: self.pool.nevra_of(other),
                    });
                } else if self.pool.is_installed(other) && !self.erases.contains_key(&other) {
                    if self.flags.allow_uninstall || self.uninstall_ok.contains(&other) {
                        self.decide_erase(other, DecisionReason::Dep);
                    } else {
                        self.problems.push(Problem::Conflict {
                            package: self.pool.nevra_of(id),
                            conflicting: self.pool.nevra_of(other),
                        });
                    }
                }
            }
        }
    }

    fn clean_deps(&mut self, erased: SolvableId) {
        for require in self.pool.solvable(erased).requires.clone() {
            for provider in self.pool.whatprovides(require) {
                if !self.pool.is_installed(provider)
                    || self.erases.contains_key(&provider)
                    || self.userinstalled.contains(&provider)
                {
                    continue;
                }
                if !self.still_required(provider) {
                    self.decide_erase(provider, DecisionReason::CleandepsErase);
                    self.clean_deps(provider);
                }
            }
        }
    }

    fn still_required(&self, provider: SolvableId) -> bool {
        let remaining = self
            .installed_ids()
            .into_iter()
            .filter(|id| !self.erases.contains_key(id))
            .chain(self.installs.keys().copied());
        for pkg in remaining {
            if pkg == provider {
                continue;
            }
            for require in &self.pool.solvable(pkg).requires {
                if self.pool.whatprovides(*require).contains(&provider) {
                    return true;
                }
            }
        }
        false
    }

    // --- helpers ---------------------------------------------------------

    fn installed_ids(&self) -> Vec<SolvableId> {
        match self.pool.installed_repo() {
            Some(repo) => self.pool.repo(repo).solvables.clone(),
            None => Vec::new(),
        }
    }

    fn is_rpmlib_dep(&self, dep: ReldepId) -> bool {
        self.pool
            .id_to_str(self.pool.reldep(dep).name)
            .starts_with("rpmlib(")
    }

    fn dep_satisfied(&self, dep: ReldepId) -> bool {
        self.pool.whatprovides(dep).into_iter().any(|provider| {
            (self.pool.is_installed(provider) && !self.erases.contains_key(&provider))
                || self.installs.contains_key(&provider)
        })
    }

    fn available_candidates(
        &self,
        target: &JobTarget,
        repo: Option<crate::RepoId>,
    ) -> Vec<SolvableId> {
        let mut out: Vec<SolvableId> = match target {
            JobTarget::All => self.pool.package_ids().collect(),
            JobTarget::Solvable(id) => vec![*id],
            JobTarget::Name(name) => self
                .pool
                .package_ids()
                .filter(|id| self.pool.solvable(*id).name == *name)
                .collect(),
            JobTarget::Provides(reldep) => self.pool.whatprovides(*reldep),
            JobTarget::OneOf(ids) => ids.clone(),
        };
        if let Some(repo) = repo {
            out.retain(|id| self.pool.solvable(*id).repo == repo);
        }
        out
    }

    fn installed_candidates(&self, target: &JobTarget) -> Vec<SolvableId> {
        self.available_candidates(target, None)
            .into_iter()
            .filter(|id| self.pool.is_installed(*id) && !self.erases.contains_key(id))
            .collect()
    }

    fn target_names(&self, target: &JobTarget) -> Vec<StringId> {
        match target {
            JobTarget::Name(name) => vec![*name],
            JobTarget::Provides(reldep) => vec![self.pool.reldep(*reldep).name],
            JobTarget::Solvable(id) => vec![self.pool.solvable(*id).name],
            JobTarget::OneOf(ids) => ids.iter().map(|id| self.pool.solvable(*id).name).collect(),
            JobTarget::All => Vec::new(),
        }
    }

    fn render_target(&self, target: &JobTarget) -> String {
        match target {
            JobTarget::All => "all packages".to_string(),
            JobTarget::Solvable(id) => self.pool.nevra_of(*id),
            JobTarget::Name(name) => self.pool.id_to_str(*name).to_string(),
            JobTarget::Provides(reldep) => self.pool.reldep_str(*reldep),
            JobTarget::OneOf(ids) => ids
                .iter()
                .map(|id| self.pool.nevra_of(*id))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Sorts install candidates best-first: highest EVR, then cheapest repo,
    /// then lowest id.
    fn sort_candidates(&self, candidates: &mut [SolvableId]) {
        candidates.sort_by(|a, b| {
            self.pool
                .evr_cmp(*b, *a)
                .then_with(|| {
                    let cost_a = self.pool.repo(self.pool.solvable(*a).repo).cost;
                    let cost_b = self.pool.repo(self.pool.solvable(*b).repo).cost;
                    cost_a.cmp(&cost_b)
                })
                .then_with(|| a.cmp(b))
        });
    }

    fn build_transaction(&self) -> Transaction {
        let mut steps = Vec::new();
        for (id, _) in &self.erases {
            steps.push(TransactionStep {
                solvable: *id,
                is_install: false,
                displaces: Vec::new(),
                displaced_by: self.displaced_by.get(id).copied(),
            });
        }
        for (id, _) in &self.installs {
            steps.push(TransactionStep {
                solvable: *id,
                is_install: true,
                displaces: self.displaces.get(id).cloned().unwrap_or_default(),
                displaced_by: None,
            });
        }
        Transaction::new(steps)
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use flywheel_types::{ReldepExpr, ReldepOp};

    use super::{DecisionReason, Problem, Solver};
    use crate::{
        JobFlags, JobTarget, Pool, Queue, Repo, Solvable, SolvableId, StepType, TransactionMode,
        SYSTEM_REPO_NAME,
    };

    struct TestPool {
        pool: Pool,
        system: crate::RepoId,
        repo: crate::RepoId,
    }

    impl TestPool {
        fn new() -> TestPool {
            let mut pool = Pool::new();
            let system = pool.add_repo(Repo::new(SYSTEM_REPO_NAME));
            pool.set_installed_repo(system);
            let repo = pool.add_repo(Repo::new("main"));
            TestPool { pool, system, repo }
        }

        fn add(
            &mut self,
            repo: crate::RepoId,
            name: &str,
            evr: &str,
            requires: &[&str],
        ) -> SolvableId {
            let name_id = self.pool.intern_str(name);
            let evr_id = self.pool.intern_str(evr);
            let arch = self.pool.intern_str("x86_64");
            let self_provide = self.pool.intern_reldep(name, Some((ReldepOp::Eq, evr)));
            let requires = requires
                .iter()
                .map(|dep| {
                    let expr = flywheel_types::parse_reldep_str(dep).unwrap();
                    self.pool.intern_reldep_expr(&expr)
                })
                .collect();
            self.pool.add_solvable(
                repo,
                Solvable {
                    name: name_id,
                    evr: evr_id,
                    arch,
                    provides: vec![self_provide],
                    requires,
                    ..Solvable::default()
                },
            )
        }
    }

    #[test]
    fn test_install_pulls_dependencies() {
        let mut t = TestPool::new();
        let app = t.add(t.repo, "app", "1.0-1", &["lib >= 2"]);
        let lib_old = t.add(t.repo, "lib", "1.0-1", &[]);
        let lib_new = t.add(t.repo, "lib", "3.0-1", &[]);

        let mut queue = Queue::new();
        queue.push(JobFlags::INSTALL, JobTarget::Solvable(app));

        let mut solver = Solver::new(&t.pool);
        let transaction = solver.solve(&queue).expect("solvable scenario");

        assert_eq!(
            transaction.step_type(&t.pool, app, TransactionMode::SHOW_ALL),
            StepType::Install
        );
        assert_eq!(
            transaction.step_type(&t.pool, lib_new, TransactionMode::SHOW_ALL),
            StepType::Install
        );
        assert_eq!(
            transaction.step_type(&t.pool, lib_old, TransactionMode::SHOW_ALL),
            StepType::Ignore
        );
        assert_eq!(solver.decision_reason(app), Some(DecisionReason::Job));
        assert_eq!(solver.decision_reason(lib_new), Some(DecisionReason::Dep));
    }

    #[test]
    fn test_missing_dependency_is_a_problem() {
        let mut t = TestPool::new();
        let app = t.add(t.repo, "app", "1.0-1", &["nosuchlib"]);

        let mut queue = Queue::new();
        queue.push(JobFlags::INSTALL, JobTarget::Solvable(app));

        let mut solver = Solver::new(&t.pool);
        let problems = solver.solve(&queue).expect_err("unsolvable scenario");
        assert_matches!(problems.as_slice(), [Problem::NothingProvides { .. }]);
        assert!(solver
            .describe_problem(0)
            .unwrap()
            .contains("nothing provides nosuchlib"));
    }

    #[test]
    fn test_upgrade_all_displaces_installed() {
        let mut t = TestPool::new();
        let installed = t.add(t.system, "tool", "1.0-1", &[]);
        let newer = t.add(t.repo, "tool", "2.0-1", &[]);

        let mut queue = Queue::new();
        queue.push(JobFlags::UPDATE, JobTarget::All);

        let mut solver = Solver::new(&t.pool);
        let transaction = solver.solve(&queue).expect("upgrade should solve");

        let mode = TransactionMode::SHOW_ALL | TransactionMode::SHOW_OBSOLETES;
        assert_eq!(
            transaction.step_type(&t.pool, newer, mode),
            StepType::Upgrade
        );
        assert_eq!(
            transaction.step_type(&t.pool, installed, mode),
            StepType::Upgraded
        );
        assert_eq!(transaction.obs_pkg(newer), Some(installed));
    }

    #[test]
    fn test_multiversion_keeps_both() {
        let mut t = TestPool::new();
        t.add(t.system, "kernel", "5.0-1", &[]);
        let incoming = t.add(t.repo, "kernel", "6.0-1", &[]);

        let mut queue = Queue::new();
        let kernel_dep = t.pool.intern_reldep("kernel", None);
        queue.push(JobFlags::MULTIVERSION, JobTarget::Provides(kernel_dep));
        queue.push(JobFlags::INSTALL, JobTarget::Solvable(incoming));

        let mut solver = Solver::new(&t.pool);
        let transaction = solver.solve(&queue).expect("multiversion install");
        assert_eq!(transaction.removals().count(), 0);
        assert_eq!(transaction.all_obs_pkgs(incoming), &[]);
    }

    #[test]
    fn test_erase_with_cleandeps() {
        let mut t = TestPool::new();
        let app = t.add(t.system, "app", "1.0-1", &["helper"]);
        let helper = t.add(t.system, "helper", "1.0-1", &[]);
        let keeper = t.add(t.system, "keeper", "1.0-1", &[]);

        let mut queue = Queue::new();
        queue.push(
            JobFlags::ERASE | JobFlags::CLEANDEPS,
            JobTarget::Solvable(app),
        );

        let mut solver = Solver::new(&t.pool);
        let transaction = solver.solve(&queue).expect("erase should solve");

        let removed: Vec<_> = transaction.removals().collect();
        assert!(removed.contains(&app));
        assert!(removed.contains(&helper));
        assert!(!removed.contains(&keeper));
        assert_eq!(
            solver.decision_reason(helper),
            Some(DecisionReason::CleandepsErase)
        );
    }

    #[test]
    fn test_conflict_without_permission() {
        let mut t = TestPool::new();
        let incumbent = t.add(t.system, "mta-a", "1.0-1", &[]);
        let challenger = t.add(t.repo, "mta-b", "1.0-1", &[]);
        let conflict = t
            .pool
            .intern_reldep_expr(&ReldepExpr::name_only("mta-a"));
        // Retrofit the conflict; the borrow games require a fresh solvable.
        let challenger_record = {
            let mut record = t.pool.solvable(challenger).clone();
            record.conflicts = vec![conflict];
            record
        };
        let challenger = t.pool.add_solvable(t.repo, challenger_record);

        let mut queue = Queue::new();
        queue.push(JobFlags::INSTALL, JobTarget::Solvable(challenger));

        let mut solver = Solver::new(&t.pool);
        let problems = solver.solve(&queue).expect_err("conflict must fail");
        assert_matches!(problems.as_slice(), [Problem::Conflict { .. }]);

        // With allow-uninstall the incumbent is pushed out instead.
        let mut solver = Solver::new(&t.pool);
        solver.set_flag(super::SolverFlag::AllowUninstall, true);
        let transaction = solver.solve(&queue).expect("conflict resolvable now");
        assert!(transaction.removals().any(|id| id == incumbent));
    }
}
