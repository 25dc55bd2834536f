use flywheel_solv::{
    Job, JobFlags, JobTarget, Queue, Solver, SolverFlag, SolvableId, StepType, Transaction,
    TransactionMode,
};

use crate::{Error, Package, PackageSet, Sack, Selector};

/// Kinds of operations staged on a goal, recorded as a bitmask.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GoalActions(u32);

impl GoalActions {
    /// An install was staged.
    pub const INSTALL: GoalActions = GoalActions(1 << 0);
    /// An optional (weak) install was staged.
    pub const INSTALL_OPTIONAL: GoalActions = GoalActions(1 << 1);
    /// An erase was staged.
    pub const ERASE: GoalActions = GoalActions(1 << 2);
    /// A targeted upgrade was staged.
    pub const UPGRADE: GoalActions = GoalActions(1 << 3);
    /// A whole-system upgrade was staged.
    pub const UPGRADE_ALL: GoalActions = GoalActions(1 << 4);
    /// A downgrade was staged.
    pub const DOWNGRADE: GoalActions = GoalActions(1 << 5);
    /// A targeted distupgrade was staged.
    pub const DISTUPGRADE: GoalActions = GoalActions(1 << 6);
    /// A whole-system distupgrade was staged.
    pub const DISTUPGRADE_ALL: GoalActions = GoalActions(1 << 7);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: GoalActions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOrAssign for GoalActions {
    fn bitor_assign(&mut self, rhs: GoalActions) {
        self.0 |= rhs.0;
    }
}

/// Flags for [`Goal::erase`].
#[derive(Debug, Copy, Clone, Default)]
pub struct EraseFlags {
    /// Also drop dependencies that become unneeded.
    pub clean_deps: bool,
}

/// Flags for [`Goal::run`].
#[derive(Debug, Copy, Clone, Default)]
pub struct GoalRunFlags {
    /// Give the solver blanket permission to remove installed packages.
    pub allow_uninstall: bool,
    /// Insist on the very best candidate for every job.
    pub force_best: bool,
    /// Verify the dependencies of the installed system as part of the run.
    pub verify: bool,
    /// Do not pull in weak dependencies.
    pub ignore_weak_deps: bool,
}

/// Why a package ended up in the transaction, from the host's point of view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum GoalReason {
    /// The user asked for it.
    User,
    /// Dependency resolution pulled it in.
    Dep,
    /// A cleandeps sweep pushed it out.
    Clean,
    /// A weak dependency pulled it in.
    Weakdep,
}

/// A user's staged wish list plus the resolution state produced by running
/// it.
///
/// Operations stage jobs; nothing touches the solver until [`Goal::run`].
/// After a failed run the goal keeps the solver so the host can walk
/// [`Goal::describe_problem`]; after a successful one it keeps the
/// transaction for the listing accessors and the commit pipeline.
pub struct Goal<'sack> {
    sack: &'sack Sack,
    staged: Queue,
    protected: PackageSet,
    actions: GoalActions,

    solver: Option<Solver<'sack>>,
    transaction: Option<Transaction>,
    removal_of_protected: Vec<SolvableId>,
}

impl<'sack> Goal<'sack> {
    /// An empty goal over the sack.
    pub fn new(sack: &'sack Sack) -> Goal<'sack> {
        Goal {
            sack,
            staged: Queue::new(),
            protected: PackageSet::with_capacity(sack.pool().solvable_count()),
            actions: GoalActions::default(),
            solver: None,
            transaction: None,
            removal_of_protected: Vec::new(),
        }
    }

    /// The owning sack.
    pub fn sack(&self) -> &'sack Sack {
        self.sack
    }

    /// The kinds of operations staged so far.
    pub fn actions(&self) -> GoalActions {
        self.actions
    }

    // --- staging ---------------------------------------------------------

    /// Stages an install of one specific package.
    pub fn install(&mut self, package: &Package<'_>) {
        self.actions |= GoalActions::INSTALL;
        self.staged
            .push(JobFlags::INSTALL, JobTarget::Solvable(package.id()));
    }

    /// Stages an install the solver may silently skip when it cannot apply.
    pub fn install_optional(&mut self, package: &Package<'_>) {
        self.actions |= GoalActions::INSTALL_OPTIONAL;
        self.staged.push(
            JobFlags::INSTALL | JobFlags::WEAK,
            JobTarget::Solvable(package.id()),
        );
    }

    /// Stages an install through a selector.
    pub fn install_selector(&mut self, selector: &Selector<'_>) -> Result<(), Error> {
        self.actions |= GoalActions::INSTALL;
        let job = selector.to_job(JobFlags::INSTALL)?;
        self.staged.push_job(job);
        Ok(())
    }

    /// Stages an optional install through a selector; an empty selection is
    /// not a problem.
    pub fn install_optional_selector(&mut self, selector: &Selector<'_>) -> Result<(), Error> {
        self.actions |= GoalActions::INSTALL_OPTIONAL;
        let job = selector.to_job(JobFlags::INSTALL | JobFlags::WEAK)?;
        self.staged.push_job(job);
        Ok(())
    }

    /// Stages an erase.
    pub fn erase(&mut self, package: &Package<'_>, flags: EraseFlags) {
        self.actions |= GoalActions::ERASE;
        let mut job_flags = JobFlags::ERASE;
        if flags.clean_deps {
            job_flags |= JobFlags::CLEANDEPS;
        }
        self.staged
            .push(job_flags, JobTarget::Solvable(package.id()));
    }

    /// Stages an erase through a selector.
    pub fn erase_selector(
        &mut self,
        selector: &Selector<'_>,
        flags: EraseFlags,
    ) -> Result<(), Error> {
        self.actions |= GoalActions::ERASE;
        let mut job_flags = JobFlags::ERASE;
        if flags.clean_deps {
            job_flags |= JobFlags::CLEANDEPS;
        }
        let job = selector.to_job(job_flags)?;
        self.staged.push_job(job);
        Ok(())
    }

    /// Stages an upgrade of everything installed.
    pub fn upgrade_all(&mut self) {
        self.actions |= GoalActions::UPGRADE_ALL;
        self.staged.push(JobFlags::UPDATE, JobTarget::All);
    }

    /// Stages an upgrade towards one specific available package.
    pub fn upgrade(&mut self, package: &Package<'_>) {
        self.actions |= GoalActions::UPGRADE;
        self.staged
            .push(JobFlags::UPDATE, JobTarget::Solvable(package.id()));
    }

    /// Stages an upgrade towards whatever a selector addresses.
    pub fn upgrade_to_selector(&mut self, selector: &Selector<'_>) -> Result<(), Error> {
        self.actions |= GoalActions::UPGRADE;
        let job = selector.to_job(JobFlags::UPDATE)?;
        self.staged.push_job(job);
        Ok(())
    }

    /// Stages a downgrade to one specific lower-EVR package.
    pub fn downgrade_to(&mut self, package: &Package<'_>) {
        self.actions |= GoalActions::DOWNGRADE;
        self.staged
            .push(JobFlags::INSTALL, JobTarget::Solvable(package.id()));
    }

    /// Stages a distribution sync of everything installed.
    pub fn distupgrade_all(&mut self) {
        self.actions |= GoalActions::DISTUPGRADE_ALL;
        self.staged.push(JobFlags::DISTUPGRADE, JobTarget::All);
    }

    /// Stages a distribution sync of one package.
    pub fn distupgrade(&mut self, package: &Package<'_>) {
        self.actions |= GoalActions::DISTUPGRADE;
        self.staged
            .push(JobFlags::DISTUPGRADE, JobTarget::Solvable(package.id()));
    }

    /// Stages a distribution sync through a selector.
    pub fn distupgrade_selector(&mut self, selector: &Selector<'_>) -> Result<(), Error> {
        self.actions |= GoalActions::DISTUPGRADE;
        let job = selector.to_job(JobFlags::DISTUPGRADE)?;
        self.staged.push_job(job);
        Ok(())
    }

    /// Marks an installed package as wanted by the user; cleandeps and the
    /// unneeded listing will leave it alone.
    pub fn userinstalled(&mut self, package: &Package<'_>) {
        self.staged.push(
            JobFlags::USERINSTALLED,
            JobTarget::Solvable(package.id()),
        );
    }

    /// Adds packages that must never be removed by this goal. The running
    /// kernel is protected whether or not it appears here.
    pub fn add_protected(&mut self, set: &PackageSet) {
        self.protected.union_with(set);
    }

    // --- running ---------------------------------------------------------

    /// Resolves the staged jobs. On success the transaction is retained for
    /// the listing accessors; on failure the solver is retained so problems
    /// stay describable.
    pub fn run(&mut self, flags: GoalRunFlags) -> Result<(), Error> {
        self.solver = None;
        self.transaction = None;
        self.removal_of_protected.clear();

        let job = self.construct_job(&flags);
        let mut solver = Solver::new(self.sack.pool());
        solver.set_flag(SolverFlag::AllowVendorChange, true);
        solver.set_flag(SolverFlag::BestObeyPolicy, true);
        solver.set_flag(SolverFlag::YumObsoletes, true);
        if self
            .actions
            .contains(GoalActions::DISTUPGRADE_ALL)
            || self.actions.contains(GoalActions::DISTUPGRADE)
        {
            solver.set_flag(SolverFlag::KeepOrphans, true);
        }
        if self.actions.contains(GoalActions::DOWNGRADE) {
            solver.set_flag(SolverFlag::AllowDowngrade, true);
        }
        if flags.allow_uninstall {
            solver.set_flag(SolverFlag::AllowUninstall, true);
        }
        if flags.ignore_weak_deps {
            solver.set_flag(SolverFlag::IgnoreRecommended, true);
        }

        let transaction = match solver.solve(&job) {
            Ok(transaction) => transaction,
            Err(problems) => {
                let rendered = problems.iter().map(ToString::to_string).collect();
                self.solver = Some(solver);
                return Err(Error::NoSolution { problems: rendered });
            }
        };

        let transaction = match self.enforce_installonly_limit(&mut solver, &job, transaction) {
            Ok(transaction) => transaction,
            Err(err) => {
                self.solver = Some(solver);
                return Err(err);
            }
        };

        // The protected set and the running kernel must survive every
        // transaction.
        let mut protected = self.protected.clone();
        if let Some(kernel) = self.sack.running_kernel() {
            if kernel.0 < protected.capacity() {
                protected.insert(kernel);
            }
        }
        let violations: Vec<SolvableId> = transaction
            .removals()
            .filter(|id| protected.contains(*id))
            .collect();
        if !violations.is_empty() {
            let names = violations
                .iter()
                .map(|id| self.sack.pool().name_of(*id).to_string())
                .collect();
            self.removal_of_protected = violations;
            self.solver = Some(solver);
            return Err(Error::RemovalOfProtectedPkg { names });
        }

        self.solver = Some(solver);
        self.transaction = Some(transaction);
        Ok(())
    }

    /// Like [`Goal::run`], reporting every problem of a failed resolution to
    /// the callback before returning.
    pub fn run_all(
        &mut self,
        mut callback: impl FnMut(&str),
        flags: GoalRunFlags,
    ) -> Result<(), Error> {
        let result = self.run(flags);
        if result.is_err() {
            for index in 0..self.count_problems() {
                if let Some(problem) = self.describe_problem(index) {
                    callback(&problem);
                }
            }
        }
        result
    }

    fn construct_job(&self, flags: &GoalRunFlags) -> Queue {
        let mut job = self.staged.clone();

        if flags.force_best {
            for element in job.jobs_mut() {
                element.flags |= JobFlags::FORCEBEST;
            }
        }

        // Install-only names keep multiple versions; implicit obsoletion is
        // off for them.
        for name in self.sack.installonly() {
            if let Some(name_id) = self.sack.pool().find_interned_str(name) {
                job.push(JobFlags::MULTIVERSION, JobTarget::Name(name_id));
            }
        }

        // Everything installed and unprotected may be uninstalled if the
        // solution needs it.
        let kernel = self.sack.running_kernel();
        if let Some(installed_repo) = self.sack.pool().installed_repo() {
            for id in self.sack.pool().repo(installed_repo).solvables.clone() {
                if !self.protected.contains(id) && Some(id) != kernel {
                    job.push(JobFlags::ALLOWUNINSTALL, JobTarget::Solvable(id));
                }
            }
        }

        if flags.verify {
            job.push(JobFlags::VERIFY, JobTarget::All);
        }
        job
    }

    /// Enforces the install-only limit: when the solution keeps more
    /// versions of an install-only name than allowed, the oldest ones are
    /// erased through exactly one re-solve.
    fn enforce_installonly_limit(
        &self,
        solver: &mut Solver<'sack>,
        base_job: &Queue,
        transaction: Transaction,
    ) -> Result<Transaction, Error> {
        let limit = self.sack.installonly_limit() as usize;
        if limit == 0 || self.sack.installonly().is_empty() {
            return Ok(transaction);
        }

        let pool = self.sack.pool();
        let kernel = self.sack.running_kernel();
        let mut extra: Vec<Job> = Vec::new();

        for name in self.sack.installonly() {
            let Some(name_id) = pool.find_interned_str(name) else {
                continue;
            };
            // Versions the solver decided to keep or bring in.
            let mut kept: Vec<SolvableId> = pool
                .package_ids()
                .filter(|id| pool.solvable(*id).name == name_id)
                .filter(|id| {
                    let step = transaction.step_type(pool, *id, TransactionMode::SHOW_ALL);
                    if pool.is_installed(*id) {
                        step == StepType::Ignore
                    } else {
                        step != StepType::Ignore
                    }
                })
                .collect();
            if kept.len() <= limit {
                continue;
            }

            // Keep the booted kernel and anything wired to it at the front,
            // then the newest versions; the tail beyond the limit goes.
            kept.sort_by(|a, b| {
                let runs_a = Some(*a) == kernel || self.can_depend_on_kernel(*a, kernel);
                let runs_b = Some(*b) == kernel || self.can_depend_on_kernel(*b, kernel);
                runs_b
                    .cmp(&runs_a)
                    .then_with(|| pool.evr_cmp(*b, *a))
                    .then_with(|| a.cmp(b))
            });
            for (index, id) in kept.into_iter().enumerate() {
                if index < limit {
                    extra.push(Job::new(JobFlags::INSTALL, JobTarget::Solvable(id)));
                } else {
                    extra.push(Job::new(JobFlags::ERASE, JobTarget::Solvable(id)));
                    extra.push(Job::new(
                        JobFlags::ALLOWUNINSTALL,
                        JobTarget::Solvable(id),
                    ));
                }
            }
        }

        if extra.is_empty() {
            return Ok(transaction);
        }

        // Exactly one re-solve; a second failure surfaces as-is.
        let mut job = base_job.clone();
        for element in extra {
            job.push_job(element);
        }
        solver.solve(&job).map_err(|problems| Error::NoSolution {
            problems: problems.iter().map(ToString::to_string).collect(),
        })
    }

    fn can_depend_on_kernel(&self, id: SolvableId, kernel: Option<SolvableId>) -> bool {
        let Some(kernel) = kernel else {
            return false;
        };
        let pool = self.sack.pool();
        pool.solvable(id)
            .requires
            .iter()
            .any(|require| pool.whatprovides(*require).contains(&kernel))
    }

    // --- results ---------------------------------------------------------

    /// Number of problems the host can ask [`Goal::describe_problem`] about.
    pub fn count_problems(&self) -> usize {
        let solver_problems = self
            .solver
            .as_ref()
            .map_or(0, |solver| solver.problem_count());
        solver_problems + usize::from(!self.removal_of_protected.is_empty())
    }

    /// Renders problem `index`. The synthetic protected-removal problem, if
    /// any, sits behind the solver's own problems.
    pub fn describe_problem(&self, index: usize) -> Option<String> {
        let solver = self.solver.as_ref()?;
        if index < solver.problem_count() {
            return solver.describe_problem(index);
        }
        if index == solver.problem_count() && !self.removal_of_protected.is_empty() {
            let names: Vec<&str> = self
                .removal_of_protected
                .iter()
                .map(|id| self.sack.pool().name_of(*id))
                .collect();
            return Some(format!(
                "The operation would result in removing the following protected packages: {}",
                names.join(", ")
            ));
        }
        None
    }

    /// Why the solver decided on the given package.
    pub fn reason(&self, package: &Package<'_>) -> GoalReason {
        use flywheel_solv::DecisionReason;
        match self
            .solver
            .as_ref()
            .and_then(|solver| solver.decision_reason(package.id()))
        {
            Some(DecisionReason::Job) => GoalReason::User,
            Some(DecisionReason::CleandepsErase) => GoalReason::Clean,
            Some(DecisionReason::Weakdep) => GoalReason::Weakdep,
            Some(DecisionReason::Dep) | None => GoalReason::Dep,
        }
    }

    /// The solved transaction, when the last run succeeded.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    fn full_mode() -> TransactionMode {
        TransactionMode::SHOW_OBSOLETES
            | TransactionMode::CHANGE_IS_REINSTALL
            | TransactionMode::SHOW_ACTIVE
            | TransactionMode::SHOW_ALL
    }

    fn list_steps(&self, want: StepType, mode: TransactionMode) -> Vec<Package<'sack>> {
        let Some(transaction) = &self.transaction else {
            return Vec::new();
        };
        let pool = self.sack.pool();
        transaction
            .steps()
            .iter()
            .filter(|step| transaction.step_type(pool, step.solvable, mode) == want)
            .map(|step| self.sack.package(step.solvable))
            .collect()
    }

    /// Fresh installs of the solved transaction.
    pub fn list_installs(&self) -> Vec<Package<'sack>> {
        self.list_steps(StepType::Install, Self::full_mode())
    }

    /// Reinstalls of the solved transaction.
    pub fn list_reinstalls(&self) -> Vec<Package<'sack>> {
        self.list_steps(StepType::Reinstall, Self::full_mode())
    }

    /// Incoming upgrade sides of the solved transaction.
    pub fn list_upgrades(&self) -> Vec<Package<'sack>> {
        self.list_steps(StepType::Upgrade, Self::full_mode())
    }

    /// Incoming downgrade sides of the solved transaction.
    pub fn list_downgrades(&self) -> Vec<Package<'sack>> {
        self.list_steps(StepType::Downgrade, Self::full_mode())
    }

    /// Plain removals of the solved transaction.
    pub fn list_erasures(&self) -> Vec<Package<'sack>> {
        self.list_steps(StepType::Erase, Self::full_mode())
    }

    /// Installed packages pushed out by an obsoleting package.
    pub fn list_obsoleted(&self) -> Vec<Package<'sack>> {
        self.list_steps(
            StepType::Obsoleted,
            TransactionMode::SHOW_OBSOLETES | TransactionMode::CHANGE_IS_REINSTALL,
        )
    }

    /// Installed packages nothing will need once the transaction lands.
    pub fn list_unneeded(&self) -> Vec<Package<'sack>> {
        self.solver
            .as_ref()
            .map(|solver| {
                solver
                    .unneeded()
                    .into_iter()
                    .map(|id| self.sack.package(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Everything the given incoming package displaces, same-name
    /// replacements included.
    pub fn list_obsoleted_by_package(&self, package: &Package<'_>) -> Vec<Package<'sack>> {
        let Some(transaction) = &self.transaction else {
            return Vec::new();
        };
        transaction
            .all_obs_pkgs(package.id())
            .iter()
            .map(|id| self.sack.package(*id))
            .collect()
    }

    /// Renders the staged job queue for diagnostics.
    pub fn write_debug_jobs(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();
        for (index, job) in self.staged.jobs().iter().enumerate() {
            let _ = writeln!(out, "job {index}: {:?} {:?}", job.flags, job.target);
        }
        out
    }
}
