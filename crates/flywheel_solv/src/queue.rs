use crate::{ReldepId, RepoId, SolvableId, StringId};

/// Action and modifier bits of a job, combined by `|`. The select-mode of a
/// job lives in its [`JobTarget`]; these bits say what to do with the
/// selection and how.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct JobFlags(u32);

impl JobFlags {
    /// Install the best candidate of the selection.
    pub const INSTALL: JobFlags = JobFlags(1 << 0);
    /// Erase the selection.
    pub const ERASE: JobFlags = JobFlags(1 << 1);
    /// Update the installed packages the selection covers.
    pub const UPDATE: JobFlags = JobFlags(1 << 2);
    /// Sync the selection with the repositories, downgrading if needed.
    pub const DISTUPGRADE: JobFlags = JobFlags(1 << 3);
    /// Verify installed dependencies.
    pub const VERIFY: JobFlags = JobFlags(1 << 4);
    /// The job is a wish: failure to apply it is not a problem.
    pub const WEAK: JobFlags = JobFlags(1 << 5);
    /// On erase, also drop dependencies that become unneeded.
    pub const CLEANDEPS: JobFlags = JobFlags(1 << 6);
    /// Only the very best candidate is acceptable.
    pub const FORCEBEST: JobFlags = JobFlags(1 << 7);
    /// Allow multiple versions of the selection to coexist; turns off
    /// implicit same-name obsoletion.
    pub const MULTIVERSION: JobFlags = JobFlags(1 << 8);
    /// Give the solver permission to remove the selected installed package.
    pub const ALLOWUNINSTALL: JobFlags = JobFlags(1 << 9);
    /// Mark the selection as installed on user request; cleandeps will not
    /// sweep it.
    pub const USERINSTALLED: JobFlags = JobFlags(1 << 10);

    /// The selection was narrowed to an exact EVR.
    pub const SETEVR: JobFlags = JobFlags(1 << 16);
    /// The selection was narrowed to an exact arch.
    pub const SETARCH: JobFlags = JobFlags(1 << 17);
    /// The selection was narrowed to one repository.
    pub const SETREPO: JobFlags = JobFlags(1 << 18);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: JobFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The action bits only, without modifiers.
    pub fn action(self) -> JobFlags {
        JobFlags(
            self.0
                & (Self::INSTALL.0
                    | Self::ERASE.0
                    | Self::UPDATE.0
                    | Self::DISTUPGRADE.0
                    | Self::VERIFY.0
                    | Self::ALLOWUNINSTALL.0
                    | Self::MULTIVERSION.0
                    | Self::USERINSTALLED.0),
        )
    }
}

impl std::ops::BitOr for JobFlags {
    type Output = JobFlags;

    fn bitor(self, rhs: JobFlags) -> JobFlags {
        JobFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for JobFlags {
    fn bitor_assign(&mut self, rhs: JobFlags) {
        self.0 |= rhs.0;
    }
}

/// What a job operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTarget {
    /// Every package (installed for erase/verify, the whole universe for
    /// update/distupgrade).
    All,
    /// One specific solvable.
    Solvable(SolvableId),
    /// All solvables with the given name.
    Name(StringId),
    /// All solvables providing the given reldep.
    Provides(ReldepId),
    /// An explicit pre-computed selection, as produced by a selector.
    OneOf(Vec<SolvableId>),
}

/// One `(flags, target)` element of the job queue, optionally narrowed to a
/// repository for `SETREPO` selections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Action and modifier bits.
    pub flags: JobFlags,
    /// The operand.
    pub target: JobTarget,
    /// Restrict the selection to this repo (selector `reponame` axis).
    pub repo: Option<RepoId>,
}

impl Job {
    /// A job without a repo restriction.
    pub fn new(flags: JobFlags, target: JobTarget) -> Job {
        Job {
            flags,
            target,
            repo: None,
        }
    }
}

/// An ordered list of jobs handed to the solver. Insertion order is
/// preserved; the solver processes elements front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Queue {
    jobs: Vec<Job>,
}

impl Queue {
    /// An empty queue.
    pub fn new() -> Queue {
        Queue::default()
    }

    /// Pushes a `(flags, target)` pair.
    pub fn push(&mut self, flags: JobFlags, target: JobTarget) {
        self.jobs.push(Job::new(flags, target));
    }

    /// Pushes a fully specified job.
    pub fn push_job(&mut self, job: Job) {
        self.jobs.push(job);
    }

    /// The queued jobs in insertion order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Mutable access, used to mix global flags into staged elements.
    pub fn jobs_mut(&mut self) -> &mut [Job] {
        &mut self.jobs
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
