use std::cmp::Ordering;

use crate::{Pool, SolvableId};

/// View-mode bits for [`Transaction::step_type`], combined by `|`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TransactionMode(u32);

impl TransactionMode {
    /// Classify the install side of a change, not the displaced side.
    pub const SHOW_ACTIVE: TransactionMode = TransactionMode(1 << 0);
    /// Do not fold change types into their generic buckets.
    pub const SHOW_ALL: TransactionMode = TransactionMode(1 << 1);
    /// Distinguish obsoletions from plain installs and erases.
    pub const SHOW_OBSOLETES: TransactionMode = TransactionMode(1 << 2);
    /// Classify a same-EVR replacement as a reinstall.
    pub const CHANGE_IS_REINSTALL: TransactionMode = TransactionMode(1 << 3);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: TransactionMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TransactionMode {
    type Output = TransactionMode;

    fn bitor(self, rhs: TransactionMode) -> TransactionMode {
        TransactionMode(self.0 | rhs.0)
    }
}

/// The classified meaning of a transaction step under some view mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StepType {
    /// Nothing visible under the requested mode.
    Ignore,
    /// A new package comes in, nothing leaves.
    Install,
    /// A package is replaced by the same NEVRA.
    Reinstall,
    /// A package is replaced by a higher EVR of itself.
    Upgrade,
    /// A package is replaced by a lower EVR of itself.
    Downgrade,
    /// A new package displaces a differently named installed one.
    Obsoletes,
    /// An installed package leaves without replacement.
    Erase,
    /// The displaced side of an upgrade.
    Upgraded,
    /// The displaced side of a downgrade.
    Downgraded,
    /// The displaced side of a reinstall.
    Reinstalled,
    /// The displaced side of an obsoletion.
    Obsoleted,
}

/// One step of a solved transaction.
#[derive(Debug, Clone)]
pub struct TransactionStep {
    /// The solvable this step is about.
    pub solvable: SolvableId,
    /// True for the incoming side, false for a removal.
    pub is_install: bool,
    /// For installs: the installed packages this one displaces.
    pub displaces: Vec<SolvableId>,
    /// For removals: the incoming package that displaces this one.
    pub displaced_by: Option<SolvableId>,
}

/// An ordered list of steps produced by a successful solve. Removals come
/// before the installs that displace them; unrelated steps keep decision
/// order.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    steps: Vec<TransactionStep>,
}

impl Transaction {
    /// Wraps the given steps.
    pub fn new(steps: Vec<TransactionStep>) -> Transaction {
        Transaction { steps }
    }

    /// All steps in order.
    pub fn steps(&self) -> &[TransactionStep] {
        &self.steps
    }

    /// True when the solve decided on no change at all.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn step(&self, id: SolvableId) -> Option<&TransactionStep> {
        self.steps.iter().find(|step| step.solvable == id)
    }

    /// Every solvable that leaves the system, displaced or not.
    pub fn removals(&self) -> impl Iterator<Item = SolvableId> + '_ {
        self.steps
            .iter()
            .filter(|step| !step.is_install)
            .map(|step| step.solvable)
    }

    /// The first package the given incoming solvable displaces.
    pub fn obs_pkg(&self, id: SolvableId) -> Option<SolvableId> {
        self.all_obs_pkgs(id).first().copied()
    }

    /// Every package the given incoming solvable displaces, same-name
    /// replacements included.
    pub fn all_obs_pkgs(&self, id: SolvableId) -> &[SolvableId] {
        self.step(id)
            .filter(|step| step.is_install)
            .map(|step| step.displaces.as_slice())
            .unwrap_or(&[])
    }

    /// Classifies the step for `id` under the given view mode. Returns
    /// [`StepType::Ignore`] for solvables the transaction does not touch.
    pub fn step_type(&self, pool: &Pool, id: SolvableId, mode: TransactionMode) -> StepType {
        let Some(step) = self.step(id) else {
            return StepType::Ignore;
        };
        if step.is_install {
            self.classify_install(pool, step, mode)
        } else {
            self.classify_removal(pool, step, mode)
        }
    }

    fn classify_install(
        &self,
        pool: &Pool,
        step: &TransactionStep,
        mode: TransactionMode,
    ) -> StepType {
        // Prefer the same-name predecessor when there is one; extra
        // obsoletion victims do not change the step class.
        let same_name = step
            .displaces
            .iter()
            .copied()
            .find(|old| pool.solvable(*old).name == pool.solvable(step.solvable).name);
        match (same_name, step.displaces.first().copied()) {
            (Some(old), _) => match pool.evr_cmp(step.solvable, old) {
                Ordering::Greater => StepType::Upgrade,
                Ordering::Less => StepType::Downgrade,
                Ordering::Equal => {
                    if mode.contains(TransactionMode::CHANGE_IS_REINSTALL) {
                        StepType::Reinstall
                    } else {
                        StepType::Install
                    }
                }
            },
            (None, Some(_)) => {
                if mode.contains(TransactionMode::SHOW_OBSOLETES) {
                    StepType::Obsoletes
                } else {
                    StepType::Install
                }
            }
            (None, None) => StepType::Install,
        }
    }

    fn classify_removal(
        &self,
        pool: &Pool,
        step: &TransactionStep,
        mode: TransactionMode,
    ) -> StepType {
        let Some(new) = step.displaced_by else {
            return StepType::Erase;
        };
        if pool.solvable(new).name == pool.solvable(step.solvable).name {
            match pool.evr_cmp(new, step.solvable) {
                Ordering::Greater => StepType::Upgraded,
                Ordering::Less => StepType::Downgraded,
                Ordering::Equal => {
                    if mode.contains(TransactionMode::CHANGE_IS_REINSTALL) {
                        StepType::Reinstalled
                    } else {
                        StepType::Erase
                    }
                }
            }
        } else if mode.contains(TransactionMode::SHOW_OBSOLETES) {
            StepType::Obsoleted
        } else {
            StepType::Erase
        }
    }
}
