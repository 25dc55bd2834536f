#![deny(missing_docs)]
//! `flywheel` is a package-management core for RPM-based systems: a package
//! universe (the [`Sack`]) built from installed-system state and repository
//! metadata, a composable lazy [`Query`] engine over it, and a [`Goal`]
//! engine that turns user wishes into an ordered RPM transaction driven by
//! [`TransactionDriver`].
//!
//! The solvable pool and the solver live in `flywheel_solv`; parsing and
//! ordering primitives (EVR, NEVRA, subjects) live in `flywheel_types`.

mod error;
mod goal;
mod metadata;
mod package;
mod packageset;
mod query;
mod reason_store;
mod sack;
mod selector;
pub mod subject;
pub mod transaction;

pub use error::Error;
pub use flywheel_types::{Nevra, NevraForm, ReldepExpr, ReldepOp, Subject};
pub use goal::{EraseFlags, Goal, GoalActions, GoalReason, GoalRunFlags};
pub use metadata::{AdvisoryRecord, PackageRecord, RepoDocument, SystemStateDocument};
pub use package::Package;
pub use packageset::PackageSet;
pub use query::{CmpFlags, Keyname, Query, QueryFlags};
pub use reason_store::ReasonStore;
pub use sack::{KnowsFlags, LoadRepoFlags, PackageInit, Sack, SackOptions};
pub use selector::Selector;
pub use transaction::{ItemAction, TransactionDriver, TransactionFlags, TransactionItem};
