#![deny(missing_docs)]
//! `flywheel_solv` provides the solvable pool, the job queue and the
//! dependency solver that the `flywheel` core builds on. The pool interns
//! strings and relational dependencies, owns the solvable records of every
//! loaded repository and maintains the provides index; the solver consumes a
//! queue of jobs and produces a transaction of classified steps.
//!
//! The module split mirrors the classical pool/repo/queue/solver/transaction
//! decomposition of SAT-style package solvers; all storage is owned Rust.

mod data_iterator;
mod pool;
mod queue;
mod reldep;
mod repo;
mod solvable;
mod solver;
mod transaction;

pub use data_iterator::{DataIterator, SearchFlags, SolvableAttr};
pub use pool::{Pool, StringId};
pub use queue::{Job, JobFlags, JobTarget, Queue};
pub use reldep::{Reldep, ReldepId};
pub use repo::{Advisory, AdvisoryKind, AdvisoryRef, Repo, RepoId, SYSTEM_REPO_NAME};
pub use solvable::{DepKind, Solvable, SolvableId};
pub use solver::{DecisionReason, Problem, Solver, SolverFlag};
pub use transaction::{StepType, Transaction, TransactionMode, TransactionStep};
