//! The interface contract to the external RPM runtime and keyring. The core
//! drives these traits; real bindings and the in-memory test double both
//! live behind them.

use std::path::{Path, PathBuf};

use crate::Error;

/// Problems the runtime should tolerate instead of failing the transaction.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RpmProblemFilter(u32);

impl RpmProblemFilter {
    /// Tolerate reinstalling an identical package.
    pub const REPLACEPKG: RpmProblemFilter = RpmProblemFilter(1 << 0);
    /// Tolerate replacing a package with an older version.
    pub const OLDPACKAGE: RpmProblemFilter = RpmProblemFilter(1 << 1);
    /// Skip the disk-space check.
    pub const DISKSPACE: RpmProblemFilter = RpmProblemFilter(1 << 2);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: RpmProblemFilter) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOrAssign for RpmProblemFilter {
    fn bitor_assign(&mut self, rhs: RpmProblemFilter) {
        self.0 |= rhs.0;
    }
}

/// Flags for a runtime run.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RpmTransFlags {
    /// Go through the motions without touching the disk.
    pub test: bool,
    /// Do not install documentation files.
    pub nodocs: bool,
}

/// Progress events the runtime reports while running a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpmEvent {
    /// The transaction started.
    TransStart {
        /// Number of elements.
        total: u64,
    },
    /// Transaction preparation progress.
    TransProgress {
        /// Elements prepared so far.
        amount: u64,
        /// Number of elements.
        total: u64,
    },
    /// Preparation finished.
    TransStop,
    /// A package install began.
    InstStart {
        /// The package being installed.
        nevra: String,
    },
    /// Install progress for one package.
    InstProgress {
        /// The package being installed.
        nevra: String,
        /// Bytes written so far.
        amount: u64,
        /// Total bytes.
        total: u64,
    },
    /// A package install finished.
    InstStop {
        /// The installed package.
        nevra: String,
    },
    /// A package removal began.
    UninstStart {
        /// The package being removed.
        nevra: String,
    },
    /// A package removal finished.
    UninstStop {
        /// The removed package.
        nevra: String,
    },
}

/// The external RPM runtime: add elements, order, run.
pub trait RpmRuntime {
    /// Points the runtime at the installed system's root.
    fn set_root(&mut self, root: &Path) -> Result<(), Error>;

    /// Queues a package file for installation.
    fn add_install(
        &mut self,
        path: &Path,
        nevra: &str,
        is_upgrade: bool,
        allow_untrusted: bool,
    ) -> Result<(), Error>;

    /// Queues an installed package for removal.
    fn add_remove(&mut self, nevra: &str) -> Result<(), Error>;

    /// Orders the queued elements.
    fn order(&mut self) -> Result<(), Error>;

    /// Runs the transaction, reporting progress through the callback.
    /// Returns the problems the problem filter did not suppress.
    fn run(
        &mut self,
        flags: RpmTransFlags,
        problems_filter: RpmProblemFilter,
        callback: &mut dyn FnMut(RpmEvent),
    ) -> Result<Vec<String>, Error>;
}

/// The external signature checker.
pub trait Keyring {
    /// Checks a package file; `Err` carries the verdict.
    fn verify(&self, path: &Path) -> Result<(), String>;
}

/// A keyring that trusts everything. Useful for hosts that check signatures
/// elsewhere and for tests.
#[derive(Debug, Default)]
pub struct NullKeyring;

impl Keyring for NullKeyring {
    fn verify(&self, _path: &Path) -> Result<(), String> {
        Ok(())
    }
}

/// A keyring that rejects a fixed set of paths, for exercising the
/// trust-check policy.
#[derive(Debug, Default)]
pub struct DenylistKeyring {
    /// Paths to reject.
    pub bad: Vec<PathBuf>,
}

impl Keyring for DenylistKeyring {
    fn verify(&self, path: &Path) -> Result<(), String> {
        if self.bad.iter().any(|bad| bad == path) {
            Err("signature does not verify".to_string())
        } else {
            Ok(())
        }
    }
}

/// Everything a [`RecordingRuntime`] observed.
#[derive(Debug, Default)]
pub struct RecordingState {
    /// The root the driver configured.
    pub root: Option<PathBuf>,
    /// Queued installs as `(path, nevra, is_upgrade, allow_untrusted)`.
    pub installs: Vec<(PathBuf, String, bool, bool)>,
    /// Queued removals.
    pub removals: Vec<String>,
    /// Whether `order` ran.
    pub ordered: bool,
    /// Flags of every `run` call, in order.
    pub runs: Vec<(RpmTransFlags, RpmProblemFilter)>,
    /// Problems to report from the next `run` call.
    pub problems: Vec<String>,
}

/// An in-memory runtime that records every call and synthesizes progress
/// events, standing in for librpm in tests and dry-run hosts. The state is
/// shared so callers keep a view after handing the runtime to a driver.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    /// The shared observation log.
    pub state: std::rc::Rc<std::cell::RefCell<RecordingState>>,
}

impl RecordingRuntime {
    /// A fresh runtime plus the shared handle onto its state.
    pub fn new() -> (RecordingRuntime, std::rc::Rc<std::cell::RefCell<RecordingState>>) {
        let runtime = RecordingRuntime::default();
        let state = std::rc::Rc::clone(&runtime.state);
        (runtime, state)
    }
}

impl RpmRuntime for RecordingRuntime {
    fn set_root(&mut self, root: &Path) -> Result<(), Error> {
        self.state.borrow_mut().root = Some(root.to_path_buf());
        Ok(())
    }

    fn add_install(
        &mut self,
        path: &Path,
        nevra: &str,
        is_upgrade: bool,
        allow_untrusted: bool,
    ) -> Result<(), Error> {
        self.state.borrow_mut().installs.push((
            path.to_path_buf(),
            nevra.to_string(),
            is_upgrade,
            allow_untrusted,
        ));
        Ok(())
    }

    fn add_remove(&mut self, nevra: &str) -> Result<(), Error> {
        self.state.borrow_mut().removals.push(nevra.to_string());
        Ok(())
    }

    fn order(&mut self) -> Result<(), Error> {
        self.state.borrow_mut().ordered = true;
        Ok(())
    }

    fn run(
        &mut self,
        flags: RpmTransFlags,
        problems_filter: RpmProblemFilter,
        callback: &mut dyn FnMut(RpmEvent),
    ) -> Result<Vec<String>, Error> {
        let (installs, removals) = {
            let mut state = self.state.borrow_mut();
            state.runs.push((flags, problems_filter));
            if !state.problems.is_empty() {
                return Ok(std::mem::take(&mut state.problems));
            }
            (state.installs.clone(), state.removals.clone())
        };

        let total = (installs.len() + removals.len()) as u64;
        callback(RpmEvent::TransStart { total });
        for prepared in 0..=total {
            callback(RpmEvent::TransProgress {
                amount: prepared,
                total,
            });
        }
        callback(RpmEvent::TransStop);

        for (_, nevra, _, _) in &installs {
            callback(RpmEvent::InstStart {
                nevra: nevra.clone(),
            });
            callback(RpmEvent::InstProgress {
                nevra: nevra.clone(),
                amount: 1024,
                total: 1024,
            });
            callback(RpmEvent::InstStop {
                nevra: nevra.clone(),
            });
        }
        for nevra in &removals {
            callback(RpmEvent::UninstStart {
                nevra: nevra.clone(),
            });
            callback(RpmEvent::UninstStop {
                nevra: nevra.clone(),
            });
        }
        Ok(Vec::new())
    }
}
