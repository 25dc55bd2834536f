use std::fmt;

use flywheel_solv::{Job, JobFlags, JobTarget, SolvableId};
use flywheel_types::ReldepExpr;

use crate::query::{glob_matches, CmpFlags};
use crate::{Error, Sack};

/// A narrow filter bundle addressing a single logical package family for the
/// solver.
///
/// At most one value per axis; a selector is only usable once at least one
/// of the name, provides or file axes is set.
#[derive(Clone)]
pub struct Selector<'sack> {
    sack: &'sack Sack,
    name: Option<(CmpFlags, String)>,
    provides: Option<ReldepExpr>,
    file: Option<String>,
    arch: Option<String>,
    evr: Option<String>,
    reponame: Option<String>,
}

impl fmt::Debug for Selector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("name", &self.name)
            .field("provides", &self.provides)
            .field("file", &self.file)
            .field("arch", &self.arch)
            .field("evr", &self.evr)
            .field("reponame", &self.reponame)
            .finish()
    }
}

impl<'sack> Selector<'sack> {
    /// An empty selector over the sack.
    pub fn new(sack: &'sack Sack) -> Selector<'sack> {
        Selector {
            sack,
            name: None,
            provides: None,
            file: None,
            arch: None,
            evr: None,
            reponame: None,
        }
    }

    /// Sets the name axis; `cmp` may be `EQ` or `GLOB`.
    pub fn set_name(&mut self, cmp: CmpFlags, name: impl Into<String>) -> Result<&mut Self, Error> {
        if !(cmp == CmpFlags::EQ || cmp == CmpFlags::GLOB) {
            return Err(Error::BadSelector(
                "the name axis takes EQ or GLOB".to_string(),
            ));
        }
        set_once(&mut self.name, (cmp, name.into()), "name")?;
        Ok(self)
    }

    /// Sets the provides axis.
    pub fn set_provides(&mut self, provides: ReldepExpr) -> Result<&mut Self, Error> {
        set_once(&mut self.provides, provides, "provides")?;
        Ok(self)
    }

    /// Sets the file axis; the value must be an absolute path.
    pub fn set_file(&mut self, file: impl Into<String>) -> Result<&mut Self, Error> {
        let file = file.into();
        if !file.starts_with('/') {
            return Err(Error::BadSelector(format!(
                "'{file}' is not an absolute path"
            )));
        }
        set_once(&mut self.file, file, "file")?;
        Ok(self)
    }

    /// Narrows the selection to one architecture.
    pub fn set_arch(&mut self, arch: impl Into<String>) -> Result<&mut Self, Error> {
        set_once(&mut self.arch, arch.into(), "arch")?;
        Ok(self)
    }

    /// Narrows the selection to one EVR.
    pub fn set_evr(&mut self, evr: impl Into<String>) -> Result<&mut Self, Error> {
        set_once(&mut self.evr, evr.into(), "evr")?;
        Ok(self)
    }

    /// Narrows the selection to one repository.
    pub fn set_reponame(&mut self, reponame: impl Into<String>) -> Result<&mut Self, Error> {
        set_once(&mut self.reponame, reponame.into(), "reponame")?;
        Ok(self)
    }

    /// The solvables the selector currently addresses.
    pub fn matches(&self) -> Result<Vec<SolvableId>, Error> {
        let pool = self.sack.pool();
        let mut ids: Vec<SolvableId> = if let Some((cmp, name)) = &self.name {
            pool.package_ids()
                .filter(|id| {
                    let candidate = pool.name_of(*id);
                    if *cmp == CmpFlags::GLOB {
                        glob_matches(name, candidate, false)
                    } else {
                        candidate == name
                    }
                })
                .collect()
        } else if let Some(provides) = &self.provides {
            pool.whatprovides_expr(provides)
        } else if let Some(file) = &self.file {
            pool.package_ids()
                .filter(|id| pool.solvable(*id).files.iter().any(|f| f == file))
                .collect()
        } else {
            return Err(Error::BadSelector(
                "one of name, provides or file must be set".to_string(),
            ));
        };

        if let Some(arch) = &self.arch {
            ids.retain(|id| pool.arch_of(*id) == arch);
        }
        if let Some(evr) = &self.evr {
            ids.retain(|id| {
                self.sack.evr_cmp(pool.evr_of(*id), evr) == std::cmp::Ordering::Equal
            });
        }
        if let Some(reponame) = &self.reponame {
            ids.retain(|id| pool.repo(pool.solvable(*id).repo).name == *reponame);
        }
        Ok(ids)
    }

    /// Translates the selector into a solver job carrying the given action
    /// flags, with the set-axes recorded on the job.
    pub fn to_job(&self, mut flags: JobFlags) -> Result<Job, Error> {
        let ids = self.matches()?;
        if self.arch.is_some() {
            flags |= JobFlags::SETARCH;
        }
        if self.evr.is_some() {
            flags |= JobFlags::SETEVR;
        }
        let mut job = Job::new(flags, JobTarget::OneOf(ids));
        if let Some(reponame) = &self.reponame {
            job.flags |= JobFlags::SETREPO;
            job.repo = self.sack.pool().find_repo(reponame);
        }
        Ok(job)
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, axis: &str) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::BadSelector(format!("the {axis} axis is already set")));
    }
    *slot = Some(value);
    Ok(())
}
