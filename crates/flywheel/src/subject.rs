//! Binding of free-form subjects to a concrete sack: try the readings in
//! order and keep the first one the sack can actually resolve.

use flywheel_types::{Nevra, Subject};

use crate::query::CmpFlags;
use crate::sack::KnowsFlags;
use crate::{Error, Sack, Selector};

/// The first NEVRA reading of `subject` whose name (and version, when the
/// reading has one) exists in the sack.
pub fn best_nevra(sack: &Sack, subject: &Subject) -> Option<Nevra> {
    subject.nevra_possibilities().find(|nevra| {
        sack.knows(
            &nevra.name,
            nevra.version.as_deref(),
            KnowsFlags {
                name_only: true,
                ..KnowsFlags::default()
            },
        ) == 1
    })
}

/// Resolves a subject into a selector: the best NEVRA reading first, the
/// reldep reading as a fallback. `PackageNotFound` when no reading matches
/// anything in the sack.
pub fn best_selector<'sack>(
    sack: &'sack Sack,
    subject: &Subject,
) -> Result<Selector<'sack>, Error> {
    if let Some(nevra) = best_nevra(sack, subject) {
        let mut selector = Selector::new(sack);
        selector.set_name(CmpFlags::EQ, &nevra.name)?;
        if nevra.version.is_some() {
            selector.set_evr(nevra.evr())?;
        }
        if let Some(arch) = &nevra.arch {
            selector.set_arch(arch)?;
        }
        return Ok(selector);
    }

    if let Some(reldep) = subject.reldep_possibility() {
        if sack.knows(&reldep.name, None, KnowsFlags::default()) != 0 {
            let mut selector = Selector::new(sack);
            selector.set_provides(reldep)?;
            return Ok(selector);
        }
    }

    Err(Error::PackageNotFound(subject.pattern().to_string()))
}
