#![deny(missing_docs)]
//! `flywheel_types` contains data models for values commonly found within the
//! RPM packaging ecosystem. The library itself doesnt provide any solving or
//! repository functionality, it only parses and orders the data types.

mod arch;
mod evr;
mod nevra;
mod reldep;
mod subject;

pub use arch::{is_valid_arch, ARCHES};
pub use evr::{evr_cmp, rpm_vercmp, split_evr, Evr};
pub use nevra::{Nevra, NevraForm, ParseNevraError};
pub use reldep::{parse_reldep_str, ParseReldepError, ReldepExpr, ReldepOp};
pub use subject::Subject;
