use std::fmt;

use lazy_regex::{regex, Lazy, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The five decreasingly strict shapes a package token can be read as.
///
/// The order of the variants is the order in which a free-form string is
/// tried: the most explicit reading first, the bare name last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum NevraForm {
    /// `name-[epoch:]version-release.arch`
    #[strum(serialize = "nevra")]
    Nevra,
    /// `name-[epoch:]version-release`
    #[strum(serialize = "nevr")]
    Nevr,
    /// `name-[epoch:]version`
    #[strum(serialize = "nev")]
    Nev,
    /// `name.arch`
    #[strum(serialize = "na")]
    Na,
    /// `name`
    #[strum(serialize = "name")]
    Name,
}

impl NevraForm {
    /// All forms, in the order a subject tries them.
    pub const FORMS: [NevraForm; 5] = [
        NevraForm::Nevra,
        NevraForm::Nevr,
        NevraForm::Nev,
        NevraForm::Na,
        NevraForm::Name,
    ];

    fn regex(self) -> &'static Lazy<Regex> {
        match self {
            NevraForm::Nevra => regex!(r"^([^:]+)-(?:(\d+):)?([^-:]+)-([^-:]+)\.([^-:.]+)$"),
            NevraForm::Nevr => regex!(r"^([^:]+)-(?:(\d+):)?([^-:]+)-([^-:]+)$"),
            NevraForm::Nev => regex!(r"^([^:]+)-(?:(\d+):)?([^-:]+)$"),
            NevraForm::Na => regex!(r"^([^:]+)\.([^-:.]+)$"),
            NevraForm::Name => regex!(r"^([^:]+)$"),
        }
    }
}

/// A possibly partial Name-Epoch-Version-Release-Arch reading of a package
/// token. Which fields are present depends on the [`NevraForm`] the token was
/// parsed with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nevra {
    /// The package name.
    pub name: String,
    /// The epoch, when the token spelled one out. `None` is distinct from an
    /// explicit `0`.
    pub epoch: Option<u64>,
    /// The version, absent for the `NA` and `Name` forms.
    pub version: Option<String>,
    /// The release, absent for the `NEV`, `NA` and `Name` forms.
    pub release: Option<String>,
    /// The architecture, absent for all forms but `NEVRA` and `NA`.
    pub arch: Option<String>,
}

/// Error returned when a string cannot be read under a requested form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{input}' does not match the {form} form")]
pub struct ParseNevraError {
    /// The rejected input.
    pub input: String,
    /// The form it was tried under.
    pub form: NevraForm,
}

impl Nevra {
    /// Reads `input` under a specific form. Returns `None` when the shape
    /// does not match; the reading itself cannot fail once the regex matches.
    pub fn from_form(input: &str, form: NevraForm) -> Option<Nevra> {
        let captures = form.regex().captures(input)?;
        let group = |i: usize| captures.get(i).map(|m| m.as_str().to_string());

        let epoch = captures
            .get(2)
            // The capture group is all digits; overflow saturates rather
            // than fails.
            .map(|m| m.as_str().parse().unwrap_or(u64::MAX));

        let mut nevra = Nevra {
            name: captures.get(1)?.as_str().to_string(),
            ..Nevra::default()
        };
        match form {
            NevraForm::Nevra => {
                nevra.epoch = epoch;
                nevra.version = group(3);
                nevra.release = group(4);
                nevra.arch = group(5);
            }
            NevraForm::Nevr => {
                nevra.epoch = epoch;
                nevra.version = group(3);
                nevra.release = group(4);
            }
            NevraForm::Nev => {
                nevra.epoch = epoch;
                nevra.version = group(3);
            }
            NevraForm::Na => {
                nevra.arch = group(2);
            }
            NevraForm::Name => {}
        }
        Some(nevra)
    }

    /// Like [`Nevra::from_form`] but with an error describing the mismatch.
    pub fn parse(input: &str, form: NevraForm) -> Result<Nevra, ParseNevraError> {
        Self::from_form(input, form).ok_or_else(|| ParseNevraError {
            input: input.to_string(),
            form,
        })
    }

    /// Renders the `[epoch:]version[-release]` part of this reading.
    pub fn evr(&self) -> String {
        let mut out = String::new();
        if let Some(epoch) = self.epoch {
            out.push_str(&format!("{epoch}:"));
        }
        if let Some(version) = &self.version {
            out.push_str(version);
        }
        if let Some(release) = &self.release {
            out.push('-');
            out.push_str(release);
        }
        out
    }

    /// True when no field beyond the name is present.
    pub fn is_name_only(&self) -> bool {
        self.epoch.is_none()
            && self.version.is_none()
            && self.release.is_none()
            && self.arch.is_none()
    }
}

impl fmt::Display for Nevra {
    /// Canonical render: `name-epoch:version-release.arch`, omitting absent
    /// fields in a way that parses back under the same form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.version.is_some() {
            write!(f, "-{}", self.evr())?;
        }
        if let Some(arch) = &self.arch {
            write!(f, ".{arch}")?;
        }
        Ok(())
    }
}
