use crate::{parse_reldep_str, Nevra, NevraForm, ReldepExpr};

/// A free-form package token as typed by a user, e.g. on a command line.
///
/// A subject has no single meaning: `penny-lib-4-1.x86_64` may name the
/// package `penny-lib` at version `4-1`, or a package literally called
/// `penny-lib-4-1.x86_64`. The possibilities are enumerated lazily, most
/// explicit reading first, and the caller keeps the first one that exists in
/// its package universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pattern: String,
}

impl Subject {
    /// Wraps a raw token.
    pub fn new(pattern: impl Into<String>) -> Self {
        Subject {
            pattern: pattern.into(),
        }
    }

    /// The raw token.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Enumerates the NEVRA readings of the token in form order. Forms whose
    /// shape the token does not have are skipped.
    pub fn nevra_possibilities(&self) -> impl Iterator<Item = Nevra> + '_ {
        NevraForm::FORMS
            .iter()
            .filter_map(|form| Nevra::from_form(&self.pattern, *form))
    }

    /// Enumerates the NEVRA readings restricted to the given forms.
    pub fn nevra_possibilities_in_forms<'a>(
        &'a self,
        forms: &'a [NevraForm],
    ) -> impl Iterator<Item = Nevra> + 'a {
        forms
            .iter()
            .filter_map(|form| Nevra::from_form(&self.pattern, *form))
    }

    /// The reldep reading of the token (`name [OP evr]`), if it has one.
    pub fn reldep_possibility(&self) -> Option<ReldepExpr> {
        parse_reldep_str(&self.pattern).ok()
    }
}

impl<S: Into<String>> From<S> for Subject {
    fn from(pattern: S) -> Self {
        Subject::new(pattern)
    }
}

#[cfg(test)]
mod test {
    use super::Subject;

    #[test]
    fn test_possibilities_with_epoch() {
        let subject = Subject::new("four-of-fish-8:3.6.9-11.fc100.x86_64");
        let mut possibilities = subject.nevra_possibilities();

        let first = possibilities.next().expect("nevra reading");
        assert_eq!(first.name, "four-of-fish");
        assert_eq!(first.epoch, Some(8));
        assert_eq!(first.version.as_deref(), Some("3.6.9"));
        assert_eq!(first.release.as_deref(), Some("11.fc100"));
        assert_eq!(first.arch.as_deref(), Some("x86_64"));

        let second = possibilities.next().expect("nevr reading");
        assert_eq!(second.name, "four-of-fish");
        assert_eq!(second.epoch, Some(8));
        assert_eq!(second.version.as_deref(), Some("3.6.9"));
        assert_eq!(second.release.as_deref(), Some("11.fc100.x86_64"));
        assert_eq!(second.arch, None);

        // The epoch makes every laxer reading impossible.
        assert_eq!(possibilities.next(), None);
    }

    #[test]
    fn test_possibilities_without_epoch() {
        let subject = Subject::new("four-of-fish-3.6.9-11.fc100.x86_64");
        let possibilities: Vec<_> = subject.nevra_possibilities().collect();
        assert_eq!(possibilities.len(), 5);

        assert_eq!(possibilities[0].name, "four-of-fish");
        assert_eq!(possibilities[0].version.as_deref(), Some("3.6.9"));
        assert_eq!(possibilities[0].release.as_deref(), Some("11.fc100"));
        assert_eq!(possibilities[0].arch.as_deref(), Some("x86_64"));

        assert_eq!(possibilities[1].name, "four-of-fish");
        assert_eq!(possibilities[1].release.as_deref(), Some("11.fc100.x86_64"));

        assert_eq!(possibilities[2].name, "four-of-fish-3.6.9");
        assert_eq!(possibilities[2].version.as_deref(), Some("11.fc100.x86_64"));

        assert_eq!(possibilities[3].name, "four-of-fish-3.6.9-11.fc100");
        assert_eq!(possibilities[3].arch.as_deref(), Some("x86_64"));

        assert_eq!(possibilities[4].name, "four-of-fish-3.6.9-11.fc100.x86_64");
        assert!(possibilities[4].is_name_only());
    }

    #[test]
    fn test_reldep_possibility() {
        let subject = Subject::new("four-of-fish >= 8:3.6.9");
        let reldep = subject.reldep_possibility().expect("reldep reading");
        assert_eq!(reldep.name, "four-of-fish");

        // A plain name is both a nevra and a reldep possibility.
        let subject = Subject::new("penny-lib");
        assert!(subject.reldep_possibility().is_some());
        assert!(subject.nevra_possibilities().count() >= 1);
    }
}
