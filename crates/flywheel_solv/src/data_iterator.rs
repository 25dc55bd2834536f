use glob::{MatchOptions, Pattern};

use crate::{Pool, SolvableId};

/// Match-mode flags for a [`DataIterator`], combined by `|`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SearchFlags(u32);

impl SearchFlags {
    /// Exact string equality.
    pub const STRING: SearchFlags = SearchFlags(1 << 0);
    /// Substring containment.
    pub const SUBSTRING: SearchFlags = SearchFlags(1 << 1);
    /// Shell-style glob match.
    pub const GLOB: SearchFlags = SearchFlags(1 << 2);
    /// Case-insensitive variant of any of the above.
    pub const NOCASE: SearchFlags = SearchFlags(1 << 3);
    /// Match against the file list attribute.
    pub const FILES: SearchFlags = SearchFlags(1 << 4);
    /// Consider the complete file list, not just the primary subset.
    pub const COMPLETE_FILELIST: SearchFlags = SearchFlags(1 << 5);

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: SearchFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SearchFlags {
    type Output = SearchFlags;

    fn bitor(self, rhs: SearchFlags) -> SearchFlags {
        SearchFlags(self.0 | rhs.0)
    }
}

/// The string attributes of a solvable a [`DataIterator`] can walk.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SolvableAttr {
    /// Package name.
    Name,
    /// Full EVR string.
    Evr,
    /// Architecture.
    Arch,
    /// One-line summary.
    Summary,
    /// Long description.
    Description,
    /// Upstream URL.
    Url,
    /// Owned files.
    File,
    /// Repository-relative location.
    Location,
    /// Source RPM file name.
    Sourcerpm,
}

/// Walks every package solvable whose attribute value matches a needle,
/// yielding each solvable at most once. This is the string-search primitive
/// behind the query engine's name/arch/summary/file filters.
pub struct DataIterator<'pool> {
    pool: &'pool Pool,
    attr: SolvableAttr,
    matcher: Matcher,
    next_id: u32,
}

enum Matcher {
    Exact(String, bool),
    Substring(String, bool),
    Glob(Option<Pattern>, MatchOptions),
}

impl Matcher {
    fn new(needle: &str, flags: SearchFlags) -> Matcher {
        let nocase = flags.contains(SearchFlags::NOCASE);
        if flags.contains(SearchFlags::GLOB) {
            let options = MatchOptions {
                case_sensitive: !nocase,
                require_literal_separator: false,
                require_literal_leading_dot: false,
            };
            // An unparseable pattern matches nothing.
            Matcher::Glob(Pattern::new(needle).ok(), options)
        } else if flags.contains(SearchFlags::SUBSTRING) {
            Matcher::Substring(maybe_lower(needle, nocase), nocase)
        } else {
            Matcher::Exact(maybe_lower(needle, nocase), nocase)
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Exact(needle, nocase) => maybe_lower(value, *nocase) == *needle,
            Matcher::Substring(needle, nocase) => {
                maybe_lower(value, *nocase).contains(needle.as_str())
            }
            Matcher::Glob(pattern, options) => pattern
                .as_ref()
                .is_some_and(|p| p.matches_with(value, *options)),
        }
    }
}

fn maybe_lower(s: &str, nocase: bool) -> String {
    if nocase {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}

impl<'pool> DataIterator<'pool> {
    /// Creates an iterator over all package solvables whose `attr` matches
    /// `needle` under the given flags.
    pub fn new(
        pool: &'pool Pool,
        attr: SolvableAttr,
        needle: &str,
        flags: SearchFlags,
    ) -> DataIterator<'pool> {
        let attr = if flags.contains(SearchFlags::FILES) {
            SolvableAttr::File
        } else {
            attr
        };
        DataIterator {
            pool,
            attr,
            matcher: Matcher::new(needle, flags),
            next_id: 2,
        }
    }

    fn solvable_matches(&self, id: SolvableId) -> bool {
        let pool = self.pool;
        let solvable = pool.solvable(id);
        match self.attr {
            SolvableAttr::Name => self.matcher.matches(pool.id_to_str(solvable.name)),
            SolvableAttr::Evr => self.matcher.matches(pool.id_to_str(solvable.evr)),
            SolvableAttr::Arch => self.matcher.matches(pool.id_to_str(solvable.arch)),
            SolvableAttr::Summary => solvable
                .summary
                .as_deref()
                .is_some_and(|v| self.matcher.matches(v)),
            SolvableAttr::Description => solvable
                .description
                .as_deref()
                .is_some_and(|v| self.matcher.matches(v)),
            SolvableAttr::Url => solvable
                .url
                .as_deref()
                .is_some_and(|v| self.matcher.matches(v)),
            SolvableAttr::Location => solvable
                .location
                .as_deref()
                .is_some_and(|v| self.matcher.matches(v)),
            SolvableAttr::Sourcerpm => solvable
                .sourcerpm
                .as_deref()
                .is_some_and(|v| self.matcher.matches(v)),
            SolvableAttr::File => solvable.files.iter().any(|f| self.matcher.matches(f)),
        }
    }
}

impl Iterator for DataIterator<'_> {
    type Item = SolvableId;

    fn next(&mut self) -> Option<SolvableId> {
        while self.next_id < self.pool.solvable_count() {
            let id = SolvableId(self.next_id);
            self.next_id += 1;
            if !self.pool.repo(self.pool.solvable(id).repo).enabled {
                continue;
            }
            if self.solvable_matches(id) {
                return Some(id);
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::{DataIterator, SearchFlags, SolvableAttr};
    use crate::{Pool, Repo, Solvable};

    fn pool_with(names: &[&str]) -> Pool {
        let mut pool = Pool::new();
        let repo = pool.add_repo(Repo::new("test"));
        for name in names {
            let name_id = pool.intern_str(*name);
            let evr = pool.intern_str("1-1");
            let arch = pool.intern_str("noarch");
            pool.add_solvable(
                repo,
                Solvable {
                    name: name_id,
                    evr,
                    arch,
                    ..Solvable::default()
                },
            );
        }
        pool
    }

    #[test]
    fn test_exact_and_substring() {
        let pool = pool_with(&["flask", "flask-doc", "grateful"]);
        let exact: Vec<_> =
            DataIterator::new(&pool, SolvableAttr::Name, "flask", SearchFlags::STRING).collect();
        assert_eq!(exact.len(), 1);

        let substr: Vec<_> = DataIterator::new(
            &pool,
            SolvableAttr::Name,
            "flask",
            SearchFlags::SUBSTRING,
        )
        .collect();
        assert_eq!(substr.len(), 2);
    }

    #[test]
    fn test_glob_nocase() {
        let pool = pool_with(&["Flask", "flask-doc"]);
        let hits: Vec<_> = DataIterator::new(
            &pool,
            SolvableAttr::Name,
            "FLA*",
            SearchFlags::GLOB | SearchFlags::NOCASE,
        )
        .collect();
        assert_eq!(hits.len(), 2);

        let case_sensitive: Vec<_> =
            DataIterator::new(&pool, SolvableAttr::Name, "FLA*", SearchFlags::GLOB).collect();
        assert!(case_sensitive.is_empty());
    }
}
