use std::cmp::Ordering;

/// An Epoch-Version-Release triple split out of an EVR string.
///
/// The epoch is kept as the raw digit string so that an absent epoch can be
/// distinguished from an explicit `0` (`"0:1.2-3"` vs `"1.2-3"`). For ordering
/// purposes an absent epoch compares as `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evr<'a> {
    /// The epoch digits, if the EVR string carried a `e:` prefix.
    pub epoch: Option<&'a str>,
    /// The version part, between the epoch and the last dash.
    pub version: &'a str,
    /// The release part, after the last dash. Absent when the string carries
    /// no dash at all.
    pub release: Option<&'a str>,
}

/// Splits an EVR string of the shape `[epoch:]version[-release]` into its
/// three parts. No part is validated beyond the split itself.
pub fn split_evr(evr: &str) -> Evr<'_> {
    let (epoch, rest) = match evr.split_once(':') {
        Some((e, rest)) if !e.is_empty() && e.bytes().all(|b| b.is_ascii_digit()) => {
            (Some(e), rest)
        }
        _ => (None, evr),
    };
    let (version, release) = match rest.rsplit_once('-') {
        Some((v, r)) => (v, Some(r)),
        None => (rest, None),
    };
    Evr {
        epoch,
        version,
        release,
    }
}

/// This function implements the ordering between two RPM version segments
/// (the `version` or `release` part of an EVR, not the full triple).
///
/// The segments are walked in parallel as alternating runs of digits and
/// letters; everything else separates runs:
///
/// * a digit run is greater than a letter run at the same position,
/// * digit runs compare numerically, ignoring leading zeroes,
/// * letter runs compare as ASCII strings,
/// * `~` sorts before everything, including the end of the string
///   (`"1.0~rc1" < "1.0"`),
/// * `^` sorts after the end of the string but before any other continuation
///   (`"1.0^post" > "1.0"`, `"1.0^post" < "1.0.1"`),
/// * when one segment runs out, the longer one is greater.
pub fn rpm_vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut a = a.as_bytes();
    let mut b = b.as_bytes();

    loop {
        // Drop separator characters. Tildes and carets take part in the
        // ordering and must survive this.
        while let [first, rest @ ..] = a {
            if first.is_ascii_alphanumeric() || *first == b'~' || *first == b'^' {
                break;
            }
            a = rest;
        }
        while let [first, rest @ ..] = b {
            if first.is_ascii_alphanumeric() || *first == b'~' || *first == b'^' {
                break;
            }
            b = rest;
        }

        match (a.first(), b.first()) {
            (Some(b'~'), Some(b'~')) => {
                a = &a[1..];
                b = &b[1..];
                continue;
            }
            (Some(b'~'), _) => return Ordering::Less,
            (_, Some(b'~')) => return Ordering::Greater,
            _ => {}
        }

        // A caret wins against the end of the other string but loses against
        // any remaining content.
        match (a.first(), b.first()) {
            (Some(b'^'), Some(b'^')) => {
                a = &a[1..];
                b = &b[1..];
                continue;
            }
            (Some(b'^'), None) => return Ordering::Greater,
            (None, Some(b'^')) => return Ordering::Less,
            (Some(b'^'), _) => return Ordering::Less,
            (_, Some(b'^')) => return Ordering::Greater,
            _ => {}
        }

        let (Some(_), Some(_)) = (a.first(), b.first()) else {
            // One or both segments are exhausted, the longer one is newer.
            return a.len().cmp(&b.len());
        };

        let a_digits = a[0].is_ascii_digit();
        let run_a = take_run(a, a_digits);
        let run_b = take_run(b, b[0].is_ascii_digit());

        if a_digits != b[0].is_ascii_digit() {
            // A numeric run is always newer than an alphabetic run.
            return if a_digits {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let cmp = if a_digits {
            compare_digit_runs(run_a, run_b)
        } else {
            run_a.cmp(run_b)
        };
        if cmp != Ordering::Equal {
            return cmp;
        }

        a = &a[run_a.len()..];
        b = &b[run_b.len()..];
    }
}

fn take_run(s: &[u8], digits: bool) -> &[u8] {
    let len = s
        .iter()
        .take_while(|b| {
            if digits {
                b.is_ascii_digit()
            } else {
                b.is_ascii_alphabetic()
            }
        })
        .count();
    &s[..len]
}

fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeroes(a);
    let b = strip_leading_zeroes(b);
    // More digits means a larger number; equal widths compare as strings.
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeroes(s: &[u8]) -> &[u8] {
    let start = s.iter().take_while(|b| **b == b'0').count();
    &s[start..]
}

/// Total order over two full EVR strings per the RPM rules: numeric epoch
/// comparison first (an absent epoch counts as `0`), then the version
/// segments, then the release segments.
pub fn evr_cmp(a: &str, b: &str) -> Ordering {
    let a = split_evr(a);
    let b = split_evr(b);

    let epoch_a = a.epoch.map_or(0, parse_epoch);
    let epoch_b = b.epoch.map_or(0, parse_epoch);
    epoch_a
        .cmp(&epoch_b)
        .then_with(|| rpm_vercmp(a.version, b.version))
        .then_with(|| rpm_vercmp(a.release.unwrap_or(""), b.release.unwrap_or("")))
}

fn parse_epoch(digits: &str) -> u64 {
    // `split_evr` only produces all-digit epochs; saturate on overflow
    // instead of failing, an epoch that large is already nonsense.
    digits.parse().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use rstest::rstest;

    use super::{evr_cmp, rpm_vercmp, split_evr};

    #[rstest]
    #[case("1.0", "1.0", Ordering::Equal)]
    #[case("1.0", "2.0", Ordering::Less)]
    #[case("2.0", "1.0", Ordering::Greater)]
    #[case("2.0.1", "2.0", Ordering::Greater)]
    #[case("2.0", "2.0.1", Ordering::Less)]
    #[case("10", "9", Ordering::Greater)]
    #[case("001", "1", Ordering::Equal)]
    #[case("1.05", "1.5", Ordering::Equal)]
    #[case("fc17", "fc18", Ordering::Less)]
    #[case("1a", "1", Ordering::Greater)]
    #[case("a1", "1", Ordering::Less)]
    #[case("1.0~rc1", "1.0", Ordering::Less)]
    #[case("1.0~rc1", "1.0~rc2", Ordering::Less)]
    #[case("1.0~~", "1.0~", Ordering::Less)]
    #[case("1.0^", "1.0", Ordering::Greater)]
    #[case("1.0^git1", "1.0.1", Ordering::Less)]
    #[case("1.0^git1", "1.0", Ordering::Greater)]
    fn test_vercmp(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(rpm_vercmp(a, b), expected);
        assert_eq!(rpm_vercmp(b, a), expected.reverse());
    }

    #[rstest]
    #[case("8:3.6.9-11.fc100", "8:3.6.9-11.fc100", Ordering::Equal)]
    #[case("3:3.6.9-1", "8:3.6.9-1", Ordering::Less)]
    #[case("1:1.0-1", "1:1.0-2", Ordering::Less)]
    #[case("1.0-1", "0:1.0-1", Ordering::Equal)]
    #[case("1:0.5-1", "2.0-1", Ordering::Greater)]
    #[case("1.0-2.fc36", "1.0-10.fc36", Ordering::Less)]
    #[case("1.0", "1.0-1", Ordering::Less)]
    fn test_evr_cmp(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(evr_cmp(a, b), expected);
        assert_eq!(evr_cmp(b, a), expected.reverse());
    }

    #[test]
    fn test_split_evr() {
        let evr = split_evr("8:3.6.9-11.fc100");
        assert_eq!(evr.epoch, Some("8"));
        assert_eq!(evr.version, "3.6.9");
        assert_eq!(evr.release, Some("11.fc100"));

        let evr = split_evr("1.2.3");
        assert_eq!(evr.epoch, None);
        assert_eq!(evr.version, "1.2.3");
        assert_eq!(evr.release, None);

        // A non-numeric prefix before a colon is not an epoch.
        let evr = split_evr("a:1-2");
        assert_eq!(evr.epoch, None);
        assert_eq!(evr.version, "a:1");
        assert_eq!(evr.release, Some("2"));
    }
}
