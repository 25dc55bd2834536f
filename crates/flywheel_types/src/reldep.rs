use std::cmp::Ordering;
use std::fmt;

use lazy_regex::regex_captures;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Comparison operator of a relational dependency, e.g. the `>=` in
/// `foo >= 1.2-3`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum ReldepOp {
    /// `=`
    #[strum(serialize = "=")]
    #[serde(rename = "=")]
    Eq,
    /// `<`
    #[strum(serialize = "<")]
    #[serde(rename = "<")]
    Lt,
    /// `>`
    #[strum(serialize = ">")]
    #[serde(rename = ">")]
    Gt,
    /// `<=`
    #[strum(serialize = "<=")]
    #[serde(rename = "<=")]
    Le,
    /// `>=`
    #[strum(serialize = ">=")]
    #[serde(rename = ">=")]
    Ge,
}

impl ReldepOp {
    /// Whether an EVR comparison outcome (candidate vs. required EVR)
    /// satisfies this operator.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            ReldepOp::Eq => ordering == Ordering::Equal,
            ReldepOp::Lt => ordering == Ordering::Less,
            ReldepOp::Gt => ordering == Ordering::Greater,
            ReldepOp::Le => ordering != Ordering::Greater,
            ReldepOp::Ge => ordering != Ordering::Less,
        }
    }

    /// True when the operator admits EVRs above the bound.
    pub fn allows_greater(self) -> bool {
        matches!(self, ReldepOp::Gt | ReldepOp::Ge)
    }

    /// True when the operator admits EVRs below the bound.
    pub fn allows_less(self) -> bool {
        matches!(self, ReldepOp::Lt | ReldepOp::Le)
    }

    /// True when the operator admits the bound itself.
    pub fn allows_equal(self) -> bool {
        matches!(self, ReldepOp::Eq | ReldepOp::Le | ReldepOp::Ge)
    }
}

/// A parsed relational dependency expression: a name with an optional
/// `(operator, evr)` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReldepExpr {
    /// The dependency name; a package name, a virtual provide or an absolute
    /// file path.
    pub name: String,
    /// The EVR bound, absent for plain name dependencies.
    pub constraint: Option<(ReldepOp, String)>,
}

impl ReldepExpr {
    /// A dependency on a bare name.
    pub fn name_only(name: impl Into<String>) -> Self {
        ReldepExpr {
            name: name.into(),
            constraint: None,
        }
    }

    /// A dependency with an EVR bound.
    pub fn with_constraint(name: impl Into<String>, op: ReldepOp, evr: impl Into<String>) -> Self {
        ReldepExpr {
            name: name.into(),
            constraint: Some((op, evr.into())),
        }
    }
}

impl fmt::Display for ReldepExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some((op, evr)) => write!(f, "{} {op} {evr}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Error returned for strings that are not a reldep expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid dependency expression")]
pub struct ParseReldepError(pub String);

/// Parses `name [OP evr]`. The operator may be spelled with or without
/// surrounding whitespace; a bare name must contain no whitespace at all.
pub fn parse_reldep_str(input: &str) -> Result<ReldepExpr, ParseReldepError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseReldepError(input.to_string()));
    }

    if let Some((_, name, op, evr)) =
        regex_captures!(r"^([^\s<>=]+)\s*(<=|>=|=|<|>)\s*(\S+)$", input)
    {
        // `<=`/`>=` are matched before their one-character prefixes, so the
        // unwrap below cannot trip on a partial operator.
        let op = op.parse().expect("operator alternatives are exhaustive");
        return Ok(ReldepExpr::with_constraint(name, op, evr));
    }

    if input.split_whitespace().count() == 1 && !input.contains(['<', '>', '=']) {
        return Ok(ReldepExpr::name_only(input));
    }

    Err(ParseReldepError(input.to_string()))
}
