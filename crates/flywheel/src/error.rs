use std::path::PathBuf;

/// The stable error kinds surfaced to the host.
///
/// Validation errors come back from the staging operation that triggered
/// them, resolution errors from [`crate::Goal::run`] and the commit pipeline,
/// security errors from commit after the keyring check. Nothing is swallowed;
/// `Internal` is reserved for broken invariants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A filter's keyname, comparison and value shape do not go together.
    #[error("invalid query: {0}")]
    BadQuery(String),

    /// A selector is missing its name/provides/file axis or holds a value
    /// the axis cannot take.
    #[error("invalid selector: {0}")]
    BadSelector(String),

    /// The solver found no solution; the goal retains the problem list.
    #[error("no solution: {}", problems.join("; "))]
    NoSolution {
        /// Rendered problem descriptions.
        problems: Vec<String>,
    },

    /// The solution would remove a protected package.
    #[error("the operation would remove protected packages: {}", names.join(", "))]
    RemovalOfProtectedPkg {
        /// Names of the protected packages that would be removed.
        names: Vec<String>,
    },

    /// The architecture handed to the sack is not recognised.
    #[error("unrecognized architecture '{0}'")]
    InvalidArchitecture(String),

    /// A file exists but cannot be used.
    #[error("invalid file {path}: {reason}")]
    FileInvalid {
        /// The offending path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// A required file is missing.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Catch-all for states that indicate a programming error.
    #[error("internal error: {0}")]
    Internal(String),

    /// A package addressed by the host does not exist in the sack.
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// A package failed the signature check and the policy does not allow
    /// installing it anyway.
    #[error("GPG check failed for {nevra}: {reason}")]
    GpgSignatureInvalid {
        /// The rejected package.
        nevra: String,
        /// The keyring's verdict.
        reason: String,
    },

    /// Not enough free space to download the transaction.
    #[error("not enough free space in {path}: needed {needed} bytes, available {available} bytes")]
    NoSpace {
        /// The cache directory that was checked.
        path: PathBuf,
        /// Total bytes the transaction wants to download.
        needed: u64,
        /// Bytes actually available.
        available: u64,
    },

    /// A configuration or metadata document failed to parse.
    #[error("failed to parse {path}: {reason}")]
    FailedConfigParsing {
        /// The offending document.
        path: PathBuf,
        /// The parser's complaint.
        reason: String,
    },
}

impl Error {
    pub(crate) fn internal(message: impl Into<String>) -> Error {
        Error::Internal(message.into())
    }
}
