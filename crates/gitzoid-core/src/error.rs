/// Errors that can occur across Gitzoid.
///
/// Library crates use this type directly; the binary converts to
/// `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use gitzoid_core::GitzoidError;
///
/// let err = GitzoidError::Config("missing GitHub token".into());
/// assert!(err.to_string().contains("missing GitHub token"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum GitzoidError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Hosting API failure: non-success status, network error, or a body
    /// that could not be parsed.
    #[error("GitHub error: {0}")]
    GitHub(String),

    /// The hosting API answered 404 for a repository or resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The hosting API rejected the credentials (401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Tracker store could not be read or written.
    #[error("tracker error: {0}")]
    Tracker(String),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GitzoidError {
    /// Map a non-success HTTP status from the hosting API to an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use gitzoid_core::GitzoidError;
    ///
    /// let err = GitzoidError::from_status(404, "octo/repo");
    /// assert!(matches!(err, GitzoidError::NotFound(_)));
    ///
    /// let err = GitzoidError::from_status(500, "octo/repo");
    /// assert!(matches!(err, GitzoidError::GitHub(_)));
    /// ```
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            404 => GitzoidError::NotFound(context.to_string()),
            401 | 403 => GitzoidError::Unauthorized(format!("{context} (status {status})")),
            _ => GitzoidError::GitHub(format!("{context}: API returned status {status}")),
        }
    }
}
