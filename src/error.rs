/// Why a single update cycle was skipped.
///
/// Neither variant is fatal: the affected sensor keeps its previously
/// published value and the next tick retries. Missing required
/// configuration, by contrast, aborts the process at startup before any
/// loop runs.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The referenced entity is absent, `unknown`, or `unavailable`.
    #[error("source `{0}` is missing, unknown, or unavailable")]
    MissingSource(String),

    /// The entity exists but its value does not parse.
    #[error("failed to parse `{value}`: {reason}")]
    Parse { value: String, reason: String },
}

impl UpdateError {
    pub fn parse(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse { value: value.into(), reason: reason.into() }
    }
}
