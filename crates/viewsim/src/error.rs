#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("malformed duration `{value}` in playlist: {reason}")]
    MalformedDuration { value: String, reason: String },

    #[error("playlist error: {reason}")]
    Playlist { reason: String },

    #[error("transport configuration error: {reason}")]
    Configuration { reason: String },
}

impl SessionError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_duration(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDuration {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether the step that produced this error may be retried by the
    /// caller. Parse and configuration errors are permanent for the
    /// session; everything transport-shaped is reported in-band through
    /// an unsuccessful sample instead of an error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidUrl { .. }
            | Self::MalformedDuration { .. }
            | Self::Configuration { .. } => false,
            Self::Playlist { .. } => true,
        }
    }
}
