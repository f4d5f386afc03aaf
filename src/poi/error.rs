use thiserror::Error;

/// Why a POI fetch did not produce features.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request was superseded")]
    Cancelled,

    #[error("query service rate limited the request")]
    RateLimited { status: Option<u16> },

    #[error("query service is busy: {0}")]
    Busy(String),

    #[error("query service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Maps a non-success HTTP response onto the taxonomy.
    pub fn classify_status(status: u16, body: &str) -> Self {
        match status {
            429 => FetchError::RateLimited {
                status: Some(status),
            },
            503 | 504 => FetchError::Busy(format!("HTTP {status}")),
            _ => match Self::classify_message(body) {
                FetchError::Transport(_) => FetchError::Http {
                    status,
                    message: first_line(body),
                },
                recognized => recognized,
            },
        }
    }

    /// Recognizes rate-limit and overload wording in a free-form message.
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("too many requests") {
            FetchError::RateLimited { status: None }
        } else if lower.contains("too busy") || lower.contains("timeout") || lower.contains("timed out") {
            FetchError::Busy(first_line(message))
        } else {
            FetchError::Transport(first_line(message))
        }
    }

    /// Rate limits and overload answers earn exponential backoff.
    pub fn is_backoff_worthy(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. } | FetchError::Busy(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().chars().take(200).collect()
}
