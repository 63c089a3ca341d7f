//! Boolean-blind prefix enumeration
//!
//! Recovers an identifier one character per round by asking a
//! [`PrefixOracle`] whether the identifier starts with `found + c` for each
//! candidate `c` in charset order. The first candidate the oracle confirms is
//! appended; a round where nothing matches ends the scan.

pub mod http;

use std::future::Future;

use crate::error::ProbeError;

pub use http::{HttpOracle, HttpTarget};

pub const DEFAULT_PREFIX: &str = "L";
pub const DEFAULT_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$";

/// Longest identifier the target database accepts
pub const DEFAULT_MAX_LENGTH: usize = 128;

/// Answers "does the hidden identifier start with `prefix`?"
pub trait PrefixOracle {
    fn starts_with(&self, prefix: &str) -> impl Future<Output = Result<bool, ProbeError>> + Send;
}

/// What to enumerate and how far
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// Leading characters already known
    pub prefix: String,
    /// Candidates, tried in this order
    pub charset: String,
    /// Stop once the identifier reaches this many characters
    pub max_length: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            charset: DEFAULT_CHARSET.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl ProbeSettings {
    fn validate(&self) -> Result<(), ProbeError> {
        if self.charset.is_empty() {
            return Err(ProbeError::InvalidConfig("charset is empty".into()));
        }
        if self.max_length == 0 {
            return Err(ProbeError::InvalidConfig("max_length must be positive".into()));
        }
        let prefix_len = self.prefix.chars().count();
        if prefix_len > self.max_length {
            return Err(ProbeError::InvalidConfig(format!(
                "prefix has {} characters but max_length is {}",
                prefix_len, self.max_length
            )));
        }
        Ok(())
    }
}

/// Why the scan ended
#[derive(Debug)]
pub enum StopReason {
    /// A full round found no matching candidate
    Exhausted,
    /// The identifier reached `max_length`
    LengthCap,
    /// The oracle failed; the scan was abandoned
    Aborted(ProbeError),
}

/// Result of a scan: whatever was recovered, and why it stopped
#[derive(Debug)]
pub struct ProbeOutcome {
    pub found: String,
    pub stop: StopReason,
    /// Number of oracle queries made
    pub queries: usize,
}

impl ProbeOutcome {
    pub fn is_complete(&self) -> bool {
        !matches!(self.stop, StopReason::Aborted(_))
    }
}

/// Run the scan to completion.
///
/// Invalid settings are rejected up front; oracle failures end the scan and
/// are reported in the outcome next to the partial result.
pub async fn enumerate<O: PrefixOracle>(
    oracle: &O,
    settings: &ProbeSettings,
) -> Result<ProbeOutcome, ProbeError> {
    settings.validate()?;

    let mut found = settings.prefix.clone();
    let mut length = found.chars().count();
    let mut queries = 0usize;
    tracing::info!(prefix = %found, charset = %settings.charset, "enumeration started");

    loop {
        if length >= settings.max_length {
            tracing::info!(%found, max_length = settings.max_length, "length cap reached");
            return Ok(ProbeOutcome {
                found,
                stop: StopReason::LengthCap,
                queries,
            });
        }

        let mut matched = None;
        for c in settings.charset.chars() {
            let candidate = format!("{}{}", found, c);
            queries += 1;
            match oracle.starts_with(&candidate).await {
                Ok(true) => {
                    matched = Some(c);
                    break;
                }
                Ok(false) => tracing::trace!(%candidate, "no match"),
                Err(e) => {
                    tracing::error!(%candidate, "oracle query failed: {}", e);
                    return Ok(ProbeOutcome {
                        found,
                        stop: StopReason::Aborted(e),
                        queries,
                    });
                }
            }
        }

        match matched {
            Some(c) => {
                found.push(c);
                length += 1;
                tracing::info!(%found, queries, "found character");
            }
            None => {
                tracing::info!(%found, queries, "enumeration complete");
                return Ok(ProbeOutcome {
                    found,
                    stop: StopReason::Exhausted,
                    queries,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Oracle backed by a known identifier
    struct Known {
        truth: &'static str,
        calls: AtomicUsize,
        fail_after: Option<usize>,
    }

    impl Known {
        fn new(truth: &'static str) -> Self {
            Self {
                truth,
                calls: AtomicUsize::new(0),
                fail_after: None,
            }
        }
    }

    impl PrefixOracle for Known {
        async fn starts_with(&self, prefix: &str) -> Result<bool, ProbeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| n >= limit) {
                return Err(ProbeError::InvalidConfig("connection refused".into()));
            }
            Ok(self.truth.starts_with(prefix))
        }
    }

    fn settings(charset: &str) -> ProbeSettings {
        ProbeSettings {
            charset: charset.to_string(),
            ..ProbeSettings::default()
        }
    }

    #[tokio::test]
    async fn test_two_letter_charset() {
        let oracle = Known::new("LA");
        let outcome = enumerate(&oracle, &settings("AB")).await.unwrap();
        assert_eq!(outcome.found, "LA");
        assert!(matches!(outcome.stop, StopReason::Exhausted));
        // Round one: "LA" matches first. Round two: "LAA" and "LAB" both miss.
        assert_eq!(outcome.queries, 3);
    }

    #[tokio::test]
    async fn test_default_charset_recovers_identifier() {
        let oracle = Known::new("LOG_ENTRY$2");
        let outcome = enumerate(&oracle, &ProbeSettings::default()).await.unwrap();
        assert_eq!(outcome.found, "LOG_ENTRY$2");
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_length_cap_stops_scan() {
        let oracle = Known::new("LAAAAAAAAA");
        let outcome = enumerate(
            &oracle,
            &ProbeSettings {
                max_length: 4,
                ..settings("A")
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.found, "LAAA");
        assert!(matches!(outcome.stop, StopReason::LengthCap));
    }

    #[tokio::test]
    async fn test_oracle_error_keeps_partial_result() {
        let oracle = Known {
            fail_after: Some(2),
            ..Known::new("LBC")
        };
        let outcome = enumerate(&oracle, &settings("ABC")).await.unwrap();
        // "LA" misses, "LB" matches, then the third query fails.
        assert_eq!(outcome.found, "LB");
        assert!(matches!(outcome.stop, StopReason::Aborted(_)));
        assert!(!outcome.is_complete());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let oracle = Known::new("L");
        assert!(matches!(
            enumerate(&oracle, &settings("")).await,
            Err(ProbeError::InvalidConfig(_))
        ));
        let too_long = ProbeSettings {
            prefix: "LONG".into(),
            max_length: 2,
            ..ProbeSettings::default()
        };
        assert!(enumerate(&oracle, &too_long).await.is_err());
    }
}
