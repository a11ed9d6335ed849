//! Content fingerprints and the "changed enough" decision.
//!
//! Everything here is a pure function of its inputs. The fingerprint is a
//! SHA-256 hex digest of the processed text; similarity is the Dice coefficient
//! over sets of lowercase word shingles.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Pages whose similarity to their previous version is at or above this are unchanged.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Words per shingle.
const SHINGLE_SIZE: usize = 3;

/// Hex-encoded SHA-256 of the content.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn shingles(content: &str) -> HashSet<String> {
    let words: Vec<String> = content.split_whitespace().map(|w| w.to_lowercase()).collect();
    if words.len() < SHINGLE_SIZE {
        return words.into_iter().collect();
    }
    words.windows(SHINGLE_SIZE).map(|w| w.join(" ")).collect()
}

/// Dice coefficient over word shingles, in [0, 1]. Two empty texts are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = shingles(a);
    let right = shingles(b);
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    (2 * shared) as f64 / (left.len() + right.len()) as f64
}

/// Why a page was (or was not) considered changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// No earlier version of the page exists.
    New,
    /// Fingerprint matches the previous version.
    Identical,
    /// Similarity fell below the threshold.
    Changed,
    /// Content differs, but not by enough to count.
    MinorEdit,
    /// The previous processed content could not be read back.
    PreviousUnavailable,
}

impl ChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::New => "new",
            ChangeReason::Identical => "identical",
            ChangeReason::Changed => "changed",
            ChangeReason::MinorEdit => "minor_edit",
            ChangeReason::PreviousUnavailable => "previous_unavailable",
        }
    }
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What is known about the page's previous version.
#[derive(Debug, Clone)]
pub struct PreviousContent {
    pub fingerprint: String,
    /// `None` when the processed content could not be loaded.
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub fingerprint: String,
    pub prev_fingerprint: Option<String>,
    pub similarity: f64,
    pub changed_enough: bool,
    pub reason: ChangeReason,
}

/// Decides whether `current` differs enough from the previous version to be published.
pub fn evaluate(current: &str, previous: Option<&PreviousContent>, threshold: f64) -> Verdict {
    let fp = fingerprint(current);

    let Some(previous) = previous else {
        return Verdict {
            fingerprint: fp,
            prev_fingerprint: None,
            similarity: 0.0,
            changed_enough: true,
            reason: ChangeReason::New,
        };
    };
    let prev_fingerprint = Some(previous.fingerprint.clone());

    if previous.fingerprint == fp {
        return Verdict {
            fingerprint: fp,
            prev_fingerprint,
            similarity: 1.0,
            changed_enough: false,
            reason: ChangeReason::Identical,
        };
    }

    match &previous.content {
        None => Verdict {
            fingerprint: fp,
            prev_fingerprint,
            similarity: 0.0,
            changed_enough: true,
            reason: ChangeReason::PreviousUnavailable,
        },
        Some(old) => {
            let score = similarity(old, current);
            let changed_enough = score < threshold;
            Verdict {
                fingerprint: fp,
                prev_fingerprint,
                similarity: score,
                changed_enough,
                reason: if changed_enough {
                    ChangeReason::Changed
                } else {
                    ChangeReason::MinorEdit
                },
            }
        }
    }
}
