//! Pluggable ML scorer hook
//!
//! The engine consults an external scorer only when every prior symbol
//! strategy stayed below the configured confidence threshold, and accepts a
//! prediction only when its probability clears that same threshold. No model
//! ships with the crate.

/// External symbol scorer
pub trait MlScorer: Send + Sync {
    /// Score the row's combined text; returns a symbol identifier and a
    /// probability in `[0, 1]`, or `None` when the scorer abstains.
    fn score_symbol(&self, text: &str) -> Option<(String, f64)>;
}
