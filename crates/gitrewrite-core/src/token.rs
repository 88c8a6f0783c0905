//! Token count estimation for request budgeting.

/// Estimates how many model tokens a piece of text consumes.
pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> usize;
}

/// Roughly four bytes per token, which holds for English text and code.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteHeuristic;

impl TokenEstimator for ByteHeuristic {
    fn estimate(&self, text: &str) -> usize {
        text.len() / 4
    }
}
