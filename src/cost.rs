use std::sync::atomic::{AtomicU64, Ordering};

use crate::llm::TokenUsage;

// USD per million tokens for the default models
const MAPPING_INPUT_RATE: f64 = 1.25;
const MAPPING_OUTPUT_RATE: f64 = 10.0;
const EMBEDDING_RATE: f64 = 0.02;

/// Process-wide usage accumulator shared by concurrent workers. Atomic
/// counters only; callers hold it behind an `Arc` and pass it explicitly to
/// whatever needs to record usage.
#[derive(Debug, Default)]
pub struct UsageTracker {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    embedding_tokens: AtomicU64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage from a mapping or summary request
    pub fn add_generation(&self, usage: TokenUsage) {
        self.prompt_tokens.fetch_add(usage.input, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.output, Ordering::Relaxed);
    }

    pub fn add_embedding_tokens(&self, tokens: u64) {
        self.embedding_tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            embedding_tokens: self.embedding_tokens.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of accumulated usage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSnapshot {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub embedding_tokens: u64,
}

impl UsageSnapshot {
    /// Rough USD cost estimate at the default model rates
    pub fn estimated_cost_usd(&self) -> f64 {
        (self.prompt_tokens as f64 * MAPPING_INPUT_RATE
            + self.completion_tokens as f64 * MAPPING_OUTPUT_RATE
            + self.embedding_tokens as f64 * EMBEDDING_RATE)
            / 1_000_000.0
    }
}

impl std::fmt::Display for UsageSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "prompt={} completion={} embedding={} (~${:.4})",
            self.prompt_tokens,
            self.completion_tokens,
            self.embedding_tokens,
            self.estimated_cost_usd()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_usage() {
        let tracker = UsageTracker::new();
        tracker.add_generation(TokenUsage {
            input: 1000,
            output: 200,
        });
        tracker.add_generation(TokenUsage {
            input: 500,
            output: 100,
        });
        tracker.add_embedding_tokens(4000);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.prompt_tokens, 1500);
        assert_eq!(snapshot.completion_tokens, 300);
        assert_eq!(snapshot.embedding_tokens, 4000);
        assert!(snapshot.estimated_cost_usd() > 0.0);
    }
}
