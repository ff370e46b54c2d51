//! Token usage tracking for LLM operations.
//!
//! # OpenAI API Alignment
//!
//! [`Usage`] maps onto the usage object of the Chat Completions API:
//! `prompt_tokens` / `completion_tokens` / `total_tokens`, plus the
//! `prompt_tokens_details` (cached tokens) and `completion_tokens_details`
//! (reasoning tokens) breakdowns. Provider-reported usage is authoritative;
//! the runtime performs no local token estimation.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Detailed breakdown of prompt/input tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    /// Cached tokens that were reused (prompt caching).
    #[serde(default)]
    pub cached_tokens: u32,
}

/// Detailed breakdown of completion/output tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionTokensDetails {
    /// Reasoning tokens (for reasoning-capable models).
    #[serde(default)]
    pub reasoning_tokens: u32,
}

/// Token usage statistics from an LLM operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the input/prompt.
    #[serde(default, alias = "prompt_tokens")]
    pub input_tokens: u32,

    /// Number of tokens in the output/completion.
    #[serde(default, alias = "completion_tokens")]
    pub output_tokens: u32,

    /// Total tokens used (input + output).
    #[serde(default)]
    pub total_tokens: u32,

    /// Detailed breakdown of prompt tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,

    /// Detailed breakdown of completion tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

impl Usage {
    /// Create a new usage record.
    #[must_use]
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            prompt_tokens_details: None,
            completion_tokens_details: None,
        }
    }

    /// Create an empty usage record.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            prompt_tokens_details: None,
            completion_tokens_details: None,
        }
    }

    /// Set cached prompt tokens.
    #[must_use]
    pub const fn with_cached(mut self, cached_tokens: u32) -> Self {
        self.prompt_tokens_details = Some(PromptTokensDetails { cached_tokens });
        self
    }

    /// Set reasoning completion tokens.
    #[must_use]
    pub const fn with_reasoning(mut self, reasoning_tokens: u32) -> Self {
        self.completion_tokens_details = Some(CompletionTokensDetails { reasoning_tokens });
        self
    }

    /// Check if no tokens were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }

    /// Cached prompt tokens, zero when no breakdown was reported.
    #[must_use]
    pub const fn cached_tokens(&self) -> u32 {
        match self.prompt_tokens_details {
            Some(d) => d.cached_tokens,
            None => 0,
        }
    }

    /// Reasoning completion tokens, zero when no breakdown was reported.
    #[must_use]
    pub const fn reasoning_tokens(&self) -> u32 {
        match self.completion_tokens_details {
            Some(d) => d.reasoning_tokens,
            None => 0,
        }
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let prompt_tokens_details = match (self.prompt_tokens_details, rhs.prompt_tokens_details) {
            (None, None) => None,
            (a, b) => Some(PromptTokensDetails {
                cached_tokens: a.map_or(0, |d| d.cached_tokens) + b.map_or(0, |d| d.cached_tokens),
            }),
        };
        let completion_tokens_details =
            match (self.completion_tokens_details, rhs.completion_tokens_details) {
                (None, None) => None,
                (a, b) => Some(CompletionTokensDetails {
                    reasoning_tokens: a.map_or(0, |d| d.reasoning_tokens)
                        + b.map_or(0, |d| d.reasoning_tokens),
                }),
            };
        Self {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
            prompt_tokens_details,
            completion_tokens_details,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} total", self.total_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_computes_total() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
        assert!(!usage.is_empty());
    }

    #[test]
    fn accumulation() {
        let mut usage = Usage::zero();
        usage += Usage::new(100, 50);
        usage += Usage::new(200, 100).with_cached(30).with_reasoning(40);

        assert_eq!(usage.input_tokens, 300);
        assert_eq!(usage.output_tokens, 150);
        assert_eq!(usage.total_tokens, 450);
        assert_eq!(usage.cached_tokens(), 30);
        assert_eq!(usage.reasoning_tokens(), 40);
    }

    #[test]
    fn deserializes_openai_field_names() {
        let usage: Usage = serde_json::from_str(
            r#"{
                "prompt_tokens": 12,
                "completion_tokens": 7,
                "total_tokens": 19,
                "prompt_tokens_details": {"cached_tokens": 4},
                "completion_tokens_details": {"reasoning_tokens": 2}
            }"#,
        )
        .expect("valid usage JSON");

        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 7);
        assert_eq!(usage.total_tokens, 19);
        assert_eq!(usage.cached_tokens(), 4);
        assert_eq!(usage.reasoning_tokens(), 2);
    }

    #[test]
    fn display_is_total_form() {
        assert_eq!(Usage::new(10, 5).to_string(), "15 total");
    }
}
