//! Retry Policy
//!
//! One policy object shared by the settlement poller, transfer executor,
//! and recovery manager instead of three hand-rolled loops.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Backoff {
    /// Same delay every attempt
    Fixed,
    /// base * attempt
    Linear,
    /// base for the first `after` attempts, then base * factor
    Stepped { after: u32, factor: u32 },
}

/// Bounded retry with a configurable delay schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base delay in milliseconds
    pub base_delay_ms: u64,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            backoff,
        }
    }

    /// Delay to sleep after `attempt` (1-based) fails
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms;
        let millis = match self.backoff {
            Backoff::Fixed => base,
            Backoff::Linear => base * attempt as u64,
            Backoff::Stepped { after, factor } => {
                if attempt <= after {
                    base
                } else {
                    base * factor as u64
                }
            }
        };
        Duration::from_millis(millis)
    }

    /// Total sleep budget if every attempt fails
    pub fn total_delay(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.delay_for(a)).sum()
    }
}
