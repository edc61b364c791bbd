//! Waits around each publish
//!
//! The sequencer never sleeps directly; it asks a `Pacer`, so tests can
//! record the waits instead of spending them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which of the two waits is being taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PausePhase {
    /// Before a publish attempt
    BeforePublish,
    /// After a successful publish, for registry propagation
    AfterPublish,
}

/// Capability that performs a wait
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, phase: PausePhase, duration: Duration);
}

/// Real wall-clock waits on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, _phase: PausePhase, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_zero_pause_returns_immediately() {
        let start = Instant::now();
        TokioPacer.pause(PausePhase::BeforePublish, Duration::ZERO).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pause_waits_at_least_duration() {
        let start = Instant::now();
        TokioPacer
            .pause(PausePhase::AfterPublish, Duration::from_millis(20))
            .await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&PausePhase::AfterPublish).unwrap();
        assert_eq!(json, r#""after_publish""#);
    }
}
