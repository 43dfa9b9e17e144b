use crate::error::DashboardError;
use crate::llm::{ReportRequest, TextGenerator};
use crate::view_model::ViewModel;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub mod prompt;

pub use prompt::build_prompt;

const SUPERSEDED: &str = "cancelled or superseded by a newer report request";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportResult {
    Success { text: String },
    Failure { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReportState {
    Idle,
    Pending {
        request_id: Uuid,
        started_at: DateTime<Utc>,
    },
    Succeeded {
        request_id: Uuid,
        text: String,
        completed_at: DateTime<Utc>,
    },
    Failed {
        request_id: Uuid,
        reason: String,
        completed_at: DateTime<Utc>,
    },
}

impl ReportState {
    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            Self::Idle => None,
            Self::Pending { request_id, .. }
            | Self::Succeeded { request_id, .. }
            | Self::Failed { request_id, .. } => Some(*request_id),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn result(&self) -> Option<ReportResult> {
        match self {
            Self::Succeeded { text, .. } => Some(ReportResult::Success { text: text.clone() }),
            Self::Failed { reason, .. } => Some(ReportResult::Failure {
                reason: reason.clone(),
            }),
            Self::Idle | Self::Pending { .. } => None,
        }
    }
}

struct TriggerInner {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct TriggerShared {
    inner: Mutex<TriggerInner>,
    state: watch::Sender<ReportState>,
}

impl TriggerShared {
    fn lock(&self) -> MutexGuard<'_, TriggerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a finished request unless a newer trigger or a cancel got there first.
    fn settle(&self, generation: u64, request_id: Uuid, result: ReportResult) {
        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(%request_id, generation, current = inner.generation, "discarding superseded report result");
            return;
        }
        inner.task = None;

        let completed_at = Utc::now();
        let state = match result {
            ReportResult::Success { text } => {
                tracing::info!(%request_id, chars = text.len(), "report generated");
                ReportState::Succeeded {
                    request_id,
                    text,
                    completed_at,
                }
            }
            ReportResult::Failure { reason } => {
                tracing::warn!(%request_id, %reason, "report generation failed");
                ReportState::Failed {
                    request_id,
                    reason,
                    completed_at,
                }
            }
        };
        self.state.send_replace(state);
    }
}

/// Runs report generation off the render path. Callers observe progress through
/// [`ReportTrigger::subscribe`] or [`ReportTrigger::state`] and never block on the call.
pub struct ReportTrigger {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    shared: Arc<TriggerShared>,
}

impl ReportTrigger {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(ReportState::Idle);
        Self {
            generator,
            timeout,
            shared: Arc::new(TriggerShared {
                inner: Mutex::new(TriggerInner {
                    generation: 0,
                    task: None,
                }),
                state,
            }),
        }
    }

    pub fn state(&self) -> ReportState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReportState> {
        self.shared.state.subscribe()
    }

    /// Starts a report for `context` and returns immediately. Any request still
    /// in flight is cancelled and its result will never be published.
    pub fn trigger(&self, context: &[ViewModel], as_of: NaiveDate) -> Uuid {
        self.trigger_prompt(build_prompt(context, as_of))
    }

    pub fn trigger_prompt(&self, prompt: String) -> Uuid {
        let request_id = Uuid::new_v4();
        let mut inner = self.shared.lock();
        inner.generation += 1;
        let generation = inner.generation;

        if let Some(previous) = inner.task.take() {
            if !previous.is_finished() {
                tracing::debug!(%request_id, "cancelling in-flight report request");
            }
            previous.abort();
        }

        self.shared.state.send_replace(ReportState::Pending {
            request_id,
            started_at: Utc::now(),
        });
        tracing::info!(%request_id, generation, provider = ?self.generator.provider(), "report requested");

        let generator = self.generator.clone();
        let shared = self.shared.clone();
        let timeout = self.timeout;
        inner.task = Some(tokio::spawn(async move {
            let result = run_generation(generator.as_ref(), ReportRequest { prompt }, timeout).await;
            shared.settle(generation, request_id, result);
        }));

        request_id
    }

    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        inner.generation += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
            tracing::debug!("report request cancelled");
        }
        self.shared.state.send_replace(ReportState::Idle);
    }

    /// Triggers a report and waits for that request to settle. If another trigger
    /// or a cancel replaces it first, the result is a failure and the replaced
    /// request's output is discarded.
    pub async fn generate(&self, context: &[ViewModel], as_of: NaiveDate) -> ReportResult {
        let request_id = self.trigger(context, as_of);
        self.wait_for(request_id).await
    }

    pub async fn wait_for(&self, request_id: Uuid) -> ReportResult {
        let mut rx = self.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if state.request_id() != Some(request_id) {
                    return ReportResult::Failure {
                        reason: SUPERSEDED.to_string(),
                    };
                }
                if let Some(result) = state.result() {
                    return result;
                }
            }
            if rx.changed().await.is_err() {
                return ReportResult::Failure {
                    reason: SUPERSEDED.to_string(),
                };
            }
        }
    }
}

impl Drop for ReportTrigger {
    fn drop(&mut self) {
        if let Some(task) = self.shared.lock().task.take() {
            task.abort();
        }
    }
}

async fn run_generation(
    generator: &dyn TextGenerator,
    request: ReportRequest,
    timeout: Duration,
) -> ReportResult {
    match tokio::time::timeout(timeout, generator.generate_text(request)).await {
        Ok(Ok(text)) => ReportResult::Success { text },
        Ok(Err(err)) => ReportResult::Failure {
            reason: err.to_string(),
        },
        Err(_) => ReportResult::Failure {
            reason: DashboardError::Timeout {
                operation: "report generation".to_string(),
                after: timeout,
            }
            .to_string(),
        },
    }
}


#[cfg(test)]
mod tests {
    use super::fake::ScriptedGenerator;
    use super::*;

    const LONG: Duration = Duration::from_secs(5);

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    async fn settled(trigger: &ReportTrigger) -> ReportState {
        let mut rx = trigger.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if !state.is_pending() {
                    return state.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn starts_idle_and_succeeds() {
        let generator = Arc::new(ScriptedGenerator::answering("Risk-on."));
        let trigger = ReportTrigger::new(generator.clone(), LONG);
        assert_eq!(trigger.state(), ReportState::Idle);

        let result = trigger.generate(&[], date()).await;
        assert_eq!(
            result,
            ReportResult::Success {
                text: "Risk-on.".to_string()
            }
        );
        assert!(matches!(trigger.state(), ReportState::Succeeded { .. }));
        assert!(generator.prompts()[0].contains("Today is 2026-10-19."));
    }

    #[tokio::test]
    async fn trigger_returns_before_generation_finishes() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            Duration::from_millis(100),
            Ok("late".to_string()),
        )]));
        let trigger = ReportTrigger::new(generator, LONG);

        let id = trigger.trigger_prompt("p".to_string());
        assert!(matches!(trigger.state(), ReportState::Pending { request_id, .. } if request_id == id));

        let state = settled(&trigger).await;
        assert_eq!(state.request_id(), Some(id));
        assert!(matches!(state, ReportState::Succeeded { .. }));
    }

    #[tokio::test]
    async fn only_the_latest_request_is_observable() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            (Duration::from_millis(200), Ok("first".to_string())),
            (Duration::from_millis(10), Ok("second".to_string())),
        ]));
        let trigger = ReportTrigger::new(generator.clone(), LONG);

        trigger.trigger_prompt("one".to_string());
        tokio::task::yield_now().await;
        let second = trigger.trigger_prompt("two".to_string());

        let state = settled(&trigger).await;
        assert_eq!(state.request_id(), Some(second));
        assert_eq!(
            state.result(),
            Some(ReportResult::Success {
                text: "second".to_string()
            })
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(trigger.state().request_id(), Some(second));
        assert_eq!(
            trigger.state().result(),
            Some(ReportResult::Success {
                text: "second".to_string()
            })
        );
    }

    #[tokio::test]
    async fn superseded_generate_call_reports_failure() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            (Duration::from_millis(200), Ok("first".to_string())),
            (Duration::from_millis(10), Ok("second".to_string())),
        ]));
        let trigger = ReportTrigger::new(generator, LONG);

        let (first, second) = tokio::join!(trigger.generate(&[], date()), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.generate(&[], date()).await
        });

        assert!(matches!(first, ReportResult::Failure { .. }));
        assert_eq!(
            second,
            ReportResult::Success {
                text: "second".to_string()
            }
        );
    }

    #[tokio::test]
    async fn late_result_from_old_generation_is_discarded() {
        let generator = Arc::new(ScriptedGenerator::answering("x"));
        let trigger = ReportTrigger::new(generator, LONG);
        let current = trigger.trigger_prompt("p".to_string());
        settled(&trigger).await;

        trigger.shared.settle(
            0,
            Uuid::new_v4(),
            ReportResult::Success {
                text: "stale".to_string(),
            },
        );
        assert_eq!(trigger.state().request_id(), Some(current));
    }

    #[tokio::test]
    async fn generator_error_becomes_failed_state() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            Duration::ZERO,
            Err(DashboardError::RateLimited {
                source_name: "anthropic",
            }),
        )]));
        let trigger = ReportTrigger::new(generator, LONG);

        let result = trigger.generate(&[], date()).await;
        assert_eq!(
            result,
            ReportResult::Failure {
                reason: "rate limited by anthropic".to_string()
            }
        );
        assert!(matches!(trigger.state(), ReportState::Failed { .. }));
    }

    #[tokio::test]
    async fn slow_generator_times_out() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            Duration::from_millis(500),
            Ok("too late".to_string()),
        )]));
        let trigger = ReportTrigger::new(generator, Duration::from_millis(20));

        match trigger.generate(&[], date()).await {
            ReportResult::Failure { reason } => assert!(reason.contains("timed out"), "{reason}"),
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_returns_to_idle_and_drops_result() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            Duration::from_millis(50),
            Ok("ignored".to_string()),
        )]));
        let trigger = ReportTrigger::new(generator.clone(), LONG);

        trigger.trigger_prompt("p".to_string());
        tokio::task::yield_now().await;
        trigger.cancel();
        assert_eq!(trigger.state(), ReportState::Idle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(trigger.state(), ReportState::Idle);
        assert!(generator.calls() <= 1);
    }
}
