//! Sequential Publisher - publishes packages one at a time, in order
//!
//! Features:
//! - Fixed dependency order, earliest first
//! - Short wait before every publish attempt
//! - Longer wait after every upload so the registry can index it
//! - Stops at the first failure; nothing is retried or rolled back

use crate::core::config::{AlreadyPublishedPolicy, ResolvedConfig};
use crate::core::error::SequenceError;
use crate::core::package::PublishOrder;
use crate::core::traits::{PublishClient, PublishOutcome};
use crate::security::command_executor::CommandError;
use crate::orchestration::pacing::{PausePhase, Pacer, TokioPacer};
use crate::orchestration::report::{PackageReport, PackageStatus, SequenceReport};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Sequencing options
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceOptions {
    /// Wait before each publish attempt (default: 2s)
    pub pre_publish_delay: Duration,

    /// Wait after each successful upload (default: 30s)
    pub post_publish_delay: Duration,

    /// Also wait after the last package (default: true)
    pub delay_after_last: bool,

    /// Handling of versions the registry already has (default: skip)
    pub already_published: AlreadyPublishedPolicy,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            pre_publish_delay: Duration::from_secs(2),
            post_publish_delay: Duration::from_secs(30),
            delay_after_last: true,
            already_published: AlreadyPublishedPolicy::Skip,
        }
    }
}

impl From<&ResolvedConfig> for SequenceOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            pre_publish_delay: config.pre_publish_delay,
            post_publish_delay: config.post_publish_delay,
            delay_after_last: config.delay_after_last,
            already_published: config.already_published,
        }
    }
}

/// SequentialPublisher - drives a publish client over an ordered package list
pub struct SequentialPublisher<C, P = TokioPacer> {
    client: C,
    pacer: P,
    options: SequenceOptions,
}

impl<C: PublishClient> SequentialPublisher<C, TokioPacer> {
    /// Create a publisher that waits on the real clock
    pub fn new(client: C, options: SequenceOptions) -> Self {
        Self::with_pacer(client, TokioPacer, options)
    }
}

impl<C: PublishClient, P: Pacer> SequentialPublisher<C, P> {
    /// Create a publisher with a custom pacer
    pub fn with_pacer(client: C, pacer: P, options: SequenceOptions) -> Self {
        Self {
            client,
            pacer,
            options,
        }
    }

    pub fn options(&self) -> &SequenceOptions {
        &self.options
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Publish every package in order, stopping at the first failure
    ///
    /// The returned report lists every package of `order`: those after a
    /// failure are marked `NotAttempted`. Use
    /// [`SequenceReport::ensure_success`] to turn a failed run into an error.
    pub async fn publish_all(&self, order: &PublishOrder) -> SequenceReport {
        let started_at = Utc::now();
        let total = order.len();
        let mut entries: Vec<PackageReport> = Vec::with_capacity(total);
        let mut failure: Option<SequenceError> = None;

        info!(
            client = self.client.name(),
            packages = %order,
            "starting sequential publish"
        );

        for (position, package) in order.iter().enumerate() {
            if failure.is_some() {
                entries.push(PackageReport {
                    package: package.to_string(),
                    position,
                    status: PackageStatus::NotAttempted,
                    duration: 0,
                    output: None,
                    error: None,
                });
                continue;
            }

            self.pacer
                .pause(PausePhase::BeforePublish, self.options.pre_publish_delay)
                .await;

            info!(package = %package, step = position + 1, total, "publishing");
            let start = Instant::now();
            let result = self.client.publish(package).await;
            let duration = start.elapsed().as_millis() as u64;

            let uploaded = matches!(&result, Ok(outcome) if outcome.uploaded());

            let (entry, error) = match result {
                Ok(PublishOutcome::Published { output }) => (
                    PackageReport {
                        package: package.to_string(),
                        position,
                        status: PackageStatus::Published,
                        duration,
                        output,
                        error: None,
                    },
                    None,
                ),
                Ok(PublishOutcome::AlreadyPublished) => match self.options.already_published {
                    AlreadyPublishedPolicy::Skip => {
                        info!(package = %package, "version already published, skipping");
                        (
                            PackageReport {
                                package: package.to_string(),
                                position,
                                status: PackageStatus::AlreadyPublished,
                                duration,
                                output: None,
                                error: None,
                            },
                            None,
                        )
                    }
                    AlreadyPublishedPolicy::Fail => {
                        let error = SequenceError::AlreadyPublished {
                            package: package.to_string(),
                        };
                        (
                            PackageReport {
                                package: package.to_string(),
                                position,
                                status: PackageStatus::Failed,
                                duration,
                                output: None,
                                error: Some(error.to_string()),
                            },
                            Some(error),
                        )
                    }
                },
                Err(e) => {
                    let error = match e.downcast_ref::<CommandError>() {
                        Some(command_error) => SequenceError::CommandError {
                            package: package.to_string(),
                            message: command_error.to_string(),
                        },
                        None => SequenceError::PublishFailed {
                            package: package.to_string(),
                            message: format!("{:#}", e),
                        },
                    };
                    (
                        PackageReport {
                            package: package.to_string(),
                            position,
                            status: PackageStatus::Failed,
                            duration,
                            output: None,
                            error: Some(error.to_string()),
                        },
                        Some(error),
                    )
                }
            };

            entries.push(entry);

            if let Some(error) = error {
                warn!(package = %package, error = %error, "publish failed, stopping");
                failure = Some(error);
                continue;
            }

            let is_last = position + 1 == total;
            if uploaded && (!is_last || self.options.delay_after_last) {
                info!(
                    package = %package,
                    wait_ms = self.options.post_publish_delay.as_millis() as u64,
                    "waiting for registry propagation"
                );
                self.pacer
                    .pause(PausePhase::AfterPublish, self.options.post_publish_delay)
                    .await;
            }
        }

        let success = failure.is_none();
        if success {
            info!(packages = total, "sequential publish completed");
        }

        SequenceReport {
            client: self.client.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            packages: entries,
            success,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::PackageId;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// Everything the fakes observe, in the order it happened
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Pause(PausePhase, Duration),
        Publish(String),
    }

    type EventLog = Arc<Mutex<Vec<Event>>>;

    #[derive(Clone, Copy)]
    enum Behavior {
        Fail,
        AlreadyPublished,
        MissingTool,
    }

    /// Fake registry client: records calls and keeps the set of published packages
    struct FakeClient {
        log: EventLog,
        registry: Arc<Mutex<HashSet<String>>>,
        behaviors: HashMap<String, Behavior>,
    }

    impl FakeClient {
        fn new(log: EventLog) -> Self {
            Self {
                log,
                registry: Arc::new(Mutex::new(HashSet::new())),
                behaviors: HashMap::new(),
            }
        }

        fn with(mut self, package: &str, behavior: Behavior) -> Self {
            self.behaviors.insert(package.to_string(), behavior);
            self
        }
    }

    #[async_trait]
    impl PublishClient for FakeClient {
        fn name(&self) -> &str {
            "fake"
        }

        async fn publish(&self, package: &PackageId) -> anyhow::Result<PublishOutcome> {
            self.log
                .lock()
                .unwrap()
                .push(Event::Publish(package.to_string()));

            match self.behaviors.get(package.as_str()) {
                Some(Behavior::Fail) => Err(anyhow::anyhow!("registry rejected {}", package)),
                Some(Behavior::AlreadyPublished) => Ok(PublishOutcome::AlreadyPublished),
                Some(Behavior::MissingTool) => Err(CommandError::ExecutionFailed(
                    "No such file or directory (os error 2)".to_string(),
                )
                .into()),
                None => {
                    self.registry.lock().unwrap().insert(package.to_string());
                    Ok(PublishOutcome::published())
                }
            }
        }
    }

    struct RecordingPacer {
        log: EventLog,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, phase: PausePhase, duration: Duration) {
            self.log.lock().unwrap().push(Event::Pause(phase, duration));
        }
    }

    const PRE: Duration = Duration::from_millis(2);
    const POST: Duration = Duration::from_millis(30);

    fn options() -> SequenceOptions {
        SequenceOptions {
            pre_publish_delay: PRE,
            post_publish_delay: POST,
            delay_after_last: true,
            already_published: AlreadyPublishedPolicy::Skip,
        }
    }

    fn order() -> PublishOrder {
        PublishOrder::from_names(["a", "b", "c"]).unwrap()
    }

    fn publisher(
        client: FakeClient,
        log: &EventLog,
        options: SequenceOptions,
    ) -> SequentialPublisher<FakeClient, RecordingPacer> {
        SequentialPublisher::with_pacer(client, RecordingPacer { log: log.clone() }, options)
    }

    fn publishes(log: &EventLog) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::Publish(name) => Some(name.clone()),
                Event::Pause(..) => None,
            })
            .collect()
    }

    fn pre() -> Event {
        Event::Pause(PausePhase::BeforePublish, PRE)
    }

    fn post() -> Event {
        Event::Pause(PausePhase::AfterPublish, POST)
    }

    fn publish(name: &str) -> Event {
        Event::Publish(name.to_string())
    }

    #[test]
    fn test_default_options() {
        let options = SequenceOptions::default();
        assert_eq!(options.pre_publish_delay, Duration::from_secs(2));
        assert_eq!(options.post_publish_delay, Duration::from_secs(30));
        assert!(options.delay_after_last);
        assert_eq!(options.already_published, AlreadyPublishedPolicy::Skip);
    }

    #[tokio::test]
    async fn test_publishes_in_order() {
        let log = EventLog::default();
        let publisher = publisher(FakeClient::new(log.clone()), &log, options());

        publisher.publish_all(&order()).await;

        assert_eq!(publishes(&log), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_full_success_publishes_each_once() {
        let log = EventLog::default();
        let client = FakeClient::new(log.clone());
        let registry = client.registry.clone();
        let publisher = publisher(client, &log, options());

        let report = publisher.publish_all(&order()).await;

        assert!(report.success);
        assert!(report.ensure_success().is_ok());
        assert_eq!(report.count(PackageStatus::Published), 3);
        assert_eq!(publishes(&log).len(), 3);
        assert_eq!(registry.lock().unwrap().len(), 3);

        let positions: Vec<usize> = report.packages.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(report.client, "fake");
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        let log = EventLog::default();
        let client = FakeClient::new(log.clone()).with("b", Behavior::Fail);
        let publisher = publisher(client, &log, options());

        let report = publisher.publish_all(&order()).await;

        assert!(!report.success);
        assert_eq!(publishes(&log), vec!["a", "b"]);

        let statuses: Vec<PackageStatus> = report.packages.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                PackageStatus::Published,
                PackageStatus::Failed,
                PackageStatus::NotAttempted
            ]
        );

        let error = report.ensure_success().unwrap_err();
        assert_eq!(error.code(), "PUBLISH_FAILED");
        assert_eq!(error.package(), Some("b"));
        assert!(error.to_string().contains("registry rejected b"));
    }

    #[tokio::test]
    async fn test_failure_on_first_package_attempts_nothing_else() {
        let log = EventLog::default();
        let client = FakeClient::new(log.clone()).with("a", Behavior::Fail);
        let publisher = publisher(client, &log, options());

        let report = publisher.publish_all(&order()).await;

        assert_eq!(*log.lock().unwrap(), vec![pre(), publish("a")]);
        assert_eq!(report.count(PackageStatus::NotAttempted), 2);
    }

    #[tokio::test]
    async fn test_command_failure_stops_with_command_error() {
        let log = EventLog::default();
        let client = FakeClient::new(log.clone()).with("a", Behavior::MissingTool);
        let publisher = publisher(client, &log, options());

        let report = publisher.publish_all(&order()).await;

        assert!(!report.success);
        assert_eq!(publishes(&log), vec!["a"]);
        let error = report.ensure_success().unwrap_err();
        assert_eq!(error.code(), "COMMAND_ERROR");
        assert_eq!(error.package(), Some("a"));
        assert!(error.to_string().contains("os error 2"));
        assert_eq!(report.packages[0].status, PackageStatus::Failed);
    }

    #[tokio::test]
    async fn test_no_rollback_after_failure() {
        let log = EventLog::default();
        let client = FakeClient::new(log.clone()).with("b", Behavior::Fail);
        let registry = client.registry.clone();
        let publisher = publisher(client, &log, options());

        let report = publisher.publish_all(&order()).await;

        assert!(!report.success);
        let registry = registry.lock().unwrap();
        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
        assert!(!registry.contains("c"));
    }

    #[tokio::test]
    async fn test_waits_around_every_publish() {
        let log = EventLog::default();
        let publisher = publisher(FakeClient::new(log.clone()), &log, options());

        publisher.publish_all(&order()).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                pre(),
                publish("a"),
                post(),
                pre(),
                publish("b"),
                post(),
                pre(),
                publish("c"),
                post(),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_wait_after_last_when_disabled() {
        let log = EventLog::default();
        let mut options = options();
        options.delay_after_last = false;
        let publisher = publisher(FakeClient::new(log.clone()), &log, options);

        publisher
            .publish_all(&PublishOrder::from_names(["a", "b"]).unwrap())
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![pre(), publish("a"), post(), pre(), publish("b")]
        );
    }

    #[tokio::test]
    async fn test_no_post_wait_after_failure() {
        let log = EventLog::default();
        let client = FakeClient::new(log.clone()).with("b", Behavior::Fail);
        let publisher = publisher(client, &log, options());

        publisher.publish_all(&order()).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![pre(), publish("a"), post(), pre(), publish("b")]
        );
    }

    #[tokio::test]
    async fn test_rerun_with_everything_published_skips() {
        let log = EventLog::default();
        let client = FakeClient::new(log.clone())
            .with("a", Behavior::AlreadyPublished)
            .with("b", Behavior::AlreadyPublished)
            .with("c", Behavior::AlreadyPublished);
        let publisher = publisher(client, &log, options());

        let report = publisher.publish_all(&order()).await;

        assert!(report.success);
        assert_eq!(report.count(PackageStatus::AlreadyPublished), 3);
        // Nothing uploaded, so nothing to wait for
        assert!(
            !log.lock()
                .unwrap()
                .iter()
                .any(|e| matches!(e, Event::Pause(PausePhase::AfterPublish, _)))
        );
        assert_eq!(publishes(&log), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_rerun_with_fail_policy_stops_at_first() {
        let log = EventLog::default();
        let client = FakeClient::new(log.clone())
            .with("a", Behavior::AlreadyPublished)
            .with("b", Behavior::AlreadyPublished);
        let mut options = options();
        options.already_published = AlreadyPublishedPolicy::Fail;
        let publisher = publisher(client, &log, options);

        let report = publisher.publish_all(&order()).await;

        assert!(!report.success);
        assert_eq!(publishes(&log), vec!["a"]);
        let error = report.ensure_success().unwrap_err();
        assert_eq!(
            error,
            SequenceError::AlreadyPublished {
                package: "a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_resume_after_partial_run() {
        // First run: b fails after a was uploaded
        let log = EventLog::default();
        let client = FakeClient::new(log.clone()).with("b", Behavior::Fail);
        let first = publisher(client, &log, options()).publish_all(&order()).await;
        assert!(!first.success);

        // Second run: a is already on the registry, b and c go through
        let log = EventLog::default();
        let client = FakeClient::new(log.clone()).with("a", Behavior::AlreadyPublished);
        let second = publisher(client, &log, options()).publish_all(&order()).await;

        assert!(second.success);
        let statuses: Vec<PackageStatus> = second.packages.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                PackageStatus::AlreadyPublished,
                PackageStatus::Published,
                PackageStatus::Published
            ]
        );
    }

    #[tokio::test]
    async fn test_real_pacer_with_zero_delays() {
        let log = EventLog::default();
        let options = SequenceOptions {
            pre_publish_delay: Duration::ZERO,
            post_publish_delay: Duration::ZERO,
            ..SequenceOptions::default()
        };
        let publisher = SequentialPublisher::new(FakeClient::new(log.clone()), options);

        let report = publisher.publish_all(&order()).await;

        assert!(report.success);
        assert_eq!(publishes(&log), vec!["a", "b", "c"]);
        assert_eq!(publisher.client().name(), "fake");
        assert_eq!(publisher.options().post_publish_delay, Duration::ZERO);
    }
}
