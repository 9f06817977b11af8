//! Bounded fan-out of a [`Task`] over a list of inputs.
//!
//! At most `workers` tasks run at once on a [`JoinSet`]; a new input is started
//! each time one finishes. Results come back in completion order, not
//! submission order. The first fatal failure stops any further starts; tasks
//! already running are drained and accounted for, then that failure is
//! returned. There is no per-task timeout.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument};

use crate::config::TaskContext;
use crate::contract::{Task, TaskOutput};
use crate::error::{PipelineError, TaskError};
use crate::progress::ProgressReporter;

/// What to do when a task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and skip recoverable failures, abort on fatal ones.
    #[default]
    SkipRecoverable,
    /// Abort on any failure.
    AbortOnAny,
}

/// An input that failed recoverably and produced no output.
#[derive(Debug)]
pub struct SkippedItem {
    pub input: String,
    pub error: TaskError,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Successful outputs, in completion order.
    pub completed: Vec<TaskOutput>,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    workers: usize,
    policy: FailurePolicy,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Result<Self, PipelineError> {
        if workers == 0 {
            return Err(PipelineError::Config(
                "number of workers must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            workers,
            policy: FailurePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn dispatch<T: Task>(
        &self,
        task: Arc<T>,
        ctx: Arc<TaskContext>,
        inputs: Vec<T::Input>,
        progress: &mut ProgressReporter,
    ) -> Result<DispatchReport, PipelineError> {
        let mut pending = inputs.into_iter();
        let mut running = JoinSet::new();
        let mut report = DispatchReport::default();
        let mut fatal: Option<PipelineError> = None;

        type Running = JoinSet<(String, Result<TaskOutput, TaskError>)>;
        let spawn = |running: &mut Running, input: T::Input| {
            let task = Arc::clone(&task);
            let ctx = Arc::clone(&ctx);
            let label = task.describe(&input);
            let span = ctx.span.clone();
            running.spawn(
                async move {
                    let result = task.run(&ctx, input).await;
                    (label, result)
                }
                .instrument(span),
            );
        };

        for input in pending.by_ref().take(self.workers) {
            spawn(&mut running, input);
        }

        while let Some(joined) = running.join_next().await {
            match joined {
                Ok((_, Ok(output))) => {
                    progress.record_completed(&output);
                    report.completed.push(output);
                }
                Ok((input, Err(e)))
                    if !e.is_fatal() && self.policy == FailurePolicy::SkipRecoverable =>
                {
                    progress.record_skipped(&input, &e);
                    report.skipped.push(SkippedItem { input, error: e });
                }
                Ok((input, Err(e))) => {
                    progress.record_failed(&input, &e);
                    if fatal.is_none() {
                        fatal = Some(PipelineError::Task {
                            task: task.name(),
                            input,
                            source: e,
                        });
                    }
                }
                Err(join_err) => {
                    error!(task = task.name(), error = %join_err, "Worker did not complete");
                    if fatal.is_none() {
                        fatal = Some(PipelineError::Worker(join_err.to_string()));
                    }
                }
            }

            if fatal.is_none() {
                if let Some(next) = pending.next() {
                    spawn(&mut running, next);
                }
            }
        }

        match fatal {
            Some(e) => {
                warn!(
                    task = task.name(),
                    not_started = pending.len(),
                    "Aborted batch after fatal failure"
                );
                Err(e)
            }
            None => {
                info!(
                    task = task.name(),
                    completed = report.completed.len(),
                    skipped = report.skipped.len(),
                    "Batch finished"
                );
                Ok(report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sleeps longer for smaller inputs, tracks concurrency, fails on configured inputs.
    struct SleepyTask {
        running: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<u64>>,
        fatal_on: Option<u64>,
        recoverable_on: Option<u64>,
    }

    impl SleepyTask {
        fn new() -> Self {
            Self {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
                fatal_on: None,
                recoverable_on: None,
            }
        }
    }

    #[async_trait]
    impl Task for SleepyTask {
        type Input = u64;

        fn name(&self) -> &'static str {
            "sleepy"
        }

        async fn run(&self, _ctx: &TaskContext, input: u64) -> Result<TaskOutput, TaskError> {
            self.started.lock().unwrap().push(input);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // later inputs finish first
            tokio::time::sleep(Duration::from_millis(40 - input.min(39))).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self.fatal_on == Some(input) {
                return Err(TaskError::Decode {
                    path: PathBuf::from(input.to_string()),
                    reason: "corrupt".into(),
                });
            }
            if self.recoverable_on == Some(input) {
                return Err(TaskError::Malformed {
                    path: PathBuf::from(input.to_string()),
                    reason: "bad xml".into(),
                });
            }
            Ok(TaskOutput {
                input: input.to_string(),
                output: PathBuf::from(format!("{input}.txt")),
                lines_written: input,
                segments_skipped: 0,
            })
        }
    }

    fn ctx() -> Arc<TaskContext> {
        Arc::new(TaskContext::new("test", "en", std::env::temp_dir()))
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        assert!(matches!(Dispatcher::new(0), Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn every_input_completes_exactly_once() {
        for workers in [1, 2, 3, 8] {
            let task = Arc::new(SleepyTask::new());
            let inputs: Vec<u64> = (0..7).collect();
            let mut progress = ProgressReporter::new("sleepy", inputs.len());
            let report = Dispatcher::new(workers)
                .unwrap()
                .dispatch(task.clone(), ctx(), inputs, &mut progress)
                .await
                .unwrap();

            assert_eq!(report.completed.len(), 7);
            let distinct: HashSet<_> = report.completed.iter().map(|o| o.input.clone()).collect();
            assert_eq!(distinct.len(), 7);
            assert_eq!(progress.finished(), 7);
            assert!(task.peak.load(Ordering::SeqCst) <= workers);
        }
    }

    #[tokio::test]
    async fn empty_input_completes_immediately() {
        let mut progress = ProgressReporter::new("sleepy", 0);
        let report = Dispatcher::new(4)
            .unwrap()
            .dispatch(Arc::new(SleepyTask::new()), ctx(), vec![], &mut progress)
            .await
            .unwrap();
        assert!(report.completed.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn completions_arrive_in_finish_order() {
        let mut progress = ProgressReporter::new("sleepy", 3);
        let report = Dispatcher::new(3)
            .unwrap()
            .dispatch(Arc::new(SleepyTask::new()), ctx(), vec![0, 10, 30], &mut progress)
            .await
            .unwrap();
        let order: Vec<&str> = report.completed.iter().map(|o| o.input.as_str()).collect();
        assert_eq!(order, vec!["30", "10", "0"]);
    }

    #[tokio::test]
    async fn recoverable_failures_are_skipped() {
        let mut task = SleepyTask::new();
        task.recoverable_on = Some(2);
        let mut progress = ProgressReporter::new("sleepy", 4);
        let report = Dispatcher::new(2)
            .unwrap()
            .dispatch(Arc::new(task), ctx(), vec![1, 2, 3, 4], &mut progress)
            .await
            .unwrap();
        assert_eq!(report.completed.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].input, "2");
    }

    #[tokio::test]
    async fn abort_on_any_turns_recoverable_into_fatal() {
        let mut task = SleepyTask::new();
        task.recoverable_on = Some(2);
        let mut progress = ProgressReporter::new("sleepy", 2);
        let result = Dispatcher::new(1)
            .unwrap()
            .with_policy(FailurePolicy::AbortOnAny)
            .dispatch(Arc::new(task), ctx(), vec![1, 2], &mut progress)
            .await;
        assert!(matches!(result, Err(PipelineError::Task { .. })));
    }

    #[tokio::test]
    async fn fatal_failure_stops_new_work() {
        let mut task = SleepyTask::new();
        task.fatal_on = Some(1);
        let task = Arc::new(task);
        let inputs: Vec<u64> = (1..=10).collect();
        let mut progress = ProgressReporter::new("sleepy", inputs.len());
        let result = Dispatcher::new(1)
            .unwrap()
            .dispatch(task.clone(), ctx(), inputs, &mut progress)
            .await;

        match result {
            Err(PipelineError::Task { task, input, source }) => {
                assert_eq!(task, "sleepy");
                assert_eq!(input, "1");
                assert!(source.is_fatal());
            }
            other => panic!("expected fatal task error, got {other:?}"),
        }
        assert_eq!(*task.started.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn in_flight_work_drains_after_fatal_failure() {
        let mut task = SleepyTask::new();
        // input 30 fails first; 0 and 10 are already running and must finish
        task.fatal_on = Some(30);
        let mut progress = ProgressReporter::new("sleepy", 4);
        let result = Dispatcher::new(3)
            .unwrap()
            .dispatch(Arc::new(task), ctx(), vec![0, 10, 30, 5], &mut progress)
            .await;
        assert!(result.is_err());
        assert_eq!(progress.completed(), 2);
        assert_eq!(progress.failed(), 1);
    }
}
