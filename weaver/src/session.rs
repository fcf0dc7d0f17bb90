//! The session controller: a timed, sequential loop over the drive adapter.
//!
//! One iteration selects a topic, allocates an identifier, and asks the drive
//! adapter to materialize the artifact. Iteration failures are counted, never
//! propagated. The loop stops on deadline, cancellation, or once the
//! consecutive-failure ceiling is reached, and always returns a report.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::core::budget::{deadline_reached, remaining_budget};
use crate::core::content::ContentSelector;
use crate::core::error::IterationError;
use crate::core::identifier::IdentifierAllocator;
use crate::core::types::{
    Identifier, IterationOutcome, SessionReport, SessionState, TerminationReason,
};
use crate::io::config::WeaverConfig;
use crate::io::driver::DriveAdapter;
use crate::io::interrupt::CancelFlag;

/// Loop bounds for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub duration: Duration,
    pub loop_interval: Duration,
    pub retry_delay: Duration,
    pub max_consecutive_failures: u32,
}

impl SessionConfig {
    pub fn from_config(cfg: &WeaverConfig) -> Self {
        Self {
            duration: cfg.duration(),
            loop_interval: cfg.loop_interval(),
            retry_delay: cfg.retry_delay(),
            max_consecutive_failures: cfg.max_consecutive_failures,
        }
    }
}

/// Run-level aggregate. Only the controller mutates it.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    start_time: Instant,
    deadline: Instant,
    success_count: u32,
    failure_count: u32,
    consecutive_failures: u32,
    allocator: IdentifierAllocator,
}

impl Session {
    pub fn new(duration: Duration, allocator: IdentifierAllocator) -> Self {
        let start_time = Instant::now();
        Self {
            state: SessionState::Initializing,
            start_time,
            deadline: start_time + duration,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            allocator,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state change");
        self.state = next;
    }

    /// Terminal condition checked at the top of every iteration.
    fn stop_reason(
        &self,
        config: &SessionConfig,
        cancel: &CancelFlag,
    ) -> Option<TerminationReason> {
        if cancel.is_cancelled() {
            return Some(TerminationReason::Cancelled);
        }
        if deadline_reached(self.deadline) {
            return Some(TerminationReason::DeadlineReached);
        }
        if self.consecutive_failures >= config.max_consecutive_failures {
            return Some(TerminationReason::FailureThresholdExceeded);
        }
        None
    }

    fn record_success(&mut self) {
        self.success_count += 1;
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self) {
        self.failure_count += 1;
        self.consecutive_failures += 1;
    }

    fn outcome(
        &self,
        iter: u32,
        label: Option<String>,
        result: Result<Identifier, IterationError>,
    ) -> IterationOutcome {
        let (artifact, error) = match result {
            Ok(id) => (Some(id.path), None),
            Err(err) => (None, Some(format!("{}: {err}", err.kind()))),
        };
        IterationOutcome {
            iter,
            label,
            artifact,
            error,
            success_count: self.success_count,
            failure_count: self.failure_count,
            consecutive_failures: self.consecutive_failures,
            remaining: remaining_budget(self.deadline),
        }
    }

    fn finish(&mut self, reason: TerminationReason) -> SessionReport {
        if matches!(self.state, SessionState::Running) {
            self.transition(SessionState::Terminating(reason));
        }
        self.transition(SessionState::Terminated(reason));
        let report = SessionReport {
            success_count: self.success_count,
            failure_count: self.failure_count,
            elapsed: self.start_time.elapsed(),
            termination_reason: reason,
        };
        info!(
            reason = reason.as_str(),
            success_count = report.success_count,
            failure_count = report.failure_count,
            elapsed_secs = report.elapsed.as_secs(),
            "session finished"
        );
        report
    }
}

/// Run one session to completion.
///
/// `on_iteration` is called after every iteration with the updated counters.
/// No error escapes: startup failure, deadline, threshold and cancellation
/// all end in a [`SessionReport`].
pub fn run_session<D, R, F>(
    driver: &D,
    selector: &mut ContentSelector<R>,
    allocator: IdentifierAllocator,
    config: &SessionConfig,
    cancel: &CancelFlag,
    mut on_iteration: F,
) -> SessionReport
where
    D: DriveAdapter,
    R: Rng,
    F: FnMut(&IterationOutcome),
{
    let mut session = Session::new(config.duration, allocator);
    info!(
        duration_secs = config.duration.as_secs(),
        max_consecutive_failures = config.max_consecutive_failures,
        "session starting"
    );

    if !driver.confirm_reachable() {
        error!("editor unreachable through every launch strategy");
        return session.finish(TerminationReason::StartupFailed);
    }
    session.transition(SessionState::Running);

    let mut iter = 0u32;
    let reason = loop {
        if let Some(reason) = session.stop_reason(config, cancel) {
            break reason;
        }
        iter += 1;

        let (label, result) = run_iteration(driver, selector, &mut session.allocator);
        match &result {
            Ok(id) => {
                session.record_success();
                info!(iter, name = %id.name, "artifact created");
            }
            Err(err) => {
                session.record_failure();
                warn!(
                    iter,
                    kind = err.kind(),
                    err = %err,
                    consecutive_failures = session.consecutive_failures,
                    "iteration failed"
                );
            }
        }

        let delay = if result.is_ok() {
            config.loop_interval
        } else {
            config.retry_delay
        };
        let outcome = session.outcome(iter, label, result);
        info!(
            success_count = outcome.success_count,
            failure_count = outcome.failure_count,
            remaining_secs = outcome.remaining.as_secs(),
            "progress"
        );
        on_iteration(&outcome);

        if session.stop_reason(config, cancel).is_none() {
            cancel.pause(delay);
        }
    };

    session.finish(reason)
}

fn run_iteration<D: DriveAdapter, R: Rng>(
    driver: &D,
    selector: &mut ContentSelector<R>,
    allocator: &mut IdentifierAllocator,
) -> (Option<String>, Result<Identifier, IterationError>) {
    let selection = match selector.select() {
        Ok(selection) => selection,
        Err(err) => return (None, Err(err)),
    };
    let label = Some(selection.label.clone());
    let result = allocator
        .allocate(&selection.label)
        .map_err(IterationError::from)
        .and_then(|id| {
            driver
                .materialize(&id, &selection.body)
                .map(|()| id)
                .map_err(IterationError::from)
        });
    (label, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifier::{IdentifierPolicy, IdentifierRegistry};
    use crate::core::types::Topic;
    use crate::test_support::{ScriptedDriver, quick_config};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::Path;

    fn selector(labels: &[&str]) -> ContentSelector<StdRng> {
        let catalog = labels
            .iter()
            .map(|label| Topic::new(label, "desc", "print(1)"))
            .collect();
        ContentSelector::with_rng(catalog, 10_000, StdRng::seed_from_u64(3)).expect("selector")
    }

    fn allocator() -> IdentifierAllocator {
        IdentifierAllocator::new(
            IdentifierPolicy::default(),
            Path::new("out"),
            IdentifierRegistry::new(),
        )
    }

    #[test]
    fn zero_duration_returns_immediately() {
        let driver = ScriptedDriver::always_ok();
        let config = SessionConfig {
            duration: Duration::ZERO,
            ..quick_config(5)
        };
        let report = run_session(
            &driver,
            &mut selector(&["len()"]),
            allocator(),
            &config,
            &CancelFlag::new(),
            |_| {},
        );
        assert_eq!(report.success_count, 0);
        assert_eq!(report.failure_count, 0);
        assert_eq!(report.termination_reason, TerminationReason::DeadlineReached);
        assert_eq!(driver.materialize_calls(), 0);
    }

    #[test]
    fn always_failing_driver_hits_threshold() {
        let driver = ScriptedDriver::always_failing();
        let report = run_session(
            &driver,
            &mut selector(&["len()"]),
            allocator(),
            &quick_config(3),
            &CancelFlag::new(),
            |_| {},
        );
        assert_eq!(
            report.termination_reason,
            TerminationReason::FailureThresholdExceeded
        );
        assert_eq!(report.failure_count, 3);
        assert_eq!(report.success_count, 0);
        assert_eq!(driver.materialize_calls(), 3);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        // fail, fail, ok, fail, fail, fail -> threshold 3 reached only at the end
        let driver = ScriptedDriver::from_results(vec![false, false, true, false, false, false]);
        let mut consecutive = Vec::new();
        let report = run_session(
            &driver,
            &mut selector(&["len()"]),
            allocator(),
            &quick_config(3),
            &CancelFlag::new(),
            |outcome| consecutive.push(outcome.consecutive_failures),
        );
        assert_eq!(consecutive, vec![1, 2, 0, 1, 2, 3]);
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 5);
        assert_eq!(
            report.termination_reason,
            TerminationReason::FailureThresholdExceeded
        );
    }

    #[test]
    fn unreachable_editor_is_startup_failure() {
        let driver = ScriptedDriver::unreachable();
        let report = run_session(
            &driver,
            &mut selector(&["len()"]),
            allocator(),
            &quick_config(3),
            &CancelFlag::new(),
            |_| panic!("no iterations expected"),
        );
        assert_eq!(report.termination_reason, TerminationReason::StartupFailed);
        assert_eq!(driver.materialize_calls(), 0);
    }

    #[test]
    fn invalid_label_counts_as_failure_without_driving() {
        let driver = ScriptedDriver::always_ok();
        let report = run_session(
            &driver,
            &mut selector(&["()"]),
            allocator(),
            &quick_config(2),
            &CancelFlag::new(),
            |outcome| {
                let error = outcome.error.as_deref().expect("failure");
                assert!(error.starts_with("invalid_label"), "{error}");
            },
        );
        assert_eq!(report.failure_count, 2);
        assert_eq!(driver.materialize_calls(), 0);
    }

    #[test]
    fn cancellation_is_observed_between_iterations() {
        let driver = ScriptedDriver::always_ok();
        let cancel = CancelFlag::new();
        let report = run_session(
            &driver,
            &mut selector(&["len()", "str()"]),
            allocator(),
            &quick_config(3),
            &cancel,
            |outcome| {
                if outcome.iter == 2 {
                    cancel.cancel();
                }
            },
        );
        assert_eq!(report.termination_reason, TerminationReason::Cancelled);
        assert_eq!(report.success_count, 2);
        assert_eq!(driver.materialize_calls(), 2);
    }

    #[test]
    fn cancelled_before_start_issues_no_drive_calls() {
        let driver = ScriptedDriver::always_ok();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = run_session(
            &driver,
            &mut selector(&["len()"]),
            allocator(),
            &quick_config(3),
            &cancel,
            |_| {},
        );
        assert_eq!(report.termination_reason, TerminationReason::Cancelled);
        assert_eq!(driver.materialize_calls(), 0);
    }

    #[test]
    fn identifiers_are_sequential_across_iterations() {
        let driver = ScriptedDriver::always_ok();
        let cancel = CancelFlag::new();
        run_session(
            &driver,
            &mut selector(&["len()"]),
            allocator(),
            &quick_config(3),
            &cancel,
            |outcome| {
                if outcome.iter == 3 {
                    cancel.cancel();
                }
            },
        );
        assert_eq!(
            driver.materialized_names(),
            vec![
                "len_example_001.py",
                "len_example_002.py",
                "len_example_003.py"
            ]
        );
    }

    #[test]
    fn running_session_finishes_in_terminated_state() {
        let mut session = Session::new(Duration::from_secs(1), allocator());
        assert_eq!(session.state(), SessionState::Initializing);
        session.transition(SessionState::Running);
        assert_eq!(session.state(), SessionState::Running);

        let report = session.finish(TerminationReason::Cancelled);
        assert_eq!(report.termination_reason, TerminationReason::Cancelled);
        assert_eq!(
            session.state(),
            SessionState::Terminated(TerminationReason::Cancelled)
        );
    }

    #[test]
    fn startup_failure_terminates_from_initializing() {
        let mut session = Session::new(Duration::from_secs(1), allocator());
        let report = session.finish(TerminationReason::StartupFailed);
        assert_eq!(report.success_count, 0);
        assert_eq!(
            session.state(),
            SessionState::Terminated(TerminationReason::StartupFailed)
        );
    }
}
