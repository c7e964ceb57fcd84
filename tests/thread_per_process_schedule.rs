use std::error::Error;
use std::time::Duration;

use procsched::config::Config;
use procsched::errors::SchedError;
use procsched::pipeline::Constraint;
use procsched::schedule::{ThreadPerProcessSchedule, WorkerState};
use procsched_test_utils::builders::PipelineBuilder;
use procsched_test_utils::scripted::ScriptedProcess;
use procsched_test_utils::{init_tracing, wait_until};

type TestResult = Result<(), Box<dyn Error>>;

const PATIENCE: Duration = Duration::from_secs(5);

#[test]
fn completing_process_ends_its_worker_only() -> TestResult {
    init_tracing();

    let (a, a_handle) = ScriptedProcess::builder("A").complete_after(3).build();
    let (b, b_handle) = ScriptedProcess::builder("B").build();
    let pipeline = PipelineBuilder::new().with_process(a).with_process(b).build();

    let mut schedule = ThreadPerProcessSchedule::new(&Config::empty(), pipeline)?;
    schedule.start()?;
    assert_eq!(schedule.worker_count(), 2);

    assert!(wait_until(PATIENCE, || {
        schedule.worker_state("A") == Some(WorkerState::Completed)
    }));
    assert_eq!(a_handle.steps(), 3);

    // B keeps stepping after A is done.
    let seen = b_handle.steps();
    assert!(wait_until(PATIENCE, || b_handle.steps() > seen + 2));
    assert_eq!(schedule.worker_state("B"), Some(WorkerState::Running));
    assert!(wait_until(PATIENCE, || schedule.live_worker_count() == 1));

    schedule.stop();
    schedule.wait()?;

    assert_eq!(schedule.worker_state("B"), Some(WorkerState::Stopped));
    assert_eq!(schedule.live_worker_count(), 0);
    Ok(())
}

#[test]
fn one_live_worker_per_process_until_stop() -> TestResult {
    init_tracing();

    let mut builder = PipelineBuilder::new();
    let mut handles = Vec::new();
    for i in 0..4 {
        let (p, h) = ScriptedProcess::builder(&format!("p{i}")).build();
        builder = builder.with_process(p);
        handles.push(h);
    }

    let mut schedule = ThreadPerProcessSchedule::new(&Config::empty(), builder.build())?;
    schedule.start()?;

    assert!(wait_until(PATIENCE, || handles.iter().all(|h| h.steps() > 0)));
    assert_eq!(schedule.live_worker_count(), 4);

    schedule.stop();
    assert!(schedule.wait_timeout(PATIENCE)?);
    assert!(schedule
        .worker_states()
        .iter()
        .all(|(_, state)| *state == WorkerState::Stopped));
    Ok(())
}

#[test]
fn no_threads_process_is_rejected_by_name() {
    init_tracing();

    let (a, _) = ScriptedProcess::builder("A").build();
    let (c, c_handle) = ScriptedProcess::builder("C")
        .constraint(Constraint::NoThreads)
        .build();
    let pipeline = PipelineBuilder::new().with_process(a).with_process(c).build();

    match ThreadPerProcessSchedule::new(&Config::empty(), pipeline) {
        Err(SchedError::UnsupportedProcess(name)) => assert_eq!(name, "C"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("schedule accepted a no-threads process"),
    }
    assert_eq!(c_handle.steps(), 0);
}

#[test]
fn requested_completion_is_observed() -> TestResult {
    init_tracing();

    let (a, a_handle) = ScriptedProcess::builder("A").build();
    let pipeline = PipelineBuilder::new().with_process(a).build();

    let mut schedule = ThreadPerProcessSchedule::new(&Config::empty(), pipeline)?;
    schedule.start()?;
    assert!(wait_until(PATIENCE, || a_handle.steps() > 0));

    a_handle.request_complete();
    assert!(schedule.wait_timeout(PATIENCE)?);
    assert_eq!(schedule.worker_state("A"), Some(WorkerState::Completed));
    Ok(())
}

#[test]
fn missing_heartbeat_port_fails_the_worker() -> TestResult {
    init_tracing();

    let (a, a_handle) = ScriptedProcess::builder("A").without_heartbeat().build();
    let (b, _) = ScriptedProcess::builder("B").complete_after(2).build();
    let pipeline = PipelineBuilder::new().with_process(a).with_process(b).build();

    let mut schedule = ThreadPerProcessSchedule::new(&Config::empty(), pipeline)?;
    schedule.start()?;

    let err = schedule.wait().unwrap_err();
    match err {
        SchedError::WorkerFailed { process, source } => {
            assert_eq!(process, "A");
            assert!(matches!(*source, SchedError::PortNotFound { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(a_handle.steps(), 0);
    assert_eq!(schedule.worker_state("A"), Some(WorkerState::Failed));
    assert_eq!(schedule.worker_state("B"), Some(WorkerState::Completed));
    Ok(())
}

#[test]
fn step_error_does_not_stop_siblings() -> TestResult {
    init_tracing();

    let (a, _) = ScriptedProcess::builder("A").fail_on_step(2).build();
    let (b, b_handle) = ScriptedProcess::builder("B").build();
    let pipeline = PipelineBuilder::new().with_process(a).with_process(b).build();

    let mut schedule = ThreadPerProcessSchedule::new(&Config::empty(), pipeline)?;
    schedule.start()?;

    assert!(wait_until(PATIENCE, || {
        schedule.worker_state("A") == Some(WorkerState::Failed)
    }));
    let seen = b_handle.steps();
    assert!(wait_until(PATIENCE, || b_handle.steps() > seen));

    schedule.stop();
    let err = schedule.wait().unwrap_err();
    assert!(matches!(err, SchedError::WorkerFailed { ref process, .. } if process == "A"));
    assert_eq!(schedule.worker_state("B"), Some(WorkerState::Stopped));
    Ok(())
}

#[test]
fn panicking_worker_is_reported() -> TestResult {
    init_tracing();

    let (a, _) = ScriptedProcess::builder("A").panic_on_step(1).build();
    let pipeline = PipelineBuilder::new().with_process(a).build();

    let mut schedule = ThreadPerProcessSchedule::new(&Config::empty(), pipeline)?;
    schedule.start()?;

    // Visible without joining.
    assert!(wait_until(PATIENCE, || {
        schedule.worker_state("A") == Some(WorkerState::Failed)
    }));
    assert!(wait_until(PATIENCE, || schedule.live_worker_count() == 0));

    let err = schedule.wait().unwrap_err();
    assert!(matches!(err, SchedError::WorkerPanicked(ref p) if p == "A"));
    assert_eq!(schedule.worker_state("A"), Some(WorkerState::Failed));
    Ok(())
}

#[test]
fn stop_before_start_means_no_steps() -> TestResult {
    init_tracing();

    let (a, a_handle) = ScriptedProcess::builder("A").build();
    let pipeline = PipelineBuilder::new().with_process(a).build();

    let mut schedule = ThreadPerProcessSchedule::new(&Config::empty(), pipeline)?;
    schedule.stop();
    schedule.start()?;
    schedule.wait()?;

    assert_eq!(a_handle.steps(), 0);
    assert_eq!(schedule.worker_state("A"), Some(WorkerState::Stopped));
    Ok(())
}

#[test]
fn second_start_is_rejected() -> TestResult {
    init_tracing();

    let (a, _) = ScriptedProcess::builder("A").complete_after(1).build();
    let pipeline = PipelineBuilder::new().with_process(a).build();

    let mut schedule = ThreadPerProcessSchedule::new(&Config::empty(), pipeline)?;
    schedule.start()?;
    assert!(matches!(schedule.start(), Err(SchedError::AlreadyStarted)));
    schedule.wait()?;
    Ok(())
}
