// src/schedule/thread_per_process.rs

//! Thread-per-process schedule.
//!
//! Every process in the pipeline gets one OS thread (a *worker*). A worker
//! wires a private monitor edge to its process's heartbeat port, then
//! alternates between stepping the process and draining the monitor until
//! either a `Complete` datum shows up or the shared stop flag is set.
//!
//! Stopping is cooperative: a worker blocked inside `Process::step` only
//! notices the stop flag once that step returns.
//!
//! A worker whose process errors or panics shuts the process down, so
//! downstream consumers see `Complete` and upstream producers are not left
//! blocked on its inputs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, warn};

use crate::config::Config;
use crate::errors::{Result, SchedError};
use crate::pipeline::{Constraint, Edge, Pipeline, Process, PORT_HEARTBEAT};
use crate::schedule::{Schedule, StopFlag};

/// Registry name of this schedule.
pub const SCHEDULE_NAME: &str = "thread_per_process";

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Lifecycle of a single worker.
///
/// `Created → Running → {Completed | Stopped | Failed}`; the last three are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    /// The process signalled completion on its heartbeat port.
    Completed,
    /// The stop flag was observed first.
    Stopped,
    /// Connecting or stepping the process returned an error, or the worker
    /// panicked.
    Failed,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkerState::Completed | WorkerState::Stopped | WorkerState::Failed
        )
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Created,
            1 => WorkerState::Running,
            2 => WorkerState::Completed,
            3 => WorkerState::Stopped,
            _ => WorkerState::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Created => 0,
            WorkerState::Running => 1,
            WorkerState::Completed => 2,
            WorkerState::Stopped => 3,
            WorkerState::Failed => 4,
        }
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: WorkerState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct Worker {
    process: String,
    state: Arc<StateCell>,
    handle: Option<JoinHandle<Result<()>>>,
}

/// Everything a worker thread needs, moved into the thread.
struct WorkerContext {
    process: Arc<dyn Process>,
    monitor_config: Config,
    stop: StopFlag,
    state: Arc<StateCell>,
}

#[derive(Debug)]
pub struct ThreadPerProcessSchedule {
    config: Config,
    pipeline: Arc<Pipeline>,
    monitor_config: Config,
    stop: StopFlag,
    workers: Vec<Worker>,
    started: bool,
}

impl ThreadPerProcessSchedule {
    /// Validate the pipeline for threaded execution.
    ///
    /// Fails with [`SchedError::UnsupportedProcess`] naming the first
    /// process (in pipeline order) that declares [`Constraint::NoThreads`].
    pub fn new(config: &Config, pipeline: Arc<Pipeline>) -> Result<Self> {
        for name in pipeline.process_names() {
            let process = pipeline.process_by_name(&name)?;

            if process.constraints().contains(&Constraint::NoThreads) {
                warn!(process = %name, "process cannot run in its own thread");
                return Err(SchedError::UnsupportedProcess(name));
            }
        }

        Ok(Self {
            config: config.clone(),
            pipeline,
            monitor_config: make_monitor_config(),
            stop: StopFlag::new(),
            workers: Vec::new(),
            started: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Spawn one worker thread per process.
    ///
    /// All processes are resolved before any thread is spawned. A second
    /// call returns [`SchedError::AlreadyStarted`].
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(SchedError::AlreadyStarted);
        }

        let mut processes = Vec::new();
        for name in self.pipeline.process_names() {
            processes.push(self.pipeline.process_by_name(&name)?);
        }

        self.started = true;
        self.workers = processes
            .iter()
            .map(|process| Worker {
                process: process.name().to_string(),
                state: Arc::new(StateCell::new(WorkerState::Created)),
                handle: None,
            })
            .collect();

        info!(workers = self.workers.len(), "starting thread-per-process schedule");

        for (idx, process) in processes.into_iter().enumerate() {
            let worker = &mut self.workers[idx];
            let ctx = WorkerContext {
                process,
                monitor_config: self.monitor_config.clone(),
                stop: self.stop.clone(),
                state: Arc::clone(&worker.state),
            };

            match thread::Builder::new()
                .name(worker.process.clone())
                .spawn(move || run_worker(ctx))
            {
                Ok(handle) => worker.handle = Some(handle),
                Err(err) => {
                    error!(
                        process = %worker.process,
                        error = %err,
                        "failed to spawn worker thread; stopping schedule"
                    );
                    worker.state.set(WorkerState::Failed);
                    for never_started in &self.workers[idx + 1..] {
                        never_started.state.set(WorkerState::Stopped);
                    }
                    self.stop.set();
                    return Err(err.into());
                }
            }
        }

        Ok(())
    }

    /// Join every worker.
    ///
    /// All workers are joined even when some failed; the first failure in
    /// pipeline order is returned. Calling this again (or before `start`)
    /// returns immediately.
    pub fn wait(&mut self) -> Result<()> {
        let mut first_failure = None;

        for worker in &mut self.workers {
            let Some(handle) = worker.handle.take() else {
                continue;
            };

            let failure = match handle.join() {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(SchedError::WorkerFailed {
                    process: worker.process.clone(),
                    source: Box::new(err),
                }),
                Err(_) => {
                    worker.state.set(WorkerState::Failed);
                    error!(process = %worker.process, "worker thread panicked");
                    Some(SchedError::WorkerPanicked(worker.process.clone()))
                }
            };
            first_failure = first_failure.or(failure);
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    ///
    /// Returns `Ok(false)` if some worker is still running at the deadline;
    /// nothing is joined in that case.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;

        loop {
            let all_finished = self
                .workers
                .iter()
                .all(|w| w.handle.as_ref().is_none_or(|h| h.is_finished()));

            if all_finished {
                self.wait()?;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    pub fn stop(&self) {
        debug!("stop requested for thread-per-process schedule");
        self.stop.set();
    }

    pub fn stop_handle(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Workers whose thread has not finished yet.
    pub fn live_worker_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.handle.as_ref().is_some_and(|h| !h.is_finished()))
            .count()
    }

    /// Current state of each worker, in pipeline order.
    pub fn worker_states(&self) -> Vec<(String, WorkerState)> {
        self.workers
            .iter()
            .map(|w| (w.process.clone(), w.state.get()))
            .collect()
    }

    pub fn worker_state(&self, process: &str) -> Option<WorkerState> {
        self.workers
            .iter()
            .find(|w| w.process == process)
            .map(|w| w.state.get())
    }
}

impl Schedule for ThreadPerProcessSchedule {
    fn start(&mut self) -> Result<()> {
        ThreadPerProcessSchedule::start(self)
    }

    fn wait(&mut self) -> Result<()> {
        ThreadPerProcessSchedule::wait(self)
    }

    fn stop(&self) {
        ThreadPerProcessSchedule::stop(self)
    }

    fn stop_handle(&self) -> StopFlag {
        ThreadPerProcessSchedule::stop_handle(self)
    }
}

impl Drop for ThreadPerProcessSchedule {
    fn drop(&mut self) {
        if self.workers.iter().any(|w| w.handle.is_some()) {
            warn!("schedule dropped without wait(); setting stop flag and detaching workers");
            self.stop.set();
        }
    }
}

/// Config for the per-worker monitor edges. Empty means unbounded.
fn make_monitor_config() -> Config {
    Config::empty()
}

fn run_worker(ctx: WorkerContext) -> Result<()> {
    let span = info_span!("worker", process = %ctx.process.name());
    let _enter = span.enter();

    match panic::catch_unwind(AssertUnwindSafe(|| drive_process(&ctx))) {
        Ok(Ok(state)) => {
            ctx.state.set(state);
            debug!(?state, "worker finished");
            Ok(())
        }
        Ok(Err(err)) => {
            ctx.state.set(WorkerState::Failed);
            error!(error = %err, "worker failed");
            ctx.process.core().shut_down();
            Err(err)
        }
        Err(payload) => {
            ctx.state.set(WorkerState::Failed);
            error!("worker panicked");
            ctx.process.core().shut_down();
            panic::resume_unwind(payload)
        }
    }
}

/// Keeps the monitor edge attached to the heartbeat port for as long as it
/// lives, unwinding included.
struct MonitorLink<'a> {
    process: &'a dyn Process,
    edge: Arc<Edge>,
}

impl<'a> MonitorLink<'a> {
    fn attach(process: &'a dyn Process, config: &Config) -> Result<Self> {
        let edge = Arc::new(Edge::new(config)?);
        process.connect_output_port(PORT_HEARTBEAT, Arc::clone(&edge))?;
        Ok(Self { process, edge })
    }
}

impl Drop for MonitorLink<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.process.disconnect_output_port(PORT_HEARTBEAT, &self.edge) {
            debug!(error = %err, "could not disconnect monitor edge");
        }
    }
}

fn drive_process(ctx: &WorkerContext) -> Result<WorkerState> {
    let monitor = MonitorLink::attach(ctx.process.as_ref(), &ctx.monitor_config)?;

    ctx.state.set(WorkerState::Running);
    debug!("worker running");

    step_until_done(ctx, &monitor.edge)
}

fn step_until_done(ctx: &WorkerContext, monitor: &Edge) -> Result<WorkerState> {
    let mut complete = false;
    let mut steps: u64 = 0;

    while !complete && !ctx.stop.is_set() {
        ctx.process.step()?;
        steps += 1;

        // Drain everything, even after seeing `Complete`.
        while let Some(datum) = monitor.try_get_datum() {
            if datum.is_complete() {
                complete = true;
            }
        }
    }

    if complete {
        debug!(steps, "process signalled completion");
        Ok(WorkerState::Completed)
    } else {
        debug!(steps, "stop flag observed");
        Ok(WorkerState::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ProcessCore, StepStatus};
    use std::sync::atomic::AtomicU64;

    struct Ticker {
        core: ProcessCore,
        complete_after: Option<u64>,
        ticks: AtomicU64,
    }

    impl Ticker {
        fn arc(name: &str, complete_after: Option<u64>) -> Arc<dyn Process> {
            Arc::new(Ticker {
                core: ProcessCore::new(name, "ticker"),
                complete_after,
                ticks: AtomicU64::new(0),
            })
        }

        fn no_threads(name: &str) -> Arc<dyn Process> {
            Arc::new(Ticker {
                core: ProcessCore::new(name, "ticker").with_constraint(Constraint::NoThreads),
                complete_after: None,
                ticks: AtomicU64::new(0),
            })
        }
    }

    impl Process for Ticker {
        fn core(&self) -> &ProcessCore {
            &self.core
        }

        fn step_impl(&self) -> Result<StepStatus> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if self.complete_after.is_some_and(|limit| n >= limit) {
                return Ok(StepStatus::Complete);
            }
            thread::sleep(Duration::from_millis(1));
            Ok(StepStatus::Continue)
        }
    }

    fn pipeline(processes: Vec<Arc<dyn Process>>) -> Arc<Pipeline> {
        let mut pipe = Pipeline::new(Config::empty());
        for p in processes {
            pipe.add_process(p).unwrap();
        }
        Arc::new(pipe)
    }

    #[test]
    fn construction_creates_no_workers() {
        let pipe = pipeline(vec![Ticker::arc("a", None), Ticker::arc("b", None)]);
        let sched = ThreadPerProcessSchedule::new(&Config::empty(), pipe).unwrap();

        assert_eq!(sched.worker_count(), 0);
        assert!(!sched.is_started());
    }

    #[test]
    fn no_threads_constraint_names_first_offender() {
        let pipe = pipeline(vec![
            Ticker::arc("a", None),
            Ticker::no_threads("c"),
            Ticker::no_threads("d"),
        ]);

        match ThreadPerProcessSchedule::new(&Config::empty(), pipe) {
            Err(SchedError::UnsupportedProcess(name)) => assert_eq!(name, "c"),
            other => panic!("expected UnsupportedProcess, got {other:?}"),
        }
    }

    #[test]
    fn completing_processes_finish_without_stop() {
        let pipe = pipeline(vec![Ticker::arc("a", Some(3)), Ticker::arc("b", Some(1))]);
        let mut sched = ThreadPerProcessSchedule::new(&Config::empty(), pipe).unwrap();

        sched.start().unwrap();
        assert!(sched.wait_timeout(Duration::from_secs(5)).unwrap());

        for (name, state) in sched.worker_states() {
            assert_eq!(state, WorkerState::Completed, "worker {name}");
        }
    }

    #[test]
    fn second_start_is_rejected() {
        let pipe = pipeline(vec![Ticker::arc("a", Some(1))]);
        let mut sched = ThreadPerProcessSchedule::new(&Config::empty(), pipe).unwrap();

        sched.start().unwrap();
        assert!(matches!(sched.start(), Err(SchedError::AlreadyStarted)));
        sched.wait().unwrap();
        assert_eq!(sched.worker_count(), 1);
    }

    #[test]
    fn wait_before_start_and_twice_returns_immediately() {
        let pipe = pipeline(vec![Ticker::arc("a", Some(1))]);
        let mut sched = ThreadPerProcessSchedule::new(&Config::empty(), pipe).unwrap();

        sched.wait().unwrap();
        sched.start().unwrap();
        sched.wait().unwrap();
        sched.wait().unwrap();
    }

    #[test]
    fn stop_before_start_makes_workers_exit_without_stepping() {
        let pipe = pipeline(vec![Ticker::arc("a", None), Ticker::arc("b", None)]);
        let mut sched = ThreadPerProcessSchedule::new(&Config::empty(), Arc::clone(&pipe)).unwrap();

        sched.stop();
        sched.start().unwrap();
        assert!(sched.wait_timeout(Duration::from_secs(5)).unwrap());

        for (_, state) in sched.worker_states() {
            assert_eq!(state, WorkerState::Stopped);
        }
        let a = pipe.process_by_name("a").unwrap();
        assert_eq!(a.core().step_count(), 0);
    }

    #[test]
    fn stop_handle_stops_running_workers() {
        let pipe = pipeline(vec![Ticker::arc("a", None)]);
        let mut sched = ThreadPerProcessSchedule::new(&Config::empty(), pipe).unwrap();
        let handle = sched.stop_handle();

        sched.start().unwrap();
        assert!(!sched.wait_timeout(Duration::from_millis(20)).unwrap());

        handle.set();
        assert!(sched.wait_timeout(Duration::from_secs(5)).unwrap());
        assert_eq!(sched.worker_state("a"), Some(WorkerState::Stopped));
        assert_eq!(sched.live_worker_count(), 0);
    }

    #[test]
    fn monitor_edge_is_disconnected_after_exit() {
        let pipe = pipeline(vec![Ticker::arc("a", Some(1))]);
        let mut sched = ThreadPerProcessSchedule::new(&Config::empty(), Arc::clone(&pipe)).unwrap();
        sched.start().unwrap();
        sched.wait().unwrap();

        // A fresh heartbeat edge is the only receiver left.
        let a = pipe.process_by_name("a").unwrap();
        let heartbeat = Arc::new(Edge::new(&Config::empty()).unwrap());
        a.connect_output_port(PORT_HEARTBEAT, Arc::clone(&heartbeat)).unwrap();
        a.step().unwrap();
        assert_eq!(heartbeat.datum_count(), 1);
    }

    struct Faulty {
        core: ProcessCore,
        panics: bool,
    }

    impl Process for Faulty {
        fn core(&self) -> &ProcessCore {
            &self.core
        }

        fn step_impl(&self) -> Result<StepStatus> {
            if self.panics {
                panic!("faulty process '{}'", self.core.name());
            }
            Err(SchedError::BadDatum("broken".to_string()))
        }
    }

    /// Reads `in` until it completes.
    struct Drain {
        core: ProcessCore,
    }

    impl Process for Drain {
        fn core(&self) -> &ProcessCore {
            &self.core
        }

        fn step_impl(&self) -> Result<StepStatus> {
            if self.core.grab_from_port("in")?.is_complete() {
                return Ok(StepStatus::Complete);
            }
            Ok(StepStatus::Continue)
        }
    }

    fn faulty_into_drain(panics: bool) -> Arc<Pipeline> {
        let mut pipe = Pipeline::new(Config::empty());
        pipe.add_process(Arc::new(Faulty {
            core: ProcessCore::new("src", "faulty").with_output_port("out"),
            panics,
        }))
        .unwrap();
        pipe.add_process(Arc::new(Drain {
            core: ProcessCore::new("sink", "drain").with_input_port("in", true),
        }))
        .unwrap();
        pipe.connect(
            crate::pipeline::PortAddr::new("src", "out"),
            crate::pipeline::PortAddr::new("sink", "in"),
        )
        .unwrap();
        Arc::new(pipe)
    }

    #[test]
    fn failed_producer_completes_its_consumers() {
        let mut sched =
            ThreadPerProcessSchedule::new(&Config::empty(), faulty_into_drain(false)).unwrap();
        sched.start().unwrap();

        match sched.wait_timeout(Duration::from_secs(5)) {
            Err(SchedError::WorkerFailed { process, .. }) => assert_eq!(process, "src"),
            other => panic!("expected WorkerFailed, got {other:?}"),
        }
        assert_eq!(sched.worker_state("src"), Some(WorkerState::Failed));
        assert_eq!(sched.worker_state("sink"), Some(WorkerState::Completed));
    }

    #[test]
    fn panicked_worker_is_failed_before_wait() {
        let pipe = faulty_into_drain(true);
        let mut sched = ThreadPerProcessSchedule::new(&Config::empty(), Arc::clone(&pipe)).unwrap();
        sched.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while sched.live_worker_count() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(sched.live_worker_count(), 0);
        assert_eq!(sched.worker_state("src"), Some(WorkerState::Failed));
        assert_eq!(sched.worker_state("sink"), Some(WorkerState::Completed));
        assert!(pipe.process_by_name("src").unwrap().core().is_complete());

        assert!(matches!(sched.wait(), Err(SchedError::WorkerPanicked(p)) if p == "src"));
    }
}
