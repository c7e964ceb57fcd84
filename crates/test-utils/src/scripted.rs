use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use procsched::errors::{Result, SchedError};
use procsched::pipeline::{
    Constraint, Edge, Process, ProcessCore, StepStatus, PORT_HEARTBEAT,
};

/// Shared view of a scripted process, kept by the test after the process
/// has been moved into a pipeline.
#[derive(Debug, Clone, Default)]
pub struct ScriptHandle {
    steps: Arc<AtomicU64>,
    complete_requested: Arc<AtomicBool>,
}

impl ScriptHandle {
    /// Number of times `step_impl` has run.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::SeqCst)
    }

    /// Make the next step report completion.
    pub fn request_complete(&self) {
        self.complete_requested.store(true, Ordering::SeqCst);
    }
}

/// A process whose behaviour is configured up front: complete after N
/// steps, fail or panic on step N, sleep between steps, refuse heartbeat
/// connections.
pub struct ScriptedProcess {
    core: ProcessCore,
    complete_after: Option<u64>,
    fail_on_step: Option<u64>,
    panic_on_step: Option<u64>,
    step_delay: Duration,
    heartbeat: bool,
    handle: ScriptHandle,
}

impl ScriptedProcess {
    pub fn builder(name: &str) -> ScriptedProcessBuilder {
        ScriptedProcessBuilder {
            name: name.to_string(),
            constraints: Vec::new(),
            complete_after: None,
            fail_on_step: None,
            panic_on_step: None,
            step_delay: Duration::from_millis(1),
            heartbeat: true,
        }
    }
}

impl Process for ScriptedProcess {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn step_impl(&self) -> Result<StepStatus> {
        let n = self.handle.steps.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_on_step == Some(n) {
            return Err(SchedError::BadDatum(format!(
                "scripted failure of '{}' at step {n}",
                self.core.name()
            )));
        }
        if self.panic_on_step == Some(n) {
            panic!("scripted panic of '{}' at step {n}", self.core.name());
        }

        let done = self.handle.complete_requested.load(Ordering::SeqCst)
            || self.complete_after.is_some_and(|limit| n >= limit);
        if done {
            return Ok(StepStatus::Complete);
        }

        std::thread::sleep(self.step_delay);
        Ok(StepStatus::Continue)
    }

    fn connect_output_port(&self, port: &str, edge: Arc<Edge>) -> Result<()> {
        if port == PORT_HEARTBEAT && !self.heartbeat {
            return Err(SchedError::PortNotFound {
                process: self.core.name().to_string(),
                port: port.to_string(),
            });
        }
        self.core.connect_output_port(port, edge)
    }
}

pub struct ScriptedProcessBuilder {
    name: String,
    constraints: Vec<Constraint>,
    complete_after: Option<u64>,
    fail_on_step: Option<u64>,
    panic_on_step: Option<u64>,
    step_delay: Duration,
    heartbeat: bool,
}

impl ScriptedProcessBuilder {
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn complete_after(mut self, steps: u64) -> Self {
        self.complete_after = Some(steps);
        self
    }

    pub fn fail_on_step(mut self, step: u64) -> Self {
        self.fail_on_step = Some(step);
        self
    }

    pub fn panic_on_step(mut self, step: u64) -> Self {
        self.panic_on_step = Some(step);
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Reject connections to the heartbeat port.
    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat = false;
        self
    }

    pub fn build(self) -> (Arc<dyn Process>, ScriptHandle) {
        let core = self
            .constraints
            .into_iter()
            .fold(ProcessCore::new(&self.name, "scripted"), |core, c| {
                core.with_constraint(c)
            });
        let handle = ScriptHandle::default();

        let process = ScriptedProcess {
            core,
            complete_after: self.complete_after,
            fail_on_step: self.fail_on_step,
            panic_on_step: self.panic_on_step,
            step_delay: self.step_delay,
            heartbeat: self.heartbeat,
            handle: handle.clone(),
        };

        (Arc::new(process), handle)
    }
}
