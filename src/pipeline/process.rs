// src/pipeline/process.rs

//! The process abstraction.
//!
//! A process is a named unit of computation with ports and a `step`
//! operation. Concrete processes implement [`Process`] on top of a
//! [`ProcessCore`], which owns everything that is common to all processes:
//! declared ports, edge connections, constraints, completion state and the
//! heartbeat port.
//!
//! Processes are shared (`Arc<dyn Process>`) between the pipeline that owns
//! them and whatever schedule steps them, so every method takes `&self`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::errors::{Result, SchedError};
use crate::pipeline::{Datum, Edge};

/// Reserved output port every process exposes. After each step it receives
/// an `Empty` datum, or `Complete` once the process has finished.
pub const PORT_HEARTBEAT: &str = "_heartbeat";

/// Capabilities a process can opt out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constraint {
    /// Must not be stepped from a thread of its own.
    NoThreads,
    /// `step` must not run concurrently with itself.
    NoReentrancy,
    /// Inputs may arrive out of sync with each other.
    UnsyncInput,
    /// Outputs may be produced out of sync with each other.
    UnsyncOutput,
}

pub type Constraints = BTreeSet<Constraint>;

/// What a single step of a process reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Continue,
    Complete,
}

pub trait Process: Send + Sync {
    /// Shared bookkeeping for this process.
    fn core(&self) -> &ProcessCore;

    /// Process-specific work for one step.
    fn step_impl(&self) -> Result<StepStatus>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn type_name(&self) -> &str {
        self.core().type_name()
    }

    fn constraints(&self) -> &Constraints {
        self.core().constraints()
    }

    fn input_ports(&self) -> Vec<String> {
        self.core().input_ports()
    }

    fn output_ports(&self) -> Vec<String> {
        self.core().output_ports()
    }

    fn connect_input_port(&self, port: &str, edge: Arc<Edge>) -> Result<()> {
        self.core().connect_input_port(port, edge)
    }

    fn connect_output_port(&self, port: &str, edge: Arc<Edge>) -> Result<()> {
        self.core().connect_output_port(port, edge)
    }

    fn disconnect_output_port(&self, port: &str, edge: &Arc<Edge>) -> Result<()> {
        self.core().disconnect_output_port(port, edge)
    }

    /// Advance the process by one unit of work and emit its heartbeat.
    fn step(&self) -> Result<()> {
        self.core().run_step(|| self.step_impl())
    }
}

#[derive(Debug)]
pub struct ProcessCore {
    name: String,
    type_name: String,
    constraints: Constraints,
    /// Input port name → required.
    input_ports: BTreeMap<String, bool>,
    output_ports: BTreeSet<String>,
    input_edges: Mutex<HashMap<String, Arc<Edge>>>,
    output_edges: Mutex<HashMap<String, Vec<Arc<Edge>>>>,
    complete: AtomicBool,
    steps: AtomicU64,
    step_lock: Mutex<()>,
}

impl ProcessCore {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let mut output_ports = BTreeSet::new();
        output_ports.insert(PORT_HEARTBEAT.to_string());

        Self {
            name: name.into(),
            type_name: type_name.into(),
            constraints: Constraints::new(),
            input_ports: BTreeMap::new(),
            output_ports,
            input_edges: Mutex::new(HashMap::new()),
            output_edges: Mutex::new(HashMap::new()),
            complete: AtomicBool::new(false),
            steps: AtomicU64::new(0),
            step_lock: Mutex::new(()),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.insert(constraint);
        self
    }

    pub fn with_input_port(mut self, port: impl Into<String>, required: bool) -> Self {
        self.input_ports.insert(port.into(), required);
        self
    }

    pub fn with_output_port(mut self, port: impl Into<String>) -> Self {
        self.output_ports.insert(port.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn input_ports(&self) -> Vec<String> {
        self.input_ports.keys().cloned().collect()
    }

    pub fn output_ports(&self) -> Vec<String> {
        self.output_ports.iter().cloned().collect()
    }

    /// `None` if the port does not exist.
    pub fn is_input_required(&self, port: &str) -> Option<bool> {
        self.input_ports.get(port).copied()
    }

    pub fn is_input_connected(&self, port: &str) -> bool {
        lock(&self.input_edges).contains_key(port)
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Number of steps taken so far.
    pub fn step_count(&self) -> u64 {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn connect_input_port(&self, port: &str, edge: Arc<Edge>) -> Result<()> {
        if !self.input_ports.contains_key(port) {
            return Err(self.port_not_found(port));
        }

        let mut edges = lock(&self.input_edges);
        if edges.contains_key(port) {
            return Err(SchedError::PortAlreadyConnected {
                process: self.name.clone(),
                port: port.to_string(),
            });
        }
        edges.insert(port.to_string(), edge);
        Ok(())
    }

    pub fn connect_output_port(&self, port: &str, edge: Arc<Edge>) -> Result<()> {
        if !self.output_ports.contains(port) {
            return Err(self.port_not_found(port));
        }

        lock(&self.output_edges)
            .entry(port.to_string())
            .or_default()
            .push(edge);
        Ok(())
    }

    /// Remove one specific edge from an output port. Removing an edge that
    /// is not connected is a no-op.
    pub fn disconnect_output_port(&self, port: &str, edge: &Arc<Edge>) -> Result<()> {
        if !self.output_ports.contains(port) {
            return Err(self.port_not_found(port));
        }

        if let Some(edges) = lock(&self.output_edges).get_mut(port) {
            edges.retain(|e| !Arc::ptr_eq(e, edge));
        }
        Ok(())
    }

    /// Take the next datum from an input port, blocking until one arrives.
    pub fn grab_from_port(&self, port: &str) -> Result<Datum> {
        let edge = lock(&self.input_edges)
            .get(port)
            .cloned()
            .ok_or_else(|| self.port_not_found(port))?;

        Ok(edge.get_datum())
    }

    /// Push a datum to every edge connected to an output port.
    pub fn push_to_port(&self, port: &str, datum: Datum) -> Result<()> {
        if !self.output_ports.contains(port) {
            return Err(self.port_not_found(port));
        }

        // Clone the edge list so a blocking push does not hold the lock.
        let edges = lock(&self.output_edges)
            .get(port)
            .cloned()
            .unwrap_or_default();

        for edge in edges {
            edge.push_datum(datum.clone());
        }
        Ok(())
    }

    pub fn push_to_all_outputs(&self, datum: Datum) {
        let edges: Vec<Arc<Edge>> = lock(&self.output_edges)
            .values()
            .flat_map(|edges| edges.iter().cloned())
            .collect();

        for edge in edges {
            edge.push_datum(datum.clone());
        }
    }

    /// Run one step of the owning process.
    ///
    /// A complete process does not run `step` again; it re-announces
    /// completion on the heartbeat port instead.
    pub fn run_step<F>(&self, step: F) -> Result<()>
    where
        F: FnOnce() -> Result<StepStatus>,
    {
        let _guard = if self.constraints.contains(&Constraint::NoReentrancy) {
            Some(lock(&self.step_lock))
        } else {
            None
        };

        if self.is_complete() {
            return self.push_to_port(PORT_HEARTBEAT, Datum::complete());
        }

        let status = step()?;
        let step_no = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(process = %self.name, step = step_no, ?status, "process stepped");

        match status {
            StepStatus::Continue => self.push_to_port(PORT_HEARTBEAT, Datum::empty()),
            StepStatus::Complete => {
                self.shut_down();
                Ok(())
            }
        }
    }

    /// Mark the process complete without stepping it again.
    ///
    /// Every output (heartbeat included) receives `Complete`, and every
    /// input edge is marked downstream-complete so producers blocked on a
    /// full edge are released.
    pub fn shut_down(&self) {
        if self.complete.swap(true, Ordering::SeqCst) {
            return;
        }

        let inputs: Vec<Arc<Edge>> = lock(&self.input_edges).values().cloned().collect();
        for edge in inputs {
            edge.mark_downstream_complete();
        }
        self.push_to_all_outputs(Datum::complete());
    }

    fn port_not_found(&self, port: &str) -> SchedError {
        SchedError::PortNotFound {
            process: self.name.clone(),
            port: port.to_string(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
