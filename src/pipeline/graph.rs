// src/pipeline/graph.rs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::errors::{Result, SchedError};
use crate::pipeline::{Edge, Process};

/// Pipeline config block used to build connection edges.
pub const EDGE_BLOCK: &str = "edge";

/// `process.port` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortAddr {
    pub process: String,
    pub port: String,
}

impl PortAddr {
    pub fn new(process: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.process, self.port)
    }
}

impl FromStr for PortAddr {
    type Err = String;

    /// Splits on the first `.`; port names may themselves contain dots.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((process, port)) if !process.is_empty() && !port.is_empty() => {
                Ok(PortAddr::new(process, port))
            }
            _ => Err(format!(
                "invalid port address {s:?} (expected \"<process>.<port>\")"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub upstream: PortAddr,
    pub downstream: PortAddr,
}

/// An ordered set of named processes and the edges between their ports.
///
/// Processes keep their insertion order; that order is what
/// [`Pipeline::process_names`] reports and what schedules iterate.
pub struct Pipeline {
    config: Config,
    processes: Vec<Arc<dyn Process>>,
    index: HashMap<String, usize>,
    connections: Vec<Connection>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("processes", &self.process_names())
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            processes: Vec::new(),
            index: HashMap::new(),
            connections: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn add_process(&mut self, process: Arc<dyn Process>) -> Result<()> {
        let name = process.name().to_string();
        if self.index.contains_key(&name) {
            return Err(SchedError::DuplicateProcessName(name));
        }

        debug!(process = %name, type_name = %process.type_name(), "adding process to pipeline");
        self.index.insert(name, self.processes.len());
        self.processes.push(process);
        Ok(())
    }

    /// Connect an output port to an input port through a new edge.
    pub fn connect(&mut self, upstream: PortAddr, downstream: PortAddr) -> Result<()> {
        let up = self.process_by_name(&upstream.process)?;
        let down = self.process_by_name(&downstream.process)?;

        let edge = Arc::new(Edge::new(&self.config.subblock(EDGE_BLOCK))?);

        down.connect_input_port(&downstream.port, Arc::clone(&edge))?;
        up.connect_output_port(&upstream.port, edge)?;

        debug!(from = %upstream, to = %downstream, "connected ports");
        self.connections.push(Connection {
            upstream,
            downstream,
        });
        Ok(())
    }

    pub fn process_names(&self) -> Vec<String> {
        self.processes.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn process_by_name(&self, name: &str) -> Result<Arc<dyn Process>> {
        self.index
            .get(name)
            .map(|&idx| Arc::clone(&self.processes[idx]))
            .ok_or_else(|| SchedError::ProcessNotFound(name.to_string()))
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Downstream addresses fed by `process.port`.
    pub fn receivers_for_port(&self, process: &str, port: &str) -> Vec<PortAddr> {
        self.connections
            .iter()
            .filter(|c| c.upstream.process == process && c.upstream.port == port)
            .map(|c| c.downstream.clone())
            .collect()
    }

    /// Check that every required input port has been connected.
    pub fn setup(&self) -> Result<()> {
        for process in &self.processes {
            let core = process.core();
            for port in core.input_ports() {
                if core.is_input_required(&port) == Some(true) && !core.is_input_connected(&port)
                {
                    return Err(SchedError::MissingConnection {
                        process: process.name().to_string(),
                        port,
                    });
                }
            }
        }
        Ok(())
    }
}
