// src/pipeline/mod.rs

//! Minimal pipeline framework that schedules run against.
//!
//! - [`datum`] defines the tagged values that travel between processes.
//! - [`edge`] is the thread-safe queue connecting two ports.
//! - [`process`] holds the `Process` trait, its shared `ProcessCore` and
//!   the constraint model.
//! - [`graph`] is the `Pipeline`: named processes plus their connections.
//! - [`export_dot`] renders a pipeline for Graphviz.

pub mod datum;
pub mod edge;
pub mod export_dot;
pub mod graph;
pub mod process;

pub use datum::{Datum, DatumType};
pub use edge::Edge;
pub use export_dot::export_dot;
pub use graph::{Connection, Pipeline, PortAddr};
pub use process::{Constraint, Constraints, Process, ProcessCore, StepStatus, PORT_HEARTBEAT};
