// src/schedule/mod.rs

//! Schedules decide how the processes of a pipeline get stepped.
//!
//! - [`Schedule`] is the interface every strategy implements.
//! - [`StopFlag`] is the cooperative stop signal shared with workers.
//! - [`thread_per_process`] runs every process in its own OS thread.
//!
//! [`register_schedules`] makes the built-in strategies available through
//! the global schedule registry.

pub mod stop;
pub mod thread_per_process;

use std::sync::Arc;

pub use stop::StopFlag;
pub use thread_per_process::{ThreadPerProcessSchedule, WorkerState};

use crate::config::Config;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::registry::{schedule_registry, ScheduleCtor};

/// Module identifier used to register the built-in schedules once.
pub const MODULE_NAME: &str = "procsched:schedules";

pub trait Schedule: Send {
    /// Begin executing the pipeline.
    fn start(&mut self) -> Result<()>;

    /// Block until execution has finished.
    fn wait(&mut self) -> Result<()>;

    /// Ask execution to wind down. Does not wait.
    fn stop(&self);

    /// Handle that can stop this schedule from another thread.
    fn stop_handle(&self) -> StopFlag;
}

/// Register the built-in schedules with the global registry.
///
/// Safe to call any number of times; returns `true` only for the call that
/// actually registered them.
pub fn register_schedules() -> Result<bool> {
    schedule_registry().load_module(MODULE_NAME, |reg| {
        let ctor: Arc<ScheduleCtor> = Arc::new(make_thread_per_process);
        reg.register(
            thread_per_process::SCHEDULE_NAME,
            "Runs each process in its own thread",
            ctor,
        )
    })
}

fn make_thread_per_process(config: &Config, pipeline: Arc<Pipeline>) -> Result<Box<dyn Schedule>> {
    Ok(Box::new(ThreadPerProcessSchedule::new(config, pipeline)?))
}
