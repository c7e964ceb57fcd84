// src/processes/mod.rs

//! Built-in processes.
//!
//! - [`numbers`]: source counting from `start` to `end`.
//! - [`multiplication`]: multiplies two input streams.
//! - [`print_number`]: sink that logs numbers and optionally writes them out.

pub mod multiplication;
pub mod numbers;
pub mod print_number;

use std::sync::Arc;

pub use multiplication::MultiplicationProcess;
pub use numbers::NumbersProcess;
pub use print_number::PrintNumberProcess;

use crate::errors::Result;
use crate::registry::{process_registry, ProcessCtor};

/// Module identifier used to register the built-in processes once.
pub const MODULE_NAME: &str = "procsched:processes";

/// Register the built-in processes with the global registry.
///
/// Returns `true` only for the call that actually registered them.
pub fn register_processes() -> Result<bool> {
    process_registry().load_module(MODULE_NAME, |reg| {
        let ctor: Arc<ProcessCtor> = Arc::new(NumbersProcess::create);
        reg.register(numbers::TYPE_NAME, "Outputs numbers within a range", ctor)?;

        let ctor: Arc<ProcessCtor> = Arc::new(MultiplicationProcess::create);
        reg.register(multiplication::TYPE_NAME, "Multiplies numbers", ctor)?;

        let ctor: Arc<ProcessCtor> = Arc::new(PrintNumberProcess::create);
        reg.register(print_number::TYPE_NAME, "Prints numbers", ctor)
    })
}
