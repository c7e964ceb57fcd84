// src/processes/numbers.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tracing::debug;

use crate::config::Config;
use crate::errors::{Result, SchedError};
use crate::pipeline::{Datum, Process, ProcessCore, StepStatus};

pub const TYPE_NAME: &str = "numbers";
pub const PORT_NUMBER: &str = "number";

/// Emits `start`, `start + 1`, ... up to (excluding) `end`, one per step,
/// then completes.
#[derive(Debug)]
pub struct NumbersProcess {
    core: ProcessCore,
    next: AtomicI64,
    end: i64,
}

impl NumbersProcess {
    pub fn new(name: &str, config: &Config) -> Result<Self> {
        let start = config.get_value_or::<i64>("start", 0)?;
        let end = config.get_value_or::<i64>("end", 100)?;

        if end < start {
            return Err(SchedError::BadConfigValue {
                key: "end".to_string(),
                reason: format!("end ({end}) must not be less than start ({start})"),
            });
        }

        Ok(Self {
            core: ProcessCore::new(name, TYPE_NAME).with_output_port(PORT_NUMBER),
            next: AtomicI64::new(start),
            end,
        })
    }

    pub fn create(name: &str, config: &Config) -> Result<Arc<dyn Process>> {
        Ok(Arc::new(Self::new(name, config)?))
    }
}

impl Process for NumbersProcess {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn step_impl(&self) -> Result<StepStatus> {
        let value = self.next.fetch_add(1, Ordering::SeqCst);
        if value >= self.end {
            debug!(process = %self.core.name(), "numbers exhausted");
            return Ok(StepStatus::Complete);
        }

        self.core.push_to_port(PORT_NUMBER, Datum::new(value))?;
        Ok(StepStatus::Continue)
    }
}
