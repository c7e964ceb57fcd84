// src/processes/print_number.rs

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::errors::{Result, SchedError};
use crate::pipeline::{DatumType, Process, ProcessCore, StepStatus};

pub const TYPE_NAME: &str = "print_number";
pub const PORT_NUMBER: &str = "number";

/// Logs every number it receives and, if `output` is configured, appends
/// one number per line to that file.
#[derive(Debug)]
pub struct PrintNumberProcess {
    core: ProcessCore,
    output: Option<Mutex<BufWriter<File>>>,
}

impl PrintNumberProcess {
    pub fn new(name: &str, config: &Config) -> Result<Self> {
        let output = match config.raw_value("output") {
            Some(path) => {
                let path = PathBuf::from(path);
                let file = File::create(&path)
                    .with_context(|| format!("creating output file {:?} for '{name}'", path))?;
                Some(Mutex::new(BufWriter::new(file)))
            }
            None => None,
        };

        Ok(Self {
            core: ProcessCore::new(name, TYPE_NAME).with_input_port(PORT_NUMBER, true),
            output,
        })
    }

    pub fn create(name: &str, config: &Config) -> Result<Arc<dyn Process>> {
        Ok(Arc::new(Self::new(name, config)?))
    }

    fn write_line(&self, line: &str) -> Result<()> {
        if let Some(output) = &self.output {
            let mut out = output.lock().unwrap_or_else(PoisonError::into_inner);
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(output) = &self.output {
            output
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .flush()?;
        }
        Ok(())
    }
}

impl Process for PrintNumberProcess {
    fn core(&self) -> &ProcessCore {
        &self.core
    }

    fn step_impl(&self) -> Result<StepStatus> {
        let datum = self.core.grab_from_port(PORT_NUMBER)?;

        match datum.datum_type() {
            DatumType::Complete => {
                self.flush()?;
                return Ok(StepStatus::Complete);
            }
            DatumType::Empty => {}
            DatumType::Error(msg) => {
                info!(process = %self.core.name(), error = %msg, "received error datum");
            }
            DatumType::Data => {
                let value = datum.get::<i64>().copied().ok_or_else(|| {
                    SchedError::BadDatum(format!(
                        "process '{}' expected an i64 on port '{PORT_NUMBER}'",
                        self.core.name()
                    ))
                })?;
                info!(process = %self.core.name(), value, "number");
                self.write_line(&value.to_string())?;
            }
        }

        Ok(StepStatus::Continue)
    }
}
