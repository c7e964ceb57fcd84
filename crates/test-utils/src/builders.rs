use std::collections::BTreeMap;
use std::sync::Arc;

use procsched::config::model::{ConnectSection, ProcessSection};
use procsched::config::{Config, PipelineFile, RawPipelineFile};
use procsched::errors::Result;
use procsched::pipeline::{Pipeline, PortAddr, Process};

/// Builder for in-memory `Pipeline`s.
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::with_config(Config::empty())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            pipeline: Pipeline::new(config),
        }
    }

    pub fn with_process(mut self, process: Arc<dyn Process>) -> Self {
        self.pipeline
            .add_process(process)
            .expect("Failed to add process from builder");
        self
    }

    /// `from`/`to` are `process.port` addresses.
    pub fn connect(mut self, from: &str, to: &str) -> Self {
        let from: PortAddr = from.parse().expect("bad upstream address");
        let to: PortAddr = to.parse().expect("bad downstream address");
        self.pipeline
            .connect(from, to)
            .expect("Failed to connect ports from builder");
        self
    }

    pub fn build(self) -> Arc<Pipeline> {
        Arc::new(self.pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `PipelineFile` to simplify test setup without TOML text.
pub struct PipelineFileBuilder {
    raw: RawPipelineFile,
}

impl PipelineFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawPipelineFile::default(),
        }
    }

    pub fn with_schedule(mut self, type_name: &str) -> Self {
        self.raw.schedule.type_name = type_name.to_string();
        self
    }

    pub fn with_process(mut self, name: &str, type_name: &str) -> Self {
        self.raw.process.insert(
            name.to_string(),
            ProcessSection {
                type_name: type_name.to_string(),
                settings: BTreeMap::new(),
            },
        );
        self
    }

    /// Add a setting to an already declared process.
    pub fn with_setting(mut self, process: &str, key: &str, value: impl Into<toml::Value>) -> Self {
        self.raw
            .process
            .get_mut(process)
            .expect("declare the process before adding settings")
            .settings
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_edge_setting(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.raw.edge.insert(key.to_string(), value.into());
        self
    }

    pub fn connect(mut self, from: &str, to: &str) -> Self {
        self.raw.connect.push(ConnectSection {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn raw(self) -> RawPipelineFile {
        self.raw
    }

    pub fn build(self) -> Result<PipelineFile> {
        PipelineFile::try_from(self.raw)
    }
}

impl Default for PipelineFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
