// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::config::Config;
use crate::errors::{Result, SchedError};
use crate::pipeline::Connection;
use crate::schedule::thread_per_process::SCHEDULE_NAME;

/// Pipeline file as read from TOML, before validation.
///
/// ```toml
/// [schedule]
/// type = "thread_per_process"
///
/// [edge]
/// capacity = 8
///
/// [process.numbers]
/// type = "numbers"
/// end = 10
///
/// [process.print]
/// type = "print_number"
///
/// [[connect]]
/// from = "numbers.number"
/// to = "print.number"
/// ```
///
/// Every section is optional at parse time; validation requires at least
/// one process.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub schedule: ScheduleSection,

    /// Settings for every connection edge (`capacity`, ...).
    #[serde(default)]
    pub edge: BTreeMap<String, toml::Value>,

    /// Processes keyed by process name, in declaration order.
    #[serde(default)]
    pub process: ProcessTable,

    #[serde(default)]
    pub connect: Vec<ConnectSection>,
}

/// `[schedule]` section. Keys other than `type` become schedule config.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    #[serde(rename = "type", default = "default_schedule_type")]
    pub type_name: String,

    #[serde(flatten)]
    pub settings: BTreeMap<String, toml::Value>,
}

fn default_schedule_type() -> String {
    SCHEDULE_NAME.to_string()
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            type_name: default_schedule_type(),
            settings: BTreeMap::new(),
        }
    }
}

/// `[process.<name>]` section. Keys other than `type` become process config.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSection {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(flatten)]
    pub settings: BTreeMap<String, toml::Value>,
}

/// The `[process.*]` sections, in the order the file declares them.
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    entries: Vec<(String, ProcessSection)>,
}

impl ProcessTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProcessSection)> {
        self.entries.iter().map(|(name, section)| (name.as_str(), section))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ProcessSection> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, section)| section)
    }

    /// Replaces an existing section in place, otherwise appends.
    pub fn insert(&mut self, name: impl Into<String>, section: ProcessSection) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => *existing = section,
            None => self.entries.push((name, section)),
        }
    }
}

impl<'de> Deserialize<'de> for ProcessTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ProcessTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of process sections")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = ProcessTable::default();
                while let Some((name, section)) = map.next_entry::<String, ProcessSection>()? {
                    table.insert(name, section);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// `[[connect]]` entry: `from` and `to` are `process.port` addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectSection {
    pub from: String,
    pub to: String,
}

/// A process declaration from a validated file.
#[derive(Debug, Clone)]
pub struct ProcessDecl {
    pub name: String,
    pub type_name: String,
    pub config: Config,
}

/// Validated pipeline file. Build one with `PipelineFile::try_from(raw)`.
///
/// Processes are listed in declaration order.
#[derive(Debug, Clone)]
pub struct PipelineFile {
    schedule_type: String,
    schedule_config: Config,
    edge_config: Config,
    processes: Vec<ProcessDecl>,
    connections: Vec<Connection>,
}

impl PipelineFile {
    pub(crate) fn new_unchecked(
        schedule_type: String,
        schedule_config: Config,
        edge_config: Config,
        processes: Vec<ProcessDecl>,
        connections: Vec<Connection>,
    ) -> Self {
        Self {
            schedule_type,
            schedule_config,
            edge_config,
            processes,
            connections,
        }
    }

    pub fn schedule_type(&self) -> &str {
        &self.schedule_type
    }

    pub fn schedule_config(&self) -> &Config {
        &self.schedule_config
    }

    pub fn edge_config(&self) -> &Config {
        &self.edge_config
    }

    pub fn processes(&self) -> &[ProcessDecl] {
        &self.processes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }
}

/// Flatten TOML scalars into a [`Config`]. Arrays and tables are rejected.
pub fn settings_to_config(
    context: &str,
    settings: &BTreeMap<String, toml::Value>,
) -> Result<Config> {
    let mut config = Config::empty();

    for (key, value) in settings {
        let text = match value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Array(_) | toml::Value::Table(_) => {
                return Err(SchedError::ConfigError(format!(
                    "{context}: value of '{key}' must be a string, number or boolean"
                )));
            }
        };
        config.set_value(key.clone(), text);
    }

    Ok(config)
}
