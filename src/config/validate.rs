// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{
    settings_to_config, PipelineFile, ProcessDecl, ProcessTable, RawPipelineFile,
};
use crate::config::values::BLOCK_SEP;
use crate::config::Config;
use crate::errors::{Result, SchedError};
use crate::pipeline::graph::EDGE_BLOCK;
use crate::pipeline::{Connection, PortAddr};

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = SchedError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)
    }
}

fn validate_raw_config(raw: &RawPipelineFile) -> Result<PipelineFile> {
    ensure_has_processes(raw)?;
    validate_schedule(raw)?;
    let processes = validate_processes(&raw.process)?;
    let connections = validate_connections(raw)?;
    validate_acyclic(raw, &connections)?;

    let schedule_config = settings_to_config("[schedule]", &raw.schedule.settings)?;
    let edge_config = edge_block_config(&settings_to_config("[edge]", &raw.edge)?);

    Ok(PipelineFile::new_unchecked(
        raw.schedule.type_name.trim().to_string(),
        schedule_config,
        edge_config,
        processes,
        connections,
    ))
}

fn ensure_has_processes(raw: &RawPipelineFile) -> Result<()> {
    if raw.process.is_empty() {
        return Err(SchedError::ConfigError(
            "pipeline must contain at least one [process.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_schedule(raw: &RawPipelineFile) -> Result<()> {
    if raw.schedule.type_name.trim().is_empty() {
        return Err(SchedError::ConfigError(
            "[schedule].type must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_processes(sections: &ProcessTable) -> Result<Vec<ProcessDecl>> {
    let mut decls = Vec::with_capacity(sections.len());

    for (name, section) in sections.iter() {
        if name.contains('.') || name.contains(BLOCK_SEP) {
            return Err(SchedError::ConfigError(format!(
                "process name '{name}' must not contain '.' or '{BLOCK_SEP}'"
            )));
        }
        if section.type_name.trim().is_empty() {
            return Err(SchedError::ConfigError(format!(
                "process '{name}' has an empty `type`"
            )));
        }

        decls.push(ProcessDecl {
            name: name.to_string(),
            type_name: section.type_name.trim().to_string(),
            config: settings_to_config(&format!("[process.{name}]"), &section.settings)?,
        });
    }

    Ok(decls)
}

fn validate_connections(raw: &RawPipelineFile) -> Result<Vec<Connection>> {
    let mut connections = Vec::with_capacity(raw.connect.len());

    for entry in &raw.connect {
        let upstream = parse_endpoint(raw, "from", &entry.from)?;
        let downstream = parse_endpoint(raw, "to", &entry.to)?;

        if upstream.process == downstream.process {
            return Err(SchedError::ConfigError(format!(
                "process '{}' cannot be connected to itself ({} -> {})",
                upstream.process, upstream, downstream
            )));
        }

        connections.push(Connection {
            upstream,
            downstream,
        });
    }

    Ok(connections)
}

fn parse_endpoint(raw: &RawPipelineFile, field: &str, text: &str) -> Result<PortAddr> {
    let addr: PortAddr = text
        .parse()
        .map_err(|e: String| SchedError::ConfigError(format!("[[connect]] `{field}`: {e}")))?;

    if !raw.process.contains_key(&addr.process) {
        return Err(SchedError::ConfigError(format!(
            "[[connect]] `{field}` references unknown process '{}'",
            addr.process
        )));
    }
    Ok(addr)
}

fn validate_acyclic(raw: &RawPipelineFile, connections: &[Connection]) -> Result<()> {
    // Edge direction: upstream process -> downstream process.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in raw.process.keys() {
        graph.add_node(name);
    }
    for conn in connections {
        graph.add_edge(conn.upstream.process.as_str(), conn.downstream.process.as_str(), ());
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SchedError::PipelineCycle(format!(
            "cycle detected in pipeline involving process '{}'",
            cycle.node_id()
        ))),
    }
}

/// Prefix `[edge]` keys so they land in the pipeline's edge block.
fn edge_block_config(edge: &Config) -> Config {
    let mut out = Config::empty();
    for key in edge.keys() {
        if let Some(value) = edge.raw_value(key) {
            out.set_value(format!("{EDGE_BLOCK}{BLOCK_SEP}{key}"), value);
        }
    }
    out
}
