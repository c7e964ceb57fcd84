// src/config/assemble.rs

use tracing::debug;

use crate::config::model::PipelineFile;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use crate::registry::ProcessRegistry;

/// Instantiate every declared process through `registry`, wire the
/// connections and run [`Pipeline::setup`].
pub fn build_pipeline(file: &PipelineFile, registry: &ProcessRegistry) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new(file.edge_config().clone());

    for decl in file.processes() {
        debug!(process = %decl.name, type_name = %decl.type_name, "creating process");
        let process = registry.create_process(&decl.type_name, &decl.name, &decl.config)?;
        pipeline.add_process(process)?;
    }

    for conn in file.connections() {
        pipeline.connect(conn.upstream.clone(), conn.downstream.clone())?;
    }

    pipeline.setup()?;
    Ok(pipeline)
}
