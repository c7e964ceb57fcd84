// src/pipeline/export_dot.rs

//! Graphviz export of a pipeline.
//!
//! Each process becomes a cluster holding a central node plus one node per
//! port; connections are drawn between output and input port nodes.

use std::io::{self, Write};

use crate::pipeline::Pipeline;

const NODE_SUFFIX_MAIN: &str = "_main";
const NODE_PREFIX_INPUT: &str = "_input_";
const NODE_PREFIX_OUTPUT: &str = "_output_";

const STYLE_PROCESS_SUBGRAPH: &str = "color=lightgray;style=filled;";
const STYLE_PROCESS: &str = "shape=ellipse,rank=same";
const STYLE_PORT: &str = "shape=none,height=0,width=0,fontsize=7";
const STYLE_PORT_EDGE: &str = "arrowhead=none,color=black";
const STYLE_CONNECTION_EDGE: &str = "minlen=1,color=black,weight=1";

pub fn export_dot<W: Write>(out: &mut W, pipeline: &Pipeline, graph_name: &str) -> io::Result<()> {
    writeln!(out, "strict digraph \"{graph_name}\" {{")?;
    writeln!(out)?;

    for name in pipeline.process_names() {
        let Ok(process) = pipeline.process_by_name(&name) else {
            continue;
        };
        let main = node_id(&name, NODE_SUFFIX_MAIN);

        writeln!(out, "subgraph \"cluster_{name}\" {{")?;
        writeln!(out, "{STYLE_PROCESS_SUBGRAPH}")?;
        writeln!(
            out,
            "{main} [label=\"{name}\\n:: {}\",{STYLE_PROCESS}];",
            process.type_name()
        )?;

        for port in process.input_ports() {
            let node = port_node(&name, NODE_PREFIX_INPUT, &port);
            writeln!(out, "{node} [label=\"{port}\",{STYLE_PORT}];")?;
            writeln!(out, "{node} -> {main} [{STYLE_PORT_EDGE}];")?;
        }

        for port in process.output_ports() {
            let node = port_node(&name, NODE_PREFIX_OUTPUT, &port);
            writeln!(out, "{node} [label=\"{port}\",{STYLE_PORT}];")?;
            writeln!(out, "{main} -> {node} [{STYLE_PORT_EDGE}];")?;
        }

        writeln!(out, "}}")?;
        writeln!(out)?;
    }

    for conn in pipeline.connections() {
        let from = port_node(&conn.upstream.process, NODE_PREFIX_OUTPUT, &conn.upstream.port);
        let to = port_node(&conn.downstream.process, NODE_PREFIX_INPUT, &conn.downstream.port);
        writeln!(out, "{from} -> {to} [{STYLE_CONNECTION_EDGE}];")?;
    }

    writeln!(out)?;
    writeln!(out, "}}")?;
    Ok(())
}

fn node_id(process: &str, suffix: &str) -> String {
    format!("\"{process}{suffix}\"")
}

fn port_node(process: &str, prefix: &str, port: &str) -> String {
    format!("\"{process}{prefix}{port}\"")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::errors::Result;
    use crate::pipeline::{PortAddr, Process, ProcessCore, StepStatus};

    struct Node {
        core: ProcessCore,
    }

    impl Process for Node {
        fn core(&self) -> &ProcessCore {
            &self.core
        }

        fn step_impl(&self) -> Result<StepStatus> {
            Ok(StepStatus::Complete)
        }
    }

    #[test]
    fn exports_clusters_and_connections() {
        let mut pipe = Pipeline::new(Config::empty());
        pipe.add_process(Arc::new(Node {
            core: ProcessCore::new("src", "numbers").with_output_port("number"),
        }))
        .unwrap();
        pipe.add_process(Arc::new(Node {
            core: ProcessCore::new("sink", "print_number").with_input_port("number", true),
        }))
        .unwrap();
        pipe.connect(PortAddr::new("src", "number"), PortAddr::new("sink", "number"))
            .unwrap();

        let mut buf = Vec::new();
        export_dot(&mut buf, &pipe, "demo").unwrap();
        let dot = String::from_utf8(buf).unwrap();

        assert!(dot.starts_with("strict digraph \"demo\" {"));
        assert!(dot.contains("subgraph \"cluster_src\""));
        assert!(dot.contains("label=\"src\\n:: numbers\""));
        assert!(dot.contains("\"src_output_number\" -> \"sink_input_number\""));
        assert!(dot.trim_end().ends_with('}'));
    }
}
