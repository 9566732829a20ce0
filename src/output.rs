use crate::error::Result;
use crate::graph::{MapGraph, SankeyGraph};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Compact numbers about a built graph, for logs and `--summary` output.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub kind: String,
    pub nodes: usize,
    pub links: usize,
    pub stock_links: usize,
    pub aggregated_links: usize,
    pub total_value: f64,
    pub materials: Vec<String>,
    pub empty: bool,
}

impl GraphSummary {
    pub fn from_sankey(graph: &SankeyGraph) -> Self {
        GraphSummary {
            kind: "sankey".to_string(),
            nodes: graph.nodes.len(),
            links: graph.links.len(),
            stock_links: graph.links.iter().filter(|link| link.is_stock).count(),
            aggregated_links: 0,
            total_value: graph.total_value(),
            materials: Vec::new(),
            empty: graph.is_empty(),
        }
    }

    pub fn from_map(graph: &MapGraph) -> Self {
        GraphSummary {
            kind: "map".to_string(),
            nodes: graph.nodes.len(),
            links: graph.flows.len(),
            stock_links: 0,
            aggregated_links: graph
                .flows
                .iter()
                .filter(|link| !link.flow_ids.is_empty())
                .count(),
            total_value: graph.total_value(),
            materials: graph.material_colors.keys().cloned().collect(),
            empty: graph.is_empty(),
        }
    }
}

/// Pretty JSON to `output`, or stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}
