use crate::config::{Config, load_config};
use crate::filter::{FilterSpec, QueryDescription, Selection, build_query};
use crate::graph::{MapGraph, MapInput, SankeyGraph, SankeyInput, map_graph, sankey_graph};
use crate::model::{Area, Cluster, Flow, Location, Material, MaterialTree, Node, Stock};
use crate::output::{GraphSummary, write_json};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "matflow", version, about = "Material flow filtering and graph transforms")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output file for the JSON result. Defaults to stdout.
    #[arg(short = 'o', long = "output", global = true)]
    pub output: Option<PathBuf>,

    /// Config JSON5 file (theme, labels, sankey and map options)
    #[arg(short = 'c', long = "configFile", global = true)]
    pub config: Option<PathBuf>,

    /// Print graph counts instead of the graph itself
    #[arg(long = "summary", global = true)]
    pub summary: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a selection into the flow and stock query descriptions
    Query {
        /// JSON/JSON5 file with `selection`, `materials` and `areas`, or '-' for stdin
        input: Option<PathBuf>,
    },
    /// Build a sankey graph from fetched nodes, flows and stocks
    Sankey {
        /// JSON/JSON5 dataset file, or '-' for stdin
        input: Option<PathBuf>,

        /// Give every node separate origin and destination copies
        #[arg(long = "side-by-side")]
        side_by_side: bool,

        /// Drop nodes that carry no flow
        #[arg(long = "hide-unconnected")]
        hide_unconnected: bool,
    },
    /// Build a clustered map graph from actors, locations and flows
    Map {
        /// JSON/JSON5 dataset file, or '-' for stdin
        input: Option<PathBuf>,

        /// Split every link into one link per material fraction
        #[arg(long = "split-materials")]
        split_materials: bool,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QueryDataset {
    selection: Selection,
    materials: Vec<Material>,
    areas: Vec<Area>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SankeyDataset {
    origins: Vec<Node>,
    /// Falls back to `origins` when both sides share a level.
    destinations: Option<Vec<Node>>,
    flows: Vec<Flow>,
    stocks: Vec<Stock>,
    materials: Vec<Material>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MapDataset {
    actors: Vec<Node>,
    locations: Vec<Location>,
    flows: Vec<Flow>,
    materials: Vec<Material>,
    clusters: Vec<Cluster>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let mut config = load_config(args.config.as_deref()).context("failed to load config")?;

    match &args.command {
        Command::Query { input } => {
            let dataset: QueryDataset = read_dataset(input.as_deref())?;
            let query = query_description(&dataset);
            write_json(&query, args.output.as_deref())?;
        }
        Command::Sankey {
            input,
            side_by_side,
            hide_unconnected,
        } => {
            config.sankey.force_side_by_side |= *side_by_side;
            config.sankey.hide_unconnected |= *hide_unconnected;
            let dataset: SankeyDataset = read_dataset(input.as_deref())?;
            let graph = build_sankey(&dataset, &config);
            tracing::info!(nodes = graph.nodes.len(), links = graph.links.len(), "built sankey graph");
            if graph.is_empty() {
                tracing::warn!("no flows left after filtering");
            }
            if args.summary {
                write_json(&GraphSummary::from_sankey(&graph), args.output.as_deref())?;
            } else {
                write_json(&graph, args.output.as_deref())?;
            }
        }
        Command::Map {
            input,
            split_materials,
        } => {
            config.map.split_by_material |= *split_materials;
            let dataset: MapDataset = read_dataset(input.as_deref())?;
            let graph = build_map(&dataset, &config);
            tracing::info!(nodes = graph.nodes.len(), links = graph.flows.len(), "built map graph");
            if graph.is_empty() {
                tracing::warn!("no flows left after filtering");
            }
            if args.summary {
                write_json(&GraphSummary::from_map(&graph), args.output.as_deref())?;
            } else {
                write_json(&graph, args.output.as_deref())?;
            }
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // A subscriber may already be set when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .try_init();
}

fn query_description(dataset: &QueryDataset) -> QueryDescription {
    let materials = MaterialTree::new(&dataset.materials);
    let spec = FilterSpec::resolve(&dataset.selection, &materials);
    build_query(&spec, &dataset.areas)
}

fn build_sankey(dataset: &SankeyDataset, config: &Config) -> SankeyGraph {
    sankey_graph(
        &SankeyInput {
            origins: &dataset.origins,
            destinations: dataset.destinations.as_deref().unwrap_or(&dataset.origins),
            flows: &dataset.flows,
            stocks: &dataset.stocks,
            materials: &dataset.materials,
        },
        config,
    )
}

fn build_map(dataset: &MapDataset, config: &Config) -> MapGraph {
    map_graph(
        &MapInput {
            actors: &dataset.actors,
            locations: &dataset.locations,
            flows: &dataset.flows,
            materials: &dataset.materials,
            clusters: &dataset.clusters,
        },
        config,
    )
}

fn read_dataset<T: DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let input = read_input(path)?;
    parse_dataset(&input).with_context(|| match path {
        Some(path) => format!("failed to parse {}", path.display()),
        None => "failed to parse stdin".to_string(),
    })
}

/// JSON or JSON5; plain JSON goes through serde_json for better errors.
fn parse_dataset<T: DeserializeOwned>(input: &str) -> Result<T> {
    match serde_json::from_str(input) {
        Ok(value) => Ok(value),
        Err(json_err) => json5::from_str(input).map_err(|_| json_err.into()),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Id;

    #[test]
    fn parses_subcommands_and_global_flags() {
        let args = Args::try_parse_from([
            "matflow",
            "sankey",
            "flows.json",
            "--side-by-side",
            "-o",
            "out.json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        match args.command {
            Command::Sankey {
                input,
                side_by_side,
                hide_unconnected,
            } => {
                assert_eq!(input, Some(PathBuf::from("flows.json")));
                assert!(side_by_side);
                assert!(!hide_unconnected);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn sankey_dataset_accepts_json5() {
        let dataset: SankeyDataset = parse_dataset(
            r#"{
                // numeric ids are fine
                origins: [{ id: 1, name: "A" }, { id: 2, name: "B" }],
                flows: [{ id: 10, origin: 1, destination: 2, amount: 4.5 }],
            }"#,
        )
        .unwrap();
        let graph = build_sankey(&dataset, &Config::default());
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].id, "10");
        assert_eq!(graph.nodes[0].id, "1");
    }

    #[test]
    fn query_dataset_expands_selected_material() {
        let dataset: QueryDataset = parse_dataset(
            r#"{
                "selection": {"material": "m1", "nodes": ["a"], "direction": "to"},
                "materials": [
                    {"id": "m1", "name": "Plastic"},
                    {"id": "m2", "name": "PET", "parent": "m1"},
                    {"id": "m3", "name": "Glass"}
                ]
            }"#,
        )
        .unwrap();
        let query = query_description(&dataset);
        assert_eq!(
            query.flows.materials.ids,
            vec![Id::from("m1"), Id::from("m2")]
        );
    }

    #[test]
    fn malformed_dataset_is_an_error() {
        let err = parse_dataset::<SankeyDataset>("{ flows: [ }").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
