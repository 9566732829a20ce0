use matflow::model::{Area, Cluster, Flow, Location, Material, MaterialTree, Node, Stock};
use matflow::{
    Config, FilterSpec, MapInput, SankeyInput, Selection, build_query, map_graph, sankey_graph,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QueryRequest {
    selection: Selection,
    materials: Vec<Material>,
    areas: Vec<Area>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SankeyRequest {
    origins: Vec<Node>,
    destinations: Option<Vec<Node>>,
    flows: Vec<Flow>,
    stocks: Vec<Stock>,
    materials: Vec<Material>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MapRequest {
    actors: Vec<Node>,
    locations: Vec<Location>,
    flows: Vec<Flow>,
    materials: Vec<Material>,
    clusters: Vec<Cluster>,
}

/// Options accepted from JS; anything missing keeps the library default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphOptions {
    force_side_by_side: Option<bool>,
    hide_unconnected: Option<bool>,
    split_by_material: Option<bool>,
    stock_label: Option<String>,
    no_composition_text: Option<String>,
}

fn build_config(options_json: Option<String>) -> Result<Config, String> {
    let options = match options_json {
        Some(raw) => serde_json::from_str::<GraphOptions>(&raw).map_err(|error| error.to_string())?,
        None => GraphOptions::default(),
    };
    let mut config = Config::default();
    if let Some(value) = options.force_side_by_side {
        config.sankey.force_side_by_side = value;
    }
    if let Some(value) = options.hide_unconnected {
        config.sankey.hide_unconnected = value;
    }
    if let Some(value) = options.split_by_material {
        config.map.split_by_material = value;
    }
    if let Some(value) = options.stock_label {
        config.sankey.stock_label = value;
    }
    if let Some(value) = options.no_composition_text {
        config.labels.no_composition_text = value;
    }
    Ok(config)
}

fn parse<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_str(raw).map_err(|error| error.to_string())
}

fn query_json(request_json: &str) -> Result<String, String> {
    let request: QueryRequest = parse(request_json)?;
    let spec = FilterSpec::resolve(&request.selection, &MaterialTree::new(&request.materials));
    let query = build_query(&spec, &request.areas);
    serde_json::to_string(&query).map_err(|error| error.to_string())
}

fn sankey_json(request_json: &str, options_json: Option<String>) -> Result<String, String> {
    let request: SankeyRequest = parse(request_json)?;
    let config = build_config(options_json)?;
    let graph = sankey_graph(
        &SankeyInput {
            origins: &request.origins,
            destinations: request.destinations.as_deref().unwrap_or(&request.origins),
            flows: &request.flows,
            stocks: &request.stocks,
            materials: &request.materials,
        },
        &config,
    );
    serde_json::to_string(&graph).map_err(|error| error.to_string())
}

fn map_json(request_json: &str, options_json: Option<String>) -> Result<String, String> {
    let request: MapRequest = parse(request_json)?;
    let config = build_config(options_json)?;
    let graph = map_graph(
        &MapInput {
            actors: &request.actors,
            locations: &request.locations,
            flows: &request.flows,
            materials: &request.materials,
            clusters: &request.clusters,
        },
        &config,
    );
    serde_json::to_string(&graph).map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn build_query_json(request_json: &str) -> Result<String, JsValue> {
    query_json(request_json).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn sankey_graph_json(request_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    sankey_json(request_json, options_json).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn map_graph_json(request_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    map_json(request_json, options_json).map_err(|error| JsValue::from_str(&error))
}
