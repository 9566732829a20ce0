use std::path::Path;

use matflow::aggregate::aggregate;
use matflow::model::{
    Cluster, Composition, Flow, Fraction, Location, Material, MaterialTree, Node, Stock,
};
use matflow::{
    Config, FilterSpec, MapInput, SankeyGraph, SankeyInput, Selection, build_query, map_graph,
    sankey_graph,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SankeyFixture {
    origins: Vec<Node>,
    destinations: Option<Vec<Node>>,
    flows: Vec<Flow>,
    stocks: Vec<Stock>,
    materials: Vec<Material>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryFixture {
    selection: Selection,
    materials: Vec<Material>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MapFixture {
    actors: Vec<Node>,
    locations: Vec<Location>,
    flows: Vec<Flow>,
    materials: Vec<Material>,
    clusters: Vec<Cluster>,
}

fn load<T: DeserializeOwned>(name: &str) -> T {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let input = std::fs::read_to_string(&path).expect("fixture read failed");
    serde_json::from_str(&input).unwrap_or_else(|err| panic!("{name}: {err}"))
}

fn sankey(fixture: &SankeyFixture, config: &Config) -> SankeyGraph {
    sankey_graph(
        &SankeyInput {
            origins: &fixture.origins,
            destinations: fixture.destinations.as_deref().unwrap_or(&fixture.origins),
            flows: &fixture.flows,
            stocks: &fixture.stocks,
            materials: &fixture.materials,
        },
        config,
    )
}

#[test]
fn single_flow_becomes_one_link() {
    let fixture: SankeyFixture = load("single_flow.json");
    let graph = sankey(&fixture, &Config::default());
    let names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["Alpha", "Beta"]);
    assert_eq!(graph.links.len(), 1);
    let link = &graph.links[0];
    assert_eq!((link.source, link.target), (0, 1));
    assert_eq!(link.value, 10.0);
    assert_eq!(link.composition_text, "100% M1");
}

#[test]
fn self_loop_is_dropped() {
    let fixture: SankeyFixture = load("self_loop.json");
    let graph = sankey(&fixture, &Config::default());
    assert!(graph.links.is_empty());
    assert!(graph.is_empty());
    assert_eq!(graph.nodes.len(), 1);

    let mut config = Config::default();
    config.sankey.hide_unconnected = true;
    let hidden = sankey(&fixture, &config);
    assert!(hidden.nodes.is_empty());
    assert!(hidden.links.is_empty());
}

#[test]
fn side_by_side_keeps_origin_and_destination_copies() {
    let fixture: SankeyFixture = load("side_by_side.json");
    let mut config = Config::default();
    config.sankey.force_side_by_side = true;
    let graph = sankey(&fixture, &config);

    // two origin copies, three destination copies, one stock sink
    assert_eq!(graph.nodes.len(), 6);
    assert!(graph.nodes[5].stock);
    let pairs: Vec<(usize, usize)> = graph.links.iter().map(|l| (l.source, l.target)).collect();
    assert_eq!(pairs, [(0, 3), (1, 2), (1, 4), (0, 5)]);
    assert!(graph.links[2].waste);
    assert!(graph.links[3].is_stock);
    assert_eq!(graph.nodes[0].group.as_deref(), Some("activity"));

    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(json["nodes"][0]["side"], "origin");
    assert_eq!(json["nodes"][2]["side"], "destination");
}

#[test]
fn same_input_same_graph() {
    let fixture: SankeyFixture = load("side_by_side.json");
    let config = Config::default();
    let first = serde_json::to_string(&sankey(&fixture, &config)).unwrap();
    let second = serde_json::to_string(&sankey(&fixture, &config)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn same_pair_flows_aggregate_with_weighted_fraction() {
    let pure = Composition {
        id: None,
        name: String::new(),
        fractions: vec![Fraction {
            material: "M1".into(),
            fraction: 1.0,
            avoidable: false,
            publication: None,
        }],
    };
    let flows = vec![
        Flow::new("1", "A", "B", 4.0).with_composition(pure.clone()),
        Flow::new("2", "A", "B", 6.0).with_composition(pure),
    ];
    let out = aggregate(&flows, |f| (f.origin.clone(), f.destination.clone()));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].record.amount, 10.0);
    let composition = out[0].record.composition.as_ref().unwrap();
    assert!((composition.fractions[0].fraction - 1.0).abs() < 1e-9);
}

#[test]
fn activity_selection_filters_destination_for_flows_and_origin_for_stocks() {
    let fixture: QueryFixture = load("query_activity_to.json");
    let spec = FilterSpec::resolve(&fixture.selection, &MaterialTree::new(&fixture.materials));
    let query = build_query(&spec, &[]);
    let value = serde_json::to_value(&query).unwrap();

    assert_eq!(
        value["flows"]["filters"][0],
        json!({
            "link": "or",
            "functions": [{"function": "destination__activity__id__in", "values": ["7", "9"]}]
        })
    );
    assert_eq!(
        value["stocks"]["filters"][0],
        json!({
            "functions": [{"function": "origin__activity__id__in", "values": ["7", "9"]}]
        })
    );
    // no material selected: every top-level material
    assert_eq!(value["flows"]["materials"]["ids"], json!(["M1", "M3"]));
}

#[test]
fn cross_cluster_flow_is_one_aggregated_link() {
    let fixture: MapFixture = load("two_clusters.json");
    let graph = map_graph(
        &MapInput {
            actors: &fixture.actors,
            locations: &fixture.locations,
            flows: &fixture.flows,
            materials: &fixture.materials,
            clusters: &fixture.clusters,
        },
        &Config::default(),
    );
    assert_eq!(graph.nodes.len(), 2);
    assert!(graph.nodes.iter().all(|node| node.cluster.is_some()));
    assert_eq!(graph.flows.len(), 1);
    assert_eq!(graph.flows[0].value, 12.5);
    assert_eq!(graph.nodes[0].name, "C1");
}
