use indexmap::IndexMap;
use serde::Serialize;

use crate::color::Color;
use crate::model::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Origin,
    Destination,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Origin => "origin",
            Side::Destination => "destination",
        }
    }
}

/// Identity of a node in the Sankey index table. Side-by-side mode keeps the
/// origin and destination copies of one entity apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Shared(Id),
    Sided(Side, Id),
}

impl NodeKey {
    pub fn new(side: Side, id: &Id, side_by_side: bool) -> Self {
        if side_by_side {
            NodeKey::Sided(side, id.clone())
        } else {
            NodeKey::Shared(id.clone())
        }
    }

    /// Output node id. Side copies get `origin-`/`destination-` prefixes so
    /// both copies of one entity stay distinct.
    pub fn node_id(&self) -> String {
        match self {
            NodeKey::Shared(id) => id.to_string(),
            NodeKey::Sided(side, id) => format!("{}-{id}", side.as_str()),
        }
    }
}

/// Node id of the synthetic sink for a stock.
pub fn stock_node_id(stock: &Id) -> String {
    format!("stock-{stock}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub color: Color,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    /// Synthetic sink for stocks.
    pub stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: Color) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
            radius: None,
            group: None,
            cluster: None,
            side: None,
            stock: false,
            lat: None,
            lon: None,
        }
    }
}

/// `source` and `target` index into the node list of the same graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub id: String,
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub units: String,
    pub is_stock: bool,
    pub waste: bool,
    pub color: Color,
    pub composition_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    /// Underlying flow ids when the link aggregates several flows.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flow_ids: Vec<Id>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SankeyGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl SankeyGraph {
    /// No links for the current filter. Not an error; callers show a
    /// "no data" state.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn total_value(&self) -> f64 {
        self.links.iter().map(|link| link.value).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapGraph {
    pub nodes: Vec<GraphNode>,
    pub flows: Vec<GraphLink>,
    pub material_colors: IndexMap<String, Color>,
}

impl MapGraph {
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn total_value(&self) -> f64 {
        self.flows.iter().map(|link| link.value).sum()
    }
}
