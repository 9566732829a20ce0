//! Turns UI selections into backend query descriptions.
//!
//! [`FilterSpec::resolve`] normalizes a [`Selection`] against the material
//! hierarchy; [`build_query`] maps the resulting spec to a
//! [`QueryDescription`] with one sub-description for flows and one for stocks.
//! Stocks only have an origin, so every endpoint filter on the stock side is
//! origin-only regardless of the selected direction.

pub mod geometry;

use std::collections::HashMap;

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::model::{Area, Id, MaterialTree, NodeLevel};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    To,
    From,
    #[default]
    Both,
}

impl Direction {
    fn includes_origin(self) -> bool {
        matches!(self, Direction::From | Direction::Both)
    }

    fn includes_destination(self) -> bool {
        matches!(self, Direction::To | Direction::Both)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Waste,
    Product,
    #[default]
    Both,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeSelection {
    #[default]
    All,
    Ids(Vec<Id>),
}

impl NodeSelection {
    /// Selected ids, or `None` when nodes are unrestricted. An empty explicit
    /// list counts as unrestricted.
    pub fn ids(&self) -> Option<&[Id]> {
        match self {
            NodeSelection::Ids(ids) if !ids.is_empty() => Some(ids),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNodeSelection {
    Keyword(String),
    Ids(Vec<Id>),
}

impl<'de> Deserialize<'de> for NodeSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawNodeSelection::deserialize(deserializer)? {
            RawNodeSelection::Keyword(word) if word.eq_ignore_ascii_case("all") => {
                Ok(NodeSelection::All)
            }
            RawNodeSelection::Keyword(word) => Err(serde::de::Error::custom(format!(
                "expected \"all\" or a list of ids, got \"{word}\""
            ))),
            RawNodeSelection::Ids(ids) => Ok(NodeSelection::Ids(ids)),
        }
    }
}

impl Serialize for NodeSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NodeSelection::All => serializer.serialize_str("all"),
            NodeSelection::Ids(ids) => ids.serialize(serializer),
        }
    }
}

/// Raw UI selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub node_level: NodeLevel,
    #[serde(default, alias = "selectedNodeIds")]
    pub nodes: NodeSelection,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub area_ids: Vec<Id>,
    /// Selected material; `None` means every top-level material.
    #[serde(default)]
    pub material: Option<Id>,
    #[serde(default)]
    pub flow_type: FlowType,
    #[serde(default)]
    pub origin_level: Option<NodeLevel>,
    #[serde(default)]
    pub destination_level: Option<NodeLevel>,
    #[serde(default)]
    pub unaltered: Vec<Id>,
}

/// Normalized, immutable filter state.
///
/// Only built through [`FilterSpec::resolve`] or deserialized from a value the
/// caller saved earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    material_ids: Vec<Id>,
    material_aggregate: bool,
    area_ids: Vec<Id>,
    nodes: NodeSelection,
    node_level: NodeLevel,
    origin_level: NodeLevel,
    destination_level: NodeLevel,
    direction: Direction,
    flow_type: FlowType,
    unaltered: Vec<Id>,
}

impl FilterSpec {
    pub fn resolve(selection: &Selection, materials: &MaterialTree<'_>) -> Self {
        let material_ids: IndexSet<Id> = match &selection.material {
            Some(selected) => {
                if !materials.contains(selected) {
                    tracing::warn!(material = %selected, "selected material is not in the material list");
                }
                std::iter::once(selected.clone())
                    .chain(materials.direct_children(selected).map(|m| m.id.clone()))
                    .collect()
            }
            None => materials.top_level().map(|m| m.id.clone()).collect(),
        };
        let area_ids: IndexSet<Id> = selection.area_ids.iter().cloned().collect();

        FilterSpec {
            material_ids: material_ids.into_iter().collect(),
            material_aggregate: true,
            area_ids: area_ids.into_iter().collect(),
            nodes: selection.nodes.clone(),
            node_level: selection.node_level,
            origin_level: selection.origin_level.unwrap_or(selection.node_level),
            destination_level: selection.destination_level.unwrap_or(selection.node_level),
            direction: selection.direction,
            flow_type: selection.flow_type,
            unaltered: selection.unaltered.clone(),
        }
    }

    pub fn material_ids(&self) -> &[Id] {
        &self.material_ids
    }

    pub fn material_aggregate(&self) -> bool {
        self.material_aggregate
    }

    pub fn area_ids(&self) -> &[Id] {
        &self.area_ids
    }

    pub fn nodes(&self) -> &NodeSelection {
        &self.nodes
    }

    pub fn node_level(&self) -> NodeLevel {
        self.node_level
    }

    pub fn origin_level(&self) -> NodeLevel {
        self.origin_level
    }

    pub fn destination_level(&self) -> NodeLevel {
        self.destination_level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterFunction {
    pub function: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    pub functions: Vec<FilterFunction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialFilter {
    pub ids: Vec<Id>,
    pub aggregate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unaltered: Option<Vec<Id>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationLevel {
    Uniform(NodeLevel),
    Split {
        origin: NodeLevel,
        destination: NodeLevel,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub filters: Vec<FilterGroup>,
    pub materials: MaterialFilter,
    pub aggregation_level: AggregationLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescription {
    pub flows: SubQuery,
    pub stocks: SubQuery,
}

#[derive(Clone, Copy)]
enum Side {
    Origin,
    Destination,
}

impl Side {
    fn prefix(self) -> &'static str {
        match self {
            Side::Origin => "origin",
            Side::Destination => "destination",
        }
    }
}

fn node_function(side: Side, level: NodeLevel, ids: &[Id]) -> FilterFunction {
    FilterFunction {
        function: format!("{}__{}id__in", side.prefix(), level.lookup_path()),
        values: ids.iter().map(|id| Value::String(id.to_string())).collect(),
    }
}

fn area_function(side: Side, geojson: &str) -> FilterFunction {
    FilterFunction {
        function: format!("{}__administrative_location__geom__intersects", side.prefix()),
        values: vec![Value::String(geojson.to_string())],
    }
}

/// Flow-side OR group over the sides `direction` covers.
fn directed_group(direction: Direction, make: impl Fn(Side) -> FilterFunction) -> FilterGroup {
    let mut functions = Vec::with_capacity(2);
    if direction.includes_origin() {
        functions.push(make(Side::Origin));
    }
    if direction.includes_destination() {
        functions.push(make(Side::Destination));
    }
    FilterGroup {
        link: Some(Link::Or),
        functions,
    }
}

fn origin_group(make: impl Fn(Side) -> FilterFunction) -> FilterGroup {
    FilterGroup {
        link: None,
        functions: vec![make(Side::Origin)],
    }
}

pub fn build_query(spec: &FilterSpec, areas: &[Area]) -> QueryDescription {
    let mut flow_filters = Vec::new();
    let mut stock_filters = Vec::new();

    if let Some(ids) = spec.nodes.ids() {
        flow_filters.push(directed_group(spec.direction, |side| {
            let level = match side {
                Side::Origin => spec.origin_level,
                Side::Destination => spec.destination_level,
            };
            node_function(side, level, ids)
        }));
        stock_filters.push(origin_group(|side| {
            node_function(side, spec.origin_level, ids)
        }));
    }

    if !spec.area_ids.is_empty() {
        let by_id: HashMap<&Id, &Area> = areas.iter().map(|area| (&area.id, area)).collect();
        let geometries = spec.area_ids.iter().filter_map(|id| {
            let Some(&area) = by_id.get(id) else {
                tracing::warn!(area = %id, "selected area was not loaded, skipping");
                return None;
            };
            if area.geometry.is_none() {
                tracing::warn!(area = %id, name = %area.name, "selected area has no geometry, skipping");
            }
            area.geometry.as_ref()
        });
        if let Some(merged) = geometry::collect_multipolygon(geometries) {
            let geojson = geometry::to_geojson(&merged);
            flow_filters.push(directed_group(spec.direction, |side| {
                area_function(side, &geojson)
            }));
            stock_filters.push(origin_group(|side| area_function(side, &geojson)));
        }
    }

    let waste = match spec.flow_type {
        FlowType::Waste => Some(true),
        FlowType::Product => Some(false),
        FlowType::Both => None,
    };
    if let Some(waste) = waste {
        let group = FilterGroup {
            link: None,
            functions: vec![FilterFunction {
                function: "waste".to_string(),
                values: vec![Value::Bool(waste)],
            }],
        };
        flow_filters.push(group.clone());
        stock_filters.push(group);
    }

    let materials = MaterialFilter {
        ids: spec.material_ids.clone(),
        aggregate: spec.material_aggregate,
        unaltered: (!spec.unaltered.is_empty()).then(|| spec.unaltered.clone()),
    };
    let flow_level = if spec.origin_level == spec.destination_level {
        AggregationLevel::Uniform(spec.origin_level)
    } else {
        AggregationLevel::Split {
            origin: spec.origin_level,
            destination: spec.destination_level,
        }
    };

    tracing::debug!(
        flow_filters = flow_filters.len(),
        stock_filters = stock_filters.len(),
        materials = materials.ids.len(),
        "built query description"
    );

    QueryDescription {
        flows: SubQuery {
            filters: flow_filters,
            materials: materials.clone(),
            aggregation_level: flow_level,
        },
        stocks: SubQuery {
            filters: stock_filters,
            materials,
            aggregation_level: AggregationLevel::Uniform(spec.origin_level),
        },
    }
}
