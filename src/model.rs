use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Record identifier. Backends hand out both numeric and textual keys, so
/// numbers are kept in their decimal text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Integer(i64),
    Unsigned(u64),
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn into_string(self) -> String {
        match self {
            NumberOrString::Integer(val) => val.to_string(),
            NumberOrString::Unsigned(val) => val.to_string(),
            NumberOrString::Number(val) => format!("{}", val),
            NumberOrString::String(val) => val,
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NumberOrString::deserialize(deserializer).map(|raw| Id(raw.into_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeLevel {
    #[default]
    Actor,
    Activity,
    #[serde(alias = "activity_group", alias = "activityGroup", alias = "group")]
    ActivityGroup,
}

impl NodeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeLevel::Actor => "actor",
            NodeLevel::Activity => "activity",
            NodeLevel::ActivityGroup => "activitygroup",
        }
    }

    /// Lookup path from an actor-level flow endpoint to this level's id.
    pub fn lookup_path(self) -> &'static str {
        match self {
            NodeLevel::Actor => "",
            NodeLevel::Activity => "activity__",
            NodeLevel::ActivityGroup => "activity__activitygroup__",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<NodeLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_count: Option<u64>,
}

impl Node {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level: None,
            flow_count: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fraction {
    pub material: Id,
    pub fraction: f64,
    #[serde(default)]
    pub avoidable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fractions: Vec<Fraction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: Id,
    pub origin: Id,
    pub destination: Id,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub waste: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<Composition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Id>,
}

impl Flow {
    pub fn new(
        id: impl Into<Id>,
        origin: impl Into<Id>,
        destination: impl Into<Id>,
        amount: f64,
    ) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            destination: destination.into(),
            amount,
            waste: false,
            composition: None,
            description: None,
            publication: None,
            process: None,
        }
    }

    pub fn with_composition(mut self, composition: Composition) -> Self {
        self.composition = Some(composition);
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.origin == self.destination
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub id: Id,
    pub origin: Id,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub waste: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<Composition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Id>,
}

impl Stock {
    pub fn new(id: impl Into<Id>, origin: impl Into<Id>, amount: f64) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            amount,
            waste: false,
            composition: None,
            description: None,
            publication: None,
            process: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub parent: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_count: Option<u64>,
}

impl Material {
    pub fn new(id: impl Into<Id>, name: impl Into<String>, parent: Option<Id>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent,
            flow_count: None,
        }
    }
}

/// Read-only view over a material list. Answers hierarchy and name lookups
/// while preserving the input order.
#[derive(Debug, Clone)]
pub struct MaterialTree<'a> {
    materials: &'a [Material],
    index: HashMap<&'a Id, usize>,
}

impl<'a> MaterialTree<'a> {
    pub fn new(materials: &'a [Material]) -> Self {
        let mut index = HashMap::with_capacity(materials.len());
        for (idx, material) in materials.iter().enumerate() {
            index.entry(&material.id).or_insert(idx);
        }
        Self { materials, index }
    }

    pub fn get(&self, id: &Id) -> Option<&'a Material> {
        self.index.get(id).map(|&idx| &self.materials[idx])
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.index.contains_key(id)
    }

    pub fn name_of(&self, id: &Id) -> Option<&'a str> {
        self.get(id).map(|material| material.name.as_str())
    }

    pub fn direct_children(&self, id: &Id) -> impl Iterator<Item = &'a Material> {
        self.materials
            .iter()
            .filter(move |material| material.parent.as_ref() == Some(id))
    }

    pub fn top_level(&self) -> impl Iterator<Item = &'a Material> {
        self.materials.iter().filter(|material| material.parent.is_none())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub actor: Id,
    pub lat: f64,
    pub lon: f64,
}

/// Externally computed proximity cluster of actors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub ids: Vec<Id>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_numbers_and_strings() {
        let ids: Vec<Id> = serde_json::from_str(r#"[7, "9", 2.5]"#).unwrap();
        assert_eq!(ids, vec![Id::from("7"), Id::from("9"), Id::from("2.5")]);
        assert_eq!(serde_json::to_string(&ids[0]).unwrap(), "\"7\"");
    }

    #[test]
    fn large_unsigned_ids_keep_every_digit() {
        let id: Id = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(id.as_str(), "18446744073709551615");
        let id: Id = serde_json::from_str("-3").unwrap();
        assert_eq!(id.as_str(), "-3");
    }

    #[test]
    fn flow_defaults_optional_fields() {
        let flow: Flow =
            serde_json::from_str(r#"{"id": 1, "origin": "A", "destination": "B"}"#).unwrap();
        assert_eq!(flow.amount, 0.0);
        assert!(!flow.waste);
        assert!(flow.composition.is_none());
        assert!(!flow.is_self_loop());
    }

    #[test]
    fn material_tree_lookups_keep_input_order() {
        let materials = vec![
            Material::new("1", "Metal", None),
            Material::new("2", "Steel", Some(Id::from("1"))),
            Material::new("3", "Organic", None),
            Material::new("4", "Aluminium", Some(Id::from("1"))),
            Material::new("5", "Alloy", Some(Id::from("2"))),
        ];
        let tree = MaterialTree::new(&materials);
        let children: Vec<&str> = tree
            .direct_children(&Id::from("1"))
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(children, vec!["2", "4"]);
        let top: Vec<&str> = tree.top_level().map(|m| m.id.as_str()).collect();
        assert_eq!(top, vec!["1", "3"]);
        assert_eq!(tree.name_of(&Id::from("5")), Some("Alloy"));
        assert!(!tree.contains(&Id::from("42")));
    }

    #[test]
    fn geometry_reads_geojson() {
        let geom: Geometry = serde_json::from_str(
            r#"{"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}"#,
        )
        .unwrap();
        assert!(matches!(geom, Geometry::Polygon(ref rings) if rings[0].len() == 4));
    }

    #[test]
    fn node_level_tokens() {
        let level: NodeLevel = serde_json::from_str("\"activityGroup\"").unwrap();
        assert_eq!(level, NodeLevel::ActivityGroup);
        assert_eq!(NodeLevel::ActivityGroup.lookup_path(), "activity__activitygroup__");
        let level: NodeLevel = serde_json::from_str("\"activitygroup\"").unwrap();
        assert_eq!(level, NodeLevel::ActivityGroup);
    }
}
