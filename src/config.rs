use crate::color::Color;
use crate::error::FlowError;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How composition summaries on links are worded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    pub no_composition_text: String,
    pub avoidable_marker: String,
    pub line_break: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            no_composition_text: "no composition defined".to_string(),
            avoidable_marker: " (avoidable)".to_string(),
            line_break: "\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SankeyConfig {
    pub force_side_by_side: bool,
    pub hide_unconnected: bool,
    pub stock_label: String,
    pub units: String,
}

impl Default for SankeyConfig {
    fn default() -> Self {
        Self {
            force_side_by_side: false,
            hide_unconnected: false,
            stock_label: "Stock".to_string(),
            units: "t/year".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub split_by_material: bool,
    pub node_radius: f32,
    pub cluster_radius_base: f32,
    pub cluster_radius_per_member: f32,
    pub cluster_radius_max: f32,
    pub units: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            split_by_material: false,
            node_radius: 5.0,
            cluster_radius_base: 10.0,
            cluster_radius_per_member: 0.5,
            cluster_radius_max: 25.0,
            units: "t/year".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub labels: LabelConfig,
    pub sankey: SankeyConfig,
    pub map: MapConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), FlowError> {
        let map = &self.map;
        if map.node_radius <= 0.0 {
            return Err(FlowError::Config(format!(
                "nodeRadius must be positive, got {}",
                map.node_radius
            )));
        }
        if map.cluster_radius_base <= 0.0 || map.cluster_radius_max < map.cluster_radius_base {
            return Err(FlowError::Config(format!(
                "cluster radius range {}..{} is empty",
                map.cluster_radius_base, map.cluster_radius_max
            )));
        }
        if map.cluster_radius_per_member < 0.0 {
            return Err(FlowError::Config(
                "clusterRadiusPerMember must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeFile {
    fallback_color: Option<Color>,
    stock_color: Option<Color>,
    unknown_material_color: Option<Color>,
    cluster_color: Option<Color>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LabelConfigFile {
    no_composition_text: Option<String>,
    avoidable_marker: Option<String>,
    line_break: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SankeyConfigFile {
    force_side_by_side: Option<bool>,
    hide_unconnected: Option<bool>,
    stock_label: Option<String>,
    units: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct MapConfigFile {
    split_by_material: Option<bool>,
    node_radius: Option<f32>,
    cluster_radius_base: Option<f32>,
    cluster_radius_per_member: Option<f32>,
    cluster_radius_max: Option<f32>,
    units: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_colors: Option<ThemeFile>,
    labels: Option<LabelConfigFile>,
    sankey: Option<SankeyConfigFile>,
    map: Option<MapConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses a JSON5 config document and overlays it on the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = json5::from_str(contents)?;
    let mut config = Config::default();

    match parsed.theme.as_deref() {
        Some("muted") => config.theme = Theme::muted(),
        Some("standard") | Some("default") | None => {}
        Some(other) => {
            tracing::warn!(theme = other, "unknown theme, keeping the standard one");
        }
    }

    if let Some(colors) = parsed.theme_colors {
        if let Some(v) = colors.fallback_color {
            config.theme.fallback_color = v;
        }
        if let Some(v) = colors.stock_color {
            config.theme.stock_color = v;
        }
        if let Some(v) = colors.unknown_material_color {
            config.theme.unknown_material_color = v;
        }
        if let Some(v) = colors.cluster_color {
            config.theme.cluster_color = v;
        }
    }

    if let Some(labels) = parsed.labels {
        if let Some(v) = labels.no_composition_text {
            config.labels.no_composition_text = v;
        }
        if let Some(v) = labels.avoidable_marker {
            config.labels.avoidable_marker = v;
        }
        if let Some(v) = labels.line_break {
            config.labels.line_break = v;
        }
    }

    if let Some(sankey) = parsed.sankey {
        if let Some(v) = sankey.force_side_by_side {
            config.sankey.force_side_by_side = v;
        }
        if let Some(v) = sankey.hide_unconnected {
            config.sankey.hide_unconnected = v;
        }
        if let Some(v) = sankey.stock_label {
            config.sankey.stock_label = v;
        }
        if let Some(v) = sankey.units {
            config.sankey.units = v;
        }
    }

    if let Some(map) = parsed.map {
        if let Some(v) = map.split_by_material {
            config.map.split_by_material = v;
        }
        if let Some(v) = map.node_radius {
            config.map.node_radius = v;
        }
        if let Some(v) = map.cluster_radius_base {
            config.map.cluster_radius_base = v;
        }
        if let Some(v) = map.cluster_radius_per_member {
            config.map.cluster_radius_per_member = v;
        }
        if let Some(v) = map.cluster_radius_max {
            config.map.cluster_radius_max = v;
        }
        if let Some(v) = map.units {
            config.map.units = v;
        }
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_keeps_defaults() {
        let config = parse_config("{}").unwrap();
        assert!(!config.sankey.force_side_by_side);
        assert_eq!(config.labels.no_composition_text, "no composition defined");
        assert_eq!(config.map.cluster_radius_max, 25.0);
    }

    #[test]
    fn overlays_json5_fields() {
        let config = parse_config(
            r##"{
                // comments are fine
                theme: "muted",
                themeColors: { stockColor: "#112233" },
                labels: { lineBreak: "<br>" },
                sankey: { forceSideBySide: true },
                map: { splitByMaterial: true, clusterRadiusMax: 40 },
            }"##,
        )
        .unwrap();
        assert!(config.sankey.force_side_by_side);
        assert_eq!(config.labels.line_break, "<br>");
        assert_eq!(config.theme.stock_color, Color::rgb(0x11, 0x22, 0x33));
        assert!(config.map.split_by_material);
        assert_eq!(config.map.cluster_radius_max, 40.0);
    }

    #[test]
    fn rejects_inverted_cluster_radius() {
        let err = parse_config(r#"{"map": {"clusterRadiusBase": 30, "clusterRadiusMax": 20}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("cluster radius"));
    }

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.map.node_radius, 5.0);
    }
}
