use crate::config::LabelConfig;
use crate::model::{Composition, Fraction, MaterialTree};

/// One line per fraction, e.g. `"62.5% Steel (avoidable)"`.
pub fn composition_text(
    composition: Option<&Composition>,
    materials: &MaterialTree<'_>,
    labels: &LabelConfig,
) -> String {
    let Some(composition) = composition.filter(|c| !c.fractions.is_empty()) else {
        return labels.no_composition_text.clone();
    };
    composition
        .fractions
        .iter()
        .map(|fraction| fraction_text(fraction, materials, labels))
        .collect::<Vec<_>>()
        .join(&labels.line_break)
}

pub fn fraction_text(
    fraction: &Fraction,
    materials: &MaterialTree<'_>,
    labels: &LabelConfig,
) -> String {
    let mut text = format!(
        "{}% {}",
        format_percent(fraction.fraction),
        material_name(fraction, materials)
    );
    if fraction.avoidable {
        text.push_str(&labels.avoidable_marker);
    }
    text
}

/// Display name of the fraction's material; unknown ids fall back to the raw id.
pub fn material_name(fraction: &Fraction, materials: &MaterialTree<'_>) -> String {
    match materials.name_of(&fraction.material) {
        Some(name) => name.to_string(),
        None => {
            tracing::warn!(material = %fraction.material, "composition references an unknown material");
            fraction.material.to_string()
        }
    }
}

/// Percentage of a `[0, 1]` share with at most three decimals.
pub fn format_percent(share: f64) -> String {
    if !share.is_finite() {
        return "0".to_string();
    }
    let text = format!("{:.3}", share * 100.0);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
