use crate::color::{Color, color_by_name};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub fallback_color: Color,
    pub stock_color: Color,
    pub unknown_material_color: Color,
    pub cluster_color: Color,
}

impl Theme {
    pub fn standard() -> Self {
        Self {
            fallback_color: Color::rgb(0xba, 0xb0, 0xab),
            stock_color: Color::rgb(0x9c, 0x75, 0x5f),
            unknown_material_color: Color::rgb(0x7f, 0x7f, 0x7f),
            cluster_color: Color::rgb(0x4e, 0x79, 0xa7),
        }
    }

    /// Name-derived color; blank names get `fallback_color`.
    pub fn color_for(&self, name: &str) -> Color {
        if name.trim().is_empty() {
            return self.fallback_color;
        }
        color_by_name(name)
    }

    /// Muted variant for print exports.
    pub fn muted() -> Self {
        let standard = Self::standard();
        Self {
            fallback_color: standard.fallback_color.lighten(0.1),
            stock_color: standard.stock_color.lighten(0.15),
            unknown_material_color: standard.unknown_material_color.lighten(0.2),
            cluster_color: standard.cluster_color.lighten(0.15),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::standard()
    }
}
