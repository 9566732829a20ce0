use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\S+)\s*(.*)$").unwrap());
static HEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

const DEFAULT_COLOR: Color = Color::rgb(0xba, 0xb0, 0xab);
const BASE_SATURATION: f32 = 0.62;
const BASE_LIGHTNESS: f32 = 0.52;
// Hue wiggle (degrees) and lightness wiggle applied to the part after the prefix.
const SUFFIX_HUE_SPREAD: f32 = 24.0;
const SUFFIX_LIGHTNESS_SPREAD: f32 = 0.16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `h` in degrees, `s` and `l` in `[0, 1]`.
    pub fn from_hsl(h: f32, s: f32, l: f32) -> Self {
        let h = h.rem_euclid(360.0) / 360.0;
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);
        if s == 0.0 {
            let v = (l * 255.0).round() as u8;
            return Self::rgb(v, v, v);
        }
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let channel = |t: f32| {
            let t = t.rem_euclid(1.0);
            let v = if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            };
            (v * 255.0).round().clamp(0.0, 255.0) as u8
        };
        Self::rgb(channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
    }

    pub fn to_hsl(self) -> (f32, f32, f32) {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        if (max - min).abs() < f32::EPSILON {
            return (0.0, 0.0, l);
        }
        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        (h * 60.0, s, l)
    }

    /// Parses `#rgb` or `#rrggbb`.
    pub fn parse(value: &str) -> Option<Self> {
        let caps = HEX_RE.captures(value.trim())?;
        let hex = caps.get(1)?.as_str();
        let digits: Vec<u8> = if hex.len() == 3 {
            hex.chars()
                .map(|c| u8::from_str_radix(&format!("{c}{c}"), 16).ok())
                .collect::<Option<_>>()?
        } else {
            (0..3)
                .map(|i| u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok())
                .collect::<Option<_>>()?
        };
        Some(Self::rgb(digits[0], digits[1], digits[2]))
    }

    pub fn lighten(self, amount: f32) -> Self {
        let (h, s, l) = self.to_hsl();
        Self::from_hsl(h, s, l + amount)
    }
}

impl Default for Color {
    fn default() -> Self {
        DEFAULT_COLOR
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color '{raw}'")))
    }
}

/// Maps a display name to a stable color.
///
/// The hue comes from the first word of the name (case-insensitive), so
/// "Metal scrap" and "Metal sheets" sit next to each other; the remainder only
/// nudges hue and lightness. Blank names get the default color.
pub fn color_by_name(name: &str) -> Color {
    let Some(caps) = PREFIX_RE.captures(name) else {
        return DEFAULT_COLOR;
    };
    let prefix = caps
        .get(1)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();
    if prefix.is_empty() {
        return DEFAULT_COLOR;
    }
    let rest = caps
        .get(2)
        .map(|m| m.as_str().trim().to_lowercase())
        .unwrap_or_default();

    let hue = (fnv1a(prefix.as_bytes()) % 360) as f32;
    let (hue_shift, lightness_shift) = if rest.is_empty() {
        (0.0, 0.0)
    } else {
        let rest_hash = fnv1a(rest.as_bytes());
        let unit_a = (rest_hash & 0xffff) as f32 / 65535.0;
        let unit_b = ((rest_hash >> 16) & 0xffff) as f32 / 65535.0;
        (
            (unit_a - 0.5) * SUFFIX_HUE_SPREAD,
            (unit_b - 0.5) * SUFFIX_LIGHTNESS_SPREAD,
        )
    };
    Color::from_hsl(
        hue + hue_shift,
        BASE_SATURATION,
        BASE_LIGHTNESS + lightness_shift,
    )
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hue_distance(a: Color, b: Color) -> f32 {
        let (ha, _, _) = a.to_hsl();
        let (hb, _, _) = b.to_hsl();
        let d = (ha - hb).abs() % 360.0;
        d.min(360.0 - d)
    }

    #[test]
    fn same_name_same_color() {
        assert_eq!(color_by_name("Metal X"), color_by_name("Metal X"));
        assert_eq!(color_by_name("metal x"), color_by_name("  Metal X "));
    }

    #[test]
    fn blank_names_use_default() {
        assert_eq!(color_by_name(""), Color::default());
        assert_eq!(color_by_name("   "), Color::default());
    }

    #[test]
    fn shared_prefix_stays_close() {
        let scrap = color_by_name("Metal scrap");
        let sheets = color_by_name("Metal sheets");
        assert!(hue_distance(scrap, sheets) <= SUFFIX_HUE_SPREAD + 2.0);
    }

    #[test]
    fn parse_and_display_hex() {
        let color = Color::parse("#4e79a7").unwrap();
        assert_eq!(color, Color::rgb(0x4e, 0x79, 0xa7));
        assert_eq!(color.to_string(), "#4e79a7");
        assert_eq!(Color::parse("#fff"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(Color::parse("red"), None);
    }

    #[test]
    fn hsl_round_trip_is_close() {
        let color = Color::rgb(200, 80, 40);
        let (h, s, l) = color.to_hsl();
        let back = Color::from_hsl(h, s, l);
        assert!((color.r as i32 - back.r as i32).abs() <= 1);
        assert!((color.g as i32 - back.g as i32).abs() <= 1);
        assert!((color.b as i32 - back.b as i32).abs() <= 1);
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&Color::rgb(0, 16, 255)).unwrap();
        assert_eq!(json, "\"#0010ff\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(0, 16, 255));
    }
}
