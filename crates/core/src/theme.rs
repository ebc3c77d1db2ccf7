//! Theme settings and CSS custom property generation.
//!
//! [`css_variables`] is a pure function of [`ThemeSettings`]: equal settings
//! always produce an identical, deterministically ordered variable map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lighten/darken step applied to palette colors, in percent.
const SHADE_STEP_PERCENT: u16 = 20;

/// Base font size in pixels at 100% scale.
const BASE_FONT_PX: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThemeError {
    #[error("invalid color for {field}: {value:?}")]
    InvalidColor { field: &'static str, value: String },
    #[error("font scale must be between 50 and 200 percent (got {0})")]
    FontScale(u16),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

/// User-adjustable theme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThemeSettings {
    #[serde(default)]
    pub mode: ThemeMode,
    /// Hex colors, `#rgb` or `#rrggbb` (the `#` is optional).
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub font_family: String,
    /// Base corner radius in pixels.
    pub border_radius: u8,
    /// Font scale in percent (100 = default size).
    pub font_scale: u16,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Light,
            primary_color: "#6d28d9".to_string(),
            secondary_color: "#0f766e".to_string(),
            accent_color: "#f59e0b".to_string(),
            font_family: "Inter, system-ui, sans-serif".to_string(),
            border_radius: 8,
            font_scale: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb(u8, u8, u8);

impl Rgb {
    fn parse(field: &'static str, raw: &str) -> Result<Self, ThemeError> {
        let invalid = || ThemeError::InvalidColor {
            field,
            value: raw.to_string(),
        };
        let hex = raw.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(invalid()),
        };
        let channel = |i: usize| {
            expanded
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(invalid)
        };
        Ok(Self(channel(0)?, channel(2)?, channel(4)?))
    }

    fn mix(self, toward: u8, percent: u16) -> Self {
        let blend = |c: u8| {
            let c = u16::from(c);
            let t = u16::from(toward);
            let mixed = if t >= c {
                c + (t - c) * percent / 100
            } else {
                c - (c - t) * percent / 100
            };
            u8::try_from(mixed).unwrap_or(u8::MAX)
        };
        Self(blend(self.0), blend(self.1), blend(self.2))
    }

    fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn triplet(self) -> String {
        format!("{}, {}, {}", self.0, self.1, self.2)
    }
}

/// Generate the CSS custom properties for `settings`.
///
/// # Errors
///
/// Returns [`ThemeError`] if a color is not valid hex or the font scale is
/// out of range.
pub fn css_variables(settings: &ThemeSettings) -> Result<BTreeMap<String, String>, ThemeError> {
    if !(50..=200).contains(&settings.font_scale) {
        return Err(ThemeError::FontScale(settings.font_scale));
    }

    let mut vars = BTreeMap::new();
    for (name, field, raw) in [
        ("primary", "primary_color", &settings.primary_color),
        ("secondary", "secondary_color", &settings.secondary_color),
        ("accent", "accent_color", &settings.accent_color),
    ] {
        let color = Rgb::parse(field, raw)?;
        vars.insert(format!("--color-{name}"), color.hex());
        vars.insert(format!("--color-{name}-rgb"), color.triplet());
        vars.insert(
            format!("--color-{name}-light"),
            color.mix(u8::MAX, SHADE_STEP_PERCENT).hex(),
        );
        vars.insert(
            format!("--color-{name}-dark"),
            color.mix(0, SHADE_STEP_PERCENT).hex(),
        );
    }

    let (background, surface, text, muted, border) = match settings.mode {
        ThemeMode::Light => ("#ffffff", "#f8fafc", "#0f172a", "#64748b", "#e2e8f0"),
        ThemeMode::Dark => ("#0b1120", "#111827", "#f1f5f9", "#94a3b8", "#1f2937"),
    };
    vars.insert("--color-background".to_string(), background.to_string());
    vars.insert("--color-surface".to_string(), surface.to_string());
    vars.insert("--color-text".to_string(), text.to_string());
    vars.insert("--color-text-muted".to_string(), muted.to_string());
    vars.insert("--color-border".to_string(), border.to_string());

    let radius = u32::from(settings.border_radius);
    vars.insert("--radius-sm".to_string(), format!("{}px", radius / 2));
    vars.insert("--radius-md".to_string(), format!("{radius}px"));
    vars.insert("--radius-lg".to_string(), format!("{}px", radius * 2));
    vars.insert("--radius-full".to_string(), "9999px".to_string());

    vars.insert("--font-family".to_string(), settings.font_family.clone());
    let font_px = (BASE_FONT_PX * u32::from(settings.font_scale) + 50) / 100;
    vars.insert("--font-size-base".to_string(), format!("{font_px}px"));

    Ok(vars)
}

/// Render a variable map as a `:root` rule.
#[must_use]
pub fn to_css(vars: &BTreeMap<String, String>) -> String {
    let mut css = String::from(":root {\n");
    for (name, value) in vars {
        css.push_str("  ");
        css.push_str(name);
        css.push_str(": ");
        css.push_str(value);
        css.push_str(";\n");
    }
    css.push_str("}\n");
    css
}
