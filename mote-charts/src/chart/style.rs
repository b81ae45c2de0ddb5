use plotters::style::{RGBAColor, RGBColor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineShape {
    #[default]
    Linear,
    Curved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegendOrientation {
    Horizontal,
    #[default]
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemePreset {
    #[default]
    GrafanaDark,
    Light,
    Minimal,
}

/// Visual parameters of a rendered chart.
///
/// Only the palette, line shape, markers, fill and legend orientation are
/// exposed to configuration; the remaining colors come from the preset.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    pub palette: Vec<String>,
    pub line_shape: LineShape,
    pub show_markers: bool,
    pub fill_under_line: bool,
    pub legend_orientation: LegendOrientation,
    pub width: u32,
    pub height: u32,
    pub line_width: u32,
    pub fill_opacity: f64,
    pub background: RGBColor,
    pub text_color: RGBColor,
    pub muted_text_color: RGBColor,
    pub grid_color: RGBAColor,
    pub axis_color: RGBAColor,
    pub legend_background: RGBAColor,
    pub legend_border: RGBAColor,
    /// Page font; SVG text is drawn in the generic `sans-serif` family.
    pub font_family: &'static str,
    pub empty_message: String,
}

const DEFAULT_EMPTY_MESSAGE: &str = "No readings collected in the last 24h";

impl ChartStyle {
    pub fn preset(preset: ThemePreset) -> Self {
        match preset {
            ThemePreset::GrafanaDark => Self::grafana_dark(),
            ThemePreset::Light => Self::light(),
            ThemePreset::Minimal => Self::minimal(),
        }
    }

    /// Dark dashboard look: filled linear traces, legend on the right.
    pub fn grafana_dark() -> Self {
        Self {
            palette: to_palette(&[
                "#73BF69", "#F2704F", "#B877D9", "#5794F2", "#F2C962", "#00A0EB", "#FF6B5B",
                "#1F4788", "#8AB4B4", "#E67C73", "#2C6E49", "#D63031",
            ]),
            line_shape: LineShape::Linear,
            show_markers: false,
            fill_under_line: true,
            legend_orientation: LegendOrientation::Vertical,
            width: 960,
            height: 340,
            line_width: 2,
            fill_opacity: 0.25,
            background: RGBColor(0x11, 0x18, 0x27),
            text_color: RGBColor(0xE5, 0xE7, 0xEB),
            muted_text_color: RGBColor(0xA1, 0xA5, 0xB0),
            grid_color: RGBAColor(75, 85, 99, 0.2),
            axis_color: RGBAColor(75, 85, 99, 0.4),
            legend_background: RGBAColor(31, 41, 55, 0.95),
            legend_border: RGBAColor(75, 85, 99, 0.6),
            font_family: "'Grafana', -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif",
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
        }
    }

    pub fn light() -> Self {
        Self {
            palette: to_palette(&[
                "#1F77B4", "#FF7F0E", "#2CA02C", "#D62728", "#9467BD", "#8C564B", "#E377C2",
                "#7F7F7F", "#BCBD22", "#17BECF",
            ]),
            line_shape: LineShape::Curved,
            show_markers: true,
            fill_under_line: false,
            legend_orientation: LegendOrientation::Horizontal,
            width: 960,
            height: 340,
            line_width: 2,
            fill_opacity: 0.15,
            background: RGBColor(0xFF, 0xFF, 0xFF),
            text_color: RGBColor(0x1F, 0x29, 0x37),
            muted_text_color: RGBColor(0x6B, 0x72, 0x80),
            grid_color: RGBAColor(209, 213, 219, 0.6),
            axis_color: RGBAColor(156, 163, 175, 0.8),
            legend_background: RGBAColor(249, 250, 251, 0.95),
            legend_border: RGBAColor(209, 213, 219, 0.9),
            font_family: "-apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif",
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
        }
    }

    pub fn minimal() -> Self {
        Self {
            palette: to_palette(&[
                "#4C78A8", "#F58518", "#54A24B", "#E45756", "#72B7B2", "#EECA3B", "#B279A2",
                "#9D755D",
            ]),
            line_shape: LineShape::Linear,
            show_markers: false,
            fill_under_line: false,
            legend_orientation: LegendOrientation::Horizontal,
            width: 960,
            height: 300,
            line_width: 1,
            fill_opacity: 0.1,
            background: RGBColor(0xFA, 0xFA, 0xFA),
            text_color: RGBColor(0x33, 0x33, 0x33),
            muted_text_color: RGBColor(0x88, 0x88, 0x88),
            grid_color: RGBAColor(0, 0, 0, 0.06),
            axis_color: RGBAColor(0, 0, 0, 0.25),
            legend_background: RGBAColor(250, 250, 250, 0.0),
            legend_border: RGBAColor(0, 0, 0, 0.0),
            font_family: "Helvetica, Arial, sans-serif",
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
        }
    }

    /// Color for the series at `position` in label order; wraps around the
    /// palette.
    pub fn color_for(&self, position: usize) -> &str {
        if self.palette.is_empty() {
            return "#888888";
        }
        &self.palette[position % self.palette.len()]
    }

    /// Drawing color for the series at `position`.
    pub fn rgb_for(&self, position: usize) -> RGBColor {
        parse_hex(self.color_for(position)).unwrap_or(RGBColor(0x88, 0x88, 0x88))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.palette.is_empty() {
            return Err("palette must contain at least one color".to_string());
        }
        if let Some(bad) = self.palette.iter().find(|c| !is_hex_color(c)) {
            return Err(format!("palette entry '{bad}' is not a #rrggbb color"));
        }
        Ok(())
    }
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self::grafana_dark()
    }
}

fn to_palette(colors: &[&str]) -> Vec<String> {
    colors.iter().map(|c| c.to_string()).collect()
}

fn is_hex_color(s: &str) -> bool {
    parse_hex(s).is_some()
}

/// `#rrggbb` or `#rgb`.
pub fn parse_hex(s: &str) -> Option<RGBColor> {
    let hex = s.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize, len: usize| u8::from_str_radix(&hex[i * len..(i + 1) * len], 16).ok();
    match hex.len() {
        6 => Some(RGBColor(channel(0, 2)?, channel(1, 2)?, channel(2, 2)?)),
        3 => {
            let (r, g, b) = (channel(0, 1)?, channel(1, 1)?, channel(2, 1)?);
            Some(RGBColor(r * 17, g * 17, b * 17))
        }
        _ => None,
    }
}
