use serde::Deserialize;
use std::{
    fs,
    path::{Component, Path, PathBuf},
    time::Duration,
};

use chrono_tz::Tz;
use mote_client::domain::DeviceCategory;

use crate::{
    chart::{ChartStyle, LegendOrientation, LineShape, ThemePreset},
    error::ChartError,
    series::TimeZones,
    zone,
};

pub const CONFIG_ENV: &str = "MOTE_CHARTS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "mote-charts.toml";
const CATEGORY_PLACEHOLDER: &str = "{category}";

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// An IANA zone name such as `America/Sao_Paulo` or `UTC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ConfigZone(pub Tz);

impl Default for ConfigZone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

impl TryFrom<String> for ConfigZone {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        zone::parse_zone(&raw).map(Self)
    }
}

/// Partial style: a preset plus optional overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub preset: Option<ThemePreset>,
    pub palette: Option<Vec<String>>,
    pub line_shape: Option<LineShape>,
    pub show_markers: Option<bool>,
    pub fill_under_line: Option<bool>,
    pub legend_orientation: Option<LegendOrientation>,
}

impl ThemeConfig {
    /// `self` on top of `base`; fields set here win.
    fn layered_on(&self, base: &ThemeConfig) -> ThemeConfig {
        ThemeConfig {
            preset: self.preset.or(base.preset),
            palette: self.palette.clone().or_else(|| base.palette.clone()),
            line_shape: self.line_shape.or(base.line_shape),
            show_markers: self.show_markers.or(base.show_markers),
            fill_under_line: self.fill_under_line.or(base.fill_under_line),
            legend_orientation: self.legend_orientation.or(base.legend_orientation),
        }
    }

    fn to_style(&self) -> ChartStyle {
        let mut style = ChartStyle::preset(self.preset.unwrap_or_default());
        if let Some(palette) = &self.palette {
            style.palette = palette.clone();
        }
        if let Some(shape) = self.line_shape {
            style.line_shape = shape;
        }
        if let Some(markers) = self.show_markers {
            style.show_markers = markers;
        }
        if let Some(fill) = self.fill_under_line {
            style.fill_under_line = fill;
        }
        if let Some(orientation) = self.legend_orientation {
            style.legend_orientation = orientation;
        }
        style
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub unit: Option<String>,
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub output_root: PathBuf,
    pub path_template: String,
    pub window_hours: u32,
    /// Wall-clock zone of readings stored without an offset.
    pub assumed_timezone: ConfigZone,
    pub display_timezone: ConfigZone,
    pub theme: ThemeConfig,
    pub water: CategoryConfig,
    pub energy: CategoryConfig,
    pub gas: CategoryConfig,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            path_template: "graphs/all{category}Devices24hRaw.html".to_string(),
            window_hours: 24,
            assumed_timezone: ConfigZone::default(),
            display_timezone: ConfigZone::default(),
            theme: ThemeConfig::default(),
            water: CategoryConfig::default(),
            energy: CategoryConfig::default(),
            gas: CategoryConfig::default(),
        }
    }
}

impl ChartsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.window_hours) * 3600)
    }

    pub fn zones(&self) -> TimeZones {
        TimeZones {
            assumed: self.assumed_timezone.0,
            display: self.display_timezone.0,
        }
    }

    fn category(&self, category: DeviceCategory) -> &CategoryConfig {
        match category {
            DeviceCategory::Water => &self.water,
            DeviceCategory::Energy => &self.energy,
            DeviceCategory::Gas => &self.gas,
        }
    }

    pub fn unit_for(&self, category: DeviceCategory) -> &str {
        self.category(category)
            .unit
            .as_deref()
            .unwrap_or_else(|| default_unit(category))
    }

    pub fn style_for(&self, category: DeviceCategory) -> ChartStyle {
        let mut style = self.category(category).theme.layered_on(&self.theme).to_style();
        style.empty_message = format!("No readings collected in the last {}h", self.window_hours);
        style
    }

    /// Artifact path relative to `output_root`, also the value stored in the
    /// pointer table.
    pub fn relative_path(&self, category: DeviceCategory) -> String {
        self.path_template
            .replace(CATEGORY_PLACEHOLDER, category_slug(category))
    }

    pub fn output_path(&self, category: DeviceCategory) -> PathBuf {
        self.output_root.join(self.relative_path(category))
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        if !self.path_template.contains(CATEGORY_PLACEHOLDER) {
            return Err(ChartError::Config(format!(
                "path_template must contain {CATEGORY_PLACEHOLDER}"
            )));
        }
        let template = Path::new(&self.path_template);
        if template
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ChartError::Config(
                "path_template must be a relative path without '..'".to_string(),
            ));
        }
        if self.window_hours == 0 {
            return Err(ChartError::Config("window_hours must be positive".to_string()));
        }
        for category in DeviceCategory::ALL {
            self.style_for(category)
                .validate()
                .map_err(|e| ChartError::Config(format!("{category} theme: {e}")))?;
        }
        Ok(())
    }
}

pub fn default_unit(category: DeviceCategory) -> &'static str {
    match category {
        DeviceCategory::Water => "L",
        DeviceCategory::Energy => "W",
        DeviceCategory::Gas => "m³",
    }
}

pub fn category_slug(category: DeviceCategory) -> &'static str {
    match category {
        DeviceCategory::Water => "WMote",
        DeviceCategory::Energy => "EMote",
        DeviceCategory::Gas => "GMote",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub charts: ChartsConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let contents = fs::read_to_string(&path).map_err(|e| ChartError::io(&path, e))?;
        Ok(Self::from_toml_str(&contents)?)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ChartError> {
        let cfg: AppConfig = toml::from_str(contents).map_err(|e| ChartError::Config(e.to_string()))?;
        cfg.charts.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = AppConfig::from_toml_str("[database]\nurl = \"sqlite::memory:\"\n").unwrap();
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.charts.window_hours, 24);
        assert_eq!(
            cfg.charts.relative_path(DeviceCategory::Water),
            "graphs/allWMoteDevices24hRaw.html"
        );
        assert_eq!(
            cfg.charts.relative_path(DeviceCategory::Gas),
            "graphs/allGMoteDevices24hRaw.html"
        );
        assert_eq!(cfg.charts.unit_for(DeviceCategory::Energy), "W");
        assert_eq!(cfg.charts.zones(), TimeZones::default());
        assert_eq!(cfg.charts.style_for(DeviceCategory::Gas).palette, ChartStyle::grafana_dark().palette);
    }

    #[test]
    fn category_theme_overrides_layer_over_the_global_theme() {
        let cfg = AppConfig::from_toml_str(
            r##"
            [database]
            url = "postgres://localhost/motes"
            max_connections = 2

            [charts]
            output_root = "/srv/www"
            window_hours = 12
            assumed_timezone = "America/Sao_Paulo"
            display_timezone = "UTC"

            [charts.theme]
            preset = "light"
            show_markers = false

            [charts.gas]
            unit = "kWh"

            [charts.gas.theme]
            palette = ["#000000", "#fff"]
            fill_under_line = true
            "##,
        )
        .unwrap();

        let charts = &cfg.charts;
        assert_eq!(charts.window(), Duration::from_secs(12 * 3600));
        assert_eq!(charts.zones().assumed, chrono_tz::America::Sao_Paulo);
        assert_eq!(charts.zones().display, chrono_tz::UTC);
        assert_eq!(charts.unit_for(DeviceCategory::Gas), "kWh");
        assert_eq!(charts.unit_for(DeviceCategory::Water), "L");
        assert_eq!(
            charts.output_path(DeviceCategory::Energy),
            PathBuf::from("/srv/www/graphs/allEMoteDevices24hRaw.html")
        );

        let water = charts.style_for(DeviceCategory::Water);
        assert_eq!(water.line_shape, LineShape::Curved);
        assert!(!water.show_markers);
        assert!(!water.fill_under_line);
        assert_eq!(water.empty_message, "No readings collected in the last 12h");

        let gas = charts.style_for(DeviceCategory::Gas);
        assert_eq!(gas.palette, vec!["#000000".to_string(), "#fff".to_string()]);
        assert!(gas.fill_under_line);
        assert!(!gas.show_markers);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let base = "[database]\nurl = \"sqlite::memory:\"\n[charts]\n";
        for extra in [
            "path_template = \"graphs/chart.html\"",
            "path_template = \"../{category}.html\"",
            "path_template = \"/abs/{category}.html\"",
            "window_hours = 0",
            "assumed_timezone = \"-03:00\"",
            "display_timezone = \"Europe/Atlantis\"",
            "theme = { palette = [] }",
            "theme = { palette = [\"blue\"] }",
        ] {
            let toml = format!("{base}{extra}\n");
            assert!(AppConfig::from_toml_str(&toml).is_err(), "{extra}");
        }
    }

    #[test]
    fn zones_are_iana_names() {
        assert_eq!(
            ConfigZone::try_from("Europe/Berlin".to_string()).unwrap().0,
            chrono_tz::Europe::Berlin
        );
        assert_eq!(ConfigZone::try_from("UTC".to_string()).unwrap().0, chrono_tz::UTC);
        assert!(ConfigZone::try_from("+05:30".to_string()).is_err());
    }
}
