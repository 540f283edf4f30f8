use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub venues: VenueConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// City bounds table: `{"city": [[lon, lat], [lon, lat], "Name"]}`
    pub city_bounds: PathBuf,
    /// Root holding `regions/` and `overlays/`
    #[serde(default = "default_data_root")]
    pub root: PathBuf,
    /// Cities whose regions are worth a look, highlighted in the city list
    #[serde(default)]
    pub meaningful: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_max_region")]
    pub max_region: usize,
    /// Max bounds = fitted region bounds grown by this ratio on each side
    #[serde(default = "default_bounds_padding")]
    pub bounds_padding: f64,
    /// Degrees added around the city centres on the overview map
    #[serde(default = "default_overview_margin")]
    pub overview_margin: f64,
    #[serde(default = "default_label_len")]
    pub label_len: usize,
    #[serde(default = "default_small_label_len")]
    pub small_label_len: usize,
}

/// Venue dot tuning. The defaults were tuned by eye against the live map.
#[derive(Debug, Deserialize, Clone)]
pub struct VenueConfig {
    #[serde(default = "default_min_visits")]
    pub min_visits: u32,
    #[serde(default = "default_radius_range")]
    pub radius_range: [f64; 2],
    #[serde(default = "default_zoom_thresholds")]
    pub zoom_thresholds: Vec<f64>,
    #[serde(default = "default_zoom_factors")]
    pub zoom_factors: Vec<f64>,
    #[serde(default = "default_radius_multiplier")]
    pub radius_multiplier: f64,
    /// Dots whose scaled radius exceeds this get the accent colour
    #[serde(default = "default_accent_threshold")]
    pub accent_threshold: f64,
    #[serde(default = "default_dot_color")]
    pub color: String,
    #[serde(default = "default_accent_color")]
    pub accent_color: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: u8,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
    /// Images wider or taller than this are skipped
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_web_root")]
    pub web_root: PathBuf,
}

fn default_data_root() -> PathBuf { PathBuf::from(".") }
fn default_max_region() -> usize { 18 }
fn default_bounds_padding() -> f64 { 0.3 }
fn default_overview_margin() -> f64 { 2.0 }
fn default_label_len() -> usize { 20 }
fn default_small_label_len() -> usize { 14 }
fn default_min_visits() -> u32 { 5 }
fn default_radius_range() -> [f64; 2] { [1.0, 3.0] }
fn default_zoom_thresholds() -> Vec<f64> { vec![0.0, 10.0, 13.0, 15.0, 17.0] }
fn default_zoom_factors() -> Vec<f64> { vec![0.0, 0.1, 0.3, 0.6, 0.8, 1.2] }
fn default_radius_multiplier() -> f64 { 2.0 }
fn default_accent_threshold() -> f64 { 2.0 }
fn default_dot_color() -> String { "rgba(33, 33, 33, 0.82)".to_string() }
fn default_accent_color() -> String { "rgba(229, 57, 53, 0.82)".to_string() }
fn default_output_dir() -> PathBuf { PathBuf::from("output") }
fn default_min_zoom() -> u8 { 11 }
fn default_max_zoom() -> u8 { 15 }
fn default_max_pixels() -> u32 { 8192 }
fn default_port() -> u16 { 8080 }
fn default_web_root() -> PathBuf { PathBuf::from("web") }

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_region: default_max_region(),
            bounds_padding: default_bounds_padding(),
            overview_margin: default_overview_margin(),
            label_len: default_label_len(),
            small_label_len: default_small_label_len(),
        }
    }
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            min_visits: default_min_visits(),
            radius_range: default_radius_range(),
            zoom_thresholds: default_zoom_thresholds(),
            zoom_factors: default_zoom_factors(),
            radius_multiplier: default_radius_multiplier(),
            accent_threshold: default_accent_threshold(),
            color: default_dot_color(),
            accent_color: default_accent_color(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            max_pixels: default_max_pixels(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port(), web_root: default_web_root() }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        anyhow::ensure!(
            config.venues.zoom_factors.len() == config.venues.zoom_thresholds.len() + 1,
            "venues.zoom_factors must have one more entry than venues.zoom_thresholds"
        );
        anyhow::ensure!(
            config.render.min_zoom <= config.render.max_zoom,
            "render.min_zoom must not exceed render.max_zoom"
        );
        Ok(config)
    }

    pub fn regions_dir(&self) -> PathBuf {
        self.data.root.join("regions")
    }

    pub fn overlays_dir(&self) -> PathBuf {
        self.data.root.join("overlays")
    }

    pub fn label_len(&self, small_screen: bool) -> usize {
        if small_screen { self.display.small_label_len } else { self.display.label_len }
    }
}
