use crate::error::DataError;
use crate::types::Dimension;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    Likely,
    Distinctive,
}

impl ScoreType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreType::Likely => "likely",
            ScoreType::Distinctive => "distinctive",
        }
    }
}

/// Which heatmap is shown: a feature axis and how it is scored, written
/// `cat_likely`, `time_distinct`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSelector {
    pub axis: Dimension,
    pub score: ScoreType,
}

impl Default for FeatureSelector {
    fn default() -> Self {
        Self { axis: Dimension::Category, score: ScoreType::Likely }
    }
}

impl FromStr for FeatureSelector {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (axis, score) = s.split_once('_').unwrap_or((s, ""));
        let axis = Dimension::from_key(axis).ok_or_else(|| DataError::UnknownFeatureAxis(axis.to_string()))?;
        // anything but "likely" means distinctive
        let score = if score == "likely" { ScoreType::Likely } else { ScoreType::Distinctive };
        Ok(Self { axis, score })
    }
}

impl fmt::Display for FeatureSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let score = match self.score {
            ScoreType::Likely => "likely",
            ScoreType::Distinctive => "distinct",
        };
        write!(f, "{}_{}", self.axis.key(), score)
    }
}

impl FeatureSelector {
    /// Feature name used in overlay file names.
    pub fn feature_name(&self) -> &'static str {
        match self.axis {
            Dimension::Category => "primCategory",
            Dimension::Time => "timeOfDay",
            Dimension::Day => "dayOfWeek",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayUrls {
    pub image: String,
    pub legend: String,
}

/// Image and legend URLs of a city's heatmap. `value` picks the map of one
/// feature value; `None` is the combined `main` map.
pub fn overlay_urls(city: &str, selector: &FeatureSelector, value: Option<&str>) -> OverlayUrls {
    let infix = format!("{}_{}_{}_", city, selector.feature_name(), selector.score.as_str());
    let file_infix: String = infix.chars().filter(|c| *c != ' ').collect::<String>().replace('/', "+");
    let suffix = match value {
        Some(v) => format!("{}.png", v),
        None => "main.png".to_string(),
    };
    OverlayUrls {
        image: format!("overlays/{}{}", file_infix, suffix),
        legend: format!("overlays/legends/{}main.json", infix),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayChange {
    /// First overlay for this city. A layer left from another city must be
    /// removed by the caller before this one is added.
    Add { url: String },
    SetUrl { url: String },
    Unchanged,
}

/// The single heatmap layer on the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayState {
    pub city: Option<String>,
    pub url: Option<String>,
}

impl OverlayState {
    pub fn apply(&mut self, city: &str, url: &str) -> OverlayChange {
        if self.city.as_deref() != Some(city) {
            self.city = Some(city.to_string());
            self.url = Some(url.to_string());
            return OverlayChange::Add { url: url.to_string() };
        }
        if self.url.as_deref() != Some(url) {
            self.url = Some(url.to_string());
            return OverlayChange::SetUrl { url: url.to_string() };
        }
        OverlayChange::Unchanged
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// Components in `[0, 1]`, scaled to bytes and truncated.
    pub fn from_unit(components: [f64; 3]) -> Self {
        Rgb(components.map(|c| (c * 255.0).clamp(0.0, 255.0) as u8))
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub name: String,
    pub color: String,
    pub rgb: Rgb,
    /// Full title-cased name, shown on hover
    pub title: String,
    /// Shortened title shown next to the swatch
    pub label: String,
    /// Lower-cased short name for the value selector
    pub option_label: String,
    /// Value used in the per-value overlay file name
    pub value: String,
}

/// Parses `{"name": [r, g, b], ...}` keeping the file's order.
pub fn parse_legend(content: &str, label_len: usize) -> Result<Vec<LegendEntry>> {
    let raw: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(content).context("Failed to parse legend JSON")?;
    raw.into_iter()
        .map(|(name, value)| -> Result<LegendEntry> {
            let components: [f64; 3] = serde_json::from_value(value)
                .map_err(|_| DataError::BadLegendEntry { name: name.clone() })?;
            let rgb = Rgb::from_unit(components);
            let title = title_case(&name);
            Ok(LegendEntry {
                color: rgb.hex(),
                rgb,
                label: ellipsize(&title, label_len),
                option_label: ellipsize(&name.to_lowercase(), label_len),
                value: name.chars().filter(|c| !c.is_whitespace()).collect(),
                title,
                name,
            })
        })
        .collect()
}

/// Capitalizes the first letter of every word, lower-casing the rest.
/// Hyphens and apostrophes are part of a word.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        let word_char = c.is_alphanumeric() || c == '_' || c == '-' || c == '\'';
        if word_char && !in_word {
            out.extend(c.to_uppercase());
        } else if word_char {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        in_word = word_char;
    }
    out
}

pub fn ellipsize(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_len).collect();
    out.push('…');
    out
}
