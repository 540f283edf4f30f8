//! Venue points and the dot sizing used to draw them.
//!
//! A venue's dot radius is `multiplier * log_scale(count) * zoom_factor(zoom)`.
//! The constants come from configuration and were tuned by eye; rendering at
//! some zoom levels still looks off and they are kept unchanged until someone
//! decides how it should look.

use crate::config::VenueConfig;
use crate::error::DataError;
use crate::types::VenuePoint;
use anyhow::{Context, Result};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn venue_file(regions_dir: &Path, city: &str) -> PathBuf {
    regions_dir.join(format!("{}_venues_compact.json", city))
}

#[derive(Deserialize)]
struct CompactVenues {
    venues: Vec<serde_json::Value>,
}

pub fn load_venues(path: &Path, min_visits: u32) -> Result<Vec<VenuePoint>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to open venue file: {:?}", path))?;
    let venues = parse_venues(&content, min_visits)
        .with_context(|| format!("Failed to load venues from {:?}", path))?;
    debug!("Kept {} venues from {:?}", venues.len(), path);
    Ok(venues)
}

/// Parses `{"venues": [[lon, lat, count], ...]}`, keeping venues visited at
/// least `min_visits` times.
pub fn parse_venues(content: &str, min_visits: u32) -> Result<Vec<VenuePoint>> {
    let raw: CompactVenues = serde_json::from_str(content).context("Failed to parse venue JSON")?;
    let mut venues = Vec::with_capacity(raw.venues.len());
    for (index, entry) in raw.venues.iter().enumerate() {
        let triple = entry.as_array().filter(|a| a.len() == 3).ok_or(DataError::BadVenue { index })?;
        let lon = triple[0].as_f64().ok_or(DataError::BadVenue { index })?;
        let lat = triple[1].as_f64().ok_or(DataError::BadVenue { index })?;
        let count = triple[2].as_f64().ok_or(DataError::BadVenue { index })?;
        if count < min_visits as f64 {
            continue;
        }
        venues.push(VenuePoint { point: Point::new(lon, lat), count });
    }
    Ok(venues)
}

/// Natural-log scale with its domain rounded outward to integer powers of e.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScale {
    log_domain: [f64; 2],
    range: [f64; 2],
}

impl LogScale {
    pub fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        let log_domain = [domain[0].ln().floor(), domain[1].ln().ceil()];
        Self { log_domain, range }
    }

    /// Scale over `[min_visits, max observed count]`, `None` without venues.
    pub fn for_venues(venues: &[VenuePoint], config: &VenueConfig) -> Option<Self> {
        let max = venues.iter().map(|v| v.count).reduce(f64::max)?;
        Some(Self::new([config.min_visits.max(1) as f64, max], config.radius_range))
    }

    pub fn domain(&self) -> [f64; 2] {
        [self.log_domain[0].exp(), self.log_domain[1].exp()]
    }

    pub fn scale(&self, count: f64) -> f64 {
        let span = self.log_domain[1] - self.log_domain[0];
        if span == 0.0 {
            return self.range[0];
        }
        let t = (count.ln() - self.log_domain[0]) / span;
        self.range[0] + t * (self.range[1] - self.range[0])
    }
}

/// Step function from zoom level to radius factor: `factors[i]` applies to
/// zooms in `[thresholds[i - 1], thresholds[i])`.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomFactor {
    thresholds: Vec<f64>,
    factors: Vec<f64>,
}

impl ZoomFactor {
    pub fn new(thresholds: Vec<f64>, factors: Vec<f64>) -> Self {
        Self { thresholds, factors }
    }

    pub fn from_config(config: &VenueConfig) -> Self {
        Self::new(config.zoom_thresholds.clone(), config.zoom_factors.clone())
    }

    pub fn factor(&self, zoom: f64) -> f64 {
        let step = self.thresholds.partition_point(|&t| t <= zoom);
        self.factors.get(step).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dot {
    pub lat: f64,
    pub lon: f64,
    pub count: f64,
    /// Radius before the zoom factor
    pub radius: f64,
    /// On-screen radius in pixels at the requested zoom
    pub screen_radius: f64,
    pub color: String,
}

pub struct DotStyler<'a> {
    scale: LogScale,
    zoom: ZoomFactor,
    config: &'a VenueConfig,
}

impl<'a> DotStyler<'a> {
    pub fn new(scale: LogScale, config: &'a VenueConfig) -> Self {
        Self { scale, zoom: ZoomFactor::from_config(config), config }
    }

    pub fn radius(&self, venue: &VenuePoint) -> f64 {
        self.scale.scale(venue.count)
    }

    pub fn screen_radius(&self, venue: &VenuePoint, zoom: f64) -> f64 {
        self.config.radius_multiplier * self.radius(venue) * self.zoom.factor(zoom)
    }

    pub fn is_accent(&self, venue: &VenuePoint) -> bool {
        self.radius(venue) > self.config.accent_threshold
    }

    pub fn color(&self, venue: &VenuePoint) -> &'a str {
        if self.is_accent(venue) { &self.config.accent_color } else { &self.config.color }
    }

    pub fn dot(&self, venue: &VenuePoint, zoom: f64) -> Dot {
        Dot {
            lat: venue.lat(),
            lon: venue.lon(),
            count: venue.count,
            radius: self.radius(venue),
            screen_radius: self.screen_radius(venue, zoom),
            color: self.color(venue).to_string(),
        }
    }
}

pub fn dots(venues: &[VenuePoint], config: &VenueConfig, zoom: f64) -> Vec<Dot> {
    match LogScale::for_venues(venues, config) {
        Some(scale) => {
            let styler = DotStyler::new(scale, config);
            venues.iter().map(|v| styler.dot(v, zoom)).collect()
        }
        None => Vec::new(),
    }
}
