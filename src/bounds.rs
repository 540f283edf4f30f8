//! City bounds table and the bounding-box helpers the map view needs.
//!
//! Rectangles are `geo::Rect` with `x = longitude` and `y = latitude`. When
//! handed to the map they are written south-west first as `[lat, lon]`
//! pairs, the order Leaflet expects.

use crate::error::DataError;
use anyhow::{Context, Result};
use geo::{coord, Point, Rect};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct City {
    pub id: String,
    pub name: String,
    pub bounds: Rect<f64>,
}

impl City {
    pub fn center(&self) -> Point<f64> {
        self.bounds.center().into()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CityTable {
    cities: Vec<City>,
}

/// `[[south, west], [north, east]]`
pub type LatLngBounds = [[f64; 2]; 2];

pub fn to_lat_lng(rect: &Rect<f64>) -> LatLngBounds {
    [[rect.min().y, rect.min().x], [rect.max().y, rect.max().x]]
}

/// Grows each side by `ratio` times the extent along that axis.
pub fn pad(rect: &Rect<f64>, ratio: f64) -> Rect<f64> {
    let dx = rect.width() * ratio;
    let dy = rect.height() * ratio;
    Rect::new(
        coord! { x: rect.min().x - dx, y: rect.min().y - dy },
        coord! { x: rect.max().x + dx, y: rect.max().y + dy },
    )
}

pub fn extend(a: &Rect<f64>, b: &Rect<f64>) -> Rect<f64> {
    Rect::new(
        coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct CityEntry {
    pub id: String,
    pub name: String,
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub bounds: LatLngBounds,
    pub meaningful: bool,
}

impl CityTable {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read city bounds: {:?}", path))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse city bounds: {:?}", path))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
        let mut cities = Vec::with_capacity(raw.len());
        for (id, value) in raw {
            let (sw, ne, name): ([f64; 2], [f64; 2], String) = serde_json::from_value(value)
                .with_context(|| format!("City {:?} must be [[lon, lat], [lon, lat], name]", id))?;
            cities.push(City {
                id,
                name,
                bounds: Rect::new(coord! { x: sw[0], y: sw[1] }, coord! { x: ne[0], y: ne[1] }),
            });
        }
        Ok(Self { cities })
    }

    pub fn get(&self, id: &str) -> Result<&City, DataError> {
        self.cities
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DataError::UnknownCity(id.to_string()))
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Box around every city centre, grown by `margin` degrees, used before
    /// any city is chosen.
    pub fn overview_bounds(&self, margin: f64) -> Option<Rect<f64>> {
        let mut centers = self.cities.iter().map(City::center);
        let first = centers.next()?;
        let rect = centers.fold(Rect::new(first.0, first.0), |acc, c| {
            extend(&acc, &Rect::new(c.0, c.0))
        });
        Some(Rect::new(
            coord! { x: rect.min().x - margin, y: rect.min().y - margin },
            coord! { x: rect.max().x + margin, y: rect.max().y + margin },
        ))
    }

    pub fn entries(&self, meaningful: &[String]) -> Vec<CityEntry> {
        self.cities
            .iter()
            .map(|c| {
                let center = c.center();
                CityEntry {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    center: [center.y(), center.x()],
                    bounds: to_lat_lng(&c.bounds),
                    meaningful: meaningful.iter().any(|m| m == &c.id),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TABLE: &str = r#"{
        "paris": [[2.25, 48.81], [2.42, 48.90], "Paris"],
        "newyork": [[-74.05, 40.68], [-73.90, 40.85], "New York"]
    }"#;

    #[test]
    fn parses_in_file_order() {
        let table = CityTable::from_json_str(TABLE).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cities()[0].id, "paris");
        assert_eq!(table.get("newyork").unwrap().name, "New York");
        assert!(matches!(table.get("rome"), Err(DataError::UnknownCity(_))));
    }

    #[test]
    fn bounds_are_written_lat_first() {
        let table = CityTable::from_json_str(TABLE).unwrap();
        let paris = table.get("paris").unwrap();
        assert_eq!(to_lat_lng(&paris.bounds), [[48.81, 2.25], [48.90, 2.42]]);
        let center = paris.center();
        assert_relative_eq!(center.y(), 48.855, epsilon = 1e-9);
        assert_relative_eq!(center.x(), 2.335, epsilon = 1e-9);
    }

    #[test]
    fn overview_covers_all_centres_with_margin() {
        let table = CityTable::from_json_str(TABLE).unwrap();
        let overview = table.overview_bounds(2.0).unwrap();
        assert_relative_eq!(overview.min().x, -73.975 - 2.0, epsilon = 1e-9);
        assert_relative_eq!(overview.max().x, 2.335 + 2.0, epsilon = 1e-9);
        assert_relative_eq!(overview.min().y, 40.765 - 2.0, epsilon = 1e-9);
        assert!(CityTable::default().overview_bounds(2.0).is_none());
    }

    #[test]
    fn pad_grows_each_side_by_ratio() {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 20.0 });
        let padded = pad(&rect, 0.3);
        assert_relative_eq!(padded.min().x, -3.0);
        assert_relative_eq!(padded.max().x, 13.0);
        assert_relative_eq!(padded.min().y, -6.0);
        assert_relative_eq!(padded.max().y, 26.0);
    }

    #[test]
    fn meaningful_flags_follow_config() {
        let table = CityTable::from_json_str(TABLE).unwrap();
        let entries = table.entries(&["paris".to_string()]);
        assert!(entries[0].meaningful);
        assert!(!entries[1].meaningful);
    }
}
