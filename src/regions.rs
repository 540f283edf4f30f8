use crate::bounds::{extend, pad};
use crate::error::DataError;
use crate::types::{Dimension, Distribution, Region};
use anyhow::{Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::{MultiPolygon, Point, Rect};
use geojson::{Feature, GeoJson};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use std::convert::TryInto;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn region_file(regions_dir: &Path, city: &str) -> PathBuf {
    regions_dir.join(format!("{}_distrib.json", city))
}

pub fn load_regions(path: &Path, max_region: usize) -> Result<Vec<Region>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to open region file: {:?}", path))?;
    let regions = parse_regions(&content, max_region)
        .with_context(|| format!("Failed to load regions from {:?}", path))?;
    debug!("Loaded {} regions from {:?}", regions.len(), path);
    Ok(regions)
}

/// Reads at most `max_region + 1` features, in file order.
pub fn parse_regions(content: &str, max_region: usize) -> Result<Vec<Region>> {
    let geojson: GeoJson = content.parse().context("Failed to parse region GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(DataError::NotAFeatureCollection.into()),
    };

    let mut regions = Vec::new();
    for (index, feature) in collection.features.into_iter().take(max_region.saturating_add(1)).enumerate() {
        regions.push(region_from_feature(index, feature)?);
    }
    Ok(regions)
}

fn region_from_feature(index: usize, feature: Feature) -> Result<Region, DataError> {
    let props = feature.properties.as_ref();
    let get = |name: &str| props.and_then(|p| p.get(name));
    let require = |name: &str| {
        get(name).ok_or_else(|| DataError::MissingProperty { index, property: name.to_string() })
    };

    let name = match require("name")? {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return Err(DataError::BadProperty { index, property: "name".into(), expected: "a string" }),
    };
    let weight = require("weight")?.as_f64().ok_or_else(|| DataError::BadProperty {
        index,
        property: "weight".into(),
        expected: "a number",
    })?;

    let read_distribution = |dimension: Dimension| -> Result<Option<Distribution>, DataError> {
        let prefix = dimension.property_prefix();
        let abs_name = format!("{}_distrib", prefix);
        let rel_name = format!("{}_more", prefix);
        let (absolute, relative) = match (get(abs_name.as_str()), get(rel_name.as_str())) {
            (None, None) if dimension == Dimension::Day => return Ok(None),
            (Some(a), Some(r)) => (
                number_array(index, &abs_name, a, dimension.labels().len())?,
                number_array(index, &rel_name, r, dimension.labels().len())?,
            ),
            (None, _) => return Err(DataError::MissingProperty { index, property: abs_name }),
            (_, None) => return Err(DataError::MissingProperty { index, property: rel_name }),
        };
        Ok(Some(Distribution { absolute, relative }))
    };

    let category = read_distribution(Dimension::Category)?
        .ok_or_else(|| DataError::MissingProperty { index, property: "category_distrib".into() })?;
    let time = read_distribution(Dimension::Time)?
        .ok_or_else(|| DataError::MissingProperty { index, property: "time_distrib".into() })?;
    let days = read_distribution(Dimension::Day)?;

    let geometry = match feature.geometry {
        Some(geom) => {
            let geo_geom: geo::Geometry<f64> = geom.value.try_into()
                .map_err(|_| DataError::NotAPolygon { index })?;
            match geo_geom {
                geo::Geometry::MultiPolygon(mp) => mp,
                geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                _ => return Err(DataError::NotAPolygon { index }),
            }
        }
        None => return Err(DataError::NotAPolygon { index }),
    };

    Ok(Region { index, name, geometry, weight, category, time, days })
}

fn number_array(
    index: usize,
    property: &str,
    value: &serde_json::Value,
    expected: usize,
) -> Result<Vec<f64>, DataError> {
    let bad = || DataError::BadProperty {
        index,
        property: property.to_string(),
        expected: "an array of numbers",
    };
    let values = value
        .as_array()
        .ok_or_else(bad)?
        .iter()
        .map(|v| v.as_f64().ok_or_else(bad))
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != expected {
        return Err(DataError::DistributionLength {
            index,
            property: property.to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}

/// Union of all region bounding boxes.
pub fn fit_bounds(regions: &[Region]) -> Option<Rect<f64>> {
    regions
        .iter()
        .filter_map(|r| r.geometry.bounding_rect())
        .reduce(|acc, rect| extend(&acc, &rect))
}

/// Panning limit: the fitted bounds grown by `padding` on every side.
pub fn max_bounds(regions: &[Region], padding: f64) -> Option<Rect<f64>> {
    fit_bounds(regions).map(|rect| pad(&rect, padding))
}

pub fn weight_sentence(region: &Region) -> String {
    format!(", which accounts for {:.2}% of the city mass.", 100.0 * region.weight)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEntry {
    pub value: i64,
    pub label: String,
}

/// Entries for the region selector, headed by the "nothing selected" entry.
pub fn region_list(regions: &[Region]) -> Vec<ListEntry> {
    std::iter::once(ListEntry { value: -1, label: "some region".to_string() })
        .chain(regions.iter().map(|r| ListEntry { value: r.index as i64, label: r.name.clone() }))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolyStyle {
    pub color: String,
    pub fill_color: String,
    pub weight: f64,
    pub opacity: f64,
}

impl Default for PolyStyle {
    fn default() -> Self {
        Self {
            color: "#222".to_string(),
            fill_color: "rgba(255,201,82, 0.5)".to_string(),
            weight: 2.0,
            opacity: 0.7,
        }
    }
}

impl PolyStyle {
    pub fn highlight() -> Self {
        Self { fill_color: "#47b8e0".to_string(), opacity: 1.0, ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZOrder {
    Front,
    Back,
}

// Wrapper for RTree indexing
pub struct RegionEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct RegionIndex {
    tree: RTree<RegionEnvelope>,
}

impl RegionIndex {
    pub fn build(regions: &[Region]) -> Self {
        let items = regions
            .iter()
            .enumerate()
            .filter_map(|(i, region)| {
                let rect = region.geometry.bounding_rect()?;
                Some(RegionEnvelope {
                    index: i,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();
        Self { tree: RTree::bulk_load(items) }
    }

    /// First region (in file order) whose polygon contains the point.
    pub fn region_at<'a>(&self, regions: &'a [Region], point: Point<f64>) -> Option<&'a Region> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|c| c.index)
            .collect();
        hits.sort_unstable();
        hits.into_iter()
            .filter_map(|i| regions.get(i))
            .find(|region| region.geometry.contains(&point))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    pub(crate) fn feature(name: &str, weight: f64, x0: f64, y0: f64, with_days: bool) -> serde_json::Value {
        let mut props = json!({
            "name": name,
            "weight": weight,
            "category_distrib": [0.1, 0.2, 0.05, 0.05, 0.1, 0.2, 0.1, 0.1, 0.1],
            "category_more": [1.0, 2.0, 0.5, 0.5, 1.0, 2.5, 1.0, 0.8, 1.2],
            "time_distrib": [0.1, 0.2, 0.3, 0.2, 0.1, 0.1],
            "time_more": [0.9, 1.1, 1.3, 1.0, 0.7, 0.4],
        });
        if with_days {
            props["days_distrib"] = json!([0.1, 0.1, 0.1, 0.1, 0.2, 0.2, 0.2]);
            props["days_more"] = json!([0.8, 0.9, 1.0, 1.0, 1.2, 1.3, 1.1]);
        }
        json!({
            "type": "Feature",
            "properties": props,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x0, y0], [x0 + 1.0, y0], [x0 + 1.0, y0 + 1.0], [x0, y0 + 1.0], [x0, y0]]]
            }
        })
    }

    pub(crate) fn collection(n: usize) -> String {
        let features: Vec<_> = (0..n)
            .map(|i| feature(&format!("Region {:02}", i + 1), 0.05, i as f64 * 2.0, 0.0, true))
            .collect();
        json!({ "type": "FeatureCollection", "features": features }).to_string()
    }

    #[test]
    fn stops_after_max_region_plus_one() {
        let text = collection(30);
        for max_region in [0, 5, 18, 28] {
            let regions = parse_regions(&text, max_region).unwrap();
            assert_eq!(regions.len(), max_region + 1);
        }
        assert_eq!(parse_regions(&text, 100).unwrap().len(), 30);
    }

    #[test]
    fn unbounded_max_region_loads_everything() {
        assert_eq!(parse_regions(&collection(3), usize::MAX).unwrap().len(), 3);
    }

    #[test]
    fn indices_follow_file_order() {
        let regions = parse_regions(&collection(4), 18).unwrap();
        let names: Vec<_> = regions.iter().map(|r| (r.index, r.name.as_str())).collect();
        assert_eq!(names, vec![(0, "Region 01"), (1, "Region 02"), (2, "Region 03"), (3, "Region 04")]);
    }

    #[test]
    fn days_are_optional_but_paired() {
        let text = json!({ "type": "FeatureCollection", "features": [feature("A", 0.5, 0.0, 0.0, false)] }).to_string();
        let regions = parse_regions(&text, 18).unwrap();
        assert!(regions[0].days.is_none());

        let mut half = feature("B", 0.5, 0.0, 0.0, false);
        half["properties"]["days_distrib"] = json!([0.1, 0.1, 0.1, 0.1, 0.2, 0.2, 0.2]);
        let text = json!({ "type": "FeatureCollection", "features": [half] }).to_string();
        let err = parse_regions(&text, 18).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::MissingProperty { property, .. }) if property == "days_more"
        ));
    }

    #[test]
    fn wrong_distribution_length_is_an_error() {
        let mut bad = feature("A", 0.5, 0.0, 0.0, true);
        bad["properties"]["time_distrib"] = json!([0.5, 0.5]);
        let text = json!({ "type": "FeatureCollection", "features": [bad] }).to_string();
        let err = parse_regions(&text, 18).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::DistributionLength { expected: 6, found: 2, .. })
        ));
    }

    #[test]
    fn missing_name_is_an_error() {
        let mut bad = feature("A", 0.5, 0.0, 0.0, true);
        bad["properties"].as_object_mut().unwrap().remove("name");
        let text = json!({ "type": "FeatureCollection", "features": [bad] }).to_string();
        let err = parse_regions(&text, 18).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::MissingProperty { .. })));
    }

    #[test]
    fn single_feature_is_not_a_collection() {
        let text = feature("A", 0.5, 0.0, 0.0, true).to_string();
        let err = parse_regions(&text, 18).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::NotAFeatureCollection)));
    }

    #[test]
    fn bounds_fit_all_regions_and_pad() {
        let regions = parse_regions(&collection(3), 18).unwrap();
        let fit = fit_bounds(&regions).unwrap();
        assert_relative_eq!(fit.min().x, 0.0);
        assert_relative_eq!(fit.max().x, 5.0);
        assert_relative_eq!(fit.max().y, 1.0);
        let max = max_bounds(&regions, 0.3).unwrap();
        assert_relative_eq!(max.min().x, -1.5);
        assert_relative_eq!(max.max().y, 1.3);
        assert!(fit_bounds(&[]).is_none());
    }

    #[test]
    fn list_starts_with_placeholder() {
        let regions = parse_regions(&collection(2), 18).unwrap();
        let list = region_list(&regions);
        assert_eq!(list[0], ListEntry { value: -1, label: "some region".into() });
        assert_eq!(list[2], ListEntry { value: 1, label: "Region 02".into() });
    }

    #[test]
    fn weight_is_a_percentage() {
        let mut regions = parse_regions(&collection(1), 18).unwrap();
        regions[0].weight = 0.1234;
        assert_eq!(weight_sentence(&regions[0]), ", which accounts for 12.34% of the city mass.");
    }

    #[test]
    fn highlight_only_changes_fill_and_opacity() {
        let base = PolyStyle::default();
        let hl = PolyStyle::highlight();
        assert_eq!(hl.color, base.color);
        assert_eq!(hl.weight, base.weight);
        assert_ne!(hl.fill_color, base.fill_color);
        assert_eq!(hl.opacity, 1.0);
    }

    #[test]
    fn region_at_finds_containing_polygon() {
        let regions = parse_regions(&collection(3), 18).unwrap();
        let index = RegionIndex::build(&regions);
        let hit = index.region_at(&regions, Point::new(2.5, 0.5)).unwrap();
        assert_eq!(hit.name, "Region 02");
        assert!(index.region_at(&regions, Point::new(1.5, 0.5)).is_none());
    }
}
