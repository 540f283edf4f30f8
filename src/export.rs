use crate::types::{Dimension, Region};
use anyhow::{Context, Result};
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize, PartialEq)]
struct StatRow<'a> {
    city: &'a str,
    region_index: usize,
    region: &'a str,
    weight: f64,
    dimension: &'static str,
    label: &'static str,
    absolute: f64,
    relative: f64,
}

/// Writes one row per region, dimension and label.
pub fn write_region_stats<W: Write>(writer: W, city: &str, regions: &[Region]) -> Result<usize> {
    let mut wtr = Writer::from_writer(writer);
    let mut rows = 0;
    for region in regions {
        for dimension in Dimension::ALL {
            let Some(distribution) = region.distribution(dimension) else { continue };
            for (i, &label) in dimension.labels().iter().enumerate() {
                wtr.serialize(StatRow {
                    city,
                    region_index: region.index,
                    region: &region.name,
                    weight: region.weight,
                    dimension: dimension.property_prefix(),
                    label,
                    absolute: distribution.absolute[i],
                    relative: distribution.relative[i],
                })?;
                rows += 1;
            }
        }
    }
    wtr.flush()?;
    Ok(rows)
}

pub fn export_region_stats(path: &Path, city: &str, regions: &[Region]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    let rows = write_region_stats(file, city, regions)?;
    info!("Wrote {} rows for {} regions to {:?}", rows, regions.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::parse_regions;
    use crate::regions::tests::collection;

    #[test]
    fn one_row_per_label() {
        let mut regions = parse_regions(&collection(2), 18).unwrap();
        regions[1].days = None;
        let mut out = Vec::new();
        let rows = write_region_stats(&mut out, "paris", &regions).unwrap();
        assert_eq!(rows, (9 + 6 + 7) + (9 + 6));

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "city,region_index,region,weight,dimension,label,absolute,relative"
        );
        assert_eq!(lines.next().unwrap(), "paris,0,Region 01,0.05,category,Entertainment,0.1,1.0");
        assert!(text.contains("paris,1,Region 02,0.05,time,late night,0.1,0.4"));
        assert!(!text.contains("paris,1,Region 02,0.05,days"));
    }
}
