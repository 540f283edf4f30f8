use crate::bounds::City;
use crate::config::AppConfig;
use crate::types::VenuePoint;
use crate::venues::{DotStyler, LogScale};
use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, Pixel, Rgba, RgbaImage};
use rayon::prelude::*;
use std::f64::consts::PI;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

// Constants for Web Mercator
const TILE_SIZE: f64 = 256.0;

/// Rasterizes a city's venue dots, one PNG per zoom level, into
/// `<output_dir>/<city>/venues_z<zoom>.png`. Each image spans the city
/// bounds exactly.
pub fn render_venue_layers(config: &AppConfig, city: &City, venues: &[VenuePoint]) -> Result<Vec<PathBuf>> {
    info!(
        "Rendering {} venues of {} from zoom {} to {}",
        venues.len(), city.id, config.render.min_zoom, config.render.max_zoom
    );
    let scale = LogScale::for_venues(venues, &config.venues)
        .ok_or_else(|| anyhow!("No venue of {} has at least {} visits", city.id, config.venues.min_visits))?;
    let styler = DotStyler::new(scale, &config.venues);

    let city_dir = config.render.output_dir.join(&city.id);
    fs::create_dir_all(&city_dir).context("Failed to create output directory")?;

    let rendered: Vec<Option<PathBuf>> = (config.render.min_zoom..=config.render.max_zoom)
        .into_par_iter()
        .map(|zoom| -> Result<Option<PathBuf>> {
            let Some(img) = rasterize(city, venues, &styler, zoom, config.render.max_pixels) else {
                warn!("Skipping zoom {} for {}: image larger than {} pixels", zoom, city.id, config.render.max_pixels);
                return Ok(None);
            };
            let path = city_dir.join(format!("venues_z{}.png", zoom));
            img.save(&path).with_context(|| format!("Failed to save {:?}", path))?;
            Ok(Some(path))
        })
        .collect::<Result<_>>()?;

    Ok(rendered.into_iter().flatten().collect())
}

/// Draws the dots for one zoom level, `None` when the image would exceed
/// `max_pixels` on a side.
pub fn rasterize(
    city: &City,
    venues: &[VenuePoint],
    styler: &DotStyler,
    zoom: u8,
    max_pixels: u32,
) -> Option<RgbaImage> {
    let (x0, y0) = lat_lon_to_world_pixel(city.bounds.max().y, city.bounds.min().x, zoom);
    let (x1, y1) = lat_lon_to_world_pixel(city.bounds.min().y, city.bounds.max().x, zoom);
    let width = (x1 - x0).ceil().max(1.0);
    let height = (y1 - y0).ceil().max(1.0);
    if width > max_pixels as f64 || height > max_pixels as f64 {
        return None;
    }

    let mut img: RgbaImage = ImageBuffer::new(width as u32, height as u32);
    for venue in venues {
        let radius = styler.screen_radius(venue, zoom as f64);
        if radius <= 0.0 {
            continue;
        }
        let (wx, wy) = lat_lon_to_world_pixel(venue.lat(), venue.lon(), zoom);
        let color = parse_css_color(styler.color(venue)).unwrap_or(Rgba([33, 33, 33, 209]));
        fill_circle(&mut img, wx - x0, wy - y0, radius, color);
    }
    Some(img)
}

fn fill_circle(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let min_x = (cx - radius).floor() as i64;
    let max_x = (cx + radius).ceil() as i64;
    let min_y = (cy - radius).floor() as i64;
    let max_y = (cy + radius).ceil() as i64;
    let r2 = radius * radius;
    let mut drawn = false;
    for py in min_y.max(0)..=max_y.min(h - 1) {
        for px in min_x.max(0)..=max_x.min(w - 1) {
            let dx = px as f64 + 0.5 - cx;
            let dy = py as f64 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                img.get_pixel_mut(px as u32, py as u32).blend(&color);
                drawn = true;
            }
        }
    }
    // dots smaller than a pixel still show up
    let (px, py) = (cx.floor() as i64, cy.floor() as i64);
    if !drawn && (0..w).contains(&px) && (0..h).contains(&py) {
        img.get_pixel_mut(px as u32, py as u32).blend(&color);
    }
}

/// `#rrggbb` or `rgba(r, g, b, a)` / `rgb(r, g, b)`.
pub fn parse_css_color(s: &str) -> Option<Rgba<u8>> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some(Rgba([r, g, b, 255]));
    }
    let inner = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<f64> = inner
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    match parts.as_slice() {
        [r, g, b] => Some(Rgba([channel(*r), channel(*g), channel(*b), 255])),
        [r, g, b, a] => Some(Rgba([channel(*r), channel(*g), channel(*b), channel(a * 255.0)])),
        _ => None,
    }
}

// Coordinate conversions
pub fn lat_lon_to_world_pixel(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32) * TILE_SIZE;
    let x = (lon + 180.0) / 360.0 * n;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0 * n;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::CityTable;
    use crate::config::VenueConfig;
    use approx::assert_relative_eq;
    use geo::Point;

    #[test]
    fn world_pixel_of_null_island() {
        let (x, y) = lat_lon_to_world_pixel(0.0, 0.0, 0);
        assert_relative_eq!(x, 128.0, epsilon = 1e-9);
        assert_relative_eq!(y, 128.0, epsilon = 1e-9);
        let (x, _) = lat_lon_to_world_pixel(0.0, 180.0, 1);
        assert_relative_eq!(x, 512.0, epsilon = 1e-9);
    }

    #[test]
    fn css_colors() {
        assert_eq!(parse_css_color("rgba(229, 57, 53, 0.82)"), Some(Rgba([229, 57, 53, 209])));
        assert_eq!(parse_css_color("#47b8e0"), Some(Rgba([0x47, 0xb8, 0xe0, 255])));
        assert_eq!(parse_css_color("rgb(1,2,3)"), Some(Rgba([1, 2, 3, 255])));
        assert_eq!(parse_css_color("hsl(0, 0%, 0%)"), None);
    }

    #[test]
    fn dots_land_inside_the_city_image() {
        let table = CityTable::from_json_str(r#"{"paris": [[2.25, 48.81], [2.42, 48.90], "Paris"]}"#).unwrap();
        let city = table.get("paris").unwrap();
        let config = VenueConfig::default();
        let venues = vec![
            VenuePoint { point: Point::new(2.335, 48.855), count: 500.0 },
            VenuePoint { point: Point::new(2.26, 48.82), count: 5.0 },
        ];
        let scale = LogScale::for_venues(&venues, &config).unwrap();
        let styler = DotStyler::new(scale, &config);

        let img = rasterize(city, &venues, &styler, 14, 8192).unwrap();
        let (x0, y0) = lat_lon_to_world_pixel(48.90, 2.25, 14);
        let (cx, cy) = lat_lon_to_world_pixel(48.855, 2.335, 14);
        let center = img.get_pixel((cx - x0) as u32, (cy - y0) as u32);
        assert!(center[3] > 0);
        assert_eq!(img.get_pixel(img.width() - 1, 0)[3], 0);

        assert!(rasterize(city, &venues, &styler, 19, 1024).is_none());
    }
}
