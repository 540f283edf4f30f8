//! Neighborhood explorer for city maps: region distributions, venue dots,
//! heatmap overlays and the state of the page that shows them.

pub mod types;
pub mod error;
pub mod config;
pub mod bounds;
pub mod regions;
pub mod venues;
pub mod charts;
pub mod overlay;
pub mod state;
pub mod render;
pub mod export;
pub mod server;
