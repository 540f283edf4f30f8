use crate::bounds::{pad, to_lat_lng, CityEntry, CityTable, LatLngBounds};
use crate::charts::{ChartLayout, GroupView, RegionCharts};
use crate::config::AppConfig;
use crate::overlay::{overlay_urls, parse_legend, FeatureSelector, LegendEntry};
use crate::regions::{self, ListEntry, PolyStyle, RegionIndex};
use crate::types::{Dimension, Region, VenuePoint};
use crate::venues::{self, Dot, LogScale};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use geo::Point;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

pub struct ServerState {
    pub cities: CityTable,
    pub config: AppConfig,
}

type ApiError = (StatusCode, String);

fn internal(err: anyhow::Error) -> ApiError {
    warn!("{:#}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
}

impl ServerState {
    fn city(&self, id: &str) -> Result<&crate::bounds::City, ApiError> {
        self.cities.get(id).map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))
    }

    async fn regions(&self, city: &str, max_region: Option<usize>) -> Result<Vec<Region>, ApiError> {
        self.city(city)?;
        let path = regions::region_file(&self.config.regions_dir(), city);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to open region file: {:?}", path))
            .map_err(internal)?;
        let max_region = max_region.unwrap_or(self.config.display.max_region);
        regions::parse_regions(&content, max_region).map_err(internal)
    }

    async fn venues(&self, city: &str) -> Result<Vec<VenuePoint>, ApiError> {
        self.city(city)?;
        let path = venues::venue_file(&self.config.regions_dir(), city);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to open venue file: {:?}", path))
            .map_err(internal)?;
        venues::parse_venues(&content, self.config.venues.min_visits).map_err(internal)
    }
}

pub async fn start_server(config: AppConfig, cities: CityTable) -> Result<()> {
    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let app = router(Arc::new(ServerState { cities, config }));

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<ServerState>) -> Router {
    let regions_service = ServeDir::new(state.config.regions_dir());
    let overlays_service = ServeDir::new(state.config.overlays_dir());
    let web_root = ServeDir::new(&state.config.server.web_root);

    Router::new()
        .route("/api/cities", get(cities_handler))
        .route("/api/cities/:city/regions", get(regions_handler))
        .route("/api/cities/:city/regions/:index/charts", get(charts_handler))
        .route("/api/cities/:city/regions/at", get(region_at_handler))
        .route("/api/cities/:city/venues", get(venues_handler))
        .route("/api/cities/:city/overlay", get(overlay_handler))
        .nest_service("/regions", regions_service)
        .nest_service("/overlays", overlays_service)
        .fallback_service(web_root)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
pub struct CitiesResponse {
    cities: Vec<CityEntry>,
    overview: Option<LatLngBounds>,
}

async fn cities_handler(State(state): State<Arc<ServerState>>) -> Json<CitiesResponse> {
    Json(CitiesResponse {
        cities: state.cities.entries(&state.config.data.meaningful),
        overview: state
            .cities
            .overview_bounds(state.config.display.overview_margin)
            .map(|r| to_lat_lng(&r)),
    })
}

#[derive(Deserialize)]
pub struct RegionsQuery {
    max_region: Option<usize>,
}

#[derive(Serialize)]
pub struct RegionSummary {
    index: usize,
    name: String,
    weight: f64,
    weight_sentence: String,
}

impl From<&Region> for RegionSummary {
    fn from(region: &Region) -> Self {
        Self {
            index: region.index,
            name: region.name.clone(),
            weight: region.weight,
            weight_sentence: regions::weight_sentence(region),
        }
    }
}

#[derive(Serialize)]
pub struct RegionsResponse {
    city: String,
    regions: Vec<RegionSummary>,
    list: Vec<ListEntry>,
    polygons: FeatureCollection,
    style: PolyStyle,
    highlight: PolyStyle,
    fit_bounds: Option<LatLngBounds>,
    max_bounds: Option<LatLngBounds>,
}

fn polygon_feature(region: &Region) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("index".to_string(), region.index.into());
    properties.insert("name".to_string(), region.name.clone().into());
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&region.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

async fn regions_handler(
    State(state): State<Arc<ServerState>>,
    Path(city): Path<String>,
    Query(params): Query<RegionsQuery>,
) -> Result<Json<RegionsResponse>, ApiError> {
    let regions = state.regions(&city, params.max_region).await?;
    let fit = regions::fit_bounds(&regions);
    Ok(Json(RegionsResponse {
        regions: regions.iter().map(RegionSummary::from).collect(),
        list: regions::region_list(&regions),
        polygons: FeatureCollection {
            bbox: None,
            features: regions.iter().map(polygon_feature).collect(),
            foreign_members: None,
        },
        style: PolyStyle::default(),
        highlight: PolyStyle::highlight(),
        fit_bounds: fit.map(|r| to_lat_lng(&r)),
        max_bounds: fit.map(|r| to_lat_lng(&pad(&r, state.config.display.bounds_padding))),
        city,
    }))
}

#[derive(Deserialize)]
pub struct ChartsQuery {
    width: Option<f64>,
    height: Option<f64>,
    small: Option<bool>,
    /// Comma separated dimensions shown in relative mode, e.g. `cat,time`
    relative: Option<String>,
    max_region: Option<usize>,
}

async fn charts_handler(
    State(state): State<Arc<ServerState>>,
    Path((city, index)): Path<(String, usize)>,
    Query(params): Query<ChartsQuery>,
) -> Result<Json<Vec<GroupView>>, ApiError> {
    let regions = state.regions(&city, params.max_region).await?;
    let region = regions
        .get(index)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No region {} in {}", index, city)))?;
    let layout = ChartLayout::new(
        params.width.unwrap_or(800.0),
        params.height.unwrap_or(500.0),
        params.small.unwrap_or(false),
    );
    let mut charts = RegionCharts::for_region(region, layout);
    for key in params.relative.as_deref().unwrap_or("").split(',').filter(|k| !k.is_empty()) {
        let dimension = Dimension::from_key(key)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Unknown chart {:?}", key)))?;
        charts.toggle(dimension);
    }
    Ok(Json(charts.views()))
}

#[derive(Deserialize)]
pub struct PointQuery {
    lat: f64,
    lon: f64,
    max_region: Option<usize>,
}

async fn region_at_handler(
    State(state): State<Arc<ServerState>>,
    Path(city): Path<String>,
    Query(params): Query<PointQuery>,
) -> Result<Json<Option<RegionSummary>>, ApiError> {
    let regions = state.regions(&city, params.max_region).await?;
    let index = RegionIndex::build(&regions);
    let hit = index.region_at(&regions, Point::new(params.lon, params.lat));
    Ok(Json(hit.map(RegionSummary::from)))
}

#[derive(Deserialize)]
pub struct VenuesQuery {
    zoom: Option<f64>,
}

#[derive(Serialize)]
pub struct VenuesResponse {
    count: usize,
    /// Visit counts spanned by the radius scale
    domain: Option<[f64; 2]>,
    dots: Vec<Dot>,
}

async fn venues_handler(
    State(state): State<Arc<ServerState>>,
    Path(city): Path<String>,
    Query(params): Query<VenuesQuery>,
) -> Result<Json<VenuesResponse>, ApiError> {
    let venues = state.venues(&city).await?;
    let zoom = params.zoom.unwrap_or(13.0);
    let dots = venues::dots(&venues, &state.config.venues, zoom);
    Ok(Json(VenuesResponse {
        count: dots.len(),
        domain: LogScale::for_venues(&venues, &state.config.venues).map(|s| s.domain()),
        dots,
    }))
}

#[derive(Deserialize)]
pub struct OverlayQuery {
    feature: Option<String>,
    value: Option<String>,
    small: Option<bool>,
}

#[derive(Serialize)]
pub struct OverlayResponse {
    image_url: String,
    legend_url: String,
    bounds: LatLngBounds,
    legend: Vec<LegendEntry>,
}

async fn overlay_handler(
    State(state): State<Arc<ServerState>>,
    Path(city): Path<String>,
    Query(params): Query<OverlayQuery>,
) -> Result<Json<OverlayResponse>, ApiError> {
    let bounds = state.city(&city)?.bounds;
    let selector: FeatureSelector = match params.feature.as_deref() {
        Some(s) => s.parse().map_err(|e: crate::error::DataError| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => FeatureSelector::default(),
    };
    let urls = overlay_urls(&city, &selector, params.value.as_deref());

    let legend_path = state.config.data.root.join(&urls.legend);
    let label_len = state.config.label_len(params.small.unwrap_or(false));
    let legend = match tokio::fs::read_to_string(&legend_path).await {
        Ok(content) => parse_legend(&content, label_len).map_err(internal)?,
        Err(e) => {
            warn!("No legend at {:?}: {}", legend_path, e);
            Vec::new()
        }
    };

    Ok(Json(OverlayResponse {
        image_url: urls.image,
        legend_url: urls.legend,
        bounds: to_lat_lng(&bounds),
        legend,
    }))
}
