//! Front-end state of the map page.
//!
//! Every user action or finished load is an [`Event`]. [`AppState::handle`]
//! applies it and returns the [`Effect`]s the page must carry out (requests
//! to send, layers to add or remove, styles to set). Nothing here touches a
//! map or chart library, so selection, highlight and toggle logic can be
//! checked directly.

use crate::bounds::CityTable;
use crate::charts::{next_panel, ChartLayout, RegionCharts};
use crate::overlay::{overlay_urls, FeatureSelector, LegendEntry, OverlayChange, OverlayState};
use crate::regions::{self, ListEntry, PolyStyle, ZOrder};
use crate::types::{Dimension, Region, VenuePoint};
use geo::Rect;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Regions,
    Venues,
    Heatmap,
}

impl LayerKind {
    /// Panel shown alongside the layer, hidden when the layer is switched off.
    pub fn panel(self) -> Option<&'static str> {
        match self {
            LayerKind::Regions => Some("bars"),
            LayerKind::Heatmap => Some("legend"),
            LayerKind::Venues => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Regions { city: String },
    Venues { city: String },
    Legend { city: String, selector: FeatureSelector, url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch(Request),
    AddLayer(LayerKind),
    RemoveLayer(LayerKind),
    AddOverlay { url: String, bounds: Rect<f64> },
    SetOverlayUrl(String),
    FitBounds(Rect<f64>),
    SetMaxBounds(Rect<f64>),
    ShowRegionList(Vec<ListEntry>),
    StyleRegion { index: usize, style: PolyStyle, z: ZOrder },
    DrawCharts { region: usize },
    RedrawChart(Dimension),
    ClearCharts,
    ShowWeight(String),
    ShowLegend(Vec<LegendEntry>),
    ClearLegend,
    ShowPanel(&'static str),
    HidePanel(&'static str),
}

#[derive(Debug, Clone)]
pub enum Event {
    SelectCity(String),
    RegionsLoaded { city: String, regions: Vec<Region> },
    VenuesLoaded { city: String, venues: Vec<VenuePoint> },
    LegendLoaded { city: String, selector: FeatureSelector, legend: Vec<LegendEntry> },
    HoverRegion(usize),
    UnhoverRegion(usize),
    /// `None` is the "some region" entry
    SelectRegion(Option<usize>),
    ToggleChart(Dimension),
    CycleChartPanel,
    SelectFeature(FeatureSelector),
    SelectFeatureValue(Option<String>),
    LayerToggled { layer: LayerKind, on: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub max_region: usize,
    pub bounds_padding: f64,
    pub chart_layout: ChartLayout,
}

/// Layers currently attached to the map; each kind at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapLayers {
    attached: Vec<LayerKind>,
}

impl MapLayers {
    pub fn is_attached(&self, kind: LayerKind) -> bool {
        self.attached.contains(&kind)
    }

    pub fn count(&self, kind: LayerKind) -> usize {
        self.attached.iter().filter(|k| **k == kind).count()
    }

    fn attach(&mut self, kind: LayerKind, effects: &mut Vec<Effect>) {
        self.attach_with(kind, Effect::AddLayer(kind), effects);
    }

    /// Attaches `kind` through `add`, unless it is already on the map.
    fn attach_with(&mut self, kind: LayerKind, add: Effect, effects: &mut Vec<Effect>) {
        if !self.is_attached(kind) {
            self.attached.push(kind);
            effects.push(add);
        }
    }

    fn detach_all(&mut self, effects: &mut Vec<Effect>) {
        effects.extend(self.attached.drain(..).map(Effect::RemoveLayer));
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
    pub city: Option<String>,
    pub regions: Vec<Region>,
    pub venues: Vec<VenuePoint>,
    /// Current style and z-order of each region polygon
    pub styles: Vec<(PolyStyle, ZOrder)>,
    pub selected_region: Option<usize>,
    pub charts: Option<RegionCharts>,
    pub visible_panel: &'static str,
    pub feature: FeatureSelector,
    pub feature_value: Option<String>,
    pub overlay: OverlayState,
    pub legend: Vec<LegendEntry>,
    pub layers: MapLayers,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            city: None,
            regions: Vec::new(),
            venues: Vec::new(),
            styles: Vec::new(),
            selected_region: None,
            charts: None,
            visible_panel: "bars",
            feature: FeatureSelector::default(),
            feature_value: None,
            overlay: OverlayState::default(),
            legend: Vec::new(),
            layers: MapLayers::default(),
        }
    }

    pub fn handle(&mut self, event: Event, cities: &CityTable) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            Event::SelectCity(city) => self.select_city(city, cities, &mut effects),
            Event::RegionsLoaded { city, mut regions } => {
                if !self.is_current(&city) {
                    debug!("Ignoring regions of {} (current city is {:?})", city, self.city);
                    return effects;
                }
                regions.truncate(self.settings.max_region.saturating_add(1));
                self.styles = vec![(PolyStyle::default(), ZOrder::Back); regions.len()];
                effects.push(Effect::ShowRegionList(regions::region_list(&regions)));
                self.layers.attach(LayerKind::Regions, &mut effects);
                if let Some(fit) = regions::fit_bounds(&regions) {
                    effects.push(Effect::FitBounds(fit));
                    effects.push(Effect::SetMaxBounds(crate::bounds::pad(&fit, self.settings.bounds_padding)));
                }
                self.regions = regions;
            }
            Event::VenuesLoaded { city, venues } => {
                if !self.is_current(&city) {
                    debug!("Ignoring venues of {}", city);
                    return effects;
                }
                self.venues = venues;
                self.layers.attach(LayerKind::Venues, &mut effects);
            }
            Event::LegendLoaded { city, selector, legend } => {
                if !self.is_current(&city) || selector != self.feature {
                    debug!("Ignoring legend {} of {}", selector, city);
                    return effects;
                }
                self.legend = legend;
                effects.push(Effect::ShowLegend(self.legend.clone()));
            }
            Event::HoverRegion(index) => self.restyle(index, PolyStyle::highlight(), ZOrder::Front, &mut effects),
            Event::UnhoverRegion(index) => self.restyle(index, PolyStyle::default(), ZOrder::Back, &mut effects),
            Event::SelectRegion(None) => self.clear_region(&mut effects),
            Event::SelectRegion(Some(index)) => match self.regions.get(index) {
                Some(region) => {
                    self.selected_region = Some(index);
                    self.charts = Some(RegionCharts::for_region(region, self.settings.chart_layout));
                    effects.push(Effect::ShowWeight(regions::weight_sentence(region)));
                    effects.push(Effect::DrawCharts { region: index });
                }
                None => warn!("No region {} in {:?}", index, self.city),
            },
            Event::ToggleChart(dimension) => {
                if let Some(charts) = self.charts.as_mut() {
                    if charts.toggle(dimension) {
                        effects.push(Effect::RedrawChart(dimension));
                    }
                }
            }
            Event::CycleChartPanel => {
                if self.settings.chart_layout.small_screen {
                    let next = next_panel(self.visible_panel);
                    effects.push(Effect::HidePanel(self.visible_panel));
                    effects.push(Effect::ShowPanel(next));
                    self.visible_panel = next;
                }
            }
            Event::SelectFeature(selector) => {
                self.feature = selector;
                self.feature_value = None;
                self.update_overlay(cities, true, &mut effects);
            }
            Event::SelectFeatureValue(value) => {
                self.feature_value = value;
                self.update_overlay(cities, false, &mut effects);
            }
            Event::LayerToggled { layer, on } => {
                if let Some(panel) = layer.panel() {
                    effects.push(if on { Effect::ShowPanel(panel) } else { Effect::HidePanel(panel) });
                }
            }
        }
        effects
    }

    fn is_current(&self, city: &str) -> bool {
        self.city.as_deref() == Some(city)
    }

    fn select_city(&mut self, city: String, cities: &CityTable, effects: &mut Vec<Effect>) {
        let bounds = match cities.get(&city) {
            Ok(c) => c.bounds,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        self.clear_region(effects);
        self.layers.detach_all(effects);
        self.regions.clear();
        self.venues.clear();
        self.styles.clear();
        self.overlay.clear();
        self.legend.clear();
        self.feature = FeatureSelector::default();
        self.feature_value = None;

        for panel in ["bars2", "bars3"] {
            effects.push(Effect::HidePanel(panel));
        }
        effects.push(Effect::ShowPanel("bars"));
        self.visible_panel = "bars";
        effects.push(Effect::ShowPanel("legend"));
        effects.push(Effect::ClearLegend);
        effects.push(Effect::FitBounds(bounds));

        self.city = Some(city.clone());
        effects.push(Effect::Fetch(Request::Regions { city: city.clone() }));
        effects.push(Effect::Fetch(Request::Venues { city }));
        self.update_overlay(cities, true, effects);
    }

    fn clear_region(&mut self, effects: &mut Vec<Effect>) {
        self.selected_region = None;
        self.charts = None;
        effects.push(Effect::ClearCharts);
        effects.push(Effect::ShowWeight(String::new()));
    }

    fn restyle(&mut self, index: usize, style: PolyStyle, z: ZOrder, effects: &mut Vec<Effect>) {
        if let Some(slot) = self.styles.get_mut(index) {
            *slot = (style.clone(), z);
            effects.push(Effect::StyleRegion { index, style, z });
        }
    }

    /// Points the heatmap at the current feature (and value). With `main`,
    /// the legend of the feature is requested too.
    fn update_overlay(&mut self, cities: &CityTable, main: bool, effects: &mut Vec<Effect>) {
        let Some(city) = self.city.clone() else { return };
        let Ok(bounds) = cities.get(&city).map(|c| c.bounds) else { return };
        let value = if main { None } else { self.feature_value.as_deref() };
        let urls = overlay_urls(&city, &self.feature, value);

        if main {
            effects.push(Effect::Fetch(Request::Legend {
                city: city.clone(),
                selector: self.feature,
                url: urls.legend.clone(),
            }));
        }
        match self.overlay.apply(&city, &urls.image) {
            OverlayChange::Add { url } => {
                self.layers.attach_with(LayerKind::Heatmap, Effect::AddOverlay { url, bounds }, effects);
            }
            OverlayChange::SetUrl { url } => effects.push(Effect::SetOverlayUrl(url)),
            OverlayChange::Unchanged => {}
        }
    }
}
