//! Bar chart geometry for one region's distributions.
//!
//! The scales reproduce what the map page's charting code does (ordinal
//! bands with rounding, linear y scale with "nice" bounds), so the numbers
//! here are the pixel positions the page draws.

use crate::types::{Dimension, Distribution, Region};
use serde::Serialize;

pub const CATEGORY_COLORS: [&str; 9] = [
    "#f44336", "#2196f3", "#8bc34a", "#9c27b0", "#ff9800", "#795548", "#ffeb3b", "#ff4081", "#1de9b6",
];
pub const TIME_COLORS: [&str; 7] = ["#fee391", "#fec44f", "#fe9929", "#ec7014", "#cc4c02", "#993404", "#662506"];
pub const DAY_COLORS: [&str; 7] = ["#ccece6", "#99d8c9", "#66c2a4", "#41ae76", "#238b45", "#006d2c", "#00441b"];

pub fn palette(dimension: Dimension) -> &'static [&'static str] {
    match dimension {
        Dimension::Category => &CATEGORY_COLORS,
        Dimension::Time => &TIME_COLORS,
        Dimension::Day => &DAY_COLORS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub t: f64,
    pub r: f64,
    pub b: f64,
    pub l: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    pub width: f64,
    pub height: f64,
    pub small_screen: bool,
    pub margin: Margin,
}

impl ChartLayout {
    pub fn new(width: f64, height: f64, small_screen: bool) -> Self {
        let margin = if small_screen {
            Margin { t: 20.0, r: 5.0, b: 60.0, l: 30.0 }
        } else {
            Margin { t: 25.0, r: 10.0, b: 75.0, l: 60.0 }
        };
        Self { width, height, small_screen, margin }
    }

    /// Horizontal extent of a dimension's bands and its (padding, outer padding).
    fn x_extent(&self, dimension: Dimension) -> ([f64; 2], f64, f64) {
        let (w, m) = (self.width, self.margin);
        match dimension {
            Dimension::Category => ([m.l, w - m.r], 0.15, 0.2),
            Dimension::Time => {
                let end = if self.small_screen { w - m.r } else { w / 2.0 };
                ([m.l, end], 0.1, 0.15)
            }
            Dimension::Day => {
                let begin = if self.small_screen { m.l } else { w / 2.0 + m.l };
                ([begin, w - m.r], 0.1, 0.15)
            }
        }
    }

    /// Pixel range of the y axis, bottom first.
    fn y_range(&self, dimension: Dimension) -> [f64; 2] {
        let (h, m) = (self.height, self.margin);
        if self.small_screen {
            [h - m.b, m.t]
        } else if dimension == Dimension::Category {
            [h / 2.0 - m.b, m.t]
        } else {
            [h - m.b, h / 2.0 + m.t]
        }
    }

    fn x_axis_y(&self, dimension: Dimension) -> f64 {
        if !self.small_screen && dimension == Dimension::Category {
            self.height / 2.0 - self.margin.b + 5.0
        } else {
            self.height - self.margin.b + 5.0
        }
    }

    fn y_axis_anchor(&self, dimension: Dimension) -> f64 {
        if !self.small_screen && dimension == Dimension::Day {
            20.0 + self.width / 2.0
        } else {
            20.0
        }
    }

    pub fn panel(&self, dimension: Dimension) -> &'static str {
        if !self.small_screen {
            return "bars";
        }
        match dimension {
            Dimension::Category => "bars",
            Dimension::Time => "bars2",
            Dimension::Day => "bars3",
        }
    }
}

/// Ordinal bands over `n` labels with rounded positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandScale {
    start: f64,
    step: f64,
    band: f64,
    extent: [f64; 2],
}

impl BandScale {
    pub fn round_bands(n: usize, extent: [f64; 2], padding: f64, outer_padding: f64) -> Self {
        let [start, stop] = extent;
        let n = n as f64;
        let step = ((stop - start) / (n - padding + 2.0 * outer_padding)).floor();
        let error = stop - start - (n - padding) * step;
        Self {
            start: start + (error / 2.0).round(),
            step,
            band: (step * (1.0 - padding)).round(),
            extent,
        }
    }

    pub fn position(&self, i: usize) -> f64 {
        self.start + self.step * i as f64
    }

    pub fn band(&self) -> f64 {
        self.band
    }

    pub fn extent(&self) -> [f64; 2] {
        self.extent
    }
}

/// Linear scale with a "nice" domain and rounded output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: [f64; 2],
    range: [f64; 2],
}

fn tick_step(domain: [f64; 2], count: f64) -> f64 {
    let span = domain[1] - domain[0];
    let mut step = 10f64.powf(((span / count).ln() / std::f64::consts::LN_10).floor());
    let err = count / span * step;
    if err <= 0.15 {
        step *= 10.0;
    } else if err <= 0.35 {
        step *= 5.0;
    } else if err <= 0.75 {
        step *= 2.0;
    }
    step
}

impl LinearScale {
    /// `[0, max]` mapped onto `range`, niced twice with the float rounding the
    /// page gets (0.3 nices to 0.35). An all-zero dataset gets `[0, 1]`.
    pub fn nice_zero_based(max: f64, range: [f64; 2]) -> Self {
        let mut domain = if max > 0.0 && max.is_finite() { [0.0, max] } else { [0.0, 1.0] };
        for _ in 0..2 {
            let step = tick_step(domain, 10.0);
            domain = [(domain[0] / step).floor() * step, (domain[1] / step).ceil() * step];
        }
        Self { domain, range }
    }

    pub fn domain(&self) -> [f64; 2] {
        self.domain
    }

    pub fn scale(&self, x: f64) -> f64 {
        let t = (x - self.domain[0]) / (self.domain[1] - self.domain[0]);
        (self.range[0] + t * (self.range[1] - self.range[0])).round()
    }

    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let step = tick_step(self.domain, count as f64);
        let first = (self.domain[0] / step).ceil() as i64;
        let last = (self.domain[1] / step).floor() as i64;
        (first..=last).map(|i| i as f64 * step).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartMode {
    Absolute,
    Relative,
}

impl ChartMode {
    pub fn flipped(self) -> Self {
        match self {
            ChartMode::Absolute => ChartMode::Relative,
            ChartMode::Relative => ChartMode::Absolute,
        }
    }

    /// Text of the toggle, naming the mode a click switches to.
    pub fn prompt(self) -> &'static str {
        match self {
            ChartMode::Absolute => "Relative",
            ChartMode::Relative => "Absolute",
        }
    }

    pub fn format(self, value: f64) -> String {
        match self {
            ChartMode::Absolute => format!("{:.1}%", value * 100.0),
            ChartMode::Relative => format!("{:.2}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarView {
    pub label: &'static str,
    pub value: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: &'static str,
    pub text: String,
    pub text_x: f64,
    pub text_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub value: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub dimension: Dimension,
    pub panel: &'static str,
    pub mode: ChartMode,
    pub prompt: &'static str,
    /// `[x, y]` of the toggle text
    pub prompt_at: [f64; 2],
    pub x_axis_y: f64,
    pub y_axis_x: f64,
    pub y_ticks: Vec<Tick>,
    pub bars: Vec<BarView>,
    /// Panel switch arrow on small screens, as polygon points
    pub arrow: Option<[f64; 6]>,
}

/// One bar chart with its absolute/relative toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    dimension: Dimension,
    distribution: Distribution,
    mode: ChartMode,
    x: BandScale,
    layout: ChartLayout,
}

impl BarGroup {
    pub fn new(dimension: Dimension, distribution: Distribution, layout: ChartLayout) -> Self {
        let (extent, padding, outer) = layout.x_extent(dimension);
        let x = BandScale::round_bands(dimension.labels().len(), extent, padding, outer);
        Self { dimension, distribution, mode: ChartMode::Absolute, x, layout }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn mode(&self) -> ChartMode {
        self.mode
    }

    pub fn data(&self) -> &[f64] {
        match self.mode {
            ChartMode::Absolute => &self.distribution.absolute,
            ChartMode::Relative => &self.distribution.relative,
        }
    }

    pub fn toggle(&mut self) {
        self.mode = self.mode.flipped();
    }

    pub fn y_scale(&self) -> LinearScale {
        let max = self.data().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        LinearScale::nice_zero_based(max, self.layout.y_range(self.dimension))
    }

    pub fn view(&self) -> GroupView {
        let y = self.y_scale();
        let labels = self.dimension.labels();
        let colors = palette(self.dimension);
        let band = self.x.band();
        let bars = self
            .data()
            .iter()
            .zip(labels.iter())
            .enumerate()
            .map(|(i, (&value, &label))| {
                let x = self.x.position(i);
                BarView {
                    label,
                    value,
                    x,
                    y: y.scale(value),
                    width: band,
                    height: y.scale(0.0) - y.scale(value),
                    fill: colors[i % colors.len()],
                    text: self.mode.format(value),
                    text_x: x + band / 2.0,
                    text_y: y.scale(value) - 5.0,
                }
            })
            .collect();
        let y_range = self.layout.y_range(self.dimension);
        let anchor = self.layout.y_axis_anchor(self.dimension);
        let m = self.layout.margin;
        let arrow = self.layout.small_screen.then(|| {
            let tip = self.x.extent()[1].floor();
            [tip - 60.0, m.t, tip, m.t + 25.0, tip - 60.0, m.t + 50.0]
        });
        GroupView {
            dimension: self.dimension,
            panel: self.layout.panel(self.dimension),
            mode: self.mode,
            prompt: self.mode.prompt(),
            prompt_at: [anchor, y_range[1] - m.t / 2.0],
            x_axis_y: self.layout.x_axis_y(self.dimension),
            y_axis_x: anchor + m.l / 2.0,
            y_ticks: y.ticks(5).into_iter().map(|value| Tick { value, y: y.scale(value) }).collect(),
            bars,
            arrow,
        }
    }
}

/// Charts drawn for a selected region: category, time of day and, when
/// the region has them, days of the week.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCharts {
    pub region_index: usize,
    groups: Vec<BarGroup>,
}

impl RegionCharts {
    pub fn for_region(region: &Region, layout: ChartLayout) -> Self {
        let groups = Dimension::ALL
            .iter()
            .filter_map(|&d| region.distribution(d).map(|dist| BarGroup::new(d, dist.clone(), layout)))
            .collect();
        Self { region_index: region.index, groups }
    }

    pub fn groups(&self) -> &[BarGroup] {
        &self.groups
    }

    /// Flips one group; the others keep their mode and scale. Returns false
    /// when the region has no chart for that dimension.
    pub fn toggle(&mut self, dimension: Dimension) -> bool {
        match self.groups.iter_mut().find(|g| g.dimension == dimension) {
            Some(group) => {
                group.toggle();
                true
            }
            None => false,
        }
    }

    pub fn views(&self) -> Vec<GroupView> {
        self.groups.iter().map(BarGroup::view).collect()
    }
}

/// Small screens show one chart panel at a time; a click on the arrow moves
/// to the next one.
pub fn next_panel(panel: &str) -> &'static str {
    match panel {
        "bars" => "bars2",
        "bars2" => "bars3",
        _ => "bars",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::parse_regions;
    use crate::regions::tests::collection;
    use approx::assert_relative_eq;

    fn region() -> Region {
        parse_regions(&collection(1), 18).unwrap().remove(0)
    }

    #[test]
    fn round_bands_match_reference_layout() {
        // 9 bands over [60, 790] with padding .15 / outer .2
        let x = BandScale::round_bands(9, [60.0, 790.0], 0.15, 0.2);
        // step = floor(730 / 9.25) = 78, error = 730 - 8.85 * 78 = 39.7
        assert_eq!(x.position(0), 80.0);
        assert_eq!(x.position(1), 158.0);
        assert_eq!(x.band(), 66.0);
    }

    #[test]
    fn linear_scale_nices_the_domain() {
        let y = LinearScale::nice_zero_based(0.23, [225.0, 25.0]);
        assert_relative_eq!(y.domain()[1], 0.24, epsilon = 1e-12);
        let y = LinearScale::nice_zero_based(0.234, [225.0, 25.0]);
        assert_relative_eq!(y.domain()[1], 0.24, epsilon = 1e-12);
        assert_eq!(y.scale(0.0), 225.0);
        assert_eq!(y.scale(y.domain()[1]), 25.0);
        let y = LinearScale::nice_zero_based(2.0, [225.0, 25.0]);
        assert_relative_eq!(y.domain()[1], 2.0, epsilon = 1e-12);
        let ticks = y.ticks(5);
        assert_relative_eq!(ticks[0], 0.0);
        assert_relative_eq!(*ticks.last().unwrap(), 2.0, epsilon = 1e-9);
        assert_eq!(ticks.len(), 5);
    }

    #[test]
    fn nice_keeps_float_rounding() {
        assert_relative_eq!(LinearScale::nice_zero_based(0.07, [1.0, 0.0]).domain()[1], 0.08, epsilon = 1e-12);
        assert_relative_eq!(LinearScale::nice_zero_based(0.3, [1.0, 0.0]).domain()[1], 0.35, epsilon = 1e-12);
        assert_relative_eq!(LinearScale::nice_zero_based(2.5, [1.0, 0.0]).domain()[1], 2.6, epsilon = 1e-12);
        assert_relative_eq!(LinearScale::nice_zero_based(0.2, [1.0, 0.0]).domain()[1], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn zero_data_gets_a_unit_domain() {
        let y = LinearScale::nice_zero_based(0.0, [100.0, 0.0]);
        assert_eq!(y.domain(), [0.0, 1.0]);
    }

    #[test]
    fn labels_follow_mode() {
        assert_eq!(ChartMode::Absolute.format(0.1234), "12.3%");
        assert_eq!(ChartMode::Relative.format(1.2345), "1.23");
        assert_eq!(ChartMode::Absolute.prompt(), "Relative");
        assert_eq!(ChartMode::Relative.prompt(), "Absolute");
    }

    #[test]
    fn toggling_twice_restores_the_chart() {
        let mut charts = RegionCharts::for_region(&region(), ChartLayout::new(800.0, 600.0, false));
        let before = charts.views();
        assert!(charts.toggle(Dimension::Time));
        let toggled = charts.views();
        assert_ne!(before, toggled);
        assert!(charts.toggle(Dimension::Time));
        assert_eq!(before, charts.views());
    }

    #[test]
    fn toggle_only_touches_its_group() {
        let mut charts = RegionCharts::for_region(&region(), ChartLayout::new(800.0, 600.0, false));
        let before = charts.views();
        charts.toggle(Dimension::Category);
        let after = charts.views();
        assert_eq!(after[0].mode, ChartMode::Relative);
        assert_eq!(after[0].prompt, "Absolute");
        assert_eq!(after[0].bars[0].text, "1.00");
        assert_eq!(before[1], after[1]);
        assert_eq!(before[2], after[2]);
    }

    #[test]
    fn bars_sit_on_the_baseline() {
        let charts = RegionCharts::for_region(&region(), ChartLayout::new(800.0, 600.0, false));
        let views = charts.views();
        assert_eq!(views.len(), 3);
        for view in &views {
            let baseline = view.bars[0].y + view.bars[0].height;
            assert!(view.bars.iter().all(|b| b.y + b.height == baseline));
            assert_eq!(view.panel, "bars");
            assert!(view.arrow.is_none());
        }
        assert_eq!(views[0].bars[0].fill, "#f44336");
        assert_eq!(views[0].bars[0].label, "Entertainment");
        assert_eq!(views[0].bars[0].text, "10.0%");
        // category chart lives in the upper half
        assert!(views[0].bars.iter().all(|b| b.y + b.height <= 300.0));
        assert!(views[2].bars[0].x > 400.0);
    }

    #[test]
    fn small_screen_uses_one_panel_per_chart() {
        let charts = RegionCharts::for_region(&region(), ChartLayout::new(400.0, 300.0, true));
        let panels: Vec<_> = charts.views().iter().map(|v| v.panel).collect();
        assert_eq!(panels, vec!["bars", "bars2", "bars3"]);
        assert!(charts.views().iter().all(|v| v.arrow.is_some()));
        assert_eq!(next_panel("bars"), "bars2");
        assert_eq!(next_panel("bars3"), "bars");
    }

    #[test]
    fn region_without_days_has_two_charts() {
        let mut region = region();
        region.days = None;
        let mut charts = RegionCharts::for_region(&region, ChartLayout::new(800.0, 600.0, false));
        assert_eq!(charts.groups().len(), 2);
        assert!(!charts.toggle(Dimension::Day));
    }
}
