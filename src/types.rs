use geo::{MultiPolygon, Point};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Region {
    /// Position in the region file, stable for one city load
    pub index: usize,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    /// Share of the city mass, in [0, 1]
    pub weight: f64,
    pub category: Distribution,
    pub time: Distribution,
    pub days: Option<Distribution>,
}

impl Region {
    pub fn distribution(&self, dimension: Dimension) -> Option<&Distribution> {
        match dimension {
            Dimension::Category => Some(&self.category),
            Dimension::Time => Some(&self.time),
            Dimension::Day => self.days.as_ref(),
        }
    }
}

/// A distribution vector and its "more" counterpart (how distinctive each
/// label is for the region compared to the whole city).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub absolute: Vec<f64>,
    pub relative: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VenuePoint {
    pub point: Point<f64>,
    /// Visits, possibly fractional after averaging
    pub count: f64,
}

impl VenuePoint {
    pub fn lat(&self) -> f64 { self.point.y() }
    pub fn lon(&self) -> f64 { self.point.x() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Time,
    Day,
}

pub const SHORT_CATEGORIES: [&str; 9] = [
    "Entertainment", "Education", "Food", "Nightlife", "Outdoors",
    "Shop & Service", "Professional", "Residence", "Transport",
];

pub const TIME_OF_DAY: [&str; 6] = ["morning", "noon", "afternoon", "evening", "night", "late night"];

pub const DAY_OF_WEEK: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Category, Dimension::Time, Dimension::Day];

    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Dimension::Category => &SHORT_CATEGORIES,
            Dimension::Time => &TIME_OF_DAY,
            Dimension::Day => &DAY_OF_WEEK,
        }
    }

    /// Short key used in selectors and query strings.
    pub fn key(self) -> &'static str {
        match self {
            Dimension::Category => "cat",
            Dimension::Time => "time",
            Dimension::Day => "day",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "cat" => Some(Dimension::Category),
            "time" => Some(Dimension::Time),
            "day" | "days" => Some(Dimension::Day),
            _ => None,
        }
    }

    /// Property prefix in the region file (`category_distrib`, `days_more`...).
    pub fn property_prefix(self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Time => "time",
            Dimension::Day => "days",
        }
    }
}
