//! Interactable UI elements and their geometry.

use serde::{Deserialize, Serialize};

/// Screen point in device pixels.
pub type Point = (i32, i32);

/// Axis-aligned box given by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl BoundingBox {
    pub fn new(top_left: Point, bottom_right: Point) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Parse the uiautomator `bounds` attribute, e.g. `[10,20][110,70]`.
    pub fn parse(bounds: &str) -> Option<Self> {
        let inner = bounds.trim().strip_prefix('[')?.strip_suffix(']')?;
        let (first, second) = inner.split_once("][")?;
        Some(Self::new(parse_point(first)?, parse_point(second)?))
    }

    pub fn width(&self) -> i32 {
        self.bottom_right.0 - self.top_left.0
    }

    pub fn height(&self) -> i32 {
        self.bottom_right.1 - self.top_left.1
    }

    /// Integer center, floor-divided.
    pub fn center(&self) -> Point {
        (
            (self.top_left.0 + self.bottom_right.0) / 2,
            (self.top_left.1 + self.bottom_right.1) / 2,
        )
    }
}

fn parse_point(raw: &str) -> Option<Point> {
    let (x, y) = raw.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    let dx = f64::from(a.0 - b.0);
    let dy = f64::from(a.1 - b.1);
    (dx * dx + dy * dy).sqrt()
}

/// Boolean node attribute that makes a node a candidate for interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Clickable,
    Focusable,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Clickable, Capability::Focusable];

    pub fn attribute(self) -> &'static str {
        match self {
            Capability::Clickable => "clickable",
            Capability::Focusable => "focusable",
        }
    }
}

/// One deduplicated, identity-stable interactable control for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub bbox: BoundingBox,
    pub capability: Capability,
    pub discovered_round: u32,
}

impl Element {
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    /// True when the two centers are within `min_dist` (inclusive).
    pub fn is_near(&self, other: &Element, min_dist: f64) -> bool {
        distance(self.center(), other.center()) <= min_dist
    }
}
