//! 3x3 sub-regions of an element box, used by grid-mode actions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::element::{BoundingBox, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubRegion {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl SubRegion {
    pub const ALL: [SubRegion; 9] = [
        SubRegion::TopLeft,
        SubRegion::Top,
        SubRegion::TopRight,
        SubRegion::Left,
        SubRegion::Center,
        SubRegion::Right,
        SubRegion::BottomLeft,
        SubRegion::Bottom,
        SubRegion::BottomRight,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SubRegion::TopLeft => "top-left",
            SubRegion::Top => "top",
            SubRegion::TopRight => "top-right",
            SubRegion::Left => "left",
            SubRegion::Center => "center",
            SubRegion::Right => "right",
            SubRegion::BottomLeft => "bottom-left",
            SubRegion::Bottom => "bottom",
            SubRegion::BottomRight => "bottom-right",
        }
    }

    /// Column and row in quarters of the box: 1, 2 or 3.
    fn quarters(self) -> (i32, i32) {
        match self {
            SubRegion::TopLeft => (1, 1),
            SubRegion::Top => (2, 1),
            SubRegion::TopRight => (3, 1),
            SubRegion::Left => (1, 2),
            SubRegion::Center => (2, 2),
            SubRegion::Right => (3, 2),
            SubRegion::BottomLeft => (1, 3),
            SubRegion::Bottom => (2, 3),
            SubRegion::BottomRight => (3, 3),
        }
    }

    /// Device point for this region of `bbox`.
    pub fn point_in(self, bbox: &BoundingBox) -> Point {
        let (col, row) = self.quarters();
        let (x0, y0) = bbox.top_left;
        (x0 + bbox.width() * col / 4, y0 + bbox.height() * row / 4)
    }
}

impl FromStr for SubRegion {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        SubRegion::ALL
            .into_iter()
            .find(|region| region.label() == raw)
            .ok_or_else(|| format!("unknown sub-region `{raw}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_matches_box_center_for_even_sizes() {
        let bbox = BoundingBox::new((100, 200), (300, 400));
        assert_eq!(SubRegion::Center.point_in(&bbox), bbox.center());
    }

    #[test]
    fn corners_sit_on_quarter_lines() {
        let bbox = BoundingBox::new((0, 0), (400, 800));
        assert_eq!(SubRegion::TopLeft.point_in(&bbox), (100, 200));
        assert_eq!(SubRegion::Top.point_in(&bbox), (200, 200));
        assert_eq!(SubRegion::BottomRight.point_in(&bbox), (300, 600));
        assert_eq!(SubRegion::Left.point_in(&bbox), (100, 400));
    }

    #[test]
    fn every_region_point_is_inside_the_box() {
        let bbox = BoundingBox::new((13, 57), (91, 130));
        for region in SubRegion::ALL {
            let (x, y) = region.point_in(&bbox);
            assert!((13..=91).contains(&x) && (57..=130).contains(&y), "{region:?}");
        }
    }

    #[test]
    fn labels_parse_back() {
        for region in SubRegion::ALL {
            assert_eq!(region.label().parse::<SubRegion>(), Ok(region));
        }
        assert!("middle".parse::<SubRegion>().is_err());
    }
}
