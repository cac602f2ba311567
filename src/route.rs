//! Current navigation location as seen by the guard.

use serde::{Deserialize, Serialize};

use crate::screen::{Area, Screen};

/// Ordered path segments supplied by the navigation framework.
///
/// Only the first segment (area) and the second segment (leaf screen) are
/// ever inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLocation {
    segments: Vec<String>,
}

impl RouteLocation {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parse a slash separated path. Empty segments are dropped, so
    /// `"/(auth)//pending/"` and `"(auth)/pending"` are the same location.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn of(screen: Screen) -> Self {
        Self::parse(&screen.path())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn area(&self) -> Option<Area> {
        self.segments.first().and_then(|s| Area::from_segment(s))
    }

    pub fn leaf(&self) -> Option<Screen> {
        self.segments.get(1).and_then(|s| Screen::from_leaf(s))
    }

    pub fn is_leaf(&self, screen: Screen) -> bool {
        self.leaf() == Some(screen)
    }

    pub fn leaf_in(&self, screens: &[Screen]) -> bool {
        self.leaf().is_some_and(|leaf| screens.contains(&leaf))
    }

    pub fn in_area(&self, area: Area) -> bool {
        self.area() == Some(area)
    }
}

impl std::fmt::Display for RouteLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
