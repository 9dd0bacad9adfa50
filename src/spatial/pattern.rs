use serde::{Deserialize, Serialize};

use crate::error::PpaError;
use crate::spatial::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A finite set of locations confined to a fixed observation window.
#[derive(Debug, Clone, PartialEq)]
pub struct PointPattern {
    window: Window,
    points: Vec<Point>,
    label: Option<String>,
}

impl PointPattern {
    /// Fails when the window is degenerate, a coordinate is not finite, or a
    /// point falls outside the window.
    pub fn new(window: Window, points: Vec<Point>) -> Result<Self, PpaError> {
        if window.is_degenerate() {
            return Err(PpaError::Column(
                "point pattern window is degenerate".to_string(),
            ));
        }
        for (i, p) in points.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite()) {
                return Err(PpaError::Column(format!(
                    "point {} has a missing or non-finite coordinate",
                    i
                )));
            }
            if !window.contains(p.x, p.y) {
                return Err(PpaError::Column(format!(
                    "point {} ({}, {}) lies outside the window",
                    i, p.x, p.y
                )));
            }
        }
        Ok(Self {
            window,
            points,
            label: None,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
