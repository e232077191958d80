//! Surface placement geometry.
//!
//! All placement math happens in logical units (physical pixels divided
//! by the display scale factor). Host windows report layout in physical
//! pixels; embedded surfaces are positioned in logical coordinates.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Tolerance for bounds equality, in logical units. Layout measurement
/// jitters by fractions of a pixel during resize; differences below
/// this threshold are noise, not movement.
pub const BOUNDS_EPSILON: f64 = 0.5;

/// Sidebar width assumed when the content area cannot be measured.
const FALLBACK_SIDEBAR_WIDTH: f64 = 260.0;
/// Header height assumed when the content area cannot be measured.
const FALLBACK_HEADER_HEIGHT: f64 = 48.0;
/// Fixed surface size used when the window itself is unmeasurable.
const FALLBACK_SURFACE_WIDTH: f64 = 800.0;
const FALLBACK_SURFACE_HEIGHT: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LogicalPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LogicalSize {
    pub width: f64,
    pub height: f64,
}

/// On-screen rectangle of a surface in logical units, together with the
/// scale factor it was derived under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub position: LogicalPosition,
    pub size: LogicalSize,
    pub scale_factor: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64, scale_factor: f64) -> Self {
        Self {
            position: LogicalPosition { x, y },
            size: LogicalSize { width, height },
            scale_factor,
        }
    }

    /// Equality within [`BOUNDS_EPSILON`] on every component. Used to
    /// suppress redundant placement updates during live resize.
    pub fn approx_eq(&self, other: &Bounds) -> bool {
        self.approx_eq_within(other, BOUNDS_EPSILON)
    }

    pub fn approx_eq_within(&self, other: &Bounds, epsilon: f64) -> bool {
        (self.position.x - other.position.x).abs() < epsilon
            && (self.position.y - other.position.y).abs() < epsilon
            && (self.size.width - other.size.width).abs() < epsilon
            && (self.size.height - other.size.height).abs() < epsilon
            && (self.scale_factor - other.scale_factor).abs() < epsilon
    }

    /// Fixed degraded-placement rectangle. Placement falls back to this
    /// instead of failing when the window cannot be measured at all.
    pub fn fallback() -> Self {
        Self::new(
            FALLBACK_SIDEBAR_WIDTH,
            FALLBACK_HEADER_HEIGHT,
            FALLBACK_SURFACE_WIDTH,
            FALLBACK_SURFACE_HEIGHT,
            1.0,
        )
    }
}

/// Measured rectangle of the designated content area, in logical units
/// relative to the window origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Host window layout snapshot used to derive surface placement.
///
/// `inner_width`/`inner_height` are physical pixels as reported by the
/// window; `content_rect` is the measured content area when the UI
/// could measure one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct WindowLayout {
    pub scale_factor: f64,
    pub inner_width: f64,
    pub inner_height: f64,
    pub content_rect: Option<ContentRect>,
}

fn usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Compute the logical rectangle a surface should occupy.
///
/// Prefers the measured content rectangle; falls back to a
/// sidebar-width/header-height split of the window when the content
/// area is unmeasurable, and to [`Bounds::fallback`] when the window
/// itself reports unusable numbers. Never fails: placement degrades
/// instead of blocking the UI.
pub fn compute_surface_bounds(layout: &WindowLayout) -> Bounds {
    if !usable(layout.scale_factor) {
        return Bounds::fallback();
    }

    if let Some(rect) = layout.content_rect
        && usable(rect.width)
        && usable(rect.height)
        && rect.x.is_finite()
        && rect.y.is_finite()
    {
        return Bounds::new(rect.x, rect.y, rect.width, rect.height, layout.scale_factor);
    }

    if !usable(layout.inner_width) || !usable(layout.inner_height) {
        return Bounds::fallback();
    }

    let logical_width = layout.inner_width / layout.scale_factor;
    let logical_height = layout.inner_height / layout.scale_factor;
    let width = (logical_width - FALLBACK_SIDEBAR_WIDTH).max(1.0);
    let height = (logical_height - FALLBACK_HEADER_HEIGHT).max(1.0);

    Bounds::new(
        FALLBACK_SIDEBAR_WIDTH,
        FALLBACK_HEADER_HEIGHT,
        width,
        height,
        layout.scale_factor,
    )
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Bounds {
        Bounds::new(100.0, 50.0, 640.0, 480.0, 2.0)
    }

    #[test]
    fn approx_eq_absorbs_sub_epsilon_noise() {
        let a = base();
        let b = Bounds::new(
            100.0 + BOUNDS_EPSILON * 0.9,
            50.0 - BOUNDS_EPSILON * 0.9,
            640.0 + BOUNDS_EPSILON * 0.5,
            480.0 - BOUNDS_EPSILON * 0.5,
            2.0 + BOUNDS_EPSILON * 0.1,
        );
        assert!(a.approx_eq(&b));
        assert!(b.approx_eq(&a));
    }

    #[test]
    fn approx_eq_rejects_real_movement() {
        let a = base();
        for field in 0..4 {
            let mut b = base();
            let delta = BOUNDS_EPSILON * 4.0;
            match field {
                0 => b.position.x += delta,
                1 => b.position.y += delta,
                2 => b.size.width += delta,
                _ => b.size.height += delta,
            }
            assert!(!a.approx_eq(&b), "field {} should break equality", field);
        }
    }

    #[test]
    fn measured_content_rect_wins() {
        let layout = WindowLayout {
            scale_factor: 2.0,
            inner_width: 2560.0,
            inner_height: 1440.0,
            content_rect: Some(ContentRect {
                x: 300.0,
                y: 60.0,
                width: 900.0,
                height: 620.0,
            }),
        };
        let bounds = compute_surface_bounds(&layout);
        assert_eq!(bounds.position.x, 300.0);
        assert_eq!(bounds.size.height, 620.0);
        assert_eq!(bounds.scale_factor, 2.0);
    }

    #[test]
    fn unmeasured_content_falls_back_to_window_split() {
        let layout = WindowLayout {
            scale_factor: 2.0,
            inner_width: 2560.0,
            inner_height: 1440.0,
            content_rect: None,
        };
        let bounds = compute_surface_bounds(&layout);
        assert_eq!(bounds.position.x, 260.0);
        assert_eq!(bounds.position.y, 48.0);
        assert_eq!(bounds.size.width, 2560.0 / 2.0 - 260.0);
        assert_eq!(bounds.size.height, 1440.0 / 2.0 - 48.0);
    }

    #[test]
    fn unusable_measurements_degrade_to_fixed_rect() {
        let cases = [
            WindowLayout {
                scale_factor: 0.0,
                inner_width: 1280.0,
                inner_height: 720.0,
                content_rect: None,
            },
            WindowLayout {
                scale_factor: f64::NAN,
                inner_width: 1280.0,
                inner_height: 720.0,
                content_rect: None,
            },
            WindowLayout {
                scale_factor: 1.0,
                inner_width: -10.0,
                inner_height: 720.0,
                content_rect: None,
            },
        ];
        for layout in cases {
            assert_eq!(compute_surface_bounds(&layout), Bounds::fallback());
        }
    }

    #[test]
    fn zero_sized_content_rect_is_ignored() {
        let layout = WindowLayout {
            scale_factor: 1.0,
            inner_width: 1280.0,
            inner_height: 720.0,
            content_rect: Some(ContentRect {
                x: 10.0,
                y: 10.0,
                width: 0.0,
                height: 500.0,
            }),
        };
        let bounds = compute_surface_bounds(&layout);
        assert_eq!(bounds.position.x, 260.0);
    }

    #[test]
    fn bounds_serialize_camel_case() {
        let json = serde_json::to_value(base()).unwrap();
        assert!(json.get("scaleFactor").is_some());
        assert!(json.get("position").is_some());
        assert!(json.get("size").is_some());
    }
}
