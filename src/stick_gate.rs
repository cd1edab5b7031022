//! Gate envelopes: the largest magnitude a shaped vector may reach at a given angle.
//!
//! Gates hold nothing but their scale and are cheap to build, so groups build one
//! per query from current settings instead of keeping an instance around.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::common::{ControlState, PI, TAU};

pub trait StickGate {
    /// Distance from the center to the gate boundary along `angle` (radians, any value).
    fn radius_at_angle(&self, angle: f64) -> ControlState;
}

/// Square with flat sides at 0°, 90°, 180° and 270°, `half_width` from the center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareStickGate {
    half_width: ControlState,
}

impl SquareStickGate {
    pub fn new(half_width: ControlState) -> Self {
        Self { half_width }
    }
}

impl StickGate for SquareStickGate {
    fn radius_at_angle(&self, angle: f64) -> ControlState {
        const SECTION_ANGLE: f64 = TAU / 4.0;
        // Angle relative to the nearest side normal, in [-45°, 45°).
        let offset = (angle + SECTION_ANGLE / 2.0).rem_euclid(SECTION_ANGLE) - SECTION_ANGLE / 2.0;
        self.half_width / offset.cos()
    }
}

/// Regular octagon with vertices at 0°, 45°, ... `radius` from the center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctagonStickGate {
    radius: ControlState,
}

impl OctagonStickGate {
    pub fn new(radius: ControlState) -> Self {
        Self { radius }
    }
}

impl StickGate for OctagonStickGate {
    fn radius_at_angle(&self, angle: f64) -> ControlState {
        const SIDES: f64 = 8.0;
        const HALF_INTERIOR_ANGLE: f64 = (SIDES - 2.0) * PI / SIDES / 2.0;
        let ang = angle.rem_euclid(TAU / SIDES);
        // Law of sines on the triangle (center, vertex, boundary point).
        self.radius / (PI - ang - HALF_INTERIOR_ANGLE).sin() * HALF_INTERIOR_ANGLE.sin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundStickGate {
    radius: ControlState,
}

impl RoundStickGate {
    pub fn new(radius: ControlState) -> Self {
        Self { radius }
    }
}

impl StickGate for RoundStickGate {
    fn radius_at_angle(&self, _angle: f64) -> ControlState {
        self.radius
    }
}

/// Gate family selector, as named in profiles.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GateShape {
    #[default]
    Square,
    Octagon,
    Circle,
}

impl GateShape {
    pub fn radius_at_angle(self, scale: ControlState, angle: f64) -> ControlState {
        match self {
            GateShape::Square => SquareStickGate::new(scale).radius_at_angle(angle),
            GateShape::Octagon => OctagonStickGate::new(scale).radius_at_angle(angle),
            GateShape::Circle => RoundStickGate::new(scale).radius_at_angle(angle),
        }
    }
}
