//! Emulated remote orientation following the shaped tilt target.
//!
//! The tilt group only says where the remote should be; the remote gets there
//! with bounded acceleration derived from the group's peak angular velocity.

use crate::common::{ControlState, PI, TAU};
use crate::reshapable::ReshapeData;
use crate::tilt::Tilt;

/// Orientation in radians. Pitch follows the shaped y, roll the shaped x.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TiltAngles {
    pub pitch: f64,
    pub roll: f64,
}

impl TiltAngles {
    /// Full scale shaped output is a half turn.
    pub fn from_target(target: ReshapeData) -> Self {
        Self {
            pitch: target.y * PI,
            roll: target.x * PI,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct AxisState {
    angle: f64,
    velocity: f64,
}

impl AxisState {
    /// Bang-bang approach: accelerate toward the target, start braking in time to
    /// stop on it, snap onto it when the step would overshoot.
    fn approach(&mut self, target: f64, max_accel: f64, dt: f64) {
        // Go the short way round.
        if (self.angle - target).abs() > PI {
            self.angle -= TAU.copysign(self.angle);
        }

        let stop_distance = self.velocity * self.velocity.abs() / max_accel / 2.0;
        let offset = target - self.angle;
        let accel = signum_or_zero(offset - stop_distance) * max_accel;

        self.velocity += accel * dt;
        let change = self.velocity * dt + accel * dt * dt / 2.0;

        if change.abs() > offset.abs() {
            self.angle = target;
            self.velocity = 0.0;
        } else {
            self.angle += change;
        }
    }
}

fn signum_or_zero(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TiltMotion {
    pitch: AxisState,
    roll: AxisState,
}

impl TiltMotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angles(&self) -> TiltAngles {
        TiltAngles {
            pitch: self.pitch.angle,
            roll: self.roll.angle,
        }
    }

    pub fn angular_velocity(&self) -> TiltAngles {
        TiltAngles {
            pitch: self.pitch.velocity,
            roll: self.roll.velocity,
        }
    }

    /// Advances by `dt` seconds toward the tilt the group currently reports.
    pub fn update(&mut self, tilt: &Tilt, dt: f64) -> TiltAngles {
        self.step(tilt.state(), tilt.max_rotational_velocity(), dt)
    }

    /// `max_rotational_velocity` in radians per second.
    pub fn step(
        &mut self,
        target: ReshapeData,
        max_rotational_velocity: ControlState,
        dt: f64,
    ) -> TiltAngles {
        if dt <= 0.0 || max_rotational_velocity <= 0.0 {
            return self.angles();
        }
        let target = TiltAngles::from_target(target);
        let max_accel = max_rotational_velocity * max_rotational_velocity / TAU;
        self.pitch.approach(target.pitch, max_accel, dt);
        self.roll.approach(target.roll, max_accel, dt);
        self.angles()
    }
}
