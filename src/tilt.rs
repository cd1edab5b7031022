use crate::common::{ControlState, TAU};
use crate::control_group::{GroupKind, GroupLayout};
use crate::numeric_setting::{NumericSetting, SettingDetails};
use crate::reshapable::{ReshapableControls, ReshapableInput, ReshapeData};
use crate::stick_gate::{GateShape, SquareStickGate, StickGate};

define_control_roles! {
    /// Slots of a tilt group. Forward/Backward drive pitch (y), Left/Right drive roll (x).
    pub enum TiltRole {
        positive_y: Forward,
        negative_y: Backward,
        negative_x: Left,
        positive_x: Right,
        modifier: Modifier,
    }
}

/// Tilt of a motion sensing remote, driven by directional inputs.
///
/// The shaped output is the tilt as a fraction of a half turn, confined to a
/// square gate sized by the maximum angle setting.
#[derive(Debug)]
pub struct Tilt {
    name: String,
    controls: ReshapableControls<TiltRole>,
    max_angle: NumericSetting,
    max_rotational_velocity: NumericSetting,
}

impl Tilt {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            controls: ReshapableControls::new(),
            max_angle: NumericSetting::new(
                "angle",
                SettingDetails::new("Angle", "°", "Maximum tilt angle."),
                85.0,
                0.0,
                180.0,
            ),
            max_rotational_velocity: NumericSetting::new(
                "velocity",
                SettingDetails::new(
                    "Velocity",
                    "Hz",
                    "Peak angular velocity (measured in turns per second).",
                ),
                7.0,
                1.0,
                50.0,
            ),
        }
    }

    pub fn state(&self) -> ReshapeData {
        self.reshapable_state(true)
    }

    /// Peak angular velocity in radians per second.
    pub fn max_rotational_velocity(&self) -> ControlState {
        self.max_rotational_velocity.value() * TAU
    }

    pub fn max_angle_setting(&self) -> &NumericSetting {
        &self.max_angle
    }

    pub fn velocity_setting(&self) -> &NumericSetting {
        &self.max_rotational_velocity
    }
}

impl ReshapableInput for Tilt {
    type Role = TiltRole;

    fn controls(&self) -> &ReshapableControls<TiltRole> {
        &self.controls
    }

    fn gate_radius_at_angle(&self, angle: f64) -> ControlState {
        let max_tilt_angle = self.max_angle.value() / 180.0;
        SquareStickGate::new(max_tilt_angle).radius_at_angle(angle)
    }

    fn default_input_radius_at_angle(&self, angle: f64) -> ControlState {
        SquareStickGate::new(1.0).radius_at_angle(angle)
    }
}

impl GroupLayout for Tilt {
    const KIND: GroupKind = GroupKind::Tilt;

    fn group_name(&self) -> &str {
        &self.name
    }

    fn gate(&self) -> GateShape {
        GateShape::Square
    }

    fn variant_settings(&self) -> Vec<&NumericSetting> {
        vec![&self.max_angle, &self.max_rotational_velocity]
    }

    fn tilt(&self) -> Option<&Tilt> {
        Some(self)
    }
}
