use crate::common::ControlState;
use crate::control_group::{GroupKind, GroupLayout};
use crate::numeric_setting::{NumericSetting, SettingDetails};
use crate::reshapable::{ReshapableControls, ReshapableInput, ReshapeData};
use crate::stick_gate::GateShape;

define_control_roles! {
    pub enum StickRole {
        positive_y: Up,
        negative_y: Down,
        negative_x: Left,
        positive_x: Right,
        modifier: Modifier,
    }
}

/// Analog stick built from directional inputs. The gate shape is fixed at
/// construction, its size follows the gate size setting.
#[derive(Debug)]
pub struct Stick {
    name: String,
    shape: GateShape,
    controls: ReshapableControls<StickRole>,
    gate_size: NumericSetting,
}

impl Stick {
    pub fn new(name: &str, shape: GateShape) -> Self {
        Self {
            name: name.to_string(),
            shape,
            controls: ReshapableControls::new(),
            gate_size: NumericSetting::new(
                "gate_size",
                SettingDetails::new("Gate Size", "%", "Size of the stick gate."),
                100.0,
                0.0,
                100.0,
            ),
        }
    }

    pub fn state(&self) -> ReshapeData {
        self.reshapable_state(true)
    }

    pub fn gate_size_setting(&self) -> &NumericSetting {
        &self.gate_size
    }
}

impl ReshapableInput for Stick {
    type Role = StickRole;

    fn controls(&self) -> &ReshapableControls<StickRole> {
        &self.controls
    }

    fn gate_radius_at_angle(&self, angle: f64) -> ControlState {
        self.shape
            .radius_at_angle(self.gate_size.value() / 100.0, angle)
    }

    fn default_input_radius_at_angle(&self, angle: f64) -> ControlState {
        self.shape.radius_at_angle(1.0, angle)
    }
}

impl GroupLayout for Stick {
    const KIND: GroupKind = GroupKind::Stick;

    fn group_name(&self) -> &str {
        &self.name
    }

    fn gate(&self) -> GateShape {
        self.shape
    }

    fn variant_settings(&self) -> Vec<&NumericSetting> {
        vec![&self.gate_size]
    }
}
