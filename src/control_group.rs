//! Object safe view of the concrete groups, for configuration front-ends and the
//! polling driver, which handle groups of different kinds side by side.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::common::{ControlState, TAU};
use crate::control_reference::ControlReference;
use crate::numeric_setting::NumericSetting;
use crate::reshapable::{ControlRole, ReshapableInput, ReshapeData, ROLE_SLOTS};
use crate::stick_gate::GateShape;
use crate::tilt::Tilt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Tilt,
    Stick,
}

/// What a concrete group fixes on top of the shared reshape machinery.
pub trait GroupLayout: ReshapableInput {
    const KIND: GroupKind;

    fn group_name(&self) -> &str;
    fn gate(&self) -> GateShape;
    /// Settings specific to the variant, shared ones excluded.
    fn variant_settings(&self) -> Vec<&NumericSetting>;

    fn tilt(&self) -> Option<&Tilt> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceInfo {
    pub role: &'static str,
    pub expression: Option<String>,
    pub range: ControlState,
}

pub trait ControlGroup: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> GroupKind;
    fn gate_shape(&self) -> GateShape;

    /// Variant settings first, then the shared dead zone and modifier range.
    fn settings(&self) -> Vec<&NumericSetting>;

    fn role_names(&self) -> [&'static str; ROLE_SLOTS];

    /// Looks a reference up by its role identifier, ASCII case insensitive.
    fn reference(&self, role: &str) -> Option<&ControlReference>;

    fn shaped_state(&self) -> ReshapeData;
    fn raw_state(&self) -> ReshapeData;
    fn gate_radius(&self, angle: f64) -> ControlState;
    fn default_input_radius(&self, angle: f64) -> ControlState;

    fn as_tilt(&self) -> Option<&Tilt>;

    fn setting(&self, key: &str) -> Option<&NumericSetting> {
        self.settings().into_iter().find(|s| s.key() == key)
    }

    fn reference_infos(&self) -> Vec<ReferenceInfo> {
        self.role_names()
            .into_iter()
            .filter_map(|role| {
                self.reference(role).map(|reference| ReferenceInfo {
                    role,
                    expression: reference.expression_text(),
                    range: reference.range().value(),
                })
            })
            .collect()
    }
}

impl<T: GroupLayout> ControlGroup for T {
    fn name(&self) -> &str {
        self.group_name()
    }

    fn kind(&self) -> GroupKind {
        T::KIND
    }

    fn gate_shape(&self) -> GateShape {
        self.gate()
    }

    fn settings(&self) -> Vec<&NumericSetting> {
        let mut settings = self.variant_settings();
        settings.extend(self.controls().settings());
        settings
    }

    fn role_names(&self) -> [&'static str; ROLE_SLOTS] {
        T::Role::ALL.map(ControlRole::name)
    }

    fn reference(&self, role: &str) -> Option<&ControlReference> {
        T::Role::from_name(role).map(|role| self.controls().reference(role))
    }

    fn shaped_state(&self) -> ReshapeData {
        self.reshapable_state(true)
    }

    fn raw_state(&self) -> ReshapeData {
        self.reshapable_state(false)
    }

    fn gate_radius(&self, angle: f64) -> ControlState {
        self.gate_radius_at_angle(angle)
    }

    fn default_input_radius(&self, angle: f64) -> ControlState {
        self.default_input_radius_at_angle(angle)
    }

    fn as_tilt(&self) -> Option<&Tilt> {
        self.tilt()
    }
}

/// One sample of the configured gate next to the default input envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GatePoint {
    pub angle_deg: f64,
    pub configured: ControlState,
    pub default: ControlState,
}

/// Samples both envelopes at `steps` evenly spaced angles, starting at 0°.
pub fn sample_gate_envelope(group: &dyn ControlGroup, steps: usize) -> Vec<GatePoint> {
    (0..steps)
        .map(|i| {
            let angle = TAU * i as f64 / steps as f64;
            GatePoint {
                angle_deg: angle.to_degrees(),
                configured: group.gate_radius(angle),
                default: group.default_input_radius(angle),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_reference::{Expression, InputCell};
    use crate::stick::Stick;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tilt_enumeration() {
        let tilt = Tilt::new("Tilt");
        let group: &dyn ControlGroup = &tilt;
        assert_eq!(group.name(), "Tilt");
        assert_eq!(group.kind(), GroupKind::Tilt);
        assert_eq!(group.gate_shape(), GateShape::Square);
        assert_eq!(
            group.role_names(),
            ["Forward", "Backward", "Left", "Right", "Modifier"]
        );
        let keys: Vec<_> = group.settings().iter().map(|s| s.key()).collect();
        assert_eq!(keys, vec!["angle", "velocity", "dead_zone", "modifier_range"]);
        assert!(group.as_tilt().is_some());
    }

    #[test]
    fn test_stick_enumeration() {
        let stick = Stick::new("Main Stick", GateShape::Octagon);
        let group: &dyn ControlGroup = &stick;
        assert_eq!(group.kind(), GroupKind::Stick);
        assert_eq!(group.gate_shape(), GateShape::Octagon);
        assert_eq!(group.role_names(), ["Up", "Down", "Left", "Right", "Modifier"]);
        let keys: Vec<_> = group.settings().iter().map(|s| s.key()).collect();
        assert_eq!(keys, vec!["gate_size", "dead_zone", "modifier_range"]);
        assert!(group.as_tilt().is_none());
    }

    #[test]
    fn test_setting_write_through_enumeration() {
        let tilt = Tilt::new("Tilt");
        let group: &dyn ControlGroup = &tilt;
        let angle = group.setting("angle").unwrap();
        assert_eq!(angle.set_value(999.0), 180.0);
        assert_eq!(tilt.max_angle_setting().value(), 180.0);
        assert!(group.setting("nonexistent").is_none());
    }

    #[test]
    fn test_rebind_by_role_name() {
        let tilt = Tilt::new("Tilt");
        let group: &dyn ControlGroup = &tilt;
        let cell = InputCell::new("key_w");
        cell.set(1.0);
        group
            .reference("forward")
            .unwrap()
            .bind(Expression::Input(cell.clone()));
        assert!(group.reference("Up").is_none());
        assert_eq!(group.raw_state(), ReshapeData::new(0.0, 1.0));
        assert!((group.shaped_state().y - 85.0 / 180.0).abs() < 1e-9);

        let infos = group.reference_infos();
        assert_eq!(infos.len(), 5);
        assert_eq!(
            infos[0],
            ReferenceInfo {
                role: "Forward",
                expression: Some("key_w".to_string()),
                range: 1.0,
            }
        );
        assert_eq!(infos[4].expression, None);
    }

    #[test]
    fn test_gate_envelope_sampling() {
        let tilt = Tilt::new("Tilt");
        tilt.max_angle_setting().set_value(90.0);
        let envelope = sample_gate_envelope(&tilt, 8);
        assert_eq!(envelope.len(), 8);
        assert_eq!(envelope[0].angle_deg, 0.0);
        assert!((envelope[0].configured - 0.5).abs() < 1e-9);
        assert!((envelope[0].default - 1.0).abs() < 1e-9);
        assert!((envelope[1].angle_deg - 45.0).abs() < 1e-9);
        assert!((envelope[1].default - 2.0_f64.sqrt()).abs() < 1e-9);
        for point in &envelope {
            assert!(point.configured <= point.default);
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(GroupKind::Tilt.to_string(), "tilt");
        assert_eq!(
            serde_yaml::from_str::<GroupKind>("stick\n").unwrap(),
            GroupKind::Stick
        );
    }
}
