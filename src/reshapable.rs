//! Shared machinery of groups that turn two opposed input pairs into a gated 2D vector.

use std::fmt::{Debug, Display};
use std::marker::PhantomData;
use std::str::FromStr;

use crate::common::{finite_or_zero, ControlState, UNIT_INTERVAL};
use crate::control_reference::ControlReference;
use crate::numeric_setting::{NumericSetting, SettingDetails};

/// Four directions plus the modifier.
pub const ROLE_SLOTS: usize = 5;

/// Semantic slot of a control reference inside a reshapable group.
///
/// Implemented by `define_control_roles!`.
pub trait ControlRole:
    Copy + Eq + Debug + Display + FromStr + Send + Sync + 'static
{
    const ALL: [Self; ROLE_SLOTS];
    const POSITIVE_Y: Self;
    const NEGATIVE_Y: Self;
    const NEGATIVE_X: Self;
    const POSITIVE_X: Self;
    const MODIFIER: Self;

    fn index(self) -> usize;
    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::from_str(name).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReshapeData {
    pub x: ControlState,
    pub y: ControlState,
}

impl ReshapeData {
    pub fn new(x: ControlState, y: ControlState) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> ControlState {
        self.x.hypot(self.y)
    }

    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }
}

/// References and settings every reshapable group owns, in fixed role-indexed slots.
#[derive(Debug)]
pub struct ReshapableControls<R: ControlRole> {
    references: [ControlReference; ROLE_SLOTS],
    dead_zone: NumericSetting,
    modifier_range: NumericSetting,
    _role: PhantomData<R>,
}

impl<R: ControlRole> Default for ReshapableControls<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ControlRole> ReshapableControls<R> {
    pub fn new() -> Self {
        Self {
            references: std::array::from_fn(|_| ControlReference::new(UNIT_INTERVAL)),
            dead_zone: NumericSetting::new(
                "dead_zone",
                SettingDetails::new(
                    "Dead Zone",
                    "%",
                    "Input distance from center ignored before shaping.",
                ),
                0.0,
                0.0,
                50.0,
            ),
            modifier_range: NumericSetting::new(
                "modifier_range",
                SettingDetails::new(
                    "Modifier Range",
                    "%",
                    "Output scale while the modifier is fully held.",
                ),
                50.0,
                0.0,
                100.0,
            ),
            _role: PhantomData,
        }
    }

    pub fn reference(&self, role: R) -> &ControlReference {
        &self.references[role.index()]
    }

    pub fn references(&self) -> impl Iterator<Item = (R, &ControlReference)> {
        R::ALL.into_iter().map(move |role| (role, self.reference(role)))
    }

    /// Opposed pair differences, exactly as reported.
    pub fn raw_state(&self) -> ReshapeData {
        let y = self.reference(R::POSITIVE_Y).state() - self.reference(R::NEGATIVE_Y).state();
        let x = self.reference(R::POSITIVE_X).state() - self.reference(R::NEGATIVE_X).state();
        ReshapeData::new(x, y)
    }

    pub fn modifier_state(&self) -> ControlState {
        self.reference(R::MODIFIER).state()
    }

    pub fn dead_zone(&self) -> &NumericSetting {
        &self.dead_zone
    }

    pub fn modifier_range(&self) -> &NumericSetting {
        &self.modifier_range
    }

    pub fn settings(&self) -> [&NumericSetting; 2] {
        [&self.dead_zone, &self.modifier_range]
    }

    /// Magnitude multiplier for a modifier reading in `[0, 1]`.
    fn modifier_scale(&self, modifier: ControlState) -> ControlState {
        let range = self.modifier_range.value() / 100.0;
        let modifier = UNIT_INTERVAL.clamp(finite_or_zero(modifier));
        1.0 - modifier * (1.0 - range)
    }
}

/// Radial dead zone measured against `input_max`, the input envelope along the same angle.
fn apply_dead_zone(
    magnitude: ControlState,
    input_max: ControlState,
    dead_zone: ControlState,
) -> ControlState {
    if dead_zone <= 0.0 || input_max <= 0.0 {
        return magnitude;
    }
    let normalized = magnitude / input_max;
    let shaped = (normalized - dead_zone).max(0.0) / (1.0 - dead_zone);
    shaped * input_max
}

/// A group whose output is a 2D vector confined to a gate.
///
/// Implementors provide the gate; raw reading, modifier, dead zone and the
/// radial clamp come from the provided methods.
pub trait ReshapableInput: Send + Sync {
    type Role: ControlRole;

    fn controls(&self) -> &ReshapableControls<Self::Role>;

    /// Gate boundary for the current user configuration. Drives clamping.
    fn gate_radius_at_angle(&self, angle: f64) -> ControlState;

    /// Gate boundary at the reference scale of 1.0, regardless of configuration.
    fn default_input_radius_at_angle(&self, angle: f64) -> ControlState;

    /// Raw pair when `adjusted` is false, otherwise the shaped result.
    fn reshapable_state(&self, adjusted: bool) -> ReshapeData {
        let raw = self.controls().raw_state();
        if !adjusted {
            return raw;
        }
        let modifier = self.controls().modifier_state();
        self.reshape(raw.x, raw.y, modifier)
    }

    /// Angle preserving radial clamp.
    ///
    /// The direction of `(x, y)` is kept; the magnitude goes through the dead zone,
    /// is attenuated by the modifier and is then clamped to the gate radius along
    /// that direction, so the clamp always bounds the final output.
    fn reshape(&self, x: ControlState, y: ControlState, modifier: ControlState) -> ReshapeData {
        let x = finite_or_zero(x);
        let y = finite_or_zero(y);
        let magnitude = x.hypot(y);
        if magnitude == 0.0 {
            return ReshapeData::default();
        }
        let angle = y.atan2(x);

        let controls = self.controls();
        let magnitude = apply_dead_zone(
            magnitude,
            self.default_input_radius_at_angle(angle),
            controls.dead_zone().value() / 100.0,
        );
        let magnitude = magnitude * controls.modifier_scale(modifier);
        let magnitude = magnitude.min(self.gate_radius_at_angle(angle)).max(0.0);
        if magnitude == 0.0 {
            return ReshapeData::default();
        }

        ReshapeData::new(magnitude * angle.cos(), magnitude * angle.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_reference::{Expression, InputCell};
    use crate::stick_gate::GateShape;
    use std::sync::Arc;

    crate::define_control_roles! {
        enum TestRole {
            positive_y: Up,
            negative_y: Down,
            negative_x: Left,
            positive_x: Right,
            modifier: Modifier,
        }
    }

    struct TestGroup {
        shape: GateShape,
        scale: f64,
        controls: ReshapableControls<TestRole>,
        cells: [Arc<InputCell>; ROLE_SLOTS],
    }

    impl TestGroup {
        fn new(shape: GateShape, scale: f64) -> Self {
            let controls = ReshapableControls::new();
            let cells = TestRole::ALL.map(|role| InputCell::new(role.name()));
            for role in TestRole::ALL {
                controls
                    .reference(role)
                    .bind(Expression::Input(cells[role.index()].clone()));
            }
            Self {
                shape,
                scale,
                controls,
                cells,
            }
        }

        fn set(&self, role: TestRole, value: f64) {
            self.cells[role.index()].set(value);
        }
    }

    impl ReshapableInput for TestGroup {
        type Role = TestRole;

        fn controls(&self) -> &ReshapableControls<TestRole> {
            &self.controls
        }

        fn gate_radius_at_angle(&self, angle: f64) -> ControlState {
            self.shape.radius_at_angle(self.scale, angle)
        }

        fn default_input_radius_at_angle(&self, angle: f64) -> ControlState {
            self.shape.radius_at_angle(1.0, angle)
        }
    }

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_role_identifiers() {
        assert_eq!(TestRole::Up.name(), "Up");
        assert_eq!(TestRole::Modifier.to_string(), "Modifier");
        assert_eq!(TestRole::from_name("left"), Some(TestRole::Left));
        assert_eq!(TestRole::from_name("Sideways"), None);
        assert_eq!(TestRole::ALL.map(TestRole::index), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_vector_is_exact_zero() {
        let group = TestGroup::new(GateShape::Square, 0.5);
        for modifier in [0.0, 0.5, 1.0, f64::NAN] {
            assert_eq!(group.reshape(0.0, 0.0, modifier), ReshapeData::new(0.0, 0.0));
        }
    }

    #[test]
    fn test_raw_state_is_unclamped() {
        let group = TestGroup::new(GateShape::Circle, 0.1);
        group.set(TestRole::Up, 1.0);
        group.set(TestRole::Right, 1.0);
        group.set(TestRole::Modifier, 1.0);
        assert_eq!(group.reshapable_state(false), ReshapeData::new(1.0, 1.0));
    }

    #[test]
    fn test_opposed_pairs_cancel() {
        let group = TestGroup::new(GateShape::Square, 1.0);
        group.set(TestRole::Up, 0.6);
        group.set(TestRole::Down, 0.6);
        group.set(TestRole::Left, 0.3);
        assert_eq!(group.reshapable_state(false), ReshapeData::new(-0.3, 0.0));
    }

    #[test]
    fn test_inside_gate_passes_through() {
        let group = TestGroup::new(GateShape::Circle, 1.0);
        let shaped = group.reshape(0.3, -0.4, 0.0);
        assert!((shaped.x - 0.3).abs() < EPSILON);
        assert!((shaped.y + 0.4).abs() < EPSILON);
    }

    #[test]
    fn test_outside_gate_projects_onto_boundary() {
        let group = TestGroup::new(GateShape::Circle, 0.5);
        let shaped = group.reshape(3.0, 4.0, 0.0);
        assert!((shaped.magnitude() - 0.5).abs() < EPSILON);
        assert!((shaped.angle() - 4.0_f64.atan2(3.0)).abs() < EPSILON);
    }

    #[test]
    fn test_output_never_exceeds_gate() {
        for shape in [GateShape::Square, GateShape::Octagon, GateShape::Circle] {
            let group = TestGroup::new(shape, 0.7);
            for ix in -10..=10 {
                for iy in -10..=10 {
                    let (x, y) = (ix as f64 * 0.2, iy as f64 * 0.2);
                    for modifier in [0.0, 0.5, 1.0] {
                        let shaped = group.reshape(x, y, modifier);
                        let limit = group.gate_radius_at_angle(y.atan2(x));
                        assert!(
                            shaped.magnitude() <= limit + EPSILON,
                            "{shape} ({x}, {y}) -> {shaped:?} exceeds {limit}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_modifier_attenuates_before_clamp() {
        let group = TestGroup::new(GateShape::Circle, 0.6);
        // Full deflection: halved to 0.5, already inside the 0.6 gate.
        let shaped = group.reshape(1.0, 0.0, 1.0);
        assert!((shaped.x - 0.5).abs() < EPSILON);
        // Beyond the gate even after halving: clamped to the gate.
        let shaped = group.reshape(2.0, 0.0, 1.0);
        assert!((shaped.x - 0.6).abs() < EPSILON);
        // Partial modifier.
        let shaped = group.reshape(0.4, 0.0, 0.5);
        assert!((shaped.x - 0.3).abs() < EPSILON);
    }

    #[test]
    fn test_modifier_range_setting() {
        let group = TestGroup::new(GateShape::Circle, 1.0);
        group.controls().modifier_range().set_value(100.0);
        assert!((group.reshape(0.8, 0.0, 1.0).x - 0.8).abs() < EPSILON);
        group.controls().modifier_range().set_value(0.0);
        assert_eq!(group.reshape(0.8, 0.0, 1.0), ReshapeData::default());
    }

    #[test]
    fn test_dead_zone() {
        let group = TestGroup::new(GateShape::Circle, 1.0);
        group.controls().dead_zone().set_value(20.0);
        assert_eq!(group.reshape(0.1, 0.1, 0.0), ReshapeData::default());
        assert_eq!(group.reshape(0.0, -0.2, 0.0), ReshapeData::default());
        let shaped = group.reshape(0.0, 0.6, 0.0);
        assert!((shaped.y - 0.5).abs() < EPSILON, "{shaped:?}");
        let shaped = group.reshape(1.0, 0.0, 0.0);
        assert!((shaped.x - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_non_finite_raw_input() {
        let group = TestGroup::new(GateShape::Square, 1.0);
        assert_eq!(group.reshape(f64::NAN, f64::NAN, 0.0), ReshapeData::default());
        let shaped = group.reshape(f64::INFINITY, 0.5, 0.0);
        assert!((shaped.y - 0.5).abs() < EPSILON);
        assert!(shaped.x.abs() < EPSILON);
    }

    #[test]
    fn test_adjusted_state_is_idempotent() {
        let group = TestGroup::new(GateShape::Octagon, 0.8);
        group.set(TestRole::Up, 0.9);
        group.set(TestRole::Left, 0.4);
        group.set(TestRole::Modifier, 0.3);
        let first = group.reshapable_state(true);
        let second = group.reshapable_state(true);
        assert_eq!(first, second);
    }
}
