use num_traits::Float;

/// Scalar reading of a control, normalized by the device layer.
pub type ControlState = f64;

pub const PI: ControlState = std::f64::consts::PI;
pub const TAU: ControlState = std::f64::consts::TAU;

/// Bipolar axis readings.
pub const SYMM_UNIT_INTERVAL: NumInterval<ControlState> = NumInterval { from: -1.0, to: 1.0 };

/// Unipolar readings: buttons, triggers, half axes.
pub const UNIT_INTERVAL: NumInterval<ControlState> = NumInterval { from: 0.0, to: 1.0 };

/// Closed interval `[from, to]`, sorted on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumInterval<T> {
    pub from: T,
    pub to: T,
}

impl<T> NumInterval<T>
where
    T: PartialOrd + Copy,
{
    pub fn new(from: T, to: T) -> Self {
        if from > to {
            return Self { from: to, to: from };
        }
        Self { from, to }
    }

    pub fn contains_inclusive(&self, value: T) -> bool {
        value >= self.from && value <= self.to
    }

    /// Unlike `Ord::clamp` this never panics, a NaN input comes back untouched.
    pub fn clamp(&self, value: T) -> T {
        if value < self.from {
            self.from
        } else if value > self.to {
            self.to
        } else {
            value
        }
    }
}

/// Finite value or zero. Device layers occasionally hand over NaN on disconnect.
pub(crate) fn finite_or_zero<F: Float>(value: F) -> F {
    if value.is_finite() {
        value
    } else {
        F::zero()
    }
}
