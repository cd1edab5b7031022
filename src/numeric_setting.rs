use atomic_float::AtomicF64;
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::common::{ControlState, NumInterval};

/// Presentation metadata. Not used by any computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingDetails {
    pub label: &'static str,
    pub unit: &'static str,
    pub description: &'static str,
}

impl SettingDetails {
    pub const fn new(label: &'static str, unit: &'static str, description: &'static str) -> Self {
        Self {
            label,
            unit,
            description,
        }
    }
}

/// A bounded, user adjustable scalar.
///
/// The value lives in a single atomic word: the configuration side may write
/// while the polling side reads, and a reader always sees one whole value.
/// Writes are clamped to the range, never stored out of it.
#[derive(Debug)]
pub struct NumericSetting {
    key: &'static str,
    details: SettingDetails,
    default_value: ControlState,
    range: NumInterval<ControlState>,
    value: AtomicF64,
}

/// Point in time copy of a setting, as handed to configuration front-ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub description: &'static str,
    pub default: ControlState,
    pub min: ControlState,
    pub max: ControlState,
    pub current: ControlState,
}

impl NumericSetting {
    /// `key` is the stable identifier profiles use; `min`/`max` may come in any order.
    pub fn new(
        key: &'static str,
        details: SettingDetails,
        default_value: ControlState,
        min: ControlState,
        max: ControlState,
    ) -> Self {
        let range = NumInterval::new(min, max);
        let default_value = range.clamp(default_value);
        Self {
            key,
            details,
            default_value,
            range,
            value: AtomicF64::new(default_value),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn details(&self) -> &SettingDetails {
        &self.details
    }

    pub fn value(&self) -> ControlState {
        self.value.load(Ordering::Relaxed)
    }

    /// Stores `value` clamped to the range and returns what was stored.
    /// NaN is rejected and the current value is kept.
    pub fn set_value(&self, value: ControlState) -> ControlState {
        if value.is_nan() {
            return self.value();
        }
        let clamped = self.range.clamp(value);
        self.value.store(clamped, Ordering::Relaxed);
        clamped
    }

    pub fn reset(&self) {
        self.value.store(self.default_value, Ordering::Relaxed);
    }

    pub fn default_value(&self) -> ControlState {
        self.default_value
    }

    pub fn is_default(&self) -> bool {
        self.value() == self.default_value
    }

    pub fn min(&self) -> ControlState {
        self.range.from
    }

    pub fn max(&self) -> ControlState {
        self.range.to
    }

    pub fn range(&self) -> NumInterval<ControlState> {
        self.range
    }

    pub fn info(&self) -> SettingInfo {
        SettingInfo {
            key: self.key,
            label: self.details.label,
            unit: self.details.unit,
            description: self.details.description,
            default: self.default_value,
            min: self.range.from,
            max: self.range.to,
            current: self.value(),
        }
    }
}
