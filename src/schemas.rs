use doc_for::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::ControlState;
use crate::control_group::GroupKind;
use crate::stick_gate::GateShape;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct Profile {
    #[serde(default)]
    pub(crate) global: GlobalSettings,
    /// Input names the device feed may write to.
    #[serde(default)]
    pub(crate) inputs: Vec<String>,
    #[serde(default)]
    pub(crate) groups: BTreeMap<String, GroupProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[doc_impl]
pub(crate) struct GlobalSettings {
    /// The polling loop samples every enabled group at this rate in Hz.
    #[serde(default = "default_poll_rate")]
    pub(crate) poll_rate_hz: u32,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            poll_rate_hz: default_poll_rate(),
        }
    }
}

fn default_poll_rate() -> u32 {
    200
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GroupProfile {
    pub(crate) kind: GroupKind,
    #[serde(default = "default_true")]
    pub(crate) enabled: bool,
    /// Stick groups only, tilt always uses a square gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) gate: Option<GateShape>,
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// Setting key to value, e.g. `angle: 60`.
    #[serde(default)]
    pub(crate) settings: BTreeMap<String, ControlState>,
    /// Role identifier to binding expression, e.g. `Forward: "key_w | pad_up"`.
    #[serde(default)]
    pub(crate) bindings: BTreeMap<String, String>,
    /// Role identifier to range multiplier.
    #[serde(default)]
    pub(crate) ranges: BTreeMap<String, ControlState>,
}

impl GroupProfile {
    /// Stick gate used when the profile names none.
    pub(crate) const DEFAULT_STICK_GATE: GateShape = GateShape::Octagon;
}
