use anyhow::{bail, Context, Result};
use serde_yaml::Value as YamlValue;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use yaml_merge_keys::merge_keys_serde;

use crate::common::NumInterval;
use crate::control_group::{ControlGroup, GroupKind};
use crate::controller::{EmulatedController, InputRegistry};
use crate::schemas::*;
use crate::stick::Stick;
use crate::tilt::Tilt;

pub const APP_VERSION_STR: &str = "0.4";
pub const APP_DEFAULT_CONFIG_FILE: &str = "conf/reshaper_profile.yaml";
pub const APP_AUTHORS: &str = "The Reshaper developers";
pub const APP_NAME: &str = "Reshaper";
pub const APP_COMMAND_NAME: &str = "reshaper";
pub const APP_LONG_NAME: &str = "Reshapable Analog Input Engine";
pub const APP_ABOUT: &str = APP_LONG_NAME;
pub const APP_LONG_ABOUT: &str = "Turns opposed pairs of input readings into gated tilt and \
    stick vectors, polling them at a fixed rate.";
pub const APP_DEFAULT_NO_HOT_RELOAD: &str = "false";
pub const APP_DEFAULT_MAX_LOG_LEVEL: &str = "info";

pub(crate) const POLL_RATE_RANGE: NumInterval<u32> = NumInterval {
    from: 10,
    to: 10000,
};

#[derive(Debug)]
pub(crate) struct ConfigManager {
    cfg_file_path_canon: PathBuf,
    profile: Profile,
    debug: bool,
}

impl ConfigManager {
    pub(crate) fn new(cfg_file_path: &Path, debug: bool) -> Result<Self> {
        let cfg_file_path_canon =
            fs::canonicalize(cfg_file_path).context("Failed to canonicalize config file path")?;
        Ok(Self {
            cfg_file_path_canon,
            profile: Profile::default(),
            debug,
        })
    }

    pub(crate) fn load(&mut self) -> Result<()> {
        log::info!(
            "Loading profile from {}",
            self.cfg_file_path_canon.display()
        );

        if !self.cfg_file_path_canon.exists() {
            log::error!("Config file is not found at {:?}", self.cfg_file_path_canon);
            bail!("Config file not found.");
        }

        let content =
            fs::read_to_string(&self.cfg_file_path_canon).context("Failed to read config file")?;
        self.profile = self.parse_profile(&content)?;
        Ok(())
    }

    fn parse_profile(&self, content: &str) -> Result<Profile> {
        let raw_yaml: YamlValue =
            serde_yaml::from_str(content).context("Initial YAML parse failed")?;

        let yaml_keys_merged = merge_keys_serde(raw_yaml)
            .map_err(|e| anyhow::anyhow!("Failed merge YAML keys: {e}"))?;

        let final_yaml_str = serde_yaml::to_string(&yaml_keys_merged)?;
        match serde_yaml::from_str(&final_yaml_str) {
            Ok(profile) => Ok(profile),
            Err(e) => {
                log::error!("{e:?}");
                if let Some(location) = e.location() {
                    self.print_config_read_error_context(
                        &final_yaml_str,
                        location.line().saturating_sub(5),
                        7,
                    );
                }
                bail!(e);
            }
        }
    }

    fn print_config_read_error_context(&self, src: &str, line0: usize, after: usize) {
        let end = line0.saturating_add(after);
        log::error!(" ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~ ");
        log::error!("... Context around erroneous config snippet: \n");
        for (i, line) in src.lines().enumerate().skip(line0) {
            if i > end {
                break;
            }
            log::error!("{:>6} | {}", i + 1, line);
        }
        log::error!(" ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~ ");
    }

    /// Collects every problem in the profile instead of stopping at the first.
    pub(crate) fn validate(&self) -> Result<Vec<String>> {
        let mut errors = Vec::new();

        let mut inputs = InputRegistry::new();
        let mut seen_inputs = HashSet::new();
        for name in &self.profile.inputs {
            if !seen_inputs.insert(name.as_str()) {
                errors.push(format!("Input '{name}' is declared more than once"));
            }
            inputs.register(name);
        }

        for (key, group_profile) in &self.profile.groups {
            if group_profile.kind == GroupKind::Tilt && group_profile.gate.is_some() {
                errors.push(format!(
                    "Group '{key}': tilt groups always use a square gate, remove 'gate'"
                ));
            }

            let group = Self::build_group(key, group_profile);
            for setting_key in group_profile.settings.keys() {
                if group.setting(setting_key).is_none() {
                    errors.push(format!(
                        "Group '{key}' references unknown setting '{setting_key}' \
                        (known: {})",
                        group
                            .settings()
                            .iter()
                            .map(|s| s.key())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ));
                }
            }

            for (role, expression) in &group_profile.bindings {
                if group.reference(role).is_none() {
                    errors.push(format!(
                        "Group '{key}' binds unknown control '{role}' (known: {})",
                        group.role_names().join(", ")
                    ));
                } else if let Err(e) = inputs.parse_expression(expression) {
                    errors.push(format!("Group '{key}', control '{role}': {e}"));
                }
            }

            for role in group_profile.ranges.keys() {
                if group.reference(role).is_none() {
                    errors.push(format!(
                        "Group '{key}' sets range of unknown control '{role}'"
                    ));
                }
            }
        }

        Ok(errors)
    }

    /// Builds the controller described by the profile. Fails on the first invalid entry;
    /// run `validate` beforehand to get the full list.
    pub(crate) fn build_controller(&self) -> Result<EmulatedController> {
        let mut inputs = InputRegistry::new();
        for name in &self.profile.inputs {
            inputs.register(name);
        }
        let mut controller = EmulatedController::new(inputs);

        for (key, group_profile) in &self.profile.groups {
            if !group_profile.enabled {
                log::warn!("Group '{key}' is not enabled, ignoring it.");
                continue;
            }
            let group = Self::build_group(key, group_profile);
            self.apply_group_profile(key, group_profile, group.as_ref(), controller.inputs())
                .with_context(|| format!("Failed to configure group '{key}'"))?;
            controller.add_group(key, group)?;
        }

        Ok(controller)
    }

    fn build_group(key: &str, group_profile: &GroupProfile) -> Arc<dyn ControlGroup> {
        let name = group_profile.name.as_deref().unwrap_or(key);
        match group_profile.kind {
            GroupKind::Tilt => Arc::new(Tilt::new(name)),
            GroupKind::Stick => Arc::new(Stick::new(
                name,
                group_profile
                    .gate
                    .unwrap_or(GroupProfile::DEFAULT_STICK_GATE),
            )),
        }
    }

    /// Writes settings, bindings and ranges through the group's public setters.
    pub(crate) fn apply_group_profile(
        &self,
        key: &str,
        group_profile: &GroupProfile,
        group: &dyn ControlGroup,
        inputs: &InputRegistry,
    ) -> Result<()> {
        if group_profile.kind != group.kind() {
            bail!(
                "Group '{key}' is a {} group, profile describes a {} group",
                group.kind(),
                group_profile.kind
            );
        }

        for (setting_key, value) in &group_profile.settings {
            let Some(setting) = group.setting(setting_key) else {
                bail!("Unknown setting '{setting_key}'");
            };
            let stored = setting.set_value(*value);
            if stored != *value {
                log::warn!(
                    "Group '{key}': {} = {value} is outside [{}, {}], clamped to {stored}.",
                    setting.details().label,
                    setting.min(),
                    setting.max()
                );
            } else if self.debug {
                log::debug!("Group '{key}': {} = {stored}", setting.details().label);
            }
        }

        for (role, text) in &group_profile.bindings {
            let Some(reference) = group.reference(role) else {
                bail!("Unknown control '{role}'");
            };
            let expression = inputs
                .parse_expression(text)
                .with_context(|| format!("Invalid binding for control '{role}'"))?;
            if self.debug {
                log::debug!("Group '{key}': {role} <- {expression}");
            }
            reference.bind(expression);
        }

        for (role, range) in &group_profile.ranges {
            let Some(reference) = group.reference(role) else {
                bail!("Unknown control '{role}'");
            };
            let stored = reference.range().set_value(*range);
            if stored != *range {
                log::warn!("Group '{key}': range of '{role}' clamped to {stored}.");
            }
        }

        Ok(())
    }

    pub(crate) fn poll_rate_hz(&self) -> u32 {
        POLL_RATE_RANGE.clamp(self.profile.global.poll_rate_hz)
    }
}
