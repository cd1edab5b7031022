use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::str::FromStr;
use std::time::Instant;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::common::ControlState;
use crate::controller::{EmulatedController, GroupState};
use crate::motion::{TiltAngles, TiltMotion};

/// A single `name=value` write coming from the device feed.
#[derive(Debug, Clone, PartialEq)]
pub struct InputUpdate {
    pub name: String,
    pub value: ControlState,
}

impl FromStr for InputUpdate {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let Some((name, value)) = line.split_once('=') else {
            bail!("Expected 'input=value', got '{line}'");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("Missing input name in '{line}'");
        }
        let value = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for input '{name}'"))?;
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

pub struct PollingEngine {
    controller: EmulatedController,
    poll_rate_hz: u32,
    debug: bool,
    states: Vec<GroupState>,
    previous_states: Vec<GroupState>,
    motions: Vec<Option<TiltMotion>>,
    last_tick: Option<Instant>,
}

impl PollingEngine {
    pub fn new(controller: EmulatedController, poll_rate_hz: u32, debug: bool) -> Self {
        let motions = controller
            .groups()
            .map(|(_, group)| group.as_tilt().map(|_| TiltMotion::new()))
            .collect();
        Self {
            controller,
            poll_rate_hz,
            debug,
            states: Vec::new(),
            previous_states: Vec::new(),
            motions,
            last_tick: None,
        }
    }

    pub fn controller(&self) -> &EmulatedController {
        &self.controller
    }

    pub fn group_count(&self) -> usize {
        self.motions.len()
    }

    /// Shaped state of every group as of the last tick, in definition order.
    pub fn states(&self) -> &[GroupState] {
        &self.states
    }

    pub fn tilt_angles(&self, key: &str) -> Option<TiltAngles> {
        self.controller
            .groups()
            .zip(&self.motions)
            .find(|((k, _), _)| *k == key)
            .and_then(|(_, motion)| motion.as_ref().map(TiltMotion::angles))
    }

    pub async fn run(
        &mut self,
        updates: &mut mpsc::UnboundedReceiver<InputUpdate>,
    ) -> Result<()> {
        let mut ticker = interval(Duration::from_secs_f64(1.0 / self.poll_rate_hz as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Polling engine running at {} Hz", self.poll_rate_hz);

        loop {
            select! {
                Some(update) = updates.recv() => {
                    self.apply_update(&update);
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let dt = self
                        .last_tick
                        .map_or(0.0, |last| now.duration_since(last).as_secs_f64());
                    self.last_tick = Some(now);
                    self.process_tick(dt);
                }
            }
        }
    }

    pub fn apply_update(&self, update: &InputUpdate) {
        if !self.controller.inputs().set(&update.name, update.value) {
            warn!(
                "Input '{}' is not declared in the profile, ignoring it.",
                update.name
            );
        } else if self.debug {
            debug!("{} = {}", update.name, update.value);
        }
    }

    /// Polls every group once and advances the emulated tilt motion by `dt` seconds.
    pub fn process_tick(&mut self, dt: f64) {
        std::mem::swap(&mut self.states, &mut self.previous_states);
        self.controller.poll_into(&mut self.states);

        for (i, ((key, group), motion)) in self
            .controller
            .groups()
            .zip(self.motions.iter_mut())
            .enumerate()
        {
            if let (Some(motion), Some(tilt)) = (motion.as_mut(), group.as_tilt()) {
                motion.update(tilt, dt);
            }

            let state = self.states[i];
            if self.previous_states.get(i) != Some(&state) {
                debug!(
                    "{key}: raw ({:.4}, {:.4}) -> shaped ({:.4}, {:.4})",
                    state.raw.x, state.raw.y, state.shaped.x, state.shaped.y
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_group::ControlGroup;
    use crate::controller::InputRegistry;
    use crate::reshapable::ReshapeData;
    use crate::stick::Stick;
    use crate::stick_gate::GateShape;
    use crate::tilt::Tilt;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn engine() -> PollingEngine {
        let mut inputs = InputRegistry::new();
        for name in ["key_w", "pad_right"] {
            inputs.register(name);
        }
        let mut controller = EmulatedController::new(inputs);
        let stick = Arc::new(Stick::new("Stick", GateShape::Square));
        stick
            .reference("Right")
            .unwrap()
            .bind(controller.inputs().parse_expression("pad_right").unwrap());
        let tilt = Arc::new(Tilt::new("Tilt"));
        tilt.reference("Forward")
            .unwrap()
            .bind(controller.inputs().parse_expression("key_w").unwrap());
        controller.add_group("stick", stick).unwrap();
        controller.add_group("tilt", tilt).unwrap();
        PollingEngine::new(controller, 200, false)
    }

    #[test]
    fn test_parse_input_update() {
        assert_eq!(
            " key_w = 0.75 ".parse::<InputUpdate>().unwrap(),
            InputUpdate {
                name: "key_w".to_string(),
                value: 0.75
            }
        );
        assert!("key_w".parse::<InputUpdate>().is_err());
        assert!("=1".parse::<InputUpdate>().is_err());
        assert!("key_w=full".parse::<InputUpdate>().is_err());
    }

    #[test]
    fn test_motion_only_for_tilt_groups() {
        let engine = engine();
        assert_eq!(engine.group_count(), 2);
        assert!(engine.tilt_angles("stick").is_none());
        assert_eq!(engine.tilt_angles("tilt"), Some(TiltAngles::default()));
        assert!(engine.tilt_angles("missing").is_none());
    }

    #[test]
    fn test_tick_polls_and_moves() {
        let mut engine = engine();
        engine.apply_update(&"pad_right=1".parse().unwrap());
        engine.apply_update(&"key_w=1".parse().unwrap());
        engine.apply_update(&"unknown=1".parse().unwrap());

        for _ in 0..400 {
            engine.process_tick(1.0 / 200.0);
        }
        assert_eq!(engine.states().len(), 2);
        assert_eq!(engine.states()[0].shaped, ReshapeData::new(1.0, 0.0));
        assert!((engine.states()[1].shaped.y - 85.0 / 180.0).abs() < 1e-9);

        let angles = engine.tilt_angles("tilt").unwrap();
        assert!((angles.pitch - 85.0_f64.to_radians()).abs() < 1e-9);
        assert_eq!(engine.controller().inputs().len(), 2);
    }

    #[tokio::test]
    async fn test_run_consumes_updates() {
        let mut engine = engine();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("pad_right=0.5".parse().unwrap()).unwrap();

        let result =
            tokio::time::timeout(Duration::from_millis(100), engine.run(&mut rx)).await;
        assert!(result.is_err(), "engine only stops when cancelled");
        assert!(!engine.states().is_empty());
        assert_eq!(engine.states()[0].shaped, ReshapeData::new(0.5, 0.0));
    }
}
