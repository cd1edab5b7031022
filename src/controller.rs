use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::common::ControlState;
use crate::control_group::ControlGroup;
use crate::control_reference::{Expression, InputCell};
use crate::reshapable::ReshapeData;

/// Named input cells a device backend writes into.
#[derive(Debug, Default)]
pub struct InputRegistry {
    cells: BTreeMap<String, Arc<InputCell>>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing cell when `name` is already registered.
    pub fn register(&mut self, name: &str) -> Arc<InputCell> {
        self.cells
            .entry(name.to_string())
            .or_insert_with(|| InputCell::new(name))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<InputCell>> {
        self.cells.get(name).cloned()
    }

    /// Stores `value` into the named cell; false if there is no such input.
    pub fn set(&self, name: &str, value: ControlState) -> bool {
        match self.cells.get(name) {
            Some(cell) => {
                cell.set(value);
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copies current values from `previous` for every name both registries declare.
    /// Returns how many cells were carried over.
    pub fn adopt_values(&self, previous: &InputRegistry) -> usize {
        self.cells
            .iter()
            .filter_map(|(name, cell)| previous.get(name).map(|old| cell.set(old.get())))
            .count()
    }

    pub fn parse_expression(&self, text: &str) -> Result<Expression> {
        Expression::parse(text, |name| self.get(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupState {
    pub raw: ReshapeData,
    pub shaped: ReshapeData,
}

/// Emulated device: the inputs it listens to and the groups it polls.
#[derive(Default)]
pub struct EmulatedController {
    inputs: InputRegistry,
    groups: Vec<(String, Arc<dyn ControlGroup>)>,
}

impl EmulatedController {
    pub fn new(inputs: InputRegistry) -> Self {
        Self {
            inputs,
            groups: Vec::new(),
        }
    }

    pub fn add_group(&mut self, key: &str, group: Arc<dyn ControlGroup>) -> Result<()> {
        if self.group(key).is_some() {
            bail!("Control group '{key}' is already defined");
        }
        self.groups.push((key.to_string(), group));
        Ok(())
    }

    pub fn group(&self, key: &str) -> Option<&Arc<dyn ControlGroup>> {
        self.groups.iter().find(|(k, _)| k == key).map(|(_, g)| g)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &Arc<dyn ControlGroup>)> {
        self.groups.iter().map(|(k, g)| (k.as_str(), g))
    }

    pub fn inputs(&self) -> &InputRegistry {
        &self.inputs
    }

    /// Polls every group in definition order into `out`, reusing its storage.
    pub fn poll_into(&self, out: &mut Vec<GroupState>) {
        out.clear();
        out.extend(self.groups.iter().map(|(_, group)| GroupState {
            raw: group.raw_state(),
            shaped: group.shaped_state(),
        }));
    }
}
