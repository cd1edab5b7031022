#[macro_use]
pub mod control_types_macro;

pub mod common;
pub mod config;
pub mod control_group;
pub mod control_reference;
pub mod controller;
pub mod driver;
pub mod engine;
pub mod motion;
pub mod numeric_setting;
pub mod reshapable;
pub mod schemas;
pub mod stick;
pub mod stick_gate;
pub mod tilt;
