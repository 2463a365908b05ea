//! Grid-based epidemic simulation.
//!
//! Agents live on a square grid, move around once a day and change
//! epidemiological state according to a configurable rule set. An
//! [`engine::Engine`] drives one simulation; [`observer::Observer`] lets a
//! driver follow every cell change and the end of every day.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod manager;
pub mod model;
pub mod movement;
pub mod neighborhood;
pub mod observer;
pub mod reproduction;
pub mod state;
pub mod stats;
pub mod status;
