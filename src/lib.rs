//! Desktop explorer for fire-smoke exposure scenarios over Equatorial Asia.
//!
//! The core (`layers`, `overlay`, `scenario`, `query`, `boundaries`,
//! `controller`) is UI independent; `app`, `map_view` and `charts` draw it
//! with egui.

pub mod about;
pub mod app;
pub mod boundaries;
pub mod charts;
pub mod config;
pub mod controller;
pub mod error;
pub mod geo;
pub mod layers;
pub mod map_view;
pub mod overlay;
pub mod query;
pub mod scenario;
pub mod telemetry;
