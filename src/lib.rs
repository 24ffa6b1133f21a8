//! Off-grid solar/battery channel controller.
//!
//! The [`budget`] module decides which downstream channels the battery and
//! live solar output can sustain; everything else wires that decision to
//! sensor storage, relay hardware and an HTTP API.

pub mod api;
pub mod auth;
pub mod budget;
pub mod config;
pub mod controller;
pub mod domain;
pub mod events;
pub mod forecast;
pub mod hardware;
pub mod repo;
pub mod telemetry;
