//! Core business logic module

pub mod beacon;
pub mod composition;
pub mod configurator;
pub mod directory;
pub mod error;
pub mod events;
pub mod handoff;
pub mod input;
pub mod provisioner;
pub mod service;
pub mod types;
