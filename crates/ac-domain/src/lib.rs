//! Shared types for the adaptation core: error taxonomy, structured trace
//! events, configuration, the clock/deadline service, and the data-model
//! entities that are not protocol-specific.

pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod trace;

pub use error::{Error, Result};
