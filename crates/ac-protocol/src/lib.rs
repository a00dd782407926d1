//! Wire protocol: the duplex learner transport and the synchronous tool
//! interface (spec §6 "External Interfaces").
//!
//! `ac-gateway` serializes/deserializes these types directly over the
//! WebSocket and HTTP tool endpoints; `ac-pipeline` and `ac-signals` only
//! ever see the `ac_domain::model` types these messages carry.

pub mod tools;
pub mod transport;

pub use tools::{ToolRequest, ToolResponse};
pub use transport::WsMessage;
