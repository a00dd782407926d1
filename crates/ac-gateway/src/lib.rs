//! HTTP/WebSocket gateway: the duplex learner transport, the synchronous
//! tool interface, admin CLI, and the background sweeps that keep the
//! session store and registry clean (spec §6 "External Interfaces", §4.6).

pub mod api;
pub mod cli;
pub mod pruning;
pub mod state;
pub mod ws;
