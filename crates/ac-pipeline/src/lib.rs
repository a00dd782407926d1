//! Session Pipeline and Adaptation Fan-out (spec §4.6-§4.7): wires the pure
//! signal/calculator/policy core from `ac-signals` into a bounded,
//! per-session concurrent pipeline, and delivers its output both to the
//! duplex transport and the synchronous tool interface.

pub mod core;
pub mod fanout;
pub mod pipeline;

pub use core::{PipelineCore, StepOutcome, WeightBands};
pub use fanout::{ChannelSink, DuplexSink, PipelineOutbound, RecordingSink, ToolRequestRouter};
pub use pipeline::{
    ConnectOutcome, ConnectRequest, InboundEvent, PipelineHandle, PipelineState, SessionPipelines,
};
