//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`logging`]: Operation result, timing and outcome via `tracing` spans
//! - [`pipeline`]: Composes the layers around the store service

pub mod logging;
pub mod pipeline;

pub use logging::{LoggingLayer, LoggingService};
pub use pipeline::{build_dispatch_pipeline, DispatchPipeline};
