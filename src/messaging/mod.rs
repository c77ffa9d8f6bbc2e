//! # Messaging Layer
//!
//! Reliable, at-least-once ingestion of upstream domain events: durable
//! topology with dead-lettering, a bounded-prefetch consume loop with an
//! explicit reconnect strategy, and the broker-free dispatcher that maps
//! each delivery onto a cache mutation and an ack/reject decision.

pub mod dispatcher;
pub mod errors;
pub mod pipeline;
pub mod topology;

pub use dispatcher::{Disposition, EventDispatcher, ServiceCaches};
pub use errors::{MessagingError, MessagingResult};
pub use pipeline::{EventIngestionPipeline, PipelineState, PipelineStatsSnapshot};
pub use topology::{EventBinding, QueueTopology};
