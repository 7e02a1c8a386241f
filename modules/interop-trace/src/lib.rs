//! Causal event tracing across worker processes.
//!
//! Spans form a DAG: every span records the spans that caused it at creation
//! time. The `EventTracer` mints spans, keeps the latest span per
//! entity-component, links latent (multi-tick) operations to their
//! completions, and writes accepted records into a size-bounded sink.
//!
//! Ambient causality flows through a `CausalityStack`: while a layer is
//! active, every span created is implicitly caused by that layer's ids.

pub mod engine;
pub mod event;
pub mod reader;
pub mod sink;
pub mod span_id;
pub mod stack;
pub mod tracer;
pub mod user;

pub use engine::{AlwaysSample, ProbabilisticSampler, Sampler, TraceEngine, TraceRecord};
pub use event::TraceEvent;
pub use reader::TraceLog;
pub use sink::{BoundedSink, MemoryBuffer, SinkWrite};
pub use span_id::SpanId;
pub use stack::CausalityStack;
pub use tracer::{EventTracer, ScopedLayer};
