//! Span bookkeeping for one worker.
//!
//! Constructed disabled. Enabling is one-way: once the engine is allocated it
//! stays until the tracer is dropped, at which point it is disabled and the
//! sink closed exactly once. Every operation on a disabled tracer is a silent
//! no-op so simulation code can call into it unconditionally.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use chrono::{DateTime, Utc};
use interop_common::{EntityComponentId, InteropError, TracingConfig};
use tracing::info;

use crate::engine::{sampler_for, Sampler, TraceEngine, TraceRecord};
use crate::event::{TraceEvent, FRAME_NUM_FIELD};
use crate::sink::BoundedSink;
use crate::span_id::SpanId;
use crate::stack::CausalityStack;

pub struct EventTracer {
    engine: Option<TraceEngine>,
    /// Ambient causes for spans created while a layer is active.
    active: CausalityStack,
    /// Latest span per component. Causally dominates every write applied to it.
    latest: HashMap<EntityComponentId, SpanId>,
    /// Outstanding latent operations. No empty stacks are kept.
    latent: HashMap<EntityComponentId, CausalityStack>,
    frame: u64,
}

impl EventTracer {
    pub fn disabled() -> Self {
        Self {
            engine: None,
            active: CausalityStack::new(),
            latest: HashMap::new(),
            latent: HashMap::new(),
            frame: 0,
        }
    }

    /// Build a tracer for `worker_id`, enabled when the config says so.
    pub fn new(worker_id: &str, config: &TracingConfig) -> Self {
        let mut tracer = Self::disabled();
        if config.enabled {
            let file_name = trace_file_name(&config.file_prefix, worker_id, Utc::now());
            let sink =
                BoundedSink::open_file(&config.trace_dir, &file_name, config.max_file_size_bytes);
            tracer.start(TraceEngine::new(
                sink,
                sampler_for(config.sampling_probability),
            ));
        }
        tracer
    }

    /// Enabled tracer writing into an arbitrary sink.
    pub fn with_sink(sink: BoundedSink, sampler: Box<dyn Sampler>) -> Self {
        let mut tracer = Self::disabled();
        tracer.start(TraceEngine::new(sink, sampler));
        tracer
    }

    fn start(&mut self, mut engine: TraceEngine) {
        engine.enable();
        self.engine = Some(engine);
        info!("Event tracing enabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.is_some()
    }

    // -----------------------------------------------------------------------
    // Spans and events
    // -----------------------------------------------------------------------

    /// Mint a span caused by `causes` plus the active ambient layer.
    ///
    /// With neither, the span is a root. Empty ids and repeats are ignored.
    pub fn create_span(&mut self, causes: &[SpanId]) -> Option<SpanId> {
        let engine = self.engine.as_mut()?;

        let mut effective: Vec<SpanId> = Vec::with_capacity(causes.len() + 1);
        for id in causes.iter().chain(self.active.top_layer()) {
            if !id.is_empty() && !effective.contains(id) {
                effective.push(*id);
            }
        }

        Some(engine.add_span(&effective))
    }

    /// Record `event` against `span_id`, subject to sampling.
    pub fn trace_event(&mut self, event: TraceEvent, span_id: Option<SpanId>) {
        let Some(span_id) = span_id else {
            return;
        };
        let frame = self.frame;
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if !engine.should_sample_event(span_id, &event) {
            return;
        }

        let mut data = event.data;
        data.push((FRAME_NUM_FIELD.to_string(), frame.to_string()));

        engine.add_event(TraceRecord::Event {
            span_id,
            unix_timestamp_millis: 0,
            message: event.message,
            event_type: event.event_type,
            data,
        });
    }

    // -----------------------------------------------------------------------
    // Per-component spans
    // -----------------------------------------------------------------------

    /// Remember the span that created a component. First write wins.
    pub fn add_component(&mut self, id: EntityComponentId, span_id: SpanId) {
        if !self.is_enabled() || span_id.is_empty() {
            return;
        }
        self.latest.entry(id).or_insert(span_id);
    }

    pub fn remove_component(&mut self, id: EntityComponentId) {
        self.latest.remove(&id);
    }

    /// Join an incoming write with the stored span.
    ///
    /// The stored span becomes a merge span caused by both, and a merge event
    /// is traced against it.
    ///
    /// # Panics
    ///
    /// If no span was recorded for `id` via [`EventTracer::add_component`].
    pub fn update_component(&mut self, id: EntityComponentId, span_id: SpanId) {
        if span_id.is_empty() {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let Some(previous) = self.latest.get(&id).copied() else {
            panic!("update_component called for {id} with no recorded span");
        };

        let causes = if previous == span_id {
            vec![span_id]
        } else {
            vec![span_id, previous]
        };
        let merge = engine.add_span(&causes);

        self.trace_event(TraceEvent::merge_component_update(id), Some(merge));
        self.latest.insert(id, merge);
    }

    /// Latest span for a component, or `None` while tracing is disabled.
    ///
    /// # Panics
    ///
    /// If tracing is enabled and no span was recorded for `id`.
    pub fn get_span_id(&self, id: EntityComponentId) -> Option<SpanId> {
        if !self.is_enabled() {
            return None;
        }
        match self.latest.get(&id) {
            Some(span_id) => Some(*span_id),
            None => panic!("get_span_id called for {id} with no recorded span"),
        }
    }

    /// Like [`EventTracer::get_span_id`], reporting a missing entry as an error.
    pub fn try_get_span_id(&self, id: EntityComponentId) -> Result<Option<SpanId>, InteropError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        self.latest
            .get(&id)
            .copied()
            .map(Some)
            .ok_or(InteropError::UnknownComponent(id))
    }

    // -----------------------------------------------------------------------
    // Latent operations
    // -----------------------------------------------------------------------

    /// Remember an outstanding operation on `id` so its completion can be
    /// linked back to it.
    pub fn add_latent_span(&mut self, id: EntityComponentId, span_id: SpanId) {
        if !self.is_enabled() {
            return;
        }
        let stack = self.latent.entry(id).or_default();
        if !stack.add_to_top(span_id) {
            stack.push_layer([span_id]);
        }
    }

    /// Open a new latent layer for `id`; later additions go to it.
    pub fn push_latent_layer(
        &mut self,
        id: EntityComponentId,
        initial: impl IntoIterator<Item = SpanId>,
    ) {
        if !self.is_enabled() {
            return;
        }
        self.latent.entry(id).or_default().push_layer(initial);
    }

    /// Pop the most recent latent layer for `id`.
    pub fn pop_latent_spans(&mut self, id: EntityComponentId) -> Vec<SpanId> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let Some(stack) = self.latent.get_mut(&id) else {
            return Vec::new();
        };

        let spans = stack.pop_layer();
        if !stack.has_layer() {
            self.latent.remove(&id);
        }
        spans
    }

    pub fn has_latent_spans(&self, id: EntityComponentId) -> bool {
        self.latent.contains_key(&id)
    }

    // -----------------------------------------------------------------------
    // Ambient causality
    // -----------------------------------------------------------------------

    pub fn push_active_layer(&mut self, causes: impl IntoIterator<Item = SpanId>) {
        if self.is_enabled() {
            self.active.push_layer(causes);
        }
    }

    pub fn pop_active_layer(&mut self) -> Vec<SpanId> {
        self.active.pop_layer()
    }

    /// Add a cause to the active layer. Returns `false` when none is active.
    pub fn add_active_cause(&mut self, span_id: SpanId) -> bool {
        self.is_enabled() && self.active.add_to_top(span_id)
    }

    pub fn active_layer(&self) -> &[SpanId] {
        self.active.top_layer()
    }

    /// Push a layer that is popped when the returned guard drops, on every
    /// exit path. The guard dereferences to the tracer.
    pub fn scoped(&mut self, causes: impl IntoIterator<Item = SpanId>) -> ScopedLayer<'_> {
        let depth = self.active.depth();
        self.push_active_layer(causes);
        ScopedLayer {
            tracer: self,
            depth,
        }
    }

    /// Run `f` with `span_id` as the ambient cause.
    pub fn with_active_span<R>(
        &mut self,
        span_id: SpanId,
        f: impl FnOnce(&mut EventTracer) -> R,
    ) -> R {
        let mut scope = self.scoped([span_id]);
        f(&mut scope)
    }

    // -----------------------------------------------------------------------
    // Frame counter and sink access
    // -----------------------------------------------------------------------

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn advance_frame(&mut self) -> u64 {
        self.frame += 1;
        self.frame
    }

    pub fn bytes_written(&self) -> u64 {
        self.engine
            .as_ref()
            .map(|e| e.sink().bytes_written())
            .unwrap_or(0)
    }

    pub fn trace_path(&self) -> Option<&Path> {
        self.engine.as_ref().and_then(|e| e.sink().path())
    }

    pub fn flush(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.flush();
        }
    }
}

impl Default for EventTracer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Drop for EventTracer {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            info!("Event tracing disabled");
            engine.disable();
        }
    }
}

impl std::fmt::Debug for EventTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTracer")
            .field("engine", &self.engine)
            .field("active_depth", &self.active.depth())
            .field("components", &self.latest.len())
            .field("latent", &self.latent.len())
            .field("frame", &self.frame)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ScopedLayer
// ---------------------------------------------------------------------------

/// Guard for one ambient layer. Dropping it pops the layer along with any
/// layers pushed above it and left unbalanced.
pub struct ScopedLayer<'a> {
    tracer: &'a mut EventTracer,
    depth: usize,
}

impl Deref for ScopedLayer<'_> {
    type Target = EventTracer;

    fn deref(&self) -> &EventTracer {
        self.tracer
    }
}

impl DerefMut for ScopedLayer<'_> {
    fn deref_mut(&mut self) -> &mut EventTracer {
        self.tracer
    }
}

impl Drop for ScopedLayer<'_> {
    fn drop(&mut self) {
        self.tracer.active.truncate(self.depth);
    }
}

/// `<prefix>_<worker>_<timestamp>.trace`, with path-hostile characters in the
/// worker id replaced.
pub fn trace_file_name(prefix: &str, worker_id: &str, at: DateTime<Utc>) -> String {
    let worker: String = worker_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{prefix}_{worker}_{}.trace", at.format("%Y.%m.%d-%H.%M.%S"))
}
