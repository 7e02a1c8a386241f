//! String-keyed entry points for scripting surfaces, where span ids travel
//! as hex strings. Malformed ids are logged and ignored.

use interop_common::EntityComponentId;
use tracing::warn;

use crate::event::TraceEvent;
use crate::span_id::SpanId;
use crate::tracer::EventTracer;

fn parse_span(span_id: &str) -> Option<SpanId> {
    match SpanId::from_hex(span_id) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed span id");
            None
        }
    }
}

impl EventTracer {
    pub fn create_span_id_string(&mut self) -> Option<String> {
        self.create_span(&[]).map(|id| id.to_hex())
    }

    pub fn create_span_id_with_causes<S: AsRef<str>>(&mut self, causes: &[S]) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let causes: Vec<SpanId> = causes
            .iter()
            .filter_map(|c| parse_span(c.as_ref()))
            .collect();
        self.create_span(&causes).map(|id| id.to_hex())
    }

    pub fn trace_event_with_span_str(&mut self, span_id: &str, event: TraceEvent) {
        if !self.is_enabled() {
            return;
        }
        if let Some(id) = parse_span(span_id) {
            self.trace_event(event, Some(id));
        }
    }

    /// Run `f` with `span_id` as the ambient cause. `f` runs even when the id
    /// is malformed or tracing is off; only the layer is skipped.
    pub fn with_active_span_str<R>(
        &mut self,
        span_id: &str,
        f: impl FnOnce(&mut EventTracer) -> R,
    ) -> R {
        if !self.is_enabled() {
            return f(self);
        }
        match parse_span(span_id) {
            Some(id) => self.with_active_span(id, f),
            None => f(self),
        }
    }

    pub fn push_active_span(&mut self, span_id: &str) {
        if !self.is_enabled() {
            return;
        }
        if let Some(id) = parse_span(span_id) {
            self.push_active_layer([id]);
        }
    }

    pub fn pop_active_span(&mut self) {
        if self.is_enabled() {
            self.pop_active_layer();
        }
    }

    pub fn add_latent_span_str(&mut self, id: EntityComponentId, span_id: &str) {
        if !self.is_enabled() {
            return;
        }
        if let Some(span) = parse_span(span_id) {
            self.add_latent_span(id, span);
        }
    }
}
