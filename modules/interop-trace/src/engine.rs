//! The trace engine: mints spans, decides sampling, and serializes records
//! into the bounded sink as newline-delimited JSON.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::event::TraceEvent;
use crate::sink::{BoundedSink, SinkWrite};
use crate::span_id::SpanId;

/// One persisted trace record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceRecord {
    Span {
        id: SpanId,
        causes: Vec<SpanId>,
    },
    Event {
        span_id: SpanId,
        /// Left at zero; wall-clock time is not recorded at this layer.
        unix_timestamp_millis: u64,
        message: String,
        #[serde(rename = "type")]
        event_type: String,
        /// Written as a JSON object in insertion order. Repeated keys are kept.
        #[serde(with = "ordered_fields")]
        data: Vec<(String, String)>,
    },
}

impl TraceRecord {
    /// Serialized size in bytes, including the record separator.
    pub fn encoded(&self) -> serde_json::Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

mod ordered_fields {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        fields: &[(String, String)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, String)>, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of string fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fields = Vec::new();
                while let Some(entry) = access.next_entry::<String, String>()? {
                    fields.push(entry);
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Decides whether an event is recorded at all.
pub trait Sampler: Send {
    fn should_sample(&self, span_id: SpanId, event: &TraceEvent) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSample;

impl Sampler for AlwaysSample {
    fn should_sample(&self, _span_id: SpanId, _event: &TraceEvent) -> bool {
        true
    }
}

/// Keeps each event independently with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct ProbabilisticSampler {
    probability: f64,
}

impl ProbabilisticSampler {
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Sampler for ProbabilisticSampler {
    fn should_sample(&self, _span_id: SpanId, _event: &TraceEvent) -> bool {
        rand::rng().random_bool(self.probability)
    }
}

/// Sampler for a configured probability.
pub fn sampler_for(probability: f64) -> Box<dyn Sampler> {
    if probability >= 1.0 {
        Box::new(AlwaysSample)
    } else {
        Box::new(ProbabilisticSampler::new(probability))
    }
}

// ---------------------------------------------------------------------------
// TraceEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Created,
    Enabled,
    Disabled,
}

pub struct TraceEngine {
    sink: BoundedSink,
    sampler: Box<dyn Sampler>,
    state: EngineState,
}

impl TraceEngine {
    pub fn new(sink: BoundedSink, sampler: Box<dyn Sampler>) -> Self {
        Self {
            sink,
            sampler,
            state: EngineState::Created,
        }
    }

    pub fn enable(&mut self) {
        if self.state == EngineState::Created {
            self.state = EngineState::Enabled;
        }
    }

    /// Stop recording and close the sink. Later calls are no-ops.
    pub fn disable(&mut self) {
        if self.state != EngineState::Disabled {
            self.state = EngineState::Disabled;
            self.sink.close();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state == EngineState::Enabled
    }

    /// Mint a span caused by exactly `causes` and record it.
    pub fn add_span(&mut self, causes: &[SpanId]) -> SpanId {
        let id = SpanId::generate();
        if self.is_enabled() {
            self.write(&TraceRecord::Span {
                id,
                causes: causes.to_vec(),
            });
        }
        id
    }

    pub fn should_sample_event(&self, span_id: SpanId, event: &TraceEvent) -> bool {
        self.is_enabled() && self.sampler.should_sample(span_id, event)
    }

    /// Record an event that has already passed sampling.
    pub fn add_event(&mut self, record: TraceRecord) {
        if self.is_enabled() {
            self.write(&record);
        }
    }

    pub fn sink(&self) -> &BoundedSink {
        &self.sink
    }

    pub fn flush(&mut self) {
        self.sink.flush();
    }

    fn write(&mut self, record: &TraceRecord) {
        match record.encoded() {
            Ok(bytes) => {
                if self.sink.write_record(&bytes) == SinkWrite::Dropped {
                    debug!(size = bytes.len(), "Trace record dropped");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize trace record"),
        }
    }
}

impl std::fmt::Debug for TraceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceEngine")
            .field("sink", &self.sink)
            .field("state", &self.state)
            .finish()
    }
}
