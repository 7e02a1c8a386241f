//! Human-readable trace events and builders for the standard event types.

use interop_common::{EntityComponentId, EntityId, RequestId};

pub mod event_types {
    pub const SEND_RPC: &str = "interop.send_rpc";
    pub const PROCESS_RPC: &str = "interop.process_rpc";
    pub const SEND_PROPERTY_UPDATE: &str = "interop.send_property_update";
    pub const RECEIVE_PROPERTY_UPDATE: &str = "interop.receive_property_update";
    pub const MERGE_COMPONENT_UPDATE: &str = "interop.merge_component_update";
    pub const COMMAND_REQUEST: &str = "interop.command_request";
    pub const COMMAND_RESPONSE: &str = "interop.command_response";
    pub const COMPONENT_UPDATE: &str = "interop.component_update";
}

/// Field name the tracer stamps with the current frame number.
pub const FRAME_NUM_FIELD: &str = "frame_num";

/// Caller-composed event: free-text message and type plus string fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TraceEvent {
    pub event_type: String,
    pub message: String,
    pub data: Vec<(String, String)>,
}

impl TraceEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            message: String::new(),
            data: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.data.push((key.into(), value.to_string()));
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn with_target(self, id: EntityComponentId) -> Self {
        self.with_field("entity_id", id.entity_id)
            .with_field("component_id", id.component_id)
    }

    pub fn send_rpc(target: EntityComponentId, function: &str) -> Self {
        Self::new(event_types::SEND_RPC)
            .with_message("Sending RPC")
            .with_target(target)
            .with_field("function", function)
    }

    pub fn process_rpc(target: EntityComponentId, function: &str) -> Self {
        Self::new(event_types::PROCESS_RPC)
            .with_message("Processing RPC")
            .with_target(target)
            .with_field("function", function)
    }

    pub fn send_property_update(id: EntityComponentId, property: &str) -> Self {
        Self::new(event_types::SEND_PROPERTY_UPDATE)
            .with_message("Sending property update")
            .with_target(id)
            .with_field("property", property)
    }

    pub fn receive_property_update(id: EntityComponentId, property: &str) -> Self {
        Self::new(event_types::RECEIVE_PROPERTY_UPDATE)
            .with_message("Receiving property update")
            .with_target(id)
            .with_field("property", property)
    }

    /// Two writes to the same component converging.
    pub fn merge_component_update(id: EntityComponentId) -> Self {
        Self::new(event_types::MERGE_COMPONENT_UPDATE)
            .with_message("Merging component update")
            .with_target(id)
    }

    pub fn command_request(entity_id: EntityId, request_id: RequestId, command: &str) -> Self {
        Self::new(event_types::COMMAND_REQUEST)
            .with_message("Command request")
            .with_field("entity_id", entity_id)
            .with_field("request_id", request_id)
            .with_field("command", command)
    }

    pub fn command_response(entity_id: EntityId, request_id: RequestId, success: bool) -> Self {
        Self::new(event_types::COMMAND_RESPONSE)
            .with_message("Command response")
            .with_field("entity_id", entity_id)
            .with_field("request_id", request_id)
            .with_field("success", success)
    }

    pub fn component_update(id: EntityComponentId) -> Self {
        Self::new(event_types::COMPONENT_UPDATE)
            .with_message("Component update")
            .with_target(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_collects_fields_in_order() {
        let event = TraceEvent::new("custom")
            .with_message("hello")
            .with_field("a", 1)
            .with_field("b", "two");
        assert_eq!(event.event_type, "custom");
        assert_eq!(event.message, "hello");
        assert_eq!(
            event.data,
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "two".to_string())]
        );
    }

    #[test]
    fn merge_event_identifies_component() {
        let event = TraceEvent::merge_component_update(EntityComponentId::new(7, 42));
        assert_eq!(event.event_type, event_types::MERGE_COMPONENT_UPDATE);
        assert_eq!(event.field("entity_id"), Some("7"));
        assert_eq!(event.field("component_id"), Some("42"));
    }

    #[test]
    fn command_response_records_outcome() {
        let event = TraceEvent::command_response(3, 99, false);
        assert_eq!(event.field("request_id"), Some("99"));
        assert_eq!(event.field("success"), Some("false"));
    }
}
