//! Ops delivered by the view layer and the RPC records extracted from them.

use chrono::{DateTime, Duration, Utc};
use interop_common::{ComponentId, EntityId, RequestId};
use serde::{Deserialize, Serialize};

/// Endpoint component that carries server-to-server commands.
pub const CROSS_SERVER_ENDPOINT_COMPONENT_ID: ComponentId = 9985;

/// Command index of the RPC command on the endpoint component.
pub const CROSS_SERVER_RPC_COMMAND_INDEX: u32 = 1;

/// One incoming operation from a tick's view delta.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOp {
    AddEntity {
        entity_id: EntityId,
    },
    RemoveEntity {
        entity_id: EntityId,
    },
    ComponentUpdate {
        entity_id: EntityId,
        component_id: ComponentId,
    },
    CommandRequest(CommandRequestOp),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequestOp {
    pub entity_id: EntityId,
    pub request_id: RequestId,
    pub component_id: ComponentId,
    pub command_index: u32,
    pub timeout_millis: u32,
    pub received_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl CommandRequestOp {
    /// A request on the cross-server RPC endpoint.
    pub fn cross_server(
        entity_id: EntityId,
        request_id: RequestId,
        timeout_millis: u32,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            request_id,
            component_id: CROSS_SERVER_ENDPOINT_COMPONENT_ID,
            command_index: CROSS_SERVER_RPC_COMMAND_INDEX,
            timeout_millis,
            received_at,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_cross_server_rpc(&self) -> bool {
        self.component_id == CROSS_SERVER_ENDPOINT_COMPONENT_ID
            && self.command_index == CROSS_SERVER_RPC_COMMAND_INDEX
    }
}

/// Object an RPC is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub entity_id: EntityId,
    /// Sub-object offset within the entity. 0 is the entity's root object.
    pub offset: u32,
}

impl ObjectRef {
    pub fn entity(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            offset: 0,
        }
    }
}

/// A cross-server RPC awaiting execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossServerRpcParams {
    pub target: ObjectRef,
    pub request_id: RequestId,
    /// Arrival moment. Timeouts are measured from here, never from a retry.
    pub timestamp: DateTime<Utc>,
    pub timeout: Duration,
    pub payload: serde_json::Value,
}

impl CrossServerRpcParams {
    pub fn from_op(op: &CommandRequestOp) -> Self {
        Self {
            target: ObjectRef::entity(op.entity_id),
            request_id: op.request_id,
            timestamp: op.received_at,
            timeout: Duration::milliseconds(i64::from(op.timeout_millis)),
            payload: op.payload.clone(),
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.target.entity_id
    }

    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp >= self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_take_arrival_and_timeout_from_op() {
        let at = Utc::now();
        let op = CommandRequestOp::cross_server(5, 77, 250, at)
            .with_payload(serde_json::json!({"fn": "Fire"}));
        let params = CrossServerRpcParams::from_op(&op);

        assert_eq!(params.entity_id(), 5);
        assert_eq!(params.request_id, 77);
        assert_eq!(params.timestamp, at);
        assert_eq!(params.timeout, Duration::milliseconds(250));
        assert_eq!(params.payload["fn"], "Fire");
    }

    #[test]
    fn timeout_boundary_is_inclusive() {
        let at = Utc::now();
        let params = CrossServerRpcParams::from_op(&CommandRequestOp::cross_server(1, 1, 100, at));
        assert!(!params.is_timed_out(at + Duration::milliseconds(99)));
        assert!(params.is_timed_out(at + Duration::milliseconds(100)));
    }

    #[test]
    fn only_endpoint_commands_are_cross_server() {
        let mut op = CommandRequestOp::cross_server(1, 1, 0, Utc::now());
        assert!(op.is_cross_server_rpc());
        op.command_index = 2;
        assert!(!op.is_cross_server_rpc());
    }
}
