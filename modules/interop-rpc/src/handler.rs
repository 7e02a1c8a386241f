//! Per-entity FIFO admission of cross-server RPCs.

use std::collections::{HashMap, VecDeque};

use interop_common::EntityId;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::executor::RpcExecutor;
use crate::types::{CrossServerRpcParams, WorkerOp};

/// Pending RPCs for one entity, oldest first.
pub type RpcQueue = VecDeque<CrossServerRpcParams>;

/// Decides, per tick, whether each incoming RPC executes now, waits, or is a
/// duplicate of one already in flight.
///
/// For a given entity RPCs run in arrival order: once one is queued, later
/// arrivals queue behind it, and a retry that fails stops the entity's queue
/// from advancing. A repeat of a queued request is dropped until the queued
/// copy times out; after that it queues like any other arrival. Entity keys
/// exist only while their queue is non-empty.
pub struct CrossServerRpcHandler<X: RpcExecutor, C: Clock = SystemClock> {
    executor: X,
    clock: C,
    queued: HashMap<EntityId, RpcQueue>,
}

impl<X: RpcExecutor> CrossServerRpcHandler<X, SystemClock> {
    pub fn new(executor: X) -> Self {
        Self::with_clock(executor, SystemClock)
    }
}

impl<X: RpcExecutor, C: Clock> CrossServerRpcHandler<X, C> {
    pub fn with_clock(executor: X, clock: C) -> Self {
        Self {
            executor,
            clock,
            queued: HashMap::new(),
        }
    }

    /// Handle one tick's ops, then retry whatever has timed out.
    pub fn process_messages(&mut self, ops: &[WorkerOp]) {
        for op in ops {
            let WorkerOp::CommandRequest(request) = op else {
                continue;
            };
            if let Some(params) = self.executor.try_retrieve_params(request) {
                self.admit(params);
            }
        }

        self.retry_timed_out();
    }

    fn admit(&mut self, params: CrossServerRpcParams) {
        let entity_id = params.entity_id();
        let request_id = params.request_id;

        if let Some(queue) = self.queued.get_mut(&entity_id) {
            let now = self.clock.now();
            if queue
                .iter()
                .any(|q| q.request_id == request_id && !q.is_timed_out(now))
            {
                info!(entity_id, request_id, "RPC is already in flight");
                return;
            }

            debug!(entity_id, request_id, pending = queue.len(), "Queueing RPC behind earlier RPCs");
            queue.push_back(params);
            return;
        }

        if self.executor.execute_command(&params) {
            debug!(entity_id, request_id, "Executed RPC");
        } else {
            info!(entity_id, request_id, "Queueing RPC");
            self.queued.entry(entity_id).or_default().push_back(params);
        }
    }

    /// Walk each queue from the front, executing timed-out RPCs until one
    /// fails or has not timed out yet.
    fn retry_timed_out(&mut self) {
        let now = self.clock.now();
        let executor = &self.executor;

        self.queued.retain(|entity_id, queue| {
            while let Some(front) = queue.front() {
                if !front.is_timed_out(now) {
                    break;
                }
                if !executor.execute_command(front) {
                    debug!(entity_id = *entity_id, request_id = front.request_id, "Retried RPC still unresolved");
                    break;
                }
                info!(entity_id = *entity_id, request_id = front.request_id, "Executed queued RPC");
                queue.pop_front();
            }
            !queue.is_empty()
        });
    }

    /// Pending RPCs per entity.
    pub fn queued_rpcs(&self) -> &HashMap<EntityId, RpcQueue> {
        &self.queued
    }

    pub fn queued_count(&self, entity_id: EntityId) -> usize {
        self.queued.get(&entity_id).map(VecDeque::len).unwrap_or(0)
    }

    pub fn total_queued(&self) -> usize {
        self.queued.values().map(VecDeque::len).sum()
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
