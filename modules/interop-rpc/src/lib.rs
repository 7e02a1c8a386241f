//! Cross-server RPC admission and ordering.
//!
//! Commands sent by workers that do not own the target entity arrive as
//! command-request ops. Each tick the handler executes what it can, queues
//! the rest per entity in arrival order, discards duplicates already in
//! flight, and retries queued commands once their timeout has elapsed.

pub mod clock;
pub mod executor;
pub mod handler;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use executor::{FnExecutor, RpcExecutor};
pub use handler::{CrossServerRpcHandler, RpcQueue};
pub use types::{CommandRequestOp, CrossServerRpcParams, ObjectRef, WorkerOp};
