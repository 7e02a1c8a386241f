use std::sync::Arc;

use crate::types::{CommandRequestOp, CrossServerRpcParams};

/// Capability that turns command-request ops into RPCs and runs them.
pub trait RpcExecutor: Send + Sync {
    /// Extract an RPC from `op`, or `None` if the op is not one.
    ///
    /// Defaults to accepting requests on the cross-server endpoint.
    fn try_retrieve_params(&self, op: &CommandRequestOp) -> Option<CrossServerRpcParams> {
        op.is_cross_server_rpc()
            .then(|| CrossServerRpcParams::from_op(op))
    }

    /// Attempt execution. `false` means the target cannot be resolved yet.
    fn execute_command(&self, params: &CrossServerRpcParams) -> bool;
}

/// Executor backed by a plain function.
pub struct FnExecutor<F>(pub F);

impl<F> RpcExecutor for FnExecutor<F>
where
    F: Fn(&CrossServerRpcParams) -> bool + Send + Sync,
{
    fn execute_command(&self, params: &CrossServerRpcParams) -> bool {
        (self.0)(params)
    }
}

// Arc<X> blanket: lets tests keep a handle on the executor for assertions.
impl<X: RpcExecutor + ?Sized> RpcExecutor for Arc<X> {
    fn try_retrieve_params(&self, op: &CommandRequestOp) -> Option<CrossServerRpcParams> {
        (**self).try_retrieve_params(op)
    }

    fn execute_command(&self, params: &CrossServerRpcParams) -> bool {
        (**self).execute_command(params)
    }
}

impl<X: RpcExecutor + ?Sized> RpcExecutor for Box<X> {
    fn try_retrieve_params(&self, op: &CommandRequestOp) -> Option<CrossServerRpcParams> {
        (**self).try_retrieve_params(op)
    }

    fn execute_command(&self, params: &CrossServerRpcParams) -> bool {
        (**self).execute_command(params)
    }
}
