use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::broker::EventBroker;
use crate::error::FsError;
use crate::model::{Function, Package};
use crate::state::StateStore;

/// The live binding of a deployed function to its package and the shared
/// broker and state store.
///
/// `ctx` lives as long as the deployment: it is cancelled when the function
/// is deleted or replaced, which ends every event stream opened for it.
#[derive(Clone)]
pub struct Instance {
    ctx: CancellationToken,
    function: Function,
    package: Arc<Package>,
    broker: Arc<dyn EventBroker>,
    state: Arc<dyn StateStore>,
}

impl Instance {
    pub fn new(
        ctx: CancellationToken,
        function: Function,
        package: Arc<Package>,
        broker: Arc<dyn EventBroker>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            ctx,
            function,
            package,
            broker,
            state,
        }
    }

    pub fn context(&self) -> &CancellationToken {
        &self.ctx
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn event_broker(&self) -> &Arc<dyn EventBroker> {
        &self.broker
    }

    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.state
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("function", &self.function)
            .field("package", &self.package.name)
            .field("broker", &self.broker.backend_name())
            .field("state", &self.state.backend_name())
            .field("cancelled", &self.ctx.is_cancelled())
            .finish()
    }
}

/// A backend that executes deployed functions, selected by package type.
pub trait RuntimeAdapter: Send + Sync {
    fn deploy_function<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        instance: Arc<Instance>,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

    fn delete_function<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;
}
