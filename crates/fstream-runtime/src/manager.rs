use std::collections::HashMap;
use std::sync::Arc;

use fstream_core::{
    EventBroker, FsError, Function, Instance, PackageCatalog, RuntimeAdapter, StateStore,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::metrics::RuntimeMetrics;

/// Collaborators handed to a [`FunctionManager`].
pub struct ManagerConfig {
    /// package type → adapter
    pub runtimes: HashMap<String, Arc<dyn RuntimeAdapter>>,
    pub package_catalog: Arc<dyn PackageCatalog>,
    pub state_store: Arc<dyn StateStore>,
    pub event_broker: Arc<dyn EventBroker>,
}

/// Validates, binds and tracks function deployments.
///
/// `FunctionManager` is the source of truth for which functions are
/// deployed. Each deployed function gets an [`Instance`] whose context is a
/// child of the manager's root token; deleting or replacing the function
/// cancels it.
///
/// # Concurrency
///
/// Registry reads and writes are short critical sections; adapter calls run
/// outside the lock. Overlapping deploy/delete calls for the same name are
/// not serialized here and must be avoided by the caller.
pub struct FunctionManager {
    root: CancellationToken,
    runtimes: RwLock<HashMap<String, Arc<dyn RuntimeAdapter>>>,
    package_catalog: Arc<dyn PackageCatalog>,
    state_store: Arc<dyn StateStore>,
    event_broker: Arc<dyn EventBroker>,
    /// function name → instance
    instances: RwLock<HashMap<String, Arc<Instance>>>,
    metrics: Arc<RuntimeMetrics>,
}

impl FunctionManager {
    pub fn new(root: CancellationToken, config: ManagerConfig) -> Self {
        Self::with_metrics(root, config, Arc::new(RuntimeMetrics::new()))
    }

    pub fn with_metrics(
        root: CancellationToken,
        config: ManagerConfig,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        tracing::info!(
            runtimes = ?config.runtimes.keys().collect::<Vec<_>>(),
            packages = config.package_catalog.backend_name(),
            state = config.state_store.backend_name(),
            broker = config.event_broker.backend_name(),
            "Function manager created"
        );
        Self {
            root,
            runtimes: RwLock::new(config.runtimes),
            package_catalog: config.package_catalog,
            state_store: config.state_store,
            event_broker: config.event_broker,
            instances: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<RuntimeMetrics> {
        &self.metrics
    }

    /// Deploy `function`, replacing any deployment with the same name.
    ///
    /// On failure the registry is left as it was before the call.
    pub async fn deploy(&self, ctx: &CancellationToken, function: Function) -> Result<(), FsError> {
        let result = self.try_deploy(ctx, function).await;
        match &result {
            Ok(()) => self.metrics.record_deploy(),
            Err(_) => self.metrics.record_deploy_failed(),
        }
        result
    }

    async fn try_deploy(&self, ctx: &CancellationToken, function: Function) -> Result<(), FsError> {
        function.validate()?;

        let package = self.package_catalog.load(&function.package).await?;
        if package.name != function.package {
            return Err(FsError::PackageMismatch(format!(
                "catalog returned package {} for {}",
                package.name, function.package
            )));
        }
        if !package.has_module(&function.module) {
            return Err(FsError::PackageMismatch(format!(
                "module {} not found in package {}",
                function.module, package.name
            )));
        }

        let runtime = self
            .runtimes
            .read()
            .await
            .get(&package.package_type)
            .cloned()
            .ok_or_else(|| FsError::RuntimeNotFound(package.package_type.clone()))?;

        let name = function.name.clone();
        tracing::info!(
            function = %name,
            package = %package.name,
            module = %function.module,
            runtime = %package.package_type,
            "Deploying function"
        );

        let instance = Arc::new(Instance::new(
            self.root.child_token(),
            function,
            package,
            Arc::clone(&self.event_broker),
            Arc::clone(&self.state_store),
        ));
        let previous = self
            .instances
            .write()
            .await
            .insert(name.clone(), Arc::clone(&instance));

        if let Err(err) = runtime.deploy_function(ctx, Arc::clone(&instance)).await {
            instance.context().cancel();
            let mut instances = self.instances.write().await;
            let ours = instances
                .get(&name)
                .is_some_and(|current| Arc::ptr_eq(current, &instance));
            if ours {
                match previous {
                    Some(previous) => {
                        instances.insert(name.clone(), previous);
                    }
                    None => {
                        instances.remove(&name);
                    }
                }
            }
            tracing::warn!(function = %name, error = %err, "Deploy failed");
            return Err(err);
        }

        if let Some(previous) = previous {
            tracing::info!(function = %name, "Replaced previous deployment");
            previous.context().cancel();
        }
        Ok(())
    }

    /// Remove a deployed function. The registry entry is dropped only after
    /// the runtime has accepted the delete.
    pub async fn delete(&self, ctx: &CancellationToken, name: &str) -> Result<(), FsError> {
        let instance = self
            .instances
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::FunctionNotFound(name.to_string()))?;

        let package_type = &instance.package().package_type;
        let runtime = self
            .runtimes
            .read()
            .await
            .get(package_type)
            .cloned()
            .ok_or_else(|| FsError::RuntimeNotFound(package_type.clone()))?;

        tracing::info!(function = name, runtime = %package_type, "Deleting function");
        runtime.delete_function(ctx, name).await?;

        {
            let mut instances = self.instances.write().await;
            if instances
                .get(name)
                .is_some_and(|current| Arc::ptr_eq(current, &instance))
            {
                instances.remove(name);
            }
        }
        instance.context().cancel();
        self.metrics.record_delete();
        Ok(())
    }

    /// Deployed function names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn get(&self, name: &str) -> Option<Function> {
        self.instances
            .read()
            .await
            .get(name)
            .map(|instance| instance.function().clone())
    }

    /// Register (or replace) the adapter serving `package_type`.
    pub async fn register_runtime(&self, package_type: &str, runtime: Arc<dyn RuntimeAdapter>) {
        tracing::info!(runtime = package_type, "Registered runtime adapter");
        self.runtimes
            .write()
            .await
            .insert(package_type.to_string(), runtime);
    }

    pub async fn unregister_runtime(&self, package_type: &str) -> Option<Arc<dyn RuntimeAdapter>> {
        let removed = self.runtimes.write().await.remove(package_type);
        if removed.is_some() {
            tracing::info!(runtime = package_type, "Unregistered runtime adapter");
        }
        removed
    }

    /// Cancel every instance and forget all deployments. Runtimes are not
    /// notified.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Instance>> = self
            .instances
            .write()
            .await
            .drain()
            .map(|(_, instance)| instance)
            .collect();
        for instance in &drained {
            instance.context().cancel();
        }
        tracing::info!(functions = drained.len(), "Function manager shut down");
    }
}
