use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fstream_core::{FsError, Instance, Record, RuntimeAdapter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::AdapterConfig;
use super::protocol::{EventMessage, FunctionDescriptor, FunctionEvent};
use crate::metrics::RuntimeMetrics;

/// A live worker claim. Every module the worker claimed maps to a clone of
/// the same registration.
#[derive(Clone)]
struct Registration {
    id: u64,
    service_id: String,
    delivery: mpsc::Sender<FunctionEvent>,
    ctx: CancellationToken,
}

#[derive(Default)]
struct AdapterState {
    /// function name → instance
    instances: HashMap<String, Arc<Instance>>,
    /// module name → owning registration
    services: HashMap<String, Registration>,
}

fn lock(state: &Mutex<AdapterState>) -> MutexGuard<'_, AdapterState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bridges the deployment manager and the event broker to workers running
/// in other processes.
///
/// Workers claim module names through [`on_event`](Self::on_event) and
/// receive deploy/delete notifications for them. Once a function is
/// deployed, its worker moves data with [`read`](Self::read),
/// [`write`](Self::write) and [`commit`](Self::commit), addressing the
/// instance by function name.
///
/// The adapter keeps its own function-name → instance map, populated by
/// deploy and cleared by delete, so it never calls back into the manager.
pub struct ExternalAdapter {
    config: AdapterConfig,
    state: Arc<Mutex<AdapterState>>,
    next_registration: AtomicU64,
    metrics: Arc<RuntimeMetrics>,
}

impl ExternalAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self::with_metrics(config, Arc::new(RuntimeMetrics::new()))
    }

    pub fn with_metrics(config: AdapterConfig, metrics: Arc<RuntimeMetrics>) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(AdapterState::default())),
            next_registration: AtomicU64::new(1),
            metrics,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<RuntimeMetrics> {
        &self.metrics
    }

    /// Register a worker for `modules` and return its notification stream.
    ///
    /// The claim is all-or-nothing: if any module is already held by a live
    /// registration the call fails with [`FsError::AlreadyClaimed`] and
    /// nothing is claimed. The claim lasts until `ctx` is cancelled or the
    /// returned receiver is dropped.
    pub fn on_event(
        &self,
        ctx: CancellationToken,
        service_id: &str,
        mut modules: Vec<String>,
    ) -> Result<mpsc::Receiver<FunctionEvent>, FsError> {
        if modules.is_empty() {
            return Err(FsError::Protocol(
                "registration must claim at least one module".into(),
            ));
        }
        modules.sort();
        modules.dedup();

        let id = self.next_registration.fetch_add(1, Ordering::Relaxed);
        let (delivery_tx, delivery_rx) = mpsc::channel(self.config.delivery_buffer.max(1));
        let registration_ctx = ctx.child_token();
        {
            let mut state = lock(&self.state);
            if let Some(taken) = modules.iter().find(|m| state.services.contains_key(*m)) {
                tracing::warn!(
                    adapter = %self.config.name,
                    service_id,
                    module = %taken,
                    "Module already claimed"
                );
                return Err(FsError::AlreadyClaimed(taken.clone()));
            }
            let registration = Registration {
                id,
                service_id: service_id.to_string(),
                delivery: delivery_tx,
                ctx: registration_ctx.clone(),
            };
            for module in &modules {
                state.services.insert(module.clone(), registration.clone());
            }
        }

        self.metrics.record_registration();
        tracing::info!(
            adapter = %self.config.name,
            service_id,
            registration = id,
            modules = ?modules,
            "Worker registered"
        );

        let (out_tx, out_rx) = mpsc::channel(self.config.stream_buffer.max(1));
        let guard = RegistrationGuard {
            state: Arc::clone(&self.state),
            id,
            service_id: service_id.to_string(),
            modules,
            ctx: registration_ctx,
            metrics: Arc::clone(&self.metrics),
        };
        tokio::spawn(dispatch(guard, delivery_rx, out_tx));
        Ok(out_rx)
    }

    async fn deploy(&self, ctx: &CancellationToken, instance: Arc<Instance>) -> Result<(), FsError> {
        let function = instance.function();
        let event = FunctionEvent::Deploy {
            function: FunctionDescriptor::from(function),
        };

        let (registration, previous) = {
            let mut state = lock(&self.state);
            let registration = state
                .services
                .get(&function.module)
                .cloned()
                .ok_or_else(|| FsError::ModuleNotFound(function.module.clone()))?;
            let previous = state
                .instances
                .insert(function.name.clone(), Arc::clone(&instance));
            (registration, previous)
        };

        tracing::info!(
            adapter = %self.config.name,
            function = %function.name,
            module = %function.module,
            service_id = %registration.service_id,
            "Deploying function to worker"
        );

        if let Err(err) = send_to(ctx, &registration, event).await {
            let mut state = lock(&self.state);
            let ours = state
                .instances
                .get(&function.name)
                .is_some_and(|current| Arc::ptr_eq(current, &instance));
            if ours {
                match previous {
                    Some(previous) => {
                        state.instances.insert(function.name.clone(), previous);
                    }
                    None => {
                        state.instances.remove(&function.name);
                    }
                }
            }
            tracing::warn!(
                adapter = %self.config.name,
                function = %function.name,
                error = %err,
                "Deploy notification not delivered"
            );
            return Err(err);
        }
        Ok(())
    }

    async fn delete(&self, ctx: &CancellationToken, name: &str) -> Result<(), FsError> {
        // The owner of a function is not tracked, only the owner of each
        // module, so every live registration is told once.
        let registrations: Vec<Registration> = {
            let state = lock(&self.state);
            let mut seen = HashSet::new();
            state
                .services
                .values()
                .filter(|r| seen.insert(r.id))
                .cloned()
                .collect()
        };

        tracing::info!(
            adapter = %self.config.name,
            function = name,
            workers = registrations.len(),
            "Broadcasting function delete"
        );

        for registration in &registrations {
            let event = FunctionEvent::Delete {
                function_name: name.to_string(),
            };
            match send_to(ctx, registration, event).await {
                Ok(()) => {}
                Err(FsError::Cancelled) => return Err(FsError::Cancelled),
                Err(_) => {
                    tracing::debug!(
                        service_id = %registration.service_id,
                        function = name,
                        "Skipping released registration"
                    );
                }
            }
        }

        lock(&self.state).instances.remove(name);
        Ok(())
    }

    fn resolve(&self, function_name: &str) -> Result<Arc<Instance>, FsError> {
        lock(&self.state)
            .instances
            .get(function_name)
            .cloned()
            .ok_or_else(|| FsError::Unavailable(function_name.to_string()))
    }

    /// Stream the events arriving on the function's source topics.
    ///
    /// The stream ends when `ctx` is cancelled, the function is deleted or
    /// replaced, or the returned receiver is dropped.
    pub async fn read(
        &self,
        ctx: CancellationToken,
        function_name: &str,
    ) -> Result<mpsc::Receiver<EventMessage>, FsError> {
        let instance = self.resolve(function_name)?;
        let stream_ctx = instance.context().child_token();
        let guard = stream_ctx.clone().drop_guard();

        let linked = stream_ctx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = ctx.cancelled() => linked.cancel(),
                _ = linked.cancelled() => {}
            }
        });

        let mut records = instance
            .event_broker()
            .read(stream_ctx.clone(), &instance.function().sources)
            .await?;

        let (tx, rx) = mpsc::channel(self.config.stream_buffer.max(1));
        let metrics = Arc::clone(&self.metrics);
        let name = function_name.to_string();
        tracing::debug!(function = %name, "Event stream opened");
        tokio::spawn(async move {
            let _guard = guard;
            loop {
                let record = tokio::select! {
                    _ = stream_ctx.cancelled() => break,
                    _ = tx.closed() => break,
                    record = records.recv() => match record {
                        Some(record) => record,
                        None => break,
                    },
                };
                metrics.record_event_read();
                let message = EventMessage::from(&record);
                tokio::select! {
                    _ = stream_ctx.cancelled() => break,
                    res = tx.send(message) => {
                        if res.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(function = %name, "Event stream closed");
        });
        Ok(rx)
    }

    /// Publish `payload` to the function's sink topic and wait until the
    /// broker has committed it.
    pub async fn write(
        &self,
        ctx: &CancellationToken,
        function_name: &str,
        payload: Vec<u8>,
    ) -> Result<(), FsError> {
        let instance = self.resolve(function_name)?;
        let record = Record::new(payload);
        let mut observer = record.observer();
        instance
            .event_broker()
            .write(ctx, record, &instance.function().sink)
            .await?;

        let committed = tokio::select! {
            _ = ctx.cancelled() => return Err(FsError::Cancelled),
            committed = observer.committed() => committed,
        };
        if !committed {
            return Err(FsError::BrokerClosed);
        }
        self.metrics.record_event_written();
        Ok(())
    }

    pub async fn commit(
        &self,
        ctx: &CancellationToken,
        function_name: &str,
        event_id: &str,
    ) -> Result<(), FsError> {
        let instance = self.resolve(function_name)?;
        instance.event_broker().commit(ctx, event_id).await?;
        self.metrics.record_commit();
        Ok(())
    }

    pub async fn put_state(
        &self,
        function_name: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), FsError> {
        let instance = self.resolve(function_name)?;
        instance.state_store().put(key, value).await
    }

    pub async fn get_state(&self, function_name: &str, key: &str) -> Result<Vec<u8>, FsError> {
        let instance = self.resolve(function_name)?;
        instance.state_store().get(key).await
    }

    pub async fn list_states(
        &self,
        function_name: &str,
        start_inclusive: &str,
        end_exclusive: &str,
    ) -> Result<Vec<String>, FsError> {
        let instance = self.resolve(function_name)?;
        instance
            .state_store()
            .list(start_inclusive, end_exclusive)
            .await
    }

    pub async fn delete_state(&self, function_name: &str, key: &str) -> Result<(), FsError> {
        let instance = self.resolve(function_name)?;
        instance.state_store().delete(key).await
    }

    /// Currently claimed module names, sorted.
    pub fn registered_modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = lock(&self.state).services.keys().cloned().collect();
        modules.sort();
        modules
    }

    /// Names of the functions this adapter can route traffic for, sorted.
    pub fn deployed_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.state).instances.keys().cloned().collect();
        names.sort();
        names
    }
}

impl RuntimeAdapter for ExternalAdapter {
    fn deploy_function<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        instance: Arc<Instance>,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>> {
        Box::pin(self.deploy(ctx, instance))
    }

    fn delete_function<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>> {
        Box::pin(self.delete(ctx, name))
    }
}

async fn send_to(
    ctx: &CancellationToken,
    registration: &Registration,
    event: FunctionEvent,
) -> Result<(), FsError> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(FsError::Cancelled),
        _ = registration.ctx.cancelled() => Err(FsError::Unavailable(registration.service_id.clone())),
        res = registration.delivery.send(event) => {
            res.map_err(|_| FsError::Unavailable(registration.service_id.clone()))
        }
    }
}

/// Releases a registration's modules when its dispatch loop ends, however
/// it ends.
struct RegistrationGuard {
    state: Arc<Mutex<AdapterState>>,
    id: u64,
    service_id: String,
    modules: Vec<String>,
    ctx: CancellationToken,
    metrics: Arc<RuntimeMetrics>,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.ctx.cancel();
        self.metrics.record_registration_released();
        {
            let mut state = lock(&self.state);
            for module in &self.modules {
                if state.services.get(module).is_some_and(|r| r.id == self.id) {
                    state.services.remove(module);
                }
            }
        }
        tracing::info!(
            service_id = %self.service_id,
            registration = self.id,
            modules = ?self.modules,
            "Worker registration released"
        );
    }
}

async fn dispatch(
    guard: RegistrationGuard,
    mut delivery: mpsc::Receiver<FunctionEvent>,
    out: mpsc::Sender<FunctionEvent>,
) {
    loop {
        let event = tokio::select! {
            _ = guard.ctx.cancelled() => break,
            _ = out.closed() => break,
            event = delivery.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        tracing::debug!(
            registration = guard.id,
            function = event.function_name(),
            "Forwarding function event"
        );
        tokio::select! {
            _ = guard.ctx.cancelled() => break,
            res = out.send(event) => {
                if res.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fstream_core::{
        BrokerConfig, EventBroker, Function, MemoryBroker, MemoryStateStore, Package,
        StateStore, TopicConfig,
    };
    use tokio::time::timeout;

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    struct Fixture {
        adapter: ExternalAdapter,
        broker: Arc<dyn EventBroker>,
        state: Arc<dyn StateStore>,
    }

    fn fixture() -> Fixture {
        Fixture {
            adapter: ExternalAdapter::new(AdapterConfig::default()),
            broker: MemoryBroker::spawn(CancellationToken::new(), BrokerConfig::default()),
            state: Arc::new(MemoryStateStore::new()),
        }
    }

    impl Fixture {
        fn instance(&self, name: &str, module: &str, source: &str, sink: &str) -> Arc<Instance> {
            let function = Function {
                name: name.into(),
                package: "p".into(),
                module: module.into(),
                sources: vec![TopicConfig::new(source)],
                sink: TopicConfig::new(sink),
                ..Function::default()
            };
            let package = Package {
                name: "p".into(),
                package_type: "external".into(),
                modules: HashMap::from([(module.to_string(), HashMap::new())]),
            };
            Arc::new(Instance::new(
                CancellationToken::new(),
                function,
                Arc::new(package),
                Arc::clone(&self.broker),
                Arc::clone(&self.state),
            ))
        }
    }

    async fn wait_until_released(adapter: &ExternalAdapter, module: &str) {
        timeout(WAIT, async {
            while adapter.registered_modules().iter().any(|m| m == module) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("module was never released");
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_released() {
        let fx = fixture();
        let worker_a = CancellationToken::new();
        let _stream = fx
            .adapter
            .on_event(worker_a.clone(), "a", vec!["m".into()])
            .unwrap();
        assert_eq!(fx.adapter.registered_modules(), vec!["m"]);

        let err = fx
            .adapter
            .on_event(CancellationToken::new(), "b", vec!["other".into(), "m".into()])
            .unwrap_err();
        assert!(matches!(err, FsError::AlreadyClaimed(ref m) if m == "m"));
        // All-or-nothing: "other" was not claimed either.
        assert_eq!(fx.adapter.registered_modules(), vec!["m"]);

        worker_a.cancel();
        wait_until_released(&fx.adapter, "m").await;

        let _stream = fx
            .adapter
            .on_event(CancellationToken::new(), "b", vec!["m".into()])
            .unwrap();
        assert_eq!(fx.adapter.metrics().snapshot().registrations_released, 1);
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_modules() {
        let fx = fixture();
        let stream = fx
            .adapter
            .on_event(CancellationToken::new(), "a", vec!["m".into()])
            .unwrap();
        drop(stream);
        wait_until_released(&fx.adapter, "m").await;
    }

    #[tokio::test]
    async fn empty_registration_is_rejected() {
        let fx = fixture();
        let err = fx
            .adapter
            .on_event(CancellationToken::new(), "a", Vec::new())
            .unwrap_err();
        assert!(matches!(err, FsError::Protocol(_)));
    }

    #[tokio::test]
    async fn deploy_notifies_the_module_owner() {
        let fx = fixture();
        let mut stream = fx
            .adapter
            .on_event(CancellationToken::new(), "a", vec!["default".into()])
            .unwrap();

        let instance = fx.instance("f1", "default", "in", "out");
        fx.adapter
            .deploy_function(&CancellationToken::new(), instance)
            .await
            .unwrap();

        let event = timeout(WAIT, stream.recv()).await.unwrap().unwrap();
        match event {
            FunctionEvent::Deploy { function } => {
                assert_eq!(function.name, "f1");
                assert_eq!(function.module, "default");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(fx.adapter.deployed_functions(), vec!["f1"]);
    }

    #[tokio::test]
    async fn deploy_without_owner_leaves_nothing_behind() {
        let fx = fixture();
        let instance = fx.instance("f1", "default", "in", "out");
        let err = fx
            .adapter
            .deploy_function(&CancellationToken::new(), instance)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::ModuleNotFound(ref m) if m == "default"));

        let err = fx
            .adapter
            .write(&CancellationToken::new(), "f1", b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Unavailable(_)));
    }

    #[tokio::test]
    async fn cancelled_deploy_rolls_back() {
        let fx = fixture();
        // Never polled, so notifications back up until a deploy blocks.
        let _stream = fx
            .adapter
            .on_event(CancellationToken::new(), "a", vec!["default".into()])
            .unwrap();

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let mut delivered = Vec::new();
        let (blocked, err) = timeout(WAIT, async {
            let mut i = 0;
            loop {
                let name = format!("f{i}");
                let instance = fx.instance(&name, "default", "in", "out");
                match fx.adapter.deploy_function(&ctx, instance).await {
                    Ok(()) => delivered.push(name),
                    Err(err) => return (name, err),
                }
                i += 1;
            }
        })
        .await
        .unwrap();

        assert!(matches!(err, FsError::Cancelled));
        let deployed = fx.adapter.deployed_functions();
        assert!(!deployed.contains(&blocked));
        delivered.sort();
        assert_eq!(deployed, delivered);
    }

    #[tokio::test]
    async fn delete_reaches_every_worker_once() {
        let fx = fixture();
        let mut a = fx
            .adapter
            .on_event(CancellationToken::new(), "a", vec!["m1".into(), "m2".into()])
            .unwrap();
        let mut b = fx
            .adapter
            .on_event(CancellationToken::new(), "b", vec!["m3".into()])
            .unwrap();

        let instance = fx.instance("f1", "m3", "in", "out");
        fx.adapter
            .deploy_function(&CancellationToken::new(), instance)
            .await
            .unwrap();
        assert!(matches!(
            timeout(WAIT, b.recv()).await.unwrap(),
            Some(FunctionEvent::Deploy { .. })
        ));

        fx.adapter
            .delete_function(&CancellationToken::new(), "f1")
            .await
            .unwrap();

        for stream in [&mut a, &mut b] {
            let event = timeout(WAIT, stream.recv()).await.unwrap().unwrap();
            assert_eq!(
                event,
                FunctionEvent::Delete {
                    function_name: "f1".into()
                }
            );
        }
        // Worker a owns two modules but hears about the delete once.
        assert!(
            timeout(Duration::from_millis(50), a.recv())
                .await
                .is_err()
        );
        assert!(fx.adapter.deployed_functions().is_empty());
    }

    #[tokio::test]
    async fn write_commits_without_a_reader() {
        let fx = fixture();
        let _stream = fx
            .adapter
            .on_event(CancellationToken::new(), "a", vec!["default".into()])
            .unwrap();
        let instance = fx.instance("f1", "default", "in", "out");
        fx.adapter
            .deploy_function(&CancellationToken::new(), instance)
            .await
            .unwrap();

        timeout(
            WAIT,
            fx.adapter
                .write(&CancellationToken::new(), "f1", b"{}".to_vec()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(fx.adapter.metrics().snapshot().events_written, 1);
    }

    #[tokio::test]
    async fn read_streams_source_events_until_instance_ends() {
        let fx = fixture();
        let _stream = fx
            .adapter
            .on_event(CancellationToken::new(), "a", vec!["default".into()])
            .unwrap();
        let instance = fx.instance("f1", "default", "in", "out");
        let instance_ctx = instance.context().clone();
        fx.adapter
            .deploy_function(&CancellationToken::new(), instance)
            .await
            .unwrap();

        let mut events = fx
            .adapter
            .read(CancellationToken::new(), "f1")
            .await
            .unwrap();

        let record = Record::new(b"hello".to_vec()).with_id("e1");
        let mut observer = record.observer();
        fx.broker
            .write(&CancellationToken::new(), record, &TopicConfig::new("in"))
            .await
            .unwrap();

        let message = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(message.id, "e1");
        assert_eq!(message.payload, b"hello");
        assert!(timeout(WAIT, observer.committed()).await.unwrap());

        instance_ctx.cancel();
        assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_ends_when_caller_cancels() {
        let fx = fixture();
        let _stream = fx
            .adapter
            .on_event(CancellationToken::new(), "a", vec!["default".into()])
            .unwrap();
        let instance = fx.instance("f1", "default", "in", "out");
        let instance_ctx = instance.context().clone();
        fx.adapter
            .deploy_function(&CancellationToken::new(), instance)
            .await
            .unwrap();

        let caller = CancellationToken::new();
        let mut events = fx.adapter.read(caller.clone(), "f1").await.unwrap();
        caller.cancel();
        assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());

        // Only the stream ended; the instance stays deployed and readable.
        assert!(!instance_ctx.is_cancelled());
        let mut again = fx
            .adapter
            .read(CancellationToken::new(), "f1")
            .await
            .unwrap();
        let record = Record::new(b"later".to_vec()).with_id("e2");
        fx.broker
            .write(&CancellationToken::new(), record, &TopicConfig::new("in"))
            .await
            .unwrap();
        let message = timeout(WAIT, again.recv()).await.unwrap().unwrap();
        assert_eq!(message.id, "e2");
    }

    #[tokio::test]
    async fn read_unknown_function_is_unavailable() {
        let fx = fixture();
        let err = fx
            .adapter
            .read(CancellationToken::new(), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Unavailable(ref n) if n == "ghost"));
    }

    #[tokio::test]
    async fn state_operations_reach_the_store() {
        let fx = fixture();
        let _stream = fx
            .adapter
            .on_event(CancellationToken::new(), "a", vec!["default".into()])
            .unwrap();
        let instance = fx.instance("f1", "default", "in", "out");
        fx.adapter
            .deploy_function(&CancellationToken::new(), instance)
            .await
            .unwrap();

        fx.adapter.put_state("f1", "a", b"1".to_vec()).await.unwrap();
        fx.adapter.put_state("f1", "b", b"2".to_vec()).await.unwrap();
        assert_eq!(fx.adapter.get_state("f1", "a").await.unwrap(), b"1");
        assert_eq!(
            fx.adapter.list_states("f1", "a", "c").await.unwrap(),
            vec!["a", "b"]
        );

        fx.adapter.delete_state("f1", "a").await.unwrap();
        let err = fx.adapter.get_state("f1", "a").await.unwrap_err();
        assert!(err.is_not_found());

        let err = fx.adapter.get_state("ghost", "a").await.unwrap_err();
        assert!(matches!(err, FsError::Unavailable(_)));
    }
}
