use std::sync::Arc;
use std::time::Duration;

use fstream_core::{FsError, Function};
use fstream_runtime::FunctionManager;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Deploy every configured function, each in its own task.
///
/// A function whose module has no worker yet is retried every `retry` until
/// a worker claims it or `shutdown` is cancelled. Any other failure is
/// logged and that function is skipped.
pub async fn deploy_configured(
    manager: Arc<FunctionManager>,
    functions: Vec<Function>,
    retry: Duration,
    shutdown: CancellationToken,
) {
    let mut tasks = JoinSet::new();
    for function in functions {
        tasks.spawn(deploy_when_claimed(
            Arc::clone(&manager),
            function,
            retry,
            shutdown.clone(),
        ));
    }
    while tasks.join_next().await.is_some() {}
}

async fn deploy_when_claimed(
    manager: Arc<FunctionManager>,
    function: Function,
    retry: Duration,
    shutdown: CancellationToken,
) {
    let name = function.name.clone();
    let mut waiting = false;
    loop {
        match manager.deploy(&shutdown, function.clone()).await {
            Ok(()) => {
                tracing::info!(function = %name, module = %function.module, "Deployed configured function");
                return;
            }
            Err(FsError::ModuleNotFound(module)) => {
                if !waiting {
                    tracing::info!(function = %name, module, "Waiting for a worker to claim module");
                    waiting = true;
                }
            }
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                tracing::error!(function = %name, error = %e, "Failed to deploy configured function");
                return;
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(retry) => {}
        }
    }
}
