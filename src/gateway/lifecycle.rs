//! Process lifecycle: run servers side by side and stop them together.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::core::error::{RouterError, RouterResult};

/// Something that runs until stopped
#[async_trait]
pub trait Starter: Send + Sync {
    async fn start(&self) -> RouterResult<()>;
}

#[async_trait]
pub trait Stopper: Send + Sync {
    async fn stop(&self) -> RouterResult<()>;
}

/// A startable and stoppable server
pub trait Server: Starter + Stopper {}

impl<T: Starter + Stopper> Server for T {}

/// Runs servers concurrently and stops all of them on a shutdown signal or the first failure
#[derive(Default)]
pub struct Lifecycle {
    servers: Vec<Arc<dyn Server>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, server: Arc<dyn Server>) -> Self {
        self.servers.push(server);
        self
    }

    /// Run until Ctrl-C, SIGTERM or SIGHUP
    pub async fn run(self) -> RouterResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes or a server exits
    ///
    /// Returns the first server error, if any.
    pub async fn run_until<F>(self, signal: F) -> RouterResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut tasks = JoinSet::new();
        for server in &self.servers {
            let server = server.clone();
            tasks.spawn(async move { server.start().await });
        }

        let mut first_error: Option<RouterError> = None;
        tokio::select! {
            _ = signal => info!("Shutdown signal received, stopping servers"),
            Some(joined) = tasks.join_next() => {
                if let Some(err) = task_error(joined) {
                    error!("Server failed: {}", err);
                    first_error = Some(err);
                } else {
                    warn!("Server exited, stopping the others");
                }
            }
        }

        for server in &self.servers {
            if let Err(err) = server.stop().await {
                error!("Failed to stop server: {}", err);
                first_error.get_or_insert(err);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Some(err) = task_error(joined) {
                error!("Server failed during shutdown: {}", err);
                first_error.get_or_insert(err);
            }
        }

        info!("All servers stopped");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn task_error(joined: Result<RouterResult<()>, tokio::task::JoinError>) -> Option<RouterError> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err),
        Err(join_error) => Some(RouterError::internal(format!("server task failed: {}", join_error))),
    }
}

/// Completes on Ctrl-C, or on SIGTERM or SIGHUP where available
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl-C");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(mut sigterm), Ok(mut sighup)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sighup.recv() => info!("Received SIGHUP"),
                }
            }
            _ => {
                warn!("Failed to install SIGTERM/SIGHUP handlers");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Runs until stopped, or fails immediately when `fail` is set
    #[derive(Default)]
    struct FakeServer {
        fail: bool,
        stopped: Notify,
        stop_calls: AtomicUsize,
    }

    #[async_trait]
    impl Starter for FakeServer {
        async fn start(&self) -> RouterResult<()> {
            if self.fail {
                return Err(RouterError::internal("bind failed"));
            }
            self.stopped.notified().await;
            Ok(())
        }
    }

    #[async_trait]
    impl Stopper for FakeServer {
        async fn stop(&self) -> RouterResult<()> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.stopped.notify_one();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_signal_stops_every_server() {
        let first = Arc::new(FakeServer::default());
        let second = Arc::new(FakeServer::default());
        let lifecycle = Lifecycle::new()
            .with_server(first.clone())
            .with_server(second.clone());

        lifecycle
            .run_until(tokio::time::sleep(std::time::Duration::from_millis(20)))
            .await
            .unwrap();

        assert_eq!(first.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_server_stops_the_rest() {
        let healthy = Arc::new(FakeServer::default());
        let failing = Arc::new(FakeServer {
            fail: true,
            ..FakeServer::default()
        });
        let lifecycle = Lifecycle::new()
            .with_server(healthy.clone())
            .with_server(failing);

        let err = lifecycle
            .run_until(std::future::pending::<()>())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("bind failed"));
        assert_eq!(healthy.stop_calls.load(Ordering::SeqCst), 1);
    }
}
