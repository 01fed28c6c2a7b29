//! Shutdown coordination
//!
//! A [`ShutdownCoordinator`] owns a set of repeating background loops (the
//! manager's processing and health loops) and stops them together:
//! [`ShutdownCoordinator::shutdown`] broadcasts the stop signal and waits
//! for every loop to finish its current tick.
//!
//! [`ShutdownCoordinator::guard`] wraps the CLI session: the session future
//! gets a receiver that fires on the first SIGINT/SIGTERM/SIGHUP.

use crate::core::scheduler::spawn_repeating;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    loops: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            loops: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Run `tick` every `period` until shutdown; needs a tokio runtime
    pub fn spawn_loop<F>(&mut self, name: &'static str, period: Duration, tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        let handle = spawn_repeating(name, period, self.subscribe(), tick);
        self.loops.push((name, handle));
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    /// Signal every subscriber without waiting
    pub fn trigger(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Stop all loops and wait for them; returns how many ended cleanly
    pub async fn shutdown(self) -> usize {
        self.trigger();
        let (names, handles): (Vec<_>, Vec<_>) = self.loops.into_iter().unzip();
        let mut clean = 0;
        for (name, result) in names.into_iter().zip(futures::future::join_all(handles).await) {
            match result {
                Ok(()) => clean += 1,
                Err(err) => log::debug!("Loop '{}' ended abnormally: {}", name, err),
            }
        }
        clean
    }

    /// Run a future with signal handlers installed
    ///
    /// The closure receives a shutdown receiver that fires on the first
    /// signal; a second signal exits the process.
    pub async fn guard<F, Fut, R, E>(future_fn: F) -> Result<R, E>
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: std::future::Future<Output = Result<R, E>>,
    {
        let coordinator = Self::new();
        let shutdown_rx = coordinator.subscribe();
        setup_signal_handlers(coordinator.shutdown_tx.clone());
        future_fn(shutdown_rx).await
    }
}

fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tokio::signal::unix::{signal, SignalKind};
        let received = Arc::new(AtomicUsize::new(0));

        for kind in [
            SignalKind::interrupt(),
            SignalKind::terminate(),
            SignalKind::hangup(),
        ] {
            let tx = shutdown_tx.clone();
            let received = Arc::clone(&received);
            tokio::spawn(async move {
                if let Ok(mut sig) = signal(kind) {
                    while sig.recv().await.is_some() {
                        let _ = tx.send(());
                        if received.fetch_add(1, Ordering::AcqRel) >= 1 {
                            log::warn!("Second signal received; exiting");
                            std::process::exit(130);
                        }
                        log::info!("Signal received; stopping session");
                    }
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_every_loop() {
        let mut coordinator = ShutdownCoordinator::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        for name in ["processing", "health"] {
            let ticks = Arc::clone(&ticks);
            coordinator.spawn_loop(name, Duration::from_millis(10), move || {
                ticks.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(coordinator.loop_count(), 2);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 4);

        assert_eq!(coordinator.shutdown().await, 2);
        let stopped_at = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), stopped_at);
    }

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let coordinator = ShutdownCoordinator::new();
        let mut first = coordinator.subscribe();
        let mut second = coordinator.subscribe();

        coordinator.trigger();

        assert!(timeout(Duration::from_millis(100), first.recv()).await.is_ok());
        assert!(timeout(Duration::from_millis(100), second.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_guard_runs_session_to_completion() {
        let result = ShutdownCoordinator::guard(|mut shutdown_rx| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(20)) => Ok::<i32, &str>(42),
                _ = shutdown_rx.recv() => Ok(-1),
            }
        })
        .await;

        assert_eq!(result, Ok(42));
    }
}
