use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::session::SessionController;

/// Drives the two independent timers over every live session: signal
/// sampling and coaching decisions.
pub struct Daemon {
    controller: Arc<SessionController>,
    sample_interval: Duration,
    decision_interval: Duration,
}

impl Daemon {
    #[must_use]
    pub fn new(controller: Arc<SessionController>) -> Self {
        let sample_interval = controller.config().sample_interval();
        let decision_interval = controller.config().decision_interval();
        Self::with_intervals(controller, sample_interval, decision_interval)
    }

    #[must_use]
    pub const fn with_intervals(
        controller: Arc<SessionController>,
        sample_interval: Duration,
        decision_interval: Duration,
    ) -> Self {
        Self {
            controller,
            sample_interval,
            decision_interval,
        }
    }

    /// Run both timers until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns an error if a timer task panics
    pub async fn run_with_signals(&self) -> Result<()> {
        self.run_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received Ctrl-C, shutting down...");
            }
        })
        .await
    }

    /// Run both timers until `stop` resolves
    ///
    /// # Errors
    ///
    /// Returns an error if a timer task panics
    pub async fn run_until<F>(&self, stop: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            stop.await;
            let _ = shutdown_tx.send(true);
        });
        self.run(shutdown_rx).await
    }

    /// Run both timers until `shutdown` flips to true
    ///
    /// # Errors
    ///
    /// Returns an error if a timer task panics
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        log::info!(
            "Daemon started: sampling every {:?}, deciding every {:?}",
            self.sample_interval,
            self.decision_interval
        );

        let sampler = {
            let controller = self.controller.clone();
            tokio::spawn(tick_loop(
                "sample",
                self.sample_interval,
                shutdown.clone(),
                move || {
                    let controller = controller.clone();
                    async move { controller.sample_all().await }
                },
            ))
        };
        let decider = {
            let controller = self.controller.clone();
            tokio::spawn(tick_loop(
                "decision",
                self.decision_interval,
                shutdown,
                move || {
                    let controller = controller.clone();
                    async move { controller.decide_all().await }
                },
            ))
        };

        let (sampled, decided) = tokio::join!(sampler, decider);
        sampled?;
        decided?;
        log::info!("Daemon shut down gracefully.");
        Ok(())
    }
}

async fn tick_loop<F, Fut>(
    label: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    tick: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = usize>,
{
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let touched = tick().await;
                log::debug!("{label} tick covered {touched} sessions");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    log::debug!("{label} timer stopped");
}
