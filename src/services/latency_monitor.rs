use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::remote_api::RemoteApi;

struct RunningProbe {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Periodic round-trip probe against the API host. Display only: it publishes
/// the last latency in milliseconds and never touches launcher status.
pub struct LatencyMonitor {
    api: Arc<dyn RemoteApi>,
    interval: Duration,
    latest: Arc<watch::Sender<Option<u64>>>,
    probe: Mutex<Option<RunningProbe>>,
}

impl LatencyMonitor {
    pub fn new(api: Arc<dyn RemoteApi>, interval: Duration) -> Self {
        let (latest, _rx) = watch::channel(None);
        Self {
            api,
            interval,
            latest: Arc::new(latest),
            probe: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.latest.subscribe()
    }

    pub fn latest_ms(&self) -> Option<u64> {
        *self.latest.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|probe| !probe.task.is_finished())
    }

    /// Spawns the probe loop. Returns `false` when one is already running.
    pub fn start(&self) -> bool {
        let mut probe = self.lock();
        if probe.as_ref().is_some_and(|running| !running.task.is_finished()) {
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_probe(
            self.api.clone(),
            self.interval,
            self.latest.clone(),
            stop_rx,
        ));
        *probe = Some(RunningProbe { stop, task });
        tracing::info!("latency monitor started ({}s interval)", self.interval.as_secs_f32());
        true
    }

    pub fn stop(&self) {
        if let Some(running) = self.lock().take() {
            let _ = running.stop.send(true);
            running.task.abort();
            self.latest.send_replace(None);
            tracing::info!("latency monitor stopped");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningProbe>> {
        match self.probe.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for LatencyMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_probe(
    api: Arc<dyn RemoteApi>,
    interval: Duration,
    latest: Arc<watch::Sender<Option<u64>>>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let sample = match api.ping().await {
                    Ok(rtt) => Some(rtt.as_millis().min(u128::from(u64::MAX)) as u64),
                    Err(err) => {
                        tracing::debug!("latency probe failed: {}", err);
                        None
                    }
                };
                latest.send_replace(sample);
            }
        }
    }
}
