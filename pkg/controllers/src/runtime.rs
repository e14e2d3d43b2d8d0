//! Drives the reconciler: watch events and periodic resyncs feed a deduplicating work
//! queue drained by a fixed set of workers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use pkg_constants::loxilb::{ERROR_BACKOFF_BASE, ERROR_BACKOFF_MAX};
use pkg_state::ObjectStore;
use pkg_types::ingress::Ingress;
use pkg_types::watch::{EventType, WatchEvent};

use crate::ingress::{Action, IngressKey, IngressReconciler};

#[derive(Default)]
struct QueueState {
    queue: VecDeque<IngressKey>,
    queued: HashSet<IngressKey>,
    active: HashSet<IngressKey>,
    /// Keys added while being processed; re-queued once the worker is done.
    dirty: HashSet<IngressKey>,
    /// Earliest pending delayed add per key.
    delayed: HashMap<IngressKey, Instant>,
}

/// Work queue that holds each key at most once and never hands the same key to two
/// workers at the same time.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, key: IngressKey) {
        let mut state = self.state.lock().await;
        if state.queued.contains(&key) {
            return;
        }
        if state.active.contains(&key) {
            state.dirty.insert(key);
            return;
        }
        state.queued.insert(key.clone());
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Add `key` once `delay` has elapsed. Each key has at most one pending delayed add;
    /// a later deadline than the pending one is dropped, an earlier one replaces it.
    pub async fn add_after(self: &Arc<Self>, key: IngressKey, delay: Duration) {
        let deadline = Instant::now() + delay;
        {
            let mut state = self.state.lock().await;
            if matches!(state.delayed.get(&key), Some(pending) if *pending <= deadline) {
                return;
            }
            state.delayed.insert(key.clone(), deadline);
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut state = queue.state.lock().await;
                if state.delayed.get(&key) != Some(&deadline) {
                    return;
                }
                state.delayed.remove(&key);
            }
            queue.add(key).await;
        });
    }

    /// Wait for the next key and mark it active.
    pub async fn next(&self) -> IngressKey {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(key) = state.queue.pop_front() {
                    state.queued.remove(&key);
                    state.active.insert(key.clone());
                    if !state.queue.is_empty() {
                        self.notify.notify_one();
                    }
                    return key;
                }
            }
            notified.await;
        }
    }

    /// Release `key` after processing. A key added meanwhile is queued again.
    pub async fn done(&self, key: &IngressKey) {
        let mut state = self.state.lock().await;
        state.active.remove(key);
        if state.dirty.remove(key) && state.queued.insert(key.clone()) {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Number of keys waiting on a delayed add.
    pub async fn delayed_len(&self) -> usize {
        self.state.lock().await.delayed.len()
    }
}

/// Retry delay for the `attempt`-th consecutive failure (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    ERROR_BACKOFF_BASE
        .saturating_mul(1u32 << exp)
        .min(ERROR_BACKOFF_MAX)
}

/// Consecutive failure counts per Ingress.
#[derive(Debug, Default)]
pub struct BackoffTracker {
    attempts: Mutex<HashMap<IngressKey, u32>>,
}

impl BackoffTracker {
    /// Record a failure and return how long to wait before retrying.
    pub async fn failure(&self, key: &IngressKey) -> Duration {
        let mut attempts = self.attempts.lock().await;
        let count = attempts.entry(key.clone()).or_insert(0);
        *count += 1;
        backoff_delay(*count)
    }

    pub async fn reset(&self, key: &IngressKey) {
        self.attempts.lock().await.remove(key);
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub workers: usize,
    pub resync_interval: Duration,
    pub ingress_class: String,
}

/// Ingress controller: event intake, periodic resync and worker pool.
pub struct IngressController {
    reconciler: Arc<IngressReconciler>,
    objects: Arc<dyn ObjectStore>,
    queue: Arc<WorkQueue>,
    backoff: Arc<BackoffTracker>,
    config: ControllerConfig,
}

impl IngressController {
    pub fn new(
        reconciler: IngressReconciler,
        objects: Arc<dyn ObjectStore>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            objects,
            queue: Arc::new(WorkQueue::new()),
            backoff: Arc::new(BackoffTracker::default()),
            config,
        }
    }

    /// Whether a watch event should trigger a pass, and for which Ingress.
    /// Puts are filtered by ingress class; deletes always pass.
    pub fn event_key(&self, event: &WatchEvent) -> Option<IngressKey> {
        let key = IngressKey::from_registry_key(&event.key)?;
        if event.event_type == EventType::Delete {
            return Some(key);
        }
        let value = event.value.as_deref()?;
        match serde_json::from_slice::<Ingress>(value) {
            Ok(ingress) if ingress.has_class(&self.config.ingress_class) => Some(key),
            Ok(_) => {
                debug!("Ignoring ingress {} of another class", key);
                None
            }
            Err(e) => {
                warn!("Ignoring undecodable ingress {}: {}", key, e);
                None
            }
        }
    }

    pub fn start(
        self,
        events: mpsc::UnboundedReceiver<WatchEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "IngressController started (class={}, workers={}, resync={}s)",
                self.config.ingress_class,
                self.config.workers,
                self.config.resync_interval.as_secs()
            );
            let controller = Arc::new(self);

            let mut tasks = Vec::new();
            for id in 0..controller.config.workers.max(1) {
                tasks.push(tokio::spawn(Arc::clone(&controller).worker(id, shutdown.clone())));
            }
            tasks.push(tokio::spawn(Arc::clone(&controller).resync_loop(shutdown.clone())));
            controller.event_loop(events, shutdown).await;

            for task in tasks {
                let _ = task.await;
            }
            info!("IngressController stopped");
        })
    }

    async fn event_loop(&self, mut events: mpsc::UnboundedReceiver<WatchEvent>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        warn!("Watch event channel closed");
                        break;
                    };
                    if let Some(key) = self.event_key(&event) {
                        debug!("Watch event {:?} for ingress {}", event.event_type, key);
                        self.queue.add(key).await;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn resync_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.resync_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.resync().await {
                        warn!("IngressController resync error: {}", e);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    /// Enqueue every Ingress of the handled class.
    async fn resync(&self) -> anyhow::Result<()> {
        let mut count = 0;
        for ns in self.objects.list_namespaces().await? {
            for ingress in self.objects.list_ingresses(&ns.name).await? {
                if !ingress.has_class(&self.config.ingress_class) {
                    continue;
                }
                self.queue
                    .add(IngressKey::new(&ingress.namespace, &ingress.name))
                    .await;
                count += 1;
            }
        }
        debug!("Resync enqueued {} ingresses", count);
        Ok(())
    }

    async fn worker(self: Arc<Self>, id: usize, mut shutdown: watch::Receiver<bool>) {
        loop {
            let key = tokio::select! {
                key = self.queue.next() => key,
                _ = shutdown.changed() => break,
            };
            let result = tokio::select! {
                result = self.reconciler.reconcile(&key) => result,
                _ = shutdown.changed() => break,
            };
            self.queue.done(&key).await;

            match result {
                Ok(Action::Requeue(delay)) => {
                    self.backoff.reset(&key).await;
                    self.queue.add_after(key, delay).await;
                }
                Ok(Action::AwaitChange) => self.backoff.reset(&key).await,
                Err(e) => {
                    let delay = self.backoff.failure(&key).await;
                    warn!(
                        "Worker {}: reconcile of ingress {} failed, retrying in {}s: {}",
                        id,
                        key,
                        delay.as_secs(),
                        e
                    );
                    self.queue.add_after(key, delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeObjectStore, FakeRuleStore, make_endpoints, make_ingress};

    fn controller(objects: Arc<FakeObjectStore>, rules: Arc<FakeRuleStore>) -> IngressController {
        let reconciler = IngressReconciler::new(objects.clone(), rules, "192.168.1.1");
        IngressController::new(
            reconciler,
            objects,
            ControllerConfig {
                workers: 2,
                resync_interval: Duration::from_secs(300),
                ingress_class: "loxilb".to_string(),
            },
        )
    }

    fn put_event(seq: u64, ingress: &Ingress) -> WatchEvent {
        WatchEvent {
            seq,
            event_type: EventType::Put,
            key: format!("/registry/ingresses/{}/{}", ingress.namespace, ingress.name),
            value: Some(serde_json::to_vec(ingress).unwrap()),
        }
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_secs(5));
        assert_eq!(backoff_delay(2), Duration::from_secs(10));
        assert_eq!(backoff_delay(4), Duration::from_secs(40));
        assert_eq!(backoff_delay(7), Duration::from_secs(300));
        assert_eq!(backoff_delay(100), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_backoff_tracker_reset() {
        let tracker = BackoffTracker::default();
        let key = IngressKey::new("ns", "app");
        assert_eq!(tracker.failure(&key).await, Duration::from_secs(5));
        assert_eq!(tracker.failure(&key).await, Duration::from_secs(10));
        tracker.reset(&key).await;
        assert_eq!(tracker.failure(&key).await, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_queue_deduplicates() {
        let queue = WorkQueue::new();
        queue.add(IngressKey::new("ns", "a")).await;
        queue.add(IngressKey::new("ns", "a")).await;
        queue.add(IngressKey::new("ns", "b")).await;
        assert_eq!(queue.len().await, 2);

        let first = queue.next().await;
        assert_eq!(first, IngressKey::new("ns", "a"));

        // Re-added while active: held back until done.
        queue.add(first.clone()).await;
        assert_eq!(queue.len().await, 1);
        queue.done(&first).await;
        assert_eq!(queue.len().await, 2);

        assert_eq!(queue.next().await, IngressKey::new("ns", "b"));
        assert_eq!(queue.next().await, IngressKey::new("ns", "a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_add_keeps_earliest_deadline() {
        let queue = Arc::new(WorkQueue::new());
        let key = IngressKey::new("ns", "a");

        queue.add_after(key.clone(), Duration::from_secs(30)).await;
        queue.add_after(key.clone(), Duration::from_secs(60)).await;
        queue.add_after(key.clone(), Duration::from_secs(10)).await;
        assert_eq!(queue.delayed_len().await, 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.delayed_len().await, 0);
        let next = queue.next().await;
        queue.done(&next).await;

        // The replaced 30s deadline and the dropped 60s one never fire.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_events_keep_single_requeue_cadence() {
        let objects = Arc::new(FakeObjectStore::default());
        let rules = Arc::new(FakeRuleStore::default());
        objects.add_endpoints(make_endpoints("ns", "svc", &["10.0.0.5"], &[("", 8080)]));
        let ingress = make_ingress("ns", "app", &[("a.com", "svc", 8080)]);
        objects.add_ingress(ingress.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = controller(objects.clone(), rules.clone()).start(rx, shutdown_rx);

        for seq in 1..=5 {
            tx.send(put_event(seq, &ingress)).unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        }

        let before = rules.list_calls();
        tokio::time::sleep(Duration::from_secs(300)).await;
        let passes = rules.list_calls() - before;
        // One pass per 30s plus at most one from the resync tick.
        assert!((9..=12).contains(&passes), "{} passes in 300s", passes);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_event_filtering() {
        let ctrl = controller(Arc::default(), Arc::default());

        let ingress = make_ingress("ns", "app", &[]);
        assert_eq!(ctrl.event_key(&put_event(1, &ingress)), Some(IngressKey::new("ns", "app")));

        let mut other = make_ingress("ns", "other", &[]);
        other.spec.ingress_class_name = Some("nginx".to_string());
        assert_eq!(ctrl.event_key(&put_event(2, &other)), None);

        let delete = WatchEvent {
            seq: 3,
            event_type: EventType::Delete,
            key: "/registry/ingresses/ns/other".to_string(),
            value: None,
        };
        assert_eq!(ctrl.event_key(&delete), Some(IngressKey::new("ns", "other")));

        let unrelated = WatchEvent {
            seq: 4,
            event_type: EventType::Put,
            key: "/registry/services/ns/svc".to_string(),
            value: Some(b"{}".to_vec()),
        };
        assert_eq!(ctrl.event_key(&unrelated), None);
    }

    #[tokio::test]
    async fn test_event_drives_reconcile_and_shutdown() {
        let objects = Arc::new(FakeObjectStore::default());
        let rules = Arc::new(FakeRuleStore::default());
        objects.add_endpoints(make_endpoints("ns", "svc", &["10.0.0.5"], &[("", 8080)]));
        let ingress = make_ingress("ns", "app", &[("a.com", "svc", 8080)]);
        objects.add_ingress(ingress.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = controller(objects.clone(), rules.clone()).start(rx, shutdown_rx);

        tx.send(put_event(1, &ingress)).unwrap();
        for _ in 0..100 {
            if !rules.rules().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.rules()[0].name(), "ns_app");

        objects.remove_ingress("ns", "app");
        tx.send(WatchEvent {
            seq: 2,
            event_type: EventType::Delete,
            key: "/registry/ingresses/ns/app".to_string(),
            value: None,
        })
        .unwrap();
        for _ in 0..100 {
            if rules.rules().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(rules.rules().is_empty());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
