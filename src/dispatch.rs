use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tracing::{debug, info};

use crate::catalog::PriorityClass;
use crate::limiter::Reservation;
use crate::metrics::DISPATCH_QUEUE_DEPTH;

// Fixed hold before delayed-class jobs reach the pool
const DELAY: Duration = Duration::from_secs(5);

// A unit of post-admission work
pub struct Job {
    pub api_key: String,
    pub reservation: Reservation,
}

// The work itself is an extension point; tests swap in an observer
type Processor = Arc<dyn Fn(&Job) + Send + Sync>;

/// Routes admitted reservations to post-processing by priority class.
///
/// Immediate and delayed jobs funnel into one bounded worker pool,
/// background jobs into a separate smaller one - bounded queues instead of
/// spawning one task per job, so load cannot grow tasks without limit.
/// Default-class jobs are processed inline, synchronously with the
/// dispatch call itself.
pub struct PriorityDispatcher {
    worker_tx: mpsc::Sender<Job>,
    background_tx: mpsc::Sender<Job>,
    queue_capacity: usize,
    processor: Processor,
}

impl PriorityDispatcher {
    // Spawns the drain workers on the current runtime
    pub fn new(workers: usize, background_workers: usize, queue: usize) -> Self {
        Self::with_processor(workers, background_workers, queue, Arc::new(process))
    }

    pub fn with_processor(
        workers: usize,
        background_workers: usize,
        queue: usize,
        processor: Processor,
    ) -> Self {
        let (worker_tx, worker_rx) = mpsc::channel(queue);
        let (background_tx, background_rx) = mpsc::channel(queue);

        spawn_workers(workers, worker_rx, Arc::clone(&processor), "dispatch");
        spawn_workers(
            background_workers,
            background_rx,
            Arc::clone(&processor),
            "background",
        );

        Self {
            worker_tx,
            background_tx,
            queue_capacity: queue,
            processor,
        }
    }

    /// Hand an admitted reservation to its post-processing path. Never
    /// blocks the caller: every class except Default is fire-and-forget,
    /// and a scheduled job always eventually runs - the enqueue task waits
    /// for queue capacity rather than dropping.
    pub fn dispatch(&self, class: PriorityClass, api_key: &str, reservation: Reservation) {
        let job = Job {
            api_key: api_key.to_string(),
            reservation,
        };

        match class {
            PriorityClass::Immediate => {
                let tx = self.worker_tx.clone();
                let capacity = self.queue_capacity;
                tokio::spawn(async move {
                    enqueue(tx, capacity, job).await;
                });
            }
            PriorityClass::Delayed => {
                let tx = self.worker_tx.clone();
                let capacity = self.queue_capacity;
                tokio::spawn(async move {
                    sleep(DELAY).await;
                    enqueue(tx, capacity, job).await;
                });
            }
            PriorityClass::Background => {
                let tx = self.background_tx.clone();
                let capacity = self.queue_capacity;
                tokio::spawn(async move {
                    enqueue(tx, capacity, job).await;
                });
            }
            // Unlike Immediate, the default class runs before dispatch
            // returns - inherited asymmetry, kept on purpose
            PriorityClass::Default => (self.processor)(&job),
        }
    }
}

async fn enqueue(tx: mpsc::Sender<Job>, capacity: usize, job: Job) {
    if tx.send(job).await.is_ok() {
        DISPATCH_QUEUE_DEPTH.set(capacity.saturating_sub(tx.capacity()) as f64);
    }
}

fn spawn_workers(count: usize, rx: mpsc::Receiver<Job>, processor: Processor, pool: &'static str) {
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    for worker in 0..count {
        let rx = Arc::clone(&rx);
        let processor = Arc::clone(&processor);

        tokio::spawn(async move {
            debug!(pool, worker, "dispatch worker started");
            loop {
                // Hold the receiver lock only for the recv itself, so a
                // slow job never blocks the rest of the pool from pulling
                let job = {
                    let mut rx = rx.lock().await;
                    rx.recv().await
                };
                match job {
                    Some(job) => processor(&job),
                    None => break,
                }
            }
            debug!(pool, worker, "dispatch worker stopped");
        });
    }
}

// Default processing: log the reservation. Real work (telemetry,
// forwarding) plugs in through with_processor
fn process(job: &Job) {
    info!(
        api_key = %job.api_key,
        endpoint = %job.reservation.target_endpoint_path,
        reserved_requests = job.reservation.reserved_requests,
        reserved_tokens = job.reservation.reserved_tokens,
        "processing reservation"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn reservation(path: &str) -> Reservation {
        Reservation {
            allowed: true,
            reserved_tokens: 10,
            reserved_requests: 1,
            remaining_tokens: 90,
            remaining_requests: 9,
            target_endpoint_path: path.to_string(),
        }
    }

    #[tokio::test]
    async fn default_class_processes_inline() {
        let seen = Arc::new(AtomicUsize::new(0));
        let observer = Arc::clone(&seen);
        let dispatcher = PriorityDispatcher::with_processor(
            1,
            1,
            4,
            Arc::new(move |_job: &Job| {
                observer.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatcher.dispatch(PriorityClass::Default, "ANY_KEY", reservation("/api/x"));

        // Synchronous with respect to the dispatch invocation
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn immediate_class_runs_off_the_caller() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = PriorityDispatcher::with_processor(
            2,
            1,
            4,
            Arc::new(move |job: &Job| {
                let _ = tx.send(job.api_key.clone());
            }),
        );

        dispatcher.dispatch(PriorityClass::Immediate, "KEY_I", reservation("/api/x"));

        let key = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("job never processed")
            .unwrap();
        assert_eq!(key, "KEY_I");
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_class_waits_five_seconds() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = PriorityDispatcher::with_processor(
            1,
            1,
            4,
            Arc::new(move |_job: &Job| {
                let _ = tx.send(Instant::now());
            }),
        );

        let dispatched_at = Instant::now();
        dispatcher.dispatch(PriorityClass::Delayed, "KEY_D", reservation("/api/x"));

        let processed_at = rx.recv().await.unwrap();
        assert!(processed_at - dispatched_at >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn background_class_uses_its_own_pool() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = PriorityDispatcher::with_processor(
            1,
            1,
            4,
            Arc::new(move |job: &Job| {
                let _ = tx.send(job.reservation.target_endpoint_path.clone());
            }),
        );

        dispatcher.dispatch(PriorityClass::Background, "KEY_B", reservation("/api/bg"));

        let path = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("job never processed")
            .unwrap();
        assert_eq!(path, "/api/bg");
    }

    #[tokio::test]
    async fn fire_and_forget_classes_do_not_block_dispatch() {
        // A single worker stuck behind a full queue must not stall the
        // dispatching side
        let dispatcher = PriorityDispatcher::with_processor(
            1,
            1,
            1,
            Arc::new(|_job: &Job| {
                std::thread::sleep(std::time::Duration::from_millis(20));
            }),
        );

        let started = std::time::Instant::now();
        for _ in 0..16 {
            dispatcher.dispatch(PriorityClass::Immediate, "KEY_I", reservation("/api/x"));
        }
        // Enqueueing happens on detached tasks; dispatch itself returns
        // without waiting for capacity
        assert!(started.elapsed() < std::time::Duration::from_millis(100));
    }
}
