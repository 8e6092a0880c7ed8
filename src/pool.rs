use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::detector::DetectorError;

pub const DEFAULT_DETECTOR_WORKERS: usize = 2;

type Factory<T> = Box<dyn Fn() -> Result<T, DetectorError> + Send + Sync>;

#[derive(Debug)]
struct PoolState<T> {
    idle: Vec<T>,
    created: usize,
    busy: usize,
}

/// Fixed number of blocking workers, each with its own `T`.
///
/// Jobs never wait for a worker: when all of them are busy the job is refused
/// with [`DetectorError::Busy`]. At most `capacity` jobs run at once.
pub struct WorkerPool<T> {
    state: Mutex<PoolState<T>>,
    capacity: usize,
    make: Factory<T>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new<F>(capacity: usize, make: F) -> Self
    where
        F: Fn() -> Result<T, DetectorError> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                created: 0,
                busy: 0,
            }),
            capacity: capacity.max(1),
            make: Box::new(make),
        }
    }

    /// Pool seeded with an already built worker.
    pub fn with_worker<F>(capacity: usize, worker: T, make: F) -> Self
    where
        F: Fn() -> Result<T, DetectorError> + Send + Sync + 'static,
    {
        let pool = Self::new(capacity, make);
        {
            let mut state = pool.state();
            state.idle.push(worker);
            state.created = 1;
        }
        pool
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs currently holding a worker.
    pub fn in_flight(&self) -> usize {
        self.state().busy
    }

    /// Runs `job` on a blocking thread with a worker of its own.
    pub async fn run<R, J>(self: &Arc<Self>, job: J) -> Result<R, DetectorError>
    where
        R: Send + 'static,
        J: FnOnce(&mut T) -> Result<R, DetectorError> + Send + 'static,
    {
        let mut checkout = self.checkout()?;
        tokio::task::spawn_blocking(move || -> Result<R, DetectorError> {
            let mut worker = match checkout.worker.take() {
                Some(worker) => worker,
                None => (checkout.pool.make)()?,
            };
            let result = job(&mut worker);
            checkout.worker = Some(worker);
            result
        })
        .await?
    }

    fn checkout(self: &Arc<Self>) -> Result<Checkout<T>, DetectorError> {
        let mut state = self.state();
        let worker = match state.idle.pop() {
            Some(worker) => Some(worker),
            None if state.created < self.capacity => {
                state.created += 1;
                None
            }
            None => return Err(DetectorError::Busy),
        };
        state.busy += 1;
        Ok(Checkout {
            pool: self.clone(),
            worker,
        })
    }

    fn state(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A claimed worker slot. Hands the worker back, or frees the slot, on drop.
struct Checkout<T: Send + 'static> {
    pool: Arc<WorkerPool<T>>,
    worker: Option<T>,
}

impl<T: Send + 'static> Drop for Checkout<T> {
    fn drop(&mut self) {
        let mut state = self.pool.state();
        state.busy -= 1;
        match self.worker.take() {
            Some(worker) => state.idle.push(worker),
            // building the worker failed
            None => state.created -= 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_pool(capacity: usize, built: Arc<AtomicUsize>) -> Arc<WorkerPool<usize>> {
        Arc::new(WorkerPool::new(capacity, move || {
            Ok(built.fetch_add(1, Ordering::SeqCst))
        }))
    }

    #[tokio::test]
    async fn reuses_idle_worker() {
        let built = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(2, built.clone());

        let first = pool.run(|worker| Ok(*worker)).await.unwrap();
        let second = pool.run(|worker| Ok(*worker)).await.unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 0);
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn seeded_worker_is_used_first() {
        let pool = Arc::new(WorkerPool::with_worker(1, "seed", || {
            Err(DetectorError::Busy)
        }));
        assert_eq!(pool.run(|worker| Ok(*worker)).await.unwrap(), "seed");
    }

    #[tokio::test]
    async fn refuses_jobs_past_capacity() {
        let pool = counting_pool(1, Arc::new(AtomicUsize::new(0)));
        let (release, wait) = std::sync::mpsc::channel::<()>();

        let slow = tokio::spawn({
            let pool = pool.clone();
            async move {
                pool.run(move |_| {
                    _ = wait.recv_timeout(Duration::from_secs(5));
                    Ok(())
                })
                .await
            }
        });
        while pool.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let refused = pool.run(|_| Ok(())).await;
        assert!(matches!(refused, Err(DetectorError::Busy)));

        release.send(()).unwrap();
        slow.await.unwrap().unwrap();
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.run(|_| Ok(())).await.is_ok());
    }

    #[tokio::test]
    async fn failed_build_frees_the_slot() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(WorkerPool::new(1, {
            let attempts = attempts.clone();
            move || {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DetectorError::ModelLoad {
                        path: "cascade.xml".to_owned(),
                        reason: "flaky disk".to_owned(),
                    })
                } else {
                    Ok(())
                }
            }
        }));

        assert!(matches!(
            pool.run(|_| Ok(())).await,
            Err(DetectorError::ModelLoad { .. })
        ));
        assert!(pool.run(|_| Ok(())).await.is_ok());
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn overlapping_jobs_run_side_by_side() {
        let pool = counting_pool(2, Arc::new(AtomicUsize::new(0)));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..2)
            .map(|_| {
                let pool = pool.clone();
                let running = running.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    pool.run(move |_| {
                        running.fetch_add(1, Ordering::SeqCst);
                        let deadline = std::time::Instant::now() + Duration::from_secs(2);
                        while running.load(Ordering::SeqCst) < 2
                            && std::time::Instant::now() < deadline
                        {
                            std::thread::sleep(Duration::from_millis(1));
                        }
                        peak.fetch_max(running.load(Ordering::SeqCst), Ordering::SeqCst);
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
                })
            })
            .collect();

        for job in jobs {
            job.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
