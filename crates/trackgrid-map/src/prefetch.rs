use crate::chunk::{ChunkKey, VectorChunk};
use crate::config::PrefetchConfig;
use crate::error::{GridError, GridResult};
use crate::store::GridStore;

use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct PrefetchJob {
    key: ChunkKey,
    cancel: Arc<AtomicBool>,
    reply: Sender<GridResult<Arc<VectorChunk>>>,
}

/// Background threads that pull chunks into a [`GridStore`] so callers don't block on fetches and retries.
pub struct PrefetchPool {
    jobs: Option<Sender<PrefetchJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl PrefetchPool {
    pub fn new(store: Arc<GridStore>, config: &PrefetchConfig) -> Self {
        let (jobs, rx_job) = channel::bounded::<PrefetchJob>(config.max_pending.max(1));
        let workers = (0..config.num_threads.max(1))
            .map(|_| {
                let store = store.clone();
                let rx_job = rx_job.clone();
                thread::spawn(move || run_worker(&store, rx_job))
            })
            .collect();
        Self {
            jobs: Some(jobs),
            workers,
        }
    }

    /// Queues a fetch of the chunk at `key`. Blocks while the queue is full.
    pub fn prefetch(&self, key: ChunkKey) -> PrefetchHandle {
        let (reply, result) = channel::bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let job = PrefetchJob {
            key,
            cancel: cancel.clone(),
            reply,
        };
        if let Some(jobs) = self.jobs.as_ref() {
            // A send error drops the job and its reply sender, which `wait` reports as `WorkerGone`.
            let _ = jobs.send(job);
        }
        PrefetchHandle {
            key,
            cancel,
            result,
        }
    }
}

impl Drop for PrefetchPool {
    fn drop(&mut self) {
        // Workers exit once the job channel is closed and drained.
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Prefetch worker panicked");
            }
        }
    }
}

fn run_worker(store: &GridStore, rx_job: Receiver<PrefetchJob>) {
    while let Ok(job) = rx_job.recv() {
        let result = if job.cancel.load(Ordering::Acquire) {
            Err(GridError::Cancelled(job.key))
        } else {
            store.chunk_with_cancel(job.key, Some(&job.cancel))
        };
        if let Err(e) = &result {
            log::debug!("Prefetch of chunk {:?} ended: {}", job.key, e);
        }
        // The requester may have dropped its handle.
        let _ = job.reply.send(result);
    }
}

/// The pending result of [`PrefetchPool::prefetch`].
pub struct PrefetchHandle {
    key: ChunkKey,
    cancel: Arc<AtomicBool>,
    result: Receiver<GridResult<Arc<VectorChunk>>>,
}

impl PrefetchHandle {
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// Asks the worker to stop. Takes effect before the next fetch attempt; a stream already being read is finished.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// The result, if the worker is done.
    pub fn try_wait(&self) -> Option<GridResult<Arc<VectorChunk>>> {
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(channel::TryRecvError::Empty) => None,
            Err(channel::TryRecvError::Disconnected) => Some(Err(GridError::WorkerGone(self.key))),
        }
    }

    pub fn wait(self) -> GridResult<Arc<VectorChunk>> {
        self.result
            .recv()
            .unwrap_or(Err(GridError::WorkerGone(self.key)))
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
