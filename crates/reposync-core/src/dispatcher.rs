use crate::executor::RepoExecutor;
use crate::model::{FailureKind, JobResult, RepoDescriptor};
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Started { name: String },
    Finished(JobResult),
}

pub fn normalized_jobs(requested_jobs: usize, work_item_count: usize) -> usize {
    requested_jobs.max(1).min(work_item_count.max(1))
}

/// Runs every descriptor through `executor` on at most `max_threads` worker
/// threads. Events reach `on_event` on the calling thread in completion
/// order; the returned results are in the same order, one per descriptor.
pub fn run_dispatch<F>(
    repos: Vec<RepoDescriptor>,
    max_threads: usize,
    executor: Arc<dyn RepoExecutor>,
    mut on_event: F,
) -> Vec<JobResult>
where
    F: FnMut(&DispatchEvent),
{
    if repos.is_empty() {
        return Vec::new();
    }

    let order: Vec<String> = repos.iter().map(|repo| repo.name.clone()).collect();
    let mut pending: HashSet<String> = order.iter().cloned().collect();
    let jobs = normalized_jobs(max_threads, repos.len());
    debug!(jobs, repos = repos.len(), "starting workers");

    let queue = Arc::new(Mutex::new(VecDeque::from(repos)));
    let (tx, rx) = mpsc::channel::<DispatchEvent>();
    let mut handles = Vec::with_capacity(jobs);
    for worker in 0..jobs {
        let queue = Arc::clone(&queue);
        let tx = tx.clone();
        let executor = Arc::clone(&executor);
        let spawned = thread::Builder::new()
            .name(format!("reposync-worker-{worker}"))
            .spawn(move || worker_loop(&queue, &tx, executor.as_ref()));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(err) => warn!(worker, error = %err, "failed to spawn worker"),
        }
    }
    drop(tx);

    let mut results = Vec::with_capacity(order.len());
    while let Ok(event) = rx.recv() {
        if let DispatchEvent::Finished(result) = &event {
            if !pending.remove(&result.name) {
                warn!(repo = %result.name, "ignoring duplicate result");
                continue;
            }
            results.push(result.clone());
        }
        on_event(&event);
    }

    for handle in handles {
        if handle.join().is_err() {
            error!("worker thread panicked outside an operation");
        }
    }

    for name in order.iter().filter(|name| pending.contains(*name)) {
        error!(repo = %name, "no result reported; marking failed");
        let result = JobResult::failed(
            name,
            FailureKind::Panicked,
            "worker exited before reporting a result",
        );
        let event = DispatchEvent::Finished(result.clone());
        results.push(result);
        on_event(&event);
    }

    results
}

fn worker_loop(
    queue: &Mutex<VecDeque<RepoDescriptor>>,
    tx: &mpsc::Sender<DispatchEvent>,
    executor: &dyn RepoExecutor,
) {
    loop {
        let next = {
            let mut guard = queue.lock().unwrap_or_else(PoisonError::into_inner);
            guard.pop_front()
        };
        let Some(repo) = next else {
            break;
        };
        let _ = tx.send(DispatchEvent::Started {
            name: repo.name.clone(),
        });

        let started = Instant::now();
        let mut result = match panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&repo))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(repo = %repo.name, panic = %message, "operation panicked");
                let mut result = JobResult::failed(&repo.name, FailureKind::Panicked, message);
                result.duration = started.elapsed();
                result
            }
        };
        result.name = repo.name;
        if tx.send(DispatchEvent::Finished(result)).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "panic with non-string payload".to_string()
}
