//! Bounded worker pool that runs [`ActionBundle`]s (§4.J).
//!
//! Grounded on `original_source/sync/sync_queue.py`'s bounded queue:
//! a fixed number of worker threads pull bundles off a
//! `crossbeam::channel::bounded` queue and run each sequentially via
//! [`execute_bundle`], while a `tokio::sync::Semaphore` sized `workers +
//! 1000` gates [`Scheduler::submit`] so the producer (the orchestrator
//! walking the diff) never runs far ahead of the workers.

use crate::action::{execute_bundle, ActionBundle, ActionContext};
use crate::error::{collect_action_errors, Result, SyncError};
use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Extra slack above the worker count before `submit` starts blocking
/// (§4.J). Generous on purpose: the producer is a fast in-memory walk,
/// workers are the slow side, so a deep queue keeps workers fed without
/// unbounded memory growth.
const QUEUE_SLACK: usize = 1000;

struct QueuedBundle {
    bundle: ActionBundle,
    _permit: OwnedSemaphorePermit,
}

/// Drives a pool of worker threads over submitted [`ActionBundle`]s.
pub struct Scheduler {
    sender: Option<Sender<QueuedBundle>>,
    handles: Vec<JoinHandle<()>>,
    semaphore: Arc<Semaphore>,
    errors: Arc<Mutex<Vec<SyncError>>>,
}

impl Scheduler {
    /// Spawns `workers` worker threads sharing `ctx`. `dry_run` is
    /// forwarded to every action's `run()` (§5 `--dryrun`).
    pub fn new(workers: usize, ctx: Arc<ActionContext>, dry_run: bool) -> Self {
        let workers = workers.max(1);
        let capacity = workers + QUEUE_SLACK;
        let (sender, receiver): (Sender<QueuedBundle>, Receiver<QueuedBundle>) = bounded(capacity);
        let semaphore = Arc::new(Semaphore::new(capacity));
        let errors: Arc<Mutex<Vec<SyncError>>> = Arc::new(Mutex::new(Vec::new()));

        let handles = (0..workers)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let ctx = Arc::clone(&ctx);
                let errors = Arc::clone(&errors);
                std::thread::Builder::new()
                    .name(format!("securesync-worker-{worker_id}"))
                    .spawn(move || {
                        while let Ok(queued) = receiver.recv() {
                            if let Err(e) = execute_bundle(&queued.bundle, &ctx, dry_run) {
                                errors.lock().unwrap().push(e);
                            }
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            handles,
            semaphore,
            errors,
        }
    }

    /// Enqueues a bundle, awaiting (on a semaphore permit, not the
    /// channel) if `workers + 1000` bundles are already queued or
    /// in-flight (§4.J back-pressure). Never blocks on the channel
    /// itself: the permit is the real limiter, the channel capacity just
    /// matches it so a send never fails for being full.
    pub async fn submit(&self, bundle: ActionBundle) -> Result<()> {
        let semaphore = Arc::clone(&self.semaphore);
        let permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| SyncError::Scheduler("worker pool semaphore closed".into()))?;

        self.sender
            .as_ref()
            .expect("submit called after shutdown")
            .send(QueuedBundle {
                bundle,
                _permit: permit,
            })
            .map_err(|_| SyncError::Scheduler("worker pool is no longer accepting work".into()))
    }

    /// Closes the queue, waits for every worker to drain it, and returns
    /// every error collected along the way as a single
    /// [`SyncError::SyncIncomplete`] if any occurred (§7).
    pub fn finish(mut self) -> Result<()> {
        drop(self.sender.take());
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        let errors = std::mem::take(&mut *self.errors.lock().unwrap());
        let results: Vec<Result<()>> = errors.into_iter().map(Err).collect();
        collect_action_errors(results).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::index::SecureIndex;
    use crate::progress::ProgressReporter;
    use crate::remote::{RemoteFileInfo, RemoteStore, UploadResult};
    use crate::secure_name::Salts;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct NullRemote;

    #[async_trait]
    impl RemoteStore for NullRemote {
        async fn upload(&self, _data: &[u8], _name: &str) -> Result<UploadResult> {
            unreachable!()
        }
        async fn download_by_name(&self, _name: &str) -> Result<Vec<u8>> {
            unreachable!()
        }
        async fn delete_version(&self, _id: &str, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn list_file_names(&self, _prefix: &str, _limit: usize) -> Result<Vec<RemoteFileInfo>> {
            Ok(Vec::new())
        }
        async fn stat(&self, _name: &str) -> Result<Option<i64>> {
            Ok(None)
        }
    }

    struct CountingAction {
        counter: Arc<AtomicUsize>,
    }

    impl Action for CountingAction {
        fn relative_path(&self) -> &str {
            "counting"
        }
        fn bytes(&self) -> u64 {
            0
        }
        fn kind(&self) -> &'static str {
            "test-count"
        }
        fn run(&self, _ctx: &ActionContext, _dry_run: bool) -> Result<()> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_context(tmp: &tempfile::TempDir, runtime: &tokio::runtime::Runtime) -> Arc<ActionContext> {
        let index = SecureIndex::open(tmp.path().join("index.db")).unwrap();
        Arc::new(ActionContext {
            remote: Arc::new(NullRemote),
            index,
            salts: Salts::new("salt-name", vec![0u8; 16]).unwrap(),
            passphrase: "pw".into(),
            local_root: tmp.path().to_path_buf(),
            large_file_threshold: u64::MAX,
            test_mode: true,
            reporter: Arc::new(ProgressReporter::disabled()),
            shutdown: Arc::new(AtomicBool::new(false)),
            runtime: runtime.handle().clone(),
        })
    }

    #[test]
    fn runs_every_submitted_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&tmp, &runtime);
        let counter = Arc::new(AtomicUsize::new(0));

        let scheduler = Scheduler::new(4, ctx, false);
        for _ in 0..25 {
            let bundle: ActionBundle = vec![Box::new(CountingAction {
                counter: Arc::clone(&counter),
            })];
            runtime.block_on(scheduler.submit(bundle)).unwrap();
        }
        scheduler.finish().unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 25);
    }

    struct FailingAction;
    impl Action for FailingAction {
        fn relative_path(&self) -> &str {
            "boom"
        }
        fn bytes(&self) -> u64 {
            0
        }
        fn kind(&self) -> &'static str {
            "test-fail"
        }
        fn run(&self, _ctx: &ActionContext, _dry_run: bool) -> Result<()> {
            Err(SyncError::Scheduler("boom".into()))
        }
    }

    #[test]
    fn collects_errors_from_failed_bundles() {
        let tmp = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = test_context(&tmp, &runtime);

        let scheduler = Scheduler::new(2, ctx, false);
        runtime
            .block_on(scheduler.submit(vec![Box::new(FailingAction)]))
            .unwrap();
        let result = scheduler.finish();

        assert!(result.is_err());
    }
}
