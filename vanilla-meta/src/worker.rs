use crate::error::Result;
use crate::error::VanillaMetaError;
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Single FIFO worker. Jobs run one at a time in submission order, so a
/// job observes every effect of the jobs submitted before it.
#[derive(Clone)]
pub(crate) struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
}

impl JobQueue {
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        spawn_worker(rx, shutdown.clone());
        Self { tx, shutdown }
    }

    pub(crate) async fn submit<T, F, Fut>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(VanillaMetaError::WorkerGone);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let _ = reply_tx.send(job().await);
            })
        });
        self.tx
            .send(job)
            .map_err(|_| VanillaMetaError::WorkerGone)?;
        reply_rx.await.map_err(|_| VanillaMetaError::WorkerGone)?
    }

    /// Stops the worker after the job in flight; queued and later jobs fail
    /// with [`VanillaMetaError::WorkerGone`].
    pub(crate) fn shutdown(&self) {
        self.shutdown.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

fn spawn_worker(mut rx: mpsc::UnboundedReceiver<Job>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        loop {
            let job = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            job().await;
        }
        rx.close();
        debug!("vanilla_meta worker stopped");
    });
}
