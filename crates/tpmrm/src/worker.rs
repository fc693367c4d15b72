//! Runs one [`Transceiver`] on a dedicated thread and serializes every
//! caller through a bounded queue, one command at a time.

use std::thread::JoinHandle;

use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::WorkerError;
use crate::manager::ResourceManager;
use crate::transceiver::{ResponseCallback, Transceiver};

enum Request {
    Init(oneshot::Sender<bool>),
    Command { command: Vec<u8>, reply: Reply },
}

enum Reply {
    Channel(oneshot::Sender<Vec<u8>>),
    /// Run on the runtime of the caller that queued the command.
    Callback(ResponseCallback, RuntimeHandle),
}

pub struct ResourceManagerService {
    sender: mpsc::Sender<Request>,
    worker: JoinHandle<()>,
}

impl ResourceManagerService {
    /// Moves `manager` onto a new worker thread, queueing up to its
    /// configured `queue_depth`.
    pub fn for_manager<T>(manager: ResourceManager<T>) -> Result<Self, WorkerError>
    where
        T: Transceiver + Send + 'static,
    {
        let queue_depth = manager.config().queue_depth;
        Self::spawn(manager, queue_depth)
    }

    /// Moves `transceiver` onto a new worker thread. `queue_depth` bounds the
    /// number of commands waiting behind the one in progress.
    pub fn spawn<T>(transceiver: T, queue_depth: usize) -> Result<Self, WorkerError>
    where
        T: Transceiver + Send + 'static,
    {
        if queue_depth == 0 {
            return Err(WorkerError::ZeroQueueDepth);
        }
        let (sender, receiver) = mpsc::channel(queue_depth);
        let worker = std::thread::Builder::new()
            .name("tpmrm-worker".to_string())
            .spawn(move || run(transceiver, receiver))?;
        Ok(Self { sender, worker })
    }

    /// Runs the transceiver's one-time setup on the worker.
    pub async fn start(&self) -> Result<(), WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Request::Init(tx))
            .await
            .map_err(|_| WorkerError::QueueClosed)?;
        if rx.await.map_err(|_| WorkerError::WorkerGone)? {
            Ok(())
        } else {
            Err(WorkerError::InitFailed)
        }
    }

    pub async fn send_and_wait(&self, command: Vec<u8>) -> Result<Vec<u8>, WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Request::Command {
                command,
                reply: Reply::Channel(tx),
            })
            .await
            .map_err(|_| WorkerError::QueueClosed)?;
        rx.await.map_err(|_| WorkerError::WorkerGone)
    }

    /// Queues `command` without waiting. `callback` runs on the calling
    /// tokio runtime once the response is ready.
    pub fn send(&self, command: Vec<u8>, callback: ResponseCallback) -> Result<(), WorkerError> {
        let runtime = RuntimeHandle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        self.sender
            .try_send(Request::Command {
                command,
                reply: Reply::Callback(callback, runtime),
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => WorkerError::QueueFull,
                TrySendError::Closed(_) => WorkerError::QueueClosed,
            })
    }

    /// For callers outside any async runtime. Panics if called from within one.
    pub fn blocking_send_and_wait(&self, command: Vec<u8>) -> Result<Vec<u8>, WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .blocking_send(Request::Command {
                command,
                reply: Reply::Channel(tx),
            })
            .map_err(|_| WorkerError::QueueClosed)?;
        rx.blocking_recv().map_err(|_| WorkerError::WorkerGone)
    }

    /// Closes the queue and waits for queued commands to finish.
    pub fn shutdown(self) {
        let Self { sender, worker } = self;
        drop(sender);
        if worker.join().is_err() {
            error!("resource manager worker panicked");
        }
    }
}

fn run<T: Transceiver>(mut transceiver: T, mut receiver: mpsc::Receiver<Request>) {
    info!("resource manager worker started");
    while let Some(request) = receiver.blocking_recv() {
        match request {
            Request::Init(reply) => {
                if reply.send(transceiver.init()).is_err() {
                    debug!("caller went away before initialization finished");
                }
            }
            Request::Command { command, reply } => {
                let response = transceiver.send_and_wait(&command);
                match reply {
                    Reply::Channel(tx) => {
                        if tx.send(response).is_err() {
                            debug!("caller went away before the response was ready");
                        }
                    }
                    Reply::Callback(callback, runtime) => {
                        runtime.spawn(async move { callback(response) });
                    }
                }
            }
        }
    }
    info!("resource manager worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes commands back and counts how many ran concurrently.
    struct Echo {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        healthy: bool,
    }

    impl Transceiver for Echo {
        fn send_and_wait(&mut self, command: &[u8]) -> Vec<u8> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(1));
            self.active.fetch_sub(1, Ordering::SeqCst);
            command.to_vec()
        }

        fn init(&mut self) -> bool {
            self.healthy
        }
    }

    fn echo(healthy: bool) -> (Echo, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        let echo = Echo {
            active: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
            healthy,
        };
        (echo, peak)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn serializes_concurrent_callers() {
        let (transceiver, peak) = echo(true);
        let service = Arc::new(ResourceManagerService::spawn(transceiver, 4).unwrap());
        service.start().await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..16u8 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service.send_and_wait(vec![i]).await.unwrap()
            }));
        }
        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), vec![i as u8]);
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_is_delivered_on_caller_runtime() {
        let (transceiver, _) = echo(true);
        let service = ResourceManagerService::spawn(transceiver, 4).unwrap();
        let (tx, rx) = oneshot::channel();
        service
            .send(vec![7, 7], Box::new(move |response| {
                let _ = tx.send(response);
            }))
            .unwrap();
        assert_eq!(rx.await.unwrap(), vec![7, 7]);
    }

    #[tokio::test]
    async fn start_reports_failed_init() {
        let (transceiver, _) = echo(false);
        let service = ResourceManagerService::spawn(transceiver, 1).unwrap();
        assert!(matches!(service.start().await, Err(WorkerError::InitFailed)));
    }

    #[test]
    fn zero_queue_depth_is_rejected() {
        let (transceiver, _) = echo(true);
        assert!(matches!(
            ResourceManagerService::spawn(transceiver, 0),
            Err(WorkerError::ZeroQueueDepth)
        ));
    }

    #[test]
    fn callback_send_needs_a_runtime() {
        let (transceiver, _) = echo(true);
        let service = ResourceManagerService::spawn(transceiver, 1).unwrap();
        assert!(matches!(
            service.send(vec![1], Box::new(|_| {})),
            Err(WorkerError::NoRuntime)
        ));
        assert_eq!(service.blocking_send_and_wait(vec![1, 2]).unwrap(), vec![1, 2]);
        service.shutdown();
    }
}
