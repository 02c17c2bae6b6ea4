//! Bounded worker pool for part uploads
//!
//! A fixed number of tokio workers pull indexed tasks from a bounded queue,
//! so submitting blocks once every worker is busy and the queue is full.
//! Results come back tagged with their submission index and in completion
//! order; callers reorder them.

use std::sync::Arc;

use futures::future::BoxFuture;
use osc_core::{Error, Result};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

type Task<T> = (usize, BoxFuture<'static, Result<T>>);

pub struct WorkerPool<T> {
    tasks: Option<mpsc::Sender<Task<T>>>,
    results: mpsc::UnboundedReceiver<(usize, Result<T>)>,
    workers: Vec<JoinHandle<()>>,
    submitted: usize,
    received: Vec<(usize, T)>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Start `size` workers (at least one)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (task_tx, task_rx) = mpsc::channel::<Task<T>>(size);
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let task_rx = Arc::new(Mutex::new(task_rx));

        let workers = (0..size)
            .map(|_| {
                let task_rx = Arc::clone(&task_rx);
                let result_tx = result_tx.clone();
                tokio::spawn(async move {
                    loop {
                        let next = task_rx.lock().await.recv().await;
                        let Some((index, task)) = next else {
                            break;
                        };
                        if result_tx.send((index, task.await)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self {
            tasks: Some(task_tx),
            results: result_rx,
            workers,
            submitted: 0,
            received: Vec::new(),
        }
    }

    /// Queue a task, waiting while the queue is full.
    ///
    /// Fails fast with the first error already reported by a worker.
    pub async fn submit(&mut self, index: usize, task: BoxFuture<'static, Result<T>>) -> Result<()> {
        self.drain_ready()?;
        let tasks = self
            .tasks
            .as_ref()
            .ok_or_else(|| Error::General("worker pool already joined".into()))?;
        tasks
            .send((index, task))
            .await
            .map_err(|_| Error::General("worker pool stopped".into()))?;
        self.submitted += 1;
        Ok(())
    }

    fn drain_ready(&mut self) -> Result<()> {
        while let Ok((index, result)) = self.results.try_recv() {
            match result {
                Ok(value) => self.received.push((index, value)),
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Wait for every submitted task, returning results in completion order.
    ///
    /// The first failure stops the remaining workers and is returned.
    pub async fn join(mut self) -> Result<Vec<(usize, T)>> {
        self.tasks = None;
        self.drain_ready()?;
        while self.received.len() < self.submitted {
            match self.results.recv().await {
                Some((index, Ok(value))) => self.received.push((index, value)),
                Some((_, Err(e))) => {
                    self.abort();
                    return Err(e);
                }
                None => {
                    return Err(Error::General(format!(
                        "worker pool stopped after {} of {} tasks",
                        self.received.len(),
                        self.submitted
                    )));
                }
            }
        }
        Ok(std::mem::take(&mut self.received))
    }

    fn abort(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
