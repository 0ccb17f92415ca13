//! Background worker for loading archives off the caller's thread.
//!
//! A [`Worker`] owns one dedicated thread. Requests travel over a bounded
//! `tokio` channel together with a oneshot reply channel, so async callers
//! can await results without blocking their runtime. Errors come back as
//! `Err` payloads with the same [`ClimarcError`] the synchronous API returns.
//!
//! A request that has started decoding runs to completion; there is no
//! cancellation.

use crate::config::LoadConfig;
use crate::pipeline;
use climarc_core::error::{ClimarcError, Result};
use climarc_dataset::Dataset;
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// Number of requests that may wait in the queue.
pub const QUEUE_DEPTH: usize = 16;

type Reply<T> = oneshot::Sender<Result<T>>;

#[derive(Debug)]
enum Request {
    Decompress { data: Vec<u8>, reply: Reply<Vec<u8>> },
    Parse { data: Vec<u8>, reply: Reply<Dataset> },
    Load { data: Vec<u8>, reply: Reply<Dataset> },
}

/// Handle to a background loading thread.
#[derive(Debug)]
pub struct Worker {
    tx: Option<mpsc::Sender<Request>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start a worker thread using `config` for every request.
    pub fn spawn(config: LoadConfig) -> Result<Self> {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let handle = thread::Builder::new()
            .name("climarc-worker".into())
            .spawn(move || run(rx, config))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Decompress an archive into raw dataset bytes.
    pub async fn decompress(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        self.call(|reply| Request::Decompress { data, reply }).await
    }

    /// Parse raw dataset bytes.
    pub async fn parse(&self, data: Vec<u8>) -> Result<Dataset> {
        self.call(|reply| Request::Parse { data, reply }).await
    }

    /// Decompress and parse an archive.
    pub async fn load(&self, data: Vec<u8>) -> Result<Dataset> {
        self.call(|reply| Request::Load { data, reply }).await
    }

    async fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ClimarcError::worker_unavailable("worker is shut down"))?;

        let (reply, response) = oneshot::channel();
        tx.send(request(reply))
            .await
            .map_err(|_| ClimarcError::worker_unavailable("worker thread has exited"))?;

        response
            .await
            .map_err(|_| ClimarcError::worker_unavailable("worker dropped the request"))?
    }

    /// Close the queue and wait for the thread to finish queued requests.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("climarc worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut rx: mpsc::Receiver<Request>, config: LoadConfig) {
    debug!("worker started");
    while let Some(request) = rx.blocking_recv() {
        let delivered = match request {
            Request::Decompress { data, reply } => {
                reply.send(pipeline::decompress(&data, &config)).is_ok()
            }
            Request::Parse { data, reply } => reply.send(pipeline::parse(&data)).is_ok(),
            Request::Load { data, reply } => reply.send(pipeline::load(&data, &config)).is_ok(),
        };
        if !delivered {
            trace!("caller went away before the reply");
        }
    }
    debug!("worker stopped");
}
