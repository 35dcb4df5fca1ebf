//! Bounded-time inference requests.
//!
//! `InferenceWorker` owns a detector backend on a dedicated thread. The driver
//! submits one request per frame and waits for the reply up to a timeout. A
//! request that times out is abandoned: its late reply is recognised by id and
//! discarded, so it can never be attributed to a later frame.
//!
//! Dropping the worker closes the request channel and joins the thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use super::backend::{DetectorBackend, ModelInput};
use super::result::{Detection, InferenceOutput};

/// Requests that may wait behind one still running (abandoned) request.
const REQUEST_QUEUE_DEPTH: usize = 1;

struct Request {
    id: u64,
    input: ModelInput,
}

struct Reply {
    id: u64,
    result: Result<Vec<Detection>>,
    latency: Duration,
}

pub struct InferenceWorker {
    requests: Option<SyncSender<Request>>,
    replies: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
    input_size: Option<(u32, u32)>,
    backend_name: &'static str,
    timeout: Duration,
    next_id: u64,
}

impl InferenceWorker {
    /// Warm the backend up and move it onto its worker thread.
    pub fn spawn(mut backend: Box<dyn DetectorBackend>, timeout: Duration) -> Result<Self> {
        backend
            .warm_up()
            .with_context(|| format!("warm up {} backend", backend.name()))?;
        let input_size = backend.input_size();
        let backend_name = backend.name();

        let (request_tx, request_rx) = mpsc::sync_channel::<Request>(REQUEST_QUEUE_DEPTH);
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        let handle = std::thread::Builder::new()
            .name(format!("infer-{}", backend_name))
            .spawn(move || {
                for request in request_rx {
                    let started = Instant::now();
                    let result = backend.detect(&request.input);
                    let reply = Reply {
                        id: request.id,
                        result,
                        latency: started.elapsed(),
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                log::debug!("inference worker for {} stopped", backend.name());
            })
            .context("spawn inference worker thread")?;

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            handle: Some(handle),
            input_size,
            backend_name,
            timeout,
            next_id: 0,
        })
    }

    /// Input resolution declared by the backend.
    pub fn input_size(&self) -> Option<(u32, u32)> {
        self.input_size
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit one request and wait for its reply.
    ///
    /// Fails when the backend errors, when the reply does not arrive within the
    /// timeout, or when the worker is still busy with abandoned requests.
    pub fn infer(&mut self, input: ModelInput) -> Result<InferenceOutput> {
        self.next_id += 1;
        let id = self.next_id;
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("inference worker is shut down"))?;

        match requests.try_send(Request { id, input }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                return Err(anyhow!("inference engine busy with an abandoned request"))
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err(anyhow!("inference worker thread exited"))
            }
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.id == id => {
                    let detections = reply.result?;
                    return Ok(InferenceOutput {
                        detections,
                        latency: reply.latency,
                    });
                }
                Ok(stale) => {
                    log::debug!("discarding late inference reply for request {}", stale.id);
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(anyhow!(
                        "inference timed out after {} ms",
                        self.timeout.as_millis()
                    ))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("inference worker thread exited"))
                }
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after its current request.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
