use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::{image::RawImage, pipeline::Pipeline};

pub type EnvelopeSender = tokio::sync::broadcast::Sender<EnvelopeCmd>;
pub type EnvelopeReceiver = tokio::sync::broadcast::Receiver<EnvelopeCmd>;

#[derive(Clone)]
pub enum EnvelopeCmd {
    Data(Bytes),
    Eof,
}

/// Async publish surface: raw frames in through an mpsc channel, serialized
/// envelopes out through a broadcast channel, encoding on a blocking worker
/// thread.
pub struct PublisherTask {
    cancel: CancellationToken,
    chan: EnvelopeSender,
}

impl PublisherTask {
    pub fn new() -> Self {
        /// Envelopes are small relative to raw frames; moderate capacity for
        /// bursts.
        const ENVELOPE_CHAN_CAP: usize = 64;
        let (sender, _) = tokio::sync::broadcast::channel(ENVELOPE_CHAN_CAP);
        Self {
            cancel: CancellationToken::new(),
            chan: sender,
        }
    }

    pub fn subscribe(&self) -> EnvelopeReceiver {
        self.chan.subscribe()
    }

    /// Envelope stream terminated by a `None` item at end of stream.
    pub fn envelope_stream(&self) -> futures::stream::BoxStream<'static, Option<Bytes>> {
        BroadcastStream::new(self.chan.subscribe())
            .filter_map(|r| async move {
                match r {
                    Ok(EnvelopeCmd::Data(envelope)) => Some(Some(envelope)),
                    Ok(EnvelopeCmd::Eof) => Some(None),
                    Err(_) => None,
                }
            })
            .boxed()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn start(&self, pipeline: Pipeline, mut frames: tokio::sync::mpsc::Receiver<RawImage>) {
        let cancel = self.cancel.clone();
        let out = self.chan.clone();
        /// Bounded handoff to the blocking encoder thread; back-pressure over
        /// unbounded growth.
        const FRAME_QUEUE_BOUND: usize = 16;
        /// Log "queue full" at most every N drops so info logs stay clean.
        const DROP_LOG_INTERVAL: u64 = 120;
        tokio::spawn(async move {
            let (tx, rx) = std::sync::mpsc::sync_channel::<Option<RawImage>>(FRAME_QUEUE_BOUND);
            let worker_cancel = cancel.clone();
            let worker = tokio::task::spawn_blocking(move || {
                Self::publish_loop(pipeline, worker_cancel, rx, out)
            });
            let mut dropped: u64 = 0;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    frame = frames.recv() => match frame {
                        Some(frame) => match tx.try_send(Some(frame)) {
                            Ok(()) => {}
                            Err(std::sync::mpsc::TrySendError::Full(_)) => {
                                dropped += 1;
                                if dropped % DROP_LOG_INTERVAL == 1 {
                                    log::debug!(
                                        "publisher frame queue full, dropped {} frames",
                                        dropped
                                    );
                                }
                            }
                            Err(std::sync::mpsc::TrySendError::Disconnected(_)) => break,
                        },
                        None => {
                            // Source finished; hand the flush marker over.
                            let _ = tx.send(None);
                            break;
                        }
                    },
                }
            }
            let _ = worker.await;
            log::info!("publisher task finished");
        });
    }

    fn publish_loop(
        pipeline: Pipeline,
        cancel: CancellationToken,
        rx: std::sync::mpsc::Receiver<Option<RawImage>>,
        out: EnvelopeSender,
    ) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match rx.recv_timeout(Duration::from_millis(1)) {
                Ok(Some(image)) => {
                    let result = pipeline.publish(&image, |envelope| {
                        let _ = out.send(EnvelopeCmd::Data(envelope));
                    });
                    if let Err(e) = result {
                        log::error!("publish error: {}", e);
                    }
                }
                Ok(None) => {
                    let result = pipeline.finish(|envelope| {
                        let _ = out.send(EnvelopeCmd::Data(envelope));
                    });
                    if let Err(e) = result {
                        log::error!("flush error: {}", e);
                    }
                    break;
                }
                Err(_) => (),
            }
        }
        let _ = out.send(EnvelopeCmd::Eof);
    }
}

#[cfg(test)]
#[path = "task_test.rs"]
mod task_test;
