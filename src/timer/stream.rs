use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, warn};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::error::{TimerError, TimerResult};

use super::TimerController;

const STREAM_BUFFER: usize = 8;

/// Live feed of `"{h}h {m}m {s}s"` strings for one timer.
///
/// The feed ends after the timer's final duration has been sent. Dropping
/// the stream, or calling [`ElapsedStream::close`], cancels the polling task.
pub struct ElapsedStream {
    timer_id: String,
    receiver: mpsc::Receiver<String>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ElapsedStream {
    pub fn timer_id(&self) -> &str {
        &self.timer_id
    }

    /// Next formatted elapsed value, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Token tied to the consumer's connection; cancelling it ends the feed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Cancel the polling task and wait for it to exit.
    pub async fn close(mut self) -> Result<()> {
        self.cancel_token.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.context("elapsed stream task failed to join"),
            None => Ok(()),
        }
    }
}

impl Drop for ElapsedStream {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl TimerController {
    /// Open a live elapsed-time feed. Fails with `NotFound` for an unknown
    /// timer before any polling task is spawned.
    pub async fn stream_elapsed(&self, timer_id: &str) -> TimerResult<ElapsedStream> {
        self.get_timer(timer_id).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(elapsed_loop(
            self.clone(),
            timer_id.to_string(),
            self.stream_interval(),
            tx,
            cancel_token.clone(),
        ));

        debug!("Opened elapsed stream for timer {timer_id}");

        Ok(ElapsedStream {
            timer_id: timer_id.to_string(),
            receiver: rx,
            cancel_token,
            handle: Some(handle),
        })
    }
}

async fn elapsed_loop(
    controller: TimerController,
    timer_id: String,
    period: Duration,
    tx: mpsc::Sender<String>,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tx.closed() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = match controller.elapsed(&timer_id).await {
            Ok(snapshot) => snapshot,
            Err(TimerError::NotFound { .. }) => {
                warn!("Timer {timer_id} disappeared; closing elapsed stream");
                break;
            }
            Err(err) => {
                error!("Failed to compute elapsed time for {timer_id}: {err}");
                break;
            }
        };

        let stopped = snapshot.stopped;
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            sent = tx.send(snapshot.formatted) => {
                if sent.is_err() {
                    break;
                }
            }
        }

        if stopped {
            break;
        }
    }

    debug!("Elapsed stream for timer {timer_id} closed");
}
