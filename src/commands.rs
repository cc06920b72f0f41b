//! Request façade: validates incoming identifiers, calls the timer core and
//! shapes replies. `serve` runs it as a JSON-lines loop, one command per
//! input line and one reply (or stream event) per output line.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
    task::JoinSet,
    time,
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::{IntervalRecord, ResumeOutcome, TaskRecord, TimerRecord},
    error::{TimerError, TimerResult},
    productivity::{IdleReport, ProductivityReport},
    timer::{ElapsedSnapshot, ElapsedStream},
    AppState,
};

/// How long open streams may keep delivering after input closes.
pub const EOF_DRAIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    CreateTask {
        user_id: Option<String>,
        name: Option<String>,
    },
    DeleteTask {
        task_id: Option<String>,
    },
    Start {
        task_id: Option<String>,
        user_id: Option<String>,
    },
    Pause {
        timer_id: Option<String>,
    },
    Resume {
        timer_id: Option<String>,
    },
    Stop {
        timer_id: Option<String>,
    },
    Elapsed {
        timer_id: Option<String>,
    },
    Intervals {
        timer_id: Option<String>,
    },
    Productivity {
        user_id: Option<String>,
        range: Option<String>,
    },
    IdleReport {
        user_id: Option<String>,
    },
    Stream {
        timer_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Reply {
    Success {
        ok: bool,
        data: Value,
    },
    Failure {
        ok: bool,
        status: u16,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        existing: Option<TimerRecord>,
    },
    Event {
        event: &'static str,
        timer_id: String,
        value: String,
    },
}

impl Reply {
    fn success(data: Value) -> Self {
        Reply::Success { ok: true, data }
    }

    fn failure(status: u16, error: String) -> Self {
        Reply::Failure {
            ok: false,
            status,
            error,
            existing: None,
        }
    }

    fn elapsed(timer_id: &str, value: String) -> Self {
        Reply::Event {
            event: "elapsed",
            timer_id: timer_id.to_string(),
            value,
        }
    }
}

impl From<TimerError> for Reply {
    fn from(err: TimerError) -> Self {
        let status = err.status_code();
        let error = err.to_string();
        match err {
            TimerError::Conflict { existing } => Reply::Failure {
                ok: false,
                status,
                error,
                existing: Some(*existing),
            },
            TimerError::Storage(ref source) => {
                warn!("Storage failure: {source:#}");
                Reply::failure(status, error)
            }
            _ => Reply::failure(status, error),
        }
    }
}

fn required(value: Option<String>, name: &'static str) -> TimerResult<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(TimerError::Validation(name)),
    }
}

fn to_data<T: Serialize>(value: T) -> TimerResult<Value> {
    serde_json::to_value(value).map_err(|err| TimerError::Storage(err.into()))
}

pub async fn create_task(
    state: &AppState,
    user_id: Option<String>,
    name: Option<String>,
) -> TimerResult<TaskRecord> {
    let user_id = required(user_id, "user_id")?;
    let name = required(name, "name")?;
    state.timer.create_task(&user_id, &name).await
}

pub async fn delete_task(state: &AppState, task_id: Option<String>) -> TimerResult<()> {
    let task_id = required(task_id, "task_id")?;
    state.timer.delete_task(&task_id).await
}

pub async fn start_timer(
    state: &AppState,
    task_id: Option<String>,
    user_id: Option<String>,
) -> TimerResult<TimerRecord> {
    let task_id = required(task_id, "task_id")?;
    let user_id = required(user_id, "user_id")?;
    state.timer.start_timer(&task_id, &user_id).await
}

pub async fn pause_timer(
    state: &AppState,
    timer_id: Option<String>,
) -> TimerResult<IntervalRecord> {
    let timer_id = required(timer_id, "timer_id")?;
    state.timer.pause_timer(&timer_id).await
}

pub async fn resume_timer(
    state: &AppState,
    timer_id: Option<String>,
) -> TimerResult<ResumeOutcome> {
    let timer_id = required(timer_id, "timer_id")?;
    state.timer.resume_timer(&timer_id).await
}

pub async fn stop_timer(state: &AppState, timer_id: Option<String>) -> TimerResult<TimerRecord> {
    let timer_id = required(timer_id, "timer_id")?;
    state.timer.stop_timer(&timer_id).await
}

pub async fn get_elapsed(
    state: &AppState,
    timer_id: Option<String>,
) -> TimerResult<ElapsedSnapshot> {
    let timer_id = required(timer_id, "timer_id")?;
    state.timer.elapsed(&timer_id).await
}

pub async fn get_productivity(
    state: &AppState,
    user_id: Option<String>,
    range: Option<String>,
) -> TimerResult<ProductivityReport> {
    let user_id = required(user_id, "user_id")?;
    let range = required(range, "range")?;
    state
        .timer
        .productivity(&user_id, &range, &state.settings.productivity)
        .await
}

pub async fn get_idle_report(state: &AppState, user_id: Option<String>) -> TimerResult<IdleReport> {
    let user_id = required(user_id, "user_id")?;
    state.timer.idle_report(&user_id).await
}

pub async fn open_stream(state: &AppState, timer_id: Option<String>) -> TimerResult<ElapsedStream> {
    let timer_id = required(timer_id, "timer_id")?;
    state.timer.stream_elapsed(&timer_id).await
}

/// Run every non-streaming command to completion and return its payload.
pub async fn dispatch(state: &AppState, command: Command) -> TimerResult<Value> {
    match command {
        Command::CreateTask { user_id, name } => to_data(create_task(state, user_id, name).await?),
        Command::DeleteTask { task_id } => {
            delete_task(state, task_id).await?;
            Ok(json!({ "deleted": true }))
        }
        Command::Start { task_id, user_id } => to_data(start_timer(state, task_id, user_id).await?),
        Command::Pause { timer_id } => to_data(pause_timer(state, timer_id).await?),
        Command::Resume { timer_id } => to_data(resume_timer(state, timer_id).await?),
        Command::Stop { timer_id } => to_data(stop_timer(state, timer_id).await?),
        Command::Elapsed { timer_id } => to_data(get_elapsed(state, timer_id).await?),
        Command::Intervals { timer_id } => {
            let timer_id = required(timer_id, "timer_id")?;
            to_data(state.timer.list_intervals(&timer_id).await?)
        }
        Command::Productivity { user_id, range } => {
            to_data(get_productivity(state, user_id, range).await?)
        }
        Command::IdleReport { user_id } => to_data(get_idle_report(state, user_id).await?),
        // One-shot callers have no connection to push into; they get the
        // current value.
        Command::Stream { timer_id } => to_data(get_elapsed(state, timer_id).await?),
    }
}

async fn join_forwarders(streams: &mut JoinSet<()>) {
    while let Some(joined) = streams.join_next().await {
        if let Err(err) = joined {
            warn!("Stream forwarder failed: {err}");
        }
    }
}

async fn forward_stream(
    mut stream: ElapsedStream,
    out: mpsc::UnboundedSender<Reply>,
    disconnect: CancellationToken,
) {
    let timer_id = stream.timer_id().to_string();
    loop {
        tokio::select! {
            _ = disconnect.cancelled() => break,
            value = stream.next() => match value {
                Some(value) => {
                    if out.send(Reply::elapsed(&timer_id, value)).is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    if let Err(err) = stream.close().await {
        warn!("Failed to close elapsed stream for {timer_id}: {err:#}");
    }
}

/// Serve commands from `input` until EOF, writing replies to `output`.
/// At EOF, open streams get [`EOF_DRAIN_GRACE`] to deliver pending values
/// and are then cancelled. Returns `output` once every reply has been
/// flushed.
pub async fn serve<R, W>(state: Arc<AppState>, input: R, output: W) -> Result<W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Reply>();

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(reply) = out_rx.recv().await {
            let mut line = serde_json::to_string(&reply).context("failed to encode reply")?;
            line.push('\n');
            output
                .write_all(line.as_bytes())
                .await
                .context("failed to write reply")?;
            output.flush().await.context("failed to flush reply")?;
        }
        Ok::<W, anyhow::Error>(output)
    });

    let disconnect = CancellationToken::new();
    let mut streams = JoinSet::new();
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await.context("failed to read command")? {
        if line.trim().is_empty() {
            continue;
        }

        let command: Command = match serde_json::from_str(&line) {
            Ok(command) => command,
            Err(err) => {
                debug!("Rejected malformed command: {line}");
                let _ = out_tx.send(Reply::failure(400, format!("malformed command: {err}")));
                continue;
            }
        };

        let reply = match command {
            Command::Stream { timer_id } => match open_stream(&state, timer_id).await {
                Ok(stream) => {
                    let reply = Reply::success(json!({
                        "timer_id": stream.timer_id(),
                        "streaming": true,
                    }));
                    let _ = out_tx.send(reply);
                    streams.spawn(forward_stream(
                        stream,
                        out_tx.clone(),
                        disconnect.child_token(),
                    ));
                    continue;
                }
                Err(err) => Reply::from(err),
            },
            other => match dispatch(&state, other).await {
                Ok(data) => Reply::success(data),
                Err(err) => Reply::from(err),
            },
        };

        let _ = out_tx.send(reply);
    }

    // Streams that already ended (a stopped timer's final value) flush
    // within the grace window; live ones are cancelled after it.
    if time::timeout(EOF_DRAIN_GRACE, join_forwarders(&mut streams))
        .await
        .is_err()
    {
        debug!("Cancelling {} open streams at end of input", streams.len());
    }
    disconnect.cancel();
    join_forwarders(&mut streams).await;

    drop(out_tx);
    writer.await.context("reply writer task failed")?
}
