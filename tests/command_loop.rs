mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tasktimer_lib::{commands::serve, timer::AccountingMode, AppState, Settings};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

use common::{Harness, USER};

async fn run(state: Arc<AppState>, lines: &[String]) -> Vec<Value> {
    let input = lines.join("\n");
    let output = serve(state, input.as_bytes(), Vec::new()).await.unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn transitions_round_trip_through_the_loop() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();
    let state = Arc::new(AppState::with_controller(h.timers.clone(), Settings::default()));

    let replies = run(
        state,
        &[
            json!({ "cmd": "start", "task_id": task.id, "user_id": USER }).to_string(),
            json!({ "cmd": "pause" }).to_string(),
            json!({ "cmd": "pause", "timer_id": timer.id }).to_string(),
            json!({ "cmd": "resume", "timer_id": timer.id }).to_string(),
            json!({ "cmd": "productivity", "user_id": USER, "range": "yearly" }).to_string(),
            "this is not json".to_string(),
            String::new(),
            json!({ "cmd": "stop", "timer_id": timer.id }).to_string(),
            json!({ "cmd": "stream", "timer_id": "missing" }).to_string(),
        ],
    )
    .await;

    assert_eq!(replies.len(), 8);

    assert_eq!(replies[0]["ok"], json!(false));
    assert_eq!(replies[0]["status"], json!(409));
    assert_eq!(replies[0]["existing"]["id"], json!(timer.id));

    assert_eq!(replies[1]["status"], json!(400));
    assert_eq!(replies[1]["error"], json!("timer_id is required"));

    assert_eq!(replies[2]["ok"], json!(true));
    assert_eq!(replies[2]["data"]["timer_id"], json!(timer.id));

    assert_eq!(replies[3]["data"]["added_duration"], json!(0));

    assert_eq!(replies[4]["status"], json!(400));
    assert_eq!(replies[5]["status"], json!(400));

    assert_eq!(replies[6]["ok"], json!(true));
    assert_eq!(replies[6]["data"]["state"], json!("Stopped"));

    assert_eq!(replies[7]["status"], json!(404));
}

#[tokio::test]
async fn task_commands_and_reports() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let state = Arc::new(AppState::with_controller(h.timers.clone(), Settings::default()));

    let replies = run(
        state.clone(),
        &[
            json!({ "cmd": "create_task", "user_id": USER, "name": "draft" }).to_string(),
            json!({ "cmd": "create_task", "user_id": USER }).to_string(),
            json!({ "cmd": "productivity", "user_id": USER, "range": "daily" }).to_string(),
            json!({ "cmd": "idle_report", "user_id": USER }).to_string(),
            json!({ "cmd": "delete_task", "task_id": "missing" }).to_string(),
        ],
    )
    .await;

    assert_eq!(replies[0]["data"]["status"], json!("Not Started"));
    assert_eq!(replies[0]["data"]["name"], json!("draft"));
    assert_eq!(replies[1]["error"], json!("name is required"));
    assert_eq!(replies[2]["data"]["readable_time"], json!("0h 0m"));
    assert_eq!(replies[2]["data"]["productivity_percent"], json!("0.00"));
    assert_eq!(replies[3]["data"]["total_idle_minutes"], json!(0));
    assert_eq!(replies[4]["status"], json!(404));

    let task_id = replies[0]["data"]["id"].as_str().unwrap().to_string();
    let replies = run(
        state,
        &[
            json!({ "cmd": "start", "task_id": task_id, "user_id": USER }).to_string(),
            json!({ "cmd": "delete_task", "task_id": task_id }).to_string(),
        ],
    )
    .await;
    assert_eq!(replies[0]["data"]["duration"], json!(0));
    assert_eq!(replies[1]["data"], json!({ "deleted": true }));
}

#[tokio::test]
async fn stopped_timer_stream_delivers_final_value_before_exit() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();
    h.at(30);
    h.timers.stop_timer(&timer.id).await.unwrap();
    let state = Arc::new(AppState::with_controller(h.timers.clone(), Settings::default()));

    let replies = run(
        state,
        &[json!({ "cmd": "stream", "timer_id": timer.id }).to_string()],
    )
    .await;

    assert_eq!(
        replies,
        vec![
            json!({ "ok": true, "data": { "timer_id": timer.id, "streaming": true } }),
            json!({ "event": "elapsed", "timer_id": timer.id, "value": "0h 0m 30s" }),
        ]
    );
}

#[tokio::test]
async fn live_stream_emits_events_until_input_closes() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();
    h.at(42);
    let state = Arc::new(AppState::with_controller(h.timers.clone(), Settings::default()));

    let (mut client_in, server_in) = duplex(64 * 1024);
    let (server_out, client_out) = duplex(64 * 1024);

    let timer_id = timer.id.clone();
    let client = async move {
        let mut lines = BufReader::new(client_out).lines();
        let command = json!({ "cmd": "stream", "timer_id": timer_id }).to_string() + "\n";
        client_in.write_all(command.as_bytes()).await.unwrap();

        let mut received = Vec::new();
        for _ in 0..3 {
            let line = lines.next_line().await.unwrap().unwrap();
            received.push(serde_json::from_str::<Value>(&line).unwrap());
        }
        drop(client_in);
        // The reader stays open until the server has flushed and returned.
        (received, lines)
    };

    let ((received, _lines), served) = tokio::join!(client, serve(state, server_in, server_out));
    served.unwrap();

    assert_eq!(
        received[0],
        json!({ "ok": true, "data": { "timer_id": timer.id, "streaming": true } })
    );
    let event = json!({ "event": "elapsed", "timer_id": timer.id, "value": "0h 0m 42s" });
    assert_eq!(received[1], event);
    assert_eq!(received[2], event);
}
