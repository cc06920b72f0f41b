mod common;

use chrono::Duration;
use pretty_assertions::assert_eq;
use tasktimer_lib::{
    db::TaskStatus,
    timer::{AccountingMode, TimerState},
    TimerError,
};

use common::{t0, Harness, USER};

#[tokio::test]
async fn pause_resume_stop_scenario() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;

    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();
    assert_eq!(timer.duration, 0);
    assert_eq!(timer.start_time, t0());
    assert_eq!(timer.state, TimerState::Running);

    h.at(10);
    let interval = h.timers.pause_timer(&timer.id).await.unwrap();
    assert_eq!(interval.pause_time, t0() + Duration::seconds(10));
    assert!(interval.resume_time.is_none());

    h.at(15);
    let resumed = h.timers.resume_timer(&timer.id).await.unwrap();
    assert_eq!(resumed.added_duration, 5);
    assert_eq!(resumed.total_duration, 5);
    assert_eq!(resumed.resume_time, t0() + Duration::seconds(15));

    h.at(20);
    let stopped = h.timers.stop_timer(&timer.id).await.unwrap();
    assert_eq!(stopped.duration, 10);
    assert_eq!(stopped.end_time, Some(t0() + Duration::seconds(20)));
    assert_eq!(stopped.state, TimerState::Stopped);

    let stored = h.timers.get_timer(&timer.id).await.unwrap();
    assert_eq!(stored, stopped);
}

#[tokio::test]
async fn second_start_conflicts_and_keeps_one_timer() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;

    let first = h.timers.start_timer(&task.id, USER).await.unwrap();
    h.at(3);
    let err = h.timers.start_timer(&task.id, USER).await.unwrap_err();
    assert_eq!(err.status_code(), 409);
    match err {
        TimerError::Conflict { existing } => assert_eq!(existing.id, first.id),
        other => panic!("expected conflict, got {other:?}"),
    }

    let timers = h.timers.list_timers_for_task(&task.id).await.unwrap();
    assert_eq!(timers.len(), 1);
}

#[tokio::test]
async fn two_cycles_accumulate_pause_spans() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();

    h.at(5);
    h.timers.pause_timer(&timer.id).await.unwrap();
    h.clock.advance(Duration::milliseconds(7_900));
    let first = h.timers.resume_timer(&timer.id).await.unwrap();

    h.at(30);
    h.timers.pause_timer(&timer.id).await.unwrap();
    h.at(42);
    let second = h.timers.resume_timer(&timer.id).await.unwrap();

    assert_eq!(first.added_duration, 7);
    assert_eq!(second.added_duration, 12);
    assert_eq!(second.total_duration, 19);

    let intervals = h.timers.list_intervals(&timer.id).await.unwrap();
    let summed: u64 = intervals.iter().filter_map(|i| i.duration).sum();
    assert_eq!(summed, second.total_duration);
}

#[tokio::test]
async fn active_time_excludes_paused_spans() {
    let h = Harness::new(AccountingMode::ActiveTime);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();

    h.at(10);
    h.timers.pause_timer(&timer.id).await.unwrap();
    h.at(15);
    let resumed = h.timers.resume_timer(&timer.id).await.unwrap();
    assert_eq!(resumed.added_duration, 0);
    assert_eq!(resumed.total_duration, 10);

    h.at(40);
    h.timers.pause_timer(&timer.id).await.unwrap();
    h.at(55);
    h.timers.resume_timer(&timer.id).await.unwrap();

    h.at(60);
    let stopped = h.timers.stop_timer(&timer.id).await.unwrap();

    let paused: u64 = h
        .timers
        .list_intervals(&timer.id)
        .await
        .unwrap()
        .iter()
        .filter_map(|i| i.duration)
        .sum();
    let wall = (stopped.end_time.unwrap() - stopped.start_time).num_seconds() as u64;
    assert_eq!(paused, 20);
    assert_eq!(stopped.duration, wall - paused);
}

#[tokio::test]
async fn resume_without_open_interval_changes_nothing() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();

    h.at(8);
    let err = h.timers.resume_timer(&timer.id).await.unwrap_err();
    assert!(matches!(err, TimerError::NotFound { .. }));
    assert_eq!(err.status_code(), 404);

    assert_eq!(h.timers.get_timer(&timer.id).await.unwrap(), timer);
    assert!(h.timers.list_intervals(&timer.id).await.unwrap().is_empty());
    assert_eq!(
        h.timers.get_task(&task.id).await.unwrap().status,
        TaskStatus::InProgress
    );
}

#[tokio::test]
async fn double_pause_is_rejected() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();

    h.at(4);
    h.timers.pause_timer(&timer.id).await.unwrap();
    h.at(6);
    let err = h.timers.pause_timer(&timer.id).await.unwrap_err();
    assert!(matches!(err, TimerError::InvalidState { .. }));

    let intervals = h.timers.list_intervals(&timer.id).await.unwrap();
    assert_eq!(intervals.iter().filter(|i| i.is_open()).count(), 1);
}

#[tokio::test]
async fn concurrent_pauses_open_one_interval() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();
    h.at(2);

    let (a, b) = tokio::join!(
        h.timers.pause_timer(&timer.id),
        h.timers.pause_timer(&timer.id)
    );
    assert!(a.is_ok() != b.is_ok());

    let intervals = h.timers.list_intervals(&timer.id).await.unwrap();
    assert_eq!(intervals.len(), 1);
}

#[tokio::test]
async fn stop_while_paused_closes_the_pause() {
    let h = Harness::new(AccountingMode::ActiveTime);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();

    h.at(10);
    h.timers.pause_timer(&timer.id).await.unwrap();
    h.at(100);
    let stopped = h.timers.stop_timer(&timer.id).await.unwrap();
    assert_eq!(stopped.duration, 10);

    let intervals = h.timers.list_intervals(&timer.id).await.unwrap();
    assert_eq!(intervals.len(), 1);
    assert_eq!(intervals[0].resume_time, stopped.end_time);
    assert_eq!(intervals[0].duration, Some(90));
}

#[tokio::test]
async fn stop_while_paused_with_pause_spans_matches_resume_then_stop() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();

    h.at(10);
    h.timers.pause_timer(&timer.id).await.unwrap();
    h.at(15);
    let stopped = h.timers.stop_timer(&timer.id).await.unwrap();
    assert_eq!(stopped.duration, 5);
}

#[tokio::test]
async fn stopped_timer_rejects_further_transitions() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();
    h.at(30);
    h.timers.stop_timer(&timer.id).await.unwrap();

    for err in [
        h.timers.pause_timer(&timer.id).await.unwrap_err(),
        h.timers.stop_timer(&timer.id).await.unwrap_err(),
    ] {
        assert!(matches!(err, TimerError::InvalidState { .. }), "{err:?}");
    }
    assert!(matches!(
        h.timers.resume_timer(&timer.id).await.unwrap_err(),
        TimerError::NotFound { .. }
    ));

    // The task can be timed again once the previous timer is stopped.
    h.at(60);
    let again = h.timers.start_timer(&task.id, USER).await.unwrap();
    assert_ne!(again.id, timer.id);
    assert_eq!(h.timers.list_timers_for_task(&task.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn task_status_follows_the_timer() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    assert_eq!(task.status, TaskStatus::NotStarted);

    let status = |h: &Harness, id: String| {
        let timers = h.timers.clone();
        async move { timers.get_task(&id).await.unwrap().status }
    };

    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();
    assert_eq!(status(&h, task.id.clone()).await, TaskStatus::InProgress);

    h.at(1);
    h.timers.pause_timer(&timer.id).await.unwrap();
    assert_eq!(status(&h, task.id.clone()).await, TaskStatus::Paused);

    h.at(2);
    h.timers.resume_timer(&timer.id).await.unwrap();
    assert_eq!(status(&h, task.id.clone()).await, TaskStatus::InProgress);

    h.at(3);
    h.timers.stop_timer(&timer.id).await.unwrap();
    assert_eq!(status(&h, task.id.clone()).await, TaskStatus::Completed);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let h = Harness::new(AccountingMode::PauseSpans);

    let err = h.timers.start_timer("missing-task", USER).await.unwrap_err();
    assert!(matches!(err, TimerError::NotFound { entity: "task", .. }));

    for err in [
        h.timers.pause_timer("missing").await.unwrap_err(),
        h.timers.resume_timer("missing").await.unwrap_err(),
        h.timers.stop_timer("missing").await.unwrap_err(),
        h.timers.elapsed("missing").await.unwrap_err(),
    ] {
        assert!(matches!(err, TimerError::NotFound { entity: "timer", .. }), "{err:?}");
    }
}

#[tokio::test]
async fn deleting_a_task_cascades() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();
    h.at(5);
    h.timers.pause_timer(&timer.id).await.unwrap();

    h.timers.delete_task(&task.id).await.unwrap();

    assert!(matches!(
        h.timers.get_timer(&timer.id).await.unwrap_err(),
        TimerError::NotFound { .. }
    ));
    assert!(h.timers.list_intervals(&timer.id).await.unwrap().is_empty());
    assert!(matches!(
        h.timers.delete_task(&task.id).await.unwrap_err(),
        TimerError::NotFound { .. }
    ));
}

#[tokio::test]
async fn elapsed_snapshot_tracks_state() {
    let h = Harness::new(AccountingMode::PauseSpans);
    let task = h.task().await;
    let timer = h.timers.start_timer(&task.id, USER).await.unwrap();

    h.at(65);
    let running = h.timers.elapsed(&timer.id).await.unwrap();
    assert_eq!(running.seconds, 65);
    assert_eq!(running.formatted, "0h 1m 5s");
    assert!(!running.stopped);

    h.timers.pause_timer(&timer.id).await.unwrap();
    h.at(500);
    let paused = h.timers.elapsed(&timer.id).await.unwrap();
    assert_eq!(paused.state, TimerState::Paused);
    assert_eq!(paused.seconds, 0);
}
