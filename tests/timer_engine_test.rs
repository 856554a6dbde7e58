mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use common::{Call, MockBackend};
use exam_proctor::error::TimerError;
use exam_proctor::services::events::{self, EventReceiver};
use exam_proctor::services::{SessionEvent, TimerEngine, TimerEvent, TimerPhase, TimerSettings};

fn engine(backend: Arc<MockBackend>) -> (TimerEngine, EventReceiver) {
    let (tx, rx) = events::channel();
    let engine = TimerEngine::new("42", backend, TimerSettings::default(), tx);
    (engine, rx)
}

async fn next_timer_event(rx: &mut EventReceiver) -> TimerEvent {
    match rx.recv().await {
        Some(SessionEvent::Timer(event)) => event,
        other => panic!("unexpected event: {:?}", other),
    }
}

fn tick(remaining_seconds: i64, display: &str) -> TimerEvent {
    TimerEvent::Tick {
        remaining_seconds,
        display: display.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_duration_expires_immediately_once() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, mut rx) = engine(backend.clone());

    timer.start(0).unwrap();

    assert_eq!(timer.phase(), TimerPhase::Expired);
    assert_eq!(timer.remaining_seconds(), 0);
    assert_eq!(next_timer_event(&mut rx).await, tick(0, "00:00"));
    assert_eq!(next_timer_event(&mut rx).await, TimerEvent::Expired);

    time::sleep(Duration::from_secs(30)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(backend.count(|c| matches!(c, Call::PushTime(_))), 0);
}

#[tokio::test(start_paused = true)]
async fn test_negative_duration_expires_immediately() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, mut rx) = engine(backend);

    timer.start(-15).unwrap();

    assert_eq!(timer.phase(), TimerPhase::Expired);
    assert_eq!(next_timer_event(&mut rx).await, tick(0, "00:00"));
    assert_eq!(next_timer_event(&mut rx).await, TimerEvent::Expired);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_expires_after_exactly_d_ticks_and_never_twice() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, mut rx) = engine(backend);

    timer.start(3).unwrap();
    assert_eq!(timer.phase(), TimerPhase::Running);

    assert_eq!(next_timer_event(&mut rx).await, tick(2, "00:02"));
    assert_eq!(next_timer_event(&mut rx).await, tick(1, "00:01"));
    assert_eq!(next_timer_event(&mut rx).await, tick(0, "00:00"));
    assert_eq!(next_timer_event(&mut rx).await, TimerEvent::Expired);
    assert_eq!(timer.phase(), TimerPhase::Expired);

    // 不调用 stop()，也不会再次到期
    time::sleep(Duration::from_secs(60)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_tick_display_includes_hours() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, mut rx) = engine(backend);

    timer.start(3601).unwrap();

    assert_eq!(next_timer_event(&mut rx).await, tick(3600, "01:00:00"));
    assert_eq!(next_timer_event(&mut rx).await, tick(3599, "59:59"));
    timer.stop();
}

#[tokio::test(start_paused = true)]
async fn test_start_after_expiry_is_rejected() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, _rx) = engine(backend);

    timer.start(0).unwrap();

    assert_eq!(
        timer.start(10),
        Err(TimerError::InvalidTransition {
            from: TimerPhase::Expired
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_ticks_and_allows_restart() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, mut rx) = engine(backend);

    timer.start(100).unwrap();
    time::sleep(Duration::from_millis(2500)).await;
    timer.stop();

    assert_eq!(timer.phase(), TimerPhase::Stopped);
    assert_eq!(timer.remaining_seconds(), 98);
    assert_eq!(next_timer_event(&mut rx).await, tick(99, "01:39"));
    assert_eq!(next_timer_event(&mut rx).await, tick(98, "01:38"));

    time::sleep(Duration::from_secs(30)).await;
    assert!(rx.try_recv().is_err());

    timer.start(2).unwrap();
    assert_eq!(timer.phase(), TimerPhase::Running);
    assert_eq!(next_timer_event(&mut rx).await, tick(1, "00:01"));
    assert_eq!(next_timer_event(&mut rx).await, tick(0, "00:00"));
    assert_eq!(next_timer_event(&mut rx).await, TimerEvent::Expired);
}

#[tokio::test(start_paused = true)]
async fn test_start_while_running_replaces_previous_run() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, mut rx) = engine(backend);

    timer.start(100).unwrap();
    time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(next_timer_event(&mut rx).await, tick(99, "01:39"));

    timer.start(1).unwrap();
    assert_eq!(timer.remaining_seconds(), 1);
    assert_eq!(next_timer_event(&mut rx).await, tick(0, "00:00"));
    assert_eq!(next_timer_event(&mut rx).await, TimerEvent::Expired);

    time::sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_sync_pushes_every_interval_while_running() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, mut rx) = engine(backend.clone());

    timer.start(25).unwrap();
    while next_timer_event(&mut rx).await != TimerEvent::Expired {}

    // 10 秒、20 秒各一次，到期后不再推送
    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.count(|c| matches!(c, Call::PushTime(_))), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_sync_does_not_disturb_countdown() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    backend.fail_time_push();
    let (mut timer, mut rx) = engine(backend.clone());

    timer.start(12).unwrap();
    let mut ticks = 0;
    loop {
        match next_timer_event(&mut rx).await {
            TimerEvent::Tick { .. } => ticks += 1,
            TimerEvent::Expired => break,
        }
    }

    assert_eq!(ticks, 12);
    assert_eq!(backend.count(|c| matches!(c, Call::PushTime(_))), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_sync() {
    let backend = Arc::new(MockBackend::new(&["q1"]));
    let (mut timer, _rx) = engine(backend.clone());

    timer.start(600).unwrap();
    time::sleep(Duration::from_secs(5)).await;
    timer.stop();
    time::sleep(Duration::from_secs(60)).await;

    assert_eq!(backend.count(|c| matches!(c, Call::PushTime(_))), 0);
}
