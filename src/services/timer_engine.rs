//! 倒计时引擎 - 业务能力层
//!
//! 状态机：`Idle → Running → {Expired | Stopped}`。
//!
//! 运行时有两个独立的周期任务：
//! - 每秒一次的倒计时，通过 [`TimerEvent::Tick`] 汇报剩余时间，归零时发出一次 [`TimerEvent::Expired`]
//! - 每隔 `sync_interval` 把剩余秒数推送给后端，失败只记录日志，等下一个周期
//!
//! `stop()` 与 `Drop` 都会取消这两个任务。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::clients::ExamBackend;
use crate::error::{TimerError, TransportError};
use crate::services::events::{EventSender, SessionEvent, TimerEvent};
use crate::utils::clock::format_clock;

/// 计时器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Idle,
    Running,
    Expired,
    Stopped,
}

/// 计时器状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub remaining_seconds: i64,
    pub phase: TimerPhase,
}

/// 计时器参数
#[derive(Debug, Clone)]
pub struct TimerSettings {
    pub tick_period: Duration,
    pub sync_interval: Duration,
    pub sync_timeout: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            sync_interval: Duration::from_secs(10),
            sync_timeout: Duration::from_secs(5),
        }
    }
}

/// 倒计时引擎
pub struct TimerEngine {
    session_id: String,
    backend: Arc<dyn ExamBackend>,
    settings: TimerSettings,
    events: EventSender,
    state: Arc<watch::Sender<TimerState>>,
    tick_task: Option<JoinHandle<()>>,
    sync_task: Option<JoinHandle<()>>,
}

impl TimerEngine {
    pub fn new(
        session_id: impl Into<String>,
        backend: Arc<dyn ExamBackend>,
        settings: TimerSettings,
        events: EventSender,
    ) -> Self {
        let (state, _) = watch::channel(TimerState {
            remaining_seconds: 0,
            phase: TimerPhase::Idle,
        });
        Self {
            session_id: session_id.into(),
            backend,
            settings,
            events,
            state: Arc::new(state),
            tick_task: None,
            sync_task: None,
        }
    }

    pub fn state(&self) -> TimerState {
        *self.state.borrow()
    }

    pub fn phase(&self) -> TimerPhase {
        self.state.borrow().phase
    }

    /// 最近一次已知的剩余秒数
    pub fn remaining_seconds(&self) -> i64 {
        self.state.borrow().remaining_seconds
    }

    /// 启动倒计时
    ///
    /// 运行中再次启动会先停止上一轮；已到期的计时器不能再启动。
    /// 时长不为正数时直接进入 `Expired`，先发出一次 `00:00` 的 Tick 再发出 `Expired`。
    pub fn start(&mut self, duration_seconds: i64) -> Result<(), TimerError> {
        match self.phase() {
            TimerPhase::Running => {
                debug!("计时器已在运行，先停止上一轮");
                self.stop();
            }
            TimerPhase::Expired => {
                return Err(TimerError::InvalidTransition {
                    from: TimerPhase::Expired,
                })
            }
            TimerPhase::Idle | TimerPhase::Stopped => {}
        }

        if duration_seconds <= 0 {
            warn!("⏰ 无效的考试时长 {}，直接按到期处理", duration_seconds);
            self.state.send_replace(TimerState {
                remaining_seconds: 0,
                phase: TimerPhase::Expired,
            });
            emit(&self.events, tick_event(0));
            emit(&self.events, TimerEvent::Expired);
            return Ok(());
        }

        info!("⏱️ 开始倒计时: {}", format_clock(duration_seconds));
        self.state.send_replace(TimerState {
            remaining_seconds: duration_seconds,
            phase: TimerPhase::Running,
        });

        self.tick_task = Some(tokio::spawn(run_ticks(
            self.state.clone(),
            self.events.clone(),
            self.settings.tick_period,
        )));
        self.sync_task = Some(tokio::spawn(run_sync(
            self.session_id.clone(),
            self.backend.clone(),
            self.state.subscribe(),
            self.settings.sync_interval,
            self.settings.sync_timeout,
        )));

        Ok(())
    }

    /// 停止倒计时与时间同步
    ///
    /// 已到期的计时器保持 `Expired`。
    pub fn stop(&mut self) {
        self.cancel_tasks();
        self.state.send_if_modified(|state| {
            if state.phase == TimerPhase::Running {
                state.phase = TimerPhase::Stopped;
                true
            } else {
                false
            }
        });
    }

    fn cancel_tasks(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
        if let Some(task) = self.sync_task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}

fn tick_event(remaining_seconds: i64) -> TimerEvent {
    TimerEvent::Tick {
        remaining_seconds,
        display: format_clock(remaining_seconds),
    }
}

fn emit(events: &EventSender, event: TimerEvent) {
    // 接收方已关闭说明会话已结束
    let _ = events.send(SessionEvent::Timer(event));
}

/// 每秒倒计时
async fn run_ticks(state: Arc<watch::Sender<TimerState>>, events: EventSender, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;

        let remaining = state.borrow().remaining_seconds - 1;
        if remaining <= 0 {
            state.send_replace(TimerState {
                remaining_seconds: 0,
                phase: TimerPhase::Expired,
            });
            emit(&events, tick_event(0));
            info!("⏰ 考试时间到");
            emit(&events, TimerEvent::Expired);
            break;
        }

        state.send_replace(TimerState {
            remaining_seconds: remaining,
            phase: TimerPhase::Running,
        });
        if remaining % 30 == 0 || remaining < 10 {
            debug!("⏱️ 剩余时间: {}", format_clock(remaining));
        }
        emit(&events, tick_event(remaining));
    }
}

/// 周期性同步剩余时间
async fn run_sync(
    session_id: String,
    backend: Arc<dyn ExamBackend>,
    state: watch::Receiver<TimerState>,
    interval: Duration,
    timeout: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    loop {
        ticker.tick().await;

        let snapshot = *state.borrow();
        if snapshot.phase != TimerPhase::Running {
            debug!("计时器已不在运行，停止时间同步");
            break;
        }

        let pushed = time::timeout(
            timeout,
            backend.push_remaining_time(&session_id, snapshot.remaining_seconds),
        )
        .await
        .unwrap_or_else(|_| Err(TransportError::timeout("time", timeout)));
        match pushed {
            Ok(()) => debug!("✓ 剩余时间已同步: {} 秒", snapshot.remaining_seconds),
            Err(e) => warn!("⚠️ 剩余时间同步失败，等待下次同步: {}", e),
        }
    }
}
