//! 监考循环 - 业务能力层
//!
//! 状态机：`Stopped ⇄ Active → Terminated`。
//!
//! 每个周期依次执行：采集一帧 → 提交分析 → 解读结果 → 等待下一个周期。
//! 上一轮分析返回之前不会开始下一轮，所以同一时刻最多只有一个分析请求。
//! 终止后释放摄像头，此后 `start()` 不再生效。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::clients::ExamBackend;
use crate::error::TransportError;
use crate::models::AnalysisVerdict;
use crate::services::events::{EventSender, MonitorEvent, SessionEvent};
use crate::services::frame_source::FrameSource;

/// 违规次数超过阈值时的终止原因
pub const EXCESSIVE_VIOLATIONS_REASON: &str = "Excessive violations detected";
/// 后端要求终止但未给出原因时使用
pub const DEFAULT_TERMINATION_REASON: &str = "Exam terminated due to violations";

/// 监考阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Stopped,
    Active,
    Terminated,
}

/// 违规计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationState {
    pub count: u32,
    pub threshold: u32,
}

/// 监考参数
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub analyze_timeout: Duration,
    pub violation_threshold: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            analyze_timeout: Duration::from_secs(8),
            violation_threshold: 5,
        }
    }
}

/// 单个周期的结果
enum CycleOutcome {
    Continue,
    Terminate(String),
}

/// 周期任务共享的状态
struct MonitorShared {
    backend: Arc<dyn ExamBackend>,
    source: Arc<dyn FrameSource>,
    settings: MonitorSettings,
    events: EventSender,
    phase: watch::Sender<MonitorPhase>,
    violations: watch::Sender<ViolationState>,
}

/// 监考循环
pub struct MonitoringLoop {
    shared: Arc<MonitorShared>,
    task: Option<JoinHandle<()>>,
}

impl MonitoringLoop {
    pub fn new(
        backend: Arc<dyn ExamBackend>,
        source: Arc<dyn FrameSource>,
        settings: MonitorSettings,
        events: EventSender,
    ) -> Self {
        let (phase, _) = watch::channel(MonitorPhase::Stopped);
        let (violations, _) = watch::channel(ViolationState {
            count: 0,
            threshold: settings.violation_threshold,
        });
        Self {
            shared: Arc::new(MonitorShared {
                backend,
                source,
                settings,
                events,
                phase,
                violations,
            }),
            task: None,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        *self.shared.phase.borrow()
    }

    pub fn violations(&self) -> ViolationState {
        *self.shared.violations.borrow()
    }

    /// 开始监考
    ///
    /// 已在运行时不重复启动；已终止时不再启动。
    pub fn start(&mut self, session_id: &str) {
        match self.phase() {
            MonitorPhase::Active => {
                debug!("监考已在运行，忽略重复启动");
            }
            MonitorPhase::Terminated => {
                warn!("监考已终止，无法重新启动");
            }
            MonitorPhase::Stopped => {
                info!("📷 监考开始，周期 {} 秒", self.shared.settings.interval.as_secs());
                self.shared.phase.send_replace(MonitorPhase::Active);
                self.task = Some(tokio::spawn(run_cycles(
                    self.shared.clone(),
                    session_id.to_string(),
                )));
            }
        }
    }

    /// 停止监考并释放摄像头
    ///
    /// 正在进行的分析请求会被取消，其结果不再处理。
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.shared.source.release().await;
        self.shared.phase.send_if_modified(|phase| {
            if *phase == MonitorPhase::Active {
                *phase = MonitorPhase::Stopped;
                true
            } else {
                false
            }
        });
        debug!("监考已停止");
    }
}

impl Drop for MonitoringLoop {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let source = self.shared.source.clone();
            handle.spawn(async move { source.release().await });
        }
    }
}

async fn run_cycles(shared: Arc<MonitorShared>, session_id: String) {
    let mut consecutive_failures: u32 = 0;
    loop {
        match run_cycle(&shared, &session_id, &mut consecutive_failures).await {
            CycleOutcome::Continue => {}
            CycleOutcome::Terminate(reason) => {
                error!("🚫 考试被终止: {}", reason);
                shared.phase.send_replace(MonitorPhase::Terminated);
                shared.source.release().await;
                let _ = shared
                    .events
                    .send(SessionEvent::Monitor(MonitorEvent::Terminated { reason }));
                break;
            }
        }
        time::sleep(shared.settings.interval).await;
    }
}

async fn run_cycle(
    shared: &MonitorShared,
    session_id: &str,
    consecutive_failures: &mut u32,
) -> CycleOutcome {
    let frame = match shared.source.capture().await {
        Ok(frame) => frame,
        Err(e) => {
            *consecutive_failures += 1;
            warn!(
                "⚠️ 摄像头采集失败 (连续 {} 次): {}",
                consecutive_failures, e
            );
            return CycleOutcome::Continue;
        }
    };

    let analyze_timeout = shared.settings.analyze_timeout;
    let analyzed = time::timeout(
        analyze_timeout,
        shared.backend.analyze_frame(session_id, &frame),
    )
    .await
    .unwrap_or_else(|_| Err(TransportError::timeout("video_feed", analyze_timeout)));
    let analysis = match analyzed {
        Ok(analysis) => analysis,
        Err(e) => {
            *consecutive_failures += 1;
            warn!(
                "⚠️ 画面分析失败 (连续 {} 次): {}",
                consecutive_failures, e
            );
            return CycleOutcome::Continue;
        }
    };
    *consecutive_failures = 0;

    match analysis.verdict() {
        AnalysisVerdict::Clear => {
            debug!("✓ 画面正常");
            CycleOutcome::Continue
        }
        AnalysisVerdict::Warning { violations } => {
            shared.violations.send_modify(|state| state.count += 1);
            let state = *shared.violations.borrow();
            warn!(
                "⚠️ 检测到违规 ({}/{}): {}",
                state.count,
                state.threshold,
                violations.join(", ")
            );
            let _ = shared
                .events
                .send(SessionEvent::Monitor(MonitorEvent::Violation {
                    violations,
                    count: state.count,
                    threshold: state.threshold,
                }));

            if state.count >= state.threshold {
                CycleOutcome::Terminate(EXCESSIVE_VIOLATIONS_REASON.to_string())
            } else {
                CycleOutcome::Continue
            }
        }
        AnalysisVerdict::Terminate { reason } => CycleOutcome::Terminate(
            reason.unwrap_or_else(|| DEFAULT_TERMINATION_REASON.to_string()),
        ),
    }
}
