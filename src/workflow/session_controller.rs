//! 考试会话控制器 - 流程层
//!
//! 核心职责：把题目状态、倒计时和监考循环组合成一场考试
//!
//! - 用户操作（翻页、选择、书签、提交、交卷）直接调用控制器方法
//! - 计时器和监考循环通过 [`SessionEvent`] 汇报，由 [`SessionController::handle_event`] 处理
//! - 时间到、监考终止、用户交卷走同一个收尾流程：先补交已选未交的答案，再发送一次完成信号
//!
//! 控制器只有一个所有者，所有状态变更都经过 `&mut self`，不存在并发写。

use std::sync::Arc;

use tokio::time;
use tracing::{debug, error, info, warn};

use crate::clients::ExamBackend;
use crate::config::Config;
use crate::error::{AppResult, TransportError, ValidationError};
use crate::models::{
    AnswerState, AnswerStatus, GridMark, OptionKey, ProhibitedAction, QuestionContent, QuestionId,
};
use crate::services::events::{self, EventReceiver, MonitorEvent, SessionEvent, TimerEvent};
use crate::services::{
    Counters, FrameSource, MonitorSettings, MonitoringLoop, QuestionStore, TimerEngine,
    TimerSettings, ViolationJournal, ViolationState,
};
use crate::utils::clock::format_clock;
use crate::workflow::session_ctx::SessionCtx;

/// 控制器参数
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub timer: TimerSettings,
    pub monitor: MonitorSettings,
    /// 交卷后跳转的位置
    pub results_path: String,
    /// 起始题号（1-based），超出范围时从第 1 题开始
    pub start_position: Option<usize>,
    /// 违规记录文件，`None` 时不记录
    pub violation_log_file: Option<String>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            timer: TimerSettings::default(),
            monitor: MonitorSettings::default(),
            results_path: "/tests-given/".to_string(),
            start_position: None,
            violation_log_file: None,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timer: TimerSettings {
                sync_interval: config.time_sync_interval(),
                sync_timeout: config.time_sync_timeout(),
                ..TimerSettings::default()
            },
            monitor: MonitorSettings {
                interval: config.monitor_interval(),
                analyze_timeout: config.analyze_timeout(),
                violation_threshold: config.violation_threshold.max(1),
            },
            results_path: config.results_path.clone(),
            start_position: config.start_position,
            violation_log_file: Some(config.violation_log_file.clone()),
        }
    }
}

/// 收尾的触发原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishTrigger {
    /// 用户主动交卷
    User,
    /// 考试时间到
    TimerExpired,
    /// 监考终止
    Terminated { reason: String },
}

/// 收尾结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishReport {
    pub trigger: FinishTrigger,
    /// 补交成功的题数
    pub flushed: usize,
    /// 补交失败的题数
    pub failed: usize,
    /// 后端是否确认了完成信号
    pub completion_acknowledged: bool,
    /// 交卷后跳转的位置（无论完成信号是否成功）
    pub destination: String,
}

/// 页面关闭时的清理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    pub flushed: usize,
    pub failed: usize,
    /// 剩余时间是否推送成功
    pub time_pushed: bool,
}

/// 当前题目的展示数据
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub position: usize,
    pub total: usize,
    pub question_id: QuestionId,
    pub content: QuestionContent,
    pub state: AnswerState,
}

/// 事件处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// 时钟刷新
    Clock { display: String },
    /// 违规提示
    Warning {
        violations: Vec<String>,
        count: u32,
        threshold: u32,
    },
    /// 会话已收尾
    Finished(FinishReport),
    /// 会话已结束，事件被忽略
    Ignored,
}

/// 考试会话控制器
pub struct SessionController {
    ctx: SessionCtx,
    backend: Arc<dyn ExamBackend>,
    store: QuestionStore,
    position: usize,
    initial_remaining: i64,
    timer: TimerEngine,
    monitor: Option<MonitoringLoop>,
    journal: Option<ViolationJournal>,
    settings: ControllerSettings,
    clock_display: String,
    closed: bool,
}

impl SessionController {
    /// 初始化会话
    ///
    /// 获取题目顺序与已保存的答案，初始化题目状态。后台任务在 [`start`](Self::start) 之后才运行。
    ///
    /// # 参数
    /// - `ctx`: 会话上下文
    /// - `backend`: 考试后端
    /// - `frame_source`: 摄像头，`None` 时不监考
    /// - `settings`: 控制器参数
    ///
    /// # 返回
    /// 控制器以及后台任务的事件接收端
    pub async fn initialize(
        ctx: SessionCtx,
        backend: Arc<dyn ExamBackend>,
        frame_source: Option<Arc<dyn FrameSource>>,
        settings: ControllerSettings,
    ) -> AppResult<(Self, EventReceiver)> {
        info!("{} 📥 正在获取题目列表...", ctx);
        let bootstrap = backend.fetch_question_sequence(&ctx.session_id).await?;

        if bootstrap.question_ids.is_empty() {
            error!("{} ❌ 题目列表为空", ctx);
            return Err(ValidationError::EmptySequence.into());
        }

        let initial_remaining = bootstrap.remaining_seconds();
        let store = QuestionStore::initialize(
            bootstrap.question_ids,
            bootstrap.prior_answers.as_ref(),
        );

        let position = settings
            .start_position
            .filter(|p| (1..=store.len()).contains(p))
            .unwrap_or(1);

        let counters = store.counters();
        info!(
            "{} ✓ 共 {} 题，已作答 {} 题，剩余时间 {}",
            ctx,
            counters.total,
            counters.attempted,
            format_clock(initial_remaining)
        );

        let (tx, rx) = events::channel();
        let timer = TimerEngine::new(
            ctx.session_id.clone(),
            backend.clone(),
            settings.timer.clone(),
            tx.clone(),
        );
        let monitor = frame_source.map(|source| {
            MonitoringLoop::new(backend.clone(), source, settings.monitor.clone(), tx)
        });
        let journal = settings
            .violation_log_file
            .as_ref()
            .map(ViolationJournal::with_path);

        let controller = Self {
            ctx,
            backend,
            store,
            position,
            initial_remaining,
            timer,
            monitor,
            journal,
            settings,
            clock_display: format_clock(initial_remaining),
            closed: false,
        };

        Ok((controller, rx))
    }

    /// 启动倒计时与监考
    pub fn start(&mut self) -> AppResult<()> {
        self.timer.start(self.initial_remaining)?;
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.start(&self.ctx.session_id);
        } else {
            debug!("{} 未启用监考", self.ctx);
        }
        Ok(())
    }

    // ========== 查询 ==========

    pub fn ctx(&self) -> &SessionCtx {
        &self.ctx
    }

    /// 当前题号（1-based）
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn total(&self) -> usize {
        self.store.len()
    }

    pub fn counters(&self) -> Counters {
        self.store.counters()
    }

    pub fn answer_state(&self, position: usize) -> Result<&AnswerState, ValidationError> {
        self.store.state(position)
    }

    /// 题号面板（按题号顺序）
    pub fn grid(&self) -> Vec<GridMark> {
        self.store
            .states()
            .iter()
            .map(|state| state.status.grid_mark())
            .collect()
    }

    /// 最近一次时钟显示
    pub fn clock_display(&self) -> &str {
        &self.clock_display
    }

    pub fn violations(&self) -> Option<ViolationState> {
        self.monitor.as_ref().map(|m| m.violations())
    }

    /// 会话是否已结束（交卷或页面关闭）
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 获取当前题目内容
    pub async fn current_question(&self) -> AppResult<QuestionView> {
        let question_id = self.store.question_id(self.position)?.clone();
        let content = self
            .backend
            .fetch_question_content(&self.ctx.session_id, &question_id)
            .await?;
        Ok(QuestionView {
            position: self.position,
            total: self.store.len(),
            question_id,
            content,
            state: self.store.state(self.position)?.clone(),
        })
    }

    // ========== 导航 ==========

    pub fn next(&mut self) -> Result<usize, ValidationError> {
        if self.position >= self.store.len() {
            return Err(ValidationError::AtLastQuestion);
        }
        self.position += 1;
        Ok(self.position)
    }

    pub fn previous(&mut self) -> Result<usize, ValidationError> {
        if self.position <= 1 {
            return Err(ValidationError::AtFirstQuestion);
        }
        self.position -= 1;
        Ok(self.position)
    }

    pub fn jump_to(&mut self, position: usize) -> Result<usize, ValidationError> {
        if !(1..=self.store.len()).contains(&position) {
            return Err(ValidationError::PositionOutOfRange {
                position,
                total: self.store.len(),
            });
        }
        self.position = position;
        Ok(self.position)
    }

    // ========== 作答 ==========

    pub fn select_answer(&mut self, option: OptionKey) -> Result<(), ValidationError> {
        self.store.select(self.position, option)?;
        debug!("{} 第 {} 题选择 {}", self.ctx, self.position, option);
        Ok(())
    }

    pub fn toggle_bookmark(&mut self) -> Result<AnswerStatus, ValidationError> {
        let status = self.store.toggle_bookmark(self.position)?;
        debug!("{} 第 {} 题书签切换为 {:?}", self.ctx, self.position, status);
        Ok(status)
    }

    /// 提交当前题
    ///
    /// 远程保存失败时回滚本次提交并返回错误，可以重试。
    /// 成功后自动跳到下一题（已是最后一题时不动）。
    ///
    /// # 返回
    /// 提交后的当前题号
    pub async fn submit_current(&mut self) -> AppResult<usize> {
        let ticket = self.store.submit(self.position)?;

        match self
            .backend
            .submit_answer(&self.ctx.session_id, &ticket.question_id, ticket.option)
            .await
        {
            Ok(()) => {
                self.store.confirm_submission(&ticket);
                info!(
                    "{} ✓ 第 {} 题已提交: {}",
                    self.ctx, ticket.position, ticket.option
                );
                if self.position < self.store.len() {
                    self.position += 1;
                }
                Ok(self.position)
            }
            Err(e) => {
                warn!(
                    "{} ⚠️ 第 {} 题保存失败，已撤销提交: {}",
                    self.ctx, ticket.position, e
                );
                self.store.revert_submission(&ticket);
                Err(e.into())
            }
        }
    }

    /// 上报页面违规操作
    ///
    /// 只记录日志，不影响考试进行。
    pub async fn report_prohibited_action(&self, action: ProhibitedAction) {
        if self.closed {
            return;
        }
        warn!("{} 🚫 {}", self.ctx, action.details());
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_prohibited_action(&self.ctx.session_id, action) {
                warn!("{} 写入违规记录失败: {}", self.ctx, e);
            }
        }
        if let Err(e) = self
            .backend
            .report_prohibited_action(&self.ctx.session_id, action)
            .await
        {
            warn!("{} ⚠️ 违规操作上报失败: {}", self.ctx, e);
        }
    }

    // ========== 后台事件 ==========

    /// 处理计时器与监考循环的事件
    pub async fn handle_event(&mut self, event: SessionEvent) -> EventOutcome {
        if self.closed {
            debug!("{} 会话已结束，忽略事件 {:?}", self.ctx, event);
            return EventOutcome::Ignored;
        }

        match event {
            SessionEvent::Timer(TimerEvent::Tick { display, .. }) => {
                self.clock_display = display.clone();
                EventOutcome::Clock { display }
            }
            SessionEvent::Timer(TimerEvent::Expired) => {
                info!("{} ⏰ 考试时间到，自动交卷", self.ctx);
                self.finish_or_ignored(FinishTrigger::TimerExpired).await
            }
            SessionEvent::Monitor(MonitorEvent::Violation {
                violations,
                count,
                threshold,
            }) => {
                if let Some(journal) = &self.journal {
                    if let Err(e) =
                        journal.record_warning(&self.ctx.session_id, count, threshold, &violations)
                    {
                        warn!("{} 写入违规记录失败: {}", self.ctx, e);
                    }
                }
                EventOutcome::Warning {
                    violations,
                    count,
                    threshold,
                }
            }
            SessionEvent::Monitor(MonitorEvent::Terminated { reason }) => {
                if let Some(journal) = &self.journal {
                    if let Err(e) = journal.record_termination(&self.ctx.session_id, &reason) {
                        warn!("{} 写入违规记录失败: {}", self.ctx, e);
                    }
                }
                self.finish_or_ignored(FinishTrigger::Terminated { reason })
                    .await
            }
        }
    }

    async fn finish_or_ignored(&mut self, trigger: FinishTrigger) -> EventOutcome {
        match self.finish(trigger).await {
            Some(report) => EventOutcome::Finished(report),
            None => EventOutcome::Ignored,
        }
    }

    // ========== 收尾 ==========

    /// 交卷
    ///
    /// 用户交卷、时间到、监考终止共用同一流程：
    /// 1. 停止倒计时与监考（释放摄像头）
    /// 2. 按题号顺序补交尚未保存的答案，单题失败不影响其余
    /// 3. 发送一次完成信号，失败只记录
    /// 4. 冻结题目状态，返回跳转位置
    ///
    /// # 返回
    /// 会话已经结束时返回 `None`
    pub async fn finish(&mut self, trigger: FinishTrigger) -> Option<FinishReport> {
        if self.closed {
            debug!("{} 会话已结束，忽略重复交卷 ({:?})", self.ctx, trigger);
            return None;
        }
        self.closed = true;
        info!("{} 📤 开始交卷 ({:?})", self.ctx, trigger);

        self.stop_background().await;
        let (flushed, failed) = self.flush_pending().await;

        let completion_acknowledged = match self
            .backend
            .complete_session(&self.ctx.session_id)
            .await
        {
            Ok(()) => {
                info!("{} ✓ 后端已确认交卷", self.ctx);
                true
            }
            Err(e) => {
                warn!("{} ⚠️ 完成信号发送失败，继续跳转: {}", self.ctx, e);
                false
            }
        };

        self.store.freeze();

        let report = FinishReport {
            trigger,
            flushed,
            failed,
            completion_acknowledged,
            destination: self.settings.results_path.clone(),
        };
        info!(
            "{} ✓ 交卷完成: 补交 {} 题，失败 {} 题，跳转到 {}",
            self.ctx, report.flushed, report.failed, report.destination
        );
        Some(report)
    }

    /// 页面关闭时的清理
    ///
    /// 停止后台任务并释放摄像头，推送一次剩余时间，补交已选未交的答案。
    /// 不发送完成信号。
    pub async fn teardown(&mut self) -> Option<TeardownReport> {
        if self.closed {
            return None;
        }
        self.closed = true;
        info!("{} 🔌 会话中断，正在保存进度...", self.ctx);

        self.stop_background().await;

        let remaining = self.timer.remaining_seconds();
        let sync_timeout = self.settings.timer.sync_timeout;
        let pushed = time::timeout(
            sync_timeout,
            self.backend
                .push_remaining_time(&self.ctx.session_id, remaining),
        )
        .await
        .unwrap_or_else(|_| Err(TransportError::timeout("time", sync_timeout)));
        let time_pushed = match pushed {
            Ok(()) => true,
            Err(e) => {
                warn!("{} ⚠️ 剩余时间保存失败: {}", self.ctx, e);
                false
            }
        };

        let (flushed, failed) = self.flush_pending().await;
        self.store.freeze();

        Some(TeardownReport {
            flushed,
            failed,
            time_pushed,
        })
    }

    async fn stop_background(&mut self) {
        self.timer.stop();
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.stop().await;
        }
    }

    /// 按题号顺序补交，返回 (成功数, 失败数)
    async fn flush_pending(&mut self) -> (usize, usize) {
        let pending = self.store.pending_answers();
        if pending.is_empty() {
            return (0, 0);
        }
        info!("{} 📝 补交 {} 道未保存的题目", self.ctx, pending.len());

        let mut flushed = 0;
        let mut failed = 0;
        for answer in pending {
            match self
                .backend
                .submit_answer(&self.ctx.session_id, &answer.question_id, answer.option)
                .await
            {
                Ok(()) => {
                    self.store.mark_flushed(&answer);
                    flushed += 1;
                }
                Err(e) => {
                    warn!(
                        "{} ⚠️ 第 {} 题补交失败: {}",
                        self.ctx, answer.position, e
                    );
                    failed += 1;
                }
            }
        }
        (flushed, failed)
    }
}
