//! 考试运行器 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、后端客户端、浏览器摄像头
//! 2. **事件循环**：同一个任务里轮流处理终端命令、后台事件与 Ctrl-C
//! 3. **资源管理**：持有 Browser，保证摄像头页面在会话期间有效
//! 4. **最终统计**：交卷或中断后输出统计
//!
//! 控制器只在这里被驱动，所有状态变更都串行发生。

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Browser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::browser;
use crate::clients::{ExamBackend, HttpExamBackend};
use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::JsExecutor;
use crate::orchestrator::command::Command;
use crate::services::{BrowserFrameSource, EventReceiver, FrameSource};
use crate::utils::logging::{self, truncate_text};
use crate::workflow::{
    ControllerSettings, EventOutcome, FinishReport, FinishTrigger, SessionController, SessionCtx,
};

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Option<Browser>,
    controller: SessionController,
    events: EventReceiver,
}

/// 一次命令处理后的去向
enum Flow {
    Continue,
    Finished(FinishReport),
    Interrupted,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file, &config.session_id)?;
        logging::log_startup(&config.session_id, config.proctoring_enabled);

        let backend: Arc<dyn ExamBackend> = Arc::new(HttpExamBackend::new(&config)?);

        let (browser, frame_source) = if config.proctoring_enabled {
            let (browser, page) = browser::connect_to_browser_and_page(
                config.browser_debug_port,
                Some(&config.camera_page_url),
            )
            .await?;
            let source: Arc<dyn FrameSource> =
                Arc::new(BrowserFrameSource::new(JsExecutor::new(page)));
            (Some(browser), Some(source))
        } else {
            (None, None)
        };

        let (controller, events) = SessionController::initialize(
            SessionCtx::new(config.session_id.clone()),
            backend,
            frame_source,
            ControllerSettings::from_config(&config),
        )
        .await?;

        Ok(Self {
            config,
            _browser: browser,
            controller,
            events,
        })
    }

    /// 运行考试会话直到交卷或中断
    pub async fn run(mut self) -> Result<()> {
        self.controller.start()?;
        print_help();
        self.show_current().await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut finish_requested = false;

        let flow = loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            info!("{} 输入已关闭", self.controller.ctx());
                            break self.interrupt().await;
                        }
                        Err(e) => {
                            error!("{} ❌ 读取输入失败: {}", self.controller.ctx(), e);
                            break self.interrupt().await;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let command = match line.parse::<Command>() {
                        Ok(command) => command,
                        Err(e) => {
                            warn!("{}", e);
                            continue;
                        }
                    };
                    match self.execute(command, &mut finish_requested).await {
                        Flow::Continue => {}
                        other => break other,
                    }
                }
                Some(event) = self.events.recv() => {
                    match self.controller.handle_event(event).await {
                        EventOutcome::Clock { display: shown } => debug!("⏱️ {}", shown),
                        EventOutcome::Warning { violations, count, threshold } => {
                            warn!(
                                "{} 🚨 违规警告 ({}/{}): {}",
                                self.controller.ctx(),
                                count,
                                threshold,
                                violations.join(", ")
                            );
                        }
                        EventOutcome::Finished(report) => break Flow::Finished(report),
                        EventOutcome::Ignored => {}
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("{} 收到中断信号", self.controller.ctx());
                    break self.interrupt().await;
                }
            }
        };

        let violations = self.controller.violations().map(|v| v.count).unwrap_or(0);
        match flow {
            Flow::Finished(report) => {
                if let FinishTrigger::Terminated { reason } = &report.trigger {
                    error!("{} 🚫 考试已被终止: {}", self.controller.ctx(), reason);
                }
                logging::print_final_stats(
                    &self.controller.counters(),
                    violations,
                    &report.destination,
                );
            }
            Flow::Interrupted | Flow::Continue => {
                logging::print_final_stats(
                    &self.controller.counters(),
                    violations,
                    "(会话已中断，可稍后继续)",
                );
            }
        }

        info!("📄 日志已写入: {}", self.config.output_log_file);
        Ok(())
    }

    /// 执行一条命令
    async fn execute(&mut self, command: Command, finish_requested: &mut bool) -> Flow {
        if command != Command::Confirm {
            *finish_requested = false;
        }

        let result: Result<(), AppError> = match command {
            Command::Next => self.controller.next().map(|_| ()).map_err(Into::into),
            Command::Previous => self.controller.previous().map(|_| ()).map_err(Into::into),
            Command::Goto(position) => self
                .controller
                .jump_to(position)
                .map(|_| ())
                .map_err(Into::into),
            Command::Select(option) => self.controller.select_answer(option).map_err(Into::into),
            Command::Bookmark => self
                .controller
                .toggle_bookmark()
                .map(|status| info!("🔖 书签状态: {:?}", status))
                .map_err(Into::into),
            Command::Submit => self.controller.submit_current().await.map(|_| ()),
            Command::Show => Ok(()),
            Command::Status => {
                self.show_status();
                return Flow::Continue;
            }
            Command::Finish => {
                self.show_status();
                info!("确认交卷请输入 confirm");
                *finish_requested = true;
                return Flow::Continue;
            }
            Command::Confirm => {
                if !*finish_requested {
                    warn!("请先输入 finish 查看统计");
                    return Flow::Continue;
                }
                return match self.controller.finish(FinishTrigger::User).await {
                    Some(report) => Flow::Finished(report),
                    None => Flow::Continue,
                };
            }
            Command::Report(action) => {
                self.controller.report_prohibited_action(action).await;
                return Flow::Continue;
            }
            Command::Help => {
                print_help();
                return Flow::Continue;
            }
            Command::Quit => return self.interrupt().await,
        };

        match result {
            Ok(()) => {
                if matches!(
                    command,
                    Command::Next
                        | Command::Previous
                        | Command::Goto(_)
                        | Command::Submit
                        | Command::Show
                ) {
                    self.show_current().await;
                }
            }
            Err(AppError::Validation(e)) => warn!("⚠️ {}", e),
            Err(AppError::Transport(e)) => warn!("⚠️ {}（可以重试）", e),
            Err(e) => error!("❌ {}", e),
        }

        Flow::Continue
    }

    async fn interrupt(&mut self) -> Flow {
        if let Some(report) = self.controller.teardown().await {
            info!(
                "{} 💾 进度已保存: 补交 {} 题，失败 {} 题，剩余时间{}",
                self.controller.ctx(),
                report.flushed,
                report.failed,
                if report.time_pushed { "已保存" } else { "未保存" }
            );
        }
        Flow::Interrupted
    }

    // ========== 显示辅助函数 ==========

    async fn show_current(&self) {
        match self.controller.current_question().await {
            Ok(view) => {
                info!("{}", "-".repeat(60));
                info!(
                    "第 {}/{} 题 (满分 {})  ⏱️ {}",
                    view.position,
                    view.total,
                    view.content.max_marks_text(),
                    self.controller.clock_display()
                );
                info!("{}", truncate_text(&view.content.prompt, 500));
                for (key, text) in view.content.options() {
                    let marker = if view.state.selected == Some(key) { "●" } else { "○" };
                    info!("  {} {}. {}", marker, key, truncate_text(text, 200));
                }
                info!("状态: {:?}", view.state.status);
            }
            Err(e) => warn!(
                "{} ⚠️ 第 {} 题内容加载失败: {}",
                self.controller.ctx(),
                self.controller.position(),
                e
            ),
        }
    }

    fn show_status(&self) {
        let grid: String = self
            .controller
            .grid()
            .iter()
            .enumerate()
            .map(|(index, mark)| {
                let cell = format!("{}{}", index + 1, mark.symbol());
                if index + 1 == self.controller.position() {
                    format!("[{}]", cell)
                } else {
                    cell
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let counters = self.controller.counters();
        info!("📋 {}", grid);
        info!(
            "总数 {} | 已作答 {} | 未作答 {} | 剩余时间 {}",
            counters.total,
            counters.attempted,
            counters.remaining,
            self.controller.clock_display()
        );
        if let Some(violations) = self.controller.violations() {
            info!("🚨 违规 {}/{}", violations.count, violations.threshold);
        }
    }
}

fn print_help() {
    info!("命令: n 下一题 | p 上一题 | g <题号> 跳转 | a/b/c/d 选择 | m 书签 | s 提交");
    info!("      show 显示题目 | status 统计 | finish 交卷 | quit 中断 | help 帮助");
}
