//! # Exam Proctor
//!
//! 带摄像头监考的限时考试客户端
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，摄像头画面通过它采集
//! - `clients/` - 考试后端契约 `ExamBackend` 与 HTTP 实现
//!
//! ### ② 业务能力层（Services）
//! - `QuestionStore` - 题目作答与书签状态
//! - `TimerEngine` - 倒计时与剩余时间同步
//! - `MonitoringLoop` - 采集、分析、违规累计与终止
//! - `ViolationJournal` - 违规记录文件
//!
//! ### ③ 流程层（Workflow）
//! - `SessionCtx` - 上下文封装（考试 id）
//! - `SessionController` - 一场考试：导航、作答、交卷、中断
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/exam_runner` - 会话生命周期与事件循环
//! - `orchestrator/command` - 终端命令
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use clients::{ExamBackend, HttpExamBackend};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use orchestrator::App;
pub use services::{FrameSource, MonitoringLoop, QuestionStore, SessionEvent, TimerEngine};
pub use workflow::{FinishReport, FinishTrigger, SessionController, SessionCtx};
