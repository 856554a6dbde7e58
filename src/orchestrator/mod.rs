//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责启动会话和调度事件，是整个系统的"指挥中心"。
//!
//! ### `exam_runner` - 考试运行器
//! - 管理应用生命周期（初始化、运行、中断）
//! - 管理浏览器资源（Browser、摄像头页面）
//! - 把终端命令、后台事件、Ctrl-C 串行地交给控制器
//! - 输出最终统计信息
//!
//! ### `command` - 终端命令解析
//!
//! ## 层次关系
//!
//! ```text
//! exam_runner (会话生命周期 + 事件循环)
//!     ↓
//! workflow::SessionController (一场考试的状态)
//!     ↓
//! services (能力层：题目状态 / 倒计时 / 监考 / 违规记录)
//!     ↓
//! clients + infrastructure (后端 HTTP、JsExecutor)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有 Browser
//! 2. **向下依赖**：编排层 → workflow → services → clients / infrastructure
//! 3. **无业务逻辑**：只做调度和显示，不做状态判断

pub mod command;
pub mod exam_runner;

pub use command::{Command, CommandError};
pub use exam_runner::App;
