//! 日志工具模块
//!
//! 初始化 tracing，写会话日志文件头，以及启动/结束时的统计横幅
use std::fs;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};
use crate::services::question_store::Counters;

/// 初始化 tracing 订阅器
///
/// `RUST_LOG` 优先；否则默认 `info`，`verbose` 时为 `debug`。
/// 重复调用是安全的（测试里会多次调用）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化会话日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
/// - `session_id`: 考试 ID
pub fn init_log_file(log_file_path: &str, session_id: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n考试会话日志 - {} - {}\n{}\n\n",
        "=".repeat(60),
        session_id,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|e| AppError::file(log_file_path, e))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(session_id: &str, proctoring_enabled: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 考试客户端启动 - 考试 {}", session_id);
    info!(
        "🎥 摄像头监考: {}",
        if proctoring_enabled { "开启" } else { "关闭" }
    );
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `counters`: 题目统计
/// - `violations`: 违规次数
/// - `destination`: 结束后跳转的页面
pub fn print_final_stats(counters: &Counters, violations: u32, destination: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 考试结束统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📋 题目总数: {}", counters.total);
    info!("✅ 已作答: {}", counters.attempted);
    info!("⏳ 未作答: {}", counters.remaining);
    info!("🚨 违规次数: {}", violations);
    info!("{}", "=".repeat(60));
    info!("\n即将跳转至: {}", destination);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
