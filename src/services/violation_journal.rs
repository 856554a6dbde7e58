//! 违规记录 - 业务能力层
//!
//! 只负责把违规与终止事件追加到本地文件，不关心流程

use std::fs::OpenOptions;
use std::io::Write;

use chrono::Local;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::ProhibitedAction;

/// 违规记录
pub struct ViolationJournal {
    path: String,
}

impl ViolationJournal {
    pub fn new() -> Self {
        Self {
            path: "violations.log".to_string(),
        }
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 记录一批违规
    ///
    /// # 参数
    /// - `session_id`: 考试ID
    /// - `count`: 累计违规批次
    /// - `threshold`: 终止阈值
    /// - `violations`: 本批违规描述
    pub fn record_warning(
        &self,
        session_id: &str,
        count: u32,
        threshold: u32,
        violations: &[String],
    ) -> AppResult<()> {
        self.append(&format!(
            "考试 {} | 违规 {}/{} | {}",
            session_id,
            count,
            threshold,
            violations.join("; ")
        ))
    }

    /// 记录强制终止
    pub fn record_termination(&self, session_id: &str, reason: &str) -> AppResult<()> {
        self.append(&format!("考试 {} | 终止 | {}", session_id, reason))
    }

    /// 记录页面违规操作
    pub fn record_prohibited_action(
        &self,
        session_id: &str,
        action: ProhibitedAction,
    ) -> AppResult<()> {
        self.append(&format!("考试 {} | 操作 | {}", session_id, action.details()))
    }

    fn append(&self, line: &str) -> AppResult<()> {
        debug!("写入违规记录: {}", line);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::file(&self.path, e))?;

        let stamped = format!("[{}] {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), line);
        file.write_all(stamped.as_bytes())
            .map_err(|e| AppError::file(&self.path, e))?;

        Ok(())
    }
}

impl Default for ViolationJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_stamped_lines() {
        let path = std::env::temp_dir().join(format!(
            "violation_journal_{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let journal = ViolationJournal::with_path(path.to_string_lossy());

        journal
            .record_warning("42", 1, 5, &["phone detected".to_string()])
            .unwrap();
        journal.record_termination("42", "multiple faces").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("考试 42 | 违规 1/5 | phone detected"));
        assert!(lines[1].ends_with("考试 42 | 终止 | multiple faces"));

        let _ = std::fs::remove_file(&path);
    }
}
