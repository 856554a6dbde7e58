//! 程序配置
//!
//! 默认值 → 可选的 TOML 配置文件（`EXAM_CONFIG`）→ 环境变量，后者覆盖前者。

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 后端配置 ---
    /// 考试后端地址
    pub base_url: String,
    /// 考试（会话）ID
    pub session_id: String,
    /// CSRF 令牌
    pub csrf_token: String,
    /// 会话 Cookie（例如 `sessionid=...; csrftoken=...`）
    pub session_cookie: String,
    /// 考试结束后跳转的页面
    pub results_path: String,
    /// 从第几题开始（1-based，对应 `?q=` 参数）
    pub start_position: Option<usize>,

    // --- 计时器配置 ---
    /// 剩余时间同步间隔（秒）
    pub time_sync_interval_secs: u64,
    /// 剩余时间同步超时（秒）
    pub time_sync_timeout_secs: u64,

    // --- 监考配置 ---
    /// 是否启用摄像头监考
    pub proctoring_enabled: bool,
    /// 采集间隔（秒）
    pub monitor_interval_secs: u64,
    /// 单帧分析超时（秒）
    pub analyze_timeout_secs: u64,
    /// 违规次数上限
    pub violation_threshold: u32,
    /// 浏览器调试端口（摄像头页面所在的浏览器）
    pub browser_debug_port: u16,
    /// 摄像头页面 URL
    pub camera_page_url: String,

    // --- 日志配置 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 会话日志文件
    pub output_log_file: String,
    /// 违规记录文件
    pub violation_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            session_id: String::new(),
            csrf_token: String::new(),
            session_cookie: String::new(),
            results_path: "/tests-given/".to_string(),
            start_position: None,
            time_sync_interval_secs: 10,
            time_sync_timeout_secs: 5,
            proctoring_enabled: true,
            monitor_interval_secs: 3,
            analyze_timeout_secs: 8,
            violation_threshold: 5,
            browser_debug_port: 9222,
            camera_page_url: "about:blank".to_string(),
            verbose_logging: false,
            output_log_file: "exam_session.log".to_string(),
            violation_log_file: "violations.log".to_string(),
        }
    }
}

impl Config {
    /// 仅从环境变量加载（未设置的项使用默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 加载配置：若设置了 `EXAM_CONFIG` 则先读取该 TOML 文件，再应用环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("EXAM_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            base_url: env_string("EXAM_BASE_URL").unwrap_or(self.base_url),
            session_id: env_string("EXAM_SESSION_ID").unwrap_or(self.session_id),
            csrf_token: env_string("EXAM_CSRF_TOKEN").unwrap_or(self.csrf_token),
            session_cookie: env_string("EXAM_SESSION_COOKIE")
                .unwrap_or(self.session_cookie),
            results_path: env_string("EXAM_RESULTS_PATH").unwrap_or(self.results_path),
            start_position: env_parse("EXAM_START_POSITION").or(self.start_position),
            time_sync_interval_secs: env_parse("TIME_SYNC_INTERVAL_SECS")
                .unwrap_or(self.time_sync_interval_secs),
            time_sync_timeout_secs: env_parse("TIME_SYNC_TIMEOUT_SECS")
                .unwrap_or(self.time_sync_timeout_secs),
            proctoring_enabled: env_parse("PROCTORING_ENABLED")
                .unwrap_or(self.proctoring_enabled),
            monitor_interval_secs: env_parse("MONITOR_INTERVAL_SECS")
                .unwrap_or(self.monitor_interval_secs),
            analyze_timeout_secs: env_parse("ANALYZE_TIMEOUT_SECS")
                .unwrap_or(self.analyze_timeout_secs),
            violation_threshold: env_parse("VIOLATION_THRESHOLD")
                .unwrap_or(self.violation_threshold),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT")
                .unwrap_or(self.browser_debug_port),
            camera_page_url: env_string("CAMERA_PAGE_URL")
                .unwrap_or(self.camera_page_url),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            output_log_file: env_string("OUTPUT_LOG_FILE")
                .unwrap_or(self.output_log_file),
            violation_log_file: env_string("VIOLATION_LOG_FILE")
                .unwrap_or(self.violation_log_file),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session_id.trim().is_empty() {
            return Err(ConfigError::Missing("session_id"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("base_url"));
        }
        Ok(())
    }

    pub fn time_sync_interval(&self) -> Duration {
        Duration::from_secs(self.time_sync_interval_secs.max(1))
    }

    pub fn time_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.time_sync_timeout_secs.max(1))
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs.max(1))
    }

    pub fn analyze_timeout(&self) -> Duration {
        Duration::from_secs(self.analyze_timeout_secs.max(1))
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
