//! 错误类型
//!
//! 按关注点划分：本地校验、远程传输、计时器状态机、摄像头采集、浏览器、配置。
//! 所有子错误汇总到 [`AppError`]。

use thiserror::Error;

use crate::services::timer_engine::TimerPhase;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 本地校验失败（用户可以修正）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 远程调用失败
    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),
    /// 计时器状态错误
    #[error("计时器错误: {0}")]
    Timer(#[from] TimerError),
    /// 摄像头采集错误
    #[error("采集错误: {0}")]
    Capture(#[from] CaptureError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件读写错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 本地校验错误
///
/// 不会改变任何状态，直接提示用户。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 提交时未选择答案
    #[error("第 {position} 题尚未选择答案，请先选择再提交")]
    NoSelection { position: usize },
    /// 题号超出范围
    #[error("题号 {position} 超出范围 [1, {total}]")]
    PositionOutOfRange { position: usize, total: usize },
    /// 已经是第一题
    #[error("已经是第一题")]
    AtFirstQuestion,
    /// 已经是最后一题
    #[error("已经是最后一题")]
    AtLastQuestion,
    /// 无法识别的选项
    #[error("无法识别的选项: {0}")]
    UnknownOption(String),
    /// 考试已结束，题目状态已冻结
    #[error("考试已结束，不再接受修改")]
    SessionFinalized,
    /// 后端返回的题目列表为空
    #[error("题目列表为空")]
    EmptySequence,
}

/// 远程调用错误
///
/// 超时与其他传输失败同等对待：记录日志，等下一个周期自然重试。
#[derive(Debug, Error)]
pub enum TransportError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 非 2xx 响应
    #[error("响应状态异常 ({endpoint}): {status}")]
    BadStatus {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    /// 请求超时
    #[error("请求超时 ({endpoint}): 超过 {timeout_secs} 秒")]
    Timeout { endpoint: String, timeout_secs: u64 },
    /// 响应解析失败
    #[error("响应解析失败 ({endpoint}): {message}")]
    Decode { endpoint: String, message: String },
    /// 后端拒绝了请求
    #[error("后端拒绝请求 ({endpoint}): {message}")]
    Rejected { endpoint: String, message: String },
}

impl TransportError {
    /// 创建超时错误
    pub fn timeout(endpoint: impl Into<String>, timeout: std::time::Duration) -> Self {
        TransportError::Timeout {
            endpoint: endpoint.into(),
            timeout_secs: timeout.as_secs(),
        }
    }

    /// 创建拒绝错误
    pub fn rejected(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        TransportError::Rejected {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

/// 计时器状态机错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("计时器处于 {from:?} 状态，无法启动")]
    InvalidTransition { from: TimerPhase },
}

/// 摄像头采集错误
#[derive(Debug, Error)]
pub enum CaptureError {
    /// 设备不可用（未授权、未找到等）
    #[error("摄像头不可用: {0}")]
    DeviceUnavailable(String),
    /// 采集到空帧
    #[error("采集到空帧")]
    EmptyFrame,
    /// 浏览器执行失败
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    ScriptExecutionFailed(#[from] chromiumoxide::error::CdpError),
    /// 脚本返回值无法解析
    #[error("脚本返回值解析失败: {0}")]
    ResultDecodeFailed(#[from] serde_json::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("无法解析配置文件 {path}: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 必填项缺失
    #[error("缺少必填配置项: {0}")]
    Missing(&'static str),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件错误
    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
