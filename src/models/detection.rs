//! 帧分析结果
//!
//! 后端返回的 JSON 字段是松散的，这里先按原样反序列化为 [`FrameAnalysis`]，
//! 再收敛为封闭的 [`AnalysisVerdict`]，由调用方穷尽匹配。

use serde::{Deserialize, Serialize};

/// 后端返回的原始分析结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    #[serde(default)]
    pub status: Option<String>,
    /// 本次检测到的违规列表
    #[serde(default, alias = "violations")]
    pub alerts: Option<Vec<String>>,
    /// 终止原因等说明文字
    #[serde(default, alias = "reason")]
    pub message: Option<String>,
    /// 后端累计的违规分
    #[serde(default)]
    pub score: Option<f64>,
    /// 后端累计的违规次数
    #[serde(default)]
    pub flags: Option<u32>,
}

/// 分析结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisVerdict {
    /// 无违规，或响应缺少可识别的字段
    Clear,
    /// 检测到违规（列表非空）
    Warning { violations: Vec<String> },
    /// 后端要求立即终止考试
    Terminate { reason: Option<String> },
}

impl FrameAnalysis {
    /// 收敛为分析结论
    ///
    /// `warning_popup` 但列表为空时视为无违规。
    pub fn verdict(&self) -> AnalysisVerdict {
        match self.status.as_deref() {
            Some("terminate") => AnalysisVerdict::Terminate {
                reason: self
                    .message
                    .as_ref()
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty()),
            },
            Some("warning_popup") => {
                let violations: Vec<String> = self
                    .alerts
                    .iter()
                    .flatten()
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
                if violations.is_empty() {
                    AnalysisVerdict::Clear
                } else {
                    AnalysisVerdict::Warning { violations }
                }
            }
            _ => AnalysisVerdict::Clear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> FrameAnalysis {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_terminate_with_reason() {
        let analysis = parse(r#"{"status":"terminate","message":"multiple faces","flags":5}"#);
        assert_eq!(
            analysis.verdict(),
            AnalysisVerdict::Terminate {
                reason: Some("multiple faces".to_string())
            }
        );
    }

    #[test]
    fn test_warning_accepts_violations_alias() {
        let analysis = parse(r#"{"status":"warning_popup","violations":["no face detected"]}"#);
        assert_eq!(
            analysis.verdict(),
            AnalysisVerdict::Warning {
                violations: vec!["no face detected".to_string()]
            }
        );
    }

    #[test]
    fn test_warning_with_empty_list_is_clear() {
        let analysis = parse(r#"{"status":"warning_popup","alerts":[]}"#);
        assert_eq!(analysis.verdict(), AnalysisVerdict::Clear);
    }

    #[test]
    fn test_missing_or_unknown_status_is_clear() {
        assert_eq!(parse("{}").verdict(), AnalysisVerdict::Clear);
        assert_eq!(
            parse(r#"{"status":"error","message":"boom"}"#).verdict(),
            AnalysisVerdict::Clear
        );
        assert_eq!(
            parse(r#"{"status":"processed","alerts":[],"score":0,"flags":0}"#).verdict(),
            AnalysisVerdict::Clear
        );
    }
}
