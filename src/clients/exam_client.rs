//! 考试后端 HTTP 客户端
//!
//! 封装所有与考试后端的调用；每个请求都带上 CSRF 令牌与会话 Cookie
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::clients::backend::ExamBackend;
use crate::clients::exam_page::parse_exam_page;
use crate::config::Config;
use crate::error::TransportError;
use crate::models::{
    CapturedFrame, FrameAnalysis, OptionKey, ProhibitedAction, QuestionContent, QuestionId,
    SessionBootstrap,
};

const CSRF_HEADER: &str = "x-csrftoken";

/// 考试后端 HTTP 客户端
pub struct HttpExamBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExamBackend {
    /// 创建新的客户端
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&config.csrf_token) {
            headers.insert(HeaderName::from_static(CSRF_HEADER), value);
        } else {
            warn!("CSRF 令牌包含非法字符，已忽略");
        }
        if !config.session_cookie.is_empty() {
            match HeaderValue::from_str(&config.session_cookie) {
                Ok(value) => {
                    headers.insert(COOKIE, value);
                }
                Err(_) => warn!("会话 Cookie 包含非法字符，已忽略"),
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| TransportError::RequestFailed {
                endpoint: "client".to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn exam_url(&self, session_id: &str) -> String {
        format!("{}/give-test/{}/", self.base_url, session_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// 向考试页面发送带 flag 的 JSON 请求
    async fn post_flag(&self, session_id: &str, body: Value) -> Result<Value, TransportError> {
        let endpoint = self.exam_url(session_id);
        let flag = body.get("flag").and_then(|v| v.as_str()).unwrap_or("?").to_string();
        debug!("POST {} flag={}", endpoint, flag);

        let response = self
            .client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|source| TransportError::RequestFailed {
                endpoint: endpoint.clone(),
                source,
            })?;

        let value: Value = read_json(&endpoint, response).await?;
        if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
            return Err(TransportError::rejected(endpoint, message));
        }
        Ok(value)
    }

    /// 发送表单请求
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let endpoint = self.url(path);
        debug!("POST {} (form)", endpoint);

        let response = self
            .client
            .post(&endpoint)
            .form(form)
            .send()
            .await
            .map_err(|source| TransportError::RequestFailed {
                endpoint: endpoint.clone(),
                source,
            })?;

        read_json(&endpoint, response).await
    }

    /// 打开考试页面，返回 HTML
    async fn get_page(&self, session_id: &str) -> Result<String, TransportError> {
        let endpoint = self.exam_url(session_id);
        debug!("GET {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| TransportError::RequestFailed {
                endpoint: endpoint.clone(),
                source,
            })?;

        read_text(&endpoint, response).await
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let text = read_text(endpoint, response).await?;
    serde_json::from_str(&text).map_err(|e| TransportError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

async fn read_text(endpoint: &str, response: reqwest::Response) -> Result<String, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::BadStatus {
            endpoint: endpoint.to_string(),
            status,
        });
    }
    response
        .text()
        .await
        .map_err(|source| TransportError::RequestFailed {
            endpoint: endpoint.to_string(),
            source,
        })
}

#[async_trait]
impl ExamBackend for HttpExamBackend {
    async fn fetch_question_sequence(
        &self,
        session_id: &str,
    ) -> Result<SessionBootstrap, TransportError> {
        // 打开考试页面会登记本次作答，剩余时间与已存答案都渲染在页面里
        let page = parse_exam_page(&self.get_page(session_id).await?);
        if page.time_left.is_none() {
            warn!("考试页面中没有剩余时间");
        }

        let question_ids: Vec<QuestionId> = self
            .post_form("randomize", &[("id", session_id.to_string())])
            .await?;

        Ok(SessionBootstrap {
            question_ids,
            prior_answers: page.answers,
            time_left: page.time_left.map(Value::String),
        })
    }

    async fn fetch_question_content(
        &self,
        session_id: &str,
        question_id: &QuestionId,
    ) -> Result<QuestionContent, TransportError> {
        let endpoint = self.exam_url(session_id);
        let value = self
            .post_flag(session_id, json!({ "flag": "get", "no": question_id }))
            .await?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }

    async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &QuestionId,
        option: OptionKey,
    ) -> Result<(), TransportError> {
        self.post_flag(
            session_id,
            json!({ "flag": "mark", "qid": question_id, "ans": option.as_str() }),
        )
        .await?;
        Ok(())
    }

    async fn push_remaining_time(
        &self,
        session_id: &str,
        seconds: i64,
    ) -> Result<(), TransportError> {
        self.post_flag(session_id, json!({ "flag": "time", "time": seconds }))
            .await?;
        Ok(())
    }

    async fn analyze_frame(
        &self,
        session_id: &str,
        frame: &CapturedFrame,
    ) -> Result<FrameAnalysis, TransportError> {
        let mut form = vec![
            ("data[imgData]", frame.encoded.clone()),
            ("data[testid]", session_id.to_string()),
        ];
        if let Some(level) = frame.audio_level {
            form.push(("data[voice_db]", level.to_string()));
        }
        self.post_form("video_feed", &form).await
    }

    async fn complete_session(&self, session_id: &str) -> Result<(), TransportError> {
        self.post_flag(session_id, json!({ "flag": "completed" }))
            .await?;
        Ok(())
    }

    async fn report_prohibited_action(
        &self,
        session_id: &str,
        action: ProhibitedAction,
    ) -> Result<(), TransportError> {
        let _: Value = self
            .post_form(
                "window_event",
                &[
                    ("testid", session_id.to_string()),
                    ("details", action.details().to_string()),
                    ("score", "1".to_string()),
                ],
            )
            .await?;
        Ok(())
    }
}
