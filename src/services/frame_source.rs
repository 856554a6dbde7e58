//! 摄像头画面来源 - 业务能力层
//!
//! [`FrameSource`] 抽象出"采集一帧"与"释放设备"两个能力，
//! 监考循环只依赖这个 trait。浏览器实现通过页面里的 `getUserMedia` 取流。

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::infrastructure::JsExecutor;
use crate::models::CapturedFrame;

/// 摄像头画面来源
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// 采集一帧（首次调用时打开设备）
    async fn capture(&self) -> Result<CapturedFrame, CaptureError>;

    /// 释放设备，可重复调用
    async fn release(&self);
}

/// 基于浏览器页面的摄像头
pub struct BrowserFrameSource {
    executor: JsExecutor,
}

#[derive(Debug, Deserialize)]
struct CaptureReply {
    ok: bool,
    #[serde(default)]
    frame: Option<String>,
    #[serde(default)]
    audio_level: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

const CAPTURE_JS: &str = r#"
(async () => {
    try {
        if (!window.__examCamera) {
            let stream;
            try {
                stream = await navigator.mediaDevices.getUserMedia({
                    video: { width: { ideal: 1280 }, height: { ideal: 720 }, facingMode: 'user' },
                    audio: true
                });
            } catch (e) {
                stream = await navigator.mediaDevices.getUserMedia({ video: true });
            }
            const video = document.createElement('video');
            video.muted = true;
            video.playsInline = true;
            video.srcObject = stream;
            await video.play();
            const canvas = document.createElement('canvas');
            canvas.width = 640;
            canvas.height = 480;
            let analyser = null;
            if (stream.getAudioTracks().length > 0) {
                const audioCtx = new AudioContext();
                analyser = audioCtx.createAnalyser();
                analyser.fftSize = 1024;
                audioCtx.createMediaStreamSource(stream).connect(analyser);
            }
            window.__examCamera = { stream, video, canvas, analyser };
        }
        const cam = window.__examCamera;
        cam.canvas.getContext('2d').drawImage(cam.video, 0, 0, cam.canvas.width, cam.canvas.height);
        const frame = (cam.canvas.toDataURL('image/jpeg', 0.8).split(',')[1]) || '';
        let level = null;
        if (cam.analyser) {
            const bins = new Uint8Array(cam.analyser.frequencyBinCount);
            cam.analyser.getByteFrequencyData(bins);
            level = bins.reduce((sum, v) => sum + v, 0) / bins.length;
        }
        return { ok: true, frame, audio_level: level };
    } catch (err) {
        return { ok: false, error: String((err && err.message) || err) };
    }
})()
"#;

const RELEASE_JS: &str = r#"
(() => {
    const cam = window.__examCamera;
    if (!cam) return false;
    cam.stream.getTracks().forEach(track => track.stop());
    cam.video.srcObject = null;
    delete window.__examCamera;
    return true;
})()
"#;

impl BrowserFrameSource {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl FrameSource for BrowserFrameSource {
    async fn capture(&self) -> Result<CapturedFrame, CaptureError> {
        let reply: CaptureReply = self.executor.eval_as(CAPTURE_JS).await?;

        if !reply.ok {
            return Err(CaptureError::DeviceUnavailable(
                reply.error.unwrap_or_else(|| "未知原因".to_string()),
            ));
        }

        match reply.frame {
            Some(encoded) if !encoded.is_empty() => Ok(CapturedFrame {
                encoded,
                audio_level: reply.audio_level,
            }),
            _ => Err(CaptureError::EmptyFrame),
        }
    }

    async fn release(&self) {
        match self.executor.eval_as::<bool>(RELEASE_JS).await {
            Ok(true) => debug!("📷 摄像头已释放"),
            Ok(false) => debug!("摄像头未打开，无需释放"),
            Err(e) => warn!("⚠️ 释放摄像头失败: {}", e),
        }
    }
}
