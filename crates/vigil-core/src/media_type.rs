//! 媒体类型定义.
//!
//! 由 HTTP `Content-Type` 的主类型推导出的媒体大类.

use std::fmt;

/// 媒体流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaType {
    /// 视频流
    Video,
    /// 音频流
    Audio,
    /// 图片 (如 image/jpeg 快照或 MJPEG)
    Image,
    /// 文本 (如元数据、事件通知)
    Text,
    /// 应用数据
    Application,
    /// 尚未确定
    #[default]
    Unknown,
}

impl MediaType {
    /// 从 MIME 主类型 (如 "video", "Audio") 推导, 大小写不敏感
    pub fn from_mime_main(main: &str) -> Self {
        let main = main.trim();
        if main.eq_ignore_ascii_case("video") {
            Self::Video
        } else if main.eq_ignore_ascii_case("audio") {
            Self::Audio
        } else if main.eq_ignore_ascii_case("image") {
            Self::Image
        } else if main.eq_ignore_ascii_case("text") {
            Self::Text
        } else if main.eq_ignore_ascii_case("application") {
            Self::Application
        } else {
            Self::Unknown
        }
    }

    /// 对外上报的流类别: 视频/音频/文本/未知
    ///
    /// 图片帧按视频上报, 应用数据按未知上报.
    pub fn stream_category(self) -> Self {
        match self {
            Self::Video | Self::Image => Self::Video,
            Self::Audio => Self::Audio,
            Self::Text => Self::Text,
            Self::Application | Self::Unknown => Self::Unknown,
        }
    }

    /// 是否已声明媒体类型
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Video => "视频",
            Self::Audio => "音频",
            Self::Image => "图片",
            Self::Text => "文本",
            Self::Application => "应用",
            Self::Unknown => "未知",
        };
        write!(f, "{name}")
    }
}
