//! 传输分帧方式.
//!
//! 各分帧方式的处理函数是 [`Session`](crate::session::Session) 的方法,
//! 位于 `session/` 目录下.

use std::fmt;

/// 传输分帧方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingKind {
    /// 尚未确定, 在响应头之后的第一段数据上判定
    #[default]
    Unknown,
    /// 以边界串分隔的 multipart 流
    MultiPart,
    /// 连续的单段数据, 每次读取即一帧
    SinglePart,
    /// 连续的单段 MJPEG, 以 SOI/EOI 定界
    SinglePartImage,
    /// 恰好 content-length 字节的单次响应
    SingleResponse,
    /// 分块传输承载的 MPEG-TS
    MultiChunk,
}

impl fmt::Display for FramingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::MultiPart => "multipart",
            Self::SinglePart => "single-part",
            Self::SinglePartImage => "single-part-image",
            Self::SingleResponse => "single-response",
            Self::MultiChunk => "multi-chunk",
        };
        write!(f, "{name}")
    }
}

/// multipart 的子状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PartState {
    /// 逐行扫描分段头
    #[default]
    Header,
    /// 累积帧数据
    Frame,
}

/// 当前 multipart 分段的状态
#[derive(Debug, Default)]
pub(crate) struct PartContext {
    pub state: PartState,
    /// 自上一个空行以来是否见过边界行
    pub boundary_seen: bool,
    /// 分段声明的内容长度
    pub content_length: Option<usize>,
}

impl PartContext {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// SinglePartImage 跨读取的扫描状态
#[derive(Debug, Default)]
pub(crate) struct ImageScan {
    /// 是否位于 SOI 与 EOI 之间
    pub in_frame: bool,
    /// 上一个字节是否为标记前缀 0xFF
    pub prev_ff: bool,
}
