//! 编码帧 (EncodedFrame) 与帧分类结果.
//!
//! 编码头解析器只负责给出 [`FrameInfo`] (帧类型 + 可选的分辨率/参考帧数),
//! 分帧层把完整的一帧数据和会话级元数据组合成 [`EncodedFrame`] 交给回调.

use bytes::Bytes;
use std::fmt;
use vigil_core::MediaType;

use crate::codec_id::CodecId;

/// 帧类型分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameType {
    /// 帧内编码 (关键帧)
    I,
    /// 前向预测
    P,
    /// 双向预测
    B,
    /// 视频参数集 (H.265)
    Vps,
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
    /// 增补增强信息
    Sei,
    /// 无法分类
    #[default]
    Unknown,
}

impl FrameType {
    /// 是否为关键帧
    pub fn is_keyframe(self) -> bool {
        self == Self::I
    }

    /// 是否为参数集 (VPS/SPS/PPS)
    pub fn is_parameter_set(self) -> bool {
        matches!(self, Self::Vps | Self::Sps | Self::Pps)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I => "I",
            Self::P => "P",
            Self::B => "B",
            Self::Vps => "VPS",
            Self::Sps => "SPS",
            Self::Pps => "PPS",
            Self::Sei => "SEI",
            Self::Unknown => "?",
        };
        write!(f, "{name}")
    }
}

/// 编码头解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// 帧类型
    pub frame_type: FrameType,
    /// 图像宽度 (仅在解析到 SPS/VOL/SOF 时存在)
    pub width: Option<u32>,
    /// 图像高度
    pub height: Option<u32>,
    /// 参考帧数量 (H.264 SPS)
    pub ref_frames: Option<u32>,
    /// 是否为图像的第一个切片 (H.265 first_slice_segment_in_pic_flag)
    pub first_slice: Option<bool>,
}

impl FrameInfo {
    /// 仅包含帧类型的结果
    pub fn of_type(frame_type: FrameType) -> Self {
        Self {
            frame_type,
            ..Self::default()
        }
    }

    /// 附加分辨率
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// 交付给回调的完整编码帧
///
/// 数据所有权随事件一起转移给回调, 分帧层不再持有.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// 流类别 (视频/音频/文本/未知)
    pub media_type: MediaType,
    /// 编码
    pub codec_id: CodecId,
    /// 帧类型
    pub frame_type: FrameType,
    /// 帧数据
    pub data: Bytes,
    /// 图像宽度
    pub width: Option<u32>,
    /// 图像高度
    pub height: Option<u32>,
    /// 参考帧数量
    pub ref_frames: Option<u32>,
    /// 音频采样率
    pub sample_rate: Option<u32>,
}

impl EncodedFrame {
    /// 从数据创建帧, 元数据为空
    pub fn new(media_type: MediaType, codec_id: CodecId, data: impl Into<Bytes>) -> Self {
        Self {
            media_type,
            codec_id,
            frame_type: FrameType::Unknown,
            data: data.into(),
            width: None,
            height: None,
            ref_frames: None,
            sample_rate: None,
        }
    }

    /// 数据大小 (字节)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空帧
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 是否为关键帧
    pub fn is_keyframe(&self) -> bool {
        self.frame_type.is_keyframe()
    }
}
