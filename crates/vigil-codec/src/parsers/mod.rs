//! 编码头解析器.
//!
//! 每种编码一个入口, 只读取输入切片, 不持有任何会话状态.
//! 入口函数不会因为损坏数据而报错, 无法识别时返回 [`FrameType::Unknown`](crate::FrameType::Unknown).

pub mod aac;
pub mod annexb;
pub mod h264;
pub mod h265;
pub mod mjpeg;
pub mod mpeg4;

use crate::codec_id::CodecId;
use crate::frame::FrameInfo;

/// 按编码分派到对应的帧头解析器
///
/// 音频编码没有帧头可解析, 返回默认结果.
pub fn parse_frame_header(codec_id: CodecId, data: &[u8]) -> FrameInfo {
    match codec_id {
        CodecId::H264 => h264::parse_h264_header(data),
        CodecId::H265 => h265::parse_h265_header(data),
        CodecId::Mpeg4 => mpeg4::parse_mpeg4_header(data),
        CodecId::Mjpeg => mjpeg::parse_mjpeg_header(data),
        _ => FrameInfo::default(),
    }
}
