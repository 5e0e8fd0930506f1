//! H.265/HEVC 编码头解析器.
//!
//! # HEVC NAL 头部 (2 字节)
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ forbidden(1) | type(6) | layer_id(6) | tid(3) │
//! └────────────────────────────────────────────┘
//! ```
//!
//! 切片负载的第一位是 `first_slice_segment_in_pic_flag`, 分帧层据此把同一图像的
//! 多个切片拼成完整的一帧.

pub mod nal;
pub mod sps;

use log::debug;

use crate::frame::{FrameInfo, FrameType};

pub use nal::{HevcNalUnit, HevcNalUnitType, first_nal_type, split_hevc_annex_b};
pub use sps::{HevcSps, parse_hevc_sps};

/// 解析一段 H.265 Annex B 数据的帧头
///
/// 第一个切片决定帧类型 (IRAP 为 I, 其余为 P) 和 `first_slice`;
/// 没有切片时由第一个可识别的 NAL 决定. SPS 更新分辨率.
pub fn parse_h265_header(data: &[u8]) -> FrameInfo {
    let mut info = FrameInfo::default();
    let mut first_non_vcl: Option<FrameType> = None;

    for nalu in split_hevc_annex_b(data) {
        match nalu.nal_type {
            HevcNalUnitType::Trailing(_) | HevcNalUnitType::Irap(_) => {
                let Some(&first) = nalu.payload.first() else {
                    continue;
                };
                info.frame_type = if matches!(nalu.nal_type, HevcNalUnitType::Irap(_)) {
                    FrameType::I
                } else {
                    FrameType::P
                };
                info.first_slice = Some(first & 0x80 != 0);
                return info;
            }
            HevcNalUnitType::Vps => {
                first_non_vcl.get_or_insert(FrameType::Vps);
            }
            HevcNalUnitType::Sps => {
                match parse_hevc_sps(nalu.payload) {
                    Ok(sps) => {
                        info.width = Some(sps.width);
                        info.height = Some(sps.height);
                    }
                    Err(e) => debug!("HEVC: SPS 解析失败: {}", e),
                }
                first_non_vcl.get_or_insert(FrameType::Sps);
            }
            HevcNalUnitType::Pps => {
                first_non_vcl.get_or_insert(FrameType::Pps);
            }
            HevcNalUnitType::PrefixSei | HevcNalUnitType::SuffixSei => {
                first_non_vcl.get_or_insert(FrameType::Sei);
            }
            HevcNalUnitType::Aud | HevcNalUnitType::Other(_) => {}
        }
    }

    info.frame_type = first_non_vcl.unwrap_or_default();
    info
}
