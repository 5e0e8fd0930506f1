//! H.264/AVC 编码头解析器.
//!
//! 不解码图像, 只从 Annex B 码流中判定帧类型:
//! - 逐个 NAL 单元分类 (切片 / SPS / PPS / SEI)
//! - 切片头读取 `first_mb_in_slice` 与 `slice_type`
//! - SPS 解析出分辨率与参考帧数

pub mod nal;
pub mod sps;

use log::debug;
use vigil_core::bitreader::BitReader;

use crate::frame::{FrameInfo, FrameType};

pub use nal::{NalUnit, NalUnitType, split_annex_b};
pub use sps::{Sps, parse_sps};

/// 解析一段 H.264 Annex B 数据的帧头
///
/// 同一缓冲区常同时携带 SPS + PPS + IDR. 第一个切片决定帧类型,
/// 途经的 SPS 更新分辨率与参考帧数; 没有切片时由第一个可识别的 NAL 决定.
/// 无法识别时返回 [`FrameType::Unknown`], 不会报错.
pub fn parse_h264_header(data: &[u8]) -> FrameInfo {
    let mut info = FrameInfo::default();
    let mut first_non_vcl: Option<FrameType> = None;

    for nalu in split_annex_b(data) {
        match nalu.nal_type {
            t if t.has_slice_header() => {
                if let Some(frame_type) = parse_slice_type(nalu.payload()) {
                    info.frame_type = frame_type;
                    return info;
                }
            }
            NalUnitType::Sps => {
                match parse_sps(nalu.payload()) {
                    Ok(sps) => {
                        info.width = Some(sps.width);
                        info.height = Some(sps.height);
                        info.ref_frames = sps.ref_frames();
                    }
                    Err(e) => debug!("H.264: SPS 解析失败: {}", e),
                }
                first_non_vcl.get_or_insert(FrameType::Sps);
            }
            NalUnitType::Pps => {
                first_non_vcl.get_or_insert(FrameType::Pps);
            }
            NalUnitType::Sei => {
                first_non_vcl.get_or_insert(FrameType::Sei);
            }
            _ => {}
        }
    }

    info.frame_type = first_non_vcl.unwrap_or_default();
    info
}

/// 读取切片头中的 slice_type 并映射为帧类型
///
/// slice_type 0-4 与 5-9 含义相同 (后者表示整帧同类型): P, B, I, SP, SI.
fn parse_slice_type(payload: &[u8]) -> Option<FrameType> {
    let mut br = BitReader::with_emulation_prevention(payload, true);
    br.read_ue(); // first_mb_in_slice
    let slice_type = br.read_ue();
    if br.check("H.264 slice header").is_err() {
        return None;
    }

    match slice_type {
        2 | 7 | 4 | 9 => Some(FrameType::I),
        0 | 5 | 3 | 8 => Some(FrameType::P),
        1 | 6 => Some(FrameType::B),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::sps::tests::{TestSps, build_test_sps};
    use super::*;
    use vigil_core::BitWriter;

    fn slice_nal(nal_header: u8, slice_type: u32) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_ue(0); // first_mb_in_slice
        bw.write_ue(slice_type);
        bw.write_ue(0); // pic_parameter_set_id
        bw.write_bits(0x5A5A, 16);
        let mut nal = vec![0x00, 0x00, 0x00, 0x01, nal_header];
        nal.extend(bw.finish());
        nal
    }

    fn sps_nal(p: &TestSps) -> Vec<u8> {
        let mut nal = vec![0x00, 0x00, 0x00, 0x01, 0x67];
        nal.extend(build_test_sps(p));
        nal
    }

    #[test]
    fn test_slice_type_mapping() {
        for (slice_type, expected) in [
            (2, FrameType::I),
            (7, FrameType::I),
            (0, FrameType::P),
            (5, FrameType::P),
            (1, FrameType::B),
            (6, FrameType::B),
        ] {
            let info = parse_h264_header(&slice_nal(0x41, slice_type));
            assert_eq!(
                info.frame_type, expected,
                "slice_type={} 应映射为 {}",
                slice_type, expected
            );
        }
    }

    #[test]
    fn test_sps_pps_idr_access_unit() {
        let mut data = sps_nal(&TestSps::default());
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80]);
        data.extend(slice_nal(0x65, 7));

        let info = parse_h264_header(&data);
        assert_eq!(info.frame_type, FrameType::I, "首个切片决定帧类型");
        assert_eq!(info.width, Some(1920));
        assert_eq!(info.height, Some(1080));
        assert_eq!(info.ref_frames, Some(4));
    }

    #[test]
    fn test_parameter_set_only() {
        let info = parse_h264_header(&sps_nal(&TestSps::default()));
        assert_eq!(info.frame_type, FrameType::Sps);
        assert_eq!(info.width, Some(1920));

        let pps = [0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80];
        assert_eq!(parse_h264_header(&pps).frame_type, FrameType::Pps);

        let sei = [0x00, 0x00, 0x01, 0x06, 0x05, 0x01, 0xFF, 0x80];
        assert_eq!(parse_h264_header(&sei).frame_type, FrameType::Sei);
    }

    #[test]
    fn test_aud_then_slice() {
        let mut data = vec![0x00, 0x00, 0x00, 0x01, 0x09, 0xF0];
        data.extend(slice_nal(0x41, 1));
        assert_eq!(parse_h264_header(&data).frame_type, FrameType::B);
    }

    #[test]
    fn test_garbage_is_unknown() {
        assert_eq!(parse_h264_header(&[]).frame_type, FrameType::Unknown);
        assert_eq!(
            parse_h264_header(&[0x12, 0x34, 0x56, 0x78]).frame_type,
            FrameType::Unknown
        );
        // 切片头被截断
        let info = parse_h264_header(&[0x00, 0x00, 0x01, 0x41]);
        assert_eq!(info.frame_type, FrameType::Unknown);
    }
}
