//! MPEG-4 Part 2 (Visual) 编码头解析器.
//!
//! 起始码格式: `00 00 01 xx`, 其中 xx 标识起始码类型.
//! - VOL (0x20-0x2F): 读取宽高比, VBV 参数, 形状, 时间分辨率, 矩形形状时的宽高
//! - VOP (0xB6): 读取 2 位 vop_coding_type

use log::debug;
use vigil_core::bitreader::BitReader;
use vigil_core::{VigilError, VigilResult};

use crate::frame::{FrameInfo, FrameType};

/// 矩形形状 (video_object_layer_shape)
const SHAPE_RECTANGULAR: u32 = 0;
/// 灰度形状
const SHAPE_GRAYSCALE: u32 = 3;
/// 扩展像素宽高比
const ASPECT_RATIO_EXTENDED_PAR: u32 = 0xF;

/// MPEG-4 Part 2 起始码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mpeg4StartCodeType {
    /// 视频对象 (Video Object, 0x00-0x1F)
    VideoObject(u8),
    /// 视频对象层 (Video Object Layer, 0x20-0x2F)
    VideoObjectLayer(u8),
    /// 视觉对象序列起始 (0xB0)
    VisualObjectSequenceStart,
    /// 用户数据 (0xB2)
    UserData,
    /// 组头 (Group of VOP, 0xB3)
    GroupOfVop,
    /// 视觉对象 (0xB5)
    VisualObject,
    /// VOP 起始码 (0xB6)
    Vop,
    /// 其他起始码
    Other(u8),
}

impl Mpeg4StartCodeType {
    /// 从起始码字节识别类型
    pub fn from_byte(code: u8) -> Self {
        match code {
            0x00..=0x1F => Self::VideoObject(code),
            0x20..=0x2F => Self::VideoObjectLayer(code - 0x20),
            0xB0 => Self::VisualObjectSequenceStart,
            0xB2 => Self::UserData,
            0xB3 => Self::GroupOfVop,
            0xB5 => Self::VisualObject,
            0xB6 => Self::Vop,
            other => Self::Other(other),
        }
    }
}

/// 起始码条目: 位置和类型
#[derive(Debug, Clone, Copy)]
pub struct StartCodeEntry {
    /// 起始码 `00 00 01 xx` 的开始偏移
    pub offset: usize,
    /// 起始码之后的数据偏移 (offset + 4)
    pub data_offset: usize,
    /// 起始码类型
    pub code_type: Mpeg4StartCodeType,
}

/// 扫描数据中所有 MPEG-4 起始码, 按偏移排序
pub fn scan_start_codes(data: &[u8]) -> Vec<StartCodeEntry> {
    let mut entries = Vec::new();
    let mut i = 0;
    while i + 3 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x01 {
            entries.push(StartCodeEntry {
                offset: i,
                data_offset: i + 4,
                code_type: Mpeg4StartCodeType::from_byte(data[i + 3]),
            });
            i += 4;
        } else {
            i += 1;
        }
    }
    entries
}

/// VOL 头中与分辨率相关的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolHeader {
    /// 宽高比信息 (aspect_ratio_info)
    pub aspect_ratio_info: u32,
    /// 形状 (0=矩形, 1=二值, 2=仅二值, 3=灰度)
    pub shape: u32,
    /// 时间分辨率 (vop_time_increment_resolution)
    pub time_increment_resolution: u32,
    /// 宽度 (仅矩形形状)
    pub width: Option<u32>,
    /// 高度 (仅矩形形状)
    pub height: Option<u32>,
}

/// 解析 VOL 头 (起始码之后的数据)
pub fn parse_vol_header(data: &[u8]) -> VigilResult<VolHeader> {
    let mut br = BitReader::new(data);

    br.skip_bits(1); // random_accessible_vol
    br.skip_bits(8); // video_object_type_indication
    let mut verid = 1;
    if br.read_flag() {
        // is_object_layer_identifier
        verid = br.read_bits(4);
        br.skip_bits(3); // video_object_layer_priority
    }

    let aspect_ratio_info = br.read_bits(4);
    if aspect_ratio_info == ASPECT_RATIO_EXTENDED_PAR {
        br.skip_bits(8); // par_width
        br.skip_bits(8); // par_height
    }

    if br.read_flag() {
        // vol_control_parameters
        br.skip_bits(2); // chroma_format
        br.skip_bits(1); // low_delay
        if br.read_flag() {
            // vbv_parameters
            br.skip_bits(15 + 1); // first_half_bit_rate + marker
            br.skip_bits(15 + 1); // latter_half_bit_rate + marker
            br.skip_bits(15 + 1); // first_half_vbv_buffer_size + marker
            br.skip_bits(3); // latter_half_vbv_buffer_size
            br.skip_bits(11 + 1); // first_half_vbv_occupancy + marker
            br.skip_bits(15 + 1); // latter_half_vbv_occupancy + marker
        }
    }

    let shape = br.read_bits(2);
    if shape == SHAPE_GRAYSCALE && verid != 1 {
        br.skip_bits(4); // video_object_layer_shape_extension
    }

    br.skip_bits(1); // marker
    let time_increment_resolution = br.read_bits(16);
    br.skip_bits(1); // marker
    if br.read_flag() {
        // fixed_vop_rate
        br.skip_bits(time_increment_bits(time_increment_resolution));
    }

    let (mut width, mut height) = (None, None);
    if shape == SHAPE_RECTANGULAR {
        br.skip_bits(1); // marker
        let w = br.read_bits(13);
        br.skip_bits(1); // marker
        let h = br.read_bits(13);
        br.skip_bits(1); // marker
        width = Some(w);
        height = Some(h);
    }

    br.check("MPEG-4 VOL")?;

    if time_increment_resolution == 0 {
        return Err(VigilError::InvalidData(
            "MPEG-4: vop_time_increment_resolution 为 0".into(),
        ));
    }
    if width == Some(0) || height == Some(0) {
        return Err(VigilError::InvalidData("MPEG-4: VOL 尺寸为 0".into()));
    }

    Ok(VolHeader {
        aspect_ratio_info,
        shape,
        time_increment_resolution,
        width,
        height,
    })
}

/// 表示 `0..resolution` 所需的位数 (至少 1 位)
fn time_increment_bits(resolution: u32) -> u32 {
    (32 - resolution.saturating_sub(1).leading_zeros()).max(1)
}

/// 由 VOP 头 (起始码之后的数据) 判定帧类型
///
/// vop_coding_type: 0=I, 1=P, 2=B, 3=S (按 P 处理)
pub fn parse_vop_type(data: &[u8]) -> Option<FrameType> {
    let mut br = BitReader::new(data);
    let coding_type = br.read_bits(2);
    br.check("MPEG-4 VOP").ok()?;
    Some(match coding_type {
        0 => FrameType::I,
        2 => FrameType::B,
        _ => FrameType::P,
    })
}

/// 解析一段 MPEG-4 Visual 数据的帧头
///
/// VOL 更新分辨率, 第一个 VOP 决定帧类型. 只有配置头时帧类型为 Unknown.
pub fn parse_mpeg4_header(data: &[u8]) -> FrameInfo {
    let mut info = FrameInfo::default();

    for entry in scan_start_codes(data) {
        let body = &data[entry.data_offset..];
        match entry.code_type {
            Mpeg4StartCodeType::VideoObjectLayer(_) => match parse_vol_header(body) {
                Ok(vol) => {
                    info.width = vol.width;
                    info.height = vol.height;
                }
                Err(e) => debug!("MPEG-4: VOL 解析失败: {}", e),
            },
            Mpeg4StartCodeType::Vop => {
                if let Some(frame_type) = parse_vop_type(body) {
                    info.frame_type = frame_type;
                }
                return info;
            }
            _ => {}
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::BitWriter;

    /// 构造 VOL 起始码 + 头部
    fn build_vol(width: u32, height: u32, shape: u32, vbv: bool, fixed_rate: bool) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_flag(false); // random_accessible_vol
        bw.write_bits(1, 8); // simple object
        bw.write_flag(true); // is_object_layer_identifier
        bw.write_bits(2, 4); // verid
        bw.write_bits(1, 3); // priority
        bw.write_bits(ASPECT_RATIO_EXTENDED_PAR, 4);
        bw.write_bits(4, 8);
        bw.write_bits(3, 8);
        bw.write_flag(true); // vol_control_parameters
        bw.write_bits(1, 2); // chroma 4:2:0
        bw.write_flag(true); // low_delay
        bw.write_flag(vbv);
        if vbv {
            for bits in [15, 1, 15, 1, 15, 1, 3, 11, 1, 15, 1] {
                bw.write_bits((1 << bits) - 1, bits);
            }
        }
        bw.write_bits(shape, 2);
        if shape == SHAPE_GRAYSCALE {
            bw.write_bits(0, 4);
        }
        bw.write_flag(true); // marker
        bw.write_bits(30000, 16);
        bw.write_flag(true); // marker
        bw.write_flag(fixed_rate);
        if fixed_rate {
            bw.write_bits(1001, 15);
        }
        if shape == SHAPE_RECTANGULAR {
            bw.write_flag(true);
            bw.write_bits(width, 13);
            bw.write_flag(true);
            bw.write_bits(height, 13);
            bw.write_flag(true);
        }
        bw.write_flag(false); // interlaced
        bw.write_flag(true); // obmc_disable

        let mut out = vec![0x00, 0x00, 0x01, 0x20];
        out.extend(bw.finish());
        out
    }

    fn build_vop(coding_type: u8) -> Vec<u8> {
        vec![0x00, 0x00, 0x01, 0xB6, coding_type << 6 | 0x10, 0x55, 0xAA]
    }

    #[test]
    fn test_start_code_type_from_byte() {
        assert_eq!(
            Mpeg4StartCodeType::from_byte(0x05),
            Mpeg4StartCodeType::VideoObject(5)
        );
        assert_eq!(
            Mpeg4StartCodeType::from_byte(0x21),
            Mpeg4StartCodeType::VideoObjectLayer(1)
        );
        assert_eq!(Mpeg4StartCodeType::from_byte(0xB6), Mpeg4StartCodeType::Vop);
        assert_eq!(Mpeg4StartCodeType::from_byte(0xC5), Mpeg4StartCodeType::Other(0xC5));
    }

    #[test]
    fn test_scan_start_codes() {
        let data = [0x00, 0x00, 0x01, 0xB0, 0x01, 0x00, 0x00, 0x01, 0xB6, 0x10];
        let entries = scan_start_codes(&data);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code_type, Mpeg4StartCodeType::VisualObjectSequenceStart);
        assert_eq!(entries[1].offset, 5);
        assert_eq!(entries[1].data_offset, 9);
        assert!(scan_start_codes(&[0x00, 0x00, 0x01]).is_empty());
    }

    #[test]
    fn test_vol_rectangular_resolution() {
        for (vbv, fixed_rate) in [(false, false), (true, false), (false, true), (true, true)] {
            let vol = build_vol(704, 576, SHAPE_RECTANGULAR, vbv, fixed_rate);
            let header = parse_vol_header(&vol[4..]).unwrap();
            assert_eq!(header.time_increment_resolution, 30000);
            assert_eq!(
                (header.width, header.height),
                (Some(704), Some(576)),
                "vbv={} fixed_rate={} 时应解析出分辨率",
                vbv,
                fixed_rate
            );
        }
    }

    #[test]
    fn test_vol_non_rectangular_has_no_size() {
        let vol = build_vol(0, 0, SHAPE_GRAYSCALE, false, false);
        let header = parse_vol_header(&vol[4..]).unwrap();
        assert_eq!(header.shape, SHAPE_GRAYSCALE);
        assert_eq!(header.width, None);
    }

    #[test]
    fn test_vol_truncated() {
        let vol = build_vol(704, 576, SHAPE_RECTANGULAR, true, false);
        assert!(parse_vol_header(&vol[4..10]).is_err());
    }

    #[test]
    fn test_vop_coding_type() {
        assert_eq!(parse_mpeg4_header(&build_vop(0)).frame_type, FrameType::I);
        assert_eq!(parse_mpeg4_header(&build_vop(1)).frame_type, FrameType::P);
        assert_eq!(parse_mpeg4_header(&build_vop(2)).frame_type, FrameType::B);
        assert_eq!(parse_mpeg4_header(&build_vop(3)).frame_type, FrameType::P);
    }

    #[test]
    fn test_config_headers_then_vop() {
        let mut data = vec![0x00, 0x00, 0x01, 0xB0, 0x01, 0x00, 0x00, 0x01, 0x00];
        data.extend(build_vol(1280, 720, SHAPE_RECTANGULAR, false, true));
        data.extend(build_vop(0));

        let info = parse_mpeg4_header(&data);
        assert_eq!(info.frame_type, FrameType::I);
        assert_eq!(info.width, Some(1280));
        assert_eq!(info.height, Some(720));

        let vol_only = parse_mpeg4_header(&build_vol(1280, 720, SHAPE_RECTANGULAR, false, false));
        assert_eq!(vol_only.frame_type, FrameType::Unknown);
        assert_eq!(vol_only.width, Some(1280));
    }
}
