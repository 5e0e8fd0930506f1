//! H.265/HEVC SPS 解析器.
//!
//! 只读到 conformance window 为止: profile_tier_level, sps_id, 色度格式,
//! 图像宽高与裁剪窗口. 之后的字段与分辨率无关.

use vigil_core::bitreader::BitReader;
use vigil_core::{VigilError, VigilResult};

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcSps {
    /// SPS 所引用的 VPS ID
    pub vps_id: u8,
    /// 最大子层数
    pub max_sub_layers: u8,
    /// general_profile_idc
    pub general_profile_idc: u8,
    /// general_tier_flag
    pub general_tier_flag: bool,
    /// general_level_idc
    pub general_level_idc: u8,
    /// SPS ID
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// 原始宽度 (像素, 未裁剪)
    pub pic_width: u32,
    /// 原始高度 (像素, 未裁剪)
    pub pic_height: u32,
    /// conformance window 裁剪 (左, 右, 上, 下), 单位为色度采样
    pub conf_win: [u32; 4],
    /// 图像宽度 (像素, 已应用 conformance window)
    pub width: u32,
    /// 图像高度 (像素, 已应用 conformance window)
    pub height: u32,
}

/// 解析 profile_tier_level, 返回 (profile_idc, tier_flag, level_idc)
///
/// 子层部分只按存在标志跳过对应的定长字段.
fn parse_profile_tier_level(br: &mut BitReader, max_sub_layers: u8) -> (u8, bool, u8) {
    br.skip_bits(2); // general_profile_space
    let tier_flag = br.read_flag();
    let profile_idc = br.read_bits(5) as u8;

    br.skip_bits(32); // general_profile_compatibility_flags
    br.skip_bits(4); // progressive/interlaced/non_packed/frame_only
    br.skip_bits(44); // 约束标志

    let level_idc = br.read_bits(8) as u8;

    if max_sub_layers > 1 {
        let sub_layers = usize::from(max_sub_layers - 1);
        let mut profile_present = [false; 8];
        let mut level_present = [false; 8];
        for i in 0..sub_layers {
            profile_present[i] = br.read_flag();
            level_present[i] = br.read_flag();
        }
        for _ in sub_layers..8 {
            br.skip_bits(2); // reserved_zero_2bits
        }
        for i in 0..sub_layers {
            if profile_present[i] {
                br.skip_bits(88);
            }
            if level_present[i] {
                br.skip_bits(8);
            }
        }
    }

    (profile_idc, tier_flag, level_idc)
}

/// 解析 HEVC SPS 负载 (NAL 头之后, 可含防竞争字节)
pub fn parse_hevc_sps(payload: &[u8]) -> VigilResult<HevcSps> {
    if payload.len() < 3 {
        return Err(VigilError::InvalidData("HEVC: SPS 数据太短".into()));
    }

    let mut br = BitReader::with_emulation_prevention(payload, true);

    let vps_id = br.read_bits(4) as u8;
    let max_sub_layers = br.read_bits(3) as u8 + 1;
    br.skip_bits(1); // sps_temporal_id_nesting_flag

    let (general_profile_idc, general_tier_flag, general_level_idc) =
        parse_profile_tier_level(&mut br, max_sub_layers);

    let sps_id = br.read_ue();
    if sps_id > 15 {
        return Err(VigilError::InvalidData(format!(
            "HEVC: sps_id 超出范围, sps_id={}",
            sps_id
        )));
    }
    let chroma_format_idc = br.read_ue();
    if chroma_format_idc > 3 {
        return Err(VigilError::InvalidData(format!(
            "HEVC: chroma_format_idc 非法, value={}",
            chroma_format_idc
        )));
    }
    let mut separate_colour_plane = false;
    if chroma_format_idc == 3 {
        separate_colour_plane = br.read_flag();
    }

    let pic_width = br.read_ue();
    let pic_height = br.read_ue();

    let mut conf_win = [0u32; 4];
    if br.read_flag() {
        for c in conf_win.iter_mut() {
            *c = br.read_ue();
        }
    }

    br.check("HEVC SPS")?;

    if pic_width == 0 || pic_height == 0 {
        return Err(VigilError::InvalidData(format!(
            "HEVC: 图像尺寸非法, {}x{}",
            pic_width, pic_height
        )));
    }

    let chroma_array_type = if separate_colour_plane {
        0
    } else {
        chroma_format_idc
    };
    let sub_width_c: u32 = if chroma_array_type == 1 || chroma_array_type == 2 {
        2
    } else {
        1
    };
    let sub_height_c: u32 = if chroma_array_type == 1 { 2 } else { 1 };

    let [left, right, top, bottom] = conf_win;
    let crop_x = left
        .checked_add(right)
        .and_then(|v| v.checked_mul(sub_width_c))
        .ok_or_else(|| VigilError::InvalidData("HEVC: 计算水平裁剪时发生溢出".into()))?;
    let crop_y = top
        .checked_add(bottom)
        .and_then(|v| v.checked_mul(sub_height_c))
        .ok_or_else(|| VigilError::InvalidData("HEVC: 计算垂直裁剪时发生溢出".into()))?;
    if crop_x >= pic_width || crop_y >= pic_height {
        return Err(VigilError::InvalidData(format!(
            "HEVC: conformance window 非法, pic={}x{}, crop_x={}, crop_y={}",
            pic_width, pic_height, crop_x, crop_y
        )));
    }

    Ok(HevcSps {
        vps_id,
        max_sub_layers,
        general_profile_idc,
        general_tier_flag,
        general_level_idc,
        sps_id,
        chroma_format_idc,
        pic_width,
        pic_height,
        conf_win,
        width: pic_width - crop_x,
        height: pic_height - crop_y,
    })
}
