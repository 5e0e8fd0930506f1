//! H.264 SPS (Sequence Parameter Set) 解析器.
//!
//! 只解析计算图像尺寸和参考帧数所需的字段:
//! - Profile / Level
//! - 色度格式及可选的量化矩阵 (仅跳过, 不保存)
//! - 帧序号与 POC 相关字段
//! - 参考帧数量
//! - 宏块尺寸与裁剪偏移
//!
//! VUI 参数位于裁剪字段之后, 不再读取.
//!
//! # 尺寸公式
//! ```text
//! width  = (pic_width_in_mbs_minus1 + 1) * 16 - (crop_left + crop_right) * 2
//! height = (2 - frame_mbs_only) * (pic_height_in_map_units_minus1 + 1) * 16
//!          - (crop_top + crop_bottom) * 2
//! ```

use vigil_core::bitreader::BitReader;
use vigil_core::{VigilError, VigilResult};

/// 参考帧数量的合理上限, 超过时不上报
pub const MAX_REPORTED_REF_FRAMES: u32 = 16;

/// 裁剪偏移的单位 (像素)
const CROP_UNIT: u32 = 2;

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// profile_idc (编码规格, 如 66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// level_idc (编码级别, 如 30=3.0, 41=4.1)
    pub level_idc: u8,
    /// SPS ID (seq_parameter_set_id)
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// 最大参考帧数 (原始值, 未做上限过滤)
    pub max_num_ref_frames: u32,
    /// 是否为帧编码 (非场编码)
    pub frame_mbs_only: bool,
    /// pic_width_in_mbs_minus1 + 1
    pub pic_width_in_mbs: u32,
    /// pic_height_in_map_units_minus1 + 1
    pub pic_height_in_map_units: u32,
    /// 裁剪偏移 (左, 右, 上, 下)
    pub crop: [u32; 4],
    /// 图像宽度 (像素, 已应用裁剪)
    pub width: u32,
    /// 图像高度 (像素, 已应用裁剪)
    pub height: u32,
}

impl Sps {
    /// 可上报的参考帧数 (超过上限视为不可信)
    pub fn ref_frames(&self) -> Option<u32> {
        (self.max_num_ref_frames <= MAX_REPORTED_REF_FRAMES).then_some(self.max_num_ref_frames)
    }
}

/// 从 SPS NAL 负载 (NAL 头之后, 可含防竞争字节) 解析
pub fn parse_sps(payload: &[u8]) -> VigilResult<Sps> {
    if payload.len() < 4 {
        return Err(VigilError::InvalidData("H.264: SPS 数据太短".into()));
    }

    let mut br = BitReader::with_emulation_prevention(payload, true);

    let profile_idc = br.read_bits(8) as u8;
    br.skip_bits(8); // constraint_set 标志位
    let level_idc = br.read_bits(8) as u8;
    let sps_id = br.read_ue();
    if sps_id > 31 {
        return Err(VigilError::InvalidData(format!(
            "H.264: sps_id 超出范围, sps_id={}",
            sps_id
        )));
    }

    let mut chroma_format_idc = 1;
    if is_high_profile(profile_idc) {
        chroma_format_idc = br.read_ue();
        if chroma_format_idc > 3 {
            return Err(VigilError::InvalidData(format!(
                "H.264: chroma_format_idc 非法, value={}",
                chroma_format_idc
            )));
        }
        if chroma_format_idc == 3 {
            br.skip_bits(1); // separate_colour_plane_flag
        }
        br.read_ue(); // bit_depth_luma_minus8
        br.read_ue(); // bit_depth_chroma_minus8
        br.skip_bits(1); // qpprime_y_zero_transform_bypass_flag

        if br.read_flag() {
            skip_seq_scaling_lists(&mut br, chroma_format_idc);
        }
    }

    let log2_max_frame_num_minus4 = br.read_ue();
    if log2_max_frame_num_minus4 > 12 {
        return Err(VigilError::InvalidData(format!(
            "H.264: log2_max_frame_num_minus4 超出范围, value={}",
            log2_max_frame_num_minus4
        )));
    }

    let poc_type = br.read_ue();
    match poc_type {
        0 => {
            br.read_ue(); // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            br.skip_bits(1); // delta_pic_order_always_zero_flag
            br.read_se(); // offset_for_non_ref_pic
            br.read_se(); // offset_for_top_to_bottom_field
            let num_ref_in_poc = br.read_ue();
            if num_ref_in_poc > 255 {
                return Err(VigilError::InvalidData(format!(
                    "H.264: num_ref_frames_in_pic_order_cnt_cycle 超出范围, value={}",
                    num_ref_in_poc
                )));
            }
            for _ in 0..num_ref_in_poc {
                br.read_se();
            }
        }
        2 => {}
        _ => {
            return Err(VigilError::InvalidData(format!(
                "H.264: pic_order_cnt_type 非法, value={}",
                poc_type
            )));
        }
    }

    let max_num_ref_frames = br.read_ue();
    br.skip_bits(1); // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = br.read_ue().saturating_add(1);
    let pic_height_in_map_units = br.read_ue().saturating_add(1);

    let frame_mbs_only = br.read_flag();
    if !frame_mbs_only {
        br.skip_bits(1); // mb_adaptive_frame_field_flag
    }
    br.skip_bits(1); // direct_8x8_inference_flag

    let mut crop = [0u32; 4];
    if br.read_flag() {
        for c in crop.iter_mut() {
            *c = br.read_ue();
        }
    }

    br.check("H.264 SPS")?;

    let [crop_left, crop_right, crop_top, crop_bottom] = crop;
    let raw_width = pic_width_in_mbs
        .checked_mul(16)
        .ok_or_else(|| VigilError::InvalidData("H.264: 计算宽度时发生溢出".into()))?;
    let raw_height = pic_height_in_map_units
        .checked_mul(if frame_mbs_only { 16 } else { 32 })
        .ok_or_else(|| VigilError::InvalidData("H.264: 计算高度时发生溢出".into()))?;
    let crop_x = crop_left
        .checked_add(crop_right)
        .and_then(|v| v.checked_mul(CROP_UNIT))
        .ok_or_else(|| VigilError::InvalidData("H.264: 计算水平裁剪时发生溢出".into()))?;
    let crop_y = crop_top
        .checked_add(crop_bottom)
        .and_then(|v| v.checked_mul(CROP_UNIT))
        .ok_or_else(|| VigilError::InvalidData("H.264: 计算垂直裁剪时发生溢出".into()))?;
    if crop_x >= raw_width || crop_y >= raw_height {
        return Err(VigilError::InvalidData(format!(
            "H.264: 裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
            raw_width, raw_height, crop_x, crop_y
        )));
    }

    Ok(Sps {
        profile_idc,
        level_idc,
        sps_id,
        chroma_format_idc,
        max_num_ref_frames,
        frame_mbs_only,
        pic_width_in_mbs,
        pic_height_in_map_units,
        crop,
        width: raw_width - crop_x,
        height: raw_height - crop_y,
    })
}

// ============================================================
// 辅助函数
// ============================================================

/// 是否为 High Profile 或更高 (带 chroma_format_idc 等扩展字段)
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134
    )
}

/// 跳过 seq_scaling_list 表
fn skip_seq_scaling_lists(br: &mut BitReader, chroma_format_idc: u32) {
    let list_count = if chroma_format_idc != 3 { 8 } else { 12 };
    for list_idx in 0..list_count {
        if !br.read_flag() {
            continue;
        }
        let size = if list_idx < 6 { 16 } else { 64 };
        skip_scaling_list(br, size);
    }
}

fn skip_scaling_list(br: &mut BitReader, size: usize) {
    let mut last_scale = 8i64;
    let mut next_scale = 8i64;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = i64::from(br.read_se());
            next_scale = (last_scale + delta_scale + 256).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
        if br.is_eos() {
            return;
        }
    }
}
