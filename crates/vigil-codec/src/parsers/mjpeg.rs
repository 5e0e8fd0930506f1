//! Motion JPEG 编码头解析器.
//!
//! 每个 JPEG 图像都是关键帧. 找到 SOI (FFD8) 后逐个跳过标记段,
//! 直到 SOF0 (FFC0), 从中读取大端的高度与宽度.

use byteorder::{BigEndian, ByteOrder};

use crate::frame::{FrameInfo, FrameType};

/// 标记前缀
pub const MARKER_PREFIX: u8 = 0xFF;
/// 图像开始 (Start Of Image)
pub const SOI: u8 = 0xD8;
/// 图像结束 (End Of Image)
pub const EOI: u8 = 0xD9;
/// 基线 DCT 帧头 (Start Of Frame 0)
const SOF0: u8 = 0xC0;
/// 扫描开始, 其后为熵编码数据
const SOS: u8 = 0xDA;

/// SOF0 中宽高的解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegFrameHeader {
    /// 采样精度
    pub precision: u8,
    /// 图像高度
    pub height: u16,
    /// 图像宽度
    pub width: u16,
}

/// 查找 SOI 标记位置
pub fn find_soi(data: &[u8]) -> Option<usize> {
    data.windows(2)
        .position(|w| w[0] == MARKER_PREFIX && w[1] == SOI)
}

/// 独立标记 (无长度字段)
fn is_standalone(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD8)
}

/// 从 SOI 之后逐段扫描, 返回 SOF0 头部
pub fn find_frame_header(data: &[u8]) -> Option<JpegFrameHeader> {
    let mut pos = find_soi(data)? + 2;

    loop {
        if *data.get(pos)? != MARKER_PREFIX {
            return None;
        }
        // 标记前允许任意个 0xFF 填充
        while *data.get(pos + 1)? == MARKER_PREFIX {
            pos += 1;
        }
        let marker = data[pos + 1];
        pos += 2;

        if is_standalone(marker) {
            continue;
        }
        if marker == EOI || marker == SOS {
            return None;
        }

        let seg = data.get(pos..pos + 2)?;
        let seg_len = usize::from(BigEndian::read_u16(seg));
        if seg_len < 2 {
            return None;
        }

        if marker == SOF0 {
            let sof = data.get(pos + 2..pos + 7)?;
            return Some(JpegFrameHeader {
                precision: sof[0],
                height: BigEndian::read_u16(&sof[1..3]),
                width: BigEndian::read_u16(&sof[3..5]),
            });
        }
        pos += seg_len;
    }
}

/// 解析一帧 MJPEG 数据的帧头
///
/// 含 SOI 即为 I 帧, 找到 SOF0 时附带分辨率. 没有 SOI 时为 Unknown.
pub fn parse_mjpeg_header(data: &[u8]) -> FrameInfo {
    if find_soi(data).is_none() {
        return FrameInfo::default();
    }
    let info = FrameInfo::of_type(FrameType::I);
    match find_frame_header(data) {
        Some(sof) => info.with_resolution(u32::from(sof.width), u32::from(sof.height)),
        None => info,
    }
}
