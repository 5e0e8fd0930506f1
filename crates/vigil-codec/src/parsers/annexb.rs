//! Annex B 字节流分割.
//!
//! H.264 与 H.265 共用的起始码扫描:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`

/// 查找所有起始码的位置 (指向起始码第一个字节)
pub fn find_start_codes(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                positions.push(i);
                i += 3;
                continue;
            } else if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                positions.push(i);
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    positions
}

/// 跳过起始码, 返回 NAL 数据的起始位置
fn skip_start_code(data: &[u8], pos: usize) -> usize {
    if data[pos..].starts_with(&[0x00, 0x00, 0x00, 0x01]) {
        pos + 4
    } else if data[pos..].starts_with(&[0x00, 0x00, 0x01]) {
        pos + 3
    } else {
        pos
    }
}

/// 分割出所有 NAL 单元 (不含起始码, 含 NAL 头, 已去除尾部填充 0)
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let offsets = find_start_codes(data);
    let mut nalus = Vec::with_capacity(offsets.len());

    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(data.len());
        let nal_start = skip_start_code(data, start);
        if nal_start >= end {
            continue;
        }

        let mut nal_end = end;
        while nal_end > nal_start && data[nal_end - 1] == 0x00 {
            nal_end -= 1;
        }
        if nal_end > nal_start {
            nalus.push(&data[nal_start..nal_end]);
        }
    }

    nalus
}
