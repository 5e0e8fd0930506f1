//! 比特流读取器.
//!
//! 提供从字节缓冲区中按位读取数据的能力, 是 H.264/H.265/MPEG-4/AAC 编码头解析的基础设施.
//!
//! 按大端位序读取 (MSB first), 这是多媒体编解码器中最常用的位序.
//!
//! 与解码器使用的读取器不同, 这里的读取是 "失败即关闭" 的: 数据耗尽后所有读取返回 0,
//! 并设置流结束标记. 解析器在读完一组字段后调用 [`BitReader::check`] 统一判断是否越界,
//! 不会在不可信输入上越界访问.

use std::borrow::Cow;

use crate::{VigilError, VigilResult};

/// Exp-Golomb 前导零上限, 超过即视为损坏码流
const MAX_EXP_GOLOMB_LEADING_ZEROS: u32 = 31;

/// 比特流读取器
///
/// 从字节缓冲区中按位读取数据, 使用大端位序 (MSB first).
///
/// # 示例
/// ```
/// use vigil_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4), 0b1011);
/// assert_eq!(br.read_bits(4), 0b0001);
/// assert_eq!(br.read_bits(8), 0b01010101);
/// assert!(!br.is_eos());
/// assert_eq!(br.read_bits(1), 0);
/// assert!(br.is_eos());
/// ```
pub struct BitReader<'a> {
    /// 源数据 (启用防竞争字节移除时为移除后的副本)
    data: Cow<'a, [u8]>,
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
    /// 是否发生过越界读取
    eos: bool,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_emulation_prevention(data, false)
    }

    /// 创建比特流读取器, `remove_epb` 为 true 时先移除 emulation prevention 字节
    ///
    /// H.264/H.265 的 Exp-Golomb 字段会跨越字节边界, 必须在去除 `00 00 03` 中的 0x03 后读取.
    pub fn with_emulation_prevention(data: &'a [u8], remove_epb: bool) -> Self {
        let data = if remove_epb {
            remove_emulation_prevention(data)
        } else {
            Cow::Borrowed(data)
        };
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
            eos: false,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 是否发生过越界读取
    pub fn is_eos(&self) -> bool {
        self.eos
    }

    /// 检查读取过程是否越界, 越界时返回 `InvalidData`
    ///
    /// `what` 用于错误信息, 例如 "H.264 SPS".
    pub fn check(&self, what: &str) -> VigilResult<()> {
        if self.eos {
            return Err(VigilError::InvalidData(format!(
                "{what}: 数据截断, 已读取 {} 位",
                self.bits_read()
            )));
        }
        Ok(())
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> u32 {
        if self.byte_pos >= self.data.len() {
            self.eos = true;
            return 0;
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        u32::from(bit)
    }

    /// 读取 1 位标志
    pub fn read_flag(&mut self) -> bool {
        self.read_bit() == 1
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效. 剩余位数不足时返回 0 并标记流结束.
    pub fn read_bits(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        if n > 32 || (n as usize) > self.bits_left() {
            self.exhaust();
            return 0;
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        result
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) {
        if (n as usize) > self.bits_left() {
            self.exhaust();
            return;
        }

        let total_bits = self.bit_pos as u32 + n;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;
    }

    /// 读取无符号 Exp-Golomb 编码值 ue(v)
    ///
    /// 统计前导零个数 `n`, 再读取 `n` 位数据, 值为 `2^n - 1 + data`.
    pub fn read_ue(&mut self) -> u32 {
        let mut leading_zeros = 0u32;
        while self.read_bit() == 0 {
            if self.eos {
                return 0;
            }
            leading_zeros += 1;
            if leading_zeros > MAX_EXP_GOLOMB_LEADING_ZEROS {
                self.exhaust();
                return 0;
            }
        }

        if leading_zeros == 0 {
            return 0;
        }

        let suffix = self.read_bits(leading_zeros);
        if self.eos {
            return 0;
        }
        ((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32
    }

    /// 读取有符号 Exp-Golomb 编码值 se(v)
    ///
    /// 映射: 0→0, 1→1, 2→-1, 3→2, 4→-2, ...
    pub fn read_se(&mut self) -> i32 {
        let code = i64::from(self.read_ue());
        if code % 2 == 1 {
            ((code + 1) / 2) as i32
        } else {
            -((code / 2) as i32)
        }
    }

    /// 对齐到下一个字节边界
    ///
    /// 如果当前已在字节边界, 则不做任何事.
    pub fn align_to_byte(&mut self) {
        if self.bit_pos > 0 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// 获取当前字节位置
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }

    /// 获取底层数据的引用 (启用移除模式时为移除后的数据)
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn exhaust(&mut self) {
        self.byte_pos = self.data.len();
        self.bit_pos = 0;
        self.eos = true;
    }
}

/// 移除 emulation prevention 字节 (0x00 0x00 0x03 → 0x00 0x00)
///
/// 纯函数, 不含任何读取状态. 数据中不存在防竞争字节时直接借用原切片.
pub fn remove_emulation_prevention(data: &[u8]) -> Cow<'_, [u8]> {
    let has_epb = data.windows(3).any(|w| w == [0x00, 0x00, 0x03]);
    if !has_epb {
        return Cow::Borrowed(data);
    }

    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let is_emulation_prevention =
            i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03;
        if is_emulation_prevention {
            rbsp.push(0x00);
            rbsp.push(0x00);
            i += 3; // 跳过 0x03
        } else {
            rbsp.push(data[i]);
            i += 1;
        }
    }

    Cow::Owned(rbsp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_basic() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        assert_eq!(br.read_bits(1), 1);
        assert_eq!(br.read_bits(1), 0);
        assert_eq!(br.read_bits(2), 0b11);
        assert_eq!(br.read_bits(4), 0b0001);
        assert_eq!(br.read_bits(8), 0b01010101);

        assert_eq!(br.bits_left(), 0);
        assert!(!br.is_eos(), "恰好读完不应标记越界");
    }

    #[test]
    fn test_read_bits_32_bit() {
        let data = [0xFF, 0x00, 0xFF, 0x00];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(32), 0xFF00FF00);
    }

    #[test]
    fn test_read_bits_fail_closed() {
        let data = [0xAB];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(4), 0xA);
        // 剩余 4 位, 读取 8 位应返回 0 并标记结束
        assert_eq!(br.read_bits(8), 0);
        assert!(br.is_eos());
        assert_eq!(br.bits_left(), 0);
        // 之后的读取全部返回 0
        assert_eq!(br.read_bit(), 0);
        assert_eq!(br.read_ue(), 0);
        assert!(br.check("测试").is_err());
    }

    #[test]
    fn test_read_bits_reject_over_32() {
        let data = [0xFF; 8];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(33), 0);
        assert!(br.is_eos());
    }

    #[test]
    fn test_skip_bits() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        br.skip_bits(4);
        assert_eq!(br.read_bits(4), 0b0001);
        br.skip_bits(4);
        assert_eq!(br.read_bits(4), 0b0101);
        br.skip_bits(1);
        assert!(br.is_eos());
    }

    #[test]
    fn test_exp_golomb_ue() {
        // 1 → 0
        let mut br = BitReader::new(&[0b10000000]);
        assert_eq!(br.read_ue(), 0);
        // 010 → 1
        let mut br = BitReader::new(&[0b01000000]);
        assert_eq!(br.read_ue(), 1);
        // 011 → 2
        let mut br = BitReader::new(&[0b01100000]);
        assert_eq!(br.read_ue(), 2);
        // 00100 → 3
        let mut br = BitReader::new(&[0b00100000]);
        assert_eq!(br.read_ue(), 3);
        // 0001000 → 7
        let mut br = BitReader::new(&[0b00010000]);
        assert_eq!(br.read_ue(), 7);
        // 跨字节: 000000011111111 → 2^7 - 1 + 127 = 254
        let mut br = BitReader::new(&[0b00000001, 0b11111110]);
        assert_eq!(br.read_ue(), 254);
        assert!(br.check("ue").is_ok());
    }

    #[test]
    fn test_exp_golomb_se() {
        let cases: [(u8, i32); 5] = [
            (0b10000000, 0),
            (0b01000000, 1),
            (0b01100000, -1),
            (0b00100000, 2),
            (0b00101000, -2),
        ];
        for (byte, expected) in cases {
            let data = [byte];
            let mut br = BitReader::new(&data);
            assert_eq!(br.read_se(), expected, "byte={byte:#010b}");
        }
    }

    #[test]
    fn test_exp_golomb_all_zero_is_eos() {
        let data = [0x00; 8];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_ue(), 0);
        assert!(br.is_eos(), "全零数据应视为损坏码流");
    }

    #[test]
    fn test_exp_golomb_truncated_suffix() {
        // 0000 0001 后无后缀位
        let data = [0b00000001];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_ue(), 0);
        assert!(br.is_eos());
    }

    #[test]
    fn test_align_to_byte() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        br.read_bits(3);
        br.align_to_byte();
        assert_eq!(br.byte_position(), 1);
        assert_eq!(br.read_bits(8), 0b01010101);
    }

    #[test]
    fn test_emulation_prevention_remove() {
        // 00 00 03 → 00 00
        let data = [0x01, 0x00, 0x00, 0x03, 0x02, 0x03];
        let rbsp = remove_emulation_prevention(&data);
        assert_eq!(rbsp.as_ref(), &[0x01, 0x00, 0x00, 0x02, 0x03]);
    }

    #[test]
    fn test_emulation_prevention_consecutive() {
        let data = [0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x01];
        let rbsp = remove_emulation_prevention(&data);
        assert_eq!(rbsp.as_ref(), &[0x00, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_emulation_prevention_borrow_when_absent() {
        let data = [0x42, 0x00, 0x00, 0x01];
        let rbsp = remove_emulation_prevention(&data);
        assert!(matches!(rbsp, Cow::Borrowed(_)), "无防竞争字节时不应复制");
    }

    #[test]
    fn test_reader_with_emulation_prevention() {
        // 原始 00 00 03 80 → 逻辑 00 00 80
        let raw = [0x00, 0x00, 0x03, 0x80, 0x00, 0x01];
        let mut plain = BitReader::new(&raw);
        let mut clean = BitReader::with_emulation_prevention(&raw, true);
        assert_eq!(clean.data(), &[0x00, 0x00, 0x80, 0x00, 0x01]);

        assert_eq!(plain.read_bits(24), 0x000003);
        assert_eq!(clean.read_bits(24), 0x000080);
    }
}
