//! 比特流写入器.
//!
//! 按大端位序 (MSB first) 向字节缓冲区写入数据, 与 [`BitReader`](crate::BitReader) 对应.
//! 用于合成 AAC 帧头, 以及在测试中构造 SPS/VOL 等比特级码流.

/// 比特流写入器
///
/// # 示例
/// ```
/// use vigil_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_ue(0); // "1"
/// bw.write_bits(0b000, 3);
/// assert_eq!(bw.finish(), vec![0b10111000]);
/// ```
#[derive(Debug, Default)]
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        self.current_byte = (self.current_byte << 1) | (bit & 1) as u8;
        self.bit_count += 1;
        if self.bit_count >= 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入 1 位标志
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bit(u32::from(flag));
    }

    /// 写入 N 个位 (最多 32 位), 值的低 N 位被写入, 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1);
        }
    }

    /// 写入无符号 Exp-Golomb 编码值 ue(v)
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let num_bits = 64 - code.leading_zeros();
        for _ in 0..num_bits - 1 {
            self.write_bit(0);
        }
        for i in (0..num_bits).rev() {
            self.write_bit(((code >> i) & 1) as u32);
        }
    }

    /// 写入有符号 Exp-Golomb 编码值 se(v)
    pub fn write_se(&mut self, value: i32) {
        let code = if value <= 0 {
            (-2 * i64::from(value)) as u32
        } else {
            (2 * i64::from(value) - 1) as u32
        };
        self.write_ue(code);
    }

    /// 对齐到字节边界 (用 0 填充)
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            self.current_byte <<= pad;
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 完成写入, 返回字节数据
    ///
    /// 如果当前不在字节边界, 自动用 0 填充.
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitReader;

    #[test]
    fn test_write_bits_basic() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b1011, 4);
        bw.write_bits(0b0001, 4);
        bw.write_bits(0xABCD, 16);
        assert_eq!(bw.bits_written(), 24);
        assert_eq!(bw.finish(), vec![0b10110001, 0xAB, 0xCD]);
    }

    #[test]
    fn test_write_exp_golomb_read_back() {
        let values = [0u32, 1, 2, 3, 7, 254, 65535];
        let signed = [0i32, 1, -1, 2, -2, 100, -100];

        let mut bw = BitWriter::new();
        for &v in &values {
            bw.write_ue(v);
        }
        for &v in &signed {
            bw.write_se(v);
        }
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        for &v in &values {
            assert_eq!(br.read_ue(), v);
        }
        for &v in &signed {
            assert_eq!(br.read_se(), v);
        }
        assert!(br.check("exp-golomb").is_ok());
    }

    #[test]
    fn test_align_pads_with_zero() {
        let mut bw = BitWriter::new();
        bw.write_flag(true);
        bw.align_to_byte();
        bw.write_bits(0xFF, 8);
        assert_eq!(bw.finish(), vec![0x80, 0xFF]);
    }
}
