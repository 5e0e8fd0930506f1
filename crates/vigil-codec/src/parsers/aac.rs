//! AAC 配置解析与 ADTS 帧头合成.
//!
//! 摄像机在会话描述 (SDP 的 `config=` 参数) 或分段头中以十六进制字符串携带
//! AudioSpecificConfig. 解析出音频对象类型, 采样率索引和声道配置后,
//! 可合成固定 7 字节的 ADTS 帧头, 拼接在每个原始 AAC 访问单元之前.
//!
//! # AudioSpecificConfig (前 2 字节)
//! ```text
//! audioObjectType(5) | samplingFrequencyIndex(4) | channelConfiguration(4) | ...
//! ```

use vigil_core::bitreader::BitReader;
use vigil_core::{BitWriter, VigilError, VigilResult};

/// ADTS 帧头长度 (protection_absent=1, 无 CRC)
pub const ADTS_HEADER_LEN: usize = 7;

/// ADTS frame_length 字段上限 (13 位)
const MAX_ADTS_FRAME_LEN: usize = (1 << 13) - 1;

/// 采样率索引表 (ISO/IEC 14496-3 表 1.18)
pub const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// 显式采样率的转义索引
const EXPLICIT_FREQUENCY_INDEX: u32 = 0x0F;
/// 扩展对象类型的转义值
const ESCAPE_OBJECT_TYPE: u32 = 31;

/// AudioSpecificConfig 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacConfig {
    /// 音频对象类型 (2 = AAC LC)
    pub object_type: u32,
    /// 采样率索引, 显式采样率时为 0x0F
    pub sampling_index: u32,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道配置
    pub channel_config: u32,
    /// 原始配置字节
    pub raw: Vec<u8>,
}

impl AacConfig {
    /// 合成描述 `payload_len` 字节负载的 ADTS 帧头
    pub fn adts_header(&self, payload_len: usize) -> VigilResult<[u8; ADTS_HEADER_LEN]> {
        let frame_len = payload_len + ADTS_HEADER_LEN;
        if frame_len > MAX_ADTS_FRAME_LEN {
            return Err(VigilError::InvalidArgument(format!(
                "AAC: 帧长度 {} 超出 ADTS 上限 {}",
                frame_len, MAX_ADTS_FRAME_LEN
            )));
        }
        let sampling_index = self.adts_sampling_index().ok_or_else(|| {
            VigilError::Unsupported(format!("AAC: ADTS 无法表示采样率 {}", self.sample_rate))
        })?;
        // ADTS 的 profile 只有 2 位, 扩展对象类型按 LC 标注
        let profile = match self.object_type {
            1..=4 => self.object_type - 1,
            _ => 1,
        };

        let mut bw = BitWriter::new();
        bw.write_bits(0xFFF, 12); // syncword
        bw.write_bits(0, 1); // ID: MPEG-4
        bw.write_bits(0, 2); // layer
        bw.write_bits(1, 1); // protection_absent
        bw.write_bits(profile, 2);
        bw.write_bits(sampling_index, 4);
        bw.write_bits(0, 1); // private_bit
        bw.write_bits(self.channel_config & 0x07, 3);
        bw.write_bits(0, 4); // original/copy, home, copyright_id_bit, copyright_id_start
        bw.write_bits(frame_len as u32, 13);
        bw.write_bits(0x7FF, 11); // buffer_fullness: VBR
        bw.write_bits(0, 2); // number_of_raw_data_blocks_in_frame - 1

        let bytes = bw.finish();
        let mut header = [0u8; ADTS_HEADER_LEN];
        header.copy_from_slice(&bytes);
        Ok(header)
    }

    /// ADTS 可用的采样率索引 (显式采样率时反查表)
    fn adts_sampling_index(&self) -> Option<u32> {
        if (self.sampling_index as usize) < AAC_SAMPLE_RATES.len() {
            return Some(self.sampling_index);
        }
        AAC_SAMPLE_RATES
            .iter()
            .position(|&r| r == self.sample_rate)
            .map(|i| i as u32)
    }
}

/// 把十六进制配置串解码为字节, 长度受 `max_len` 限制
pub fn decode_config_hex(hex_str: &str, max_len: usize) -> VigilResult<Vec<u8>> {
    let hex_str = hex_str.trim();
    if hex_str.len() / 2 > max_len {
        return Err(VigilError::InvalidArgument(format!(
            "AAC: 配置串过长, {} 字节, 上限 {}",
            hex_str.len() / 2,
            max_len
        )));
    }
    hex::decode(hex_str)
        .map_err(|e| VigilError::InvalidData(format!("AAC: 配置串不是合法的十六进制: {}", e)))
}

/// 解析 AudioSpecificConfig
pub fn parse_audio_specific_config(data: &[u8]) -> VigilResult<AacConfig> {
    if data.len() < 2 {
        return Err(VigilError::InvalidData(format!(
            "AAC: AudioSpecificConfig 太短, len={}",
            data.len()
        )));
    }

    let mut br = BitReader::new(data);
    let mut object_type = br.read_bits(5);
    if object_type == ESCAPE_OBJECT_TYPE {
        object_type = 32 + br.read_bits(6);
    }

    let sampling_index = br.read_bits(4);
    let sample_rate = if sampling_index == EXPLICIT_FREQUENCY_INDEX {
        br.read_bits(24)
    } else {
        AAC_SAMPLE_RATES
            .get(sampling_index as usize)
            .copied()
            .unwrap_or(0)
    };
    let channel_config = br.read_bits(4);
    br.check("AAC AudioSpecificConfig")?;

    if object_type == 0 {
        return Err(VigilError::InvalidData("AAC: audioObjectType 为 0".into()));
    }
    if sample_rate == 0 {
        return Err(VigilError::InvalidData(format!(
            "AAC: 不支持的采样率索引, index={}",
            sampling_index
        )));
    }

    Ok(AacConfig {
        object_type,
        sampling_index,
        sample_rate,
        channel_config,
        raw: data.to_vec(),
    })
}

/// 从十六进制配置串直接解析
pub fn parse_config_hex(hex_str: &str, max_len: usize) -> VigilResult<AacConfig> {
    let raw = decode_config_hex(hex_str, max_len)?;
    parse_audio_specific_config(&raw)
}
