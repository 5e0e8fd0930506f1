//! H.265/HEVC NAL (Network Abstraction Layer) 单元解析.
//!
//! HEVC NAL 头部为 2 字节 (比 H.264 多一字节):
//! - forbidden_zero_bit (1 bit)
//! - nal_unit_type (6 bits)
//! - nuh_layer_id (6 bits)
//! - nuh_temporal_id_plus1 (3 bits)
//!
//! 帧类型判定只使用 nal_unit_type.

use vigil_core::{VigilError, VigilResult};

use crate::parsers::annexb;

/// HEVC NAL 单元类型 (按判定需要归类)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HevcNalUnitType {
    /// 非 IRAP 切片 (TRAIL/TSA/STSA/RADL/RASL, 0-9)
    Trailing(u8),
    /// IRAP 切片 (BLA/IDR/CRA, 16-21)
    Irap(u8),
    /// VPS (Video Parameter Set)
    Vps,
    /// SPS (Sequence Parameter Set)
    Sps,
    /// PPS (Picture Parameter Set)
    Pps,
    /// AUD (Access Unit Delimiter)
    Aud,
    /// PREFIX_SEI
    PrefixSei,
    /// SUFFIX_SEI
    SuffixSei,
    /// 其他类型
    Other(u8),
}

impl HevcNalUnitType {
    /// 从类型编号创建
    pub fn from_type_id(id: u8) -> Self {
        match id {
            0..=9 => Self::Trailing(id),
            16..=21 => Self::Irap(id),
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            35 => Self::Aud,
            39 => Self::PrefixSei,
            40 => Self::SuffixSei,
            _ => Self::Other(id),
        }
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Trailing(id) | Self::Irap(id) | Self::Other(id) => *id,
            Self::Vps => 32,
            Self::Sps => 33,
            Self::Pps => 34,
            Self::Aud => 35,
            Self::PrefixSei => 39,
            Self::SuffixSei => 40,
        }
    }

    /// 是否为承载切片数据的 VCL NAL
    pub fn is_slice(&self) -> bool {
        matches!(self, Self::Trailing(_) | Self::Irap(_))
    }

    /// 是否为参数集 (VPS/SPS/PPS)
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Vps | Self::Sps | Self::Pps)
    }
}

/// 借用输入缓冲区的 HEVC NAL 单元
#[derive(Debug, Clone, Copy)]
pub struct HevcNalUnit<'a> {
    /// NAL 类型
    pub nal_type: HevcNalUnitType,
    /// nuh_layer_id
    pub layer_id: u8,
    /// nuh_temporal_id_plus1
    pub temporal_id_plus1: u8,
    /// NAL 负载 (不含 2 字节 NAL 头, 仍含防竞争字节)
    pub payload: &'a [u8],
}

impl<'a> HevcNalUnit<'a> {
    /// 从原始 NAL 数据 (含 2 字节头) 解析
    pub fn parse(data: &'a [u8]) -> VigilResult<Self> {
        let [b0, b1, payload @ ..] = data else {
            return Err(VigilError::InvalidData("HEVC: NAL 数据太短".into()));
        };
        if b0 & 0x80 != 0 {
            return Err(VigilError::InvalidData(
                "HEVC: forbidden_zero_bit 非法".into(),
            ));
        }

        Ok(Self {
            nal_type: HevcNalUnitType::from_type_id((b0 >> 1) & 0x3F),
            layer_id: ((b0 & 1) << 5) | (b1 >> 3),
            temporal_id_plus1: b1 & 0x07,
            payload,
        })
    }
}

/// 从 Annex B 格式分割 HEVC NAL 单元
pub fn split_hevc_annex_b(data: &[u8]) -> Vec<HevcNalUnit<'_>> {
    annexb::split_nal_units(data)
        .into_iter()
        .filter_map(|nal| HevcNalUnit::parse(nal).ok())
        .collect()
}

/// 缓冲区中第一个 NAL 单元的类型
pub fn first_nal_type(data: &[u8]) -> Option<HevcNalUnitType> {
    split_hevc_annex_b(data).first().map(|n| n.nal_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hevc_nal_type() {
        assert_eq!(HevcNalUnitType::from_type_id(1), HevcNalUnitType::Trailing(1));
        assert_eq!(HevcNalUnitType::from_type_id(19), HevcNalUnitType::Irap(19));
        assert_eq!(HevcNalUnitType::from_type_id(32), HevcNalUnitType::Vps);
        assert_eq!(HevcNalUnitType::from_type_id(40), HevcNalUnitType::SuffixSei);
        assert_eq!(HevcNalUnitType::from_type_id(12), HevcNalUnitType::Other(12));
        for id in 0..64 {
            assert_eq!(HevcNalUnitType::from_type_id(id).type_id(), id);
        }
        assert!(HevcNalUnitType::Irap(21).is_slice());
        assert!(HevcNalUnitType::Pps.is_parameter_set());
        assert!(!HevcNalUnitType::PrefixSei.is_parameter_set());
    }

    #[test]
    fn test_hevc_nal_parse() {
        // VPS: type=32 → (32 << 1) = 0x40, layer_id=0, tid_plus1=1
        let data = [0x40, 0x01, 0x0C, 0x01];
        let nalu = HevcNalUnit::parse(&data).unwrap();
        assert_eq!(nalu.nal_type, HevcNalUnitType::Vps);
        assert_eq!(nalu.layer_id, 0);
        assert_eq!(nalu.temporal_id_plus1, 1);
        assert_eq!(nalu.payload, &[0x0C, 0x01]);

        assert!(HevcNalUnit::parse(&[0x40]).is_err());
        assert!(HevcNalUnit::parse(&[0xC0, 0x01]).is_err());
    }

    #[test]
    fn test_annex_b_split() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x40, 0x01, 0xAA, // VPS
            0x00, 0x00, 0x01, 0x42, 0x01, 0xBB, // SPS
            0x00, 0x00, 0x01, 0x26, 0x01, 0xAF, // IDR_W_RADL
        ];
        let nalus = split_hevc_annex_b(&data);
        assert_eq!(nalus.len(), 3);
        assert_eq!(nalus[0].nal_type, HevcNalUnitType::Vps);
        assert_eq!(nalus[1].nal_type, HevcNalUnitType::Sps);
        assert_eq!(nalus[2].nal_type, HevcNalUnitType::Irap(19));
        assert_eq!(first_nal_type(&data), Some(HevcNalUnitType::Vps));
        assert_eq!(first_nal_type(&[0x01, 0x02]), None);
    }
}
