//! H.264 NAL (Network Abstraction Layer) 单元解析.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────┘
//! ```

use vigil_core::{VigilError, VigilResult};

use crate::parsers::annexb;

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 未知类型
    Unknown(u8),
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            _ => Self::Unknown(type_id),
        }
    }

    /// 是否携带切片头 (slice_header 以 first_mb_in_slice 开始)
    ///
    /// 数据分区 B/C 只有 slice_id, 不参与帧类型判定.
    pub fn has_slice_header(&self) -> bool {
        matches!(self, Self::Slice | Self::SliceDpa | Self::SliceIdr)
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SliceDpa | Self::SliceDpb | Self::SliceDpc | Self::SliceIdr
        )
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 借用输入缓冲区的 NAL 单元
#[derive(Debug, Clone, Copy)]
pub struct NalUnit<'a> {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// nal_ref_idc (参考重要性, 0-3)
    pub ref_idc: u8,
    /// NAL 数据 (不含起始码, 含 NAL 头部字节)
    pub data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// 从 NAL 数据 (含头部字节) 解析
    pub fn parse(data: &'a [u8]) -> VigilResult<Self> {
        let Some(&header) = data.first() else {
            return Err(VigilError::InvalidData("H.264: NAL 单元数据为空".into()));
        };

        let forbidden = (header >> 7) & 1;
        if forbidden != 0 {
            return Err(VigilError::InvalidData(format!(
                "H.264: forbidden_zero_bit 非法, value={}",
                forbidden
            )));
        }

        Ok(Self {
            nal_type: NalUnitType::from_type_id(header & 0x1F),
            ref_idc: (header >> 5) & 0x03,
            data,
        })
    }

    /// NAL 头之后的负载 (仍含防竞争字节)
    pub fn payload(&self) -> &'a [u8] {
        &self.data[1..]
    }
}

/// 从 Annex B 字节流中分割出所有 NAL 单元
///
/// 头部非法的单元被跳过.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit<'_>> {
    annexb::split_nal_units(data)
        .into_iter()
        .filter_map(|nal| NalUnit::parse(nal).ok())
        .collect()
}
