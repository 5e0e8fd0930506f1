//! 帧交付前的编码相关修正.
//!
//! - AAC: 剥离帧前定长头部, 换上由缓存配置合成的 ADTS 头
//! - 大端 PCM: 交换字节对
//! - H.265: 按图像重组切片, 滞后一幅完整图像交付

use log::debug;
use vigil_codec::parsers::aac::AacConfig;
use vigil_codec::parsers::h265::first_nal_type;
use vigil_codec::{FrameInfo, FrameType};
use vigil_core::VigilResult;

/// 去掉 `strip` 字节旧头部, 前置由配置合成的 ADTS 头
pub fn rewrap_aac(config: &AacConfig, data: &[u8], strip: usize) -> VigilResult<Vec<u8>> {
    let payload = &data[strip.min(data.len())..];
    let header = config.adts_header(payload.len())?;
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    Ok(out)
}

/// 去掉 `strip` 字节头部后交换字节对
///
/// 奇数长度时最后一个字节被丢弃.
pub fn swap_pcm_pairs(mut data: Vec<u8>, strip: usize) -> Vec<u8> {
    data.drain(..strip.min(data.len()));
    let even = data.len() & !1;
    data.truncate(even);
    for pair in data.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    data
}

/// 一幅待交付的 H.265 图像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcPicture {
    pub frame_type: FrameType,
    pub data: Vec<u8>,
}

/// [`HevcAssembler::push`] 的结果
#[derive(Debug, PartialEq, Eq)]
pub enum HevcPush {
    /// 数据已被缓存, 暂无可交付的图像
    Held,
    /// 上一幅图像已完整
    Flushed(HevcPicture),
    /// 没有可以附着的图像, 数据被丢弃
    Dropped,
}

/// H.265 图像重组器
///
/// 参数集和 SEI 单独到达时只缓存不交付. 每个图像的第一个切片到达时,
/// 上一幅图像整体交付; 参数集更新后的第一个 I 帧会被前置 VPS/SPS/PPS.
///
/// 只有一个待交付槽位, 不区分 I 帧和 P 帧: 任一时刻只有一幅图像处于未完成状态,
/// 新图像的首切片总是先交付旧图像, 所以交付顺序与分别缓存 I/P 相同, 始终落后网络一幅图像.
#[derive(Debug, Default)]
pub struct HevcAssembler {
    vps: Option<Vec<u8>>,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
    sei: Option<Vec<u8>>,
    params_dirty: bool,
    pending: Option<HevcPicture>,
}

impl HevcAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 推入一段已分类的数据
    pub fn push(&mut self, data: Vec<u8>, info: &FrameInfo) -> HevcPush {
        match info.frame_type {
            FrameType::Vps => self.cache_param(data, |a| &mut a.vps),
            FrameType::Sps => self.cache_param(data, |a| &mut a.sps),
            FrameType::Pps => self.cache_param(data, |a| &mut a.pps),
            FrameType::Sei => {
                self.sei = Some(data);
                HevcPush::Held
            }
            FrameType::I | FrameType::P | FrameType::B if info.first_slice.unwrap_or(true) => {
                self.start_picture(info.frame_type, data)
            }
            _ => match self.pending.as_mut() {
                Some(picture) => {
                    picture.data.extend_from_slice(&data);
                    HevcPush::Held
                }
                None => HevcPush::Dropped,
            },
        }
    }

    fn cache_param(
        &mut self,
        data: Vec<u8>,
        slot: impl FnOnce(&mut Self) -> &mut Option<Vec<u8>>,
    ) -> HevcPush {
        *slot(self) = Some(data);
        self.params_dirty = true;
        HevcPush::Held
    }

    fn start_picture(&mut self, frame_type: FrameType, data: Vec<u8>) -> HevcPush {
        let mut buf = Vec::new();
        if frame_type == FrameType::I {
            let carries_params = first_nal_type(&data).is_some_and(|t| t.is_parameter_set());
            if self.params_dirty && !carries_params {
                for param in [&self.vps, &self.sps, &self.pps].into_iter().flatten() {
                    buf.extend_from_slice(param);
                }
                debug!("HEVC: I 帧前置参数集 {} 字节", buf.len());
            }
            self.params_dirty = false;
        }
        if let Some(sei) = self.sei.take() {
            buf.extend_from_slice(&sei);
        }
        let data = if buf.is_empty() {
            data
        } else {
            buf.extend_from_slice(&data);
            buf
        };

        let previous = self.pending.replace(HevcPicture { frame_type, data });
        match previous {
            Some(picture) => HevcPush::Flushed(picture),
            None => HevcPush::Held,
        }
    }

    /// 丢弃未交付的图像, 返回是否真的丢弃了数据
    pub fn discard_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// 是否有未交付的图像
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
