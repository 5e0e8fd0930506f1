//! 分帧方式未知时的嗅探.

use log::{info, warn};
use vigil_codec::CodecId;
use vigil_core::VigilResult;

use super::Session;
use crate::framing::FramingKind;
use crate::header;

impl Session {
    /// 确定分帧方式后处理首段数据
    ///
    /// 有内容长度时按单次响应处理; 响应声明了非 multipart 的内容类型时直接按单段处理;
    /// 其余情况缓冲至多 `sniff_size` 字节判定分帧方式, 之后把缓冲数据和本次剩余数据重放.
    pub(super) fn sniff_framing(&mut self, data: &[u8]) -> VigilResult<usize> {
        if self.content_length.is_some() {
            self.framing = FramingKind::SingleResponse;
            info!("会话 {}: 分帧方式 {}", self.handle, self.framing);
            return self.parse_single_response(data);
        }
        if self.response_media.is_known() {
            self.framing = self.single_framing();
            info!(
                "会话 {}: 按声明的 {} 类型使用分帧方式 {}",
                self.handle, self.response_media, self.framing
            );
            return self.dispatch(data);
        }

        let room = self.config.sniff_size.saturating_sub(self.sniff.len());
        let take = room.min(data.len());
        self.sniff.extend_from_slice(&data[..take]);

        if let Some(boundary) = header::sniff_boundary(&self.sniff, self.config.max_boundary_len)
        {
            self.boundary = Some(boundary);
            self.part.reset();
            self.framing = FramingKind::MultiPart;
        } else if self.sniff.len() < self.config.sniff_size {
            return Ok(data.len());
        } else {
            self.framing = self.fallback_framing();
        }
        info!("会话 {}: 嗅探判定分帧方式 {}", self.handle, self.framing);

        let buffered = std::mem::take(&mut self.sniff);
        self.dispatch(&buffered)?;
        if take < data.len() {
            self.dispatch(&data[take..])?;
        }
        Ok(data.len())
    }

    /// 没有声明类型也没有边界时按 TS 处理
    fn fallback_framing(&mut self) -> FramingKind {
        match self.start_ts() {
            Ok(()) => FramingKind::MultiChunk,
            Err(e) => {
                warn!("会话 {}: 启动 TS 子解封装器失败: {}", self.handle, e);
                self.single_framing()
            }
        }
    }

    fn single_framing(&self) -> FramingKind {
        if self.meta.video_codec == CodecId::Mjpeg {
            FramingKind::SinglePartImage
        } else {
            FramingKind::SinglePart
        }
    }
}
