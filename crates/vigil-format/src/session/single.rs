//! 单段分帧: SinglePart, SinglePartImage, SingleResponse.

use log::{debug, warn};
use vigil_codec::parsers::mjpeg::{EOI, MARKER_PREFIX, SOI};
use vigil_core::{VigilError, VigilResult};

use super::Session;

impl Session {
    /// 每次读取即一帧, 不跨读取累积
    pub(super) fn parse_single_part(&mut self, data: &[u8]) -> VigilResult<usize> {
        if data.len() > self.config.max_frame_size {
            return Err(VigilError::InvalidData(format!(
                "帧长度 {} 超出上限 {}",
                data.len(),
                self.config.max_frame_size
            )));
        }
        self.frame = Vec::new();
        self.reserve_frame(data.len())?;
        self.frame.extend_from_slice(data);
        let frame = std::mem::take(&mut self.frame);
        self.emit_frame(frame);
        Ok(data.len())
    }

    /// 连续的 MJPEG: SOI 开始一帧, EOI 结束一帧, 标记可以跨读取
    pub(super) fn parse_single_image(&mut self, data: &[u8]) -> VigilResult<usize> {
        let mut seg_start = 0;
        for (i, &b) in data.iter().enumerate() {
            let after_prefix = self.image.prev_ff;
            self.image.prev_ff = b == MARKER_PREFIX;
            if !after_prefix {
                continue;
            }

            if !self.image.in_frame && b == SOI {
                self.frame.clear();
                self.append_frame(&[MARKER_PREFIX, SOI])?;
                self.image.in_frame = true;
                seg_start = i + 1;
            } else if self.image.in_frame && b == EOI {
                self.append_frame(&data[seg_start..=i])?;
                self.image.in_frame = false;
                let frame = std::mem::take(&mut self.frame);
                self.emit_frame(frame);
            }
        }
        if self.image.in_frame && seg_start < data.len() {
            self.append_frame(&data[seg_start..])?;
        }
        Ok(data.len())
    }

    /// 恰好累积 content-length 字节后交付一次
    pub(super) fn parse_single_response(&mut self, data: &[u8]) -> VigilResult<usize> {
        let total = self
            .content_length
            .ok_or_else(|| VigilError::InvalidData("单次响应缺少内容长度".into()))?;
        if total > self.config.max_frame_size {
            return Err(VigilError::InvalidData(format!(
                "响应长度 {} 超出上限 {}",
                total, self.config.max_frame_size
            )));
        }
        if self.response_done {
            warn!("会话 {}: 响应已完整, 丢弃多余的 {} 字节", self.handle, data.len());
            return Ok(data.len());
        }

        if self.frame.is_empty() {
            self.reserve_frame(total)?;
        }
        let take = (total - self.frame.len()).min(data.len());
        self.frame.extend_from_slice(&data[..take]);
        if self.frame.len() == total {
            debug!("会话 {}: 单次响应完整, {} 字节", self.handle, total);
            self.response_done = true;
            let frame = std::mem::take(&mut self.frame);
            self.emit_frame(frame);
        }
        if take < data.len() {
            warn!(
                "会话 {}: 响应已完整, 丢弃多余的 {} 字节",
                self.handle,
                data.len() - take
            );
        }
        Ok(data.len())
    }
}
