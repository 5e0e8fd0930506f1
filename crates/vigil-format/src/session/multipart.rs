//! multipart 分帧: 分段头子状态与帧子状态交替.

use log::{debug, warn};
use vigil_core::{VigilError, VigilResult};

use super::Session;
use crate::framing::PartState;
use crate::header::{self, BOUNDARY_MARKER, HeaderField};

impl Session {
    pub(super) fn parse_multipart(&mut self, data: &[u8]) -> VigilResult<usize> {
        let mut off = 0;
        while off < data.len() {
            let rest = &data[off..];
            off += match self.part.state {
                PartState::Header => self.multipart_header(rest)?,
                PartState::Frame => self.multipart_frame(rest)?,
            };
        }
        Ok(data.len())
    }

    // ========================
    // 分段头
    // ========================

    /// 逐行扫描分段头, 不完整的行留在暂存区
    fn multipart_header(&mut self, data: &[u8]) -> VigilResult<usize> {
        let mut off = 0;
        while off < data.len() {
            let rest = &data[off..];
            let Some(nl) = rest.iter().position(|&b| b == b'\n') else {
                self.carry_append(rest)?;
                return Ok(data.len());
            };
            self.carry_append(&rest[..nl])?;
            off += nl + 1;

            let mut line = std::mem::take(&mut self.carry);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let ended = self.multipart_header_line(&line);
            line.clear();
            self.carry = line;

            if ended {
                self.begin_part_frame()?;
                return Ok(off);
            }
        }
        Ok(data.len())
    }

    fn carry_append(&mut self, bytes: &[u8]) -> VigilResult<()> {
        let len = self.carry.len() + bytes.len();
        if len > self.config.max_header_size {
            self.carry.clear();
            return Err(VigilError::HeaderOverflow {
                len,
                max: self.config.max_header_size,
            });
        }
        self.carry.extend_from_slice(bytes);
        Ok(())
    }

    /// 处理一行分段头, 返回分段头是否结束
    fn multipart_header_line(&mut self, line: &[u8]) -> bool {
        if line.is_empty() {
            return self.part.boundary_seen;
        }

        if let Some(boundary) = self.boundary.as_deref() {
            if line.starts_with(boundary) {
                if line[boundary.len()..].starts_with(BOUNDARY_MARKER) {
                    debug!("会话 {}: 收到结束边界", self.handle);
                }
                self.part.boundary_seen = true;
                self.part.content_length = None;
                return false;
            }
        } else if line.starts_with(BOUNDARY_MARKER) {
            if let Some(b) = header::normalize_boundary(line, self.config.max_boundary_len) {
                debug!(
                    "会话 {}: 从数据中采纳边界 {}",
                    self.handle,
                    String::from_utf8_lossy(&b)
                );
                self.boundary = Some(b);
                self.part.boundary_seen = true;
                self.part.content_length = None;
                return false;
            }
        }

        let text = String::from_utf8_lossy(line);
        let Some((name, value)) = header::split_header_line(&text) else {
            debug!("会话 {}: 忽略分段头部行 {:?}", self.handle, text);
            return false;
        };
        match HeaderField::from_name(name) {
            HeaderField::ContentType => self.apply_content_type(value, false),
            HeaderField::ContentLength if self.part.content_length.is_none() => {
                match header::parse_content_length(value) {
                    Ok(len) => self.part.content_length = Some(len),
                    Err(e) => warn!("会话 {}: 分段头: {}", self.handle, e),
                }
            }
            _ => {}
        }
        false
    }

    /// 分段头结束, 进入帧子状态
    fn begin_part_frame(&mut self) -> VigilResult<()> {
        self.part.boundary_seen = false;
        self.frame.clear();
        match self.part.content_length {
            Some(0) => {
                debug!("会话 {}: 跳过空分段", self.handle);
                Ok(())
            }
            Some(len) if len > self.config.max_frame_size => Err(VigilError::InvalidData(format!(
                "分段长度 {} 超出上限 {}",
                len, self.config.max_frame_size
            ))),
            _ => {
                self.part.state = PartState::Frame;
                Ok(())
            }
        }
    }

    // ========================
    // 帧数据
    // ========================

    fn multipart_frame(&mut self, data: &[u8]) -> VigilResult<usize> {
        match self.part.content_length {
            Some(total) => self.multipart_frame_sized(data, total),
            None => self.multipart_frame_scan(data),
        }
    }

    /// 按声明长度累积
    fn multipart_frame_sized(&mut self, data: &[u8], total: usize) -> VigilResult<usize> {
        let mut start = 0;
        if self.frame.is_empty() {
            // 负载前可能插有额外的换行
            start = data
                .iter()
                .position(|&b| b != b'\r' && b != b'\n')
                .unwrap_or(data.len());
            if start == data.len() {
                return Ok(start);
            }
            if let Err(e) = self.reserve_frame(total) {
                self.part.reset();
                return Err(e);
            }
        }

        let take = (total - self.frame.len()).min(data.len() - start);
        self.frame.extend_from_slice(&data[start..start + take]);
        if self.frame.len() == total {
            self.finish_part();
        }
        Ok(start + take)
    }

    /// 没有声明长度: 以完整边界串定界
    fn multipart_frame_scan(&mut self, data: &[u8]) -> VigilResult<usize> {
        let Some(boundary) = self.boundary.clone() else {
            return Err(VigilError::InvalidData("multipart 分段既无长度也无边界".into()));
        };

        // 边界串横跨上一次读取和本次读取
        let max_head = boundary.len().saturating_sub(1).min(self.frame.len());
        for k in (1..=max_head).rev() {
            let (head, tail) = boundary.split_at(k);
            if self.frame.ends_with(head) && data.starts_with(tail) {
                let end = self.frame.len() - k;
                self.frame.truncate(end);
                self.finish_part();
                // 已消耗的边界前缀交给分段头继续拼行
                self.carry_append(head)?;
                return Ok(0);
            }
        }

        if let Some(idx) = header::find_bytes(data, &boundary) {
            self.append_frame(&data[..idx])?;
            self.finish_part();
            return Ok(idx);
        }

        self.append_frame(data)?;
        Ok(data.len())
    }

    /// 交付当前分段并回到分段头子状态
    fn finish_part(&mut self) {
        if self.part.content_length.is_none() {
            // 边界前的行结束符不属于负载
            if self.frame.ends_with(b"\r\n") {
                self.frame.truncate(self.frame.len() - 2);
            } else if self.frame.ends_with(b"\n") {
                self.frame.truncate(self.frame.len() - 1);
            }
        }
        let frame = std::mem::take(&mut self.frame);
        self.part.state = PartState::Header;
        self.part.content_length = None;
        self.emit_frame(frame);
    }
}
