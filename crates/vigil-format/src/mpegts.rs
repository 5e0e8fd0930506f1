//! MPEG-TS 子解封装器.
//!
//! 分块传输的响应体本身是一条 MPEG-TS 流, 分帧层把数据原样推给子解封装器,
//! 再反复取出已经重组完成的帧. [`TsSubDemuxer`] 是这条接缝, 外部实现可以通过
//! [`TsFactory`] 注入; [`TsDemuxer`] 是内置的推模式实现.
//!
//! # TS 包结构 (188 字节)
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ 同步字节 (0x47)                    1 byte│
//! │ TEI(1) + PUSI(1) + Priority(1) +         │
//! │   PID(13)                         2 bytes│
//! │ TSC(2) + AFC(2) + CC(4)          1 byte │
//! │ [Adaptation Field]               可变     │
//! │ [Payload]                        可变     │
//! └──────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};
use vigil_codec::{CodecId, EncodedFrame, FrameType, parse_frame_header};
use vigil_core::{MediaType, VigilError, VigilResult};

/// 子解封装器内的会话 ID
pub type TsSessionId = u32;

/// MPEG-TS 子解封装器接口
pub trait TsSubDemuxer: Send {
    /// 开始一个会话
    fn start_session(&mut self) -> VigilResult<TsSessionId>;

    /// 结束会话并释放其缓冲
    fn stop_session(&mut self, id: TsSessionId);

    /// 推入一段数据, 返回 (消耗字节数, 取出的帧)
    ///
    /// 调用方以剩余数据反复调用, 直到不再返回帧.
    fn parse_chunk(
        &mut self,
        id: TsSessionId,
        data: &[u8],
    ) -> VigilResult<(usize, Option<EncodedFrame>)>;
}

/// 子解封装器工厂, 每个需要 TS 的会话调用一次
pub type TsFactory = Arc<dyn Fn() -> Box<dyn TsSubDemuxer> + Send + Sync>;

/// 使用内置 [`TsDemuxer`] 的工厂
pub fn builtin_factory() -> TsFactory {
    Arc::new(|| Box::new(TsDemuxer::new()) as Box<dyn TsSubDemuxer>)
}

/// TS 包大小
pub const TS_PACKET_SIZE: usize = 188;
/// TS 同步字节
pub const TS_SYNC_BYTE: u8 = 0x47;
/// PAT PID
const PID_PAT: u16 = 0x0000;
/// 空包 PID
const PID_NULL: u16 = 0x1FFF;

/// MPEG-TS stream_type → CodecId 映射
fn stream_type_to_codec(stream_type: u8) -> CodecId {
    match stream_type {
        0x1B => CodecId::H264,
        0x24 => CodecId::H265,
        0x10 => CodecId::Mpeg4,
        0x0F => CodecId::Aac,
        0x90 => CodecId::PcmAlaw,
        0x91 => CodecId::PcmMulaw,
        _ => CodecId::None,
    }
}

/// PES 重组缓冲区
struct PesBuffer {
    data: Vec<u8>,
    codec_id: CodecId,
    /// 是否为随机访问点
    random_access: bool,
}

impl PesBuffer {
    fn new(codec_id: CodecId) -> Self {
        Self {
            data: Vec::new(),
            codec_id,
            random_access: false,
        }
    }
}

/// 单个会话的解析状态
#[derive(Default)]
struct TsSession {
    /// 跨调用暂存的不完整 TS 包
    carry: Vec<u8>,
    /// PMT PID (从 PAT 获取)
    pmt_pid: Option<u16>,
    pmt_parsed: bool,
    /// ES PID → PES 缓冲区
    pes_buffers: HashMap<u16, PesBuffer>,
    /// 已完成的帧
    queue: VecDeque<EncodedFrame>,
    /// 重新同步时丢弃的字节数
    skipped: usize,
}

impl TsSession {
    /// 推入数据, 处理所有完整的 TS 包
    fn push(&mut self, data: &[u8]) {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(data);

        let mut pos = 0;
        while pos < buf.len() {
            if buf[pos] != TS_SYNC_BYTE || !Self::sync_confirmed(&buf, pos) {
                let next = buf[pos + 1..]
                    .iter()
                    .position(|&b| b == TS_SYNC_BYTE)
                    .map_or(buf.len(), |i| pos + 1 + i);
                self.skipped += next - pos;
                pos = next;
                continue;
            }
            if pos + TS_PACKET_SIZE > buf.len() {
                break;
            }
            self.process_packet(&buf[pos..pos + TS_PACKET_SIZE]);
            pos += TS_PACKET_SIZE;
        }

        if self.skipped > 0 {
            warn!("TS: 重新同步, 丢弃 {} 字节", self.skipped);
            self.skipped = 0;
        }
        buf.drain(..pos);
        self.carry = buf;
    }

    /// 下一个包的同步字节在数据范围内时必须吻合
    fn sync_confirmed(buf: &[u8], pos: usize) -> bool {
        buf.get(pos + TS_PACKET_SIZE)
            .is_none_or(|&b| b == TS_SYNC_BYTE)
    }

    /// 处理一个 TS 包
    fn process_packet(&mut self, pkt: &[u8]) {
        let (pid, pusi, afc) = parse_ts_header(pkt);
        if pid == PID_NULL {
            return;
        }

        let (payload_off, random_access) = payload_offset(pkt, afc);
        if payload_off >= pkt.len() {
            return;
        }
        let payload = &pkt[payload_off..];

        if pid == PID_PAT {
            if let Some(section) = psi_section(payload, pusi) {
                self.parse_pat(section);
            }
            return;
        }

        if self.pmt_pid == Some(pid) {
            if let Some(section) = psi_section(payload, pusi) {
                self.parse_pmt(section);
            }
            return;
        }

        if self.pmt_parsed {
            self.handle_pes_data(pid, payload, pusi, random_access);
        }
    }

    /// 解析 PAT, 取第一个节目的 PMT PID
    fn parse_pat(&mut self, section: &[u8]) {
        if self.pmt_pid.is_some() || section.len() < 8 {
            return;
        }
        let section_length = (usize::from(section[1] & 0x0F) << 8) | usize::from(section[2]);
        // 减去 CRC
        let entries_end = (3 + section_length).min(section.len()).saturating_sub(4);
        if entries_end <= 8 {
            return;
        }

        for entry in section[8..entries_end].chunks_exact(4) {
            let program_number = u16::from(entry[0]) << 8 | u16::from(entry[1]);
            let pid = (u16::from(entry[2] & 0x1F) << 8) | u16::from(entry[3]);
            if program_number != 0 {
                debug!("TS PAT: program={program_number} PMT_PID={pid:#06X}");
                self.pmt_pid = Some(pid);
                break;
            }
        }
    }

    /// 解析 PMT, 为已知编码的 ES 建立 PES 缓冲区
    fn parse_pmt(&mut self, section: &[u8]) {
        if self.pmt_parsed || section.len() < 12 {
            return;
        }
        let section_length = (usize::from(section[1] & 0x0F) << 8) | usize::from(section[2]);
        let prog_info_len = (usize::from(section[10] & 0x0F) << 8) | usize::from(section[11]);
        let section_end = (3 + section_length).min(section.len()).saturating_sub(4);

        let mut pos = 12 + prog_info_len;
        while pos + 5 <= section_end {
            let stream_type = section[pos];
            let es_pid = (u16::from(section[pos + 1] & 0x1F) << 8) | u16::from(section[pos + 2]);
            let es_info_len =
                (usize::from(section[pos + 3] & 0x0F) << 8) | usize::from(section[pos + 4]);

            let codec_id = stream_type_to_codec(stream_type);
            debug!("TS PMT: stream_type=0x{stream_type:02X} PID={es_pid:#06X} codec={codec_id}");
            if codec_id != CodecId::None {
                self.pes_buffers.insert(es_pid, PesBuffer::new(codec_id));
            }
            pos += 5 + es_info_len;
        }
        self.pmt_parsed = true;
    }

    /// 处理 PES 数据
    fn handle_pes_data(&mut self, pid: u16, payload: &[u8], pusi: bool, random_access: bool) {
        if !self.pes_buffers.contains_key(&pid) {
            return;
        }

        if pusi {
            // 新 PES 开始: 先交付上一个
            self.flush_pes(pid);
            if let Some(buf) = self.pes_buffers.get_mut(&pid) {
                buf.random_access = random_access;
                let header_len = pes_header_len(payload).unwrap_or(0);
                buf.data.extend_from_slice(&payload[header_len..]);
            }
        } else if let Some(buf) = self.pes_buffers.get_mut(&pid) {
            // 还没见过 PES 起始的续包无法定界
            if buf.data.is_empty() {
                return;
            }
            buf.data.extend_from_slice(payload);
            buf.random_access |= random_access;
        }
    }

    /// 把 PES 缓冲区交付为帧
    fn flush_pes(&mut self, pid: u16) {
        let Some(buf) = self.pes_buffers.get_mut(&pid) else {
            return;
        };
        if buf.data.is_empty() {
            return;
        }

        let data = Bytes::from(std::mem::take(&mut buf.data));
        let mut frame = EncodedFrame::new(buf.codec_id.media_type(), buf.codec_id, data);
        if frame.media_type == MediaType::Video {
            let info = parse_frame_header(buf.codec_id, &frame.data);
            frame.frame_type = info.frame_type;
            frame.width = info.width;
            frame.height = info.height;
            frame.ref_frames = info.ref_frames;
            if buf.random_access && frame.frame_type == FrameType::Unknown {
                frame.frame_type = FrameType::I;
            }
        } else {
            frame.sample_rate = buf.codec_id.default_sample_rate();
        }
        buf.random_access = false;
        self.queue.push_back(frame);
    }
}

/// 解析 TS 包头, 返回 (PID, PUSI, AFC)
fn parse_ts_header(pkt: &[u8]) -> (u16, bool, u8) {
    let pid = (u16::from(pkt[1] & 0x1F) << 8) | u16::from(pkt[2]);
    let pusi = (pkt[1] & 0x40) != 0;
    let afc = (pkt[3] >> 4) & 0x03;
    (pid, pusi, afc)
}

/// 负载偏移与 random_access_indicator
fn payload_offset(pkt: &[u8], afc: u8) -> (usize, bool) {
    let mut offset = 4;
    let mut random_access = false;

    if afc == 2 || afc == 3 {
        let af_len = usize::from(pkt[offset]);
        if af_len > 0 {
            random_access = pkt.get(offset + 1).is_some_and(|&f| f & 0x40 != 0);
        }
        offset += 1 + af_len;
    }

    if afc == 1 || afc == 3 {
        (offset, random_access)
    } else {
        (pkt.len(), random_access)
    }
}

/// 按 pointer_field 定位 PSI 段
fn psi_section(payload: &[u8], pusi: bool) -> Option<&[u8]> {
    if !pusi {
        return None;
    }
    let pointer = usize::from(*payload.first()?);
    payload.get(1 + pointer..).filter(|s| !s.is_empty())
}

/// PES 包头长度; 负载不是以 PES 起始码开头时返回 None
fn pes_header_len(data: &[u8]) -> Option<usize> {
    if data.len() < 9 || data[..3] != [0x00, 0x00, 0x01] {
        return None;
    }
    // 没有可选头 (padding stream 等)
    if (data[6] & 0xC0) != 0x80 {
        return Some(6);
    }
    Some((9 + usize::from(data[8])).min(data.len()))
}

/// 内置推模式 MPEG-TS 解封装器
#[derive(Default)]
pub struct TsDemuxer {
    sessions: HashMap<TsSessionId, TsSession>,
    next_id: TsSessionId,
}

impl TsDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 活动会话数
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl TsSubDemuxer for TsDemuxer {
    fn start_session(&mut self) -> VigilResult<TsSessionId> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        if self.sessions.insert(id, TsSession::default()).is_some() {
            return Err(VigilError::SubDemuxer(format!("TS: 会话 ID {} 冲突", id)));
        }
        debug!("TS: 会话 {} 开始", id);
        Ok(id)
    }

    fn stop_session(&mut self, id: TsSessionId) {
        if let Some(session) = self.sessions.remove(&id) {
            debug!(
                "TS: 会话 {} 结束, 丢弃 {} 个未取出的帧",
                id,
                session.queue.len()
            );
        }
    }

    fn parse_chunk(
        &mut self,
        id: TsSessionId,
        data: &[u8],
    ) -> VigilResult<(usize, Option<EncodedFrame>)> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| VigilError::SubDemuxer(format!("TS: 未知会话 {}", id)))?;
        // 一次吞下全部数据, 之后的调用只出队
        session.push(data);
        Ok((data.len(), session.queue.pop_front()))
    }
}
