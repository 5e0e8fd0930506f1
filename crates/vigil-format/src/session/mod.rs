//! 会话: 单个传输连接的分帧状态机.
//!
//! 传输层对每个会话串行调用 [`Session::parse_header`] (每个响应头行一次) 和
//! [`Session::parse_data`] (每段响应体一次). 会话按分帧方式把字节重组成完整的帧,
//! 经过编码相关修正后交给 [`FrameSink`].
//!
//! 所有终止路径 (解析失败, 非成功状态码, 主动关闭, 析构) 都汇聚到同一个关闭流程:
//! 释放帧缓冲与暂存区, 停止 TS 子会话, 恰好触发一次 [`SessionEvent::Closed`].

mod chunked;
mod multipart;
mod single;
mod sniff;

use std::sync::Arc;

use log::{debug, error, info, warn};
use vigil_codec::parsers::aac::{self, AacConfig};
use vigil_codec::{CodecId, EncodedFrame, FrameInfo, parse_frame_header};
use vigil_core::{MediaType, VigilError, VigilResult};

use crate::config::DemuxConfig;
use crate::emit::{self, HevcAssembler, HevcPush};
use crate::framing::{FramingKind, ImageScan, PartContext};
use crate::header::{self, HeaderField};
use crate::mpegts::{self, TsFactory, TsSessionId, TsSubDemuxer};
use crate::sink::{CloseStatus, FrameSink, SessionEvent};
use crate::table::SessionHandle;

/// 会话统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// 已交付的帧数
    pub frames_emitted: u64,
    /// 已消耗的响应体字节数
    pub bytes_consumed: u64,
    /// 被丢弃的帧数
    pub frames_dropped: u64,
}

/// 会话状态快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub framing: FramingKind,
    /// 响应声明的媒体类别
    pub media_type: MediaType,
    pub video_codec: CodecId,
    pub audio_codec: CodecId,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub ref_frames: Option<u32>,
    pub sample_rate: Option<u32>,
    /// 最近一次响应的状态码
    pub http_status: Option<u16>,
    /// multipart 边界串
    pub boundary: Option<String>,
    pub closed: bool,
}

/// 每路流的编码元数据, 跨响应保留
#[derive(Debug, Default)]
struct StreamMeta {
    video_codec: CodecId,
    audio_codec: CodecId,
    width: Option<u32>,
    height: Option<u32>,
    ref_frames: Option<u32>,
    sample_rate: Option<u32>,
    aac: Option<AacConfig>,
}

impl StreamMeta {
    fn update(&mut self, info: &FrameInfo) {
        if let (Some(w), Some(h)) = (info.width, info.height) {
            self.width = Some(w);
            self.height = Some(h);
        }
        if info.ref_frames.is_some() {
            self.ref_frames = info.ref_frames;
        }
    }
}

/// 绑定到本会话的 TS 子会话
struct TsBinding {
    demuxer: Box<dyn TsSubDemuxer>,
    id: TsSessionId,
}

/// 单个传输连接的解析上下文
pub struct Session {
    handle: SessionHandle,
    config: Arc<DemuxConfig>,
    sink: Box<dyn FrameSink>,
    ts_factory: TsFactory,

    framing: FramingKind,
    /// 跨读取的不完整头部行
    carry: Vec<u8>,
    /// 正在累积的帧
    frame: Vec<u8>,
    /// 分帧方式未知时的嗅探缓冲
    sniff: Vec<u8>,
    boundary: Option<Vec<u8>>,
    /// 响应头声明的内容长度
    content_length: Option<usize>,
    response_media: MediaType,
    /// 当前分段 (或整个响应) 的媒体类别
    part_media: MediaType,
    part: PartContext,
    image: ImageScan,
    response_done: bool,

    meta: StreamMeta,
    hevc: HevcAssembler,
    ts: Option<TsBinding>,

    auth_retry: bool,
    auth_attempted: bool,
    /// 当前响应被忽略 (等待带凭据重试)
    suppressed: bool,
    http_status: Option<u16>,
    stats: SessionStats,
    closed: bool,
}

impl Session {
    /// 创建会话, 使用内置 TS 子解封装器
    pub fn new(handle: SessionHandle, config: Arc<DemuxConfig>, sink: Box<dyn FrameSink>) -> Self {
        Self {
            handle,
            config,
            sink,
            ts_factory: mpegts::builtin_factory(),
            framing: FramingKind::Unknown,
            carry: Vec::new(),
            frame: Vec::new(),
            sniff: Vec::new(),
            boundary: None,
            content_length: None,
            response_media: MediaType::Unknown,
            part_media: MediaType::Unknown,
            part: PartContext::default(),
            image: ImageScan::default(),
            response_done: false,
            meta: StreamMeta::default(),
            hevc: HevcAssembler::new(),
            ts: None,
            auth_retry: false,
            auth_attempted: false,
            suppressed: false,
            http_status: None,
            stats: SessionStats::default(),
            closed: false,
        }
    }

    /// 替换 TS 子解封装器工厂
    pub fn with_ts_factory(mut self, factory: TsFactory) -> Self {
        self.ts_factory = factory;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn framing(&self) -> FramingKind {
        self.framing
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 取走一次性的带凭据重试标志
    pub fn take_auth_retry(&mut self) -> bool {
        std::mem::take(&mut self.auth_retry)
    }

    /// 会话仍持有的缓冲容量 (帧缓冲, 头部暂存区, 嗅探缓冲)
    pub fn retained_capacity(&self) -> usize {
        self.carry.capacity() + self.frame.capacity() + self.sniff.capacity()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            framing: self.framing,
            media_type: self.response_media,
            video_codec: self.meta.video_codec,
            audio_codec: self.meta.audio_codec,
            width: self.meta.width,
            height: self.meta.height,
            ref_frames: self.meta.ref_frames,
            sample_rate: self.meta.sample_rate,
            http_status: self.http_status,
            boundary: self
                .boundary
                .as_deref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
            closed: self.closed,
        }
    }

    /// 缓存会话描述中的 AAC 配置 (十六进制串)
    pub fn set_aac_config(&mut self, hex_config: &str) -> VigilResult<()> {
        let cfg = aac::parse_config_hex(hex_config, self.config.max_aac_config_len)?;
        debug!(
            "会话 {}: AAC 配置 object_type={} rate={} channels={}",
            self.handle, cfg.object_type, cfg.sample_rate, cfg.channel_config
        );
        self.meta.sample_rate.get_or_insert(cfg.sample_rate);
        if self.meta.audio_codec == CodecId::None {
            self.meta.audio_codec = CodecId::Aac;
        }
        self.meta.aac = Some(cfg);
        Ok(())
    }

    fn ensure_open(&self) -> VigilResult<()> {
        if self.closed {
            return Err(VigilError::SessionClosed);
        }
        Ok(())
    }

    // ========================
    // 响应头
    // ========================

    /// 解析响应头, 通常每次一行; 总是消耗全部输入
    ///
    /// 非成功状态码会关闭会话并返回 [`VigilError::ResponseStatus`].
    pub fn parse_header(&mut self, data: &[u8]) -> VigilResult<usize> {
        self.ensure_open()?;
        for raw in data.split(|&b| b == b'\n') {
            let text = String::from_utf8_lossy(raw);
            let line = text.trim_end_matches('\r');
            if let Some(status) = header::parse_status_line(line) {
                self.handle_status(status)?;
                continue;
            }
            if self.suppressed || line.trim().is_empty() {
                continue;
            }
            self.handle_header_line(line);
        }
        Ok(data.len())
    }

    fn handle_status(&mut self, status: u16) -> VigilResult<()> {
        self.http_status = Some(status);
        if status == self.config.auth_challenge_status && !self.auth_attempted {
            info!("会话 {}: 收到认证质询 {}, 等待带凭据重试", self.handle, status);
            self.auth_attempted = true;
            self.auth_retry = true;
            self.suppressed = true;
            return Ok(());
        }
        if !self.config.is_success(status) {
            error!("会话 {}: 响应状态码 {}", self.handle, status);
            self.close_with(CloseStatus::Error, Some(status));
            return Err(VigilError::ResponseStatus(status));
        }
        debug!("会话 {}: 响应状态码 {}", self.handle, status);
        self.reset_response();
        Ok(())
    }

    /// 新响应开始: 清空帧存储和分帧状态, 保留编码元数据
    fn reset_response(&mut self) {
        self.suppressed = false;
        self.framing = FramingKind::Unknown;
        self.carry.clear();
        self.frame.clear();
        self.sniff.clear();
        self.boundary = None;
        self.content_length = None;
        self.response_media = MediaType::Unknown;
        self.part_media = MediaType::Unknown;
        self.part.reset();
        self.image = ImageScan::default();
        self.response_done = false;
        self.stop_ts();
        if self.hevc.discard_pending() {
            self.stats.frames_dropped += 1;
        }
    }

    fn handle_header_line(&mut self, line: &str) {
        let Some((name, value)) = header::split_header_line(line) else {
            debug!("会话 {}: 忽略头部行 {:?}", self.handle, line);
            return;
        };
        match HeaderField::from_name(name) {
            HeaderField::ContentType => self.apply_content_type(value, true),
            HeaderField::TransferEncoding => {
                if value.to_ascii_lowercase().contains("chunked") {
                    self.begin_chunked();
                }
            }
            HeaderField::ContentLength => {
                if self.content_length.is_some() {
                    return;
                }
                match header::parse_content_length(value) {
                    Ok(len) => self.content_length = Some(len),
                    Err(e) => warn!("会话 {}: {}", self.handle, e),
                }
            }
            HeaderField::Other => {}
        }
    }

    fn begin_chunked(&mut self) {
        // multipart 内容经分块传输时按 multipart 处理
        if self.framing == FramingKind::MultiPart {
            debug!("会话 {}: multipart 经分块传输", self.handle);
            return;
        }
        match self.start_ts() {
            Ok(()) => {
                self.framing = FramingKind::MultiChunk;
                debug!("会话 {}: 分块传输, 交给 TS 子解封装器", self.handle);
            }
            Err(e) => warn!("会话 {}: 启动 TS 子解封装器失败: {}", self.handle, e),
        }
    }

    /// 应用 Content-Type; `response` 区分响应头与分段头
    fn apply_content_type(&mut self, value: &str, response: bool) {
        let ct = match header::parse_content_type(value, self.config.max_boundary_len) {
            Ok(ct) => ct,
            Err(e) => {
                warn!("会话 {}: {}", self.handle, e);
                return;
            }
        };

        if ct.is_multipart {
            if !response {
                debug!("会话 {}: 忽略嵌套的 multipart 分段", self.handle);
                return;
            }
            match ct.boundary {
                Some(boundary) => {
                    self.stop_ts();
                    self.boundary = Some(boundary);
                    self.framing = FramingKind::MultiPart;
                    self.part.reset();
                }
                None => warn!("会话 {}: multipart 缺少 boundary 参数", self.handle),
            }
            return;
        }

        if response {
            self.response_media = ct.media_type;
        }
        self.part_media = ct.media_type;
        match ct.codec_id.media_type() {
            MediaType::Video => self.meta.video_codec = ct.codec_id,
            MediaType::Audio => self.meta.audio_codec = ct.codec_id,
            _ => {}
        }
        if ct.rate.is_some() {
            self.meta.sample_rate = ct.rate;
        }
        if let Some(config) = ct.config.as_deref() {
            if let Err(e) = self.set_aac_config(config) {
                warn!("会话 {}: 忽略 AAC 配置: {}", self.handle, e);
            }
        }
    }

    // ========================
    // 响应体
    // ========================

    /// 解析一段响应体, 返回消耗的字节数
    ///
    /// 出错时会话被关闭, 之后的调用返回 [`VigilError::SessionClosed`].
    pub fn parse_data(&mut self, data: &[u8]) -> VigilResult<usize> {
        self.ensure_open()?;
        if self.suppressed {
            return Ok(data.len());
        }
        if data.is_empty() {
            return Ok(0);
        }
        match self.dispatch(data) {
            Ok(consumed) => {
                self.stats.bytes_consumed += consumed as u64;
                Ok(consumed)
            }
            Err(e) => {
                error!("会话 {}: {} 分帧解析失败: {}", self.handle, self.framing, e);
                self.close_with(CloseStatus::Error, None);
                Err(e)
            }
        }
    }

    fn dispatch(&mut self, data: &[u8]) -> VigilResult<usize> {
        match self.framing {
            FramingKind::Unknown => self.sniff_framing(data),
            FramingKind::MultiPart => self.parse_multipart(data),
            FramingKind::SinglePart => self.parse_single_part(data),
            FramingKind::SinglePartImage => self.parse_single_image(data),
            FramingKind::SingleResponse => self.parse_single_response(data),
            FramingKind::MultiChunk => self.parse_multi_chunk(data),
        }
    }

    /// 向帧缓冲追加数据, 先扩容再写入
    fn append_frame(&mut self, data: &[u8]) -> VigilResult<()> {
        let len = self.frame.len() + data.len();
        if len > self.config.max_frame_size {
            self.frame.clear();
            return Err(VigilError::InvalidData(format!(
                "帧长度 {} 超出上限 {}",
                len, self.config.max_frame_size
            )));
        }
        self.reserve_frame(data.len())?;
        self.frame.extend_from_slice(data);
        Ok(())
    }

    /// 为帧缓冲预留 `additional` 字节, 失败时放弃当前帧
    fn reserve_frame(&mut self, additional: usize) -> VigilResult<()> {
        if let Err(e) = self.frame.try_reserve(additional) {
            let wanted = self.frame.len() + additional;
            self.frame = Vec::new();
            return Err(VigilError::OutOfMemory(format!(
                "帧缓冲扩容到 {} 字节失败: {}",
                wanted, e
            )));
        }
        Ok(())
    }

    fn start_ts(&mut self) -> VigilResult<()> {
        if self.ts.is_some() {
            return Ok(());
        }
        let mut demuxer = (self.ts_factory)();
        let id = demuxer.start_session()?;
        self.ts = Some(TsBinding { demuxer, id });
        Ok(())
    }

    fn stop_ts(&mut self) {
        if let Some(mut binding) = self.ts.take() {
            binding.demuxer.stop_session(binding.id);
        }
    }

    // ========================
    // 帧交付
    // ========================

    /// 当前分段数据对应的编码
    fn frame_codec(&self) -> CodecId {
        match self.part_media {
            MediaType::Audio => self.meta.audio_codec,
            MediaType::Video | MediaType::Image => self.meta.video_codec,
            MediaType::Text | MediaType::Application => CodecId::None,
            MediaType::Unknown if self.meta.video_codec != CodecId::None => self.meta.video_codec,
            MediaType::Unknown => self.meta.audio_codec,
        }
    }

    /// 分类, 修正并交付一帧完整数据
    fn emit_frame(&mut self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        let codec = self.frame_codec();
        let media = if self.part_media.is_known() {
            self.part_media
        } else {
            codec.media_type()
        }
        .stream_category();

        let info = parse_frame_header(codec, &data);
        self.meta.update(&info);

        let (frame_type, data) = match codec {
            CodecId::H265 => match self.hevc.push(data, &info) {
                HevcPush::Held => return,
                HevcPush::Dropped => {
                    warn!("会话 {}: 丢弃没有首切片的 HEVC 数据", self.handle);
                    self.stats.frames_dropped += 1;
                    return;
                }
                HevcPush::Flushed(picture) => (picture.frame_type, picture.data),
            },
            CodecId::Aac => match &self.meta.aac {
                Some(cfg) => match emit::rewrap_aac(cfg, &data, self.config.aac_header_len) {
                    Ok(out) => (info.frame_type, out),
                    Err(e) => {
                        warn!("会话 {}: 丢弃 AAC 帧: {}", self.handle, e);
                        self.stats.frames_dropped += 1;
                        return;
                    }
                },
                None => (info.frame_type, data),
            },
            c if c.is_big_endian_pcm() => (
                info.frame_type,
                emit::swap_pcm_pairs(data, self.config.pcm_header_len),
            ),
            _ => (info.frame_type, data),
        };
        if data.is_empty() {
            return;
        }

        let mut frame = EncodedFrame::new(media, codec, data);
        frame.frame_type = frame_type;
        match media {
            MediaType::Video => {
                frame.width = self.meta.width;
                frame.height = self.meta.height;
                frame.ref_frames = self.meta.ref_frames;
            }
            MediaType::Audio => {
                frame.sample_rate = self.meta.sample_rate.or(codec.default_sample_rate());
            }
            _ => {}
        }
        self.deliver(frame);
    }

    /// 交付子解封装器已分类的帧, 不再重新解析
    fn deliver_ts_frame(&mut self, mut frame: EncodedFrame) {
        match frame.media_type {
            MediaType::Video => {
                self.meta.video_codec = frame.codec_id;
                if let (Some(w), Some(h)) = (frame.width, frame.height) {
                    self.meta.width = Some(w);
                    self.meta.height = Some(h);
                } else {
                    frame.width = self.meta.width;
                    frame.height = self.meta.height;
                }
                if frame.ref_frames.is_some() {
                    self.meta.ref_frames = frame.ref_frames;
                }
            }
            MediaType::Audio => {
                self.meta.audio_codec = frame.codec_id;
                frame.sample_rate = frame.sample_rate.or(self.meta.sample_rate);
            }
            _ => {}
        }
        self.deliver(frame);
    }

    fn deliver(&mut self, frame: EncodedFrame) {
        debug!(
            "会话 {}: 帧 {} {} {} 字节",
            self.handle,
            frame.codec_id,
            frame.frame_type,
            frame.len()
        );
        self.stats.frames_emitted += 1;
        self.sink.on_event(self.handle, SessionEvent::Frame(frame));
    }

    // ========================
    // 关闭
    // ========================

    /// 关闭会话, 重复调用无效果
    pub fn close(&mut self, status: CloseStatus) {
        self.close_with(status, None);
    }

    fn close_with(&mut self, status: CloseStatus, http_status: Option<u16>) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.carry = Vec::new();
        self.frame = Vec::new();
        self.sniff = Vec::new();
        if self.hevc.discard_pending() {
            self.stats.frames_dropped += 1;
        }
        self.stop_ts();
        info!(
            "会话 {}: 关闭 {:?}, 交付 {} 帧, 丢弃 {} 帧, 消耗 {} 字节",
            self.handle,
            status,
            self.stats.frames_emitted,
            self.stats.frames_dropped,
            self.stats.bytes_consumed
        );
        self.sink.on_event(
            self.handle,
            SessionEvent::Closed {
                status,
                http_status,
            },
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close(CloseStatus::ConnectionClosed);
    }
}
