//! 集成测试公共辅助.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use vigil::codec::EncodedFrame;
use vigil::core::BitWriter;
use vigil::format::{CloseStatus, FrameSink, SessionEvent, SessionHandle, StreamDemuxer};

pub const BOUNDARY: &str = "myboundary";
pub const IDR: [u8; 7] = [0, 0, 0, 1, 0x65, 0x88, 0x80];
pub const P_SLICE: [u8; 7] = [0, 0, 0, 1, 0x41, 0x9A, 0x11];

/// 测试进程内只初始化一次的日志
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================
// 事件记录
// ============================================================

#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<SessionEvent>>>);

impl Recorder {
    pub fn frames(&self) -> Vec<EncodedFrame> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Frame(f) => Some(f.clone()),
                SessionEvent::Closed { .. } => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<(CloseStatus, Option<u16>)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Closed {
                    status,
                    http_status,
                } => Some((*status, *http_status)),
                SessionEvent::Frame(_) => None,
            })
            .collect()
    }
}

impl FrameSink for Recorder {
    fn on_event(&mut self, _handle: SessionHandle, event: SessionEvent) {
        self.0.lock().unwrap().push(event);
    }
}

// ============================================================
// 响应构造
// ============================================================

/// 逐行投递响应头
pub fn feed_headers(demuxer: &mut StreamDemuxer, handle: SessionHandle, lines: &[&str]) {
    for line in lines {
        let raw = format!("{line}\r\n");
        demuxer
            .parse_header(handle, raw.as_bytes())
            .unwrap_or_else(|e| panic!("响应头处理失败, line={line}, err={e}"));
    }
}

/// 打开一个已收到 multipart 响应头的会话
pub fn open_multipart(demuxer: &mut StreamDemuxer) -> (SessionHandle, Recorder) {
    let rec = Recorder::default();
    let handle = demuxer.open_session(rec.clone()).unwrap();
    let content_type = format!("Content-Type: multipart/x-mixed-replace; boundary={BOUNDARY}");
    feed_headers(demuxer, handle, &["HTTP/1.1 200 OK", &content_type]);
    (handle, rec)
}

/// 构造一个 multipart 分段, 可选声明 Content-Length
pub fn part(content_type: &str, payload: &[u8], with_length: bool) -> Vec<u8> {
    let mut out = format!("--{BOUNDARY}\r\nContent-Type: {content_type}\r\n").into_bytes();
    if with_length {
        out.extend_from_slice(format!("Content-Length: {}\r\n", payload.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n");
    out
}

// ============================================================
// 码流构造
// ============================================================

/// 插入防竞争字节
pub fn add_emulation_prevention(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + 4);
    let mut zeros = 0;
    for &b in rbsp {
        if zeros >= 2 && b <= 3 {
            out.push(0x03);
            zeros = 0;
        }
        out.push(b);
        zeros = if b == 0 { zeros + 1 } else { 0 };
    }
    out
}

/// 构造 Baseline SPS NAL (含起始码), 分辨率以宏块为单位, 不裁剪
pub fn h264_sps_nal(width_mbs: u32, height_mbs: u32, ref_frames: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(66, 8); // profile_idc
    bw.write_bits(0, 8);
    bw.write_bits(31, 8); // level_idc
    bw.write_ue(0); // sps_id
    bw.write_ue(0); // log2_max_frame_num_minus4
    bw.write_ue(0); // pic_order_cnt_type
    bw.write_ue(0); // log2_max_pic_order_cnt_lsb_minus4
    bw.write_ue(ref_frames);
    bw.write_flag(false); // gaps_in_frame_num_value_allowed_flag
    bw.write_ue(width_mbs - 1);
    bw.write_ue(height_mbs - 1);
    bw.write_flag(true); // frame_mbs_only_flag
    bw.write_flag(true); // direct_8x8_inference_flag
    bw.write_flag(false); // frame_cropping_flag
    bw.write_flag(false); // vui_parameters_present_flag
    bw.write_bit(1);
    let mut nal = vec![0x00, 0x00, 0x00, 0x01, 0x67];
    nal.extend(add_emulation_prevention(&bw.finish()));
    nal
}

/// 最小 JPEG: SOI + SOF0 + SOS + 熵编码数据 + EOI
pub fn jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
    data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    data.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// H.265 NAL (含起始码), 两字节 NAL 头
pub fn hevc_nal(type_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x00, 0x01, type_id << 1, 0x01];
    out.extend_from_slice(payload);
    out
}

// ============================================================
// MPEG-TS 构造
// ============================================================

pub const PMT_PID: u16 = 0x1000;
pub const VIDEO_PID: u16 = 0x0100;

/// 188 字节 TS 包, 不足部分用自适应域填充
pub fn ts_packet(pid: u16, pusi: bool, random_access: bool, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 182);
    let mut pkt = vec![0x47, (u8::from(pusi) << 6) | (pid >> 8) as u8, pid as u8, 0x30];
    let af_len = 183 - payload.len();
    pkt.push(af_len as u8);
    pkt.push(if random_access { 0x40 } else { 0x00 });
    pkt.resize(5 + af_len, 0xFF);
    pkt.extend_from_slice(payload);
    pkt
}

pub fn pes_payload(es: &[u8]) -> Vec<u8> {
    let mut pes = vec![0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x80, 0x80, 0x05];
    pes.extend_from_slice(&[0x21, 0x00, 0x01, 0x00, 0x01]);
    pes.extend_from_slice(es);
    pes
}

/// PAT + PMT(H.264) + IDR + P + IDR, 最后一个 PES 等待下一个起始包
pub fn h264_ts_stream() -> Vec<u8> {
    let pat = [
        0x00, 0x00, 0xB0, 13, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01,
        0xE0 | (PMT_PID >> 8) as u8, PMT_PID as u8, 0, 0, 0, 0,
    ];
    let pmt = [
        0x00, 0x02, 0xB0, 18, 0x00, 0x01, 0xC1, 0x00, 0x00,
        0xE0 | (VIDEO_PID >> 8) as u8, VIDEO_PID as u8, 0xF0, 0x00,
        0x1B, 0xE0 | (VIDEO_PID >> 8) as u8, VIDEO_PID as u8, 0xF0, 0x00,
        0, 0, 0, 0,
    ];
    let mut stream = ts_packet(0x0000, true, false, &pat);
    stream.extend(ts_packet(PMT_PID, true, false, &pmt));
    stream.extend(ts_packet(VIDEO_PID, true, true, &pes_payload(&IDR)));
    stream.extend(ts_packet(VIDEO_PID, true, false, &pes_payload(&P_SLICE)));
    stream.extend(ts_packet(VIDEO_PID, true, true, &pes_payload(&IDR)));
    stream
}
