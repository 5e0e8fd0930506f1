//! vigil-probe - 码流探测工具
//!
//! 读取一份录制下来的原始 HTTP 响应 (状态行 + 头部 + 响应体),
//! 按网络读取的方式分块回放给分帧器, 输出重组出的每一帧.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;

use vigil::config::{VigilConfig, load_config};
use vigil_codec::EncodedFrame;
use vigil_format::{
    CloseStatus, DemuxConfig, SessionEvent, SessionHandle, SessionInfo, StreamDemuxer,
};

/// Vigil 码流探测工具
#[derive(Parser, Debug)]
#[command(name = "vigil-probe", version, about = "回放录制的 HTTP 响应并列出重组出的帧")]
struct Cli {
    /// 录制的原始响应文件
    input: PathBuf,

    /// 每次投递的字节数, 模拟网络分块
    #[arg(long, default_value_t = 1400)]
    chunk_size: usize,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

// ============================================================
// 输出结构体
// ============================================================

#[derive(Serialize)]
struct FrameRecord {
    index: usize,
    media_type: String,
    codec: String,
    frame_type: String,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
}

impl FrameRecord {
    fn new(index: usize, frame: &EncodedFrame) -> Self {
        Self {
            index,
            media_type: frame.media_type.to_string(),
            codec: frame.codec_id.to_string(),
            frame_type: frame.frame_type.to_string(),
            size: frame.len(),
            width: frame.width,
            height: frame.height,
            ref_frames: frame.ref_frames,
            sample_rate: frame.sample_rate,
        }
    }
}

struct ProbeOutput {
    framing: String,
    http_status: Option<u16>,
    boundary: Option<String>,
    close_status: String,
    frames_emitted: u64,
    frames_dropped: u64,
    bytes_consumed: u64,
    frames: Vec<FrameRecord>,
}

impl ProbeOutput {
    fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "framing": self.framing,
            "http_status": self.http_status,
            "boundary": self.boundary,
            "close_status": self.close_status,
            "frames_emitted": self.frames_emitted,
            "frames_dropped": self.frames_dropped,
            "bytes_consumed": self.bytes_consumed,
        })
    }
}

// ============================================================
// 主逻辑
// ============================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => VigilConfig::default(),
    };
    if cli.verbose {
        config.logging.console_level = "debug".to_string();
    }
    vigil::logging::init(&config.logging)?;

    let output = replay(&cli.input, cli.chunk_size, config.demux)?;
    if cli.json {
        // 每帧一行, 最后一行为会话汇总
        for frame in &output.frames {
            println!("{}", serde_json::to_string(frame)?);
        }
        println!("{}", serde_json::to_string(&output.summary())?);
    } else {
        print_text(&output);
    }
    Ok(())
}

/// 读取录制文件, 以 `chunk_size` 字节为单位回放给一个新会话
fn replay(input: &Path, chunk_size: usize, demux: DemuxConfig) -> Result<ProbeOutput> {
    if chunk_size == 0 {
        bail!("--chunk-size 必须大于 0");
    }
    let raw = std::fs::read(input)
        .with_context(|| format!("无法读取输入文件, path={}", input.display()))?;
    let (head, body) = split_response(&raw).context("输入中未找到响应头结束标记")?;

    let (tx, rx) = mpsc::channel::<SessionEvent>();
    let mut demuxer = StreamDemuxer::new(demux)?;
    let handle = demuxer.open_session(move |_: SessionHandle, event: SessionEvent| {
        // 接收端先于会话释放时发送失败, 无需处理
        let _ = tx.send(event);
    })?;
    tracing::info!("打开会话 {}, 响应头 {} 字节, 响应体 {} 字节", handle, head.len(), body.len());

    let mut failed = false;
    for line in head.split(|&b| b == b'\n') {
        if let Err(e) = demuxer.parse_header(handle, line) {
            tracing::warn!("响应头处理失败: {}", e);
            failed = true;
            break;
        }
    }
    if !failed {
        for chunk in body.chunks(chunk_size) {
            if let Err(e) = demuxer.parse_data(handle, chunk) {
                tracing::warn!("响应体处理失败: {}", e);
                break;
            }
        }
    }

    let info: SessionInfo = demuxer.session(handle)?.info();
    let stats = demuxer.close_session(handle, CloseStatus::Success)?;

    let mut frames = Vec::new();
    let mut close_status = String::from("unknown");
    for event in rx.try_iter() {
        match event {
            SessionEvent::Frame(frame) => frames.push(FrameRecord::new(frames.len(), &frame)),
            SessionEvent::Closed { status, .. } => close_status = format!("{status:?}"),
        }
    }

    Ok(ProbeOutput {
        framing: info.framing.to_string(),
        http_status: info.http_status,
        boundary: info.boundary,
        close_status,
        frames_emitted: stats.frames_emitted,
        frames_dropped: stats.frames_dropped,
        bytes_consumed: stats.bytes_consumed,
        frames,
    })
}

/// 在第一个空行处切分响应头与响应体, 空行本身归入响应头
fn split_response(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut line_start = 0;
    for (i, &b) in raw.iter().enumerate() {
        if b != b'\n' {
            continue;
        }
        let line = &raw[line_start..i];
        if line.is_empty() || line == b"\r" {
            return Some((&raw[..line_start], &raw[i + 1..]));
        }
        line_start = i + 1;
    }
    None
}

fn print_text(output: &ProbeOutput) {
    println!("[SESSION]");
    println!("  分帧方式     : {}", output.framing);
    if let Some(status) = output.http_status {
        println!("  状态码       : {status}");
    }
    if let Some(ref boundary) = output.boundary {
        println!("  边界         : {boundary}");
    }
    println!("  关闭状态     : {}", output.close_status);
    println!("  交付帧数     : {}", output.frames_emitted);
    println!("  丢弃帧数     : {}", output.frames_dropped);
    println!("  消耗字节     : {}", output.bytes_consumed);
    println!("[/SESSION]");
    println!();

    for frame in &output.frames {
        let mut line = format!(
            "#{:<5} {:<6} {:<10} {:<4} {:>8} 字节",
            frame.index, frame.media_type, frame.codec, frame.frame_type, frame.size
        );
        if let (Some(w), Some(h)) = (frame.width, frame.height) {
            line.push_str(&format!("  {w}x{h}"));
        }
        if let Some(refs) = frame.ref_frames {
            line.push_str(&format!("  ref={refs}"));
        }
        if let Some(rate) = frame.sample_rate {
            line.push_str(&format!("  {rate} Hz"));
        }
        println!("{line}");
    }
}
