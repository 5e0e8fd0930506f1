//! # Vigil
//!
//! 网络录像机的码流接入前端: 从摄像机持续到达的字节流中重组出边界正确的
//! 音视频帧, 并附上编码元数据 (帧类型, 分辨率, 参考帧数, 采样率).
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use vigil::format::{DemuxConfig, SessionEvent, SessionHandle, StreamDemuxer};
//!
//! let mut demuxer = StreamDemuxer::new(DemuxConfig::default()).unwrap();
//! let handle = demuxer
//!     .open_session(|_: SessionHandle, event: SessionEvent| {
//!         if let SessionEvent::Frame(frame) = event {
//!             println!("{} {} {} 字节", frame.codec_id, frame.frame_type, frame.len());
//!         }
//!     })
//!     .unwrap();
//! demuxer.parse_header(handle, b"HTTP/1.1 200 OK\r\n").unwrap();
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `vigil-core` | 位读取器, 错误类型, 媒体类别 |
//! | `vigil-codec` | 编码标识与编码头解析 |
//! | `vigil-format` | 传输分帧与帧重组 |

/// 核心类型与工具
pub use vigil_core as core;

/// 编码头解析
pub use vigil_codec as codec;

/// 传输分帧
pub use vigil_format as format;

pub mod config;
pub mod logging;

/// 获取 Vigil 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
