//! # vigil-format
//!
//! Vigil 码流接入前端的分帧层.
//!
//! 识别传输分帧方式 (multipart, 单段, 单次响应, 分块承载的 MPEG-TS),
//! 从任意切分的读取中重组出完整的音视频帧, 附上编码元数据后交给回调.

pub mod config;
pub mod demuxer;
pub mod emit;
pub mod framing;
pub mod header;
pub mod mpegts;
pub mod session;
pub mod sink;
pub mod table;

// 重导出常用类型
pub use config::DemuxConfig;
pub use demuxer::StreamDemuxer;
pub use framing::FramingKind;
pub use mpegts::{TsDemuxer, TsFactory, TsSessionId, TsSubDemuxer};
pub use session::{Session, SessionInfo, SessionStats};
pub use sink::{CloseStatus, FrameSink, SessionEvent};
pub use table::{SessionHandle, SessionTable};
