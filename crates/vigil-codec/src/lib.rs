//! # vigil-codec
//!
//! 编码层: 编码标识, 帧分类结果, 以及各编码的帧头解析器.
//!
//! 解析器只读取压缩码流的头部字段 (NAL 头, SPS, VOL, SOF0, AudioSpecificConfig),
//! 给出帧类型与分辨率, 不做任何解码.
//!
//! ## 使用示例
//!
//! ```rust
//! use vigil_codec::{CodecId, FrameType, parse_frame_header};
//!
//! // H.264 IDR 切片: first_mb=0, slice_type=7 (I)
//! let data = [0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x80];
//! let info = parse_frame_header(CodecId::H264, &data);
//! assert_eq!(info.frame_type, FrameType::I);
//! ```

pub mod codec_id;
pub mod frame;
pub mod parsers;

// 重导出常用类型
pub use codec_id::CodecId;
pub use frame::{EncodedFrame, FrameInfo, FrameType};
pub use parsers::parse_frame_header;
