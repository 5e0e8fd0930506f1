//! # vigil-core
//!
//! Vigil 网络录像机码流接入前端的核心库, 提供基础类型定义、错误处理和比特流读取.
//!
//! 上层的 `vigil-codec` (编码头解析) 和 `vigil-format` (传输分帧) 都构建在本 crate 之上.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod media_type;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{VigilError, VigilResult};
pub use media_type::MediaType;
