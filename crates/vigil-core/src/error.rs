//! 统一错误类型定义.
//!
//! 所有 Vigil crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Vigil 统一错误类型
#[derive(Debug, Error)]
pub enum VigilError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏或格式错误的码流)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 缓冲区扩容失败
    #[error("内存分配失败: {0}")]
    OutOfMemory(String),

    /// 跨读取的不完整头部超出暂存区上限
    #[error("头部暂存区溢出: {len} 字节, 上限 {max} 字节")]
    HeaderOverflow { len: usize, max: usize },

    /// 未找到会话 (句柄无效或已过期)
    #[error("未找到会话: 句柄 {0:#010X}")]
    SessionNotFound(u32),

    /// 会话表已满
    #[error("会话表已满: 上限 {0}")]
    SessionTableFull(usize),

    /// 会话已关闭
    #[error("会话已关闭")]
    SessionClosed,

    /// 服务端返回非成功状态码
    #[error("响应状态码异常: {0}")]
    ResponseStatus(u16),

    /// MPEG-TS 子解封装器错误
    #[error("TS 子解封装器错误: {0}")]
    SubDemuxer(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// Vigil 统一 Result 类型
pub type VigilResult<T> = Result<T, VigilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VigilError::HeaderOverflow { len: 5000, max: 4096 };
        let msg = format!("{err}");
        assert!(msg.contains("5000"), "错误信息应包含长度, actual={msg}");
        assert!(msg.contains("4096"), "错误信息应包含上限, actual={msg}");

        let err = VigilError::SessionNotFound(0x0001_0002);
        assert_eq!(format!("{err}"), "未找到会话: 句柄 0x00010002");
    }
}
