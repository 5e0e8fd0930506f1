//! 帧回调与会话事件.

use vigil_codec::EncodedFrame;

use crate::table::SessionHandle;

/// 会话结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    /// 正常结束
    Success,
    /// 解析失败或服务端错误
    Error,
    /// 帧超时
    FrameTimeout,
    /// 连接关闭
    ConnectionClosed,
}

/// 交付给回调的会话事件
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// 完整的一帧, 数据所有权随事件转移
    Frame(EncodedFrame),
    /// 会话结束, 每个会话恰好一次
    Closed {
        status: CloseStatus,
        /// 导致结束的 HTTP 状态码
        http_status: Option<u16>,
    },
}

/// 帧回调
///
/// 回调对象本身就是调用方的私有数据.
pub trait FrameSink: Send {
    fn on_event(&mut self, handle: SessionHandle, event: SessionEvent);
}

impl<F> FrameSink for F
where
    F: FnMut(SessionHandle, SessionEvent) + Send,
{
    fn on_event(&mut self, handle: SessionHandle, event: SessionEvent) {
        self(handle, event)
    }
}
