//! 按句柄寻址的流分帧器.
//!
//! [`StreamDemuxer`] 持有会话表, 传输层通过句柄投递响应头和响应体.
//! 需要在独立线程上驱动会话时, 可以用 [`StreamDemuxer::take_session`] 借出,
//! 完成后用 [`StreamDemuxer::restore_session`] 归还.

use std::sync::Arc;

use log::debug;
use vigil_core::VigilResult;

use crate::config::DemuxConfig;
use crate::mpegts::{self, TsFactory};
use crate::session::{Session, SessionStats};
use crate::sink::{CloseStatus, FrameSink};
use crate::table::{SessionHandle, SessionTable};

/// 流分帧器
pub struct StreamDemuxer {
    config: Arc<DemuxConfig>,
    table: SessionTable<Session>,
    ts_factory: TsFactory,
}

impl StreamDemuxer {
    /// 创建分帧器, 配置先经过校验
    pub fn new(config: DemuxConfig) -> VigilResult<Self> {
        config.validate()?;
        let table = SessionTable::new(config.max_sessions);
        Ok(Self {
            config: Arc::new(config),
            table,
            ts_factory: mpegts::builtin_factory(),
        })
    }

    /// 替换 TS 子解封装器工厂, 影响之后创建的会话
    pub fn with_ts_factory(mut self, factory: TsFactory) -> Self {
        self.ts_factory = factory;
        self
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    /// 创建会话
    pub fn open_session(&mut self, sink: impl FrameSink + 'static) -> VigilResult<SessionHandle> {
        let config = Arc::clone(&self.config);
        let factory = Arc::clone(&self.ts_factory);
        let handle = self.table.insert_with(|handle| {
            Session::new(handle, config, Box::new(sink)).with_ts_factory(factory)
        })?;
        debug!("会话 {} 创建, 当前 {} 个会话", handle, self.table.len());
        Ok(handle)
    }

    /// 投递一行或多行响应头
    pub fn parse_header(&mut self, handle: SessionHandle, data: &[u8]) -> VigilResult<usize> {
        self.table.get_mut(handle)?.parse_header(data)
    }

    /// 投递一段响应体
    pub fn parse_data(&mut self, handle: SessionHandle, data: &[u8]) -> VigilResult<usize> {
        self.table.get_mut(handle)?.parse_data(data)
    }

    /// 关闭并移除会话, 返回最终统计
    pub fn close_session(
        &mut self,
        handle: SessionHandle,
        status: CloseStatus,
    ) -> VigilResult<SessionStats> {
        let mut session = self.table.remove(handle)?;
        session.close(status);
        Ok(session.stats())
    }

    pub fn session(&self, handle: SessionHandle) -> VigilResult<&Session> {
        self.table.get(handle)
    }

    pub fn session_mut(&mut self, handle: SessionHandle) -> VigilResult<&mut Session> {
        self.table.get_mut(handle)
    }

    /// 借出会话, 槽位保留
    pub fn take_session(&mut self, handle: SessionHandle) -> VigilResult<Session> {
        self.table.take(handle)
    }

    /// 归还借出的会话
    pub fn restore_session(&mut self, session: Session) -> VigilResult<()> {
        self.table.restore(session.handle(), session)
    }

    /// 借出的会话已在外部销毁, 释放其槽位
    pub fn release_session(&mut self, handle: SessionHandle) -> VigilResult<()> {
        self.table.release(handle)
    }

    /// 会话数 (含借出)
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// 驻留在表中的会话句柄
    pub fn handles(&self) -> Vec<SessionHandle> {
        self.table.handles().collect()
    }
}
