//! 分块传输: 数据交给 TS 子解封装器, 反复取帧直到取空.

use vigil_core::{VigilError, VigilResult};

use super::Session;

impl Session {
    pub(super) fn parse_multi_chunk(&mut self, data: &[u8]) -> VigilResult<usize> {
        let Some(mut binding) = self.ts.take() else {
            return Err(VigilError::SubDemuxer("TS 子会话未启动".into()));
        };

        let mut off = 0;
        let result = loop {
            match binding.demuxer.parse_chunk(binding.id, &data[off..]) {
                Ok((consumed, frame)) => {
                    off = (off + consumed).min(data.len());
                    match frame {
                        Some(frame) => self.deliver_ts_frame(frame),
                        None => break Ok(off),
                    }
                }
                Err(e @ VigilError::SubDemuxer(_)) => break Err(e),
                Err(e) => break Err(VigilError::SubDemuxer(e.to_string())),
            }
        };

        self.ts = Some(binding);
        result
    }
}
