//! 分帧层配置.
//!
//! 所有上限都可以通过 JSON 配置覆盖, 缺省字段使用默认值.

use serde::{Deserialize, Serialize};
use vigil_core::{VigilError, VigilResult};

/// 分帧层配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// multipart 边界串最大长度 (含前导 `--`), 超出部分被截断
    pub max_boundary_len: usize,
    /// 跨读取暂存的不完整头部行上限, 超出即为致命错误
    pub max_header_size: usize,
    /// 分帧方式未知时嗅探的最大字节数
    pub sniff_size: usize,
    /// 单帧最大字节数
    pub max_frame_size: usize,
    /// AAC 配置最大字节数
    pub max_aac_config_len: usize,
    /// AAC 帧前需剥离的定长头部 (ADTS)
    pub aac_header_len: usize,
    /// 大端 PCM 帧前需剥离的定长头部
    pub pcm_header_len: usize,
    /// 认证质询状态码
    pub auth_challenge_status: u16,
    /// 成功状态码下界 (含)
    pub success_status_min: u16,
    /// 成功状态码上界 (含)
    pub success_status_max: u16,
    /// 会话表容量
    pub max_sessions: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            max_boundary_len: 72,
            max_header_size: 4096,
            sniff_size: 512,
            max_frame_size: 16 * 1024 * 1024,
            max_aac_config_len: 64,
            aac_header_len: 7,
            pcm_header_len: 0,
            auth_challenge_status: 401,
            success_status_min: 200,
            success_status_max: 299,
            max_sessions: 64,
        }
    }
}

impl DemuxConfig {
    /// 校验配置, 拒绝为 0 或上下界颠倒的上限
    pub fn validate(&self) -> VigilResult<()> {
        let non_zero = [
            ("max_boundary_len", self.max_boundary_len),
            ("max_header_size", self.max_header_size),
            ("sniff_size", self.sniff_size),
            ("max_frame_size", self.max_frame_size),
            ("max_aac_config_len", self.max_aac_config_len),
            ("max_sessions", self.max_sessions),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(VigilError::InvalidArgument(format!("{} 不能为 0", name)));
            }
        }
        // 边界串至少要容纳 `--` 和一个字符
        if self.max_boundary_len < 3 {
            return Err(VigilError::InvalidArgument(format!(
                "max_boundary_len 过小: {}",
                self.max_boundary_len
            )));
        }
        if self.success_status_min > self.success_status_max {
            return Err(VigilError::InvalidArgument(format!(
                "成功状态码范围颠倒: {}..={}",
                self.success_status_min, self.success_status_max
            )));
        }
        // 句柄的槽位索引只有 16 位
        if self.max_sessions > usize::from(u16::MAX) {
            return Err(VigilError::InvalidArgument(format!(
                "max_sessions 超出上限: {}",
                self.max_sessions
            )));
        }
        Ok(())
    }

    /// 状态码是否属于成功范围
    pub fn is_success(&self, status: u16) -> bool {
        (self.success_status_min..=self.success_status_max).contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = DemuxConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.is_success(200));
        assert!(cfg.is_success(299));
        assert!(!cfg.is_success(300));
        assert!(!cfg.is_success(401));
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let cfg = DemuxConfig {
            max_header_size: 0,
            ..DemuxConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = DemuxConfig {
            success_status_min: 300,
            success_status_max: 200,
            ..DemuxConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = DemuxConfig {
            max_sessions: 70000,
            ..DemuxConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: DemuxConfig = serde_json::from_str(r#"{"sniff_size": 1024}"#).unwrap();
        assert_eq!(cfg.sniff_size, 1024);
        assert_eq!(cfg.max_boundary_len, 72);
        assert_eq!(cfg.auth_challenge_status, 401);
    }
}
