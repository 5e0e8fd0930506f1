//! 编解码器标识符.
//!
//! 为 IP 摄像机码流中出现的每种编码算法分配唯一标识, 并负责从 HTTP `Content-Type`
//! 的子类型推导编码.

use std::fmt;
use vigil_core::MediaType;

/// 编解码器标识符
///
/// 唯一标识一种编码算法, 与传输分帧方式无关.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    #[default]
    None,

    // ========================
    // 视频编解码器
    // ========================
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// MPEG-4 Part 2 Visual
    Mpeg4,
    /// Motion JPEG
    Mjpeg,

    // ========================
    // 音频编解码器
    // ========================
    /// AAC (Advanced Audio Coding)
    Aac,
    /// G.711 µ-law
    PcmMulaw,
    /// G.711 A-law
    PcmAlaw,
    /// RFC 3551 L16 (16 位大端 PCM)
    PcmL16,
    /// 16 位有符号大端 PCM
    PcmS16be,
    /// G.726 ADPCM
    G726,
}

impl CodecId {
    /// 获取编解码器对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::None => MediaType::Unknown,
            Self::H264 | Self::H265 | Self::Mpeg4 | Self::Mjpeg => MediaType::Video,
            Self::Aac
            | Self::PcmMulaw
            | Self::PcmAlaw
            | Self::PcmL16
            | Self::PcmS16be
            | Self::G726 => MediaType::Audio,
        }
    }

    /// 获取编解码器的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::H264 => "h264",
            Self::H265 => "hevc",
            Self::Mpeg4 => "mpeg4",
            Self::Mjpeg => "mjpeg",
            Self::Aac => "aac",
            Self::PcmMulaw => "pcm_mulaw",
            Self::PcmAlaw => "pcm_alaw",
            Self::PcmL16 => "pcm_l16",
            Self::PcmS16be => "pcm_s16be",
            Self::G726 => "g726",
        }
    }

    /// 是否为需要交换字节对的大端 PCM
    pub const fn is_big_endian_pcm(&self) -> bool {
        matches!(self, Self::PcmL16 | Self::PcmS16be)
    }

    /// 从 MIME 类型推导编码, 如 `("video", "H264")`, `("audio", "mpeg4-generic")`
    ///
    /// 子类型大小写不敏感, 允许带 `x-` 前缀. 无法识别时返回 [`CodecId::None`].
    pub fn from_mime(media_type: MediaType, subtype: &str) -> Self {
        let sub = subtype.trim().to_ascii_lowercase();
        let sub = sub.strip_prefix("x-").unwrap_or(&sub);
        match media_type {
            MediaType::Video => match sub {
                "h264" | "avc" | "h264-stream" => Self::H264,
                "h265" | "hevc" | "h265-stream" => Self::H265,
                "mpeg4" | "mp4v-es" | "mp4v" | "m4v" => Self::Mpeg4,
                "mjpeg" | "motion-jpeg" | "jpeg" | "mjpg" => Self::Mjpeg,
                _ => Self::None,
            },
            MediaType::Image => match sub {
                "jpeg" | "jpg" | "pjpeg" => Self::Mjpeg,
                _ => Self::None,
            },
            MediaType::Audio => match sub {
                "aac" | "mpeg4-generic" | "aac-adts" | "mp4a-latm" => Self::Aac,
                "basic" | "pcmu" | "g711u" | "g711" | "mulaw" => Self::PcmMulaw,
                "pcma" | "g711a" | "alaw" => Self::PcmAlaw,
                "l16" => Self::PcmL16,
                "pcm-s16be" | "s16be" => Self::PcmS16be,
                "g726" | "g726-16" | "g726-24" | "g726-32" | "g726-40" => Self::G726,
                _ => Self::None,
            },
            MediaType::Text | MediaType::Application | MediaType::Unknown => Self::None,
        }
    }

    /// 编码的默认采样率 (未在 `rate=` 参数中声明时使用)
    pub const fn default_sample_rate(&self) -> Option<u32> {
        match self {
            Self::PcmMulaw | Self::PcmAlaw | Self::G726 => Some(8000),
            _ => None,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime_video() {
        assert_eq!(CodecId::from_mime(MediaType::Video, "H264"), CodecId::H264);
        assert_eq!(CodecId::from_mime(MediaType::Video, "x-h264"), CodecId::H264);
        assert_eq!(CodecId::from_mime(MediaType::Video, "HEVC"), CodecId::H265);
        assert_eq!(CodecId::from_mime(MediaType::Video, "MP4V-ES"), CodecId::Mpeg4);
        assert_eq!(
            CodecId::from_mime(MediaType::Video, "x-motion-jpeg"),
            CodecId::Mjpeg
        );
        assert_eq!(CodecId::from_mime(MediaType::Video, "vp8"), CodecId::None);
    }

    #[test]
    fn test_from_mime_image_and_audio() {
        assert_eq!(CodecId::from_mime(MediaType::Image, "jpeg"), CodecId::Mjpeg);
        assert_eq!(
            CodecId::from_mime(MediaType::Audio, "mpeg4-generic"),
            CodecId::Aac
        );
        assert_eq!(CodecId::from_mime(MediaType::Audio, "basic"), CodecId::PcmMulaw);
        assert_eq!(CodecId::from_mime(MediaType::Audio, "PCMA"), CodecId::PcmAlaw);
        assert_eq!(CodecId::from_mime(MediaType::Audio, "L16"), CodecId::PcmL16);
        assert_eq!(
            CodecId::from_mime(MediaType::Audio, "x-pcm-s16be"),
            CodecId::PcmS16be
        );
        assert_eq!(CodecId::from_mime(MediaType::Text, "plain"), CodecId::None);
    }

    #[test]
    fn test_media_type_and_pcm_flags() {
        assert_eq!(CodecId::H265.media_type(), MediaType::Video);
        assert_eq!(CodecId::G726.media_type(), MediaType::Audio);
        assert_eq!(CodecId::None.media_type(), MediaType::Unknown);
        assert!(CodecId::PcmL16.is_big_endian_pcm());
        assert!(CodecId::PcmS16be.is_big_endian_pcm());
        assert!(!CodecId::PcmMulaw.is_big_endian_pcm());
        assert_eq!(CodecId::PcmMulaw.default_sample_rate(), Some(8000));
        assert_eq!(CodecId::Aac.default_sample_rate(), None);
    }
}
