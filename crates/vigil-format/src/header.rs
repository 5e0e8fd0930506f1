//! HTTP 响应头与 multipart 分段头的行级解析.
//!
//! 这里只做无状态的文本提取, 由会话决定如何应用结果.

use vigil_codec::CodecId;
use vigil_core::{MediaType, VigilError, VigilResult};

/// 分段边界标记前缀
pub const BOUNDARY_MARKER: &[u8] = b"--";

/// 关注的头部字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    ContentType,
    ContentLength,
    TransferEncoding,
    Other,
}

impl HeaderField {
    /// 按名称分类, 大小写不敏感
    ///
    /// 内容长度接受 `Content-Length` 和 `Content_Length` 两种写法.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case("content-type") {
            Self::ContentType
        } else if name.eq_ignore_ascii_case("content-length")
            || name.eq_ignore_ascii_case("content_length")
        {
            Self::ContentLength
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            Self::TransferEncoding
        } else {
            Self::Other
        }
    }
}

/// 解析后的 Content-Type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentType {
    /// 主类型推导出的媒体类别, multipart 时为 Unknown
    pub media_type: MediaType,
    /// 子类型原文
    pub subtype: String,
    /// 子类型推导出的编码
    pub codec_id: CodecId,
    /// 是否为 multipart
    pub is_multipart: bool,
    /// 规范化后的边界串 (以 `--` 开头)
    pub boundary: Option<Vec<u8>>,
    /// `rate=` 参数 (音频采样率)
    pub rate: Option<u32>,
    /// `config=` 参数 (AAC 十六进制配置串)
    pub config: Option<String>,
}

/// 解析状态行 `HTTP/1.1 200 OK`, 返回状态码
///
/// 不是状态行时返回 `None`.
pub fn parse_status_line(line: &str) -> Option<u16> {
    let line = line.trim();
    if !line
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("HTTP/"))
    {
        return None;
    }
    line.split_ascii_whitespace().nth(1)?.parse().ok()
}

/// 把 `Name: value` 拆成名称和值
pub fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

/// 解析内容长度
pub fn parse_content_length(value: &str) -> VigilResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| VigilError::InvalidData(format!("无法解析的内容长度: {:?}", value)))
}

/// 规范化边界串: 去掉引号, 保证以 `--` 开头, 截断到 `max_len` 字节
pub fn normalize_boundary(raw: &[u8], max_len: usize) -> Option<Vec<u8>> {
    let raw = trim_ascii(raw);
    let raw = raw
        .strip_prefix(b"\"")
        .and_then(|r| r.strip_suffix(b"\""))
        .unwrap_or(raw);
    if raw.is_empty() || raw == BOUNDARY_MARKER {
        return None;
    }
    let mut boundary = Vec::with_capacity(raw.len() + BOUNDARY_MARKER.len());
    if !raw.starts_with(BOUNDARY_MARKER) {
        boundary.extend_from_slice(BOUNDARY_MARKER);
    }
    boundary.extend_from_slice(raw);
    boundary.truncate(max_len);
    Some(boundary)
}

/// 解析 Content-Type 值, 如 `multipart/x-mixed-replace; boundary=frame`
/// 或 `audio/L16; rate=16000`
pub fn parse_content_type(value: &str, max_boundary_len: usize) -> VigilResult<ContentType> {
    let mut params = value.split(';');
    let mime = params.next().unwrap_or("").trim();
    let (main, subtype) = mime
        .split_once('/')
        .ok_or_else(|| VigilError::InvalidData(format!("Content-Type 缺少子类型: {:?}", mime)))?;

    let is_multipart = main.trim().eq_ignore_ascii_case("multipart");
    let media_type = MediaType::from_mime_main(main);
    let mut ct = ContentType {
        media_type,
        subtype: subtype.trim().to_string(),
        codec_id: CodecId::from_mime(media_type, subtype),
        is_multipart,
        ..ContentType::default()
    };

    for param in params {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();
        if key.eq_ignore_ascii_case("boundary") {
            ct.boundary = normalize_boundary(val.as_bytes(), max_boundary_len);
        } else if key.eq_ignore_ascii_case("rate") {
            ct.rate = val.trim_matches('"').parse().ok();
        } else if key.eq_ignore_ascii_case("config") {
            ct.config = Some(val.trim_matches('"').to_string());
        }
    }
    Ok(ct)
}

/// 在嗅探缓冲区中查找以 `--` 开头且已经完整结束的行
pub fn sniff_boundary(buf: &[u8], max_len: usize) -> Option<Vec<u8>> {
    let mut rest = buf;
    while let Some(nl) = rest.iter().position(|&b| b == b'\n') {
        let line = trim_ascii(&rest[..nl]);
        if line.starts_with(BOUNDARY_MARKER) {
            if let Some(b) = normalize_boundary(line, max_len) {
                return Some(b);
            }
        }
        rest = &rest[nl + 1..];
    }
    None
}

/// 在 `haystack` 中查找 `needle` 的首个完整匹配
pub fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_ascii(mut s: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = s {
        if first.is_ascii_whitespace() {
            s = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = s {
        if last.is_ascii_whitespace() {
            s = rest;
        } else {
            break;
        }
    }
    s
}
