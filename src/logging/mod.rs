//! 日志初始化.
//!
//! 控制台与文件两路输出, 文件按天滚动并经由非阻塞写入器落盘.
//! 各库 crate 通过 `log` 门面输出的记录由订阅器桥接进来.
//! 环境变量 `VIGIL_LOG` 覆盖文件输出的过滤规则.

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// 覆盖文件过滤规则的环境变量
pub const LOG_ENV: &str = "VIGIL_LOG";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 文件输出级别 (EnvFilter 语法)
    pub level: String,
    /// 控制台输出级别
    pub console_level: String,
    /// 日志目录, 为空时只输出到控制台
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_level: "info".to_string(),
            directory: None,
            file_prefix: "vigil".to_string(),
        }
    }
}

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// 安装全局订阅器, 进程内只能成功一次
pub fn init(config: &LoggingConfig) -> Result<()> {
    let console_filter = EnvFilter::try_new(&config.console_level)
        .with_context(|| format!("无效的控制台日志级别: {}", config.console_level))?;
    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(console_filter);

    let file_parts = match &config.directory {
        Some(directory) => Some(file_output(config, Path::new(directory))?),
        None => None,
    };
    let file_layer = file_parts.map(|(writer, filter)| {
        fmt::Layer::default()
            .with_writer(writer)
            .with_ansi(false)
            .event_format(FileFormatter)
            .with_filter(filter)
    });

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("日志系统已初始化")?;
    Ok(())
}

/// 创建按天滚动的非阻塞写入器及其过滤规则
fn file_output(config: &LoggingConfig, directory: &Path) -> Result<(NonBlocking, EnvFilter)> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("创建日志目录失败, path={}", directory.display()))?;

    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::try_new(&directives)
            .with_context(|| format!("无效的 {} 过滤规则: {}", LOG_ENV, directives))?,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("无效的文件日志级别: {}", config.level))?,
    };

    let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    LOG_GUARD.set(guard).ok();
    Ok((writer, filter))
}

struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}:{:02}:{:02}.{:03}] ",
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis()
        )?;
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(
            writer,
            "{}{:5}\x1b[0m {} > ",
            color,
            meta.level().to_string(),
            meta.target()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {:5} {}:{} > ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            meta.level().to_string(),
            meta.file().unwrap_or("unknown"),
            meta.line().unwrap_or(0)
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
