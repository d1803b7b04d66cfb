// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 日志初始化：配置了 `log_config` 时直接加载 log4rs 的 YAML 文件，
//! 否则按 `log` 与 `log_level` 在代码中组装。

use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
        Append,
    },
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};

use crate::config::Config;
use crate::exception::Exception;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

pub fn parse_level(level: &str) -> Result<LevelFilter, Exception> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| Exception::LoggerSetup(format!("unknown log level `{}`", level)))
}

/// 按配置组装 log4rs 配置，`log` 为空时输出到标准错误
pub fn build(config: &Config) -> Result<LogConfig, Exception> {
    let level = parse_level(config.log_level())?;
    let encoder = Box::new(PatternEncoder::new(PATTERN));
    let appender: Box<dyn Append> = match config.log() {
        Some(path) => Box::new(
            FileAppender::builder()
                .encoder(encoder)
                .build(path)
                .map_err(|e| Exception::LoggerSetup(format!("{}: {}", path.display(), e)))?,
        ),
        None => Box::new(
            ConsoleAppender::builder()
                .encoder(encoder)
                .target(Target::Stderr)
                .build(),
        ),
    };

    LogConfig::builder()
        .appender(Appender::builder().build("main", appender))
        .build(Root::builder().appender("main").build(level))
        .map_err(|e| Exception::LoggerSetup(e.to_string()))
}

pub fn init(config: &Config) -> Result<(), Exception> {
    if let Some(path) = config.log_config() {
        return log4rs::init_file(path, Default::default())
            .map_err(|e| Exception::LoggerSetup(format!("{}: {}", path.display(), e)));
    }
    log4rs::init_config(build(config)?)
        .map(|_| ())
        .map_err(|e| Exception::LoggerSetup(e.to_string()))
}
