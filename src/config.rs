// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exception::Exception;
use crate::param::DEFAULT_TEMPLATE;

/// HTTPS 强制级别
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// 从不重定向
    #[default]
    None,
    /// 只有受保护路由需要 HTTPS
    Secrets,
    /// 所有请求都需要 HTTPS
    All,
}

/// 缓存条目的存活策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    Disabled,
    Forever,
    Expire(Duration),
}

impl CacheTtl {
    /// 以分钟为单位：0 关闭缓存，负数表示永不过期，换算成秒溢出时同样视为永不过期。
    pub fn from_minutes(minutes: i64) -> Self {
        match minutes {
            0 => CacheTtl::Disabled,
            m if m < 0 => CacheTtl::Forever,
            m => match (m as u64).checked_mul(60) {
                Some(secs) => CacheTtl::Expire(Duration::from_secs(secs)),
                None => CacheTtl::Forever,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TlsConfig {
    #[serde(default = "default_tls_port")]
    port: u16,
    cert: PathBuf,
    key: PathBuf,
    #[serde(default)]
    required: Enforcement,
    /// 为 true 时不启动明文 HTTP 监听
    #[serde(default)]
    only: bool,
}

impl TlsConfig {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn cert(&self) -> &Path {
        &self.cert
    }

    pub fn key(&self) -> &Path {
        &self.key
    }

    pub fn required(&self) -> Enforcement {
        self.required
    }

    pub fn only(&self) -> bool {
        self.only
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    www_root: PathBuf,
    #[serde(default)]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default)]
    template: Option<PathBuf>,
    #[serde(default)]
    cache_ttl: i64,
    #[serde(default)]
    cache_size: usize,
    #[serde(default = "default_sweep_interval")]
    cache_sweep_interval: u64,
    #[serde(default)]
    log: Option<PathBuf>,
    #[serde(default)]
    log_config: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_streaming_threshold")]
    streaming_threshold: u64,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default)]
    secrets: HashMap<String, String>,
    #[serde(default)]
    tls: Option<TlsConfig>,
    /// 模板文件内容，加载配置时读入
    #[serde(skip)]
    template_source: String,
    /// 加载时被修正的配置项。此时日志尚未初始化，由调用方在初始化日志后输出
    #[serde(skip)]
    adjustments: Vec<String>,
}

fn default_port() -> u16 {
    80
}

fn default_tls_port() -> u16 {
    443
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_streaming_threshold() -> u64 {
    10485760 // 10MB
}

fn default_chunk_size() -> usize {
    262144 // 256KB
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: PathBuf::from("."),
            host: "localhost".to_string(),
            port: default_port(),
            local: true,
            worker_threads: num_cpus::get(),
            template: None,
            cache_ttl: 0,
            cache_size: 0,
            cache_sweep_interval: default_sweep_interval(),
            log: None,
            log_config: None,
            log_level: default_log_level(),
            streaming_threshold: default_streaming_threshold(),
            chunk_size: default_chunk_size(),
            secrets: HashMap::new(),
            tls: None,
            template_source: DEFAULT_TEMPLATE.to_string(),
            adjustments: Vec::new(),
        }
    }

    pub fn from_toml(filename: impl AsRef<Path>) -> Result<Self, Exception> {
        let filename = filename.as_ref();
        let source = fs::read_to_string(filename)
            .map_err(|e| Exception::ConfigUnreadable(format!("{}: {}", filename.display(), e)))?;
        let base = match filename.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base = fs::canonicalize(&base).unwrap_or(base);
        Self::parse(&source, &base)
    }

    /// 解析 TOML 文本，相对路径以 `base` 为基准。
    pub fn parse(source: &str, base: &Path) -> Result<Self, Exception> {
        let mut raw_config: Config =
            toml::from_str(source).map_err(|e| Exception::ConfigInvalid(e.to_string()))?;

        raw_config.www_root = absolutize(base, &raw_config.www_root);
        raw_config.template = raw_config.template.map(|t| absolutize(base, &t));
        raw_config.log = raw_config.log.map(|l| absolutize(base, &l));
        raw_config.log_config = raw_config.log_config.map(|l| absolutize(base, &l));
        if let Some(tls) = raw_config.tls.as_mut() {
            tls.cert = absolutize(base, &tls.cert);
            tls.key = absolutize(base, &tls.key);
        }

        if raw_config.host.is_empty() {
            raw_config.host = kernel_hostname();
        }
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.cache_sweep_interval == 0 {
            raw_config.adjustments.push(format!(
                "cache_sweep_interval不能为0，已改为{}秒",
                default_sweep_interval()
            ));
            raw_config.cache_sweep_interval = default_sweep_interval();
        }
        if raw_config.chunk_size == 0 {
            raw_config.chunk_size = default_chunk_size();
        }

        raw_config.template_source = match &raw_config.template {
            Some(path) => fs::read_to_string(path)
                .map_err(|e| Exception::TemplateUnreadable(format!("{}: {}", path.display(), e)))?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(raw_config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn kernel_hostname() -> String {
    match fs::read_to_string("/etc/hostname") {
        Ok(h) if !h.trim().is_empty() => h.trim().to_string(),
        _ => "localhost".to_string(),
    }
}

impl Config {
    pub fn www_root(&self) -> &Path {
        &self.www_root
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// 明文 HTTP 端口；`tls.only` 时为 `None`
    pub fn http_port(&self) -> Option<u16> {
        match &self.tls {
            Some(tls) if tls.only => None,
            _ => Some(self.port),
        }
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn template_source(&self) -> &str {
        &self.template_source
    }

    pub fn cache_ttl(&self) -> CacheTtl {
        CacheTtl::from_minutes(self.cache_ttl)
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval)
    }

    pub fn log(&self) -> Option<&Path> {
        self.log.as_deref()
    }

    pub fn log_config(&self) -> Option<&Path> {
        self.log_config.as_deref()
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn streaming_threshold(&self) -> u64 {
        self.streaming_threshold
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn secrets(&self) -> &HashMap<String, String> {
        &self.secrets
    }

    pub fn tls(&self) -> Option<&TlsConfig> {
        self.tls.as_ref()
    }

    pub fn adjustments(&self) -> &[String] {
        &self.adjustments
    }

    /// 未配置 TLS 时恒为 `Enforcement::None`
    pub fn enforcement(&self) -> Enforcement {
        self.tls.as_ref().map_or(Enforcement::None, |t| t.required)
    }
}
