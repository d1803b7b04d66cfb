// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了服务器在启动阶段与请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 分类
//! - **协议解析**：请求报文无法解析、方法或版本不受支持、请求头过大。
//! - **路径处理**：文件不存在、路径非法（包含 `..` 段或空字节）。
//! - **内容渲染**：读取源文件失败、Pug/Jade 模板语法错误、`.redirect` 文件为空。
//! - **启动阶段**：配置文件、Markdown 模板、TLS 证书、日志系统、端口绑定失败。
//!
//! 启动阶段的异常是致命的；请求阶段的异常只会被转化为对应的 HTTP 响应。

use std::fmt;

/// 服务器运行过程中产生的异常类型。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 请求字节流不是合法的 UTF-8。
    RequestIsNotUtf8,
    /// 请求行不是 `方法 目标 版本` 的形式。
    MalformedRequest,
    /// 使用了不支持的方法（例如 DELETE）。
    UnSupportedRequestMethod,
    /// 使用了 HTTP/1.1 以外的协议版本。
    UnsupportedHttpVersion,
    /// 请求头超过了读取上限。
    RequestTooLarge,
    /// 请求的资源不存在，对应 `404 Not Found`。
    FileNotFound,
    /// 路径包含 `..` 段、空字节或非法的百分号编码，对应 `400 Bad Request`。
    InvalidPath,
    /// 渲染时读取源文件失败，携带底层 I/O 错误信息。
    ReadFailed(String),
    /// Pug/Jade 模板在指定行存在无法处理的语法。
    MarkupSyntax { line: usize, message: String },
    /// `.redirect` 文件中没有任何目标地址。
    EmptyRedirect,
    /// 配置文件无法打开或读取。
    ConfigUnreadable(String),
    /// 配置文件内容不合法。
    ConfigInvalid(String),
    /// Markdown 外层模板无法读取。
    TemplateUnreadable(String),
    /// Markdown 外层模板中没有 `{{content}}` 占位符。
    TemplateMissingPlaceholder,
    /// TLS 证书或私钥加载失败。
    TlsSetup(String),
    /// 日志系统初始化失败。
    LoggerSetup(String),
    /// 监听端口绑定失败。
    BindFailed(String),
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed request line"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            RequestTooLarge => write!(f, "Request header is too large"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            ReadFailed(e) => write!(f, "{}", e),
            MarkupSyntax { line, message } => write!(f, "markup error at line {}: {}", line, message),
            EmptyRedirect => write!(f, "redirect file has no target"),
            ConfigUnreadable(e) => write!(f, "couldn't open settings file: {}", e),
            ConfigInvalid(e) => write!(f, "couldn't parse settings file: {}", e),
            TemplateUnreadable(e) => write!(f, "couldn't load template: {}", e),
            TemplateMissingPlaceholder => write!(f, "template has no {{{{content}}}} placeholder"),
            TlsSetup(e) => write!(f, "couldn't set up TLS: {}", e),
            LoggerSetup(e) => write!(f, "couldn't set up logging: {}", e),
            BindFailed(e) => write!(f, "couldn't bind listener: {}", e),
        }
    }
}

impl std::error::Error for Exception {}
