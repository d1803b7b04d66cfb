// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义 `mdserve` 使用的 HTTP 协议常量与强类型枚举：
//! - 状态码及其原因短语（Reason Phrase）。
//! - 按扩展名查询的 MIME 类型注册表。
//! - 默认的 Markdown 外层模板、HSTS 头等固定取值。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "mdserve";

/// HTTP 协议规定的换行符
pub const CRLF: &str = "\r\n";

/// 读取请求头的字节上限
pub const MAX_REQUEST_HEAD: usize = 8192;

/// Markdown 与 Pug 渲染结果的内容类型
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// 内部错误响应体的内容类型
pub const PLAIN_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// 启用 TLS 时附加在每个响应上的 `Strict-Transport-Security` 取值（两年）
pub const HSTS_VALUE: &str = "max-age=63072000";

/// 未配置模板时包裹 Markdown 渲染结果的默认页面
pub const DEFAULT_TEMPLATE: &str = r#"<!doctype html><html>
<head><meta http-equiv="content-type" content="text/html; charset=utf-8"></head>
<body>{{content}}</body>
</html>"#;

lazy_static! {
    /// OPTIONS 响应中 `Allow` 头列出的方法。
    pub static ref ALLOWED_METHODS: Vec<HttpRequestMethod> = {
        vec![
            HttpRequestMethod::Get,
            HttpRequestMethod::Head,
            HttpRequestMethod::Options,
        ]
    };
}

lazy_static! {
    /// 服务器会产生的状态码与其原因短语。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(204, "No Content");

        // 目录补全斜杠用 301，`.redirect` 文件用 308，TLS 升级用 303
        map.insert(301, "Moved Permanently");
        map.insert(303, "See Other");
        map.insert(308, "Permanent Redirect");

        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");

        map.insert(500, "Internal Server Error");
        map
    };
}

/// 扩展名到 MIME 类型的注册表原始数据。
const MIME_TABLE: &[(&str, &str)] = &[
    ("aac", "audio/aac"),
    ("avif", "image/avif"),
    ("bin", "application/octet-stream"),
    ("bmp", "image/bmp"),
    ("css", "text/css; charset=utf-8"),
    ("csv", "text/csv; charset=utf-8"),
    ("eot", "application/vnd.ms-fontobject"),
    ("epub", "application/epub+zip"),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("htm", "text/html; charset=utf-8"),
    ("html", "text/html; charset=utf-8"),
    ("ico", "image/x-icon"),
    ("ics", "text/calendar"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript; charset=utf-8"),
    ("json", "application/json"),
    ("jsonld", "application/ld+json"),
    ("md", "text/markdown; charset=utf-8"),
    ("mjs", "text/javascript; charset=utf-8"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("oga", "audio/ogg"),
    ("ogv", "video/ogg"),
    ("opus", "audio/opus"),
    ("otf", "font/otf"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("rss", "application/rss+xml"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("ttf", "font/ttf"),
    ("txt", "text/plain; charset=utf-8"),
    ("wasm", "application/wasm"),
    ("wav", "audio/wav"),
    ("weba", "audio/webm"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("xhtml", "application/xhtml+xml"),
    ("xml", "text/xml"),
    ("zip", "application/zip"),
    ("7z", "application/x-7z-compressed"),
];

lazy_static! {
    /// 扩展名（不含点，小写）到 MIME 类型的映射表。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> =
        MIME_TABLE.iter().copied().collect();
}

/// 按扩展名查询 MIME 类型；未登记的扩展名返回 `None`。
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    MIME_TYPES
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    /// HTTP/1.1 版本
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    /// 可以被解析，但只会得到 405
    Post,
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpEncoding {
    Gzip,
    Deflate,
    Br,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名，摘要认证计算 HA2 时也使用该形式
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
        }
    }
}

impl fmt::Display for HttpEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Deflate => write!(f, "deflate"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}
