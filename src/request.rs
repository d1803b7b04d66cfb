// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将 TCP 流中读取的请求头字节解析为强类型的 `Request` 结构体：
//! 1. 请求行（方法、目标、版本）的解析。
//! 2. 请求目标拆分为路径与查询字符串，并对路径进行百分号解码。
//! 3. 常用标头的提取：`User-Agent`、`Host`、`Accept-Encoding`、`Authorization`。

use crate::{exception::Exception, param::*};
use log::error;
use percent_encoding::percent_decode_str;

/// 表示一个 HTTP 请求的元数据（不含请求体）。
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 解码后的路径，不含查询字符串。缓存键、路由提取和摘要计算都使用它。
    path: String,
    /// 原始（未解码）路径，不含查询字符串
    raw_path: String,
    query: Option<String>,
    version: HttpVersion,
    user_agent: String,
    host: Option<String>,
    accept_encoding: Vec<HttpEncoding>,
    /// `Authorization` 头的完整取值
    authorization: Option<String>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的请求头数据。
    /// * `id` - 连接 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u64) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let request_lines: Vec<&str> = request_string.split(CRLF).collect();

        // 请求行，例如 "GET /index.html HTTP/1.1"
        let first_line_parts: Vec<&str> = request_lines[0].split(' ').collect();
        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::MalformedRequest);
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 目标中出现空格虽不规范，但仍尝试拼接恢复
        let target = first_line_parts[1..first_line_parts.len() - 1].join(" ");
        let (raw_path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target, None),
        };
        let path = match percent_decode_str(&raw_path).decode_utf8() {
            Ok(p) => p.into_owned(),
            Err(_) => {
                error!("[ID{}]请求路径的百分号编码不是合法的UTF-8：{}", id, raw_path);
                return Err(Exception::InvalidPath);
            }
        };

        let mut user_agent = String::new();
        let mut host = None;
        let mut accept_encoding = vec![];
        let mut authorization = None;
        for line in request_lines.iter().skip(1) {
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim().to_lowercase(), v.trim()),
                None => continue,
            };
            match name.as_str() {
                "user-agent" => user_agent = value.to_string(),
                "host" => host = Some(value.to_string()),
                "authorization" => authorization = Some(value.to_string()),
                "accept-encoding" => {
                    // 只要包含关键词即视为支持
                    if value.contains("gzip") {
                        accept_encoding.push(HttpEncoding::Gzip);
                    }
                    if value.contains("deflate") {
                        accept_encoding.push(HttpEncoding::Deflate);
                    }
                    if value.contains("br") {
                        accept_encoding.push(HttpEncoding::Br);
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            method,
            path,
            raw_path,
            query,
            version,
            user_agent,
            host,
            accept_encoding,
            authorization,
        })
    }
}

impl Request {
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 解码后的请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }
}
