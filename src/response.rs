// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{
    config::Config,
    content::Outcome,
    param::*,
    request::Request,
    util::HtmlBuilder,
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};
use tokio::{
    fs::File as TokioFile,
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    location: Option<String>,
    www_authenticate: Option<String>,
    strict_transport_security: Option<String>,
    content: Option<Bytes>,
    /// 超过流式阈值的文件，在发送阶段按块读取
    stream_from: Option<PathBuf>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: None,
            location: None,
            www_authenticate: None,
            strict_transport_security: None,
            content: None,
            stream_from: None,
        }
    }

    /// 将缓存或新计算出的结果转换为响应。同一个 `Outcome` 多次转换得到相同的状态码与响应体。
    pub fn from_outcome(outcome: &Outcome, request: &Request, id: u64, config: &Config) -> Self {
        match outcome {
            Outcome::Literal { path } => Self::from_file(path, request, id, config),
            Outcome::Rendered { body, content_type } => {
                Self::new().with_body(body.clone(), Some(content_type.as_str()), Some(request), id)
            }
            Outcome::Redirect { target, status } => Self::redirect(*status, target),
            Outcome::NotFound => Self::response_404(request, id),
            Outcome::InternalError { message } => Self::response_500(request, id, message),
        }
    }

    fn from_file(path: &Path, request: &Request, id: u64, config: &Config) -> Self {
        let metadata = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!("[ID{}]文件{}已不存在", id, path.display());
                return Self::response_404(request, id);
            }
            Err(e) => {
                error!("[ID{}]无法获取文件{}的元数据: {}", id, path.display(), e);
                return Self::response_500(request, id, &e.to_string());
            }
        };
        let file_size = metadata.len();
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for_extension);

        // 小文件走 with_body，HEAD 才能得到与 GET 相同的编码与长度
        let headonly = request.method() == HttpRequestMethod::Head;
        if file_size > config.streaming_threshold() {
            debug!(
                "[ID{}]文件大小: {} bytes, 流式阈值: {} bytes, HEAD请求: {}",
                id,
                file_size,
                config.streaming_threshold(),
                headonly
            );
            let mut response = Self::new();
            response.content_type = mime.map(str::to_string);
            response.content_length = file_size;
            if !headonly {
                response.stream_from = Some(path.to_path_buf());
            }
            return response;
        }

        match fs::read(path) {
            Ok(contents) => Self::new().with_body(Bytes::from(contents), mime, Some(request), id),
            Err(e) => {
                error!("[ID{}]无法读取文件{}。错误：{}", id, path.display(), e);
                Self::response_500(request, id, &e.to_string())
            }
        }
    }

    /// 设置响应体，按客户端支持的编码压缩；HEAD 请求保留压缩后的头部但不带响应体
    fn with_body(
        mut self,
        body: Bytes,
        content_type: Option<&str>,
        request: Option<&Request>,
        id: u64,
    ) -> Self {
        self.content_type = content_type.map(str::to_string);

        // 未知类型多半是二进制文件，不压缩
        let accept_encoding = request.map_or(&[][..], |r| r.accept_encoding());
        self.content_encoding = match content_type {
            Some(t) if !should_skip_compression(t) => decide_encoding(accept_encoding),
            _ => None,
        };
        let body = match self.content_encoding {
            None => body,
            Some(_) => match compress(body.to_vec(), self.content_encoding) {
                Ok(c) => Bytes::from(c),
                Err(e) => {
                    error!("[ID{}]压缩失败: {}，返回未压缩内容", id, e);
                    self.content_encoding = None;
                    body
                }
            },
        };
        self.content_length = body.len() as u64;
        self.content = match request {
            Some(r) if r.method() == HttpRequestMethod::Head => None,
            _ => Some(body),
        };
        self
    }

    /// 请求无法解析时没有 `Request` 可用
    fn from_status_code(code: u16, request: Option<&Request>, id: u64) -> Self {
        let content = match code {
            400 => HtmlBuilder::from_status_code(400, Some(
                r"<h2>噢！</h2><p>无法处理该请求。</p>"
            )),
            401 => HtmlBuilder::from_status_code(401, Some(
                r"<h2>噢！</h2><p>访问该页面需要密码。</p>"
            )),
            404 => HtmlBuilder::from_status_code(404, Some(
                r"<h2>噢！</h2><p>你指定的网页无法找到。</p>"
            )),
            405 => HtmlBuilder::from_status_code(405, Some(
                r"<h2>噢！</h2><p>本服务器仅支持GET、HEAD与OPTIONS方法。</p>"
            )),
            _ => HtmlBuilder::from_status_code(code, None),
        }
        .build();
        let mut response =
            Self::new().with_body(Bytes::from(content), Some(HTML_CONTENT_TYPE), request, id);
        response.set_code(code);
        response
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("未登记的状态码：{}", code);
                "Unknown".to_string()
            }
        };
        self
    }

    pub fn set_hsts(&mut self) -> &mut Self {
        self.strict_transport_security = Some(HSTS_VALUE.to_string());
        self
    }

    pub fn response_400(request: &Request, id: u64) -> Self {
        Self::from_status_code(400, Some(request), id)
    }

    pub fn response_404(request: &Request, id: u64) -> Self {
        Self::from_status_code(404, Some(request), id)
    }

    /// 请求报文本身无法解析，`code` 为 400 或 405
    pub fn malformed(code: u16, id: u64) -> Self {
        let mut response = Self::from_status_code(code, None, id);
        if code == 405 {
            response.allow = Some(ALLOWED_METHODS.to_vec());
        }
        response
    }

    /// 500 的响应体就是错误信息本身
    pub fn response_500(request: &Request, id: u64, message: &str) -> Self {
        let mut response = Self::new().with_body(
            Bytes::from(message.to_string()),
            Some(PLAIN_CONTENT_TYPE),
            Some(request),
            id,
        );
        response.set_code(500);
        response
    }

    /// 401 摘要认证质询
    pub fn challenge(request: &Request, id: u64, www_authenticate: String) -> Self {
        let mut response = Self::from_status_code(401, Some(request), id);
        response.www_authenticate = Some(www_authenticate);
        response
    }

    pub fn redirect(code: u16, location: &str) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.location = Some(location.to_string());
        response
    }

    /// 明文请求跳转到 HTTPS
    pub fn see_other(location: &str) -> Self {
        Self::redirect(303, location)
    }

    pub fn options() -> Self {
        let mut response = Self::new();
        response.set_code(204);
        response.allow = Some(ALLOWED_METHODS.to_vec());
        response
    }

    pub fn method_not_allowed(request: &Request, id: u64) -> Self {
        let mut response = Self::from_status_code(405, Some(request), id);
        response.allow = Some(ALLOWED_METHODS.to_vec());
        response
    }

    /// 响应头与内存中的响应体；流式文件的内容不在其中
    pub fn as_bytes(&self) -> Vec<u8> {
        let status_code: &str = &self.status_code.to_string();
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);

        let optional = |name: &str, value: Option<&str>| match value {
            Some(v) => [name, ": ", v, CRLF].concat(),
            None => String::new(),
        };
        let encoding = self.content_encoding.map(|e| e.to_string());
        let allow = self.allow.as_ref().map(|methods| {
            methods
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        });

        let header = [
            self.version.to_string().as_str(),
            " ",
            status_code,
            " ",
            self.information.as_str(),
            CRLF,
            optional("Content-Type", self.content_type.as_deref()).as_str(),
            optional("Content-Encoding", encoding.as_deref()).as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            "Date: ",
            date,
            CRLF,
            "Server: ",
            self.server_name.as_str(),
            CRLF,
            optional("Allow", allow.as_deref()).as_str(),
            optional("Location", self.location.as_deref()).as_str(),
            optional("WWW-Authenticate", self.www_authenticate.as_deref()).as_str(),
            optional(
                "Strict-Transport-Security",
                self.strict_transport_security.as_deref(),
            )
            .as_str(),
            "Connection: close",
            CRLF,
            CRLF,
        ]
        .concat();
        let body: &[u8] = self.content.as_deref().unwrap_or(&[]);
        [header.as_bytes(), body].concat()
    }

    /// 发送完整响应，大文件按 `chunk_size` 分块读取
    pub async fn write_to<W>(&self, stream: &mut W, chunk_size: usize, id: u64) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        stream.write_all(&self.as_bytes()).await?;
        if let Some(path) = &self.stream_from {
            let mut file = TokioFile::open(path).await?;
            let mut buffer = vec![0u8; chunk_size.max(1)];
            let mut total_sent = 0u64;
            loop {
                let n = file.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                stream.write_all(&buffer[..n]).await?;
                total_sent += n as u64;
            }
            debug!("[ID{}]流式传输完成，共发送 {} 字节", id, total_sent);
        }
        stream.flush().await
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn www_authenticate(&self) -> Option<&str> {
        self.www_authenticate.as_deref()
    }

    pub fn strict_transport_security(&self) -> Option<&str> {
        self.strict_transport_security.as_deref()
    }

    pub fn allow(&self) -> Option<&[HttpRequestMethod]> {
        self.allow.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream_from.is_some()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes",
            mode,
            original_size,
            compressed.len()
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/avif",
        "image/bmp",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "application/x-7z-compressed",
        "application/gzip",
        "application/pdf",
        "application/epub+zip",
        "font/woff",
        "font/woff2",
        "application/vnd.ms-fontobject",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

/// 优先级：Brotli > Gzip > Deflate
pub fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    [HttpEncoding::Br, HttpEncoding::Gzip, HttpEncoding::Deflate]
        .into_iter()
        .find(|e| accept_encoding.contains(e))
}
