// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求处理流水线
//!
//! 每个请求依次经过：HTTPS 强制跳转 → 受保护路由的摘要认证 → 路径校验 →
//! 缓存查找 → 路径解析 → 内容渲染 → 写入缓存 → 生成响应。
//! 跳转与认证发生在缓存之前，其结果从不缓存。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::auth::AuthGate;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::content::{ContentRenderer, Outcome, Template};
use crate::exception::Exception;
use crate::param::{HttpRequestMethod, MAX_REQUEST_HEAD};
use crate::request::Request;
use crate::resolver::{self, PathResolver};
use crate::response::Response;
use crate::tls;

pub struct Server {
    config: Arc<Config>,
    resolver: PathResolver,
    renderer: ContentRenderer,
    auth: AuthGate,
    cache: Arc<ResponseCache>,
    next_id: AtomicU64,
    active: AtomicU64,
}

impl Server {
    pub fn new(config: Config) -> Result<Self, Exception> {
        let template = Template::parse(config.template_source())?;
        let cache = ResponseCache::new(config.cache_ttl(), config.cache_size());
        Ok(Self {
            resolver: PathResolver::new(config.www_root()),
            renderer: ContentRenderer::new(template),
            auth: AuthGate::new(config.host(), config.secrets().clone()),
            cache: Arc::new(cache),
            next_id: AtomicU64::new(0),
            active: AtomicU64::new(0),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn active_connections(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn flush_cache(&self) -> usize {
        let count = self.cache.flush();
        info!("已清空缓存，共{}条", count);
        count
    }

    /// 为一个已解析的请求生成响应。`secure` 表示请求是否经由 TLS 到达。
    pub fn respond(&self, request: &Request, secure: bool, id: u64) -> Response {
        let mut response = self.dispatch(request, secure, id);
        if self.config.tls().is_some() {
            response.set_hsts();
        }
        response
    }

    fn dispatch(&self, request: &Request, secure: bool, id: u64) -> Response {
        let path = request.path();

        let secret_route = self.auth.secret_route(path);
        if tls::requires_redirect(secure, self.config.enforcement(), secret_route.is_some()) {
            let port = self.config.tls().map_or(443, |t| t.port());
            let location = tls::secure_location(self.config.host(), port, request.raw_path());
            debug!("[ID{}]明文请求跳转到{}", id, location);
            return Response::see_other(&location);
        }
        if let Some(route) = secret_route {
            if !self.auth.check(request, route) {
                warn!("[ID{}]路由{}认证失败，发送质询", id, route);
                return Response::challenge(request, id, self.auth.challenge(route));
            }
        }

        match request.method() {
            HttpRequestMethod::Options => return Response::options(),
            HttpRequestMethod::Post => return Response::method_not_allowed(request, id),
            HttpRequestMethod::Get | HttpRequestMethod::Head => {}
        }

        if !path.starts_with('/') || resolver::validate(path).is_err() {
            warn!("[ID{}]请求的路径：{} 包含非法字符，返回400", id, path);
            return Response::response_400(request, id);
        }

        let outcome = match self.cache.lookup(path) {
            Some(outcome) => {
                debug!("[ID{}]缓存命中：{}", id, path);
                outcome
            }
            None => {
                let outcome = self.compute(path);
                self.cache.store(path, outcome.clone());
                outcome
            }
        };
        Response::from_outcome(&outcome, request, id, &self.config)
    }

    /// 解析并渲染一个路径，不经过缓存
    pub fn compute(&self, path: &str) -> Outcome {
        let target = self.resolver.resolve(path);
        debug!("{}解析为{:?}", path, target);
        self.renderer.render(target)
    }

    /// 接受连接的主循环，每个连接由独立的任务处理
    pub async fn serve(self: Arc<Self>, listener: TcpListener, acceptor: Option<TlsAcceptor>) {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!("接受连接失败: {}", e);
                    continue;
                }
            };
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            debug!("[ID{}]新的连接：{}", id, addr);

            let server = Arc::clone(&self);
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                server.active.fetch_add(1, Ordering::SeqCst);
                match acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(mut stream) => server.handle_connection(&mut stream, true, id).await,
                        Err(e) => warn!("[ID{}]TLS握手失败: {}", id, e),
                    },
                    None => {
                        let mut stream = stream;
                        server.handle_connection(&mut stream, false, id).await
                    }
                }
                server.active.fetch_sub(1, Ordering::SeqCst);
            });
        }
    }

    /// 处理单个连接上的一个请求，发送响应后关闭连接
    pub async fn handle_connection<S>(&self, stream: &mut S, secure: bool, id: u64)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let head = match read_head(stream).await {
            Ok(head) if head.is_empty() => return,
            Ok(head) => head,
            Err(e) => {
                warn!("[ID{}]读取请求失败: {}", id, e);
                if e == Exception::RequestTooLarge {
                    let _ = Response::malformed(400, id)
                        .write_to(stream, self.config.chunk_size(), id)
                        .await;
                }
                return;
            }
        };

        let start_time = Instant::now();
        let response = match Request::try_from(&head, id) {
            Ok(request) => {
                let response = self.respond(&request, secure, id);
                info!(
                    "[ID{}] {}, {}, {}, {}, {}, {}",
                    id,
                    request.version(),
                    request.method(),
                    request.path(),
                    response.status_code(),
                    response.information(),
                    request.user_agent(),
                );
                response
            }
            Err(Exception::UnSupportedRequestMethod) => Response::malformed(405, id),
            Err(_) => Response::malformed(400, id),
        };
        debug!(
            "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
            id,
            start_time.elapsed().as_millis()
        );

        if let Err(e) = response.write_to(stream, self.config.chunk_size(), id).await {
            error!("[ID{}]发送响应失败: {}", id, e);
            return;
        }
        let _ = stream.shutdown().await;
    }
}

/// 读取到空行为止的请求头，不含结尾的空行。连接在发送任何数据前关闭时返回空缓冲区。
async fn read_head<S>(stream: &mut S) -> Result<Vec<u8>, Exception>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            if end > MAX_REQUEST_HEAD {
                return Err(Exception::RequestTooLarge);
            }
            buffer.truncate(end);
            return Ok(buffer);
        }
        if buffer.len() > MAX_REQUEST_HEAD {
            return Err(Exception::RequestTooLarge);
        }
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| Exception::ReadFailed(e.to_string()))?;
        if n == 0 {
            return Ok(buffer);
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}
