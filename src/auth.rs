// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 摘要认证
//!
//! 受保护路由使用 RFC 2617 摘要认证（Digest Access Authentication）。
//! 服务器不校验用户名，只要摘要与该路由配置的密码匹配即放行；
//! 认证状态不做任何缓存，每个请求都独立校验。

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};

use crate::request::Request;
use crate::resolver;

/// 请求路径的第一个有效段，与路径解析使用同一套分段规则。
///
/// `/private/notes`、`//private/notes` 与 `/./private/notes` 的路由都是 `private`，`/` 没有路由。
pub fn route_of(path: &str) -> Option<&str> {
    resolver::segments(path).next()
}

/// 解析 `key=value, key="value"` 形式的参数列表，键与值两端的引号和空格都会被去掉
fn parse_params(s: &str) -> HashMap<&str, &str> {
    s.split(',')
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (trim_param(k), trim_param(v)))
        .collect()
}

fn trim_param(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == ' ')
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

pub struct AuthGate {
    host: String,
    secrets: HashMap<String, String>,
}

impl AuthGate {
    pub fn new(host: impl Into<String>, secrets: HashMap<String, String>) -> Self {
        Self {
            host: host.into(),
            secrets,
        }
    }

    pub fn realm(&self, route: &str) -> String {
        format!("{}-{}", self.host, route)
    }

    /// 路径所属路由配置了密码时返回该路由
    pub fn secret_route<'a>(&self, path: &'a str) -> Option<&'a str> {
        route_of(path).filter(|route| self.secrets.contains_key(*route))
    }

    pub fn is_secret_route(&self, path: &str) -> bool {
        self.secret_route(path).is_some()
    }

    /// 校验请求携带的 `Authorization: Digest ...` 凭据
    pub fn check(&self, request: &Request, route: &str) -> bool {
        let secret = match self.secrets.get(route) {
            Some(s) => s,
            None => return false,
        };
        let header = match request.authorization() {
            Some(h) => h,
            None => return false,
        };
        let params = match header.split_once(' ') {
            Some(("Digest", rest)) => parse_params(rest),
            _ => return false,
        };

        let realm = self.realm(route);
        if params.get("realm").copied() != Some(realm.as_str()) {
            return false;
        }
        let field = |name: &str| params.get(name).copied().unwrap_or("");

        let ha1 = md5_hex(&format!("{}:{}:{}", field("username"), realm, secret));
        let ha2 = md5_hex(&format!("{}:{}", request.method(), request.path()));
        let expected = md5_hex(&[
            ha1.as_str(),
            field("nonce"),
            field("nc"),
            field("cnonce"),
            field("qop"),
            ha2.as_str(),
        ]
        .join(":"));
        expected == field("response")
    }

    /// 生成 `WWW-Authenticate` 头的取值，每次都使用当前时间作为新的 nonce
    pub fn challenge(&self, route: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!(
            "Digest realm=\"{}\", qop=\"auth,auth-int\", nonce=\"{:x}\"",
            self.realm(route),
            nanos
        )
    }
}
