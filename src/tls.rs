// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! HTTPS 强制策略与证书加载

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use log::info;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use crate::config::{Enforcement, TlsConfig};
use crate::exception::Exception;

/// 明文请求是否需要 303 跳转到 HTTPS。已经通过 TLS 到达的请求从不跳转。
pub fn requires_redirect(secure: bool, enforcement: Enforcement, route_is_secret: bool) -> bool {
    if secure {
        return false;
    }
    match enforcement {
        Enforcement::None => false,
        Enforcement::Secrets => route_is_secret,
        Enforcement::All => true,
    }
}

/// 同一路径在 HTTPS 监听上的地址，端口为 443 时省略，查询字符串不保留
pub fn secure_location(host: &str, port: u16, raw_path: &str) -> String {
    if port == 443 {
        format!("https://{}{}", host, raw_path)
    } else {
        format!("https://{}:{}{}", host, port, raw_path)
    }
}

fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no certificates found in {}", path.display()),
        ));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> io::Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no private key found in {}", path.display()),
        )
    })
}

/// 从 PEM 证书链与私钥构建 TLS 接收器
pub fn load_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor, Exception> {
    let certs = load_certs(tls.cert())
        .map_err(|e| Exception::TlsSetup(format!("{}: {}", tls.cert().display(), e)))?;
    let key = load_private_key(tls.key())
        .map_err(|e| Exception::TlsSetup(format!("{}: {}", tls.key().display(), e)))?;

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Exception::TlsSetup(e.to_string()))?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|e| Exception::TlsSetup(e.to_string()))?;

    info!("已加载TLS证书{}", tls.cert().display());
    Ok(TlsAcceptor::from(Arc::new(config)))
}
