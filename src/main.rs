// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # mdserve
//!
//! 渲染 Markdown 与 Pug 页面的静态 Web 服务器。
//! - 命令行参数为配置文件路径，默认 `config/mdserve.toml`
//! - 可同时监听 HTTP 与 HTTPS，两个监听共享同一份缓存
//! - SIGHUP 或控制台 `flush` 指令清空缓存
//! - 配置错误退出码为 2，日志初始化失败为 3，其他启动错误为 1

use mdserve::{cache, config::Config, exception::Exception, logging, server::Server, tls};

use log::{error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    runtime::Builder,
    sync::Notify,
};
use tokio_rustls::TlsAcceptor;

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::Arc,
};

const DEFAULT_CONFIG: &str = "config/mdserve.toml";

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match Config::from_toml(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };
    if let Err(e) = logging::init(&config) {
        eprintln!("{}", e);
        process::exit(3);
    }
    info!("配置文件{}已载入", config_path);
    for adjustment in config.adjustments() {
        warn!("{}", adjustment);
    }
    info!("www root: {}", config.www_root().display());

    let acceptor = match config.tls().map(tls::load_acceptor).transpose() {
        Ok(acceptor) => acceptor,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    let worker_threads = config.worker_threads();
    let server = match Server::new(config) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };

    let runtime = match Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(server, acceptor)) {
        error!("{}", e);
        process::exit(1);
    }
}

async fn bind(address: Ipv4Addr, port: u16) -> Result<TcpListener, Exception> {
    TcpListener::bind(SocketAddrV4::new(address, port))
        .await
        .map_err(|e| Exception::BindFailed(format!("{}:{}: {}", address, port, e)))
}

async fn run(server: Arc<Server>, acceptor: Option<TlsAcceptor>) -> Result<(), Exception> {
    let config = server.config();
    let address = match config.local() {
        true => Ipv4Addr::LOCALHOST,
        false => Ipv4Addr::UNSPECIFIED,
    };

    if let Some(port) = config.http_port() {
        let listener = bind(address, port).await?;
        info!("启动HTTP服务，监听{}:{}", address, port);
        tokio::spawn(Arc::clone(&server).serve(listener, None));
    }
    if let (Some(tls_config), Some(acceptor)) = (config.tls(), acceptor) {
        let listener = bind(address, tls_config.port()).await?;
        info!("启动HTTPS服务，监听{}:{}", address, tls_config.port());
        tokio::spawn(Arc::clone(&server).serve(listener, Some(acceptor)));
    }

    if cache::spawn_sweeper(Arc::clone(server.cache()), config.cache_sweep_interval()).is_some() {
        info!("缓存已启用，过期清理间隔{:?}", config.cache_sweep_interval());
    }
    #[cfg(unix)]
    let _ = cache::spawn_flush_on_hangup(Arc::clone(server.cache()))
        .map_err(|e| warn!("无法监听SIGHUP：{}", e));

    let stop = Arc::new(Notify::new());
    tokio::spawn(console(Arc::clone(&server), Arc::clone(&stop)));

    tokio::select! {
        _ = stop.notified() => info!("收到停机指令，服务器关闭"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("收到中断信号，服务器关闭"),
            Err(e) => error!("无法监听中断信号：{}", e),
        },
    }
    Ok(())
}

/// 后台管理控制台，标准输入关闭后退出但不影响服务
async fn console(server: Arc<Server>, stop: Arc<Notify>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "" => {}
            "stop" => {
                println!("停机指令已激活，服务器即将关闭...");
                stop.notify_one();
                break;
            }
            "flush" => {
                let count = server.flush_cache();
                println!("已清空{}条缓存", count);
            }
            "status" => {
                println!("== mdserve 状态 ===");
                println!("当前活跃连接数: {}", server.active_connections());
                println!("缓存条目数: {}", server.cache().len());
                println!("====================");
            }
            "help" => {
                println!("== mdserve Help ==");
                println!("flush  - 清空响应缓存");
                println!("status - 查看当前服务器运行状态");
                println!("stop   - 关闭服务器");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}
