// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{info, warn};
use lru::LruCache;
use tokio::task::JoinHandle;

use crate::config::CacheTtl;
use crate::content::Outcome;

/// 条目被移除（过期或容量淘汰）时的通知回调
pub type EvictionHook = Box<dyn Fn(&str, &Outcome) + Send + Sync>;

struct CacheEntry {
    outcome: Outcome,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |t| now >= t)
    }
}

struct CacheInner {
    ttl: Option<Duration>,
    entries: Mutex<LruCache<String, CacheEntry>>,
    on_evict: EvictionHook,
}

/// 以 URL 路径为键的响应缓存。
///
/// 未配置 TTL 时所有操作都是空操作，`lookup` 总是未命中。
pub struct ResponseCache {
    inner: Option<CacheInner>,
}

impl ResponseCache {
    /// `capacity` 为 0 表示不限制条目数量
    pub fn new(ttl: CacheTtl, capacity: usize) -> Self {
        let ttl = match ttl {
            CacheTtl::Disabled => return Self::disabled(),
            CacheTtl::Forever => None,
            CacheTtl::Expire(d) => Some(d),
        };
        let entries = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            inner: Some(CacheInner {
                ttl,
                entries: Mutex::new(entries),
                on_evict: Box::new(|key, _| info!("removed cached item for {}", key)),
            }),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// 替换默认的日志通知
    pub fn with_eviction_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Outcome) + Send + Sync + 'static,
    {
        if let Some(inner) = self.inner.as_mut() {
            inner.on_evict = Box::new(hook);
        }
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn lookup(&self, path: &str) -> Option<Outcome> {
        let inner = self.inner.as_ref()?;
        let now = Instant::now();
        let expired = {
            let mut entries = inner.lock();
            let state = entries
                .get(path)
                .map(|e| (e.is_expired(now), e.outcome.clone()));
            match state {
                Some((false, outcome)) => return Some(outcome),
                Some((true, _)) => entries.pop(path),
                None => None,
            }
        };
        if let Some(entry) = expired {
            (inner.on_evict)(path, &entry.outcome);
        }
        None
    }

    /// 覆盖同一路径上的旧条目并重新开始计时
    pub fn store(&self, path: &str, outcome: Outcome) {
        let inner = match self.inner.as_ref() {
            Some(i) => i,
            None => return,
        };
        let entry = CacheEntry {
            outcome,
            // 超出 Instant 表示范围的期限按永不过期处理
            expires_at: inner.ttl.and_then(|d| Instant::now().checked_add(d)),
        };
        let displaced = inner.lock().push(path.to_string(), entry);
        // push 在键已存在时返回旧值，只有被淘汰的其他键才需要通知
        if let Some((key, old)) = displaced {
            if key != path {
                (inner.on_evict)(&key, &old.outcome);
            }
        }
    }

    /// 立即清空所有条目，返回被清除的条目数
    pub fn flush(&self) -> usize {
        let inner = match self.inner.as_ref() {
            Some(i) => i,
            None => return 0,
        };
        let mut entries = inner.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    /// 移除所有已过期条目并逐一通知，返回移除数量
    pub fn sweep(&self) -> usize {
        let inner = match self.inner.as_ref() {
            Some(i) => i,
            None => return 0,
        };
        let now = Instant::now();
        let removed: Vec<(String, CacheEntry)> = {
            let mut entries = inner.lock();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| entries.pop(&k).map(|e| (k, e)))
                .collect()
        };
        for (key, entry) in &removed {
            (inner.on_evict)(key, &entry.outcome);
        }
        removed.len()
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |i| i.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        match self.entries.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }
}

/// 启动后台过期清理任务；缓存未启用时不启动。
pub fn spawn_sweeper(cache: Arc<ResponseCache>, interval: Duration) -> Option<JoinHandle<()>> {
    if !cache.is_enabled() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 第一次 tick 立即完成
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cache.sweep();
        }
    }))
}

/// 收到 SIGHUP 时清空缓存，用于站点内容更新后立即生效
#[cfg(unix)]
pub fn spawn_flush_on_hangup(cache: Arc<ResponseCache>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            let count = cache.flush();
            info!("收到SIGHUP，已清空{}条缓存", count);
        }
    }))
}
