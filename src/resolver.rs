// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径解析
//!
//! 将请求路径映射到服务根目录下的文件。按顺序尝试，先匹配者胜出：
//! 1. 拼接根目录与请求路径得到候选路径；
//! 2. 候选路径是符号链接时解析一层；
//! 3. 候选路径是普通文件 → 字面匹配；
//! 4. 在父目录中查找去掉扩展名后与候选名相同的文件 → 隐式扩展名匹配；
//! 5. 候选路径是目录但请求路径不以 `/` 结尾 → 补全斜杠的重定向；
//! 6. 在目录中查找 `index.*` → 目录索引；
//! 7. 以上都不满足 → 未找到。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::exception::Exception;

/// 重定向地址中需要转义的字符
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// 路径解析的结果，每次缓存未命中时重新计算。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// 请求路径恰好对应一个文件
    Literal(PathBuf),
    /// 通过隐式扩展名找到的同级文件
    Filtered(PathBuf),
    /// 目录下的 `index.*` 文件
    DirectoryIndex(PathBuf),
    /// 目录请求缺少结尾斜杠，值为补全后的地址
    Redirect(String),
    NotFound,
}

pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, request_path: &str) -> ResolvedTarget {
        let mut candidate = self.root.clone();
        for segment in segments(request_path) {
            candidate.push(segment);
        }
        let is_root = candidate == self.root;

        // 只解析一层符号链接
        if let Ok(target) = fs::read_link(&candidate) {
            candidate = if target.is_absolute() {
                target
            } else {
                match candidate.parent() {
                    Some(dir) => dir.join(target),
                    None => target,
                }
            };
        }

        if let Ok(meta) = fs::metadata(&candidate) {
            if meta.is_file() {
                return ResolvedTarget::Literal(candidate);
            }
        }

        // 根目录的父目录不属于服务范围，跳过隐式匹配
        if !is_root {
            let (parent, name) = match (candidate.parent(), candidate.file_name()) {
                (Some(p), Some(n)) => (p, n.to_string_lossy().into_owned()),
                _ => return ResolvedTarget::NotFound,
            };
            match find_by_stem(parent, &name) {
                Ok(Some(found)) => return ResolvedTarget::Filtered(found),
                Ok(None) => {}
                Err(_) => return ResolvedTarget::NotFound,
            }
        }

        match fs::metadata(&candidate) {
            Ok(meta) if meta.is_dir() => {}
            _ => return ResolvedTarget::NotFound,
        }

        if !request_path.ends_with('/') {
            let target = format!("{}/", request_path);
            return ResolvedTarget::Redirect(utf8_percent_encode(&target, PATH_ESCAPE).to_string());
        }

        match find_by_stem(&candidate, "index") {
            Ok(Some(found)) => ResolvedTarget::DirectoryIndex(found),
            _ => ResolvedTarget::NotFound,
        }
    }
}

/// 请求路径中有意义的段，跳过空段与 `.`。认证路由与文件解析都以此为准。
pub fn segments(request_path: &str) -> impl Iterator<Item = &str> {
    request_path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
}

/// 拒绝包含 `..` 段或空字节的请求路径
pub fn validate(request_path: &str) -> Result<(), Exception> {
    if request_path.contains('\0') {
        return Err(Exception::InvalidPath);
    }
    if request_path.split('/').any(|segment| segment == "..") {
        return Err(Exception::InvalidPath);
    }
    Ok(())
}

/// 去掉最后一个扩展名：`a.b.md` → `a.b`，`.hidden` → ``，`name` → `name`
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// 在 `dir` 中按文件名顺序查找第一个去掉扩展名后等于 `stem` 的非目录项
fn find_by_stem(dir: &Path, stem: &str) -> io::Result<Option<PathBuf>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names
        .into_iter()
        .find(|name| strip_extension(name) == stem)
        .map(|name| dir.join(name)))
}
