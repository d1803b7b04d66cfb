// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内容渲染
//!
//! 根据解析出的目标文件生成可缓存的 [`Outcome`]。`Outcome` 只是数据，
//! 同一个值可以被反复转换成响应，每次得到相同的状态码、内容类型和响应体；
//! 只有 `Literal` 会在发送时重新读取磁盘。

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use lazy_static::lazy_static;
use log::debug;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;

use crate::exception::Exception;
use crate::markup;
use crate::param::HTML_CONTENT_TYPE;
use crate::resolver::ResolvedTarget;

lazy_static! {
    /// `{{content}}`、`{{ content }}`、`{{ .Content }}` 都视为替换点
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*\.?[Cc]ontent\s*\}\}").unwrap();
}

/// 一次解析与渲染的最终结果，也是缓存中保存的值。
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 发送时直接从磁盘读取的文件
    Literal { path: PathBuf },
    /// 已渲染好的响应体
    Rendered { body: Bytes, content_type: String },
    /// 301（目录补全斜杠）或 308（`.redirect` 文件）
    Redirect { target: String, status: u16 },
    NotFound,
    /// 渲染失败，`message` 作为 500 响应体
    InternalError { message: String },
}

/// 按扩展名划分的内容类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Markdown,
    Markup,
    Redirect,
    Verbatim,
}

pub fn classify(path: &Path) -> ContentKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") => ContentKind::Markdown,
        Some("jade") | Some("pug") => ContentKind::Markup,
        Some("redirect") => ContentKind::Redirect,
        _ => ContentKind::Verbatim,
    }
}

/// Markdown 的外层页面，在唯一的替换点处插入渲染结果。
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    head: String,
    tail: String,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, Exception> {
        let m = PLACEHOLDER
            .find(source)
            .ok_or(Exception::TemplateMissingPlaceholder)?;
        Ok(Self {
            head: source[..m.start()].to_string(),
            tail: source[m.end()..].to_string(),
        })
    }

    pub fn render(&self, content: &str) -> String {
        let mut out = String::with_capacity(self.head.len() + content.len() + self.tail.len());
        out.push_str(&self.head);
        out.push_str(content);
        out.push_str(&self.tail);
        out
    }
}

pub fn render_markdown(source: &[u8]) -> String {
    let text = String::from_utf8_lossy(source);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(&text, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

pub struct ContentRenderer {
    template: Template,
}

impl ContentRenderer {
    pub fn new(template: Template) -> Self {
        Self { template }
    }

    /// 字面匹配的文件原样发送，只有隐式匹配和目录索引才按扩展名渲染。
    pub fn render(&self, target: ResolvedTarget) -> Outcome {
        match target {
            ResolvedTarget::Literal(path) => Outcome::Literal { path },
            ResolvedTarget::Filtered(path) | ResolvedTarget::DirectoryIndex(path) => {
                self.render_file(&path)
            }
            ResolvedTarget::Redirect(target) => Outcome::Redirect {
                target,
                status: 301,
            },
            ResolvedTarget::NotFound => Outcome::NotFound,
        }
    }

    pub fn render_file(&self, path: &Path) -> Outcome {
        let kind = classify(path);
        debug!("渲染{}，类别{:?}", path.display(), kind);
        let rendered = match kind {
            ContentKind::Markdown => self.markdown(path),
            ContentKind::Markup => markup::render_file(path).map(|out| Outcome::Rendered {
                body: Bytes::from(out),
                content_type: HTML_CONTENT_TYPE.to_string(),
            }),
            ContentKind::Redirect => redirect(path),
            ContentKind::Verbatim => Ok(Outcome::Literal {
                path: path.to_path_buf(),
            }),
        };
        rendered.unwrap_or_else(|e| Outcome::InternalError {
            message: e.to_string(),
        })
    }

    fn markdown(&self, path: &Path) -> Result<Outcome, Exception> {
        let source = fs::read(path).map_err(|e| Exception::ReadFailed(e.to_string()))?;
        let page = self.template.render(&render_markdown(&source));
        Ok(Outcome::Rendered {
            body: Bytes::from(page),
            content_type: HTML_CONTENT_TYPE.to_string(),
        })
    }
}

fn redirect(path: &Path) -> Result<Outcome, Exception> {
    let source = fs::read_to_string(path).map_err(|e| Exception::ReadFailed(e.to_string()))?;
    let target = source.trim();
    if target.is_empty() {
        return Err(Exception::EmptyRedirect);
    }
    Ok(Outcome::Redirect {
        target: target.to_string(),
        status: 308,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn renderer(template: &str) -> ContentRenderer {
        ContentRenderer::new(Template::parse(template).unwrap())
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("a/index.md")), ContentKind::Markdown);
        assert_eq!(classify(Path::new("page.jade")), ContentKind::Markup);
        assert_eq!(classify(Path::new("page.pug")), ContentKind::Markup);
        assert_eq!(classify(Path::new("old.redirect")), ContentKind::Redirect);
        assert_eq!(classify(Path::new("style.css")), ContentKind::Verbatim);
        assert_eq!(classify(Path::new("LICENSE")), ContentKind::Verbatim);
        assert_eq!(classify(Path::new("notes.md.bak")), ContentKind::Verbatim);
    }

    #[test]
    fn test_template_placeholder_forms() {
        for source in [
            "<html>{{content}}</html>",
            "<html>{{ content }}</html>",
            "<html>{{ .Content }}</html>",
            "<html>{{.Content}}</html>",
        ] {
            let template = Template::parse(source).unwrap();
            assert_eq!(template.render("<p>x</p>"), "<html><p>x</p></html>");
        }
    }

    #[test]
    fn test_template_without_placeholder() {
        assert_eq!(
            Template::parse("<html></html>"),
            Err(Exception::TemplateMissingPlaceholder)
        );
    }

    #[test]
    fn test_markdown_wrapped_in_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.md");
        fs::write(&path, "# Hi").unwrap();

        let outcome = renderer("<html>{{content}}</html>").render_file(&path);
        assert_eq!(
            outcome,
            Outcome::Rendered {
                body: Bytes::from("<html><h1>Hi</h1>\n</html>"),
                content_type: "text/html; charset=utf-8".to_string(),
            }
        );
    }

    #[test]
    fn test_markdown_extensions() {
        let html = render_markdown(b"~~old~~\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n");
        assert!(html.contains("<del>old</del>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<code class=\"language-rust\">"));
    }

    #[test]
    fn test_markdown_is_captured_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.md");
        fs::write(&path, "first").unwrap();

        let outcome = renderer("{{content}}").render_file(&path);
        fs::write(&path, "second").unwrap();

        match outcome {
            Outcome::Rendered { body, .. } => assert_eq!(body, Bytes::from("<p>first</p>\n")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_markdown_is_internal_error() {
        let outcome = renderer("{{content}}").render_file(Path::new("/nonexistent/page.md"));
        assert!(matches!(outcome, Outcome::InternalError { .. }));
    }

    #[test]
    fn test_redirect_file_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.redirect");
        fs::write(&path, "  https://example.org/new \n").unwrap();

        assert_eq!(
            renderer("{{content}}").render_file(&path),
            Outcome::Redirect {
                target: "https://example.org/new".to_string(),
                status: 308,
            }
        );
    }

    #[test]
    fn test_redirect_read_failure_is_internal_error() {
        let outcome = renderer("{{content}}").render_file(Path::new("/nonexistent/x.redirect"));
        assert!(matches!(outcome, Outcome::InternalError { .. }));
    }

    #[test]
    fn test_empty_redirect_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.redirect");
        fs::write(&path, "   \n").unwrap();

        assert_eq!(
            renderer("{{content}}").render_file(&path),
            Outcome::InternalError {
                message: "redirect file has no target".to_string()
            }
        );
    }

    #[test]
    fn test_markup_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.pug");
        fs::write(&path, "p Hello").unwrap();

        assert_eq!(
            renderer("{{content}}").render_file(&path),
            Outcome::Rendered {
                body: Bytes::from("<p>Hello</p>"),
                content_type: HTML_CONTENT_TYPE.to_string(),
            }
        );
    }

    #[test]
    fn test_markup_error_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.jade");
        fs::write(&path, "ul\n  each item in items\n    li= item").unwrap();

        assert!(matches!(
            renderer("{{content}}").render_file(&path),
            Outcome::InternalError { .. }
        ));
    }

    #[test]
    fn test_verbatim_becomes_literal() {
        let path = Path::new("/srv/site/style.css");
        assert_eq!(
            renderer("{{content}}").render_file(path),
            Outcome::Literal {
                path: path.to_path_buf()
            }
        );
    }

    #[test]
    fn test_targets_map_to_outcomes() {
        let r = renderer("{{content}}");
        assert_eq!(r.render(ResolvedTarget::NotFound), Outcome::NotFound);
        assert_eq!(
            r.render(ResolvedTarget::Redirect("/docs/".to_string())),
            Outcome::Redirect {
                target: "/docs/".to_string(),
                status: 301
            }
        );
        assert_eq!(
            r.render(ResolvedTarget::Literal(PathBuf::from("/srv/index.md"))),
            Outcome::Literal {
                path: PathBuf::from("/srv/index.md")
            }
        );
    }
}
