// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Pug/Jade 渲染
//!
//! 实现静态页面常用的 Pug 子集，输出紧凑的 HTML（标签之间不插入空白）：
//! - `doctype`、标签名与 `#id`/`.class` 简写（省略标签名时为 `div`）
//! - 括号属性：带引号的字符串、`true`/`false`、数字，`!=` 表示不转义
//! - 行内文本、`|` 管道文本、`tag.` 文本块、`<` 开头的原样 HTML
//! - `tag: child` 块展开、`tag/` 自闭合、空元素
//! - `//` 注释与 `//-` 静默注释
//!
//! 代码、变量、条件、循环、`include`、`extends`、`block`、`mixin` 与插值都不支持，
//! 遇到时返回带行号的 [`Exception::MarkupSyntax`]。

use std::fs;
use std::path::Path;

use crate::exception::Exception;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "if", "else", "unless", "each", "for", "while", "case", "when", "default", "include",
    "extends", "block", "append", "prepend", "mixin", "yield",
];

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    indent: usize,
    text: &'a str,
}

struct Node<'a> {
    line: Line<'a>,
    children: Vec<Node<'a>>,
    /// 文本块与注释下方的原始行，不再解析为标签
    raw: Vec<Line<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
enum AttrValue {
    Bool(bool),
    Text { value: String, escaped: bool },
}

#[derive(Debug, Default)]
struct Head {
    name: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, AttrValue)>,
    rest: String,
}

impl Head {
    fn add_attribute(&mut self, name: String, value: AttrValue) {
        match (name.as_str(), value) {
            ("class", AttrValue::Text { value, .. }) => {
                self.classes
                    .extend(value.split_whitespace().map(str::to_string));
            }
            ("class", AttrValue::Bool(_)) => {}
            ("id", AttrValue::Text { value, .. }) => self.id = Some(value),
            (_, value) => self.attrs.push((name, value)),
        }
    }
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().map_or(false, &pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }
}

fn syntax(line: usize, message: impl Into<String>) -> Exception {
    Exception::MarkupSyntax {
        line,
        message: message.into(),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn first_word(text: &str) -> &str {
    text.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = raw.trim_start();
            if text.trim().is_empty() {
                return None;
            }
            Some(Line {
                number: i + 1,
                indent: raw.len() - text.len(),
                text: text.trim_end(),
            })
        })
        .collect()
}

fn opens_text_block(text: &str) -> bool {
    text.starts_with("//") || matches!(parse_head(text, 0), Ok(head) if head.rest == ".")
}

/// 按缩进构建节点树，同一层的兄弟节点必须缩进一致
fn build<'a>(lines: &[Line<'a>], pos: &mut usize, indent: usize) -> Result<Vec<Node<'a>>, Exception> {
    let mut nodes = Vec::new();
    while let Some(line) = lines.get(*pos).copied() {
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(syntax(line.number, "inconsistent indentation"));
        }
        *pos += 1;

        let mut node = Node {
            line,
            children: Vec::new(),
            raw: Vec::new(),
        };
        if opens_text_block(line.text) {
            while let Some(next) = lines.get(*pos) {
                if next.indent <= line.indent {
                    break;
                }
                node.raw.push(*next);
                *pos += 1;
            }
        } else if let Some(next) = lines.get(*pos).copied() {
            if next.indent > line.indent {
                node.children = build(lines, pos, next.indent)?;
            }
        }
        nodes.push(node);
    }
    Ok(nodes)
}

/// 将 Pug 源码渲染为 HTML。
pub fn render(source: &str) -> Result<String, Exception> {
    let lines = split_lines(source);
    let mut pos = 0;
    let indent = lines.first().map_or(0, |l| l.indent);
    let nodes = build(&lines, &mut pos, indent)?;
    if let Some(line) = lines.get(pos) {
        return Err(syntax(line.number, "inconsistent indentation"));
    }

    let mut out = String::new();
    render_nodes(&nodes, &mut out)?;
    Ok(out)
}

pub fn render_file(path: &Path) -> Result<String, Exception> {
    let source = fs::read_to_string(path).map_err(|e| Exception::ReadFailed(e.to_string()))?;
    render(&source)
}

fn render_nodes(nodes: &[Node], out: &mut String) -> Result<(), Exception> {
    render_nodes_after(nodes, out, false)
}

/// `prev_text` 为真时，紧随其后的文本行前插入换行
fn render_nodes_after(nodes: &[Node], out: &mut String, mut prev_text: bool) -> Result<(), Exception> {
    for node in nodes {
        prev_text = render_line(node.line, &node.children, &node.raw, out, prev_text)?;
    }
    Ok(())
}

/// 渲染一行及其子节点，返回该行是否为纯文本
fn render_line(
    line: Line,
    children: &[Node],
    raw: &[Line],
    out: &mut String,
    prev_text: bool,
) -> Result<bool, Exception> {
    let text = line.text;

    if text.starts_with("//-") {
        return Ok(false);
    }
    if let Some(comment) = text.strip_prefix("//") {
        out.push_str("<!--");
        out.push_str(comment);
        for raw_line in dedent(raw) {
            out.push('\n');
            out.push_str(&raw_line);
        }
        out.push_str("-->");
        return Ok(false);
    }
    if let Some(piped) = text.strip_prefix('|') {
        if let Some(child) = children.first() {
            return Err(syntax(child.line.number, "piped text can't have nested content"));
        }
        let piped = piped.strip_prefix(' ').unwrap_or(piped);
        check_text(piped, line.number)?;
        if prev_text {
            out.push('\n');
        }
        out.push_str(piped);
        return Ok(true);
    }
    if text.starts_with('<') {
        out.push_str(text);
        render_nodes(children, out)?;
        return Ok(false);
    }

    let keyword = first_word(text);
    if keyword == "doctype" {
        match text["doctype".len()..].trim() {
            "" | "html" => out.push_str("<!DOCTYPE html>"),
            "xml" => out.push_str(r#"<?xml version="1.0" encoding="utf-8" ?>"#),
            other => {
                out.push_str("<!DOCTYPE ");
                out.push_str(other);
                out.push('>');
            }
        }
        return Ok(false);
    }
    if text.starts_with('-')
        || text.starts_with('=')
        || text.starts_with("!=")
        || text.starts_with('+')
        || UNSUPPORTED_KEYWORDS.contains(&keyword)
    {
        return Err(syntax(line.number, format!("unsupported construct `{}`", keyword)));
    }

    let head = parse_head(text, line.number)?;
    render_tag(&head, line, children, raw, out)?;
    Ok(false)
}

fn render_tag(
    head: &Head,
    line: Line,
    children: &[Node],
    raw: &[Line],
    out: &mut String,
) -> Result<(), Exception> {
    let rest = head.rest.as_str();
    let self_closing = rest == "/";

    out.push('<');
    out.push_str(&head.name);
    write_attributes(head, out);

    if self_closing || VOID_ELEMENTS.contains(&head.name.as_str()) {
        if !children.is_empty() || !(rest.is_empty() || self_closing) {
            return Err(syntax(
                line.number,
                format!("`{}` can't have content", head.name),
            ));
        }
        out.push_str(if self_closing { "/>" } else { ">" });
        return Ok(());
    }
    out.push('>');

    if rest.is_empty() {
        render_nodes(children, out)?;
    } else if rest == "." {
        write_block_text(raw, out)?;
    } else if let Some(expansion) = rest.strip_prefix(':') {
        let inner = Line {
            text: expansion.trim_start(),
            ..line
        };
        if inner.text.is_empty() {
            return Err(syntax(line.number, "nothing after `:`"));
        }
        render_line(inner, children, raw, out, false)?;
    } else if let Some(inline) = rest.strip_prefix(' ') {
        check_text(inline, line.number)?;
        out.push_str(inline);
        render_nodes_after(children, out, true)?;
    } else {
        return Err(syntax(line.number, format!("unexpected `{}`", rest)));
    }

    out.push_str("</");
    out.push_str(&head.name);
    out.push('>');
    Ok(())
}

fn write_attributes(head: &Head, out: &mut String) {
    if !head.classes.is_empty() {
        out.push_str(" class=\"");
        out.push_str(&escape_attribute(&head.classes.join(" ")));
        out.push('"');
    }
    if let Some(id) = &head.id {
        out.push_str(" id=\"");
        out.push_str(&escape_attribute(id));
        out.push('"');
    }
    for (name, value) in &head.attrs {
        match value {
            AttrValue::Bool(false) => {}
            AttrValue::Bool(true) => {
                out.push(' ');
                out.push_str(name);
            }
            AttrValue::Text { value, escaped } => {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                if *escaped {
                    out.push_str(&escape_attribute(value));
                } else {
                    out.push_str(value);
                }
                out.push('"');
            }
        }
    }
}

fn write_block_text(raw: &[Line], out: &mut String) -> Result<(), Exception> {
    for line in raw {
        check_text(line.text, line.number)?;
    }
    out.push_str(&dedent(raw).join("\n"));
    Ok(())
}

/// 去掉公共缩进，保留相对缩进
fn dedent(raw: &[Line]) -> Vec<String> {
    let base = raw.iter().map(|l| l.indent).min().unwrap_or(0);
    raw.iter()
        .map(|l| format!("{}{}", " ".repeat(l.indent - base), l.text))
        .collect()
}

fn check_text(text: &str, number: usize) -> Result<(), Exception> {
    if text.contains("#{") || text.contains("!{") || text.contains("#[") {
        return Err(syntax(number, "interpolation is not supported"));
    }
    Ok(())
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 解析标签名、简写与属性列表，剩余部分留在 `rest`
fn parse_head(text: &str, number: usize) -> Result<Head, Exception> {
    let mut cursor = Cursor::new(text);
    let mut head = Head::default();
    if cursor.peek().map_or(false, |c| c.is_ascii_alphabetic()) {
        head.name = cursor.take_while(is_name_char);
    }
    loop {
        match (cursor.peek(), cursor.peek_at(1)) {
            (Some('#'), Some(c)) if is_name_char(c) => {
                cursor.bump();
                head.id = Some(cursor.take_while(is_name_char));
            }
            (Some('.'), Some(c)) if is_name_char(c) => {
                cursor.bump();
                head.classes.push(cursor.take_while(is_name_char));
            }
            _ => break,
        }
    }
    if head.name.is_empty() {
        if head.id.is_none() && head.classes.is_empty() {
            return Err(syntax(number, format!("unexpected text `{}`", text)));
        }
        head.name = "div".to_string();
    }
    if cursor.peek() == Some('(') {
        cursor.bump();
        parse_attributes(&mut cursor, &mut head, number)?;
    }
    head.rest = cursor.rest();
    Ok(head)
}

fn parse_attributes(cursor: &mut Cursor, head: &mut Head, number: usize) -> Result<(), Exception> {
    loop {
        cursor.take_while(|c| c.is_whitespace() || c == ',');
        match cursor.peek() {
            None => return Err(syntax(number, "unclosed attribute list")),
            Some(')') => {
                cursor.bump();
                return Ok(());
            }
            Some(_) => {}
        }

        let name = cursor.take_while(|c| !c.is_whitespace() && !matches!(c, '=' | ',' | ')' | '!' | '('));
        if name.is_empty() {
            let c = cursor.peek().unwrap_or(' ');
            return Err(syntax(number, format!("unexpected `{}` in attributes", c)));
        }
        cursor.take_while(char::is_whitespace);

        let escaped = match (cursor.peek(), cursor.peek_at(1)) {
            (Some('='), _) => {
                cursor.bump();
                Some(true)
            }
            (Some('!'), Some('=')) => {
                cursor.bump();
                cursor.bump();
                Some(false)
            }
            _ => None,
        };
        let value = match escaped {
            None => AttrValue::Bool(true),
            Some(escaped) => {
                cursor.take_while(char::is_whitespace);
                parse_value(cursor, escaped, number)?
            }
        };
        head.add_attribute(name, value);
    }
}

fn parse_value(cursor: &mut Cursor, escaped: bool, number: usize) -> Result<AttrValue, Exception> {
    match cursor.peek() {
        Some(quote) if quote == '"' || quote == '\'' => {
            cursor.bump();
            let mut value = String::new();
            loop {
                match cursor.bump() {
                    None => return Err(syntax(number, "unterminated string")),
                    Some('\\') => match cursor.bump() {
                        Some(c) => value.push(c),
                        None => return Err(syntax(number, "unterminated string")),
                    },
                    Some(c) if c == quote => break,
                    Some(c) => value.push(c),
                }
            }
            Ok(AttrValue::Text { value, escaped })
        }
        _ => {
            let token = cursor.take_while(|c| !c.is_whitespace() && c != ',' && c != ')');
            match token.as_str() {
                "true" => Ok(AttrValue::Bool(true)),
                "false" => Ok(AttrValue::Bool(false)),
                t if !t.is_empty() && t.parse::<f64>().is_ok() => {
                    Ok(AttrValue::Text { value: token, escaped })
                }
                _ => Err(syntax(
                    number,
                    format!("unsupported attribute expression `{}`", token),
                )),
            }
        }
    }
}
