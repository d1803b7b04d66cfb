// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 在进程内驱动完整的请求流水线，不经过网络。

use std::fs;
use std::path::Path;

use md5::{Digest, Md5};
use tempfile::TempDir;

use mdserve::{Config, Request, Response, Server};

const TEMPLATE: &str = "<html>{{content}}</html>";

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("t.html"), TEMPLATE).unwrap();
    fs::write(root.join("index.md"), "# Hi").unwrap();
    fs::write(root.join("page.md"), "first").unwrap();
    fs::write(root.join("style.css"), "body { margin: 0 }").unwrap();
    fs::write(root.join("about.html"), "<p>about</p>").unwrap();
    fs::create_dir(root.join("about")).unwrap();
    fs::create_dir(root.join("docs")).unwrap();
    fs::write(root.join("docs/index.pug"), "ul\n  li one\n  li two\n").unwrap();
    fs::write(root.join("broken.pug"), "div\n  if user\n    p hi\n").unwrap();
    fs::write(root.join("old.redirect"), "  https://example.org/new \n").unwrap();
    fs::write(root.join("empty.redirect"), "\n").unwrap();
    fs::create_dir(root.join("private")).unwrap();
    fs::write(root.join("private/notes.md"), "secret notes").unwrap();
    dir
}

fn server(root: &Path, extra: &str) -> Server {
    let source = format!("template = \"t.html\"\nhost = \"example.org\"\n{}", extra);
    Server::new(Config::parse(&source, root).unwrap()).unwrap()
}

fn request(method: &str, path: &str, headers: &[(&str, &str)]) -> Request {
    let mut raw = format!("{} {} HTTP/1.1\r\nHost: example.org\r\n", method, path);
    for (name, value) in headers {
        raw.push_str(&format!("{}: {}\r\n", name, value));
    }
    Request::try_from(raw.as_bytes(), 0).unwrap()
}

fn get(server: &Server, path: &str) -> Response {
    server.respond(&request("GET", path, &[]), false, 0)
}

fn body(response: &Response) -> String {
    String::from_utf8(response.content().map(|b| b.to_vec()).unwrap_or_default()).unwrap()
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

fn digest_header(method: &str, path: &str, realm: &str, secret: &str) -> String {
    let (nonce, nc, cnonce, qop) = ("17f0c9a1", "00000001", "c0ffee", "auth");
    let ha1 = md5_hex(&format!("anyone:{}:{}", realm, secret));
    let ha2 = md5_hex(&format!("{}:{}", method, path));
    let response = md5_hex(&format!("{}:{}:{}:{}:{}:{}", ha1, nonce, nc, cnonce, qop, ha2));
    format!(
        "Digest username=\"anyone\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", qop={}, nc={}, cnonce=\"{}\", response=\"{}\"",
        realm, nonce, path, qop, nc, cnonce, response
    )
}

#[test]
fn test_index_markdown_wrapped_in_template() {
    let dir = site();
    let server = server(dir.path(), "");
    let response = get(&server, "/");

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
    assert_eq!(body(&response), "<html><h1>Hi</h1>\n</html>");
}

#[test]
fn test_extension_implicit_markdown() {
    let dir = site();
    let server = server(dir.path(), "");
    let response = get(&server, "/page");

    assert_eq!(response.status_code(), 200);
    assert_eq!(body(&response), "<html><p>first</p>\n</html>");
}

#[test]
fn test_literal_served_verbatim() {
    let dir = site();
    let server = server(dir.path(), "");

    let markdown = get(&server, "/index.md");
    assert_eq!(markdown.status_code(), 200);
    assert_eq!(body(&markdown), "# Hi");

    let css = get(&server, "/style.css");
    assert_eq!(css.status_code(), 200);
    assert_eq!(css.content_type(), Some("text/css; charset=utf-8"));
    assert_eq!(body(&css), "body { margin: 0 }");
}

#[test]
fn test_sibling_file_wins_over_directory() {
    let dir = site();
    let server = server(dir.path(), "");

    for path in ["/about", "/about/"] {
        let response = get(&server, path);
        assert_eq!(response.status_code(), 200, "{}", path);
        assert_eq!(body(&response), "<p>about</p>");
    }
}

#[test]
fn test_directory_without_slash_redirects() {
    let dir = site();
    let server = server(dir.path(), "");
    let response = get(&server, "/docs");

    assert_eq!(response.status_code(), 301);
    assert_eq!(response.location(), Some("/docs/"));
    assert!(response.content().is_none());
}

#[test]
fn test_directory_index_markup() {
    let dir = site();
    let server = server(dir.path(), "");
    let response = get(&server, "/docs/");

    assert_eq!(response.status_code(), 200);
    assert_eq!(body(&response), "<ul><li>one</li><li>two</li></ul>");
}

#[test]
fn test_redirect_file() {
    let dir = site();
    let server = server(dir.path(), "");

    let response = get(&server, "/old");
    assert_eq!(response.status_code(), 308);
    assert_eq!(response.location(), Some("https://example.org/new"));

    let empty = get(&server, "/empty");
    assert_eq!(empty.status_code(), 500);
}

#[test]
fn test_missing_path_is_404() {
    let dir = site();
    let server = server(dir.path(), "");
    let response = get(&server, "/nowhere/at/all");

    assert_eq!(response.status_code(), 404);
    assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
}

#[test]
fn test_traversal_rejected_before_cache() {
    let dir = site();
    let server = server(dir.path(), "cache_ttl = 5");

    assert_eq!(get(&server, "/../etc/passwd").status_code(), 400);
    assert_eq!(get(&server, "/docs/%2e%2e/%2e%2e/etc/passwd").status_code(), 400);
    assert_eq!(get(&server, "/a%00b").status_code(), 400);
    assert!(server.cache().is_empty());
}

#[test]
fn test_render_error_is_plain_text_500() {
    let dir = site();
    let server = server(dir.path(), "");
    let response = get(&server, "/broken");

    assert_eq!(response.status_code(), 500);
    assert_eq!(response.content_type(), Some("text/plain; charset=utf-8"));
    assert!(body(&response).contains("line 2"));
}

#[test]
fn test_cached_page_survives_edit_until_flush() {
    let dir = site();
    let server = server(dir.path(), "cache_ttl = 5");

    let first = get(&server, "/page");
    fs::write(dir.path().join("page.md"), "second").unwrap();
    let second = get(&server, "/page");
    assert_eq!(body(&first), body(&second));
    assert_eq!(server.cache().len(), 1);

    assert_eq!(server.flush_cache(), 1);
    let third = get(&server, "/page");
    assert_eq!(body(&third), "<html><p>second</p>\n</html>");
}

#[test]
fn test_render_error_cached_until_flush() {
    let dir = site();
    let server = server(dir.path(), "cache_ttl = -1");

    assert_eq!(get(&server, "/broken").status_code(), 500);
    fs::write(dir.path().join("broken.pug"), "p fixed\n").unwrap();
    assert_eq!(get(&server, "/broken").status_code(), 500);

    server.flush_cache();
    let fixed = get(&server, "/broken");
    assert_eq!(fixed.status_code(), 200);
    assert_eq!(body(&fixed), "<p>fixed</p>");
}

#[test]
fn test_disabled_cache_always_recomputes() {
    let dir = site();
    let server = server(dir.path(), "");

    get(&server, "/page");
    fs::write(dir.path().join("page.md"), "second").unwrap();
    assert_eq!(body(&get(&server, "/page")), "<html><p>second</p>\n</html>");
    assert!(server.cache().is_empty());
}

#[test]
fn test_cached_literal_reflects_disk() {
    let dir = site();
    let server = server(dir.path(), "cache_ttl = 5");

    assert_eq!(body(&get(&server, "/style.css")), "body { margin: 0 }");
    fs::write(dir.path().join("style.css"), "p { color: red }").unwrap();
    assert_eq!(body(&get(&server, "/style.css")), "p { color: red }");

    fs::remove_file(dir.path().join("style.css")).unwrap();
    assert_eq!(get(&server, "/style.css").status_code(), 404);
}

#[test]
fn test_secret_route_challenges_without_credentials() {
    let dir = site();
    let server = server(dir.path(), "cache_ttl = 5\n[secrets]\nprivate = \"hunter2\"\n");
    let response = get(&server, "/private/notes");

    assert_eq!(response.status_code(), 401);
    let challenge = response.www_authenticate().unwrap();
    assert!(challenge.starts_with("Digest "));
    assert!(challenge.contains("realm=\"example.org-private\""));
    assert!(challenge.contains("qop=\"auth,auth-int\""));
    assert!(server.cache().is_empty());
}

#[test]
fn test_secret_route_accepts_valid_digest() {
    let dir = site();
    let server = server(dir.path(), "cache_ttl = 5\n[secrets]\nprivate = \"hunter2\"\n");
    let header = digest_header("GET", "/private/notes", "example.org-private", "hunter2");
    let response = server.respond(
        &request("GET", "/private/notes", &[("Authorization", &header)]),
        false,
        0,
    );

    assert_eq!(response.status_code(), 200);
    assert_eq!(body(&response), "<html><p>secret notes</p>\n</html>");

    // 缓存命中也必须先通过认证
    assert_eq!(get(&server, "/private/notes").status_code(), 401);
}

#[test]
fn test_secret_route_not_bypassed_by_path_spelling() {
    let dir = site();
    let server = server(dir.path(), "cache_ttl = 5\n[secrets]\nprivate = \"hunter2\"\n");

    for path in ["//private/notes", "/./private/notes", "/.//private/./notes"] {
        let response = get(&server, path);
        assert_eq!(response.status_code(), 401, "{}", path);
        assert!(!body(&response).contains("secret notes"), "{}", path);
    }
    assert!(server.cache().is_empty());
}

#[test]
fn test_tls_secrets_redirect_not_bypassed_by_path_spelling() {
    let dir = site();
    let tls = "[secrets]\nprivate = \"hunter2\"\n[tls]\ncert = \"c.pem\"\nkey = \"k.pem\"\nrequired = \"secrets\"\n";
    let server = server(dir.path(), tls);

    assert_eq!(get(&server, "//private/notes").status_code(), 303);
    assert_eq!(get(&server, "/./private/notes").status_code(), 303);
}

#[test]
fn test_huge_cache_ttl_serves_and_caches() {
    let dir = site();
    let server = server(dir.path(), "cache_ttl = 200000000000000000");

    let response = get(&server, "/page");
    assert_eq!(response.status_code(), 200);
    assert_eq!(server.cache().len(), 1);
    assert_eq!(get(&server, "/page").status_code(), 200);
}

#[test]
fn test_wrong_password_rechallenged() {
    let dir = site();
    let server = server(dir.path(), "[secrets]\nprivate = \"hunter2\"\n");
    let header = digest_header("GET", "/private/notes", "example.org-private", "guess");
    let response = server.respond(
        &request("GET", "/private/notes", &[("Authorization", &header)]),
        false,
        0,
    );
    assert_eq!(response.status_code(), 401);
}

#[test]
fn test_tls_all_redirects_every_plain_request() {
    let dir = site();
    let tls = "cache_ttl = 5\n[secrets]\nprivate = \"hunter2\"\n[tls]\ncert = \"c.pem\"\nkey = \"k.pem\"\nport = 8443\nrequired = \"all\"\n";
    let server = server(dir.path(), tls);

    let response = get(&server, "/page?x=1");
    assert_eq!(response.status_code(), 303);
    assert_eq!(response.location(), Some("https://example.org:8443/page"));
    assert!(response.strict_transport_security().is_some());

    // 跳转先于认证
    assert_eq!(get(&server, "/private/notes").status_code(), 303);
    assert!(server.cache().is_empty());

    let secure = server.respond(&request("GET", "/page", &[]), true, 0);
    assert_eq!(secure.status_code(), 200);
    assert!(secure.strict_transport_security().is_some());
}

#[test]
fn test_tls_secrets_redirects_only_secret_routes() {
    let dir = site();
    let tls = "[secrets]\nprivate = \"hunter2\"\n[tls]\ncert = \"c.pem\"\nkey = \"k.pem\"\nrequired = \"secrets\"\n";
    let server = server(dir.path(), tls);

    let secret = get(&server, "/private/notes");
    assert_eq!(secret.status_code(), 303);
    assert_eq!(secret.location(), Some("https://example.org/private/notes"));

    let public = get(&server, "/page");
    assert_eq!(public.status_code(), 200);
    assert!(public.strict_transport_security().is_some());

    let secure = server.respond(&request("GET", "/private/notes", &[]), true, 0);
    assert_eq!(secure.status_code(), 401);
}

#[test]
fn test_no_hsts_without_tls() {
    let dir = site();
    let server = server(dir.path(), "");
    assert!(get(&server, "/").strict_transport_security().is_none());
}

#[test]
fn test_options_and_post() {
    let dir = site();
    let server = server(dir.path(), "");

    let options = server.respond(&request("OPTIONS", "/", &[]), false, 0);
    assert_eq!(options.status_code(), 204);
    assert!(options.allow().is_some());

    let post = server.respond(&request("POST", "/", &[]), false, 0);
    assert_eq!(post.status_code(), 405);
}

#[test]
fn test_head_keeps_length_without_body() {
    let dir = site();
    let server = server(dir.path(), "");
    let full = get(&server, "/");
    let head = server.respond(&request("HEAD", "/", &[]), false, 0);

    assert_eq!(head.status_code(), 200);
    assert!(head.content().is_none());
    assert_eq!(head.content_length(), full.content_length());
}

#[test]
fn test_head_reports_compressed_headers() {
    let dir = site();
    let server = server(dir.path(), "");
    let accept = [("Accept-Encoding", "gzip")];
    let full = server.respond(&request("GET", "/page", &accept), false, 0);
    let head = server.respond(&request("HEAD", "/page", &accept), false, 0);

    assert!(head.content().is_none());
    assert!(head.content_encoding().is_some());
    assert_eq!(head.content_encoding(), full.content_encoding());
    assert_eq!(head.content_length(), full.content_length());
}

#[test]
fn test_compressed_when_client_accepts() {
    let dir = site();
    let server = server(dir.path(), "");
    let response = server.respond(
        &request("GET", "/page", &[("Accept-Encoding", "gzip")]),
        false,
        0,
    );

    assert_eq!(response.status_code(), 200);
    assert!(response.content_encoding().is_some());
    assert_eq!(response.content_length(), response.content().unwrap().len() as u64);
}
