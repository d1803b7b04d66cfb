// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod auth;
pub mod cache;
pub mod config;
pub mod content;
pub mod exception;
pub mod logging;
pub mod markup;
pub mod param;
pub mod request;
pub mod resolver;
pub mod response;
pub mod server;
pub mod tls;
pub mod util;

pub use auth::AuthGate;
pub use cache::ResponseCache;
pub use config::{CacheTtl, Config, Enforcement};
pub use content::{ContentRenderer, Outcome, Template};
pub use exception::Exception;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use resolver::{PathResolver, ResolvedTarget};
pub use response::Response;
pub use server::Server;
pub use util::HtmlBuilder;
