//! Bundled front-end resources / 内置前端资源

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use rust_embed::RustEmbed;

use crate::mime::mime_for_path;

/// Front-end files compiled into the binary / 编译时嵌入的前端文件
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct WebAssets;

/// Serve a bundled resource, `/` maps to `index.html` / 返回内置资源
///
/// `None` when no such resource exists, so the caller can try other handlers.
pub fn serve_asset(uri_path: &str) -> Option<Response> {
    let path = match uri_path.trim_start_matches('/') {
        "" => "index.html",
        other => other,
    };
    let content = WebAssets::get(path)?;
    let mime = mime_for_path(path);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_LENGTH, content.data.len())
        .body(Body::from(content.data.into_owned()))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_maps_to_index() {
        let resp = serve_asset("/").unwrap();
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html");
    }

    #[test]
    fn test_asset_mime_types() {
        let css = serve_asset("/style.css").unwrap();
        assert_eq!(css.headers()[header::CONTENT_TYPE], "text/css");
        let js = serve_asset("/app.js").unwrap();
        assert_eq!(js.headers()[header::CONTENT_TYPE], "application/x-javascript");
    }

    #[test]
    fn test_missing_asset() {
        assert!(serve_asset("/missing.png").is_none());
    }
}
