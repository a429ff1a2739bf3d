//! Response construction for served assets and fallbacks.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::assets::ResolvedAsset;

/// Build the response for a resolved asset.
///
/// `Cache-Control` is only set when the asset carries a directive.
/// `cors` adds `Access-Control-Allow-Origin: *`.
pub fn asset_response(asset: ResolvedAsset, cors: bool) -> Response {
    let content_length = HeaderValue::from(asset.bytes.len());
    let content_type = HeaderValue::from_str(&asset.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let cache_control = asset
        .cache_directive
        .as_deref()
        .and_then(|directive| HeaderValue::from_str(directive).ok());

    let mut response = Response::new(Body::from(asset.bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, content_length);
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(cache_control) = cache_control {
        headers.insert(header::CACHE_CONTROL, cache_control);
    }
    if cors {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
    response
}

/// Empty icon served when no `/favicon.ico` exists.
pub fn blank_favicon() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/x-icon"),
            (header::CONTENT_LENGTH, "0"),
        ],
    )
        .into_response()
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
