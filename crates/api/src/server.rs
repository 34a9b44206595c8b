use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware::map_response,
    response::Response,
    Router,
};
use loadctl_dispatcher::ControlRequest;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::error;

use crate::router::ContextRouter;

pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=UTF-8";

/// HTTP应用状态
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ContextRouter>,
}

/// 创建HTTP应用，所有路径都交给上下文路由处理
pub fn create_app(router: Arc<ContextRouter>) -> Router {
    Router::new()
        .fallback(handle_control_request)
        .with_state(AppState { router })
        .layer(CompressionLayer::new())
        .layer(map_response(restore_content_length))
        .layer(TraceLayer::new_for_http())
}

/// 压缩会移除`Content-Length`，保持连接时按压缩后的内容重新计算
async fn restore_content_length(response: Response) -> Response {
    let keep_alive = response
        .headers()
        .get(header::CONNECTION)
        .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"keep-alive"));
    if !keep_alive || response.headers().contains_key(header::CONTENT_LENGTH) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            error!("读取压缩响应失败: {e}");
            parts.status = StatusCode::INTERNAL_SERVER_ERROR;
            parts.headers.remove(header::CONTENT_ENCODING);
            parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0));
            Response::from_parts(parts, Body::empty())
        }
    }
}

async fn handle_control_request(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let keep_alive = is_keep_alive(&headers);
    let form = (method == Method::POST).then_some(body.as_ref());
    let request = ControlRequest::from_parts(uri.path(), uri.query(), form, keep_alive);

    let document = state.router.dispatch(&request).await;
    build_response(document.to_bytes(), keep_alive)
}

/// 请求的`Connection`头是否为`keep-alive`
pub fn is_keep_alive(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONNECTION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().eq_ignore_ascii_case("keep-alive"))
        .unwrap_or(false)
}

/// 构造响应：保持连接时带上`Content-Length`，否则要求关闭连接
pub fn build_response(body: Vec<u8>, keep_alive: bool) -> Response {
    let length = body.len();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TEXT));
    if keep_alive {
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    } else {
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}
