//! # loadctl API
//!
//! 控制平面的HTTP入口：
//! - `router`: 按路径把控制请求分派给对应的上下文
//! - `server`: 基于Axum的HTTP应用，解码请求并按keep-alive设置响应头
//!
//! 响应始终为HTTP 200，内容类型为`text/plain; charset=UTF-8`，
//! 错误以条目形式写在响应文档的`errors`部分。

pub mod router;
pub mod server;

pub use router::{ContextRouter, ContextTable, RouterError};
pub use server::{build_response, create_app, is_keep_alive, AppState, CONTENT_TYPE_TEXT};
