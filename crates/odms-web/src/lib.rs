//! # ODMS Web
//!
//! 分配引擎的HTTP服务封装。路由映射属于表现层关注点，
//! 核心契约始终是引擎API本身。

pub mod access;
pub mod handlers;
pub mod server;

pub use access::{AccessPolicy, Capability, CallerRole};
pub use server::{AppState, WebServer};
