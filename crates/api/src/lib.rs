//! HTTP surface: realm resolution, session and protection middleware, routes.

pub mod app;
pub mod context;
pub mod gateway;
pub mod middleware;
pub mod realm;

pub use gateway::{AuthGateway, Protect};
