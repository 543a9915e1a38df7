//! Employee sign-in, sign-out and session refresh.

pub mod handlers;
pub mod service;

pub use handlers::configure;
