//! # Transport Layer
//!
//! Connections to the backend services and the request/reply session that
//! runs over them.
//!
//! ## Components
//! - **Session**: sequence-numbered, one-in-flight request/reply cycle
//! - **Local**: Unix domain socket connect, plus a framed responder loop

#[cfg(unix)]
pub mod local;
pub mod session;

pub use session::Session;
