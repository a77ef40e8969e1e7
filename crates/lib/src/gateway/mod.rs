//! Gateway: HTTP server for the Telegram webhook plus healthcheck and whoami.

mod server;

pub use server::{router, run_gateway, serve, AppState, SECRET_HEADER};
pub(crate) use server::shutdown_signal;
