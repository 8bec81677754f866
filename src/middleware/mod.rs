pub mod client_ctx;

pub use client_ctx::{ClientCtx, Identity};
