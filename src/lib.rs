//! A buffering "shield" proxy for streaming chat-completion APIs.
//!
//! The proxy accepts a POST, rewrites the body once (forced model, forced
//! streaming), then delivers it to the target endpoint with retries. Every
//! upstream response is buffered in full and scanned for error signatures
//! before a single byte is released to the client, so rate-limit errors that
//! arrive inside an otherwise-200 stream are retried instead of forwarded.

pub mod config;
pub mod detector;
pub mod normalizer;
pub mod proxy;
pub mod retry;
pub mod scanner;
pub mod upstream;
