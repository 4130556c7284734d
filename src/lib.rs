//! 多后端补全接口统一调度库
//!
//! One call shape in, one of four backend conventions out: chat-style, free-form
//! prompt, batch instances, or Claude-style text completion.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod provider;
pub mod stream;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use dispatch::{Dispatcher, Route, dispatch};
pub use error::LLMError;
pub use provider::{DynStrategy, TransportStrategy};
pub use types::*;
