//! 容错机制模块
//!
//! 提供超时控制和取消功能

mod timeout;

pub use timeout::{CancellationToken, TimeoutConfig, TimeoutController, TimeoutError};
