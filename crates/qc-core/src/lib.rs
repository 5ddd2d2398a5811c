//! # CXR QC Core
//!
//! 胸片质控系统的核心模块，提供领域模型、错误定义、过滤条件和记录存储接口。

pub mod error;
pub mod filter;
pub mod models;
pub mod store;
pub mod utils;

pub use error::{QcError, Result};
pub use filter::SummaryFilter;
pub use models::*;
pub use store::{MemoryStore, RecordStore};
