//! # CXR QC 数据库模块
//!
//! 基于PostgreSQL的持久化：连接池、建表、CRUD操作，以及 `RecordStore` 的数据库实现。

pub mod connection;
pub mod models;
pub mod queries;
pub mod store;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use models::*;
pub use queries::DatabaseQueries;
pub use store::PgRecordStore;
