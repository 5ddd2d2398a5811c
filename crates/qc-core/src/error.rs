//! 错误定义模块

use thiserror::Error;

/// QC系统统一错误类型
///
/// 只有调用方需要区分的失败才出现在这里。可降级的输入问题（损坏的结果JSON、
/// 缺失的影像文件、不可用的字体、无法绘制的图表）在各组件内部就地处理，不会变成错误。
#[derive(Error, Debug)]
pub enum QcError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("报告渲染错误: {0}")]
    Render(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl QcError {
    /// 是否为“资源未找到”类错误
    pub fn is_not_found(&self) -> bool {
        matches!(self, QcError::NotFound(_))
    }
}

/// QC系统统一结果类型
pub type Result<T> = std::result::Result<T, QcError>;
