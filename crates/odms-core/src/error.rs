//! 错误定义模块

use thiserror::Error;

/// ODMS系统统一错误类型
#[derive(Error, Debug)]
pub enum OdmsError {
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("重复条目: {0}")]
    DuplicateEntry(String),

    #[error("不满足业务前置条件: {0}")]
    NotEligible(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidState { from: String, event: String },

    #[error("验证请求已在处理中: {0}")]
    AlreadyPending(String),

    #[error("未找到匹配候选人: {0}")]
    NoCandidate(String),

    #[error("权限不足: {0}")]
    Permission(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("注册中心不可用: {0}")]
    Registry(String),

    #[error("预言机网关不可用: {0}")]
    Gateway(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl OdmsError {
    /// 基础设施故障，调用方应退避重试；区别于可局部恢复的业务错误
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            OdmsError::Registry(_) | OdmsError::Gateway(_) | OdmsError::Network(_)
        )
    }
}

/// ODMS系统统一结果类型
pub type Result<T> = std::result::Result<T, OdmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_classification() {
        assert!(OdmsError::Registry("connection refused".to_string()).is_infrastructure());
        assert!(OdmsError::Gateway("timeout".to_string()).is_infrastructure());
        assert!(!OdmsError::NotEligible("organ not available".to_string()).is_infrastructure());
        assert!(!OdmsError::DuplicateEntry("entry exists".to_string()).is_infrastructure());
    }
}
