//! 通用工具函数

use uuid::Uuid;

/// 验证请求ID生成器
///
/// 按实例注入到网关，而非进程级全局计数器
#[derive(Debug, Clone, Default)]
pub struct RequestIdGenerator;

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// 验证证据CID格式
///
/// 接受 CIDv0（Qm开头，46字符）与 CIDv1（bafy开头）
pub fn is_valid_evidence_cid(cid: &str) -> bool {
    if cid.is_empty() || cid.len() > 128 {
        return false;
    }
    let base58_ok = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric());
    (cid.starts_with("Qm") && cid.len() == 46 && base58_ok(cid))
        || (cid.starts_with("bafy") && base58_ok(cid))
}
