use crate::PredictionResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// 会话级结果缓存。
///
/// 每个会话只保留最近一次的分类结果，供结果页重放；
/// 进程内存储，重启即清空。
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, PredictionResult>>>,
}

impl SessionStore {
    /// 写入会话的最新结果，覆盖上一次的
    pub fn put(&self, session_id: &str, result: PredictionResult) {
        self.inner.write().insert(session_id.to_string(), result);
    }

    /// 读取会话缓存的结果
    pub fn get(&self, session_id: &str) -> Option<PredictionResult> {
        self.inner.read().get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
