//! 会话存储
//!
//! 流水线只依赖 [`SessionStore`] 的读写约定；默认实现是带空闲过期的进程内存储。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::ExamSession;

pub trait SessionStore: Send + Sync {
    /// 保存新会话并分配会话 ID
    fn create(&self, session: ExamSession) -> String;

    /// 返回会话快照
    fn get(&self, session_id: &str) -> Option<ExamSession>;

    /// 在锁内修改会话，修改是原子的
    fn update(&self, session_id: &str, apply: &mut dyn FnMut(&mut ExamSession)) -> AppResult<()>;

    fn remove(&self, session_id: &str) -> bool;

    /// 清理空闲超过 `ttl` 的会话，返回清理数量
    fn expire_idle(&self, ttl: Duration) -> usize;
}

struct StoredSession {
    session: ExamSession,
    last_access: Instant,
}

/// 进程内会话存储，进程重启后数据丢失
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn expire_idle_at(&self, now: Instant, ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|id, stored| {
            let keep = now.saturating_duration_since(stored.last_access) <= ttl;
            if !keep {
                debug!("会话 {} 空闲超时，已清理", id);
            }
            keep
        });
        before - sessions.len()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, mut session: ExamSession) -> String {
        let session_id = Uuid::new_v4().to_string();
        session.session_id = session_id.clone();
        info!(
            "创建会话 {} ({}，{} 名学生)",
            session_id,
            session.session_name,
            session.students.len()
        );
        self.sessions.lock().insert(
            session_id.clone(),
            StoredSession {
                session,
                last_access: Instant::now(),
            },
        );
        session_id
    }

    fn get(&self, session_id: &str) -> Option<ExamSession> {
        let mut sessions = self.sessions.lock();
        let stored = sessions.get_mut(session_id)?;
        stored.last_access = Instant::now();
        Some(stored.session.clone())
    }

    fn update(&self, session_id: &str, apply: &mut dyn FnMut(&mut ExamSession)) -> AppResult<()> {
        let mut sessions = self.sessions.lock();
        let stored = sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        stored.last_access = Instant::now();
        apply(&mut stored.session);
        Ok(())
    }

    fn remove(&self, session_id: &str) -> bool {
        self.sessions.lock().remove(session_id).is_some()
    }

    fn expire_idle(&self, ttl: Duration) -> usize {
        self.expire_idle_at(Instant::now(), ttl)
    }
}
