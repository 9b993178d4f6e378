use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain_ingest::{
    model::{
        entity::{SessionStatus, UploadSession},
        vo::SessionId,
    },
    repository::UploadSessionRepo,
};
use redis::Cmd;
use uuid::Uuid;

use crate::infrastructure::database::RedisRepository;

const ACTIVITY_KEY: &str = "ingest_session_activity";

fn session_key(id: &SessionId) -> String {
    format!("ingest_session_{id}")
}

fn session_lock_key(id: &SessionId) -> String {
    format!("lock_session_{id}")
}

impl RedisRepository {
    async fn load_session(&self, id: &SessionId) -> anyhow::Result<Option<UploadSession>> {
        let raw: Option<String> = self.client.query(&Cmd::get(session_key(id))).await?;
        Ok(match raw {
            Some(el) => Some(serde_json::from_str::<UploadSession>(&el)?),
            None => None,
        })
    }

    async fn save_session(&self, session: &UploadSession) -> anyhow::Result<()> {
        self.client
            .query::<()>(&Cmd::set(session_key(&session.id), serde_json::to_string(session)?))
            .await?;
        self.client
            .query::<()>(&Cmd::zadd(
                ACTIVITY_KEY,
                session.id.as_str(),
                session.last_activity_at.timestamp_millis(),
            ))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UploadSessionRepo for RedisRepository {
    async fn insert(&self, session: &UploadSession) -> anyhow::Result<()> {
        self.save_session(session).await
    }

    async fn get(&self, id: &SessionId) -> anyhow::Result<Option<UploadSession>> {
        self.load_session(id).await
    }

    async fn mark_received(
        &self,
        id: &SessionId,
        index: u64,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Option<UploadSession>> {
        self.locked(&session_lock_key(id), || async {
            let Some(mut session) = self.load_session(id).await? else {
                return Ok(None);
            };
            if session.status.accepts_chunks() && index < session.total_chunks {
                session.mark_received(index, at);
                self.save_session(&session).await?;
            }
            Ok(Some(session))
        })
        .await
    }

    async fn transition(
        &self,
        id: &SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
        handle_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        self.locked(&session_lock_key(id), || async {
            let Some(mut session) = self.load_session(id).await? else {
                return Ok(false);
            };
            if !session.transition(from, to, handle_id, at) {
                return Ok(false);
            }
            self.save_session(&session).await?;
            Ok(true)
        })
        .await
    }

    async fn delete(&self, id: &SessionId) -> anyhow::Result<()> {
        self.client.query::<()>(&Cmd::del(session_key(id))).await?;
        self.client.query::<()>(&Cmd::zrem(ACTIVITY_KEY, id.as_str())).await?;
        Ok(())
    }

    async fn list_idle(&self, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<UploadSession>> {
        let ids: Vec<String> = self
            .client
            .query(&Cmd::zrangebyscore(ACTIVITY_KEY, "-inf", cutoff.timestamp_millis()))
            .await?;
        let mut sessions = vec![];
        for raw in ids {
            let Some(id) = SessionId::parse(&raw) else {
                continue;
            };
            match self.load_session(&id).await? {
                Some(session) => sessions.push(session),
                None => self.client.query::<()>(&Cmd::zrem(ACTIVITY_KEY, raw)).await?,
            }
        }
        Ok(sessions)
    }
}
