//! Typed trigger/result storage operations
//!
//! Wraps the raw Redis client with the record-level operations the scheduler,
//! workers, and client SDK share. Trigger and preference records are stored
//! as msgpack blobs; due-ness and deferred deletion are indexed by sorted
//! sets scored with unix timestamps, and claiming an indexed member is a
//! plain `ZREM` whose boolean reply makes each member processable by exactly
//! one scheduler replica.

use crate::storage::{Keys, RedisClient};
use crate::trigger::{GenerationJob, MealResult, MealTrigger};
use crate::windows::MealTimes;
use crate::{config, Error, Result};
use chrono::{DateTime, Utc};
use fred::prelude::{RedisKey, RedisValue};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: &RedisValue) -> Result<T> {
    let bytes = value
        .as_bytes()
        .ok_or_else(|| Error::Serialization("Stored record is not bytes".into()))?;
    rmp_serde::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

/// Typed store for triggers, preferences, results, and generation jobs.
#[derive(Clone)]
pub struct TriggerStore {
    redis: RedisClient,
}

impl TriggerStore {
    /// Create a new store over a Redis client.
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    /// Access the underlying Redis client.
    pub fn redis(&self) -> &RedisClient {
        &self.redis
    }

    // ─── Preferences ──────────────────────────────────────

    /// Persist a user's meal preferences. Written once at registration.
    pub async fn save_prefs(&self, user_id: i64, times: &MealTimes) -> Result<()> {
        let key: RedisKey = Keys::prefs(user_id).into();
        let data = encode(times)?;
        self.redis.set(key, RedisValue::Bytes(data.into())).await
    }

    /// Load a user's meal preferences.
    pub async fn load_prefs(&self, user_id: i64) -> Result<Option<MealTimes>> {
        let key: RedisKey = Keys::prefs(user_id).into();
        match self.redis.get(key).await? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    // ─── Triggers ─────────────────────────────────────────

    /// Create a user's trigger. Fails if one already exists: exactly one
    /// trigger per user, for the user's lifetime.
    pub async fn create_trigger(&self, trigger: &MealTrigger) -> Result<()> {
        let key: RedisKey = Keys::trigger(trigger.user_id).into();
        let data = encode(trigger)?;
        let created = self.redis.set_nx(key, RedisValue::Bytes(data.into())).await?;
        if !created {
            return Err(Error::Validation(format!(
                "trigger already exists for user {}",
                trigger.user_id
            )));
        }

        self.schedule(trigger.user_id, trigger.next_run_at).await
    }

    /// Load a user's trigger.
    pub async fn load_trigger(&self, user_id: i64) -> Result<Option<MealTrigger>> {
        let key: RedisKey = Keys::trigger(user_id).into();
        match self.redis.get(key).await? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Overwrite a user's trigger record.
    pub async fn save_trigger(&self, trigger: &MealTrigger) -> Result<()> {
        let key: RedisKey = Keys::trigger(trigger.user_id).into();
        let data = encode(trigger)?;
        self.redis.set(key, RedisValue::Bytes(data.into())).await
    }

    /// Index a user in the due set at the given run time.
    pub async fn schedule(&self, user_id: i64, at: DateTime<Utc>) -> Result<()> {
        let key: RedisKey = Keys::due().into();
        self.redis
            .zadd(key, user_id.to_string().into(), at.timestamp())
            .await
    }

    /// Users whose next run is due at or before `now`.
    pub async fn due_users(&self, now: DateTime<Utc>) -> Result<Vec<i64>> {
        let key: RedisKey = Keys::due().into();
        let members = self.redis.zrangebyscore(key, 0, now.timestamp()).await?;
        Ok(parse_user_ids(members, "due"))
    }

    /// Claim a due user. Returns false when another replica got there first.
    pub async fn claim_due(&self, user_id: i64) -> Result<bool> {
        let key: RedisKey = Keys::due().into();
        self.redis.zrem(key, user_id.to_string().into()).await
    }

    // ─── Deferred deletion ────────────────────────────────

    /// Index a user in the expiry set at its window-end deadline.
    pub async fn mark_expiry(&self, user_id: i64, at: DateTime<Utc>) -> Result<()> {
        let key: RedisKey = Keys::expiry().into();
        self.redis
            .zadd(key, user_id.to_string().into(), at.timestamp())
            .await
    }

    /// Users whose deferred-deletion deadline has passed.
    pub async fn expiry_due(&self, now: DateTime<Utc>) -> Result<Vec<i64>> {
        let key: RedisKey = Keys::expiry().into();
        let members = self.redis.zrangebyscore(key, 0, now.timestamp()).await?;
        Ok(parse_user_ids(members, "expiry"))
    }

    /// Claim an expiring user. Returns false when another replica got there first.
    pub async fn claim_expiry(&self, user_id: i64) -> Result<bool> {
        let key: RedisKey = Keys::expiry().into();
        self.redis.zrem(key, user_id.to_string().into()).await
    }

    // ─── Results ──────────────────────────────────────────

    /// Persist a freshly generated result.
    ///
    /// The record gets the configured safety-net TTL: deletion is driven by
    /// the trigger's pending-delete pointer, the TTL only drains orphans left
    /// behind by duplicate at-least-once dispatch.
    pub async fn store_result(&self, result: &MealResult) -> Result<()> {
        result.validate()?;

        let key: RedisKey = Keys::result(&result.id).into();
        let data = encode(result)?;
        self.redis.set(key.clone(), RedisValue::Bytes(data.into())).await?;
        self.redis.expire(key, config::get_result_ttl()).await?;

        let members_key: RedisKey = Keys::results(result.user_id).into();
        self.redis
            .sadd(members_key, result.id.as_str().into())
            .await?;
        Ok(())
    }

    /// Load a stored result.
    pub async fn load_result(&self, result_id: &str) -> Result<Option<MealResult>> {
        let key: RedisKey = Keys::result(result_id).into();
        match self.redis.get(key).await? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Physically remove a result and its membership entry.
    pub async fn delete_result(&self, user_id: i64, result_id: &str) -> Result<()> {
        let key: RedisKey = Keys::result(result_id).into();
        self.redis.del(vec![key]).await?;

        let members_key: RedisKey = Keys::results(user_id).into();
        self.redis.srem(members_key, result_id.into()).await?;
        Ok(())
    }

    /// All stored results for a user. Membership entries whose record was
    /// drained by the TTL backstop are pruned on the way through.
    pub async fn results_for_user(&self, user_id: i64) -> Result<Vec<MealResult>> {
        let members_key: RedisKey = Keys::results(user_id).into();
        let ids = self.redis.smembers(members_key.clone()).await?;

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_result(&id).await? {
                Some(result) => results.push(result),
                None => {
                    self.redis.srem(members_key.clone(), id.as_str().into()).await?;
                }
            }
        }
        Ok(results)
    }

    /// Point the user's trigger at a newly generated result.
    ///
    /// Idempotent under duplicate generation jobs: the later write wins. The
    /// superseded pointer is never deleted here; removal belongs to the
    /// scheduler tick's expiry pass alone.
    pub async fn set_current_result(&self, user_id: i64, result_id: &str) -> Result<()> {
        let mut trigger = self
            .load_trigger(user_id)
            .await?
            .ok_or(Error::TriggerNotFound(user_id))?;
        trigger.current_result_id = Some(result_id.to_string());
        self.save_trigger(&trigger).await
    }

    /// Flip a result's consumed flag.
    pub async fn mark_consumed(&self, user_id: i64, result_id: &str) -> Result<()> {
        let mut result = self
            .load_result(result_id)
            .await?
            .ok_or_else(|| Error::ResultNotFound(result_id.to_string()))?;

        if result.user_id != user_id {
            return Err(Error::Validation(format!(
                "result {} does not belong to user {}",
                result_id, user_id
            )));
        }

        result.consumed = true;
        let key: RedisKey = Keys::result(result_id).into();
        let data = encode(&result)?;
        self.redis.set(key.clone(), RedisValue::Bytes(data.into())).await?;
        self.redis.expire(key, config::get_result_ttl()).await?;
        Ok(())
    }

    // ─── Generation jobs ──────────────────────────────────

    /// Enqueue a generation job.
    pub async fn enqueue_job(&self, job: &GenerationJob) -> Result<()> {
        let envelope =
            serde_json::to_string(job).map_err(|e| Error::Serialization(e.to_string()))?;
        let key: RedisKey = Keys::jobs().into();
        self.redis.rpush(key, envelope.into()).await?;
        tracing::debug!("Job enqueued: {}", job.description());
        Ok(())
    }

    /// Blocking-pop the next generation job, if any arrives within the timeout.
    pub async fn dequeue_job(&self, timeout_secs: u64) -> Result<Option<GenerationJob>> {
        let key: RedisKey = Keys::jobs().into();
        match self.redis.blpop(key, timeout_secs).await? {
            Some((_, envelope)) => {
                let job: GenerationJob = serde_json::from_str(&envelope)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Park a failed job in the retry set, due again after `delay`.
    pub async fn schedule_job_retry(&self, job: &GenerationJob, delay: Duration) -> Result<()> {
        let envelope =
            serde_json::to_string(job).map_err(|e| Error::Serialization(e.to_string()))?;
        let execute_at = Utc::now().timestamp() + delay.as_secs() as i64;
        let key: RedisKey = Keys::retry().into();
        self.redis.zadd(key, envelope.into(), execute_at).await?;
        tracing::debug!("Job scheduled for retry in {:?}: {}", delay, job.description());
        Ok(())
    }

    /// Retry envelopes whose backoff delay has expired.
    pub async fn due_job_retries(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let key: RedisKey = Keys::retry().into();
        self.redis.zrangebyscore(key, 0, now.timestamp()).await
    }

    /// Claim a retry envelope and move it back onto the job queue.
    /// Returns false when another replica got there first.
    pub async fn requeue_retry(&self, envelope: &str) -> Result<bool> {
        let retry_key: RedisKey = Keys::retry().into();
        let removed = self.redis.zrem(retry_key, envelope.into()).await?;
        if removed {
            let jobs_key: RedisKey = Keys::jobs().into();
            self.redis.rpush(jobs_key, envelope.into()).await?;
        }
        Ok(removed)
    }

    // ─── Events ───────────────────────────────────────────

    /// Publish a ready-notification for a user's freshly generated meals.
    pub async fn publish_generated(&self, user_id: i64) -> Result<()> {
        self.publish_user_event(Keys::generated_channel(), user_id).await
    }

    /// Publish an invalidation after an expired result was removed.
    pub async fn publish_invalidated(&self, user_id: i64) -> Result<()> {
        self.publish_user_event(Keys::invalidated_channel(), user_id).await
    }

    async fn publish_user_event(&self, channel: &str, user_id: i64) -> Result<()> {
        let payload = serde_json::json!({ "userId": user_id }).to_string();
        self.redis.publish(channel, payload.into()).await?;
        Ok(())
    }

    // ─── Stats ────────────────────────────────────────────

    /// Operational counts for the inspector and metrics.
    pub async fn stats(&self) -> Result<StoreStats> {
        let scheduled = self.redis.zcard(Keys::due().into()).await?;
        let expiring = self.redis.zcard(Keys::expiry().into()).await?;
        let pending_jobs = self.redis.llen(Keys::jobs().into()).await?;
        let retry_jobs = self.redis.zcard(Keys::retry().into()).await?;

        Ok(StoreStats {
            scheduled,
            expiring,
            pending_jobs,
            retry_jobs,
        })
    }
}

fn parse_user_ids(members: Vec<String>, index: &str) -> Vec<i64> {
    members
        .into_iter()
        .filter_map(|m| match m.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("Discarding malformed member '{}' in {} index", m, index);
                None
            }
        })
        .collect()
}

/// Counts of indexed scheduling state.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Users with a scheduled next run
    pub scheduled: u64,
    /// Users with a pending deferred deletion
    pub expiring: u64,
    /// Generation jobs waiting in the queue
    pub pending_jobs: u64,
    /// Generation jobs parked for retry
    pub retry_jobs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_ids_discards_garbage() {
        let ids = parse_user_ids(
            vec!["42".to_string(), "nope".to_string(), "7".to_string()],
            "due",
        );
        assert_eq!(ids, vec![42, 7]);
    }

    #[tokio::test]
    #[ignore = "Requires Redis server"]
    async fn test_trigger_round_trip() {
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let store = TriggerStore::new(RedisClient::from_url(&redis_url).await.unwrap());

        let user_id = 900_001;
        let trigger = MealTrigger::new(
            user_id,
            Utc::now() + chrono::Duration::hours(1),
            crate::windows::MealWindow::Lunch,
        );
        let _ = store.claim_due(user_id).await;
        let _ = store.redis.del(vec![Keys::trigger(user_id).into()]).await;

        store.create_trigger(&trigger).await.unwrap();
        let loaded = store.load_trigger(user_id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, user_id);
        assert_eq!(loaded.next_window, crate::windows::MealWindow::Lunch);

        // Second create must fail: one trigger per user.
        assert!(store.create_trigger(&trigger).await.is_err());

        let _ = store.claim_due(user_id).await;
        let _ = store.redis.del(vec![Keys::trigger(user_id).into()]).await;
    }
}
