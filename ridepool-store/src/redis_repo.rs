use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};

use ridepool_domain::repository::{AttemptStore, RepoError};

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Claim a booking attempt by idempotency key. SET NX: only the first
    /// attempt with a given key wins; retries see `false` and must not
    /// decrement seats again.
    pub async fn claim_booking_attempt(
        &self,
        idempotency_key: &str,
        passenger_id: &str,
        ttl_seconds: u64,
    ) -> Result<bool, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("booking:attempt:{}", idempotency_key);

        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(passenger_id)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    /// Release a claim after a failed commit so the client may retry with
    /// the same key.
    pub async fn release_booking_attempt(&self, idempotency_key: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("booking:attempt:{}", idempotency_key);
        conn.del(key).await
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

#[async_trait]
impl AttemptStore for RedisClient {
    async fn claim_attempt(
        &self,
        key: &str,
        owner: &str,
        ttl_seconds: u64,
    ) -> Result<bool, RepoError> {
        Ok(self.claim_booking_attempt(key, owner, ttl_seconds).await?)
    }

    async fn release_attempt(&self, key: &str) -> Result<(), RepoError> {
        self.release_booking_attempt(key).await?;
        Ok(())
    }
}
