use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

/// Redis connection wrapper
pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    pub async fn init(redis_url: &str) -> Result<Self, String> {
        let client =
            Client::open(redis_url).map_err(|e| format!("Failed to create Redis client: {}", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| format!("Failed to connect to Redis: {}", e))?;

        log::info!("Connected successfully to Redis");

        Ok(Self { connection })
    }

    pub fn get_connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

/// Token revocation and rate limiting
#[derive(Clone)]
pub struct RedisService {
    connection: MultiplexedConnection,
}

impl RedisService {
    pub fn new(client: &RedisClient) -> Self {
        Self {
            connection: client.get_connection(),
        }
    }

    // ============================================
    // Token revocation
    // ============================================

    /// Mark a token as revoked until it would have expired anyway
    pub async fn revoke_token(&self, token: &str, expiry_seconds: u64) -> Result<(), String> {
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(revoked_key(token), 1, expiry_seconds)
            .await
            .map_err(|e| format!("Failed to revoke token: {}", e))
    }

    pub async fn is_token_revoked(&self, token: &str) -> Result<bool, String> {
        let mut conn = self.connection.clone();
        conn.exists(revoked_key(token))
            .await
            .map_err(|e| format!("Failed to check token revocation: {}", e))
    }

    // ============================================
    // Rate Limiting Helper
    // ============================================

    /// Increment a rate limit counter
    pub async fn rate_limit_increment(
        &self,
        key: &str,
        window_seconds: u64,
    ) -> Result<u64, String> {
        let mut conn = self.connection.clone();
        let rate_key = rate_limit_key(key);

        let count: u64 = conn
            .incr(&rate_key, 1)
            .await
            .map_err(|e| format!("Failed to increment rate limit: {}", e))?;

        // Set expiry on first increment
        if count == 1 {
            conn.expire::<_, ()>(&rate_key, window_seconds as i64)
                .await
                .map_err(|e| format!("Failed to set rate limit expiry: {}", e))?;
        }

        Ok(count)
    }

    pub async fn is_rate_limited(
        &self,
        key: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> Result<bool, String> {
        let count = self.rate_limit_increment(key, window_seconds).await?;
        Ok(count > max_requests)
    }
}

fn revoked_key(token: &str) -> String {
    format!("revoked:{}", token)
}

fn rate_limit_key(key: &str) -> String {
    format!("ratelimit:{}", key)
}

pub async fn connect_to_redis(redis_url: &str) -> Result<RedisClient, String> {
    RedisClient::init(redis_url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(revoked_key("abc"), "revoked:abc");
        assert_eq!(rate_limit_key("comments:42"), "ratelimit:comments:42");
    }
}
