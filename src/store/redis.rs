//! Redis-backed store over a multiplexed tokio connection.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use url::Url;

use crate::config::CacheConfig;
use crate::store::{StoreConnection, StoreConnector, StoreError};

/// Builds the connection URL from the cache section.
///
/// Credentials are percent-encoded by `Url`; a username without a password
/// is ignored.
pub fn connection_url(config: &CacheConfig) -> Result<Url, StoreError> {
    let scheme = if config.tls { "rediss" } else { "redis" };
    let mut url = Url::parse(&format!("{scheme}://{}:{}", config.host, config.port))
        .map_err(|e| StoreError::Connect(format!("invalid address: {e}")))?;

    if let Some(password) = &config.password {
        if let Some(username) = &config.username {
            url.set_username(username)
                .map_err(|_| StoreError::Connect("invalid username".into()))?;
        }
        url.set_password(Some(password))
            .map_err(|_| StoreError::Connect("invalid password".into()))?;
    }

    Ok(url)
}

fn command_error(e: RedisError) -> StoreError {
    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error() {
        StoreError::Closed
    } else {
        StoreError::Command(e.to_string())
    }
}

pub struct RedisConnector {
    client: Client,
    endpoint: String,
}

impl RedisConnector {
    pub fn from_config(config: &CacheConfig) -> Result<Self, StoreError> {
        let url = connection_url(config)?;
        let client = Client::open(url.as_str()).map_err(|e| StoreError::Connect(e.to_string()))?;
        let scheme = if config.tls { "rediss" } else { "redis" };
        Ok(Self {
            client,
            endpoint: format!("{scheme}://{}:{}", config.host, config.port),
        })
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Box::new(RedisConnection { conn }))
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

/// Commands are pipelined over one socket; clones share it.
pub struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Command(format!("unexpected PING reply: {pong}")))
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(command_error)
    }

    async fn incr_and_ttl(&self, key: &str) -> Result<(i64, i64), StoreError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("INCR").arg(key).cmd("TTL").arg(key);
        let (count, ttl): (i64, i64) = pipe.query_async(&mut conn).await.map_err(command_error)?;
        Ok((count, ttl))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("QUIT")
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(())
    }
}
