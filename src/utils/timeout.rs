//! Timeout helpers for connect and reply waits.

use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::error::{ProtocolError, Result};

/// Default time allowed for connecting to a service socket
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `fut`, mapping an elapsed deadline to `ProtocolError::Timeout`.
///
/// With no deadline the future is awaited to completion.
pub async fn with_optional_timeout<F, T>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => time::timeout(limit, fut)
            .await
            .map_err(|_| ProtocolError::Timeout)?,
        None => fut.await,
    }
}
