use std::{future::Future, time::Duration};

use crate::error::{AppError, Res};

/// Runs a store or provider round-trip with an upper bound on its duration.
///
/// An elapsed call is reported as [`AppError::Timeout`], which callers treat
/// like any other dependency failure.
pub async fn bounded<T, E, F>(limit: Duration, what: &str, fut: F) -> Res<T>
where
    F: Future<Output = Result<T, E>>,
    AppError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Timeout(format!(
            "{} did not answer within {}s",
            what,
            limit.as_secs()
        ))),
    }
}
