//! Time-bounded envelope opening
//!
//! Opening may run Argon2id, so it happens on the blocking pool. A timeout
//! surfaces as [`EnvelopeError::TransientFailure`] and touches nothing else;
//! the abandoned open finishes in the background and is discarded.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use veilform_core::{Envelope, EnvelopeError, EnvelopeResult, RecipientId, Sealable};
use veilform_crypto::{ContentCipher, Credential, Opener};

/// Open an envelope on the blocking pool, bounded by `timeout`
pub async fn open_with_timeout<T, C>(
    opener: Arc<Opener<C>>,
    envelope: Envelope<T>,
    reader: RecipientId,
    credential: Credential,
    timeout: Duration,
) -> EnvelopeResult<T>
where
    T: Sealable,
    C: ContentCipher + 'static,
{
    let task = tokio::task::spawn_blocking(move || opener.open(&envelope, &reader, &credential));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(EnvelopeError::transient(format!(
            "open task failed: {}",
            join_error
        ))),
        Err(_) => {
            warn!(
                kind = T::KIND,
                timeout_ms = timeout.as_millis() as u64,
                "Opening envelope timed out"
            );
            Err(EnvelopeError::transient(format!(
                "opening {} timed out after {:?}",
                T::KIND,
                timeout
            )))
        }
    }
}
