//! Corrections: the only way the reconciliation mutates provider state.

use std::fmt;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Deferred mutation. Invoked at most once.
pub type CorrectionAction = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<()>> + Send>;

/// One atomic unit of change plus its human-readable description.
///
/// A correction without an action is informational (e.g. a skipped apex NS
/// change) and is reported but never applied.
pub struct Correction {
    pub message: String,
    /// Safe to re-run when the previous attempt is known to have failed
    /// before any server-side effect.
    pub retryable: bool,
    action: Option<CorrectionAction>,
}

impl Correction {
    pub fn new<F>(message: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(CancellationToken) -> BoxFuture<'static, Result<()>> + Send + 'static,
    {
        Self {
            message: message.into(),
            retryable: true,
            action: Some(Box::new(action)),
        }
    }

    pub fn informational(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            action: None,
        }
    }

    #[must_use]
    pub fn non_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }

    pub fn is_informational(&self) -> bool {
        self.action.is_none()
    }

    /// Run the action. Informational corrections succeed immediately.
    pub async fn apply(self, cancel: CancellationToken) -> Result<()> {
        match self.action {
            Some(action) => action(cancel).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correction")
            .field("message", &self.message)
            .field("retryable", &self.retryable)
            .field("informational", &self.is_informational())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn apply_runs_action_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let c = Correction::new("+ CREATE x", move |_cancel| {
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        });
        assert!(!c.is_informational());
        assert!(c.apply(CancellationToken::new()).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn informational_is_noop() {
        let c = Correction::informational("skip apex NS");
        assert!(c.is_informational());
        assert!(!c.retryable);
        assert!(c.apply(CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn action_sees_cancellation() {
        let c = Correction::new("- DELETE x", |cancel: CancellationToken| {
            async move {
                if cancel.is_cancelled() {
                    Err(crate::error::ProviderError::Cancelled {
                        provider: "memory".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            .boxed()
        })
        .non_retryable();
        assert!(!c.retryable);
        let token = CancellationToken::new();
        token.cancel();
        assert!(c.apply(token).await.is_err());
    }
}
