//! Request cancellation.
//!
//! Every navigation, submission and fetcher owns an [`AbortController`]. All
//! loaders of one navigation share clones of its [`AbortSignal`]; aborting the
//! controller is observed by every clone, immediately and permanently.

use tokio_util::sync::CancellationToken;

/// Owner side of a cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    token: CancellationToken,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal observing this controller.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            token: self.token.clone(),
        }
    }

    /// Abort every request holding this controller's signal. Idempotent.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Observer side handed to loaders and actions through
/// [`DataRequest::signal`](crate::loader::DataRequest).
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    /// A signal nothing can abort.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal is aborted. Never resolves for
    /// [`never`](Self::never).
    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }

    /// A controller that aborts with this signal but can also be aborted on
    /// its own without affecting the parent.
    pub fn child(&self) -> AbortController {
        AbortController {
            token: self.token.child_token(),
        }
    }
}
