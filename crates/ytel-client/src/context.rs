// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cancellation and deadlines for client calls.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

/// Cancellation scope for one or more client calls.
///
/// A context is a [`CancellationToken`] plus an optional deadline. Derived
/// contexts ([`child`](Self::child), [`with_timeout`](Self::with_timeout))
/// are cancelled with their parent and never outlive its deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A fresh context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Child context sharing this context's deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Child context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context that expires at `deadline` (or the parent's, if sooner).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is finished, or `None` while it is live.
    pub fn err(&self) -> Option<ClientError> {
        if self.token.is_cancelled() {
            Some(ClientError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ClientError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Fail fast when the context is already finished.
    pub fn check(&self) -> Result<(), ClientError> {
        self.err().map_or(Ok(()), Err)
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ClientError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.token.cancelled() => ClientError::Cancelled,
                () = tokio::time::sleep_until(deadline) => ClientError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ClientError::Cancelled
            }
        }
    }
}
