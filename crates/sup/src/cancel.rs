// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative cancellation.
//!
//! A [`CancelToken`] is shared by a reader and the threads it spawns. Long
//! running loops call [`CancelToken::check`] at their suspension points
//! (frame boundaries, batch boundaries, segment loads) and unwind with
//! [`Error::Canceled`].

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Clone is an `Arc` increment.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(Canceled)` once [`cancel`](Self::cancel) has been called.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_cancel_is_shared() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());
        token.cancel();
        let err = worker.check().expect_err("canceled");
        assert_eq!(err.kind(), ErrorKind::Canceled);
    }
}
