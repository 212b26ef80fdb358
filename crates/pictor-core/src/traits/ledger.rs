// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger trait for per-user, per-currency balances.

use async_trait::async_trait;

use crate::error::PictorError;
use crate::traits::adapter::PluginAdapter;

/// Balance keeping for generation fees.
///
/// Implementations must serialize concurrent `charge`/`gain` calls for the
/// same `(user, currency)` pair and make `charge` an atomic
/// compare-and-decrement: a charge either fully succeeds or leaves the
/// balance untouched.
#[async_trait]
pub trait Ledger: PluginAdapter {
    /// Current balance; unknown accounts read as `0`.
    async fn balance(&self, user_id: &str, currency: &str) -> Result<f64, PictorError>;

    /// Deducts `amount`. Fails with [`PictorError::InsufficientBalance`]
    /// when the account cannot cover it.
    async fn charge(&self, user_id: &str, amount: f64, currency: &str) -> Result<(), PictorError>;

    /// Credits `amount` (refunds and grants).
    async fn gain(&self, user_id: &str, amount: f64, currency: &str) -> Result<(), PictorError>;
}
