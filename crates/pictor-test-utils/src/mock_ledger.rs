// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory ledger for deterministic testing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use pictor_core::types::{AdapterType, HealthStatus};
use pictor_core::{Ledger, PictorError, PluginAdapter};

/// A ledger keeping balances in a map, with counters for each operation
/// and switches that make an operation fail.
#[derive(Debug, Default)]
pub struct MockLedger {
    balances: Mutex<HashMap<(String, String), f64>>,
    calls: AtomicUsize,
    charges: AtomicUsize,
    gains: AtomicUsize,
    fail_balance: AtomicBool,
    fail_charge: AtomicBool,
    fail_gain: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, user_id: &str, currency: &str, amount: f64) {
        self.map()
            .insert((user_id.to_string(), currency.to_string()), amount);
    }

    /// Balance without counting a call.
    pub fn balance_of(&self, user_id: &str, currency: &str) -> f64 {
        self.map()
            .get(&(user_id.to_string(), currency.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Successful charges.
    pub fn charges(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Successful gains.
    pub fn gains(&self) -> usize {
        self.gains.load(Ordering::SeqCst)
    }

    /// Every call, successful or not, including balance reads.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_balance_reads(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    /// Failing charges report insufficient balance.
    pub fn fail_charges(&self, fail: bool) {
        self.fail_charge.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gains(&self, fail: bool) {
        self.fail_gain.store(fail, Ordering::SeqCst);
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), f64>> {
        self.balances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PluginAdapter for MockLedger {
    fn name(&self) -> &str {
        "mock-ledger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Ledger
    }

    async fn health_check(&self) -> Result<HealthStatus, PictorError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PictorError> {
        Ok(())
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn balance(&self, user_id: &str, currency: &str) -> Result<f64, PictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(PictorError::Internal("mock balance read failure".into()));
        }
        Ok(self.balance_of(user_id, currency))
    }

    async fn charge(&self, user_id: &str, amount: f64, currency: &str) -> Result<(), PictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut map = self.map();
        let entry = map
            .entry((user_id.to_string(), currency.to_string()))
            .or_insert(0.0);
        if self.fail_charge.load(Ordering::SeqCst) || *entry < amount {
            return Err(PictorError::InsufficientBalance {
                needed: amount,
                current_balance: Some(*entry),
                currency: currency.to_string(),
            });
        }
        *entry -= amount;
        self.charges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn gain(&self, user_id: &str, amount: f64, currency: &str) -> Result<(), PictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_gain.load(Ordering::SeqCst) {
            return Err(PictorError::Internal("mock gain failure".into()));
        }
        *self
            .map()
            .entry((user_id.to_string(), currency.to_string()))
            .or_insert(0.0) += amount;
        self.gains.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
