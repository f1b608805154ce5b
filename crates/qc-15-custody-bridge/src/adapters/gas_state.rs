//! Gas-metered chain state.
//!
//! Wraps any `ChainState` and charges a flat cost per call plus a per-byte cost
//! against the block's gas budget. The flat charge is checked before the call;
//! the per-byte charge is applied after it and may overflow the budget, which
//! makes the next call fail.

use crate::domain::StoreError;
use crate::ports::ChainState;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use tracing::warn;

/// Gas units.
pub type Gas = u64;

/// Cost table.
pub mod costs {
    use super::Gas;

    /// Flat cost of a read.
    pub const READ_FLAT: Gas = 20;
    /// Per byte read.
    pub const READ_BYTES: Gas = 2;
    /// Flat cost of a write.
    pub const WRITE_FLAT: Gas = 200;
    /// Per byte written.
    pub const WRITE_BYTES: Gas = 20;
    /// Existence check.
    pub const CHECK_EXIST: Gas = 20;
    /// Delete.
    pub const DELETE: Gas = 50;
}

/// Tracks gas consumed against a limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasCalculator {
    limit: Gas,
    consumed: Gas,
}

impl GasCalculator {
    /// Fresh calculator with `limit`.
    pub fn new(limit: Gas) -> Self {
        Self { limit, consumed: 0 }
    }

    /// Charge `amount * unit`.
    ///
    /// Without `allow_overflow` the charge is refused once the budget is used up.
    pub fn consume(&mut self, amount: u64, unit: Gas, allow_overflow: bool) -> Result<(), StoreError> {
        if !allow_overflow && self.is_exhausted() {
            return Err(StoreError::GasLimitExceeded {
                consumed: self.consumed,
                limit: self.limit,
            });
        }
        self.consumed = self.consumed.saturating_add(amount.saturating_mul(unit));
        Ok(())
    }

    /// Budget used up.
    pub fn is_exhausted(&self) -> bool {
        self.consumed >= self.limit
    }

    /// Configured limit.
    pub fn limit(&self) -> Gas {
        self.limit
    }

    /// Gas consumed so far.
    pub fn consumed(&self) -> Gas {
        self.consumed
    }
}

/// `ChainState` decorator charging gas for every call.
pub struct GasMeteredState<S> {
    inner: S,
    gas: Mutex<GasCalculator>,
}

impl<S: ChainState> GasMeteredState<S> {
    /// Wrap `inner` with a budget of `limit`.
    pub fn new(inner: S, limit: Gas) -> Self {
        Self {
            inner,
            gas: Mutex::new(GasCalculator::new(limit)),
        }
    }

    /// Start a new block with a fresh budget.
    pub fn reset(&self, limit: Gas) {
        *self.gas.lock() = GasCalculator::new(limit);
    }

    /// Gas consumed in the current block.
    pub fn consumed(&self) -> Gas {
        self.gas.lock().consumed()
    }

    /// Current calculator snapshot.
    pub fn calculator(&self) -> GasCalculator {
        *self.gas.lock()
    }

    /// Wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn charge(&self, amount: u64, unit: Gas) -> Result<(), StoreError> {
        let result = self.gas.lock().consume(amount, unit, false);
        if let Err(ref e) = result {
            warn!("[qc-15] {}", e);
        }
        result
    }

    fn charge_bytes(&self, len: usize, unit: Gas) {
        // Overflow allowed: never fails.
        let _ = self.gas.lock().consume(len as u64, unit, true);
    }
}

impl<S: ChainState> ChainState for GasMeteredState<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.charge(1, costs::READ_FLAT)?;
        let value = self.inner.get(key)?;
        if let Some(v) = &value {
            self.charge_bytes(v.len(), costs::READ_BYTES);
        }
        Ok(value)
    }

    fn set(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.charge(1, costs::WRITE_FLAT)?;
        let len = value.len();
        self.inner.set(key, value)?;
        self.charge_bytes(len, costs::WRITE_BYTES);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.charge(1, costs::CHECK_EXIST)?;
        self.inner.exists(key)
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.charge(1, costs::DELETE)?;
        self.inner.remove(key)
    }

    fn iterate_range(
        &self,
        start: &[u8],
        end: &[u8],
        ascending: bool,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError> {
        self.charge(1, costs::READ_FLAT)?;

        let mut exceeded = None;
        self.inner.iterate_range(start, end, ascending, &mut |k, v| {
            if let Err(e) = self.charge(1, costs::READ_FLAT) {
                exceeded = Some(e);
                return ControlFlow::Break(());
            }
            self.charge_bytes(v.len(), costs::READ_BYTES);
            visit(k, v)
        })?;

        match exceeded {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
