//! Korean won amounts and the shipping fee rule.
//!
//! KRW has no minor unit, so amounts are whole numbers stored as `i64`.
//! Arithmetic is checked: a cart large enough to overflow is rejected
//! rather than wrapped.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Subtotal at or above which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Won = Won(50_000);

/// Flat shipping fee charged below [`FREE_SHIPPING_THRESHOLD`].
pub const SHIPPING_FEE: Won = Won(3_500);

/// An amount in Korean won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Won(i64);

impl Won {
    /// Zero won.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a whole number of won.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Get the underlying amount.
    #[must_use]
    pub const fn amount(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Add two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Multiply by a quantity, returning `None` on overflow.
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }
}

impl From<i64> for Won {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

impl From<Won> for i64 {
    fn from(won: Won) -> Self {
        won.0
    }
}

/// Formats with thousands separators, e.g. `₩48,500`.
impl fmt::Display for Won {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}₩{grouped}")
    }
}

/// Shipping fee owed for a given subtotal.
#[must_use]
pub fn shipping_fee_for(subtotal: Won) -> Won {
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        Won::ZERO
    } else {
        SHIPPING_FEE
    }
}
