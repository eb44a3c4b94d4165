use rlp_derive::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::common::Wei;

/// A two-denomination amount. ThetaWei is the staking denomination, GammaWei
/// pays for fees and service payments. All arithmetic is componentwise and
/// checked: a `None` from [Coins::checked_sub] is the "would go negative"
/// signal callers branch on.
#[derive(
    Clone,
    PartialEq,
    Eq,
    Default,
    Debug,
    Serialize,
    Deserialize,
    RlpEncodable,
    RlpDecodable,
)]
pub struct Coins {
    pub theta_wei: Wei,
    pub gamma_wei: Wei,
}

impl Coins {
    pub fn new(theta_wei: Wei, gamma_wei: Wei) -> Self {
        Self {
            theta_wei,
            gamma_wei,
        }
    }

    /// GammaWei only, the common case for fees and payments.
    pub fn gamma(gamma_wei: impl Into<Wei>) -> Self {
        Self {
            theta_wei: Wei::zero().clone(),
            gamma_wei: gamma_wei.into(),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.theta_wei.is_zero() && self.gamma_wei.is_zero()
    }

    pub fn checked_add(&self, other: &Coins) -> Option<Coins> {
        Some(Coins {
            theta_wei: self.theta_wei.checked_add(&other.theta_wei)?,
            gamma_wei: self.gamma_wei.checked_add(&other.gamma_wei)?,
        })
    }

    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        Some(Coins {
            theta_wei: self.theta_wei.checked_sub(&other.theta_wei)?,
            gamma_wei: self.gamma_wei.checked_sub(&other.gamma_wei)?,
        })
    }

    /// Componentwise `amount * percentage / 100` with floor division; the
    /// discarded remainder stays with whoever receives the residual amount.
    pub fn percentage(&self, percentage: u8) -> Coins {
        Coins {
            theta_wei: self.theta_wei.percentage(percentage),
            gamma_wei: self.gamma_wei.percentage(percentage),
        }
    }

    pub fn is_gte(&self, other: &Coins) -> bool {
        self.checked_sub(other).is_some()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ThetaWei, {} GammaWei", self.theta_wei, self.gamma_wei)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_arith() {
        let a = Coins::new(10u64.into(), 20u64.into());
        let b = Coins::gamma(5u64);
        assert_eq!(
            a.checked_add(&b).unwrap(),
            Coins::new(10u64.into(), 25u64.into())
        );
        assert_eq!(
            a.checked_sub(&b).unwrap(),
            Coins::new(10u64.into(), 15u64.into())
        );
        // either component going negative fails the whole subtraction
        assert_eq!(a.checked_sub(&Coins::gamma(21u64)), None);
        assert_eq!(
            a.checked_sub(&Coins::new(11u64.into(), 0u64.into())),
            None
        );
    }

    #[test]
    fn test_percentage_floor() {
        let a = Coins::new(0u64.into(), 101u64.into());
        assert_eq!(a.percentage(50), Coins::gamma(50u64));
        assert_eq!(a.percentage(100), a);
        assert_eq!(a.percentage(0), Coins::zero());
    }

    #[test]
    fn test_rlp_round_trip() {
        let a = Coins::new(7u64.into(), 1_000_000_000_000u64.into());
        let encoded = rlp::encode(&a);
        let decoded: Coins = rlp::decode(&encoded).unwrap();
        assert_eq!(a, decoded);
    }
}
