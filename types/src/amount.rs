//! Arbitrary-precision token amounts.
//!
//! Amounts never touch floating point. They serialize as decimal strings in
//! JSON and as minimal big-endian bytes in the canonical transaction encoding.

use num_bigint::{BigInt, BigUint};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use crate::error::TypesError;

/// A non-negative integer amount of unbounded size.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }

    /// Minimal big-endian bytes. Zero encodes as the empty slice.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        if self.is_zero() {
            Vec::new()
        } else {
            self.0.to_bytes_be()
        }
    }

    /// Inverse of [`Amount::to_be_bytes`]. Leading zero bytes are rejected so
    /// every amount has exactly one encoding.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.first() == Some(&0) {
            return Err(TypesError::NonMinimalInteger);
        }
        Ok(Self(BigUint::from_bytes_be(bytes)))
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if self.0 >= other.0 {
            Some(Self(&self.0 - &other.0))
        } else {
            None
        }
    }

    /// Total debit of a spend: `value + gas_limit * gas_price`.
    pub fn spend_cost(value: &Amount, gas_limit: u64, gas_price: u64) -> Amount {
        let gas = u128::from(gas_limit) * u128::from(gas_price);
        Self(&value.0 + BigUint::from(gas))
    }

    /// Signed view used by balance arithmetic.
    pub fn to_bigint(&self) -> BigInt {
        BigInt::from(self.0.clone())
    }

    /// Back from a signed balance. Negative values yield `None`.
    pub fn from_bigint(value: &BigInt) -> Option<Amount> {
        value.to_biguint().map(Self)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<BigUint> for Amount {
    fn from(v: BigUint) -> Self {
        Self(v)
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;
    fn add(self, rhs: &'a Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl FromStr for Amount {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypesError::InvalidAmount(s.to_string()));
        }
        BigUint::from_str(s)
            .map(Self)
            .map_err(|e| TypesError::InvalidAmount(e.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a decimal integer string or unsigned integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Amount::from(v))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
