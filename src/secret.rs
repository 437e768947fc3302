//! Storage for secret integers.
//!
//! `num-bigint` values cannot be wiped in place, so openings, receiver
//! secrets and proof masks that live inside long-lived state are kept as
//! big-endian byte strings that are zeroized on drop. Values rebuilt with
//! [`SecretInt::to_biguint`] or [`SecretInt::to_bigint`] are ordinary
//! temporaries.

use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretInt {
    negative: bool,
    magnitude: Vec<u8>,
}

impl SecretInt {
    pub fn from_biguint(value: &BigUint) -> Self {
        Self {
            negative: false,
            magnitude: value.to_bytes_be(),
        }
    }

    pub fn from_bigint(value: &BigInt) -> Self {
        let (sign, magnitude) = value.to_bytes_be();
        Self {
            negative: sign == Sign::Minus,
            magnitude,
        }
    }

    /// The magnitude; the sign is dropped.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.magnitude)
    }

    pub fn to_bigint(&self) -> BigInt {
        let sign = if self.negative { Sign::Minus } else { Sign::Plus };
        BigInt::from_bytes_be(sign, &self.magnitude)
    }
}

impl fmt::Debug for SecretInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretInt(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_values_survive_storage() {
        for value in [0i64, 1, -1, 255, -256, i64::MAX, i64::MIN + 1] {
            let value = BigInt::from(value);
            assert_eq!(SecretInt::from_bigint(&value).to_bigint(), value);
        }
    }

    #[test]
    fn test_zero_has_one_representation() {
        assert_eq!(
            SecretInt::from_bigint(&BigInt::from(0)),
            SecretInt::from_biguint(&BigUint::from(0u32))
        );
        assert_eq!(
            SecretInt::from_bigint(&-BigInt::from(0)).to_bigint(),
            BigInt::from(0)
        );
    }

    #[test]
    fn test_zeroize_clears_the_buffer() {
        let mut secret = SecretInt::from_biguint(&BigUint::from(0xdead_beef_u64));
        secret.zeroize();
        assert!(secret.magnitude.is_empty());
        assert!(!secret.negative);
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretInt::from_biguint(&BigUint::from(1234u32));
        assert_eq!(format!("{:?}", secret), "SecretInt(..)");
    }
}
