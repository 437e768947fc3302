//! Parameter sets for group generation, integer commitments and the
//! equality proof.
//!
//! Every struct has a `Default` suitable for production use and a `toy()`
//! constructor sized for fast tests. Call `validate()` before handing a
//! parameter set to a constructor; constructors call it as well.

use crate::error::{CommitmentError, Result};

/// Smallest modulus accepted. Anything below cannot hold two distinct primes
/// with the top two bits set.
pub const MIN_MODULUS_BITS: u64 = 16;

/// Security level expressed as the bit length of the RSA modulus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecurityLevel {
    /// 64-bit modulus, only for tests
    Toy,
    /// 2048-bit modulus, ~112-bit classical security
    Medium,
    /// 3072-bit modulus, ~128-bit classical security
    High,
    /// Custom modulus bit length
    Custom(u64),
}

impl SecurityLevel {
    pub fn modulus_bits(&self) -> u64 {
        match self {
            SecurityLevel::Toy => 64,
            SecurityLevel::Medium => 2048,
            SecurityLevel::High => 3072,
            SecurityLevel::Custom(bits) => *bits,
        }
    }
}

/// Parameters for generating an RSA group and the q-one-way homomorphism on it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupParams {
    /// Bit length of the modulus N; Q gets one bit more
    pub modulus_bits: u64,
    /// Miller-Rabin rounds per primality test
    pub miller_rabin_rounds: usize,
    /// Upper bound on random candidates tried per prime
    pub max_prime_candidates: usize,
}

impl GroupParams {
    pub fn new(level: SecurityLevel) -> Self {
        Self {
            modulus_bits: level.modulus_bits(),
            ..Self::default()
        }
    }

    pub fn toy() -> Self {
        Self::new(SecurityLevel::Toy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.modulus_bits < MIN_MODULUS_BITS || self.modulus_bits % 2 != 0 {
            return Err(CommitmentError::InvalidParameters(format!(
                "modulus bit length must be even and at least {}, got {}",
                MIN_MODULUS_BITS, self.modulus_bits
            )));
        }
        if self.miller_rabin_rounds == 0 {
            return Err(CommitmentError::InvalidParameters(
                "at least one Miller-Rabin round is required".to_string(),
            ));
        }
        if self.max_prime_candidates == 0 {
            return Err(CommitmentError::InvalidParameters(
                "max_prime_candidates must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GroupParams {
    fn default() -> Self {
        Self {
            modulus_bits: SecurityLevel::Medium.modulus_bits(),
            miller_rabin_rounds: 40,
            max_prime_candidates: 1_000_000,
        }
    }
}

/// Parameters for the Damgård–Fujisaki integer commitment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DfParams {
    /// Bit length of each safe prime factor of N
    pub safe_prime_bits: u64,
    /// Committed values must satisfy |a| < 2^value_bound_bits
    pub value_bound_bits: u64,
    /// Statistical hiding parameter k
    pub statistical_security: u64,
    pub miller_rabin_rounds: usize,
    pub max_prime_candidates: usize,
}

impl DfParams {
    pub fn toy() -> Self {
        Self {
            safe_prime_bits: 32,
            value_bound_bits: 80,
            statistical_security: 40,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.safe_prime_bits < MIN_MODULUS_BITS / 2 {
            return Err(CommitmentError::InvalidParameters(format!(
                "safe prime bit length must be at least {}, got {}",
                MIN_MODULUS_BITS / 2,
                self.safe_prime_bits
            )));
        }
        if self.value_bound_bits == 0 {
            return Err(CommitmentError::InvalidParameters(
                "value bound must be at least one bit".to_string(),
            ));
        }
        if self.miller_rabin_rounds == 0 || self.max_prime_candidates == 0 {
            return Err(CommitmentError::InvalidParameters(
                "prime search needs positive rounds and candidate budget".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DfParams {
    fn default() -> Self {
        Self {
            safe_prime_bits: 1024,
            value_bound_bits: 256,
            statistical_security: 80,
            miller_rabin_rounds: 40,
            max_prime_candidates: 10_000_000,
        }
    }
}

/// Parameters for the equality-of-commitments sigma protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EqualityParams {
    /// Challenges are drawn from [0, 2^challenge_space_bits)
    pub challenge_space_bits: u64,
}

impl EqualityParams {
    pub fn validate(&self) -> Result<()> {
        if self.challenge_space_bits == 0 || self.challenge_space_bits > 256 {
            return Err(CommitmentError::InvalidParameters(format!(
                "challenge space must be between 1 and 256 bits, got {}",
                self.challenge_space_bits
            )));
        }
        Ok(())
    }
}

impl Default for EqualityParams {
    fn default() -> Self {
        Self {
            challenge_space_bits: 80,
        }
    }
}
