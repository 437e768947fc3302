//! The multiplicative group Z_N^* of an RSA modulus.
//!
//! This is the arithmetic collaborator every commitment in the crate is built
//! on: modular multiplication, exponentiation (including negative exponents),
//! inversion, membership testing and uniform sampling. The factorisation of
//! N is never stored, so the group order stays hidden from every holder.

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::error::{CommitmentError, Result};
use crate::params::GroupParams;
use crate::primes::{coprime, random_prime};

/// Default public exponent until a homomorphism installs its own
const DEFAULT_EXPONENT: u32 = 65_537;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaGroup {
    n: BigUint,
    e: BigUint,
}

impl RsaGroup {
    /// Generates a group whose modulus has exactly `params.modulus_bits` bits.
    pub fn generate<R: RngCore + CryptoRng>(params: &GroupParams, rng: &mut R) -> Result<Self> {
        params.validate()?;
        let half = params.modulus_bits / 2;
        let rounds = params.miller_rabin_rounds;
        let p = random_prime(half, rounds, params.max_prime_candidates, rng)?;
        let mut q = random_prime(half, rounds, params.max_prime_candidates, rng)?;
        while q == p {
            q = random_prime(half, rounds, params.max_prime_candidates, rng)?;
        }
        let group = Self::from_primes(&p, &q)?;
        debug!(modulus_bits = group.n.bits(), "generated RSA group");
        Ok(group)
    }

    /// Builds the group for `N = p * q`. The caller is responsible for `p`
    /// and `q` being distinct primes; only the toy-scale tests pass small ones.
    pub fn from_primes(p: &BigUint, q: &BigUint) -> Result<Self> {
        if p == q {
            return Err(CommitmentError::Parameter(
                "RSA factors must be distinct".to_string(),
            ));
        }
        if p <= &BigUint::one() || q <= &BigUint::one() {
            return Err(CommitmentError::Parameter(
                "RSA factors must be greater than one".to_string(),
            ));
        }
        Ok(Self::from_modulus(p * q))
    }

    /// Wraps a public modulus received from another party.
    pub fn from_modulus(n: BigUint) -> Self {
        Self {
            n,
            e: BigUint::from(DEFAULT_EXPONENT),
        }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    pub fn modulus_bits(&self) -> u64 {
        self.n.bits()
    }

    pub fn exponent(&self) -> &BigUint {
        &self.e
    }

    /// Installs the exponent used by [`RsaGroup::homomorphism`].
    pub fn set_exponent(&mut self, e: BigUint) {
        self.e = e;
    }

    pub fn mul(&self, x: &BigUint, y: &BigUint) -> BigUint {
        (x * y) % &self.n
    }

    pub fn exp(&self, x: &BigUint, exponent: &BigUint) -> BigUint {
        x.modpow(exponent, &self.n)
    }

    /// `x^exponent mod N` for a signed exponent. A negative exponent requires
    /// `x` to be invertible.
    pub fn exp_signed(&self, x: &BigUint, exponent: &BigInt) -> Result<BigUint> {
        let magnitude = exponent.magnitude();
        match exponent.sign() {
            Sign::Minus => Ok(self.exp(&self.inv(x)?, magnitude)),
            _ => Ok(self.exp(x, magnitude)),
        }
    }

    pub fn inv(&self, x: &BigUint) -> Result<BigUint> {
        x.modinv(&self.n).ok_or_else(|| {
            CommitmentError::InvalidElement(format!("{} has no inverse modulo N", x))
        })
    }

    /// Membership in Z_N^*: `0 < x < N` and `gcd(x, N) = 1`.
    pub fn is_element(&self, x: &BigUint) -> bool {
        !x.is_zero() && x < &self.n && coprime(x, &self.n)
    }

    /// Same as [`RsaGroup::is_element`] for values that travelled as signed integers.
    pub fn is_signed_element(&self, x: &BigInt) -> bool {
        !x.is_negative() && self.is_element(x.magnitude())
    }

    /// Uniform element of Z_N^* by rejection sampling.
    pub fn random_element<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        loop {
            let candidate = rng.gen_biguint_range(&BigUint::one(), &self.n);
            if coprime(&candidate, &self.n) {
                return candidate;
            }
        }
    }

    /// `x^E mod N`
    pub fn homomorphism(&self, x: &BigUint) -> BigUint {
        self.exp(x, &self.e)
    }
}
