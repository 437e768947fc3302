//! Probable-prime generation over arbitrary precision integers.
//!
//! Candidates are filtered by trial division against small primes and then
//! run through the Miller-Rabin test with random witnesses. Generated primes
//! always have their two most significant bits set, so the product of two
//! `b`-bit primes has exactly `2b` bits.

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::error::{CommitmentError, Result};

const SMALL_PRIMES: [u32; 54] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251,
];

/// Returns `Some(verdict)` when trial division alone decides primality.
fn trial_division(n: &BigUint) -> Option<bool> {
    if let Some(small) = n.to_u32() {
        if small < 2 {
            return Some(false);
        }
        if SMALL_PRIMES.contains(&small) {
            return Some(true);
        }
    }
    for p in SMALL_PRIMES.iter() {
        if (n % *p).is_zero() {
            return Some(false);
        }
    }
    // No factor up to 251 and n < 257^2 means n is prime
    if n.bits() <= 16 && n.to_u32().map_or(false, |v| v < 257 * 257) {
        return Some(true);
    }
    None
}

/// Miller-Rabin probable-prime test with `rounds` random witnesses.
///
/// The error probability for a composite `n` is at most `4^-rounds`.
pub fn is_probable_prime<R: RngCore + CryptoRng>(n: &BigUint, rounds: usize, rng: &mut R) -> bool {
    if let Some(verdict) = trial_division(n) {
        return verdict;
    }

    let one = BigUint::one();
    let two = BigUint::from(2u32);
    let n_minus_one = n - &one;

    // n - 1 = d * 2^s with d odd
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
            if x == one {
                return false;
            }
        }
        return false;
    }
    true
}

fn random_odd_candidate<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> BigUint {
    let mut candidate = rng.gen_biguint(bits);
    candidate |= BigUint::one() << (bits - 1);
    candidate |= BigUint::one() << (bits - 2);
    candidate |= BigUint::one();
    candidate
}

/// Draws a random probable prime with exactly `bits` bits.
pub fn random_prime<R: RngCore + CryptoRng>(
    bits: u64,
    rounds: usize,
    max_candidates: usize,
    rng: &mut R,
) -> Result<BigUint> {
    if bits < 3 {
        return Err(CommitmentError::InvalidParameters(format!(
            "cannot generate a {}-bit prime with the top two bits set",
            bits
        )));
    }
    for attempt in 0..max_candidates {
        let candidate = random_odd_candidate(bits, rng);
        if is_probable_prime(&candidate, rounds, rng) {
            debug!(bits, attempts = attempt + 1, "found prime");
            return Ok(candidate);
        }
    }
    Err(CommitmentError::PrimeGenerationFailed {
        bits,
        attempts: max_candidates,
    })
}

/// Draws a random safe prime `p = 2p' + 1` with exactly `bits` bits.
pub fn random_safe_prime<R: RngCore + CryptoRng>(
    bits: u64,
    rounds: usize,
    max_candidates: usize,
    rng: &mut R,
) -> Result<BigUint> {
    if bits < 4 {
        return Err(CommitmentError::InvalidParameters(format!(
            "cannot generate a {}-bit safe prime",
            bits
        )));
    }
    for attempt in 0..max_candidates {
        let sophie_germain = random_odd_candidate(bits - 1, rng);
        let candidate: BigUint = (&sophie_germain << 1u32) + 1u32;
        // Cheap checks first, the full test on p' only when p survives sieving
        if trial_division(&candidate) == Some(false) {
            continue;
        }
        if is_probable_prime(&sophie_germain, rounds, rng)
            && is_probable_prime(&candidate, rounds, rng)
        {
            debug!(bits, attempts = attempt + 1, "found safe prime");
            return Ok(candidate);
        }
    }
    Err(CommitmentError::PrimeGenerationFailed {
        bits,
        attempts: max_candidates,
    })
}

/// Uniform integer in `[0, 2^bits)`.
pub fn random_below_power_of_two<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> BigUint {
    if bits == 0 {
        return BigUint::zero();
    }
    rng.gen_biguint(bits)
}

/// `gcd(a, b) == 1`
pub fn coprime(a: &BigUint, b: &BigUint) -> bool {
    a.gcd(b).is_one()
}
