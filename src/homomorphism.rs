//! q-one-way group homomorphisms.
//!
//! A homomorphism `f` is q-one-way when computing a preimage of `y^i` is hard
//! for `0 < i < Q` but easy for `i = Q`. Commitments in [`crate::qoneway`]
//! are generic over the family through [`QOneWayHomomorphism`].

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::error::{CommitmentError, Result};
use crate::params::GroupParams;
use crate::primes::{is_probable_prime, random_prime};
use crate::rsa_group::RsaGroup;

pub trait QOneWayHomomorphism: Clone {
    /// The group both domain and image live in
    fn group(&self) -> &RsaGroup;

    /// The prime Q
    fn q(&self) -> &BigUint;

    /// `f(x)`
    fn forward(&self, x: &BigUint) -> BigUint;

    /// Given `y`, returns some `x` with `f(x) = y^Q`.
    fn inverse_of_image(&self, y: &BigUint) -> BigUint;

    /// Whether `y` may serve as a commitment base, i.e. lies in Im(f).
    fn is_valid_image(&self, y: &BigUint) -> bool;
}

/// RSA-based q-one-way homomorphism `f(x) = x^Q mod N` with prime `Q > N`.
///
/// Since `Q` is a prime larger than N it is coprime to φ(N), so `f` permutes
/// Z_N^* and every unit is in the image. A preimage of `y^Q` is `y` itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaHomomorphism {
    group: RsaGroup,
    q: BigUint,
}

impl RsaHomomorphism {
    /// Generates a fresh group of `params.modulus_bits` bits and a prime Q of
    /// one more bit.
    pub fn generate<R: RngCore + CryptoRng>(params: &GroupParams, rng: &mut R) -> Result<Self> {
        let group = RsaGroup::generate(params, rng)?;
        let q = random_prime(
            params.modulus_bits + 1,
            params.miller_rabin_rounds,
            params.max_prime_candidates,
            rng,
        )?;
        let homomorphism = Self::install(group, q)?;
        debug!(
            modulus_bits = homomorphism.group.modulus_bits(),
            q_bits = homomorphism.q.bits(),
            "generated RSA-based q-one-way homomorphism"
        );
        Ok(homomorphism)
    }

    /// Builds the homomorphism from an existing group and Q, checking that Q
    /// is prime and strictly greater than N.
    pub fn from_parts<R: RngCore + CryptoRng>(
        group: RsaGroup,
        q: BigUint,
        miller_rabin_rounds: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if !is_probable_prime(&q, miller_rabin_rounds, rng) {
            return Err(CommitmentError::Parameter(format!("Q = {} is not prime", q)));
        }
        Self::install(group, q)
    }

    fn install(mut group: RsaGroup, q: BigUint) -> Result<Self> {
        if &q <= group.modulus() {
            return Err(CommitmentError::Parameter("Q must be > N".to_string()));
        }
        group.set_exponent(q.clone());
        Ok(Self { group, q })
    }
}

impl QOneWayHomomorphism for RsaHomomorphism {
    fn group(&self) -> &RsaGroup {
        &self.group
    }

    fn q(&self) -> &BigUint {
        &self.q
    }

    fn forward(&self, x: &BigUint) -> BigUint {
        self.group.homomorphism(x)
    }

    fn inverse_of_image(&self, y: &BigUint) -> BigUint {
        y.clone()
    }

    // Im(f) is all of Z_N^*, so membership is a coprimality check
    fn is_valid_image(&self, y: &BigUint) -> bool {
        self.group.is_element(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn toy_group() -> RsaGroup {
        RsaGroup::from_primes(&BigUint::from(11u32), &BigUint::from(13u32)).unwrap()
    }

    #[test]
    fn test_generate_q_exceeds_modulus() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let f = RsaHomomorphism::generate(&GroupParams::toy(), &mut rng).unwrap();
        assert!(f.q() > f.group().modulus());
        assert_eq!(f.q().bits(), 65);
        assert_eq!(f.group().exponent(), f.q());
    }

    #[test]
    fn test_q_not_greater_than_modulus_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        // 139 is prime but below N = 143
        let err = RsaHomomorphism::from_parts(toy_group(), BigUint::from(139u32), 20, &mut rng)
            .unwrap_err();
        assert_eq!(err, CommitmentError::Parameter("Q must be > N".to_string()));
    }

    #[test]
    fn test_composite_q_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let err = RsaHomomorphism::from_parts(toy_group(), BigUint::from(153u32), 20, &mut rng)
            .unwrap_err();
        assert!(matches!(err, CommitmentError::Parameter(_)));
    }

    #[test]
    fn test_forward_is_bijection_on_toy_group() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let f = RsaHomomorphism::from_parts(toy_group(), BigUint::from(149u32), 20, &mut rng)
            .unwrap();
        let mut images: Vec<BigUint> = (1u32..143)
            .map(BigUint::from)
            .filter(|x| f.group().is_element(x))
            .map(|x| f.forward(&x))
            .collect();
        images.sort();
        images.dedup();
        assert_eq!(images.len(), 120);
    }

    #[test]
    fn test_inverse_of_image() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let f = RsaHomomorphism::generate(&GroupParams::toy(), &mut rng).unwrap();
        let y = f.group().random_element(&mut rng);
        let y_to_q = f.group().exp(&y, f.q());
        assert_eq!(f.forward(&f.inverse_of_image(&y)), y_to_q);
    }
}
