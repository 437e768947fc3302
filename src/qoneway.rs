//! Commitments based on a q-one-way group homomorphism (Cramer–Damgård).
//!
//! The [`Receiver`] picks a secret `x`, publishes `Y = f(x)` and later checks
//! openings. The [`Committer`] commits to `a ∈ [0, Q)` as
//! `C = Y^a · f(r) mod N` for a uniform unit `r`. Commitments are perfectly
//! hiding (f permutes the group, so `f(r)` is uniform) and binding as long as
//! the committer cannot compute Q-th roots.
//!
//! Besides plain openings the committer can produce a commitment `C` to
//! `a·b mod Q` together with a `t` such that `C = B^a · f(t)`, where `B` is a
//! commitment to `b`. That relation is what multiplication proofs are built on.

use num_bigint::{BigInt, BigUint};
use rand::{CryptoRng, RngCore};
use tracing::trace;

use crate::equality::{EqualityCommitter, EqualityReceiver};
use crate::error::{CommitmentError, Result};
use crate::homomorphism::{QOneWayHomomorphism, RsaHomomorphism};
use crate::params::GroupParams;
use crate::secret::SecretInt;

/// Below this modulus size repeated blinding factors happen by chance
const REUSE_CHECK_MIN_BITS: u64 = 64;

/// Opening of a commitment: the committed value and its blinding factor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decommitment {
    pub value: BigUint,
    pub blinding: BigUint,
}

/// Commitment to `c = a·b mod Q` with opening `(c, o)` and the witness `t`
/// for `C = B^a · f(t)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiplicationCommitment {
    pub commitment: BigUint,
    pub value: BigUint,
    pub blinding: BigUint,
    pub t: BigUint,
}

#[derive(Clone, Debug)]
struct PendingCommitment {
    commitment: BigUint,
    value: SecretInt,
    blinding: SecretInt,
}

impl PendingCommitment {
    fn opening(&self) -> Decommitment {
        Decommitment {
            value: self.value.to_biguint(),
            blinding: self.blinding.to_biguint(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Committer<H: QOneWayHomomorphism = RsaHomomorphism> {
    homomorphism: H,
    y: BigUint,
    pending: Option<PendingCommitment>,
}

impl<H: QOneWayHomomorphism> Committer<H> {
    /// Takes the homomorphism and base `Y` published by a [`Receiver`].
    pub fn new(homomorphism: H, y: BigUint) -> Result<Self> {
        // For the RSA family Im(f) = Z_N^*, so this is gcd(Y, N) = 1
        if !homomorphism.is_valid_image(&y) {
            return Err(CommitmentError::InvalidElement(
                "Y is not in the image of the homomorphism".to_string(),
            ));
        }
        Ok(Self {
            homomorphism,
            y,
            pending: None,
        })
    }

    pub fn homomorphism(&self) -> &H {
        &self.homomorphism
    }

    pub fn y(&self) -> &BigUint {
        &self.y
    }

    /// Commits to `a` with a fresh blinding factor, replacing any pending
    /// opening. Fails without touching the pending opening if `a >= Q`.
    pub fn commit_msg<R: RngCore + CryptoRng>(
        &mut self,
        a: &BigUint,
        rng: &mut R,
    ) -> Result<BigUint> {
        if a >= self.homomorphism.q() {
            return Err(CommitmentError::Range(
                "the committed value needs to be < Q".to_string(),
            ));
        }
        let (commitment, r) = self.compute_commitment(a, rng);
        let blinding = SecretInt::from_biguint(&r);
        if let Some(previous) = &self.pending {
            if self.homomorphism.group().modulus_bits() >= REUSE_CHECK_MIN_BITS {
                debug_assert_ne!(previous.blinding, blinding, "blinding factor reused");
            }
        }
        self.pending = Some(PendingCommitment {
            commitment: commitment.clone(),
            value: SecretInt::from_biguint(a),
            blinding,
        });
        trace!("q-one-way commitment created");
        Ok(commitment)
    }

    /// Opening of the last commitment produced by [`Committer::commit_msg`].
    pub fn decommit_msg(&self) -> Result<Decommitment> {
        self.pending
            .as_ref()
            .map(PendingCommitment::opening)
            .ok_or(CommitmentError::NotCommitted)
    }

    /// The last commitment produced by [`Committer::commit_msg`].
    pub fn last_commitment(&self) -> Option<&BigUint> {
        self.pending.as_ref().map(|pending| &pending.commitment)
    }

    /// `Y^a · f(r) mod N`
    pub fn commit_with(&self, a: &BigUint, r: &BigUint) -> BigUint {
        let group = self.homomorphism.group();
        group.mul(&group.exp(&self.y, a), &self.homomorphism.forward(r))
    }

    fn compute_commitment<R: RngCore + CryptoRng>(
        &self,
        a: &BigUint,
        rng: &mut R,
    ) -> (BigUint, BigUint) {
        let r = self.homomorphism.group().random_element(rng);
        (self.commit_with(a, &r), r)
    }

    /// Given values `a`, `b` and the blinding `u` of the commitment
    /// `B = Y^b · f(u)`, returns a fresh commitment `C` to `c = a·b mod Q`
    /// with its blinding `o`, and `t` such that `C = B^a · f(t)`.
    ///
    /// `u` is trusted as given. Use
    /// [`Committer::commitment_to_multiplication_checked`] when `u` comes
    /// from an untrusted source.
    pub fn commitment_to_multiplication<R: RngCore + CryptoRng>(
        &self,
        a: &BigUint,
        b: &BigUint,
        u: &BigUint,
        rng: &mut R,
    ) -> Result<MultiplicationCommitment> {
        let q = self.homomorphism.q();
        if a >= q || b >= q {
            return Err(CommitmentError::Range(
                "multiplied values need to be < Q".to_string(),
            ));
        }
        let group = self.homomorphism.group();
        if !group.is_element(u) {
            return Err(CommitmentError::InvalidElement(
                "blinding factor u is not a group element".to_string(),
            ));
        }

        let product = a * b;
        let c = &product % q;
        let (commitment, o) = self.compute_commitment(&c, rng);

        // Exact quotient: product - c is a multiple of Q
        let j = (&product - &c) / q;

        // C = Y^(ab - jQ) f(o) and B^a = Y^(ab) f(u^a), hence
        // t = o · u^(-a) · f^-1(Y^(-j))
        let u_to_a_inv = group.inv(&group.exp(u, a))?;
        let y_to_j_inv = group.inv(&group.exp(&self.y, &j))?;
        let t = group.mul(
            &group.mul(&o, &u_to_a_inv),
            &self.homomorphism.inverse_of_image(&y_to_j_inv),
        );

        trace!("multiplication commitment created");
        Ok(MultiplicationCommitment {
            commitment,
            value: c,
            blinding: o,
            t,
        })
    }

    /// Like [`Committer::commitment_to_multiplication`] but first checks that
    /// `(b, u)` opens `b_commitment`.
    pub fn commitment_to_multiplication_checked<R: RngCore + CryptoRng>(
        &self,
        a: &BigUint,
        b: &BigUint,
        u: &BigUint,
        b_commitment: &BigUint,
        rng: &mut R,
    ) -> Result<MultiplicationCommitment> {
        if b >= self.homomorphism.q() || !self.homomorphism.group().is_element(u) {
            return Err(CommitmentError::InvalidOpening(
                "(b, u) is not a well-formed opening".to_string(),
            ));
        }
        if &self.commit_with(b, u) != b_commitment {
            return Err(CommitmentError::InvalidOpening(
                "(b, u) does not open the commitment to b".to_string(),
            ));
        }
        self.commitment_to_multiplication(a, b, u, rng)
    }
}

#[derive(Clone, Debug)]
pub struct Receiver<H: QOneWayHomomorphism = RsaHomomorphism> {
    homomorphism: H,
    /// `x` with `Y = f(x)`
    secret: SecretInt,
    y: BigUint,
    commitment: Option<BigUint>,
}

impl Receiver<RsaHomomorphism> {
    /// Generates a fresh RSA-based homomorphism and commitment base.
    pub fn generate<R: RngCore + CryptoRng>(params: &GroupParams, rng: &mut R) -> Result<Self> {
        let homomorphism = RsaHomomorphism::generate(params, rng)?;
        Ok(Self::with_homomorphism(homomorphism, rng))
    }
}

impl<H: QOneWayHomomorphism> Receiver<H> {
    /// Draws the secret `x` from the group and publishes `Y = f(x)`.
    pub fn with_homomorphism<R: RngCore + CryptoRng>(homomorphism: H, rng: &mut R) -> Self {
        // gcd(Q, φ(N)) = 1 because Q is a prime above N > φ(N)
        let x = homomorphism.group().random_element(rng);
        let y = homomorphism.forward(&x);
        Self {
            homomorphism,
            secret: SecretInt::from_biguint(&x),
            y,
            commitment: None,
        }
    }

    pub fn homomorphism(&self) -> &H {
        &self.homomorphism
    }

    /// The public commitment base `Y`
    pub fn y(&self) -> &BigUint {
        &self.y
    }

    /// Records the commitment of the current round, replacing the previous one.
    pub fn set_commitment(&mut self, commitment: BigUint) {
        trace!("receiver stored commitment");
        self.commitment = Some(commitment);
    }

    pub fn commitment(&self) -> Option<&BigUint> {
        self.commitment.as_ref()
    }

    /// Checks `Y^a · f(R) mod N` against the stored commitment.
    pub fn check_decommitment(&self, r: &BigUint, a: &BigUint) -> Result<bool> {
        let commitment = self
            .commitment
            .as_ref()
            .ok_or(CommitmentError::MissingCommitment)?;
        Ok(&self.commit_with(a, r) == commitment)
    }

    pub fn check_opening(&self, opening: &Decommitment) -> Result<bool> {
        self.check_decommitment(&opening.blinding, &opening.value)
    }

    /// Checks `C = B^a · f(t) mod N`.
    pub fn check_multiplication(
        &self,
        b_commitment: &BigUint,
        a: &BigUint,
        c_commitment: &BigUint,
        t: &BigUint,
    ) -> bool {
        let group = self.homomorphism.group();
        let expected = group.mul(&group.exp(b_commitment, a), &self.homomorphism.forward(t));
        &expected == c_commitment
    }

    pub fn commit_with(&self, a: &BigUint, r: &BigUint) -> BigUint {
        let group = self.homomorphism.group();
        group.mul(&group.exp(&self.y, a), &self.homomorphism.forward(r))
    }

    /// Reopens the commitment behind `opening` to `new_value` with the
    /// trapdoor `x`.
    ///
    /// `C = f(x^a · r)`, so `r' = r · x^(a - a')` satisfies
    /// `Y^a' · f(r') = C`.
    pub fn trapdoor_opening(
        &self,
        opening: &Decommitment,
        new_value: &BigUint,
    ) -> Result<Decommitment> {
        if new_value >= self.homomorphism.q() {
            return Err(CommitmentError::Range(
                "the new value needs to be < Q".to_string(),
            ));
        }
        let group = self.homomorphism.group();
        if !group.is_element(&opening.blinding) {
            return Err(CommitmentError::InvalidElement(
                "blinding factor is not a group element".to_string(),
            ));
        }
        let shift = BigInt::from(opening.value.clone()) - BigInt::from(new_value.clone());
        let x_to_shift = group.exp_signed(&self.secret.to_biguint(), &shift)?;
        Ok(Decommitment {
            value: new_value.clone(),
            blinding: group.mul(&opening.blinding, &x_to_shift),
        })
    }

    /// The secret preimage of `Y`; only the receiver's own tests need it.
    #[cfg(test)]
    fn secret(&self) -> BigUint {
        self.secret.to_biguint()
    }
}

/// Signed variant of `Y^a · f(r)` shared by both sides of the equality proof.
pub(crate) fn commit_signed<H: QOneWayHomomorphism>(
    homomorphism: &H,
    y: &BigUint,
    value: &BigInt,
    blinding: &BigInt,
) -> Result<BigUint> {
    let group = homomorphism.group();
    if !group.is_signed_element(blinding) {
        return Err(CommitmentError::InvalidElement(
            "blinding response is not a group element".to_string(),
        ));
    }
    let y_to_value = group.exp_signed(y, value)?;
    Ok(group.mul(&y_to_value, &homomorphism.forward(blinding.magnitude())))
}

/// `[N, Q, Y]`
fn public_parameters<H: QOneWayHomomorphism>(homomorphism: &H, y: &BigUint) -> Vec<BigUint> {
    vec![
        homomorphism.group().modulus().clone(),
        homomorphism.q().clone(),
        y.clone(),
    ]
}

const SCHEME_LABEL: &[u8] = b"qoneway-rsa";

impl<H: QOneWayHomomorphism> EqualityCommitter for Committer<H> {
    fn modulus(&self) -> &BigUint {
        self.homomorphism.group().modulus()
    }

    fn scheme_label(&self) -> &'static [u8] {
        SCHEME_LABEL
    }

    fn public_parameters(&self) -> Vec<BigUint> {
        public_parameters(&self.homomorphism, &self.y)
    }

    fn value_bound(&self) -> BigUint {
        self.homomorphism.q().clone()
    }

    fn opening(&self) -> Result<(BigInt, BigInt)> {
        let opening = self.decommit_msg()?;
        Ok((
            BigInt::from(opening.value.clone()),
            BigInt::from(opening.blinding.clone()),
        ))
    }

    fn stored_commitment(&self) -> Result<BigUint> {
        self.last_commitment()
            .cloned()
            .ok_or(CommitmentError::NotCommitted)
    }

    // The blinding factor is a group element, so its mask is a uniform unit
    fn sample_blinding_mask<R: RngCore + CryptoRng>(
        &self,
        _challenge_space_bits: u64,
        rng: &mut R,
    ) -> BigInt {
        BigInt::from(self.homomorphism.group().random_element(rng))
    }

    fn commit_with(&self, value: &BigInt, blinding: &BigInt) -> Result<BigUint> {
        commit_signed(&self.homomorphism, &self.y, value, blinding)
    }

    /// `mask · blinding^c mod N`
    fn blinding_response(
        &self,
        mask: &BigInt,
        blinding: &BigInt,
        challenge: &BigUint,
    ) -> Result<BigInt> {
        let group = self.homomorphism.group();
        if !group.is_signed_element(mask) || !group.is_signed_element(blinding) {
            return Err(CommitmentError::InvalidElement(
                "mask and blinding factor must be group elements".to_string(),
            ));
        }
        let response = group.mul(mask.magnitude(), &group.exp(blinding.magnitude(), challenge));
        Ok(BigInt::from(response))
    }
}

impl<H: QOneWayHomomorphism> EqualityReceiver for Receiver<H> {
    fn modulus(&self) -> &BigUint {
        self.homomorphism.group().modulus()
    }

    fn scheme_label(&self) -> &'static [u8] {
        SCHEME_LABEL
    }

    fn public_parameters(&self) -> Vec<BigUint> {
        public_parameters(&self.homomorphism, &self.y)
    }

    fn stored_commitment(&self) -> Result<&BigUint> {
        self.commitment
            .as_ref()
            .ok_or(CommitmentError::MissingCommitment)
    }

    fn commit_with(&self, value: &BigInt, blinding: &BigInt) -> Result<BigUint> {
        commit_signed(&self.homomorphism, &self.y, value, blinding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa_group::RsaGroup;
    use proptest::prelude::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn toy_pair(seed: u64) -> (Receiver, Committer, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let receiver = Receiver::generate(&GroupParams::toy(), &mut rng).unwrap();
        let committer =
            Committer::new(receiver.homomorphism().clone(), receiver.y().clone()).unwrap();
        (receiver, committer, rng)
    }

    #[test]
    fn test_commit_and_open() {
        let (mut receiver, mut committer, mut rng) = toy_pair(1);
        let a = BigUint::from(7u32);
        let commitment = committer.commit_msg(&a, &mut rng).unwrap();
        receiver.set_commitment(commitment);

        let opening = committer.decommit_msg().unwrap();
        assert_eq!(opening.value, a);
        assert!(receiver.check_decommitment(&opening.blinding, &a).unwrap());
        assert!(!receiver
            .check_decommitment(&opening.blinding, &BigUint::from(8u32))
            .unwrap());
    }

    #[test]
    fn test_receiver_base_is_image_of_secret() {
        let (receiver, _, _) = toy_pair(2);
        assert_eq!(receiver.homomorphism().forward(&receiver.secret()), *receiver.y());
    }

    #[test]
    fn test_decommit_before_commit_fails() {
        let (_, committer, _) = toy_pair(3);
        assert_eq!(committer.decommit_msg(), Err(CommitmentError::NotCommitted));
        assert!(committer.last_commitment().is_none());
    }

    #[test]
    fn test_check_without_commitment_fails() {
        let (receiver, _, _) = toy_pair(4);
        assert_eq!(
            receiver.check_decommitment(&BigUint::from(1u32), &BigUint::from(1u32)),
            Err(CommitmentError::MissingCommitment)
        );
    }

    #[test]
    fn test_value_out_of_range_keeps_previous_state() {
        let (_, mut committer, mut rng) = toy_pair(5);
        let a = BigUint::from(3u32);
        let commitment = committer.commit_msg(&a, &mut rng).unwrap();
        let opening = committer.decommit_msg().unwrap();

        let q = committer.homomorphism().q().clone();
        assert!(matches!(
            committer.commit_msg(&q, &mut rng),
            Err(CommitmentError::Range(_))
        ));
        assert_eq!(committer.decommit_msg().unwrap(), opening);
        assert_eq!(committer.last_commitment(), Some(&commitment));

        let largest = &q - 1u32;
        assert!(committer.commit_msg(&largest, &mut rng).is_ok());
    }

    #[test]
    fn test_invalid_base_rejected() {
        let (receiver, _, _) = toy_pair(6);
        let n = receiver.homomorphism().group().modulus().clone();
        for bad in [BigUint::from(0u32), n.clone(), &n + 1u32] {
            assert!(matches!(
                Committer::new(receiver.homomorphism().clone(), bad),
                Err(CommitmentError::InvalidElement(_))
            ));
        }
    }

    #[test]
    fn test_sequential_rounds_overwrite_state() {
        let (mut receiver, mut committer, mut rng) = toy_pair(7);
        for value in [5u32, 11, 0, 1_000_000] {
            let a = BigUint::from(value);
            receiver.set_commitment(committer.commit_msg(&a, &mut rng).unwrap());
            let opening = committer.decommit_msg().unwrap();
            assert_eq!(opening.value, a);
            assert!(receiver.check_opening(&opening).unwrap());
        }
    }

    #[test]
    fn test_binding_against_nearby_values() {
        let (mut receiver, mut committer, mut rng) = toy_pair(8);
        let a = BigUint::from(100u32);
        receiver.set_commitment(committer.commit_msg(&a, &mut rng).unwrap());
        let opening = committer.decommit_msg().unwrap();
        for other in (0u32..256).filter(|v| *v != 100) {
            let other = BigUint::from(other);
            assert!(!receiver.check_decommitment(&opening.blinding, &other).unwrap());
            let random_r = committer.homomorphism().group().random_element(&mut rng);
            assert!(!receiver.check_decommitment(&random_r, &other).unwrap());
        }
    }

    #[test]
    fn test_hiding_distribution_on_toy_group() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let group = RsaGroup::from_primes(&BigUint::from(11u32), &BigUint::from(13u32)).unwrap();
        let f = RsaHomomorphism::from_parts(group, BigUint::from(149u32), 20, &mut rng).unwrap();
        let receiver = Receiver::with_homomorphism(f.clone(), &mut rng);
        let mut committer = Committer::new(f, receiver.y().clone()).unwrap();

        const SAMPLES: usize = 20_000;
        let mut histogram = |value: u32| {
            let mut counts = vec![0usize; 143];
            for _ in 0..SAMPLES {
                let c = committer.commit_msg(&BigUint::from(value), &mut rng).unwrap();
                counts[usize::try_from(&c).unwrap()] += 1;
            }
            counts
        };
        let h0 = histogram(3);
        let h1 = histogram(17);
        let distance: f64 = h0
            .iter()
            .zip(h1.iter())
            .map(|(x, y)| (*x as f64 - *y as f64).abs() / SAMPLES as f64)
            .sum::<f64>()
            / 2.0;
        assert!(distance < 0.1, "statistical distance {}", distance);
    }

    #[test]
    fn test_checked_multiplication_rejects_wrong_blinding() {
        let (_, mut committer, mut rng) = toy_pair(10);
        let a = BigUint::from(6u32);
        let b = BigUint::from(9u32);
        let b_commitment = committer.commit_msg(&b, &mut rng).unwrap();
        let u = committer.decommit_msg().unwrap().blinding.clone();

        let wrong_u = committer.homomorphism().group().random_element(&mut rng);
        assert!(matches!(
            committer.commitment_to_multiplication_checked(
                &a,
                &b,
                &wrong_u,
                &b_commitment,
                &mut rng
            ),
            Err(CommitmentError::InvalidOpening(_))
        ));
        assert!(committer
            .commitment_to_multiplication_checked(&a, &b, &u, &b_commitment, &mut rng)
            .is_ok());
    }

    #[test]
    fn test_trapdoor_opening_reopens_to_any_value() {
        let (mut receiver, mut committer, mut rng) = toy_pair(11);
        receiver.set_commitment(committer.commit_msg(&BigUint::from(42u32), &mut rng).unwrap());
        let opening = committer.decommit_msg().unwrap();

        let q = receiver.homomorphism().q().clone();
        let targets = [
            BigUint::from(0u32),
            BigUint::from(41u32),
            BigUint::from(43u32),
            &q - 1u32,
        ];
        for new_value in targets {
            let reopened = receiver.trapdoor_opening(&opening, &new_value).unwrap();
            assert_eq!(reopened.value, new_value);
            assert!(receiver.check_opening(&reopened).unwrap());
        }
        assert!(matches!(
            receiver.trapdoor_opening(&opening, &q),
            Err(CommitmentError::Range(_))
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "blinding factor reused")]
    fn test_reused_blinding_panics_in_debug_builds() {
        let (_, mut committer, mut rng) = toy_pair(12);
        assert!(committer.homomorphism().group().modulus_bits() >= REUSE_CHECK_MIN_BITS);
        // Replaying the generator state reproduces the same blinding factor
        let mut replay = rng.clone();
        committer.commit_msg(&BigUint::from(1u32), &mut rng).unwrap();
        let _ = committer.commit_msg(&BigUint::from(2u32), &mut replay);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_multiplication_relation(
            seed in any::<u64>(),
            a_bits in 1u64..66,
            b_bits in 1u64..66,
        ) {
            let (mut receiver, mut committer, mut rng) = toy_pair(seed);
            let q = committer.homomorphism().q().clone();
            let a = num_bigint::RandBigInt::gen_biguint(&mut rng, a_bits) % &q;
            let b = num_bigint::RandBigInt::gen_biguint(&mut rng, b_bits) % &q;

            let b_commitment = committer.commit_msg(&b, &mut rng).unwrap();
            let u = committer.decommit_msg().unwrap().blinding.clone();
            let product = committer.commitment_to_multiplication(&a, &b, &u, &mut rng).unwrap();

            prop_assert_eq!(&product.value, &((&a * &b) % &q));
            prop_assert!(receiver.check_multiplication(
                &b_commitment,
                &a,
                &product.commitment,
                &product.t
            ));

            receiver.set_commitment(product.commitment.clone());
            prop_assert!(receiver.check_decommitment(&product.blinding, &product.value).unwrap());
        }
    }
}
