//! Damgård–Fujisaki integer commitments `C = G^a · H^r mod N`.
//!
//! N is a product of two safe primes and G, H generate the same subgroup of
//! quadratic residues, with `log_H G` known to nobody but the receiver at
//! setup time. Committed values are integers with `|a| < T`; the blinding
//! exponent `r` is drawn from `[0, 2^(B + k))` with B the modulus bit length
//! and k the statistical security parameter.

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_traits::One;
use rand::{CryptoRng, RngCore};
use tracing::{debug, trace};

use crate::equality::{EqualityCommitter, EqualityReceiver};
use crate::error::{CommitmentError, Result};
use crate::params::DfParams;
use crate::primes::{random_below_power_of_two, random_safe_prime};
use crate::rsa_group::RsaGroup;
use crate::secret::SecretInt;

/// RSA group whose modulus is a product of two safe primes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecialRsaGroup {
    group: RsaGroup,
}

impl SpecialRsaGroup {
    pub fn generate<R: RngCore + CryptoRng>(params: &DfParams, rng: &mut R) -> Result<Self> {
        params.validate()?;
        let safe_prime = |rng: &mut R| {
            random_safe_prime(
                params.safe_prime_bits,
                params.miller_rabin_rounds,
                params.max_prime_candidates,
                rng,
            )
        };
        let p = safe_prime(rng)?;
        let mut q = safe_prime(rng)?;
        while q == p {
            q = safe_prime(rng)?;
        }
        let group = RsaGroup::from_primes(&p, &q)?;
        debug!(modulus_bits = group.modulus_bits(), "generated special RSA group");
        Ok(Self { group })
    }

    pub fn group(&self) -> &RsaGroup {
        &self.group
    }

    /// Random quadratic residue other than 1
    pub fn random_qr<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        loop {
            let x = self.group.random_element(rng);
            let qr = self.group.mul(&x, &x);
            if !qr.is_one() {
                return qr;
            }
        }
    }
}

/// Everything a committer needs, published by the receiver
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DfPublicParams {
    pub n: BigUint,
    pub g: BigUint,
    pub h: BigUint,
    /// Exclusive bound on |committed value|
    pub t: BigUint,
    /// Statistical security parameter
    pub k: u64,
}

impl DfPublicParams {
    /// Bit length of blinding exponents: `B + k`
    pub fn blinding_bits(&self) -> u64 {
        self.n.bits() + self.k
    }

    /// `[N, G, H, T, k]`
    fn statement(&self) -> Vec<BigUint> {
        vec![
            self.n.clone(),
            self.g.clone(),
            self.h.clone(),
            self.t.clone(),
            BigUint::from(self.k),
        ]
    }
}

fn compute_commit(
    group: &RsaGroup,
    params: &DfPublicParams,
    a: &BigInt,
    r: &BigInt,
) -> Result<BigUint> {
    let g_to_a = group.exp_signed(&params.g, a)?;
    let h_to_r = group.exp_signed(&params.h, r)?;
    Ok(group.mul(&g_to_a, &h_to_r))
}

/// Opening of a Damgård–Fujisaki commitment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DfDecommitment {
    pub value: BigInt,
    pub blinding: BigInt,
}

#[derive(Clone, Debug)]
struct DfPending {
    commitment: BigUint,
    value: SecretInt,
    blinding: SecretInt,
}

#[derive(Clone, Debug)]
pub struct DfReceiver {
    group: RsaGroup,
    params: DfPublicParams,
    commitment: Option<BigUint>,
}

impl DfReceiver {
    /// Generates the group and bases. `G = H^α` for a random α that is
    /// not kept.
    pub fn generate<R: RngCore + CryptoRng>(params: &DfParams, rng: &mut R) -> Result<Self> {
        let special = SpecialRsaGroup::generate(params, rng)?;
        let h = special.random_qr(rng);
        let n = special.group().modulus().clone();
        let g = special
            .group()
            .exp(&h, &rng.gen_biguint_range(&BigUint::one(), &n));

        let public = DfPublicParams {
            n,
            g,
            h,
            t: BigUint::one() << params.value_bound_bits,
            k: params.statistical_security,
        };
        Ok(Self {
            group: special.group,
            params: public,
            commitment: None,
        })
    }

    pub fn public_params(&self) -> &DfPublicParams {
        &self.params
    }

    pub fn set_commitment(&mut self, commitment: BigUint) {
        trace!("receiver stored integer commitment");
        self.commitment = Some(commitment);
    }

    pub fn commitment(&self) -> Option<&BigUint> {
        self.commitment.as_ref()
    }

    /// Checks `G^a · H^r mod N` against the stored commitment.
    pub fn check_decommitment(&self, r: &BigInt, a: &BigInt) -> Result<bool> {
        let commitment = self
            .commitment
            .as_ref()
            .ok_or(CommitmentError::MissingCommitment)?;
        Ok(&compute_commit(&self.group, &self.params, a, r)? == commitment)
    }
}

#[derive(Clone, Debug)]
pub struct DfCommitter {
    group: RsaGroup,
    params: DfPublicParams,
    pending: Option<DfPending>,
}

impl DfCommitter {
    pub fn new(params: DfPublicParams) -> Result<Self> {
        let group = RsaGroup::from_modulus(params.n.clone());
        for (name, base) in [("G", &params.g), ("H", &params.h)] {
            if !group.is_element(base) || base.is_one() {
                return Err(CommitmentError::InvalidElement(format!(
                    "{} is not a valid generator",
                    name
                )));
            }
        }
        Ok(Self {
            group,
            params,
            pending: None,
        })
    }

    pub fn public_params(&self) -> &DfPublicParams {
        &self.params
    }

    /// Commits to `a` with `|a| < T`, replacing any pending opening.
    pub fn commit_msg<R: RngCore + CryptoRng>(
        &mut self,
        a: &BigInt,
        rng: &mut R,
    ) -> Result<BigUint> {
        if a.magnitude() >= &self.params.t {
            return Err(CommitmentError::Range(
                "the committed value needs to be in (-T, T)".to_string(),
            ));
        }
        let r = BigInt::from(random_below_power_of_two(self.params.blinding_bits(), rng));
        let commitment = self.compute_commit(a, &r)?;
        let blinding = SecretInt::from_bigint(&r);
        if let Some(previous) = &self.pending {
            debug_assert_ne!(previous.blinding, blinding, "blinding factor reused");
        }
        self.pending = Some(DfPending {
            commitment: commitment.clone(),
            value: SecretInt::from_bigint(a),
            blinding,
        });
        trace!("integer commitment created");
        Ok(commitment)
    }

    pub fn decommit_msg(&self) -> Result<DfDecommitment> {
        self.pending
            .as_ref()
            .map(|pending| DfDecommitment {
                value: pending.value.to_bigint(),
                blinding: pending.blinding.to_bigint(),
            })
            .ok_or(CommitmentError::NotCommitted)
    }

    pub fn last_commitment(&self) -> Option<&BigUint> {
        self.pending.as_ref().map(|pending| &pending.commitment)
    }

    /// `G^a · H^r mod N`
    pub fn compute_commit(&self, a: &BigInt, r: &BigInt) -> Result<BigUint> {
        compute_commit(&self.group, &self.params, a, r)
    }
}

const SCHEME_LABEL: &[u8] = b"damgard-fujisaki";

impl EqualityCommitter for DfCommitter {
    fn modulus(&self) -> &BigUint {
        &self.params.n
    }

    fn scheme_label(&self) -> &'static [u8] {
        SCHEME_LABEL
    }

    fn public_parameters(&self) -> Vec<BigUint> {
        self.params.statement()
    }

    fn value_bound(&self) -> BigUint {
        self.params.t.clone()
    }

    fn opening(&self) -> Result<(BigInt, BigInt)> {
        let opening = self.decommit_msg()?;
        Ok((opening.value, opening.blinding))
    }

    fn stored_commitment(&self) -> Result<BigUint> {
        self.last_commitment()
            .cloned()
            .ok_or(CommitmentError::NotCommitted)
    }

    /// From `[0, 2^(k + 2·nLen + challenge bits))`
    fn sample_blinding_mask<R: RngCore + CryptoRng>(
        &self,
        challenge_space_bits: u64,
        rng: &mut R,
    ) -> BigInt {
        let bits = self.params.k + 2 * self.params.n.bits() + challenge_space_bits;
        BigInt::from(random_below_power_of_two(bits, rng))
    }

    fn commit_with(&self, value: &BigInt, blinding: &BigInt) -> Result<BigUint> {
        self.compute_commit(value, blinding)
    }

    // r2 + c·r over Z
    fn blinding_response(
        &self,
        mask: &BigInt,
        blinding: &BigInt,
        challenge: &BigUint,
    ) -> Result<BigInt> {
        Ok(mask + BigInt::from(challenge.clone()) * blinding)
    }
}

impl EqualityReceiver for DfReceiver {
    fn modulus(&self) -> &BigUint {
        &self.params.n
    }

    fn scheme_label(&self) -> &'static [u8] {
        SCHEME_LABEL
    }

    fn public_parameters(&self) -> Vec<BigUint> {
        self.params.statement()
    }

    fn stored_commitment(&self) -> Result<&BigUint> {
        self.commitment
            .as_ref()
            .ok_or(CommitmentError::MissingCommitment)
    }

    fn commit_with(&self, value: &BigInt, blinding: &BigInt) -> Result<BigUint> {
        compute_commit(&self.group, &self.params, value, blinding)
    }
}
