//! Sigma protocol proving that two commitments, possibly in different groups
//! and under different schemes, hide the same integer.
//!
//! Prover and verifier exchange three messages:
//!
//! 1. the prover draws masks `r1`, `r21`, `r22` and sends
//!    `t1 = commit₁(r1, r21)` and `t2 = commit₂(r1, r22)`; the shared `r1`
//!    is what ties both commitments to one value,
//! 2. the verifier replies with a challenge `c ∈ [0, 2^k)`,
//! 3. the prover answers `s1 = r1 + c·a` over the integers together with one
//!    blinding response per commitment, and the verifier checks
//!    `tᵢ · Cᵢ^c = commitᵢ(s1, s2ᵢ) mod Nᵢ` for both sides.
//!
//! The challenge can also be derived from a [`merlin::Transcript`]
//! (Fiat–Shamir), see [`EqualityProver::prove_non_interactive`] and
//! [`EqualityVerifier::verify_non_interactive`].
//!
//! Masks are single use. They are consumed when the response is computed, so
//! a prover instance can answer exactly one challenge. While pending they are
//! held as [`SecretInt`]s and wiped when dropped.

use merlin::Transcript;
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_traits::One;
use rand::{CryptoRng, RngCore};
use tracing::{debug, trace};

use crate::error::{CommitmentError, Result};
use crate::params::EqualityParams;
use crate::primes::random_below_power_of_two;
use crate::secret::SecretInt;

const TRANSCRIPT_DOMAIN: &[u8] = b"qoneway-commitments/equality/v1";

/// Prover-side view of a commitment scheme taking part in the equality proof
pub trait EqualityCommitter {
    fn modulus(&self) -> &BigUint;

    /// Names the scheme in Fiat–Shamir transcripts
    fn scheme_label(&self) -> &'static [u8];

    /// Every public value the opening check depends on, modulus first.
    /// Must match [`EqualityReceiver::public_parameters`] of the peer.
    fn public_parameters(&self) -> Vec<BigUint>;

    /// Exclusive upper bound on the absolute committed value
    fn value_bound(&self) -> BigUint;

    /// The pending opening `(value, blinding)`
    fn opening(&self) -> Result<(BigInt, BigInt)>;

    /// The pending commitment
    fn stored_commitment(&self) -> Result<BigUint>;

    /// Fresh mask for the blinding factor, large enough to hide
    /// `challenge · blinding` for any challenge below `2^challenge_space_bits`
    fn sample_blinding_mask<R: RngCore + CryptoRng>(
        &self,
        challenge_space_bits: u64,
        rng: &mut R,
    ) -> BigInt;

    fn commit_with(&self, value: &BigInt, blinding: &BigInt) -> Result<BigUint>;

    /// Response hiding `blinding` under `mask` for the given challenge
    fn blinding_response(
        &self,
        mask: &BigInt,
        blinding: &BigInt,
        challenge: &BigUint,
    ) -> Result<BigInt>;

    fn modulus_bits(&self) -> u64 {
        self.modulus().bits()
    }
}

/// Verifier-side view of a commitment scheme taking part in the equality proof
pub trait EqualityReceiver {
    fn modulus(&self) -> &BigUint;

    fn scheme_label(&self) -> &'static [u8];

    fn public_parameters(&self) -> Vec<BigUint>;

    /// The commitment this receiver was given
    fn stored_commitment(&self) -> Result<&BigUint>;

    fn commit_with(&self, value: &BigInt, blinding: &BigInt) -> Result<BigUint>;
}

/// First prover message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofRandomData {
    pub t1: BigUint,
    pub t2: BigUint,
}

/// Third prover message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofData {
    pub s1: BigInt,
    pub s21: BigInt,
    pub s22: BigInt,
}

/// Complete transcript of one proof, used when the challenge is derived by
/// the prover via Fiat–Shamir
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EqualityProof {
    pub random_data: ProofRandomData,
    pub challenge: BigUint,
    pub response: ProofData,
}

struct ProofMasks {
    r1: SecretInt,
    r21: SecretInt,
    r22: SecretInt,
}

enum ProverState {
    Initial,
    RandomDataSent(ProofMasks),
    ResponseSent,
}

impl ProverState {
    fn name(&self) -> &'static str {
        match self {
            ProverState::Initial => "Initial",
            ProverState::RandomDataSent(_) => "RandomDataSent",
            ProverState::ResponseSent => "ResponseSent",
        }
    }
}

pub struct EqualityProver<'a, C1: EqualityCommitter, C2: EqualityCommitter> {
    committer1: &'a C1,
    committer2: &'a C2,
    params: EqualityParams,
    state: ProverState,
}

impl<'a, C1: EqualityCommitter, C2: EqualityCommitter> EqualityProver<'a, C1, C2> {
    /// Both committers must already hold a commitment to the same value.
    pub fn new(committer1: &'a C1, committer2: &'a C2, params: EqualityParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            committer1,
            committer2,
            params,
            state: ProverState::Initial,
        })
    }

    pub fn state(&self) -> &'static str {
        self.state.name()
    }

    /// Draws the masks and returns `(t1, t2)`.
    pub fn proof_random_data<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<ProofRandomData> {
        if !matches!(self.state, ProverState::Initial) {
            return Err(CommitmentError::ProtocolState {
                step: "proof_random_data",
                state: self.state.name(),
            });
        }
        let k = self.params.challenge_space_bits;

        // r1 from [0, T · 2^(nLen + k)), T the first committer's value bound
        let r1_bound = self.committer1.value_bound() << (self.committer1.modulus_bits() + k);
        let r1 = BigInt::from(rng.gen_biguint_below(&r1_bound));
        let r21 = self.committer1.sample_blinding_mask(k, rng);
        let r22 = self.committer2.sample_blinding_mask(k, rng);

        let t1 = self.committer1.commit_with(&r1, &r21)?;
        let t2 = self.committer2.commit_with(&r1, &r22)?;

        self.state = ProverState::RandomDataSent(ProofMasks {
            r1: SecretInt::from_bigint(&r1),
            r21: SecretInt::from_bigint(&r21),
            r22: SecretInt::from_bigint(&r22),
        });
        trace!("equality prover sent random data");
        Ok(ProofRandomData { t1, t2 })
    }

    /// Computes `(s1, s21, s22)` for `challenge` and consumes the masks.
    pub fn proof_data(&mut self, challenge: &BigUint) -> Result<ProofData> {
        let masks = match &self.state {
            ProverState::RandomDataSent(masks) => masks,
            other => {
                return Err(CommitmentError::ProtocolState {
                    step: "proof_data",
                    state: other.name(),
                })
            }
        };
        check_challenge(challenge, self.params.challenge_space_bits)?;

        let (a, rr1) = self.committer1.opening()?;
        let (_, rr2) = self.committer2.opening()?;

        // s1 = r1 + c·a over Z, not reduced
        let s1 = masks.r1.to_bigint() + BigInt::from(challenge.clone()) * &a;
        let s21 = self
            .committer1
            .blinding_response(&masks.r21.to_bigint(), &rr1, challenge)?;
        let s22 = self
            .committer2
            .blinding_response(&masks.r22.to_bigint(), &rr2, challenge)?;

        self.state = ProverState::ResponseSent;
        trace!("equality prover sent response");
        Ok(ProofData { s1, s21, s22 })
    }

    /// Runs all three moves with the challenge taken from `transcript`.
    ///
    /// The transcript absorbs the challenge size, the scheme and public
    /// parameters of both sides, both commitments and both random commitments
    /// before the challenge is squeezed.
    pub fn prove_non_interactive<R: RngCore + CryptoRng>(
        &mut self,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Result<EqualityProof> {
        let commitment1 = self.committer1.stored_commitment()?;
        let commitment2 = self.committer2.stored_commitment()?;
        let random_data = self.proof_random_data(rng)?;

        let side1 = SideStatement {
            scheme: self.committer1.scheme_label(),
            parameters: self.committer1.public_parameters(),
            commitment: &commitment1,
        };
        let side2 = SideStatement {
            scheme: self.committer2.scheme_label(),
            parameters: self.committer2.public_parameters(),
            commitment: &commitment2,
        };
        append_statement(
            transcript,
            self.params.challenge_space_bits,
            [&side1, &side2],
            &random_data,
        );
        let challenge = challenge_from_transcript(transcript, self.params.challenge_space_bits);
        let response = self.proof_data(&challenge)?;

        Ok(EqualityProof {
            random_data,
            challenge,
            response,
        })
    }
}

enum VerifierState {
    Initial,
    RandomDataReceived(ProofRandomData),
    ChallengeIssued {
        random_data: ProofRandomData,
        challenge: BigUint,
    },
    Verified,
    Rejected,
}

impl VerifierState {
    fn name(&self) -> &'static str {
        match self {
            VerifierState::Initial => "Initial",
            VerifierState::RandomDataReceived(_) => "RandomDataReceived",
            VerifierState::ChallengeIssued { .. } => "ChallengeIssued",
            VerifierState::Verified => "Verified",
            VerifierState::Rejected => "Rejected",
        }
    }
}

pub struct EqualityVerifier<'a, R1: EqualityReceiver, R2: EqualityReceiver> {
    receiver1: &'a R1,
    receiver2: &'a R2,
    params: EqualityParams,
    state: VerifierState,
}

impl<'a, R1: EqualityReceiver, R2: EqualityReceiver> EqualityVerifier<'a, R1, R2> {
    /// Both receivers must already hold the commitments under test.
    pub fn new(receiver1: &'a R1, receiver2: &'a R2, params: EqualityParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            receiver1,
            receiver2,
            params,
            state: VerifierState::Initial,
        })
    }

    pub fn state(&self) -> &'static str {
        self.state.name()
    }

    pub fn set_proof_random_data(&mut self, random_data: ProofRandomData) -> Result<()> {
        if !matches!(self.state, VerifierState::Initial) {
            return Err(CommitmentError::ProtocolState {
                step: "set_proof_random_data",
                state: self.state.name(),
            });
        }
        if !is_unit(&random_data.t1, self.receiver1.modulus())
            || !is_unit(&random_data.t2, self.receiver2.modulus())
        {
            return Err(CommitmentError::InvalidElement(
                "random commitment is not a group element".to_string(),
            ));
        }
        self.state = VerifierState::RandomDataReceived(random_data);
        Ok(())
    }

    /// Interactive mode: draws a uniform challenge from `[0, 2^k)`.
    pub fn challenge<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<BigUint> {
        let challenge = random_below_power_of_two(self.params.challenge_space_bits, rng);
        self.issue_challenge(challenge.clone(), "challenge")?;
        Ok(challenge)
    }

    /// Non-interactive mode: accepts a challenge computed elsewhere, e.g. a
    /// hash of the transcript.
    pub fn set_challenge(&mut self, challenge: BigUint) -> Result<()> {
        check_challenge(&challenge, self.params.challenge_space_bits)?;
        self.issue_challenge(challenge, "set_challenge")
    }

    fn issue_challenge(&mut self, challenge: BigUint, step: &'static str) -> Result<()> {
        match std::mem::replace(&mut self.state, VerifierState::Initial) {
            VerifierState::RandomDataReceived(random_data) => {
                self.state = VerifierState::ChallengeIssued {
                    random_data,
                    challenge,
                };
                Ok(())
            }
            other => {
                let state = other.name();
                self.state = other;
                Err(CommitmentError::ProtocolState { step, state })
            }
        }
    }

    /// Checks `tᵢ · Cᵢ^c = commitᵢ(s1, s2ᵢ) mod Nᵢ` for both sides.
    ///
    /// `Ok(false)` means the proof was rejected; errors are reserved for
    /// protocol misuse and malformed responses.
    pub fn verify(&mut self, response: &ProofData) -> Result<bool> {
        let (random_data, challenge) = match &self.state {
            VerifierState::ChallengeIssued {
                random_data,
                challenge,
            } => (random_data, challenge),
            other => {
                return Err(CommitmentError::ProtocolState {
                    step: "verify",
                    state: other.name(),
                })
            }
        };

        let accepted = check_side(
            self.receiver1,
            &random_data.t1,
            challenge,
            &response.s1,
            &response.s21,
        )? && check_side(
            self.receiver2,
            &random_data.t2,
            challenge,
            &response.s1,
            &response.s22,
        )?;

        self.state = if accepted {
            VerifierState::Verified
        } else {
            VerifierState::Rejected
        };
        debug!(accepted, "equality proof verified");
        Ok(accepted)
    }

    /// Verifies a Fiat–Shamir proof against a transcript in the same state
    /// the prover started from.
    pub fn verify_non_interactive(
        &mut self,
        proof: &EqualityProof,
        transcript: &mut Transcript,
    ) -> Result<bool> {
        let commitment1 = self.receiver1.stored_commitment()?.clone();
        let commitment2 = self.receiver2.stored_commitment()?.clone();
        self.set_proof_random_data(proof.random_data.clone())?;

        let side1 = SideStatement {
            scheme: self.receiver1.scheme_label(),
            parameters: self.receiver1.public_parameters(),
            commitment: &commitment1,
        };
        let side2 = SideStatement {
            scheme: self.receiver2.scheme_label(),
            parameters: self.receiver2.public_parameters(),
            commitment: &commitment2,
        };
        append_statement(
            transcript,
            self.params.challenge_space_bits,
            [&side1, &side2],
            &proof.random_data,
        );
        let expected = challenge_from_transcript(transcript, self.params.challenge_space_bits);
        if expected != proof.challenge {
            self.state = VerifierState::Rejected;
            debug!("equality proof challenge mismatch");
            return Ok(false);
        }
        self.set_challenge(expected)?;
        self.verify(&proof.response)
    }
}

fn check_side<R: EqualityReceiver>(
    receiver: &R,
    random_commitment: &BigUint,
    challenge: &BigUint,
    s1: &BigInt,
    s2: &BigInt,
) -> Result<bool> {
    let n = receiver.modulus();
    let commitment = receiver.stored_commitment()?;
    let left = (random_commitment * commitment.modpow(challenge, n)) % n;
    let right = receiver.commit_with(s1, s2)?;
    Ok(left == right)
}

fn check_challenge(challenge: &BigUint, challenge_space_bits: u64) -> Result<()> {
    if challenge.bits() > challenge_space_bits {
        return Err(CommitmentError::ChallengeOutOfRange {
            challenge_space_bits,
        });
    }
    Ok(())
}

fn is_unit(x: &BigUint, n: &BigUint) -> bool {
    x < n && crate::primes::coprime(x, n) && x.bits() > 0
}

fn append_biguint(transcript: &mut Transcript, label: &'static [u8], value: &BigUint) {
    transcript.append_message(label, &value.to_bytes_be());
}

/// Public data one side of the proof is checked against
struct SideStatement<'s> {
    scheme: &'static [u8],
    parameters: Vec<BigUint>,
    commitment: &'s BigUint,
}

fn append_statement(
    transcript: &mut Transcript,
    challenge_space_bits: u64,
    sides: [&SideStatement<'_>; 2],
    random_data: &ProofRandomData,
) {
    transcript.append_message(b"dom-sep", TRANSCRIPT_DOMAIN);
    transcript.append_u64(b"challenge-bits", challenge_space_bits);
    for side in sides {
        transcript.append_message(b"scheme", side.scheme);
        transcript.append_u64(b"parameter-count", side.parameters.len() as u64);
        for parameter in &side.parameters {
            append_biguint(transcript, b"parameter", parameter);
        }
        append_biguint(transcript, b"commitment", side.commitment);
    }
    append_biguint(transcript, b"t1", &random_data.t1);
    append_biguint(transcript, b"t2", &random_data.t2);
}

/// Squeezes a challenge in `[0, 2^challenge_space_bits)` from the transcript.
pub fn challenge_from_transcript(
    transcript: &mut Transcript,
    challenge_space_bits: u64,
) -> BigUint {
    let mut bytes = vec![0u8; ((challenge_space_bits + 7) / 8) as usize];
    transcript.challenge_bytes(b"challenge", &mut bytes);
    let modulus = BigUint::one() << challenge_space_bits;
    BigUint::from_bytes_be(&bytes) % modulus
}
