//! Homomorphic commitments from q-one-way group homomorphisms and a sigma
//! protocol proving that two commitments, possibly over different groups,
//! hide the same value.

pub mod damgard_fujisaki;
pub mod equality;
pub mod error;
pub mod homomorphism;
pub mod params;
pub mod primes;
pub mod qoneway;
pub mod rsa_group;
pub mod secret;


pub use damgard_fujisaki::{
    DfCommitter, DfDecommitment, DfPublicParams, DfReceiver, SpecialRsaGroup,
};
pub use equality::{
    EqualityCommitter, EqualityProof, EqualityProver, EqualityReceiver, EqualityVerifier,
    ProofData, ProofRandomData,
};
pub use error::{CommitmentError, Result};
pub use homomorphism::{QOneWayHomomorphism, RsaHomomorphism};
pub use params::{DfParams, EqualityParams, GroupParams, SecurityLevel};
pub use qoneway::{Committer, Decommitment, MultiplicationCommitment, Receiver};
pub use rsa_group::RsaGroup;
