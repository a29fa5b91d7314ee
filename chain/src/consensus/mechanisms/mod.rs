//! Concrete consensus mechanisms, each implementing [`super::mechanism::Consensus`].

pub mod dpos;
pub mod hybrid;
pub mod lottery;
pub mod pbft;
pub mod pos;
pub mod raft;
pub mod round_robin_poa;
pub mod tendermint;
pub mod voting;

pub use dpos::DelegatedProofOfStake;
pub use hybrid::HybridConsensus;
pub use lottery::LotteryConsensus;
pub use pbft::Pbft;
pub use pos::ProofOfStake;
pub use raft::Raft;
pub use round_robin_poa::{ProofOfAuthority, RoundRobin};
pub use tendermint::TendermintBft;
pub use voting::VotingBasedConsensus;
