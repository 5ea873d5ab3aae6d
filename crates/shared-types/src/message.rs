//! # Consensus Messages
//!
//! Everything a consensus engine sends to, or receives from, its peers.

use crate::aggregation::{AggregatedEENVotes, AggregatedVotes, EENVote};
use crate::block::Block;
use crate::codec::{decode, encode};
use crate::errors::CodecError;
use crate::vote::{CommitCertificate, Proposal, Vote};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMessage {
    Proposal(Proposal),
    Vote(Vote),
    /// A block sent outside of a proposal, e.g. while catching up.
    Block(Block),
    CommitCertificate(CommitCertificate),
    GuardianVotes(AggregatedVotes),
    EliteEdgeNodeVote(EENVote),
    EliteEdgeNodeVotes(AggregatedEENVotes),
}

impl ConsensusMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Proposal(_) => "proposal",
            Self::Vote(_) => "vote",
            Self::Block(_) => "block",
            Self::CommitCertificate(_) => "commit_certificate",
            Self::GuardianVotes(_) => "guardian_votes",
            Self::EliteEdgeNodeVote(_) => "elite_edge_node_vote",
            Self::EliteEdgeNodeVotes(_) => "elite_edge_node_votes",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        decode(bytes)
    }
}

impl fmt::Display for ConsensusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ForkSchedule;
    use shared_crypto::Secp256k1KeyPair;

    #[test]
    fn test_wire_format_preserves_signed_vote() {
        let key = Secp256k1KeyPair::generate();
        let mut vote = Vote::new([3u8; 32], 1, 1, key.address());
        vote.sign(&key).unwrap();

        let msg = ConsensusMessage::Vote(vote);
        let decoded = ConsensusMessage::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        match decoded {
            ConsensusMessage::Vote(v) => assert!(v.validate().is_ok()),
            other => panic!("unexpected {}", other),
        }
    }

    #[test]
    fn test_decoded_block_keeps_hash() {
        let block = Block::genesis("testnet", &ForkSchedule::default());
        let msg = ConsensusMessage::Block(block.clone());
        let decoded = ConsensusMessage::from_bytes(&msg.to_bytes().unwrap()).unwrap();

        let ConsensusMessage::Block(b) = decoded else {
            panic!("expected block");
        };
        assert_eq!(b.hash(), block.hash());
        assert_eq!(msg.kind(), "block");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(ConsensusMessage::from_bytes(&[0xFF; 3]).is_err());
    }
}
