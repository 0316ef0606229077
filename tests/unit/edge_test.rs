// tests/unit/edge_test.rs
use layer2_dispute_core::challenge_protocol::{
    calculate_edge_id, calculate_mutual_id, verify_one_step, AssertionId, ChallengeLevel, ClaimId, Edge, EdgeError,
    EdgeId, EdgeStatus, MutualId, OneStepData, OriginId,
};
use layer2_dispute_core::developer_tools::{HashChainProver, MockStateManager};
use layer2_dispute_core::state_commitments::{
    hash_for_u64, Digest, HistoryCommitment, InclusionProofError, PrefixProofError,
};
use layer2_dispute_core::{LayerZeroHeights, ProtocolConfig};

fn config(height: u64) -> ProtocolConfig {
    ProtocolConfig {
        challenge_period_blocks: 10,
        layer_zero_heights: LayerZeroHeights {
            block: height,
            big_step: height,
            small_step: height,
        },
        ..ProtocolConfig::default()
    }
}

fn states(steps: u64) -> Vec<Digest> {
    MockStateManager::hash_chain(hash_for_u64(42), steps).states().to_vec()
}

fn commit(states: &[Digest], height: u64) -> HistoryCommitment {
    HistoryCommitment::at_height(states, height).unwrap()
}

fn block_edge(states: &[Digest], height: u64) -> Edge {
    let proof = HistoryCommitment::prefix_proof(states, 0, height).unwrap();
    Edge::new_block_level_zero(
        &config(height),
        AssertionId(hash_for_u64(100)),
        AssertionId(hash_for_u64(101)),
        commit(states, 0),
        commit(states, height),
        &proof,
        7,
        Some([9u8; 20]),
    )
    .unwrap()
}

/// Small-step level-zero edge covering the single step `0 -> 1`
fn one_step_edge(states: &[Digest]) -> Edge {
    let proof = HistoryCommitment::prefix_proof(states, 0, 1).unwrap();
    Edge::new_subchallenge_level_zero(
        &config(1),
        ChallengeLevel::SmallStep,
        MutualId(hash_for_u64(200)),
        EdgeId(hash_for_u64(201)),
        commit(states, 0),
        commit(states, 1),
        &proof,
        0,
        None,
    )
    .unwrap()
}

#[test]
fn test_block_level_zero_edge_fields() {
    let s = states(8);
    let edge = block_edge(&s, 8);

    let origin = OriginId(hash_for_u64(100));
    assert_eq!(edge.id, calculate_edge_id(ChallengeLevel::Block, &origin, &edge.start, &edge.end));
    assert_eq!(edge.mutual_id, calculate_mutual_id(ChallengeLevel::Block, &origin, &edge.start));
    assert_eq!(edge.claim_id, Some(ClaimId(hash_for_u64(101))));
    assert_eq!(edge.length(), 8);
    assert_eq!(edge.created_at_block, 7);
    assert_eq!(edge.mini_staker, Some([9u8; 20]));
    assert_eq!(edge.status, EdgeStatus::Pending);
    assert!(edge.is_level_zero());
    assert!(!edge.has_children());
}

#[test]
fn test_level_zero_heights_enforced() {
    let s = states(8);
    let proof = HistoryCommitment::prefix_proof(&s, 0, 4).unwrap();
    let result = Edge::new_block_level_zero(
        &config(8),
        AssertionId(hash_for_u64(100)),
        AssertionId(hash_for_u64(101)),
        commit(&s, 0),
        commit(&s, 4),
        &proof,
        0,
        None,
    );
    assert_eq!(
        result,
        Err(EdgeError::InvalidHeights {
            start: 0,
            end: 4,
            expected: 8
        })
    );

    let proof = HistoryCommitment::prefix_proof(&s, 1, 8).unwrap();
    let result = Edge::new_block_level_zero(
        &config(8),
        AssertionId(hash_for_u64(100)),
        AssertionId(hash_for_u64(101)),
        commit(&s, 1),
        commit(&s, 8),
        &proof,
        0,
        None,
    );
    assert!(matches!(result, Err(EdgeError::InvalidHeights { start: 1, .. })));
}

#[test]
fn test_level_zero_needs_valid_prefix_proof() {
    let s = states(8);
    let other = states(9);
    // Proof over a different history does not link these commitments
    let proof = HistoryCommitment::prefix_proof(&other[1..], 0, 8).unwrap();
    let result = Edge::new_block_level_zero(
        &config(8),
        AssertionId(hash_for_u64(100)),
        AssertionId(hash_for_u64(101)),
        commit(&s, 0),
        commit(&s, 8),
        &proof,
        0,
        None,
    );
    assert!(matches!(result, Err(EdgeError::PrefixProof(PrefixProofError::RootMismatch { .. }))));
}

#[test]
fn test_subchallenge_cannot_be_block_level() {
    let s = states(1);
    let proof = HistoryCommitment::prefix_proof(&s, 0, 1).unwrap();
    let result = Edge::new_subchallenge_level_zero(
        &config(1),
        ChallengeLevel::Block,
        MutualId(hash_for_u64(1)),
        EdgeId(hash_for_u64(2)),
        commit(&s, 0),
        commit(&s, 1),
        &proof,
        0,
        None,
    );
    assert_eq!(
        result,
        Err(EdgeError::InvalidLevel {
            level: ChallengeLevel::Block
        })
    );
}

#[test]
fn test_bisection_children_share_midpoint() {
    let s = states(8);
    let edge = block_edge(&s, 8);
    let mid = 4;
    let proof = HistoryCommitment::prefix_proof(&s, mid, 8).unwrap();
    let bisection = edge.bisect(commit(&s, mid).merkle, &proof, 20).unwrap();

    assert_eq!(bisection.lower.start, edge.start);
    assert_eq!(bisection.lower.end, commit(&s, mid));
    assert_eq!(bisection.upper.start, commit(&s, mid));
    assert_eq!(bisection.upper.end, edge.end);
    for child in [&bisection.lower, &bisection.upper] {
        assert_eq!(child.level, edge.level);
        assert_eq!(child.origin_id, edge.origin_id);
        assert_eq!(child.claim_id, None);
        assert_eq!(child.created_at_block, 20);
    }
    assert_eq!(bisection.parent.lower_child_id, Some(bisection.lower.id));
    assert_eq!(bisection.parent.upper_child_id, Some(bisection.upper.id));
    assert_eq!(
        bisection.parent.bisect(commit(&s, mid).merkle, &proof, 21),
        Err(EdgeError::AlreadyBisected(edge.id))
    );
}

#[test]
fn test_bisection_with_wrong_midpoint_rejected() {
    let s = states(8);
    let edge = block_edge(&s, 8);
    // Commitment at height 3 claimed as the height-4 split point
    let proof = HistoryCommitment::prefix_proof(&s, 3, 8).unwrap();
    assert!(matches!(
        edge.bisect(commit(&s, 3).merkle, &proof, 20),
        Err(EdgeError::PrefixProof(_))
    ));
}

#[test]
fn test_unit_edge_cannot_bisect() {
    let s = states(1);
    let edge = one_step_edge(&s);
    assert!(edge.has_length_one());
    assert_eq!(
        edge.bisect(commit(&s, 0).merkle, &[], 1),
        Err(EdgeError::PrefixProof(PrefixProofError::UnableToBisect { pre: 0, post: 1 }))
    );
}

#[test]
fn test_confirmed_edge_cannot_bisect() {
    let s = states(8);
    let mut edge = block_edge(&s, 8);
    edge.status = EdgeStatus::Confirmed;
    let proof = HistoryCommitment::prefix_proof(&s, 4, 8).unwrap();
    assert_eq!(
        edge.bisect(commit(&s, 4).merkle, &proof, 20),
        Err(EdgeError::NotPending(edge.id))
    );
}

fn one_step_data(states: &[Digest], proof: Vec<u8>) -> OneStepData {
    OneStepData {
        before_hash: states[0],
        proof,
        pre_inclusion: HistoryCommitment::inclusion_proof(&states[..1], 0).unwrap(),
        post_inclusion: HistoryCommitment::inclusion_proof(&states[..2], 1).unwrap(),
    }
}

#[test]
fn test_one_step_proof_accepted() {
    let s = states(1);
    let edge = one_step_edge(&s);
    let data = one_step_data(&s, HashChainProver::step_proof(0));
    assert_eq!(verify_one_step(&edge, &data, &HashChainProver, 256), Ok(()));
}

#[test]
fn test_one_step_proof_wrong_execution() {
    let s = states(1);
    let edge = one_step_edge(&s);
    let data = one_step_data(&s, HashChainProver::step_proof(5));
    assert!(matches!(
        verify_one_step(&edge, &data, &HashChainProver, 256),
        Err(EdgeError::PostStateMismatch { .. })
    ));

    let data = one_step_data(&s, Vec::new());
    assert!(matches!(
        verify_one_step(&edge, &data, &HashChainProver, 256),
        Err(EdgeError::OneStep(_))
    ));
}

#[test]
fn test_one_step_proof_wrong_pre_state() {
    let s = states(1);
    let edge = one_step_edge(&s);
    let mut data = one_step_data(&s, HashChainProver::step_proof(0));
    data.before_hash = hash_for_u64(3);
    assert!(matches!(
        verify_one_step(&edge, &data, &HashChainProver, 256),
        Err(EdgeError::InclusionProof(InclusionProofError::RootMismatch { .. }))
    ));
}

#[test]
fn test_one_step_only_for_single_small_steps() {
    let s = states(8);
    let edge = block_edge(&s, 8);
    let data = one_step_data(&s, HashChainProver::step_proof(0));
    assert_eq!(
        verify_one_step(&edge, &data, &HashChainProver, 256),
        Err(EdgeError::NotOneStepEdge(edge.id))
    );

    let s = states(1);
    let edge = one_step_edge(&s);
    let mut data = one_step_data(&s, HashChainProver::step_proof(0));
    data.post_inclusion = vec![hash_for_u64(1); 3];
    assert_eq!(
        verify_one_step(&edge, &data, &HashChainProver, 2),
        Err(EdgeError::InclusionProof(InclusionProofError::ProofTooLong(3)))
    );
}
