// tests/unit/prefix_proof_test.rs
use layer2_dispute_core::state_commitments::{
    bisect, expansion_root_fetcher, generate_prefix_proof, hash_for_u64, maximum_append_between,
    verify_prefix_proof, verify_prefix_proof_bytes, Digest, HistoryCommitment, MerkleExpansion, PrefixProofError,
    PrefixProofPayload, VerifyPrefixProofConfig,
};
use proptest::prelude::*;

fn leaves(n: u64) -> Vec<Digest> {
    (0..n).map(hash_for_u64).collect()
}

/// Verification inputs for the prefix `leaves[..pre]` of `leaves[..post]`
fn proof_config(items: &[Digest], pre: u64, post: u64) -> VerifyPrefixProofConfig {
    let pre_expansion = MerkleExpansion::from_leaves(&items[..pre as usize]).unwrap();
    let post_expansion = MerkleExpansion::from_leaves(&items[..post as usize]).unwrap();
    let prefix_proof = generate_prefix_proof(
        pre,
        &pre_expansion,
        &items[pre as usize..post as usize],
        &expansion_root_fetcher,
    )
    .unwrap();
    VerifyPrefixProofConfig {
        pre_root: pre_expansion.root().unwrap(),
        pre_size: pre,
        post_root: post_expansion.root().unwrap(),
        post_size: post,
        pre_expansion,
        prefix_proof,
    }
}

#[test]
fn test_bisect_zero_nine() {
    // 0 ^ 8 = 0b1000, the mask keeps bit 3 of post - 1
    assert_eq!(bisect(0, 9), Ok(8));
    assert_eq!(bisect(4, 6), Ok(5));
    assert_eq!(bisect(0, 1), Err(PrefixProofError::UnableToBisect { pre: 0, post: 1 }));
}

#[test]
fn test_maximum_append_between_zero_thirteen() {
    // Nothing below start, so a subtree of 8 leaves goes first
    assert_eq!(maximum_append_between(0, 13), Ok(3));
    assert_eq!(maximum_append_between(8, 13), Ok(2));
    assert_eq!(maximum_append_between(12, 13), Ok(0));
    assert_eq!(
        maximum_append_between(13, 13),
        Err(PrefixProofError::StartNotLessThanEnd { start: 13, end: 13 })
    );
}

#[test]
fn test_equal_sizes_rejected() {
    let items = leaves(8);
    let mut cfg = proof_config(&items, 4, 8);
    cfg.post_size = 4;
    cfg.post_root = cfg.pre_root;
    assert_eq!(
        verify_prefix_proof(&cfg),
        Err(PrefixProofError::StartNotLessThanEnd { start: 4, end: 4 })
    );
}

#[test]
fn test_extra_proof_entry_rejected() {
    let items = leaves(13);
    let mut cfg = proof_config(&items, 3, 13);
    let used = cfg.prefix_proof.len();
    cfg.prefix_proof.push(hash_for_u64(99));
    assert_eq!(
        verify_prefix_proof(&cfg),
        Err(PrefixProofError::IncompleteProof { used, len: used + 1 })
    );
}

#[test]
fn test_short_proof_rejected() {
    let items = leaves(13);
    let mut cfg = proof_config(&items, 3, 13);
    cfg.prefix_proof.pop();
    assert_eq!(verify_prefix_proof(&cfg), Err(PrefixProofError::IndexOutOfRange));
}

#[test]
fn test_tampered_entry_rejected() {
    let items = leaves(20);
    let mut cfg = proof_config(&items, 5, 20);
    cfg.prefix_proof[1] = hash_for_u64(1234);
    assert!(matches!(
        verify_prefix_proof(&cfg),
        Err(PrefixProofError::RootMismatch { .. })
    ));
}

#[test]
fn test_wrong_pre_root_rejected() {
    let items = leaves(10);
    let mut cfg = proof_config(&items, 4, 10);
    cfg.pre_root = hash_for_u64(7);
    assert!(matches!(
        verify_prefix_proof(&cfg),
        Err(PrefixProofError::RootMismatch { .. })
    ));
    cfg.pre_size = 0;
    assert_eq!(verify_prefix_proof(&cfg), Err(PrefixProofError::CannotBeZero));
}

#[test]
fn test_generation_checks_prefix_size() {
    let items = leaves(6);
    let expansion = MerkleExpansion::from_leaves(&items[..3]).unwrap();
    assert_eq!(
        generate_prefix_proof(4, &expansion, &items[3..], &expansion_root_fetcher),
        Err(PrefixProofError::TreeSize { expected: 4, actual: 3 })
    );
    assert_eq!(
        generate_prefix_proof(3, &expansion, &[], &expansion_root_fetcher),
        Err(PrefixProofError::StartNotLessThanEnd { start: 3, end: 3 })
    );
}

#[test]
fn test_fetcher_failure_is_reported() {
    let items = leaves(8);
    let expansion = MerkleExpansion::from_leaves(&items[..2]).unwrap();
    let failing = |_: &[Digest], _: u64| -> Result<Digest, String> { Err("backend offline".to_string()) };
    assert_eq!(
        generate_prefix_proof(2, &expansion, &items[2..], &failing),
        Err(PrefixProofError::RootFetcher("backend offline".to_string()))
    );
}

#[test]
fn test_encoded_proof_between_history_commitments() {
    let items = leaves(17);
    let pre = HistoryCommitment::at_height(&items, 4).unwrap();
    let post = HistoryCommitment::at_height(&items, 16).unwrap();
    let bytes = HistoryCommitment::prefix_proof(&items, 4, 16).unwrap();

    assert_eq!(bytes.len() % Digest::LEN, 0);
    assert!(verify_prefix_proof_bytes(pre.merkle, pre.height + 1, post.merkle, post.height + 1, &bytes).is_ok());

    // One stray byte makes the payload unreadable
    let mut truncated = bytes.clone();
    truncated.pop();
    assert_eq!(
        verify_prefix_proof_bytes(pre.merkle, pre.height + 1, post.merkle, post.height + 1, &truncated),
        Err(PrefixProofError::MalformedProofBytes(bytes.len() - 1))
    );

    let payload = PrefixProofPayload::decode(&bytes, pre.height + 1).unwrap();
    assert_eq!(payload.pre_expansion.tree_size(), 5);
    assert_eq!(payload.encode(), bytes);
}

proptest! {
    #[test]
    fn prop_generated_proofs_verify(post in 2u64..200, pre_seed in 0u64..200) {
        let pre = 1 + pre_seed % (post - 1);
        let items = leaves(post);
        let cfg = proof_config(&items, pre, post);
        prop_assert!(verify_prefix_proof(&cfg).is_ok());
    }

    #[test]
    fn prop_proof_rejects_foreign_history(post in 3u64..100, pre_seed in 0u64..100) {
        let pre = 1 + pre_seed % (post - 2);
        let items = leaves(post);
        let mut cfg = proof_config(&items, pre, post);

        let mut forged = items.clone();
        forged[(post - 1) as usize] = hash_for_u64(post + 1000);
        cfg.post_root = MerkleExpansion::from_leaves(&forged).unwrap().root().unwrap();
        prop_assert!(verify_prefix_proof(&cfg).is_err());
    }

    #[test]
    fn prop_bisect_stays_inside(pre in 0u64..10_000, gap in 2u64..10_000) {
        let post = pre + gap;
        let mid = bisect(pre, post).unwrap();
        prop_assert!(pre < mid && mid < post);
    }
}
