// src/challenge_protocol/mod.rs
//! Edge-based challenge protocol
//!
//! This module drives disputes over assertions:
//! - Edges, their ids and bisection
//! - The dispute graph and its confirmation rules
//! - One-step proofs terminating the hierarchy
//! - The edge tracker acting for one participant
//!
//! A disagreement starts at the block level, is bisected down to a one-step
//! fork, opens a big-step subchallenge, is bisected again, opens a
//! small-step subchallenge and finally ends in a one-step proof.

mod challenge_graph;
mod edge;
mod edge_tracker;
mod one_step;

pub use challenge_graph::{Assertion, AssertionStatus, ChallengeGraph, ConfirmationRule};
pub use edge::{
    calculate_edge_id, calculate_mutual_id, AssertionId, Bisection, ChallengeLevel, ClaimId, Edge, EdgeError,
    EdgeId, EdgeStatus, MutualId, OriginId,
};
pub use edge_tracker::EdgeTracker;
pub use one_step::{verify_one_step, OneStepData, OneStepError, OneStepProver};
