// src/challenge_protocol/edge_tracker.rs
//! Edge tracker
//!
//! Acts for one participant at one challenge level: builds history
//! commitments and prefix proofs from the participant's state manager,
//! padding a history that ends early with its latest state,
//! decides whether it agrees with an edge, and submits moves to the ledger.
//! Every failed move is wrapped with its name and edge id, reported to the
//! error handler and returned; nothing here panics.

use log::{debug, info};

use crate::error_handling::{DisputeError, ErrorContext, ErrorHandler};
use crate::interfaces::{Cancellation, ChallengeLedger, LevelZeroEdgeRequest, StateManager, StateManagerError};
use crate::state_commitments::{
    bisect, generate_prefix_proof, virtual_leaves, Digest, HistoryCommitment, MerkleExpansion, PrefixProofError,
    PrefixProofPayload, MAX_LEVEL,
};
use crate::ProtocolConfig;

use super::challenge_graph::{AssertionStatus, ConfirmationRule};
use super::edge::{AssertionId, ChallengeLevel, ClaimId, Edge, EdgeError, EdgeId, OriginId};
use super::one_step::OneStepData;

/// Participant driver for one challenge level
pub struct EdgeTracker<S: StateManager> {
    /// Level this tracker plays at
    level: ChallengeLevel,

    /// History the participant believes in
    state_manager: S,

    /// Protocol parameters
    config: ProtocolConfig,

    /// Signal passed to every backend and ledger call
    cancel: Cancellation,

    /// Receives every failed move
    handler: ErrorHandler,

    /// Staker recorded on level-zero edges
    mini_staker: Option<[u8; 20]>,
}

impl<S: StateManager> EdgeTracker<S> {
    /// Create a tracker for `level`
    pub fn new(level: ChallengeLevel, state_manager: S, config: ProtocolConfig) -> Self {
        Self {
            level,
            state_manager,
            config,
            cancel: Cancellation::new(),
            handler: ErrorHandler::new(),
            mini_staker: None,
        }
    }

    /// Use an existing cancellation signal
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report failures to an existing handler
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.handler = handler;
        self
    }

    /// Record `staker` on the level-zero edges this tracker adds
    pub fn with_mini_staker(mut self, staker: [u8; 20]) -> Self {
        self.mini_staker = Some(staker);
        self
    }

    pub fn level(&self) -> ChallengeLevel {
        self.level
    }

    pub fn state_manager(&self) -> &S {
        &self.state_manager
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancel
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.handler
    }

    fn fail(&self, action: &'static str, edge: EdgeId, err: DisputeError) -> DisputeError {
        let err = DisputeError::in_move(action, edge, err);
        let context = ErrorContext::new("edge_tracker", action)
            .with_metadata("edge", &edge.to_string())
            .with_metadata("level", &self.level.to_string());
        self.handler.handle(&err, &context);
        err
    }

    fn latest(&self) -> Result<u64, DisputeError> {
        Ok(self.state_manager.get_latest_state_height(&self.cancel)?)
    }

    /// Root over the states `start..=end`, past the latest state padded with it
    fn subtree_root(&self, start: u64, end: u64, latest: u64) -> Result<Digest, DisputeError> {
        if end <= latest {
            return Ok(self.state_manager.get_merkle_root(start, end, &self.cancel)?);
        }
        let states = self.padded_states(start, end, latest)?;
        Ok(MerkleExpansion::from_leaves(&states)?.root()?)
    }

    /// States `start..=end`, repeating the latest state past the end of the history
    fn padded_states(&self, start: u64, end: u64, latest: u64) -> Result<Vec<Digest>, DisputeError> {
        let count = end
            .checked_sub(start)
            .map(|span| span + 1)
            .ok_or(PrefixProofError::StartNotLessThanEnd { start, end })?;
        if start > latest {
            let last = self.state_manager.get_state_root(latest, &self.cancel)?;
            return Ok(vec![last; count as usize]);
        }
        let states = self
            .state_manager
            .get_state_roots(start, end.min(latest), &self.cancel)?;
        Ok(virtual_leaves(&states, count)?)
    }

    /// Local commitment to the states `0..=height`.
    ///
    /// A history that ends below `height` is padded with its latest state.
    pub fn history_commitment(&self, height: u64) -> Result<HistoryCommitment, DisputeError> {
        let merkle = self.subtree_root(0, height, self.latest()?)?;
        Ok(HistoryCommitment::new(height, merkle))
    }

    /// State at `height` and its inclusion proof against the commitment at `height`
    pub fn last_state_proof(&self, height: u64) -> Result<(Digest, Vec<Digest>), DisputeError> {
        let states = self.padded_states(0, height, self.latest()?)?;
        let proof = HistoryCommitment::inclusion_proof(&states, height)?;
        Ok((states[height as usize], proof))
    }

    /// Expansion over the states `0..=height`, one root per complete subtree
    fn expansion_at(&self, height: u64, latest: u64) -> Result<MerkleExpansion, DisputeError> {
        let size = height + 1;
        let mut roots = Vec::new();
        let mut offset = 0u64;
        for level in (0..MAX_LEVEL).rev() {
            let width = 1u64 << level;
            if size & width != 0 {
                roots.push(self.subtree_root(offset, offset + width - 1, latest)?);
                offset += width;
            }
        }
        // largest subtree comes first in leaf order, compact form wants lowest level first
        roots.reverse();
        let (expansion, _) = MerkleExpansion::from_compact(&roots, size)?;
        Ok(expansion)
    }

    /// Encoded proof that the commitment at `from` is a prefix of the one at `to`
    pub fn prefix_proof(&self, from: u64, to: u64) -> Result<Vec<u8>, DisputeError> {
        if from >= to {
            return Err(PrefixProofError::StartNotLessThanEnd { start: from, end: to }.into());
        }
        let latest = self.latest()?;
        let pre_expansion = self.expansion_at(from, latest)?;
        let leaves = self.padded_states(from + 1, to, latest)?;
        let post_size = to + 1;
        let fetcher = |remaining: &[Digest], count: u64| -> Result<Digest, DisputeError> {
            let start = post_size - remaining.len() as u64;
            self.subtree_root(start, start + count - 1, latest)
        };
        let proof = generate_prefix_proof(from + 1, &pre_expansion, &leaves, &fetcher)?;
        Ok(PrefixProofPayload { pre_expansion, proof }.encode())
    }

    /// Whether the local history has the edge's start and end commitments
    pub fn agrees_with(&self, edge: &Edge) -> Result<bool, DisputeError> {
        if edge.level != self.level {
            return Ok(false);
        }
        Ok(self.history_commitment(edge.start.height)? == edge.start
            && self.history_commitment(edge.end.height)? == edge.end)
    }

    fn level_zero_request(
        &self,
        origin_id: OriginId,
        claim_id: ClaimId,
        parent_inclusion: Option<(Vec<Digest>, Vec<Digest>)>,
    ) -> Result<LevelZeroEdgeRequest, DisputeError> {
        let end_height = self.config.layer_zero_heights.for_level(self.level);
        let (start_state, _) = self.last_state_proof(0)?;
        let (end_state, end_inclusion) = self.last_state_proof(end_height)?;
        let (start_parent_inclusion, end_parent_inclusion) = parent_inclusion.unwrap_or_default();
        Ok(LevelZeroEdgeRequest {
            level: self.level,
            origin_id,
            claim_id,
            start: self.history_commitment(0)?,
            end: self.history_commitment(end_height)?,
            prefix_proof: self.prefix_proof(0, end_height)?,
            start_state,
            end_state,
            end_inclusion,
            start_parent_inclusion,
            end_parent_inclusion,
            mini_staker: self.mini_staker,
        })
    }

    fn submit_level_zero<L: ChallengeLedger>(
        &self,
        ledger: &mut L,
        request: Result<LevelZeroEdgeRequest, DisputeError>,
        claim_id: ClaimId,
    ) -> Result<EdgeId, DisputeError> {
        let result = request.and_then(|request| Ok(ledger.add_level_zero_edge(request, &self.cancel)?));
        match result {
            Ok(id) => {
                info!("added {} level-zero edge {:?} claiming {:?}", self.level, id, claim_id);
                Ok(id)
            }
            Err(e) => Err(self.fail("add_level_zero_edge", EdgeId(claim_id.0), e)),
        }
    }

    /// Submit a block-level edge claiming `claim`, a child of `parent`.
    ///
    /// Failures are reported against the claimed id, the new edge has none yet.
    pub fn add_block_level_zero_edge<L: ChallengeLedger>(
        &self,
        ledger: &mut L,
        parent: AssertionId,
        claim: AssertionId,
    ) -> Result<EdgeId, DisputeError> {
        let request = if self.level == ChallengeLevel::Block {
            self.level_zero_request(parent.into(), claim.into(), None)
        } else {
            Err(EdgeError::InvalidLevel { level: self.level }.into())
        };
        self.submit_level_zero(ledger, request, claim.into())
    }

    /// Open the subchallenge of a one-step fork one level up, claiming `fork_edge_id`.
    ///
    /// `parent` is this participant's tracker at the fork's level; it proves
    /// where the new edge's first and last states sit in the fork's commitments.
    pub fn open_subchallenge<L: ChallengeLedger, P: StateManager>(
        &self,
        ledger: &mut L,
        fork_edge_id: &EdgeId,
        parent: &EdgeTracker<P>,
    ) -> Result<EdgeId, DisputeError> {
        let fork = ledger
            .get_edge(fork_edge_id)
            .map_err(|e| self.fail("open_subchallenge", *fork_edge_id, e.into()))?;
        if fork.level.next() != Some(self.level) || parent.level != fork.level {
            let err = EdgeError::InvalidLevel { level: self.level };
            return Err(self.fail("open_subchallenge", *fork_edge_id, err.into()));
        }
        info!("opening {} subchallenge on fork {:?}", self.level, fork.id);
        let request = parent
            .last_state_proof(fork.start.height)
            .and_then(|(_, start_proof)| {
                let (_, end_proof) = parent.last_state_proof(fork.end.height)?;
                Ok((start_proof, end_proof))
            })
            .and_then(|proofs| self.level_zero_request(fork.mutual_id.into(), fork.id.into(), Some(proofs)));
        self.submit_level_zero(ledger, request, fork.id.into())
    }

    /// Bisect an edge at its split point using the local history
    pub fn bisect<L: ChallengeLedger>(&self, ledger: &mut L, edge_id: &EdgeId) -> Result<(EdgeId, EdgeId), DisputeError> {
        self.bisect_inner(ledger, edge_id)
            .map_err(|e| self.fail("bisect", *edge_id, e))
    }

    fn bisect_inner<L: ChallengeLedger>(&self, ledger: &mut L, edge_id: &EdgeId) -> Result<(EdgeId, EdgeId), DisputeError> {
        let edge = ledger.get_edge(edge_id)?;
        let mid = bisect(edge.start.height, edge.end.height)?;
        let mid_commit = self.history_commitment(mid)?;
        let proof = self.prefix_proof(mid, edge.end.height)?;
        debug!("bisecting {:?} at height {} with {} proof bytes", edge_id, mid, proof.len());
        let children = ledger.bisect(edge_id, mid_commit.merkle, &proof, &self.cancel)?;
        Ok(children)
    }

    /// One-step data for a single-step edge; `proof` is handed to the prover as-is
    pub fn one_step_data(&self, edge: &Edge, proof: Vec<u8>) -> Result<OneStepData, DisputeError> {
        let states = self.padded_states(0, edge.end.height, self.latest()?)?;
        let start = edge.start.height as usize;
        let before_hash = *states.get(start).ok_or(StateManagerError::HeightOutOfRange {
            height: edge.start.height,
            latest: edge.end.height,
        })?;
        Ok(OneStepData {
            before_hash,
            proof,
            pre_inclusion: HistoryCommitment::inclusion_proof(&states[..=start], edge.start.height)?,
            post_inclusion: HistoryCommitment::inclusion_proof(&states, edge.end.height)?,
        })
    }

    /// Confirm a single-step edge by one-step proof
    pub fn confirm_by_one_step_proof<L: ChallengeLedger>(
        &self,
        ledger: &mut L,
        edge_id: &EdgeId,
        proof: Vec<u8>,
    ) -> Result<(), DisputeError> {
        let result = ledger
            .get_edge(edge_id)
            .map_err(DisputeError::from)
            .and_then(|edge| self.one_step_data(&edge, proof))
            .and_then(|data| Ok(ledger.confirm_by_one_step_proof(edge_id, &data, &self.cancel)?));
        result.map_err(|e| self.fail("confirm_by_one_step_proof", *edge_id, e))
    }

    /// Confirm a one-step-fork edge whose claiming subchallenge edge is confirmed
    pub fn confirm_by_claiming_edge<L: ChallengeLedger>(
        &self,
        ledger: &mut L,
        edge_id: &EdgeId,
        claiming_edge_id: &EdgeId,
    ) -> Result<(), DisputeError> {
        ledger
            .confirm_by_claiming_edge(edge_id, claiming_edge_id, &self.cancel)
            .map_err(|e| self.fail("confirm_by_claiming_edge", *edge_id, e.into()))
    }

    /// Try children, claim and timer, in that order.
    ///
    /// Returns the rule that confirmed the edge, or `None` if no rule applies
    /// yet or the edge was already confirmed.
    pub fn try_confirm<L: ChallengeLedger>(
        &self,
        ledger: &mut L,
        edge_id: &EdgeId,
    ) -> Result<Option<ConfirmationRule>, DisputeError> {
        self.try_confirm_inner(ledger, edge_id)
            .map_err(|e| self.fail("try_confirm", *edge_id, e))
    }

    fn try_confirm_inner<L: ChallengeLedger>(
        &self,
        ledger: &mut L,
        edge_id: &EdgeId,
    ) -> Result<Option<ConfirmationRule>, DisputeError> {
        let edge = ledger.get_edge(edge_id)?;
        if edge.is_confirmed() {
            return Ok(None);
        }

        if let (Some(lower), Some(upper)) = (edge.lower_child_id, edge.upper_child_id) {
            if ledger.get_edge(&lower)?.is_confirmed() && ledger.get_edge(&upper)?.is_confirmed() {
                ledger.confirm_by_children(edge_id, &self.cancel)?;
                return Ok(Some(ConfirmationRule::Children));
            }
        }

        if let Some(claim) = edge.claim_id {
            let claim_confirmed = match edge.level {
                ChallengeLevel::Block => {
                    ledger.get_assertion(&AssertionId(claim.0))?.status == AssertionStatus::Confirmed
                }
                _ => ledger.get_edge(&EdgeId(claim.0))?.is_confirmed(),
            };
            if claim_confirmed {
                ledger.confirm_by_claim(edge_id, &claim, &self.cancel)?;
                return Ok(Some(ConfirmationRule::Claim));
            }
        }

        let ancestors = ledger.compute_ancestors(edge_id)?;
        let mut timer = ledger.time_unrivaled(edge_id)?;
        for ancestor in &ancestors {
            timer = timer.saturating_add(ledger.time_unrivaled(ancestor)?);
        }
        if timer >= ledger.challenge_period_blocks() {
            ledger.confirm_by_timer(edge_id, &ancestors, &self.cancel)?;
            return Ok(Some(ConfirmationRule::Timer));
        }
        debug!(
            "edge {:?} not confirmable yet, path timer {} of {}",
            edge_id,
            timer,
            ledger.challenge_period_blocks()
        );
        Ok(None)
    }
}
