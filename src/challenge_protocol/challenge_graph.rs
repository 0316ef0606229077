// src/challenge_protocol/challenge_graph.rs
//! Local mirror of the dispute graph
//!
//! Holds the edges and assertions a participant has observed and applies the
//! protocol rules to them: level-zero edge creation, bisection, and the
//! confirmation rules (timer, children, claim, one-step proof). It implements
//! [`ChallengeLedger`] so it can also stand in for the on-chain challenge
//! manager when simulating a dispute.

use borsh::{BorshDeserialize, BorshSerialize};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error_handling::DisputeError;
use crate::interfaces::{Cancellation, ChallengeLedger, LedgerError, LevelZeroEdgeRequest};
use crate::state_commitments::{Digest, InclusionProofError};
use crate::ProtocolConfig;

use super::edge::{AssertionId, ChallengeLevel, ClaimId, Edge, EdgeError, EdgeId, EdgeStatus, MutualId};
use super::one_step::{verify_one_step, OneStepData, OneStepProver};

/// Assertion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AssertionStatus {
    Pending,
    Confirmed,
}

/// A claimed state transition, owned by the ledger
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Assertion {
    pub id: AssertionId,
    pub prev_id: AssertionId,
    pub execution_state_before: Digest,
    pub execution_state_after: Digest,
    pub inbox_count_required: u64,
    pub status: AssertionStatus,
}

/// Which rule confirmed an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationRule {
    Timer,
    Children,
    Claim,
    ClaimingEdge,
    OneStepProof,
}

/// Dispute graph mirror
pub struct ChallengeGraph {
    /// Protocol parameters
    config: ProtocolConfig,

    /// Executes single steps for one-step proofs
    prover: Box<dyn OneStepProver>,

    /// Edges by id
    edges: HashMap<EdgeId, Edge>,

    /// Edge ids by mutual id, in submission order
    rivals: HashMap<MutualId, Vec<EdgeId>>,

    /// Parents of every child edge; rivals that bisect alike share children
    parents: HashMap<EdgeId, Vec<EdgeId>>,

    /// Assertions by id
    assertions: HashMap<AssertionId, Assertion>,

    /// Latest observed block
    current_block: u64,
}

impl ChallengeGraph {
    /// Create an empty graph; fails if `config` does not validate
    pub fn new(config: ProtocolConfig, prover: Box<dyn OneStepProver>) -> Result<Self, DisputeError> {
        config.validate()?;
        Ok(Self {
            config,
            prover,
            edges: HashMap::new(),
            rivals: HashMap::new(),
            parents: HashMap::new(),
            assertions: HashMap::new(),
            current_block: 0,
        })
    }

    /// Protocol parameters
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Latest observed block
    pub fn current_block(&self) -> u64 {
        self.current_block
    }

    /// Move the observed block forward
    pub fn advance_blocks(&mut self, blocks: u64) {
        self.current_block = self.current_block.saturating_add(blocks);
    }

    /// Record an assertion
    pub fn add_assertion(&mut self, assertion: Assertion) {
        debug!("tracking assertion {:?}", assertion.id);
        self.assertions.insert(assertion.id, assertion);
    }

    /// Mark an assertion confirmed
    pub fn confirm_assertion(&mut self, id: &AssertionId) -> Result<(), EdgeError> {
        let assertion = self
            .assertions
            .get_mut(id)
            .ok_or(EdgeError::AssertionNotFound(*id))?;
        assertion.status = AssertionStatus::Confirmed;
        info!("assertion {:?} confirmed", id);
        Ok(())
    }

    /// Assertion by id
    pub fn assertion(&self, id: &AssertionId) -> Option<&Assertion> {
        self.assertions.get(id)
    }

    /// Edge by id
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    fn edge_or_err(&self, id: &EdgeId) -> Result<&Edge, EdgeError> {
        self.edges.get(id).ok_or(EdgeError::EdgeNotFound(*id))
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph holds no edges
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Every edge sharing a mutual id, in submission order
    pub fn rivals_of(&self, mutual_id: &MutualId) -> &[EdgeId] {
        self.rivals.get(mutual_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether another edge shares this edge's mutual id
    pub fn has_rival(&self, id: &EdgeId) -> Result<bool, EdgeError> {
        let edge = self.edge_or_err(id)?;
        Ok(self.rivals_of(&edge.mutual_id).iter().any(|other| other != id))
    }

    /// Insert an edge as-is
    pub fn insert_edge(&mut self, edge: Edge) -> Result<EdgeId, EdgeError> {
        let id = edge.id;
        if self.edges.contains_key(&id) {
            return Err(EdgeError::EdgeExists(id));
        }
        self.rivals.entry(edge.mutual_id).or_default().push(id);
        self.edges.insert(id, edge);
        Ok(id)
    }

    /// Validate and insert a level-zero edge
    pub fn add_level_zero_edge(&mut self, request: LevelZeroEdgeRequest) -> Result<EdgeId, EdgeError> {
        let edge = match request.level {
            ChallengeLevel::Block => {
                let origin = AssertionId(request.origin_id.0);
                let claim = AssertionId(request.claim_id.0);
                if !self.assertions.contains_key(&origin) {
                    return Err(EdgeError::AssertionNotFound(origin));
                }
                let claimed = self
                    .assertions
                    .get(&claim)
                    .ok_or(EdgeError::AssertionNotFound(claim))?;
                if claimed.prev_id != origin {
                    return Err(EdgeError::OriginMismatch {
                        origin: request.origin_id,
                        claim: request.claim_id,
                    });
                }
                let edge = Edge::new_block_level_zero(
                    &self.config,
                    origin,
                    claim,
                    request.start,
                    request.end,
                    &request.prefix_proof,
                    self.current_block,
                    request.mini_staker,
                )?;
                // the edge must run from the assertion's prior state to the one it asserts
                if request.start_state != claimed.execution_state_before {
                    return Err(EdgeError::StartStateMismatch {
                        expected: claimed.execution_state_before,
                        actual: request.start_state,
                    });
                }
                if request.end_state != claimed.execution_state_after {
                    return Err(EdgeError::EndStateMismatch {
                        expected: claimed.execution_state_after,
                        actual: request.end_state,
                    });
                }
                edge
            }
            level => {
                let claimed_id = EdgeId(request.claim_id.0);
                let claimed = self.edge_or_err(&claimed_id)?;
                if claimed.level.next() != Some(level) {
                    return Err(EdgeError::InvalidLevel { level });
                }
                if !claimed.is_one_step_fork_source() || !self.has_rival(&claimed_id)? {
                    return Err(EdgeError::ClaimNotOneStepFork(request.claim_id));
                }
                if claimed.mutual_id.0 != request.origin_id.0 {
                    return Err(EdgeError::OriginMismatch {
                        origin: request.origin_id,
                        claim: request.claim_id,
                    });
                }
                let edge = Edge::new_subchallenge_level_zero(
                    &self.config,
                    level,
                    claimed.mutual_id,
                    claimed_id,
                    request.start,
                    request.end,
                    &request.prefix_proof,
                    self.current_block,
                    request.mini_staker,
                )?;
                // the subchallenge refines exactly the one step the claimed edge makes
                self.check_proof_len(&request.start_parent_inclusion)?;
                self.check_proof_len(&request.end_parent_inclusion)?;
                claimed.start.verify_inclusion(
                    claimed.start.height,
                    &request.start_state,
                    &request.start_parent_inclusion,
                )?;
                claimed
                    .end
                    .verify_inclusion(claimed.end.height, &request.end_state, &request.end_parent_inclusion)?;
                edge
            }
        };
        self.check_proof_len(&request.end_inclusion)?;
        edge.start.verify_inclusion(0, &request.start_state, &[])?;
        edge.end
            .verify_inclusion(edge.end.height, &request.end_state, &request.end_inclusion)?;

        let id = self.insert_edge(edge)?;
        info!("added {} level-zero edge {:?}", request.level, id);
        Ok(id)
    }

    fn check_proof_len(&self, proof: &[Digest]) -> Result<(), EdgeError> {
        if proof.len() > self.config.max_inclusion_proof_len {
            return Err(InclusionProofError::ProofTooLong(proof.len()).into());
        }
        Ok(())
    }

    /// Bisect an edge and record its children.
    ///
    /// A child identical to an existing edge is not inserted again; the
    /// existing one becomes shared between both parents.
    pub fn bisect_edge(
        &mut self,
        id: &EdgeId,
        prefix_history_root: Digest,
        prefix_proof: &[u8],
    ) -> Result<(EdgeId, EdgeId), EdgeError> {
        let bisection = self
            .edge_or_err(id)?
            .bisect(prefix_history_root, prefix_proof, self.current_block)?;
        let (lower_id, upper_id) = (bisection.lower.id, bisection.upper.id);

        for child in [bisection.lower, bisection.upper] {
            let child_id = child.id;
            if !self.edges.contains_key(&child_id) {
                self.insert_edge(child)?;
            }
            self.parents.entry(child_id).or_default().push(*id);
        }
        self.edges.insert(*id, bisection.parent);
        info!(
            "bisected {:?} into lower {:?} and upper {:?}",
            id, lower_id, upper_id
        );
        Ok((lower_id, upper_id))
    }

    /// Blocks the edge spent without a rival.
    ///
    /// Counts up to the current block while unrivaled; once rivaled, only the
    /// first edge at the mutual id keeps the time until its first rival appeared.
    pub fn time_unrivaled(&self, id: &EdgeId) -> Result<u64, EdgeError> {
        let edge = self.edge_or_err(id)?;
        let rivals = self.rivals_of(&edge.mutual_id);
        match rivals {
            [first, second, ..] => {
                if first != id {
                    return Ok(0);
                }
                let rival = self.edge_or_err(second)?;
                Ok(rival.created_at_block.saturating_sub(edge.created_at_block))
            }
            _ => Ok(self.current_block.saturating_sub(edge.created_at_block)),
        }
    }

    /// Next edge up the path: a parent, or for subchallenge level-zero
    /// edges, the claimed edge one level up
    fn path_parent(&self, edge: &Edge) -> Option<EdgeId> {
        if let Some(parent) = self.parents.get(&edge.id).and_then(|p| p.first()) {
            return Some(*parent);
        }
        match (edge.level, edge.claim_id) {
            (ChallengeLevel::Block, _) | (_, None) => None,
            (_, Some(claim)) => Some(EdgeId(claim.0)),
        }
    }

    /// Ancestor chain from an edge up to its block-level root, child first
    pub fn compute_ancestors(&self, id: &EdgeId) -> Result<Vec<EdgeId>, EdgeError> {
        let mut ancestors = Vec::new();
        let mut current = self.edge_or_err(id)?;
        while let Some(next) = self.path_parent(current) {
            ancestors.push(next);
            current = self.edge_or_err(&next)?;
        }
        Ok(ancestors)
    }

    fn is_path_link(&self, child: &Edge, ancestor: &EdgeId) -> bool {
        let is_parent = self
            .parents
            .get(&child.id)
            .map_or(false, |parents| parents.contains(ancestor));
        let is_claim = child.level != ChallengeLevel::Block && child.claim_id == Some(ClaimId(ancestor.0));
        is_parent || is_claim
    }

    /// Saturating sum of unrivaled time along an edge and its ancestors.
    ///
    /// Every ancestor must be a parent or the claimed edge of the entry before it.
    pub fn path_timer(&self, id: &EdgeId, ancestors: &[EdgeId]) -> Result<u64, EdgeError> {
        let mut total = self.time_unrivaled(id)?;
        let mut child = self.edge_or_err(id)?;
        for ancestor in ancestors {
            if !self.is_path_link(child, ancestor) {
                return Err(EdgeError::InvalidAncestor {
                    child: child.id,
                    ancestor: *ancestor,
                });
            }
            total = total.saturating_add(self.time_unrivaled(ancestor)?);
            child = self.edge_or_err(ancestor)?;
        }
        Ok(total)
    }

    /// Fails unless the edge is pending and no rival is confirmed
    fn ensure_confirmable(&self, edge: &Edge) -> Result<(), EdgeError> {
        if edge.status != EdgeStatus::Pending {
            return Err(EdgeError::NotPending(edge.id));
        }
        let confirmed_rival = self
            .rivals_of(&edge.mutual_id)
            .iter()
            .filter(|rival| **rival != edge.id)
            .find(|rival| self.edges.get(*rival).map_or(false, Edge::is_confirmed));
        if let Some(rival) = confirmed_rival {
            return Err(EdgeError::RivalAlreadyConfirmed {
                edge: edge.id,
                rival: *rival,
            });
        }
        Ok(())
    }

    fn mark_confirmed(&mut self, id: &EdgeId, rule: ConfirmationRule) {
        if let Some(edge) = self.edges.get_mut(id) {
            edge.status = EdgeStatus::Confirmed;
            info!("edge {:?} confirmed by {:?}", id, rule);
        }
    }

    /// Confirm an edge whose path has stayed unrivaled for a challenge period
    pub fn confirm_edge_by_timer(&mut self, id: &EdgeId, ancestors: &[EdgeId]) -> Result<(), EdgeError> {
        self.ensure_confirmable(self.edge_or_err(id)?)?;
        let timer = self.path_timer(id, ancestors)?;
        let required = self.config.challenge_period_blocks;
        if timer < required {
            return Err(EdgeError::TimerNotExpired {
                edge: *id,
                timer,
                required,
            });
        }
        self.mark_confirmed(id, ConfirmationRule::Timer);
        Ok(())
    }

    /// Confirm an edge whose two children are confirmed
    pub fn confirm_edge_by_children(&mut self, id: &EdgeId) -> Result<(), EdgeError> {
        let edge = self.edge_or_err(id)?;
        self.ensure_confirmable(edge)?;
        let (lower, upper) = match (edge.lower_child_id, edge.upper_child_id) {
            (Some(lower), Some(upper)) => (lower, upper),
            _ => return Err(EdgeError::NoChildren(*id)),
        };
        if !self.edge_or_err(&lower)?.is_confirmed() || !self.edge_or_err(&upper)?.is_confirmed() {
            return Err(EdgeError::ChildrenNotConfirmed(*id));
        }
        self.mark_confirmed(id, ConfirmationRule::Children);
        Ok(())
    }

    /// Confirm a level-zero edge whose claimed assertion or edge is confirmed
    pub fn confirm_edge_by_claim(&mut self, id: &EdgeId, claim_id: &ClaimId) -> Result<(), EdgeError> {
        let edge = self.edge_or_err(id)?;
        self.ensure_confirmable(edge)?;
        match edge.claim_id {
            None => return Err(EdgeError::NotLevelZero(*id)),
            Some(claim) if claim != *claim_id => {
                return Err(EdgeError::ClaimMismatch {
                    edge: *id,
                    claim: *claim_id,
                })
            }
            Some(_) => {}
        }
        let claim_confirmed = if edge.level == ChallengeLevel::Block {
            let assertion_id = AssertionId(claim_id.0);
            self.assertions
                .get(&assertion_id)
                .ok_or(EdgeError::AssertionNotFound(assertion_id))?
                .status
                == AssertionStatus::Confirmed
        } else {
            self.edge_or_err(&EdgeId(claim_id.0))?.is_confirmed()
        };
        if !claim_confirmed {
            return Err(EdgeError::ClaimNotConfirmed(*claim_id));
        }
        self.mark_confirmed(id, ConfirmationRule::Claim);
        Ok(())
    }

    /// Confirm a one-step-fork edge whose claiming subchallenge edge is confirmed
    pub fn confirm_edge_by_claiming_edge(&mut self, id: &EdgeId, claiming_id: &EdgeId) -> Result<(), EdgeError> {
        let edge = self.edge_or_err(id)?;
        self.ensure_confirmable(edge)?;
        let claiming = self.edge_or_err(claiming_id)?;
        if claiming.claim_id != Some(ClaimId::from(*id)) || claiming.level.prev() != Some(edge.level) {
            return Err(EdgeError::ClaimMismatch {
                edge: *claiming_id,
                claim: ClaimId::from(*id),
            });
        }
        if !claiming.is_confirmed() {
            return Err(EdgeError::ClaimingEdgeNotConfirmed(*claiming_id));
        }
        self.mark_confirmed(id, ConfirmationRule::ClaimingEdge);
        Ok(())
    }

    /// Confirm a single small step by executing it
    pub fn confirm_edge_by_one_step_proof(&mut self, id: &EdgeId, data: &OneStepData) -> Result<(), EdgeError> {
        let edge = self.edge_or_err(id)?;
        self.ensure_confirmable(edge)?;
        if let Err(e) = verify_one_step(edge, data, self.prover.as_ref(), self.config.max_inclusion_proof_len) {
            warn!("rejected one-step proof for {:?}: {}", id, e);
            return Err(e);
        }
        self.mark_confirmed(id, ConfirmationRule::OneStepProof);
        Ok(())
    }

    /// Rivaled single-step edges that can open a subchallenge
    pub fn one_step_forks(&self) -> Vec<&Edge> {
        let mut forks: Vec<&Edge> = self
            .edges
            .values()
            .filter(|edge| edge.is_one_step_fork_source())
            .filter(|edge| self.rivals_of(&edge.mutual_id).len() > 1)
            .collect();
        forks.sort_by_key(|edge| (edge.level, edge.start.height, edge.id));
        forks
    }

    /// The rival at `mutual_id` the local participant agrees with.
    ///
    /// Only steers which edge this participant extends; confirmation never
    /// looks at it.
    pub fn presumptive_edge<F>(&self, mutual_id: &MutualId, agrees: F) -> Option<&Edge>
    where
        F: Fn(&Edge) -> bool,
    {
        self.rivals_of(mutual_id)
            .iter()
            .filter_map(|id| self.edges.get(id))
            .find(|edge| agrees(*edge))
    }

    /// JSON dump of every edge, ordered by level and height
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut edges: Vec<&Edge> = self.edges.values().collect();
        edges.sort_by_key(|edge| (edge.level, edge.start.height, edge.end.height, edge.id));
        serde_json::to_string_pretty(&edges)
    }
}

fn check_cancel(cancel: &Cancellation) -> Result<(), LedgerError> {
    if cancel.is_cancelled() {
        return Err(LedgerError::Cancelled);
    }
    Ok(())
}

impl ChallengeLedger for ChallengeGraph {
    fn get_edge(&self, id: &EdgeId) -> Result<Edge, LedgerError> {
        Ok(self.edge_or_err(id)?.clone())
    }

    fn get_assertion(&self, id: &AssertionId) -> Result<Assertion, LedgerError> {
        self.assertions
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("assertion {}", id)))
    }

    fn challenge_period_blocks(&self) -> u64 {
        self.config.challenge_period_blocks
    }

    fn time_unrivaled(&self, id: &EdgeId) -> Result<u64, LedgerError> {
        Ok(ChallengeGraph::time_unrivaled(self, id)?)
    }

    fn compute_ancestors(&self, id: &EdgeId) -> Result<Vec<EdgeId>, LedgerError> {
        Ok(ChallengeGraph::compute_ancestors(self, id)?)
    }

    fn add_level_zero_edge(
        &mut self,
        request: LevelZeroEdgeRequest,
        cancel: &Cancellation,
    ) -> Result<EdgeId, LedgerError> {
        check_cancel(cancel)?;
        Ok(ChallengeGraph::add_level_zero_edge(self, request)?)
    }

    fn bisect(
        &mut self,
        edge_id: &EdgeId,
        prefix_history_root: Digest,
        prefix_proof: &[u8],
        cancel: &Cancellation,
    ) -> Result<(EdgeId, EdgeId), LedgerError> {
        check_cancel(cancel)?;
        Ok(self.bisect_edge(edge_id, prefix_history_root, prefix_proof)?)
    }

    fn confirm_by_timer(
        &mut self,
        edge_id: &EdgeId,
        ancestors: &[EdgeId],
        cancel: &Cancellation,
    ) -> Result<(), LedgerError> {
        check_cancel(cancel)?;
        Ok(self.confirm_edge_by_timer(edge_id, ancestors)?)
    }

    fn confirm_by_children(&mut self, edge_id: &EdgeId, cancel: &Cancellation) -> Result<(), LedgerError> {
        check_cancel(cancel)?;
        Ok(self.confirm_edge_by_children(edge_id)?)
    }

    fn confirm_by_claim(
        &mut self,
        edge_id: &EdgeId,
        claim_id: &ClaimId,
        cancel: &Cancellation,
    ) -> Result<(), LedgerError> {
        check_cancel(cancel)?;
        Ok(self.confirm_edge_by_claim(edge_id, claim_id)?)
    }

    fn confirm_by_claiming_edge(
        &mut self,
        edge_id: &EdgeId,
        claiming_edge_id: &EdgeId,
        cancel: &Cancellation,
    ) -> Result<(), LedgerError> {
        check_cancel(cancel)?;
        Ok(self.confirm_edge_by_claiming_edge(edge_id, claiming_edge_id)?)
    }

    fn confirm_by_one_step_proof(
        &mut self,
        edge_id: &EdgeId,
        data: &OneStepData,
        cancel: &Cancellation,
    ) -> Result<(), LedgerError> {
        check_cancel(cancel)?;
        Ok(self.confirm_edge_by_one_step_proof(edge_id, data)?)
    }
}
