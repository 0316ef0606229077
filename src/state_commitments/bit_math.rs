// src/state_commitments/bit_math.rs
//! Bisection arithmetic for history commitments
//!
//! Pure integer helpers deciding where an edge is split and which complete
//! subtree may be appended next while growing a Merkle expansion. The
//! on-chain challenge manager performs the same computations, so every
//! decision here has to agree with it bit for bit.

use super::prefix_proof::PrefixProofError;

/// Index of the lowest set bit of `x`.
pub fn least_significant_bit(x: u64) -> Result<u64, PrefixProofError> {
    if x == 0 {
        return Err(PrefixProofError::CannotBeZero);
    }
    Ok(u64::from(x.trailing_zeros()))
}

/// Index of the highest set bit of `x`.
pub fn most_significant_bit(x: u64) -> Result<u64, PrefixProofError> {
    if x == 0 {
        return Err(PrefixProofError::CannotBeZero);
    }
    Ok(u64::from(63 - x.leading_zeros()))
}

/// Split point of the range `pre..post`.
///
/// Picks the highest power-of-two aligned point strictly inside the range
/// rather than the arithmetic midpoint, so that the two halves stay aligned
/// with complete subtrees and later bisections need the fewest moves.
pub fn bisect(pre: u64, post: u64) -> Result<u64, PrefixProofError> {
    if post < pre.saturating_add(2) || pre > post {
        return Err(PrefixProofError::UnableToBisect { pre, post });
    }
    if post == pre + 2 {
        return Ok(pre + 1);
    }
    let leading = u64::from(((post - 1) ^ pre).leading_zeros());
    let mask = u64::MAX << (63 - leading);
    Ok((post - 1) & mask)
}

/// Highest level of a complete subtree that can be appended to a tree of
/// `start` leaves without the result growing past `end` leaves.
pub fn maximum_append_between(start: u64, end: u64) -> Result<u64, PrefixProofError> {
    // start looks like xxxxxxyyyy
    // end looks like   xxxxxxzzzz
    if start >= end {
        return Err(PrefixProofError::StartNotLessThanEnd { start, end });
    }
    let msb = most_significant_bit(start ^ end)?;
    let mask = if msb >= 63 {
        u64::MAX
    } else {
        (1u64 << (msb + 1)) - 1
    };
    let y = start & mask;
    let z = end & mask;

    // appending happens at `start`, so its lowest complete subtree bounds the level
    if y != 0 {
        return least_significant_bit(y);
    }
    if z != 0 {
        return most_significant_bit(z);
    }
    Err(PrefixProofError::CannotBeZero)
}
