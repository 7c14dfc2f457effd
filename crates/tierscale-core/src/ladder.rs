//! Size ladder: the ordered sequence of capacity tiers.
//!
//! Scaling always moves exactly one rung. Optional floor/ceiling bounds
//! keep automatic scaling inside an operator-approved band without
//! changing which sizes are recognized.

use std::collections::HashSet;

use thiserror::Error;

use crate::types::Size;

/// Default tier sequence for managed database clusters.
pub const DEFAULT_TIERS: [&str; 19] = [
    "M0", "M2", "M5", "M10", "M20", "M30", "M40", "M50", "M60", "M80", "M100", "M140", "M200",
    "M300", "M400", "M500", "M600", "M700", "M800",
];

/// Which way to walk the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Errors from building or querying a size ladder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LadderError {
    #[error("size ladder has no tiers")]
    Empty,

    #[error("size ladder lists {0} more than once")]
    DuplicateTier(Size),

    /// The size is not a rung on this ladder. Distinct from being at a
    /// boundary: callers must not treat it as "cannot grow further".
    #[error("unknown size {0}: not on the size ladder")]
    UnknownSize(Size),

    #[error("ladder bounds inverted: min {min} is above max {max}")]
    InvertedBounds { min: Size, max: Size },
}

/// An ordered, duplicate-free list of tiers, smallest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeLadder {
    tiers: Vec<Size>,
    /// Lowest index automatic scale-down may reach.
    floor: usize,
    /// Highest index automatic scale-up may reach.
    ceiling: usize,
}

impl SizeLadder {
    /// Build a ladder from tiers listed smallest to largest.
    pub fn new(tiers: Vec<Size>) -> Result<Self, LadderError> {
        if tiers.is_empty() {
            return Err(LadderError::Empty);
        }

        let mut seen = HashSet::with_capacity(tiers.len());
        for tier in &tiers {
            if !seen.insert(tier) {
                return Err(LadderError::DuplicateTier(tier.clone()));
            }
        }

        let ceiling = tiers.len() - 1;
        Ok(Self {
            tiers,
            floor: 0,
            ceiling,
        })
    }

    /// Restrict how far `next` may walk. Both bounds must be on the ladder.
    pub fn with_bounds(mut self, min: Option<&Size>, max: Option<&Size>) -> Result<Self, LadderError> {
        let floor = match min {
            Some(size) => self.index_of(size)?,
            None => 0,
        };
        let ceiling = match max {
            Some(size) => self.index_of(size)?,
            None => self.tiers.len() - 1,
        };

        if floor > ceiling {
            return Err(LadderError::InvertedBounds {
                min: self.tiers[floor].clone(),
                max: self.tiers[ceiling].clone(),
            });
        }

        self.floor = floor;
        self.ceiling = ceiling;
        Ok(self)
    }

    /// Position of `size` on the ladder.
    pub fn index_of(&self, size: &Size) -> Result<usize, LadderError> {
        self.tiers
            .iter()
            .position(|t| t == size)
            .ok_or_else(|| LadderError::UnknownSize(size.clone()))
    }

    pub fn contains(&self, size: &Size) -> bool {
        self.tiers.contains(size)
    }

    /// The neighbouring tier in `direction`, or `None` at a boundary.
    pub fn next(&self, current: &Size, direction: Direction) -> Result<Option<Size>, LadderError> {
        let idx = self.index_of(current)?;
        let next = match direction {
            Direction::Up if idx < self.ceiling => Some(idx + 1),
            Direction::Down if idx > self.floor => Some(idx - 1),
            _ => None,
        };
        Ok(next.map(|i| self.tiers[i].clone()))
    }

    pub fn tiers(&self) -> &[Size] {
        &self.tiers
    }

    /// Smallest tier automatic scaling may reach.
    pub fn floor(&self) -> &Size {
        &self.tiers[self.floor]
    }

    /// Largest tier automatic scaling may reach.
    pub fn ceiling(&self) -> &Size {
        &self.tiers[self.ceiling]
    }
}

impl Default for SizeLadder {
    fn default() -> Self {
        let tiers = DEFAULT_TIERS.iter().map(|t| Size::from(*t)).collect::<Vec<_>>();
        let ceiling = tiers.len() - 1;
        Self {
            tiers,
            floor: 0,
            ceiling,
        }
    }
}
