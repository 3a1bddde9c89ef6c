//! Diagnostic model + DiagnosticGrouper
//!
//! Diagnostics come from the external engine. Those that land on the exact
//! same range are merged so the splicer wraps that range once and lists every
//! kind observed there.
//!
//! Partially intersecting ranges are NOT merged. Each one stays its own group
//! and the splicer decides what to do with it (see `splice.rs`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::rules::RuleCode;

// =============================================================================
// Types
// =============================================================================

/// Half-open `[start, end)` offset pair, counted in `char`s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

/// Why a range cannot be applied to a given text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RangeFault {
    /// `start >= end`
    Inverted,
    /// `end` past the end of the text
    OutOfBounds { len: usize },
    /// Starts inside a range that was already spliced
    Overlap { previous_end: usize },
}

impl fmt::Display for RangeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeFault::Inverted => write!(f, "inverted or empty range"),
            RangeFault::OutOfBounds { len } => write!(f, "range exceeds text length {}", len),
            RangeFault::Overlap { previous_end } => {
                write!(f, "range overlaps a previous range ending at {}", previous_end)
            }
        }
    }
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check this range against a text of `len` chars
    pub fn check(&self, len: usize) -> Result<(), RangeFault> {
        if self.is_empty() {
            return Err(RangeFault::Inverted);
        }
        if self.end > len {
            return Err(RangeFault::OutOfBounds { len });
        }
        Ok(())
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One flagged issue: rule code, char range, suggested replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: RuleCode,
    pub range: Range,
    #[serde(default)]
    pub fix: String,
}

impl Diagnostic {
    pub fn new(kind: RuleCode, start: usize, end: usize, fix: impl Into<String>) -> Self {
        Self {
            kind,
            range: Range::new(start, end),
            fix: fix.into(),
        }
    }
}

// =============================================================================
// DiagnosticGroups
// =============================================================================

/// Exact-range groups, iterated by ascending `start` then ascending `end`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticGroups {
    groups: BTreeMap<Range, Vec<RuleCode>>,
}

impl DiagnosticGroups {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Kinds recorded at exactly `range`
    pub fn kinds_at(&self, range: &Range) -> Option<&[RuleCode]> {
        self.groups.get(range).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Range, &[RuleCode])> {
        self.groups.iter().map(|(range, kinds)| (range, kinds.as_slice()))
    }

    fn push(&mut self, range: Range, kind: RuleCode) {
        let kinds = self.groups.entry(range).or_default();
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
}

/// Merge diagnostics that share an identical range
pub fn group_diagnostics(diagnostics: &[Diagnostic]) -> DiagnosticGroups {
    let mut grouped = DiagnosticGroups::default();
    for diagnostic in diagnostics {
        grouped.push(diagnostic.range, diagnostic.kind);
    }
    grouped
}

/// Comma-joined kind list used as the marker title
pub fn join_kinds(kinds: &[RuleCode]) -> String {
    kinds
        .iter()
        .map(RuleCode::code)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Tests
// =============================================================================
