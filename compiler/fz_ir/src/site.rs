//! Call sites and match sites.
//!
//! Sites carry the results of the front end's reachability analysis: for an
//! access, the list of (target type, feature) pairs that can be reached at
//! run time; for a match, the tags handled by each case.

use smallvec::SmallVec;

use crate::{ClazzId, Span};

/// Index of an [`AccessSite`] in its pool.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteId(u32);

impl SiteId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a [`MatchSite`] in its pool.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchId(u32);

impl MatchId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A call of a feature or an assignment to a field.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccessSite {
    /// Routine containing the access.
    pub caller: ClazzId,
    /// Statically accessed feature.
    pub accessed: ClazzId,
    /// Static type of the target value.
    pub target_clazz: ClazzId,
    /// Reachable (target type, feature) pairs.
    pub targets: SmallVec<[(ClazzId, ClazzId); 2]>,
    /// `false` for field assignments.
    pub is_call: bool,
    pub span: Span,
}

impl AccessSite {
    /// A call with exactly one reachable target.
    pub fn call(caller: ClazzId, target_clazz: ClazzId, accessed: ClazzId) -> Self {
        let mut targets = SmallVec::new();
        targets.push((target_clazz, accessed));
        AccessSite {
            caller,
            accessed,
            target_clazz,
            targets,
            is_call: true,
            span: Span::DUMMY,
        }
    }

    /// An assignment to `field` of an instance of `target_clazz`.
    pub fn assign(caller: ClazzId, target_clazz: ClazzId, field: ClazzId) -> Self {
        AccessSite {
            is_call: false,
            ..AccessSite::call(caller, target_clazz, field)
        }
    }

    /// Replace the reachable targets.
    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = (ClazzId, ClazzId)>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// One case of a match.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchCase {
    /// Alternative indices handled by this case.
    pub tags: SmallVec<[usize; 2]>,
    /// Field of the current instance the payload is bound to.
    pub field: Option<ClazzId>,
}

impl MatchCase {
    pub fn new(tags: impl IntoIterator<Item = usize>) -> Self {
        MatchCase {
            tags: tags.into_iter().collect(),
            field: None,
        }
    }

    /// Bind the payload to `field`.
    #[must_use]
    pub fn binding(mut self, field: ClazzId) -> Self {
        self.field = Some(field);
        self
    }
}

/// A match on a choice value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchSite {
    pub caller: ClazzId,
    /// The choice clazz being matched.
    pub subject: ClazzId,
    pub cases: Vec<MatchCase>,
    pub span: Span,
}

impl MatchSite {
    pub fn new(caller: ClazzId, subject: ClazzId, cases: Vec<MatchCase>) -> Self {
        MatchSite {
            caller,
            subject,
            cases,
            span: Span::DUMMY,
        }
    }
}
