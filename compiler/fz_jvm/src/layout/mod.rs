//! Physical encoding of choice types.
//!
//! Every choice clazz gets exactly one [`RepresentationKind`], decided by a
//! pure function of a [`ChoiceCensus`]: how many alternatives can hold a
//! value, how many of those are unit types, how many are references, and
//! whether two reference alternatives can hold the same instance.
//!
//! The decision order is fixed; the first matching rule wins:
//!
//! | census | kind |
//! |---|---|
//! | no non-void alternative | `Voidlike` |
//! | one alternative, a unit | `Unitlike` |
//! | two alternatives, both units (and `bool`) | `Boollike` |
//! | more than two, all units | `Intlike` |
//! | one unit and one ref | `Nullable` |
//! | only units and refs, refs disjoint | `RefsAndUnits` |
//! | anything else | `General` |

use std::cell::RefCell;
use std::fmt;

use rustc_hash::FxHashMap;
use tracing::debug;

use fz_ir::{ClazzId, ClazzPool, SpecialClazz};


/// How values of a choice type are represented.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepresentationKind {
    /// No values exist.
    Voidlike,
    /// Exactly one value: nothing is stored.
    Unitlike,
    /// Two unit alternatives: a JVM `boolean`.
    Boollike,
    /// Only unit alternatives: the tag as `int`.
    Intlike,
    /// One unit and one ref: the ref, with `null` for the unit.
    Nullable,
    /// Units and disjoint refs: refs as themselves, units as singletons,
    /// all sharing a marker interface that reports the tag.
    RefsAndUnits,
    /// A class holding the tag and the payload of any alternative.
    General,
}

impl RepresentationKind {
    /// Whether values of this kind are instances of a synthesized class.
    pub const fn needs_class_file(self) -> bool {
        matches!(self, RepresentationKind::RefsAndUnits | RepresentationKind::General)
    }

    /// Whether values of this kind have no JVM representation at all.
    pub const fn is_void(self) -> bool {
        matches!(self, RepresentationKind::Voidlike | RepresentationKind::Unitlike)
    }

    pub const fn name(self) -> &'static str {
        match self {
            RepresentationKind::Voidlike => "voidlike",
            RepresentationKind::Unitlike => "unitlike",
            RepresentationKind::Boollike => "boollike",
            RepresentationKind::Intlike => "intlike",
            RepresentationKind::Nullable => "nullable",
            RepresentationKind::RefsAndUnits => "refsAndUnits",
            RepresentationKind::General => "general",
        }
    }
}

impl fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counts over the alternatives of one choice.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChoiceCensus {
    pub non_void: usize,
    pub units: usize,
    pub refs: usize,
    pub overlapping_refs: bool,
}

impl ChoiceCensus {
    /// The representation for these counts.
    pub fn kind(self) -> RepresentationKind {
        let ChoiceCensus {
            non_void,
            units,
            refs,
            overlapping_refs,
        } = self;
        if non_void == 0 {
            RepresentationKind::Voidlike
        } else if non_void == 1 && units == 1 {
            RepresentationKind::Unitlike
        } else if non_void == 2 && units == 2 {
            RepresentationKind::Boollike
        } else if non_void == units {
            RepresentationKind::Intlike
        } else if non_void == 2 && units == 1 && refs == 1 {
            RepresentationKind::Nullable
        } else if non_void == units + refs && !overlapping_refs {
            RepresentationKind::RefsAndUnits
        } else {
            RepresentationKind::General
        }
    }
}

/// Memoizing classifier for choice clazzes.
///
/// Uses `RefCell` for the cache so queries take `&self`; classification
/// is a pure function of the pool, so a cached answer never goes stale
/// within one compilation.
pub struct LayoutClassifier<'pool> {
    pool: &'pool ClazzPool,
    cache: RefCell<FxHashMap<ClazzId, RepresentationKind>>,
}

impl<'pool> LayoutClassifier<'pool> {
    pub fn new(pool: &'pool ClazzPool) -> Self {
        Self {
            pool,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn pool(&self) -> &'pool ClazzPool {
        self.pool
    }

    /// Snapshot of all classifications computed so far.
    pub fn export_cache(&self) -> FxHashMap<ClazzId, RepresentationKind> {
        self.cache.borrow().clone()
    }

    /// Representation of the choice clazz `cl`.
    pub fn kind(&self, cl: ClazzId) -> RepresentationKind {
        debug_assert!(self.pool.is_choice(cl), "not a choice: {}", self.pool.name(cl));
        if let Some(&cached) = self.cache.borrow().get(&cl) {
            return cached;
        }
        let census = self.census(cl);
        let kind = census.kind();
        debug!(
            choice = self.pool.name(cl),
            non_void = census.non_void,
            units = census.units,
            refs = census.refs,
            overlapping = census.overlapping_refs,
            %kind,
            "classified choice",
        );
        self.cache.borrow_mut().insert(cl, kind);
        kind
    }

    /// Alternative counts of `cl`. `bool` always counts as two units.
    pub fn census(&self, cl: ClazzId) -> ChoiceCensus {
        let pool = self.pool;
        let mut census = ChoiceCensus::default();
        let choices = pool.choices(cl);
        for (i, &tc) in choices.iter().enumerate() {
            if pool.is_void_type(tc) {
                continue;
            }
            census.non_void += 1;
            if pool.is_unit_type(tc) {
                census.units += 1;
            } else if pool.is_ref(tc) {
                census.refs += 1;
                census.overlapping_refs |= choices[..i].iter().any(|&prev| self.overlap(tc, prev));
            }
        }
        if pool.is(cl, SpecialClazz::Bool) {
            census.non_void = 2;
            census.units = 2;
        }
        census
    }

    /// Whether ref alternatives `a` and `b` can hold the same instance.
    fn overlap(&self, a: ClazzId, b: ClazzId) -> bool {
        let pool = self.pool;
        if !pool.is_ref(a) || !pool.is_ref(b) {
            return false;
        }
        let heirs_b = pool.instantiated_heirs(b);
        pool.instantiated_heirs(a).iter().any(|h| heirs_b.contains(h))
    }

    /// Rank of alternative `tag` among the non-void alternatives of `cl`.
    ///
    /// Returns `None` if the alternative at `tag` is void.
    pub fn int_value_for_tag(&self, cl: ClazzId, tag: usize) -> Option<usize> {
        let pool = self.pool;
        let choices = pool.choices(cl);
        let alternative = *choices.get(tag)?;
        if pool.is_void_type(alternative) {
            return None;
        }
        Some(choices[..tag].iter().filter(|&&c| !pool.is_void_type(c)).count())
    }
}
