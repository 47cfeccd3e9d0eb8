//! The clazz pool: storage, queries and builder API.
//!
//! The pool is the program-graph query API the backend consumes. It is
//! built once by the front end (or by tests through the builder methods)
//! and read-only afterwards.

use crate::{
    AccessSite, Clazz, ClazzId, ClazzKind, Expr, MatchId, MatchSite, SiteId, Span, SpecialClazz,
};


/// Storage for all clazzes and sites of one program.
#[derive(Clone, Debug)]
pub struct ClazzPool {
    clazzes: Vec<Clazz>,
    sites: Vec<AccessSite>,
    matches: Vec<MatchSite>,
}

impl Default for ClazzPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ClazzPool {
    /// Create a pool holding the pre-interned clazzes.
    pub fn new() -> Self {
        let mut pool = ClazzPool {
            clazzes: Vec::with_capacity(64),
            sites: Vec::new(),
            matches: Vec::new(),
        };

        let universe = pool.add(
            Clazz::new("universe", ClazzKind::Routine).with_special(SpecialClazz::Universe),
        );
        pool.add(
            Clazz::new("void", ClazzKind::Routine)
                .with_outer(universe)
                .with_special(SpecialClazz::Void),
        );
        pool.add(
            Clazz::new("unit", ClazzKind::Routine)
                .with_outer(universe)
                .with_special(SpecialClazz::Unit),
        );
        pool.add(
            Clazz::new("bool", ClazzKind::Choice)
                .with_outer(universe)
                .with_special(SpecialClazz::Bool)
                .with_choices([ClazzId::FALSE, ClazzId::TRUE]),
        );
        pool.add(Clazz::new("bool.FALSE", ClazzKind::Routine).with_outer(universe));
        pool.add(Clazz::new("bool.TRUE", ClazzKind::Routine).with_outer(universe));

        for special in [
            SpecialClazz::I8,
            SpecialClazz::I16,
            SpecialClazz::I32,
            SpecialClazz::I64,
            SpecialClazz::U8,
            SpecialClazz::U16,
            SpecialClazz::U32,
            SpecialClazz::U64,
            SpecialClazz::F32,
            SpecialClazz::F64,
        ] {
            pool.add(
                Clazz::new(special.name(), ClazzKind::Routine)
                    .with_outer(universe)
                    .with_special(special),
            );
        }
        pool.add(
            Clazz::new("Const_String", ClazzKind::Routine)
                .with_outer(universe)
                .with_ref(true)
                .with_special(SpecialClazz::ConstString),
        );

        debug_assert_eq!(pool.clazzes.len(), ClazzId::PREDEFINED_COUNT as usize);
        pool
    }

    // ── Storage ────────────────────────────────────────────────────

    /// Number of clazzes, pre-interned ones included.
    pub fn len(&self) -> usize {
        self.clazzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clazzes.is_empty()
    }

    /// All clazz ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ClazzId> + '_ {
        (0..self.clazzes.len()).filter_map(|i| u32::try_from(i).ok().map(ClazzId::from_raw))
    }

    /// The declaration of `cl`.
    ///
    /// # Panics
    /// Panics if `cl` does not belong to this pool.
    #[inline]
    pub fn clazz(&self, cl: ClazzId) -> &Clazz {
        &self.clazzes[cl.index()]
    }

    #[inline]
    fn clazz_mut(&mut self, cl: ClazzId) -> &mut Clazz {
        &mut self.clazzes[cl.index()]
    }

    /// The access site `site`.
    pub fn site(&self, site: SiteId) -> &AccessSite {
        &self.sites[site.index()]
    }

    /// The match site `site`.
    pub fn match_site(&self, site: MatchId) -> &MatchSite {
        &self.matches[site.index()]
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn name(&self, cl: ClazzId) -> &str {
        &self.clazz(cl).name
    }

    pub fn kind(&self, cl: ClazzId) -> ClazzKind {
        self.clazz(cl).kind
    }

    pub fn special(&self, cl: ClazzId) -> Option<SpecialClazz> {
        self.clazz(cl).special
    }

    /// Check whether `cl` is the given built-in clazz.
    pub fn is(&self, cl: ClazzId, special: SpecialClazz) -> bool {
        self.special(cl) == Some(special)
    }

    pub fn is_ref(&self, cl: ClazzId) -> bool {
        self.clazz(cl).is_ref
    }

    pub fn is_boxed(&self, cl: ClazzId) -> bool {
        self.clazz(cl).boxed_value.is_some()
    }

    /// The value clazz wrapped by a boxed clazz.
    pub fn boxed_value(&self, cl: ClazzId) -> Option<ClazzId> {
        self.clazz(cl).boxed_value
    }

    pub fn is_choice(&self, cl: ClazzId) -> bool {
        self.kind(cl) == ClazzKind::Choice
    }

    pub fn num_choices(&self, cl: ClazzId) -> usize {
        self.clazz(cl).choices.len()
    }

    /// The alternative at `tag`.
    pub fn choice(&self, cl: ClazzId, tag: usize) -> ClazzId {
        self.clazz(cl).choices[tag]
    }

    pub fn choices(&self, cl: ClazzId) -> &[ClazzId] {
        &self.clazz(cl).choices
    }

    /// All clazzes that are instantiated and conform to `cl`.
    pub fn instantiated_heirs(&self, cl: ClazzId) -> &[ClazzId] {
        &self.clazz(cl).heirs
    }

    /// `void`: no value of this type can exist.
    pub fn is_void_type(&self, cl: ClazzId) -> bool {
        self.is(cl, SpecialClazz::Void)
    }

    /// A value type without data: exactly one value exists.
    pub fn is_unit_type(&self, cl: ClazzId) -> bool {
        let clazz = self.clazz(cl);
        clazz.kind == ClazzKind::Routine
            && !clazz.is_ref
            && clazz.fields.is_empty()
            && match clazz.special {
                None | Some(SpecialClazz::Unit | SpecialClazz::Universe) => true,
                Some(_) => false,
            }
    }

    pub fn outer(&self, cl: ClazzId) -> Option<ClazzId> {
        self.clazz(cl).outer
    }

    /// Result clazz of a routine, or the type of a field.
    pub fn result(&self, cl: ClazzId) -> ClazzId {
        self.clazz(cl).result
    }

    pub fn result_field(&self, cl: ClazzId) -> Option<ClazzId> {
        self.clazz(cl).result_field
    }

    pub fn fields(&self, cl: ClazzId) -> &[ClazzId] {
        &self.clazz(cl).fields
    }

    pub fn args(&self, cl: ClazzId) -> &[ClazzId] {
        &self.clazz(cl).args
    }

    /// Type of the `i`-th argument.
    pub fn arg_clazz(&self, cl: ClazzId, i: usize) -> ClazzId {
        self.result(self.args(cl)[i])
    }

    pub fn outer_ref(&self, cl: ClazzId) -> Option<ClazzId> {
        self.clazz(cl).outer_ref
    }

    pub fn is_outer_ref(&self, field: ClazzId) -> bool {
        self.clazz(field).is_outer_ref
    }

    pub fn body(&self, cl: ClazzId) -> Option<&Expr> {
        self.clazz(cl).body.as_ref()
    }

    pub fn span(&self, cl: ClazzId) -> Span {
        self.clazz(cl).span
    }

    /// Check whether `cl` is a routine returning its own instance.
    pub fn is_constructor(&self, cl: ClazzId) -> bool {
        let clazz = self.clazz(cl);
        clazz.kind == ClazzKind::Routine && clazz.result == cl
    }

    // ── Builder ────────────────────────────────────────────────────

    /// Add a clazz. A clazz without declared heirs is its own only heir.
    pub fn add(&mut self, mut clazz: Clazz) -> ClazzId {
        let id = ClazzId::from_raw(
            u32::try_from(self.clazzes.len()).unwrap_or_else(|_| panic!("clazz pool overflow")),
        );
        if clazz.heirs.is_empty() {
            clazz.heirs.push(id);
        }
        self.clazzes.push(clazz);
        id
    }

    /// Add a value constructor: a routine returning its own instance.
    pub fn value_type(&mut self, name: &str, outer: ClazzId) -> ClazzId {
        let cl = self.add(Clazz::new(name, ClazzKind::Routine).with_outer(outer));
        self.clazz_mut(cl).result = cl;
        cl
    }

    /// Add a ref constructor.
    pub fn ref_type(&mut self, name: &str, outer: ClazzId) -> ClazzId {
        let cl = self.value_type(name, outer);
        self.clazz_mut(cl).is_ref = true;
        cl
    }

    /// Add a function returning `result` through a result field.
    pub fn function(&mut self, name: &str, outer: ClazzId, result: ClazzId) -> ClazzId {
        let cl = self.add(
            Clazz::new(name, ClazzKind::Routine)
                .with_outer(outer)
                .with_result(result),
        );
        if !self.is_unit_type(result) && !self.is_void_type(result) {
            let field = self.field(cl, "result", result);
            self.clazz_mut(cl).result_field = Some(field);
        }
        cl
    }

    /// Add a feature of the given kind that has no body.
    pub fn declare(
        &mut self,
        name: &str,
        kind: ClazzKind,
        outer: ClazzId,
        result: ClazzId,
    ) -> ClazzId {
        self.add(Clazz::new(name, kind).with_outer(outer).with_result(result))
    }

    /// Add a choice of `alternatives`.
    pub fn choice_type(&mut self, name: &str, alternatives: &[ClazzId]) -> ClazzId {
        self.add(
            Clazz::new(name, ClazzKind::Choice)
                .with_outer(ClazzId::UNIVERSE)
                .with_choices(alternatives.iter().copied()),
        )
    }

    /// Add the boxed (ref) view of `value`.
    pub fn boxed(&mut self, value: ClazzId) -> ClazzId {
        let name = format!("ref {}", self.name(value));
        let outer = self.outer(value).unwrap_or(ClazzId::UNIVERSE);
        let cl = self.add(
            Clazz::new(name, ClazzKind::Routine)
                .with_outer(outer)
                .with_ref(true),
        );
        let clazz = self.clazz_mut(cl);
        clazz.boxed_value = Some(value);
        clazz.result = cl;
        cl
    }

    /// Add a data field of type `ty` to `owner`.
    pub fn field(&mut self, owner: ClazzId, name: &str, ty: ClazzId) -> ClazzId {
        let qualified = format!("{}.{name}", self.name(owner));
        let field = self.add(
            Clazz::new(qualified, ClazzKind::Field)
                .with_outer(owner)
                .with_result(ty),
        );
        self.clazz_mut(owner).fields.push(field);
        field
    }

    /// Add an argument field of type `ty` to `owner`.
    pub fn arg(&mut self, owner: ClazzId, name: &str, ty: ClazzId) -> ClazzId {
        let field = self.field(owner, name, ty);
        self.clazz_mut(owner).args.push(field);
        field
    }

    /// Give `owner` a field referring to its outer instance.
    pub fn add_outer_ref(&mut self, owner: ClazzId) -> ClazzId {
        let outer = self.outer(owner).unwrap_or(ClazzId::UNIVERSE);
        let field = self.field(owner, "outer", outer);
        self.clazz_mut(field).is_outer_ref = true;
        self.clazz_mut(owner).outer_ref = Some(field);
        field
    }

    /// Replace the instantiated heirs of `cl`.
    pub fn set_heirs(&mut self, cl: ClazzId, heirs: &[ClazzId]) {
        self.clazz_mut(cl).heirs = heirs.to_vec();
    }

    pub fn set_body(&mut self, cl: ClazzId, body: Expr) {
        self.clazz_mut(cl).body = Some(body);
    }

    pub fn set_span(&mut self, cl: ClazzId, span: Span) {
        self.clazz_mut(cl).span = span;
    }

    pub fn add_site(&mut self, site: AccessSite) -> SiteId {
        let id = SiteId::from_raw(
            u32::try_from(self.sites.len()).unwrap_or_else(|_| panic!("site pool overflow")),
        );
        self.sites.push(site);
        id
    }

    pub fn add_match(&mut self, site: MatchSite) -> MatchId {
        let id = MatchId::from_raw(
            u32::try_from(self.matches.len()).unwrap_or_else(|_| panic!("match pool overflow")),
        );
        self.matches.push(site);
        id
    }
}
