//! Relationship directives and cascade policy.
//!
//! A relationship field is either the *owning* side (it carries a join column
//! and stores the referenced identity) or the *inverse* side (it names the
//! owning field through `mapped_by` and carries the cascade set).

/// The declared cardinality of a relationship.
///
/// Only `OneToOne` (and `ManyToOne` on the owning side) is traversed by the
/// engine; the other kinds are accepted into the vocabulary and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationshipKind {
    /// One-to-one: `User` has one `Profile`.
    #[default]
    OneToOne,
    /// Many-to-one: many `Order`s belong to one `Customer`.
    ManyToOne,
    /// One-to-many: one `Customer` has many `Order`s.
    OneToMany,
    /// Many-to-many through a link table.
    ManyToMany,
}

impl RelationshipKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::OneToOne => "one_to_one",
            RelationshipKind::ManyToOne => "many_to_one",
            RelationshipKind::OneToMany => "one_to_many",
            RelationshipKind::ManyToMany => "many_to_many",
        }
    }
}

/// A lifecycle operation that may propagate across an inverse association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeType {
    /// Every operation.
    All,
    /// Propagate on create.
    Add,
    /// Propagate on read (join the association).
    Get,
    /// Propagate on delete.
    Remove,
}

impl CascadeType {
    const fn bit(self) -> u8 {
        match self {
            CascadeType::All => 0b0001,
            CascadeType::Add => 0b0010,
            CascadeType::Get => 0b0100,
            CascadeType::Remove => 0b1000,
        }
    }
}

/// A set of [`CascadeType`]s.
///
/// `ALL` implies every other member, so `CascadeSet::ALL.propagates(Get)` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeSet(u8);

impl CascadeSet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(CascadeType::All.bit());

    /// Add `cascade` to the set.
    pub const fn with(self, cascade: CascadeType) -> Self {
        Self(self.0 | cascade.bit())
    }

    /// Whether `cascade` was listed explicitly.
    pub const fn contains(self, cascade: CascadeType) -> bool {
        self.0 & cascade.bit() != 0
    }

    /// Whether the operation `cascade` propagates (listed, or implied by `ALL`).
    pub const fn propagates(self, cascade: CascadeType) -> bool {
        self.contains(CascadeType::All) || self.contains(cascade)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Relationship directive attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationDirective {
    pub kind: RelationshipKind,
    /// Name of the owning field on the other type (inverse side only).
    pub mapped_by: Option<&'static str>,
    pub cascade: CascadeSet,
}

impl RelationDirective {
    pub const fn new(kind: RelationshipKind) -> Self {
        Self {
            kind,
            mapped_by: None,
            cascade: CascadeSet::EMPTY,
        }
    }

    /// One-to-one directive, the common case.
    pub const fn one_to_one() -> Self {
        Self::new(RelationshipKind::OneToOne)
    }

    pub const fn mapped_by(mut self, field: &'static str) -> Self {
        self.mapped_by = Some(field);
        self
    }

    pub const fn cascade(mut self, cascade: CascadeType) -> Self {
        self.cascade = self.cascade.with(cascade);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_implies_every_operation() {
        let set = CascadeSet::ALL;
        assert!(set.propagates(CascadeType::Add));
        assert!(set.propagates(CascadeType::Get));
        assert!(set.propagates(CascadeType::Remove));
        assert!(!set.contains(CascadeType::Get));
    }

    #[test]
    fn test_explicit_members_only() {
        let set = CascadeSet::EMPTY.with(CascadeType::Get);
        assert!(set.propagates(CascadeType::Get));
        assert!(!set.propagates(CascadeType::Add));
        assert!(!set.propagates(CascadeType::Remove));
        assert!(CascadeSet::EMPTY.is_empty());
    }

    #[test]
    fn test_directive_builder() {
        let d = RelationDirective::one_to_one()
            .mapped_by("user")
            .cascade(CascadeType::All);
        assert_eq!(d.kind, RelationshipKind::OneToOne);
        assert_eq!(d.mapped_by, Some("user"));
        assert!(d.cascade.propagates(CascadeType::Remove));
    }
}
