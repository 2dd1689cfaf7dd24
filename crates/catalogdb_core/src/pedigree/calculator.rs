//! Breadth-first relatives search.

use std::collections::{HashSet, VecDeque};

use super::relation::{Hop, Relation};
use crate::error::CatalogResult;
use crate::model::{Individual, Sex};
use crate::types::Uid;

/// The pedigree-relevant part of an individual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PedigreeMember {
    /// Individual uid.
    pub uid: Uid,
    /// Individual id.
    pub id: String,
    /// Recorded sex.
    pub sex: Sex,
    /// Father uid.
    pub father: Option<Uid>,
    /// Mother uid.
    pub mother: Option<Uid>,
}

impl From<&Individual> for PedigreeMember {
    fn from(individual: &Individual) -> Self {
        Self {
            uid: individual.uid,
            id: individual.id.clone(),
            sex: individual.sex,
            father: individual.father.as_ref().map(|r| r.uid),
            mother: individual.mother.as_ref().map(|r| r.uid),
        }
    }
}

/// Where the calculator looks up parents and children.
pub trait PedigreeSource {
    /// The individual with `uid`, if visible.
    ///
    /// # Errors
    ///
    /// Store errors.
    fn member(&self, uid: Uid) -> CatalogResult<Option<PedigreeMember>>;

    /// Individuals whose father or mother is `uid`.
    ///
    /// # Errors
    ///
    /// Store errors.
    fn children(&self, uid: Uid) -> CatalogResult<Vec<PedigreeMember>>;
}

/// A fixed set of individuals, e.g. the members of one family.
#[derive(Debug, Clone, Default)]
pub struct MemberSet {
    members: Vec<PedigreeMember>,
}

impl MemberSet {
    /// Wraps the given members.
    #[must_use]
    pub fn new(members: Vec<PedigreeMember>) -> Self {
        Self { members }
    }

    /// The members.
    #[must_use]
    pub fn members(&self) -> &[PedigreeMember] {
        &self.members
    }
}

impl PedigreeSource for MemberSet {
    fn member(&self, uid: Uid) -> CatalogResult<Option<PedigreeMember>> {
        Ok(self.members.iter().find(|m| m.uid == uid).cloned())
    }

    fn children(&self, uid: Uid) -> CatalogResult<Vec<PedigreeMember>> {
        Ok(self
            .members
            .iter()
            .filter(|m| m.father == Some(uid) || m.mother == Some(uid))
            .cloned()
            .collect())
    }
}

/// A relative found by the calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relative {
    /// The relative.
    pub member: PedigreeMember,
    /// Relation to the proband.
    pub relation: Relation,
}

/// Finds the relatives of a proband up to a genetic degree.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativesCalculator;

impl RelativesCalculator {
    /// Relatives of `proband` within `max_degree`, nearest first.
    ///
    /// Each hop composes the relation of the node it leaves with the hop
    /// taken; the proband and every classified relative are visited once.
    ///
    /// # Errors
    ///
    /// Whatever the source returns.
    pub fn relatives(
        source: &dyn PedigreeSource,
        proband: &PedigreeMember,
        max_degree: u32,
    ) -> CatalogResult<Vec<Relative>> {
        let mut visited = HashSet::from([proband.uid]);
        let mut queue: VecDeque<(PedigreeMember, Option<Relation>)> = VecDeque::new();
        let mut found = Vec::new();
        queue.push_back((proband.clone(), None));

        while let Some((current, relation)) = queue.pop_front() {
            let mut next = Vec::new();
            for (hop, parent) in [(Hop::Father, current.father), (Hop::Mother, current.mother)] {
                if let Some(member) = parent.map(|uid| source.member(uid)).transpose()?.flatten() {
                    next.push((hop, member));
                }
            }
            for child in source.children(current.uid)? {
                next.push((Hop::Child(child.sex), child));
            }

            for (hop, member) in next {
                if visited.contains(&member.uid) {
                    continue;
                }
                let Some(mut composed) = relation.map_or(Some(Relation::first(hop)), |r| r.compose(hop))
                else {
                    continue;
                };
                if composed.is_sibling() && !shares_both_parents(proband, &member) {
                    composed = composed.as_half_sibling();
                }
                if composed.degree() > max_degree {
                    continue;
                }
                visited.insert(member.uid);
                found.push(Relative {
                    member: member.clone(),
                    relation: composed,
                });
                queue.push_back((member, Some(composed)));
            }
        }
        Ok(found)
    }
}

/// Siblings sharing only the parents we know of count as full siblings.
fn shares_both_parents(proband: &PedigreeMember, other: &PedigreeMember) -> bool {
    let same = |a: Option<Uid>, b: Option<Uid>| a.is_none() || b.is_none() || a == b;
    same(proband.father, other.father) && same(proband.mother, other.mother)
}
