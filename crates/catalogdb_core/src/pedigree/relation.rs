//! Relation labels and the table composing them hop by hop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Sex;

/// One step through the pedigree graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    /// To the father.
    Father,
    /// To the mother.
    Mother,
    /// To a child of the given sex.
    Child(Sex),
}

/// Relation of a relative to the proband.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum Relation {
    Father,
    Mother,
    Son,
    Daughter,
    Child,
    Brother,
    Sister,
    Sibling,
    HalfBrother,
    HalfSister,
    HalfSibling,
    PaternalGrandfather,
    PaternalGrandmother,
    MaternalGrandfather,
    MaternalGrandmother,
    Grandson,
    Granddaughter,
    Grandchild,
    PaternalUncle,
    PaternalAunt,
    PaternalUncleOrAunt,
    MaternalUncle,
    MaternalAunt,
    MaternalUncleOrAunt,
    Nephew,
    Niece,
    NieceOrNephew,
    PaternalGreatGrandfather,
    PaternalGreatGrandmother,
    MaternalGreatGrandfather,
    MaternalGreatGrandmother,
    GreatGrandchild,
    Cousin,
}

fn by_sex(sex: Sex, male: Relation, female: Relation, neutral: Relation) -> Relation {
    match sex {
        Sex::Male => male,
        Sex::Female => female,
        Sex::Unknown => neutral,
    }
}

impl Relation {
    /// Genetic degree of the relation.
    #[must_use]
    pub const fn degree(self) -> u32 {
        use Relation::*;
        match self {
            Father | Mother | Son | Daughter | Child | Brother | Sister | Sibling => 1,
            HalfBrother | HalfSister | HalfSibling | PaternalGrandfather
            | PaternalGrandmother | MaternalGrandfather | MaternalGrandmother | Grandson
            | Granddaughter | Grandchild | PaternalUncle | PaternalAunt
            | PaternalUncleOrAunt | MaternalUncle | MaternalAunt | MaternalUncleOrAunt
            | Nephew | Niece | NieceOrNephew => 2,
            PaternalGreatGrandfather | PaternalGreatGrandmother | MaternalGreatGrandfather
            | MaternalGreatGrandmother | GreatGrandchild | Cousin => 3,
        }
    }

    /// The relation reached by a first hop away from the proband.
    #[must_use]
    pub fn first(hop: Hop) -> Self {
        match hop {
            Hop::Father => Self::Father,
            Hop::Mother => Self::Mother,
            Hop::Child(sex) => by_sex(sex, Self::Son, Self::Daughter, Self::Child),
        }
    }

    /// The relation reached by taking `hop` from a relative with this
    /// relation, or `None` when the result is not a blood relative or falls
    /// outside the table.
    ///
    /// Children of parents are full siblings here; callers holding both
    /// parents of the proband downgrade to half siblings with
    /// [`Relation::as_half_sibling`].
    #[must_use]
    pub fn compose(self, hop: Hop) -> Option<Self> {
        use Relation::*;
        let relation = match (self, hop) {
            (Father, Hop::Father) => PaternalGrandfather,
            (Father, Hop::Mother) => PaternalGrandmother,
            (Mother, Hop::Father) => MaternalGrandfather,
            (Mother, Hop::Mother) => MaternalGrandmother,
            (Father | Mother, Hop::Child(sex)) => by_sex(sex, Brother, Sister, Sibling),

            (Son | Daughter | Child, Hop::Child(sex)) => {
                by_sex(sex, Grandson, Granddaughter, Grandchild)
            }
            (Grandson | Granddaughter | Grandchild, Hop::Child(_)) => GreatGrandchild,

            (Brother | Sister | Sibling, Hop::Child(sex)) => {
                by_sex(sex, Nephew, Niece, NieceOrNephew)
            }

            (PaternalGrandfather, Hop::Father) | (PaternalGrandmother, Hop::Father) => {
                PaternalGreatGrandfather
            }
            (PaternalGrandfather, Hop::Mother) | (PaternalGrandmother, Hop::Mother) => {
                PaternalGreatGrandmother
            }
            (MaternalGrandfather, Hop::Father) | (MaternalGrandmother, Hop::Father) => {
                MaternalGreatGrandfather
            }
            (MaternalGrandfather, Hop::Mother) | (MaternalGrandmother, Hop::Mother) => {
                MaternalGreatGrandmother
            }
            (PaternalGrandfather | PaternalGrandmother, Hop::Child(sex)) => {
                by_sex(sex, PaternalUncle, PaternalAunt, PaternalUncleOrAunt)
            }
            (MaternalGrandfather | MaternalGrandmother, Hop::Child(sex)) => {
                by_sex(sex, MaternalUncle, MaternalAunt, MaternalUncleOrAunt)
            }

            (
                PaternalUncle | PaternalAunt | PaternalUncleOrAunt | MaternalUncle
                | MaternalAunt | MaternalUncleOrAunt,
                Hop::Child(_),
            ) => Cousin,

            _ => return None,
        };
        Some(relation)
    }

    /// Half-sibling counterpart of a sibling relation; other relations are
    /// returned unchanged.
    #[must_use]
    pub const fn as_half_sibling(self) -> Self {
        match self {
            Self::Brother => Self::HalfBrother,
            Self::Sister => Self::HalfSister,
            Self::Sibling => Self::HalfSibling,
            other => other,
        }
    }

    /// Whether this is a full sibling relation.
    #[must_use]
    pub const fn is_sibling(self) -> bool {
        matches!(self, Self::Brother | Self::Sister | Self::Sibling)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grandparents_follow_the_parent_side() {
        assert_eq!(
            Relation::Mother.compose(Hop::Mother),
            Some(Relation::MaternalGrandmother)
        );
        assert_eq!(
            Relation::Father.compose(Hop::Mother),
            Some(Relation::PaternalGrandmother)
        );
    }

    #[test]
    fn unknown_sex_gives_neutral_labels() {
        assert_eq!(Relation::first(Hop::Child(Sex::Unknown)), Relation::Child);
        assert_eq!(
            Relation::Sister.compose(Hop::Child(Sex::Unknown)),
            Some(Relation::NieceOrNephew)
        );
    }

    #[test]
    fn partners_are_not_relatives() {
        assert_eq!(Relation::Son.compose(Hop::Mother), None);
        assert_eq!(Relation::Cousin.compose(Hop::Child(Sex::Male)), None);
    }

    #[test]
    fn degrees() {
        assert_eq!(Relation::Mother.degree(), 1);
        assert_eq!(Relation::HalfSister.degree(), 2);
        assert_eq!(Relation::Cousin.degree(), 3);
        assert_eq!(Relation::Brother.as_half_sibling(), Relation::HalfBrother);
    }
}
