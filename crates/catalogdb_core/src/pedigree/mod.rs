//! Family relationships computed from father/mother links.

mod calculator;
mod relation;

pub use calculator::{MemberSet, PedigreeMember, PedigreeSource, Relative, RelativesCalculator};
pub use relation::{Hop, Relation};
