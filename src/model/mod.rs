pub mod element;
pub mod geometry;
pub mod rejection;
pub mod unit;

pub use element::{ElementType, MemberType, Node, OsmElement, Relation, RelationMember, Tags, Way};
pub use geometry::{PlantGeometry, Shape};
pub use rejection::{RejectedElement, RejectionReason};
pub use unit::{Unit, Units};
