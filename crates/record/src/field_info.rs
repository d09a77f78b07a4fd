//! A single field's static description within a record layout.

use types::{Direction, FieldType};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub ty: FieldType,
    pub nullable: bool,
    /// The coding direction: ascending unless the field belongs to a
    /// descending index key.
    pub direction: Direction,
}

impl FieldInfo {
    pub fn new(ty: FieldType, nullable: bool) -> Self {
        Self {
            ty,
            nullable,
            direction: Direction::Ascending,
        }
    }

    pub fn with_direction(ty: FieldType, nullable: bool, direction: Direction) -> Self {
        Self {
            ty,
            nullable,
            direction,
        }
    }
}
