use serde::{Deserialize, Serialize};

/// Root of the dimension hierarchy. Country names are globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: i32,
    pub name: String,
}

/// Second level. Uniqueness is scoped to (name, country_id); the same
/// province name may legitimately recur under different countries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    pub id: i32,
    pub name: String,
    pub country_id: i32,
}

/// Leaf entity: a named place with an MGRS grid reference, unique per
/// (name, province_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i32,
    pub name: String,
    pub mgrs: String,
    pub province_id: i32,
}
