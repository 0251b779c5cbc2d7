use serde::{Deserialize, Serialize};

use crate::reorder::{Identified, PositionUpdate};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: i64,
    pub board_id: i64,
    pub title: String,
    pub description: String,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Identified for Card {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

/// Authoritative ordering of a board, returned by the persistence endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionsResponse {
    pub positions: Vec<PositionUpdate<i64>>,
}

/// Failure payload of every API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
}
