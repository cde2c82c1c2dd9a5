use uuid::Uuid;

use crate::db::error::{DbError, DbResult};

/// Parse a stored UUID column.
pub fn parse_uuid(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::Internal(format!("Invalid UUID in database: {}", e)))
}

/// Scopes are stored as one space-separated column.
pub fn encode_scopes(scopes: &[String]) -> String {
    scopes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn decode_scopes(stored: &str) -> Vec<String> {
    stored.split_whitespace().map(String::from).collect()
}
