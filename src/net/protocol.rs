//! Replicated entity record
//!
//! One JSON document per player under the `players` keyspace:
//! `{ "assetId": .., "name": .., "position": {"x": .., "y": ..}, "heading": .. }`

use serde::{Deserialize, Serialize};

use crate::game::entity::Entity;
use crate::game::world::RemoteState;
use crate::util::vec2::Vec2;

/// Wire form of one player's public state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub asset_id: String,
    pub name: String,
    pub position: Vec2,
    pub heading: f32,
}

impl EntityRecord {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            asset_id: entity.asset_id().to_string(),
            name: entity.name().to_string(),
            position: entity.position(),
            heading: entity.heading(),
        }
    }

    /// Rejects records that would poison the simulation
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.asset_id.trim().is_empty() {
            return Err(RecordError::MissingAsset);
        }
        if !self.position.is_finite() {
            return Err(RecordError::NonFinite("position"));
        }
        if !self.heading.is_finite() {
            return Err(RecordError::NonFinite("heading"));
        }
        Ok(())
    }

    pub fn into_remote_state(self) -> RemoteState {
        RemoteState {
            name: self.name,
            asset_id: self.asset_id,
            position: self.position,
            heading: self.heading,
        }
    }
}

/// Serialize a record for publishing
pub fn encode_record(record: &EntityRecord) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(record).map_err(|e| EncodeError(e.to_string()))
}

/// Parse and validate an inbound record
pub fn decode_record(data: &[u8]) -> Result<EntityRecord, RecordError> {
    let record: EntityRecord =
        serde_json::from_slice(data).map_err(|e| RecordError::Malformed(e.to_string()))?;
    record.validate()?;
    Ok(record)
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

/// Reasons an inbound record is dropped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("Malformed record: {0}")]
    Malformed(String),
    #[error("Record has no asset id")]
    MissingAsset,
    #[error("Record has a non-finite {0}")]
    NonFinite(&'static str),
    #[error("Record key is empty")]
    EmptyKey,
}
