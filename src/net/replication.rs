//! Replication bridge between the world and the shared channel
//!
//! Outbound: the local player's record is published every tick, no dirty
//! check. Inbound: channel events queue up on a crossbeam receiver and are
//! applied by the tick thread between ticks, which keeps the world single-writer.

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::game::entity::{Entity, EntityId};
use crate::game::world::{RemoveOutcome, UpsertOutcome, World};
use crate::net::channel::{ChannelError, ChannelEvent, ReplicationChannel};
use crate::net::protocol::{decode_record, encode_record, EntityRecord, RecordError};

/// Tally of one `apply_pending` drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundStats {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    /// Events about the local player's own record
    pub echoes: u32,
    /// Malformed records and ids clashing with local roamers
    pub dropped: u32,
}

impl InboundStats {
    pub fn applied(&self) -> u32 {
        self.created + self.updated + self.deleted
    }
}

pub struct ReplicationBridge {
    channel: Box<dyn ReplicationChannel>,
    local_id: EntityId,
    inbound: Receiver<ChannelEvent>,
}

impl ReplicationBridge {
    /// Registers the last-will delete for the local record, then subscribes.
    /// The subscription's snapshot burst is applied on the first drain.
    pub fn connect(
        channel: Box<dyn ReplicationChannel>,
        local_id: EntityId,
    ) -> Result<Self, ChannelError> {
        channel.remove_on_disconnect(local_id.as_str())?;
        let inbound = channel.subscribe()?;
        info!("Replication bridge connected as {}", local_id);
        Ok(Self {
            channel,
            local_id,
            inbound,
        })
    }

    pub fn local_id(&self) -> &EntityId {
        &self.local_id
    }

    /// Fire-and-forget: failures are returned for counting, never retried.
    /// The next tick republishes full state anyway.
    pub fn publish(&self, local: &Entity) -> Result<(), ChannelError> {
        let record = EntityRecord::from_entity(local);
        let bytes = encode_record(&record).map_err(|e| ChannelError::Rejected(e.to_string()))?;
        self.channel.publish(self.local_id.as_str(), bytes).map_err(|e| {
            debug!("Publish failed: {}", e);
            e
        })
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Applies every event delivered since the last call
    pub fn apply_pending(&self, world: &mut World) -> InboundStats {
        let mut stats = InboundStats::default();
        for event in self.inbound.try_iter() {
            self.apply_event(event, world, &mut stats);
        }
        stats
    }

    fn apply_event(&self, event: ChannelEvent, world: &mut World, stats: &mut InboundStats) {
        let key = event.key();
        if key.is_empty() {
            warn!("Dropping replication event: {}", RecordError::EmptyKey);
            stats.dropped += 1;
            return;
        }
        if key == self.local_id.as_str() {
            stats.echoes += 1;
            return;
        }
        let id = EntityId::from(key);

        match event {
            ChannelEvent::Created { value, .. } | ChannelEvent::Updated { value, .. } => {
                let record = match decode_record(&value) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Dropping record for {}: {}", id, e);
                        stats.dropped += 1;
                        return;
                    }
                };
                match world.upsert_remote(&id, record.into_remote_state()) {
                    UpsertOutcome::Created => stats.created += 1,
                    UpsertOutcome::Updated | UpsertOutcome::UpdatedAssetChanged => {
                        stats.updated += 1
                    }
                    UpsertOutcome::IgnoredSelf => stats.echoes += 1,
                    UpsertOutcome::IgnoredConflict => stats.dropped += 1,
                }
            }
            ChannelEvent::Deleted { .. } => match world.remove_remote(&id) {
                RemoveOutcome::Removed => stats.deleted += 1,
                RemoveOutcome::NotFound => {}
                RemoveOutcome::IgnoredSelf => stats.echoes += 1,
            },
        }
    }

    /// Explicit goodbye, then disconnect. The last-will covers the case
    /// where this never runs.
    pub fn shutdown(&self) {
        if let Err(e) = self.channel.remove(self.local_id.as_str()) {
            debug!("Goodbye delete failed: {}", e);
        }
        self.channel.disconnect();
        info!("Replication bridge for {} shut down", self.local_id);
    }
}
