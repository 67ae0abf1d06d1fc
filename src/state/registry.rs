//! Live rooms keyed by their short identifier.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use rand::{Rng, seq::IndexedRandom};
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{
        actor::{RoomContext, RoomHandle, RoomTask},
        room::{Player, Room, RoomId},
    },
};

/// Characters used in room identifiers: uppercase letters and digits without
/// the ambiguous `0`, `1`, `I` and `O`.
pub const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_ID_LEN: usize = 6;
const MAX_ID_ATTEMPTS: usize = 64;

/// Generate a random room identifier.
pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R) -> RoomId {
    (0..ROOM_ID_LEN)
        .filter_map(|_| ROOM_ID_ALPHABET.choose(rng).map(|&b| char::from(b)))
        .collect()
}

/// Registry of live rooms. Rooms remove themselves when their task ends.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    /// Like [`RoomRegistry::get`] but reports unknown rooms as an error.
    pub fn find(&self, room_id: &str) -> Result<RoomHandle, ServiceError> {
        self.get(room_id)
            .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Open a room owned by `owner` under a fresh identifier and spawn its task.
    pub fn create(
        &self,
        owner: Player,
        requested_rounds: usize,
        ctx: RoomContext,
    ) -> Result<RoomHandle, ServiceError> {
        let capacity = ctx.config.rooms.command_capacity.max(1);

        for _ in 0..MAX_ID_ATTEMPTS {
            let room_id = generate_room_id(&mut rand::rng());
            let Entry::Vacant(slot) = self.rooms.entry(room_id.clone()) else {
                debug!(room_id = %room_id, "room id collision, retrying");
                continue;
            };

            let (sender, receiver) = mpsc::channel(capacity);
            let instance = Uuid::new_v4();
            let handle = RoomHandle::new(room_id.clone(), instance, sender.clone());
            let room = Room::new(room_id.clone(), owner, requested_rounds);
            let task = RoomTask::new(room, instance, ctx, receiver, sender.downgrade());
            slot.insert(handle.clone());

            let rooms = self.rooms.clone();
            tokio::spawn(async move {
                task.run().await;
                rooms.remove_if(&room_id, |_, live| live.instance() == instance);
            });

            return Ok(handle);
        }

        error!("could not allocate a free room id");
        Err(ServiceError::Unavailable("no free room id".into()))
    }
}
