//! Room registry: owns every live room and its lookup indexes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use easel_protocol::{ident, Difficulty, RoomId, RoomKind, RoomSnapshot, UserId};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::{GameError, RemovalOutcome, Room, RoomSettings, SharedPlayer};

/// A room shared between the registry, the session coordinator, and its
/// round timer task.
///
/// Lock ordering everywhere in the system: registry → room → player.
/// Room locks are never held across I/O toward clients.
pub type SharedRoom = Arc<RwLock<Room>>;

struct Indexes {
    by_id: HashMap<RoomId, SharedRoom>,
    by_code: HashMap<String, RoomId>,
}

/// Creates, looks up, and evicts rooms.
pub struct RoomRegistry {
    rooms: RwLock<Indexes>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(Indexes {
                by_id: HashMap::new(),
                by_code: HashMap::new(),
            }),
        }
    }

    /// Creates a room and registers it under a fresh unique code.
    pub async fn create(
        &self,
        host_id: UserId,
        kind: RoomKind,
        name: String,
        settings: RoomSettings,
    ) -> SharedRoom {
        let mut indexes = self.rooms.write().await;

        // Codes are random over a 33^6 space; collisions against live
        // rooms are possible, so regenerate until free.
        let code = loop {
            let candidate = ident::generate_room_code();
            if !indexes.by_code.contains_key(&candidate) {
                break candidate;
            }
        };

        let id = ident::generate_room_id();
        let room = Room::new(id.clone(), code.clone(), host_id, kind, name, settings);
        let shared = Arc::new(RwLock::new(room));

        indexes.by_id.insert(id.clone(), Arc::clone(&shared));
        indexes.by_code.insert(code.clone(), id.clone());

        tracing::info!(room_id = %id, %code, "room created");
        shared
    }

    pub async fn get(&self, room_id: &RoomId) -> Option<SharedRoom> {
        self.rooms.read().await.by_id.get(room_id).cloned()
    }

    /// Looks up a room by its (already normalized) short code.
    pub async fn get_by_code(&self, code: &str) -> Option<SharedRoom> {
        let indexes = self.rooms.read().await;
        let id = indexes.by_code.get(code)?;
        indexes.by_id.get(id).cloned()
    }

    /// Removes a player from a room, dropping the room from both indexes
    /// when it empties.
    pub async fn leave(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<RemovalOutcome, GameError> {
        let mut indexes = self.rooms.write().await;
        let room = indexes
            .by_id
            .get(room_id)
            .cloned()
            .ok_or_else(|| GameError::RoomNotFound(room_id.clone()))?;

        let outcome = {
            let mut room = room.write().await;
            room.remove_player(user_id)?
        };

        if outcome.now_empty {
            let code = room.read().await.code.clone();
            indexes.by_id.remove(room_id);
            indexes.by_code.remove(&code);
            tracing::info!(room_id = %room_id, %code, "empty room removed");
        }

        Ok(outcome)
    }

    /// Public rooms that have seen activity within `active_within`.
    pub async fn list_public(&self, active_within: Duration) -> Vec<RoomSnapshot> {
        let rooms: Vec<SharedRoom> =
            self.rooms.read().await.by_id.values().cloned().collect();

        let mut snapshots = Vec::new();
        for room in rooms {
            let room = room.read().await;
            if room.kind == RoomKind::Public && room.is_active(active_within) {
                snapshots.push(room.snapshot().await);
            }
        }
        snapshots
    }

    /// Finds the best public lobby to drop a player into.
    ///
    /// Candidates are public, in the lobby, not full, recently active,
    /// sized at or under `max_players`, and matching `difficulty` when
    /// one is requested. Tie-break: higher current population first
    /// (nearly-full rooms fill fastest), then most recent activity.
    pub async fn find_best_public(
        &self,
        max_players: usize,
        difficulty: Option<Difficulty>,
        active_within: Duration,
    ) -> Option<SharedRoom> {
        let rooms: Vec<SharedRoom> =
            self.rooms.read().await.by_id.values().cloned().collect();

        let mut candidates: Vec<(usize, DateTime<Utc>, SharedRoom)> = Vec::new();
        for shared in rooms {
            let room = shared.read().await;
            let difficulty_ok =
                difficulty.map_or(true, |d| room.settings.difficulty == d);
            if room.kind == RoomKind::Public
                && room.can_join()
                && room.is_active(active_within)
                && room.settings.max_players <= max_players
                && difficulty_ok
            {
                candidates.push((room.player_count(), room.last_activity, Arc::clone(&shared)));
            }
        }

        candidates.sort_by(|(count_a, seen_a, _), (count_b, seen_b, _)| {
            count_b.cmp(count_a).then(seen_b.cmp(seen_a))
        });
        candidates.into_iter().next().map(|(_, _, room)| room)
    }

    /// Drops a player into the best public lobby, creating a default one
    /// when nothing suitable exists.
    pub async fn auto_join_public(
        &self,
        player: SharedPlayer,
        defaults: RoomSettings,
        active_within: Duration,
    ) -> Result<SharedRoom, GameError> {
        if let Some(room) = self
            .find_best_public(defaults.max_players, None, active_within)
            .await
        {
            // The candidate may have filled between the scan and the
            // join; fall through to room creation if it did.
            let joined = room.write().await.add_player(Arc::clone(&player)).await;
            if joined.is_ok() {
                return Ok(room);
            }
        }

        let host_id = player.read().await.id.clone();
        let room = self
            .create(host_id, RoomKind::Public, "Open Room".to_owned(), defaults)
            .await;
        room.write().await.add_player(player).await?;
        Ok(room)
    }

    /// Deletes rooms idle for longer than `idle_timeout`. Returns how
    /// many were removed.
    pub async fn sweep_inactive(&self, idle_timeout: Duration) -> usize {
        let mut indexes = self.rooms.write().await;

        let mut stale: Vec<(RoomId, String)> = Vec::new();
        for (id, room) in &indexes.by_id {
            let room = room.read().await;
            if !room.is_active(idle_timeout) {
                stale.push((id.clone(), room.code.clone()));
            }
        }

        for (id, code) in &stale {
            indexes.by_id.remove(id);
            indexes.by_code.remove(code);
            tracing::info!(room_id = %id, %code, "inactive room removed");
        }
        stale.len()
    }

    /// Spawns the periodic cleanup task.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        idle_timeout: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = registry.sweep_inactive(idle_timeout).await;
                if removed > 0 {
                    tracing::debug!(removed, "room cleanup pass");
                }
            }
        })
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.by_id.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
