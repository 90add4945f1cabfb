//! 接続レジストリ: プロセス全体のルーム表
//!
//! ## 責務
//!
//! - ミーティング ID ごとのルームと、そのメンバー（ライブ接続）の管理
//! - 最初の入室でルームを作成し、最後の退出でルームを削除する
//!
//! ## 設計ノート
//!
//! ロックは 2 段階です。外側のマップ（`MeetingId` → ルーム）はルームの作成・削除の
//! ときだけ書き込みロックを取り、メンバーの増減は各ルームのロックで行います。
//! どちらのロックも保持したまま I/O は行わず、ブロードキャストはメンバーの
//! スナップショットに対して行います。
//!
//! ルームを空にした退出がそのルームを retired にしてから外側のマップから外します。
//! retired なルームを掴んだ `register` はやり直して新しいルームを作るため、
//! 1 ミーティングにつきライブなルームは高々 1 つで、空のルームは残りません。

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use tokio::sync::RwLock;

use crate::domain::{ConnectionId, MeetingId, ParticipantIdentity};

use super::connection::{Connection, ConnectionHandle};

#[derive(Default)]
struct Room {
    members: HashMap<ConnectionId, Arc<Connection>>,
    retired: bool,
}

/// Result of [`ConnectionRegistry::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub handle: ConnectionHandle,
    /// This registration created the room
    pub room_created: bool,
}

/// Result of [`ConnectionRegistry::unregister`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removal {
    /// The connection was a member
    pub removed: bool,
    /// The removal emptied the room and the room was deleted
    pub room_deleted: bool,
}

/// Live room as seen by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRoom {
    pub meeting_id: MeetingId,
    pub participants: Vec<ParticipantIdentity>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    rooms: RwLock<HashMap<MeetingId, Arc<RwLock<Room>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to its room, creating the room on demand
    pub async fn register(&self, connection: Arc<Connection>) -> Registration {
        let meeting_id = connection.meeting_id().clone();

        loop {
            let (room, room_created) = self.room_or_create(&meeting_id).await;
            let mut guard = room.write().await;
            if guard.retired {
                drop(guard);
                tokio::task::yield_now().await;
                continue;
            }

            guard.members.insert(connection.id(), connection.clone());
            tracing::debug!(
                "Registered '{}' in room '{}' ({} member(s))",
                connection.identity().username,
                meeting_id,
                guard.members.len()
            );
            return Registration {
                handle: connection.handle(),
                room_created,
            };
        }
    }

    async fn room_or_create(&self, meeting_id: &MeetingId) -> (Arc<RwLock<Room>>, bool) {
        let existing = self.rooms.read().await.get(meeting_id).cloned();
        if let Some(room) = existing {
            return (room, false);
        }

        let mut rooms = self.rooms.write().await;
        match rooms.entry(meeting_id.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                tracing::info!("Room '{}' created", meeting_id);
                (entry.insert(Arc::default()).clone(), true)
            }
        }
    }

    /// Remove a connection. Idempotent: unknown handles are a no-op.
    pub async fn unregister(&self, handle: &ConnectionHandle) -> Removal {
        let Some(room) = self.rooms.read().await.get(&handle.meeting_id).cloned() else {
            return Removal::default();
        };

        let (removed, emptied) = {
            let mut guard = room.write().await;
            let removed = guard.members.remove(&handle.connection_id).is_some();
            let emptied = removed && guard.members.is_empty() && !guard.retired;
            if emptied {
                guard.retired = true;
            }
            (removed, emptied)
        };

        if emptied {
            let mut rooms = self.rooms.write().await;
            if rooms
                .get(&handle.meeting_id)
                .is_some_and(|current| Arc::ptr_eq(current, &room))
            {
                rooms.remove(&handle.meeting_id);
                tracing::info!("Room '{}' is empty and was deleted", handle.meeting_id);
            }
        }

        Removal {
            removed,
            room_deleted: emptied,
        }
    }

    /// Stable snapshot of a room's members
    async fn members(&self, meeting_id: &MeetingId) -> Vec<Arc<Connection>> {
        let Some(room) = self.rooms.read().await.get(meeting_id).cloned() else {
            return Vec::new();
        };
        let guard = room.read().await;
        guard.members.values().cloned().collect()
    }

    /// Apply `f` to a snapshot of a room's members.
    ///
    /// The room lock is released before `f` runs, so `f` may block or call
    /// back into the registry.
    pub async fn for_each<F>(&self, meeting_id: &MeetingId, mut f: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        for connection in self.members(meeting_id).await {
            f(&connection);
        }
    }

    pub async fn member_count(&self, meeting_id: &MeetingId) -> usize {
        let Some(room) = self.rooms.read().await.get(meeting_id).cloned() else {
            return 0;
        };
        room.read().await.members.len()
    }

    pub async fn contains_room(&self, meeting_id: &MeetingId) -> bool {
        self.rooms.read().await.contains_key(meeting_id)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// All live rooms and their members, sorted by meeting id then username
    pub async fn snapshot(&self) -> Vec<LiveRoom> {
        let rooms: Vec<(MeetingId, Arc<RwLock<Room>>)> = self
            .rooms
            .read()
            .await
            .iter()
            .map(|(id, room)| (id.clone(), room.clone()))
            .collect();

        let mut live = Vec::with_capacity(rooms.len());
        for (meeting_id, room) in rooms {
            let guard = room.read().await;
            if guard.retired {
                continue;
            }
            let mut participants: Vec<ParticipantIdentity> = guard
                .members
                .values()
                .map(|c| c.identity().clone())
                .collect();
            participants.sort_by(|a, b| a.username.cmp(&b.username));
            live.push(LiveRoom {
                meeting_id,
                participants,
            });
        }
        live.sort_by(|a, b| a.meeting_id.cmp(&b.meeting_id));
        live
    }
}
