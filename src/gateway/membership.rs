use std::collections::HashSet;

use dashmap::{DashMap, DashSet};
use futures_util::future::BoxFuture;

use super::events::{Identity, RoomId};
use crate::error::AppError;

/// `Ok(false)`, an error and a timeout all refuse the join.
pub trait MembershipAuthority: Send + Sync {
    fn is_authorized<'a>(
        &'a self,
        identity: &'a Identity,
        room: &'a RoomId,
    ) -> BoxFuture<'a, Result<bool, AppError>>;
}

/// In-memory authority: open rooms admit everyone, other rooms admit only
/// granted identities.
#[derive(Debug, Default)]
pub struct AllowList {
    open_rooms: DashSet<RoomId>,
    grants: DashMap<RoomId, HashSet<Identity>>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_room(&self, room: impl Into<RoomId>) -> &Self {
        self.open_rooms.insert(room.into());
        self
    }

    pub fn grant(&self, room: impl Into<RoomId>, identity: impl Into<Identity>) -> &Self {
        self.grants
            .entry(room.into())
            .or_default()
            .insert(identity.into());
        self
    }

    pub fn revoke(&self, room: &RoomId, identity: &Identity) {
        if let Some(mut granted) = self.grants.get_mut(room) {
            granted.remove(identity);
        }
    }

    fn allows(&self, identity: &Identity, room: &RoomId) -> bool {
        self.open_rooms.contains(room)
            || self
                .grants
                .get(room)
                .is_some_and(|granted| granted.contains(identity))
    }
}

impl MembershipAuthority for AllowList {
    fn is_authorized<'a>(
        &'a self,
        identity: &'a Identity,
        room: &'a RoomId,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        let allowed = self.allows(identity, room);
        Box::pin(async move { Ok(allowed) })
    }
}
