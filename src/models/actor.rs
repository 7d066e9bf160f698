use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActorRole {
    Client,
    Courier,
    Admin,
}

/// Whoever is asking for a lifecycle change. Identity is established by the
/// calling layer; the engine only checks it against the delivery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn client(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Client,
        }
    }

    pub fn courier(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Courier,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Admin,
        }
    }
}
