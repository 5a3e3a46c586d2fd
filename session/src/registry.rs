use std::sync::Arc;

use dashmap::{DashMap, Entry};
use nanoid::nanoid;
use tracing::{debug, info, instrument, warn};

use terramine_engine::GameParams;

use crate::session::GameSession;

/// Registry of independent, concurrently playable sessions.
pub type Sessions = Arc<DashMap<String, GameSession>>;

pub fn create_registry() -> Sessions {
    Arc::new(DashMap::new())
}

/// Creates a session under a fresh short id, retrying on collisions and
/// growing the id length when a whole batch of attempts collides.
#[instrument(level = "trace", skip(sessions))]
pub fn create_session(sessions: &Sessions, params: GameParams) -> String {
    let mut id_length = 5;
    let max_attempts_per_length = 10;

    loop {
        for _ in 0..max_attempts_per_length {
            let id = nanoid!(id_length);
            match sessions.entry(id.clone()) {
                Entry::Occupied(_) => {
                    debug!("Session ID collision, trying another: {}", id);
                    continue;
                }
                Entry::Vacant(entry) => {
                    entry.insert(GameSession::new(params));
                    info!("Created session with ID: {}", id);
                    return id;
                }
            }
        }

        warn!(
            "Exhausted ID attempts at length {}, increasing to {}",
            id_length,
            id_length + 1
        );
        id_length += 1;
    }
}

/// Returns a handle to the session, if it exists.
pub fn get_session(sessions: &Sessions, id: &str) -> Option<GameSession> {
    sessions.get(id).map(|entry| entry.value().clone())
}

pub fn remove_session(sessions: &Sessions, id: &str) -> bool {
    let removed = sessions.remove(id).is_some();
    if removed {
        info!("Removed session {}", id);
    } else {
        warn!("Attempted to remove non-existent session: {}", id);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_creates_and_removes_sessions() {
        let sessions = create_registry();

        let id = create_session(&sessions, GameParams::default());
        let session = get_session(&sessions, &id).expect("session should exist");
        assert_eq!(session.snapshot().await.board.width, 9);

        assert!(remove_session(&sessions, &id));
        assert!(get_session(&sessions, &id).is_none());
        assert!(!remove_session(&sessions, &id));
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let sessions = create_registry();
        let first = create_session(&sessions, GameParams::default());
        let second = create_session(
            &sessions,
            GameParams {
                width: 4,
                height: 4,
                mines: 2,
            },
        );
        assert_ne!(first, second);

        let second = get_session(&sessions, &second).unwrap();
        second.reveal(5).await;

        let first = get_session(&sessions, &first).unwrap();
        let snapshot = first.snapshot().await;
        assert!(snapshot.board.cells.iter().all(|cell| !cell.revealed));
    }
}
