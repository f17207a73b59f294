use std::sync::{
	Arc,
	atomic::{AtomicU32, Ordering},
};

use dashmap::DashMap;

use crate::{FailureToken, Key, Player, Session};

/// All live sessions, by the key they were registered under.
pub(crate) struct Registry<P: Player> {
	sessions: DashMap<Key, Arc<Session<P>>>,
	sequence: AtomicU32,
}

impl<P: Player> Default for Registry<P> {
	fn default() -> Self {
		Self {
			sessions: DashMap::new(),
			sequence: AtomicU32::new(1),
		}
	}
}

impl<P: Player> Registry<P> {
	/// Reserve the failure token for a new session.
	pub fn next_token(&self) -> FailureToken {
		// Zero would encode as a surface id.
		let sequence = self.sequence.fetch_add(1, Ordering::Relaxed).max(1);
		FailureToken::new(sequence)
	}

	/// Register a session, closing whatever was registered under the same key.
	pub fn insert(&self, key: Key, session: Arc<Session<P>>) {
		session.set_key(key);

		if let Some(old) = self.sessions.insert(key, session) {
			tracing::warn!(%key, "replacing registered session");
			old.close();
		}
	}

	/// Clone the session out so no shard lock is held while it's used.
	pub fn get(&self, key: Key) -> Option<Arc<Session<P>>> {
		self.sessions.get(&key).map(|entry| entry.value().clone())
	}

	pub fn remove(&self, key: Key) -> Option<Arc<Session<P>>> {
		self.sessions.remove(&key).map(|(_, session)| session)
	}

	pub fn keys(&self) -> Vec<Key> {
		self.sessions.iter().map(|entry| *entry.key()).collect()
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}
}
