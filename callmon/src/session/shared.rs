use super::CallSession;
use std::sync::{Arc, Mutex};

/// A [`CallSession`] that can be driven from several threads, e.g. the
/// telephony callbacks and a UI that reads the live timeline.
///
/// A poisoned lock is recovered.
#[derive(Debug)]
pub struct SharedSession {
    session: Arc<Mutex<CallSession>>,
}

impl SharedSession {
    pub fn new(session: CallSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    pub fn with<F, K>(&self, f: F) -> K
    where
        F: FnOnce(&mut CallSession) -> K,
    {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut session)
    }

    /// Takes the session back once every other handle is gone.
    pub fn try_into_inner(self) -> Result<CallSession, Self> {
        Arc::try_unwrap(self.session)
            .map(|m| m.into_inner().unwrap_or_else(|e| e.into_inner()))
            .map_err(|session| Self { session })
    }
}

impl Clone for SharedSession {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}
