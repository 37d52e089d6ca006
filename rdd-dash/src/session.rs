//! Session state
//!
//! Each browser tab owns a [`UiSession`]: who is signed in, whether a
//! submission is in flight, the message on screen and the last history
//! that loaded. Sessions are looked up by an opaque token through the
//! [`SessionRegistry`] held in the application state.

use rdd_common::{Identity, PredictionRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Anonymous / Authenticated state machine
#[derive(Debug, Default)]
pub struct SessionController {
    identity: RwLock<Option<Identity>>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of the signed-in user, if any
    pub fn current(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Transition to Authenticated, replacing any previous identity
    pub fn sign_in(&self, identity: Identity) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    /// Transition to Anonymous, returning the identity that was cleared
    pub fn sign_out(&self) -> Option<Identity> {
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Busy flag and displayed message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub busy: bool,
    pub message: String,
}

/// One browser tab's state
#[derive(Debug, Default)]
pub struct UiSession {
    pub session: SessionController,
    view: Mutex<ViewState>,
    history: Mutex<Vec<PredictionRecord>>,
}

impl UiSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ViewState {
        lock(&self.view).clone()
    }

    pub fn set_message(&self, message: impl Into<String>) {
        lock(&self.view).message = message.into();
    }

    /// Clear the message panel
    pub fn dismiss_message(&self) {
        lock(&self.view).message.clear();
    }

    /// Mark a submission as in flight and clear the previous message
    ///
    /// Returns `None` when a submission is already running. The busy flag
    /// is cleared when the returned guard drops.
    pub fn begin_submission(&self) -> Option<BusyGuard<'_>> {
        let mut view = lock(&self.view);
        if view.busy {
            return None;
        }
        view.busy = true;
        view.message.clear();
        Some(BusyGuard { view: &self.view })
    }

    /// Last successfully loaded history
    pub fn history(&self) -> Vec<PredictionRecord> {
        lock(&self.history).clone()
    }

    pub fn replace_history(&self, records: Vec<PredictionRecord>) {
        *lock(&self.history) = records;
    }

    /// Sign out and drop everything shown for the previous user
    pub fn sign_out(&self) -> Option<Identity> {
        let cleared = self.session.sign_out();
        lock(&self.history).clear();
        lock(&self.view).message.clear();
        cleared
    }
}

/// Holds the busy flag for one submission
#[derive(Debug)]
pub struct BusyGuard<'a> {
    view: &'a Mutex<ViewState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(self.view).busy = false;
    }
}

/// Session token to tab state
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<UiSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new anonymous session
    pub fn create(&self) -> (Uuid, Arc<UiSession>) {
        let token = Uuid::new_v4();
        let session = Arc::new(UiSession::new());
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token, Arc::clone(&session));
        (token, session)
    }

    pub fn get(&self, token: &Uuid) -> Option<Arc<UiSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    /// Drop a session, returning it if the token was known
    pub fn remove(&self, token: &Uuid) -> Option<Arc<UiSession>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
