//! The logged in user, kept under a single key of a text key-value store.

use crate::model::SessionUser;
use actix_identity::Identity;
use log::debug;

pub const CURRENT_USER_KEY: &str = "currentUser";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// The identity cookie holds exactly one entry, the current user.
impl KeyValueStore for Identity {
    fn get(&self, key: &str) -> Option<String> {
        if key == CURRENT_USER_KEY {
            self.identity()
        } else {
            None
        }
    }

    fn set(&self, key: &str, value: String) {
        if key == CURRENT_USER_KEY {
            self.remember(value);
        }
    }

    fn remove(&self, key: &str) {
        if key == CURRENT_USER_KEY {
            self.forget();
        }
    }
}

/// Per-request session context, handed to every controller that needs it.
pub struct Session<S> {
    store: S,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(store: S) -> Self {
        Session { store }
    }

    pub fn login(&self, user: &SessionUser) {
        match serde_json::to_string(user) {
            Ok(value) => self.store.set(CURRENT_USER_KEY, value),
            Err(err) => debug!("Could not serialize session user: {:?}", err),
        }
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        let value = self.store.get(CURRENT_USER_KEY)?;
        match serde_json::from_str(&value) {
            Ok(user) => Some(user),
            Err(err) => {
                debug!("Ignoring unreadable session: {:?}", err);
                None
            }
        }
    }

    pub fn logout(&self) {
        self.store.remove(CURRENT_USER_KEY);
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.current_user()
            .map(|user| user.is_admin())
            .unwrap_or(false)
    }
}
