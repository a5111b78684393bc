// ============================================================================
// CONTEXT - Application-wide auth state with an explicit lifecycle
// ============================================================================
//
// Only a guest user survives a restart. Named sessions are re-established
// through the auth client on every start.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::session::{AuthClient, AuthError, LocalAuthClient, Session, User};

/// The persisted subset of [`AppContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAuthState {
    #[serde(default)]
    pub guest_user: Option<User>,
}

pub struct AppContext {
    state_path: PathBuf,
    auth: LocalAuthClient,
    user: Option<User>,
    initialized: bool,
}

impl AppContext {
    pub fn new(state_path: impl Into<PathBuf>, session_lifetime_minutes: u32) -> Self {
        Self {
            state_path: state_path.into(),
            auth: LocalAuthClient::new(session_lifetime_minutes),
            user: None,
            initialized: false,
        }
    }

    /// Read the persisted state. A missing or unreadable file yields the default.
    pub fn restore(&self) -> PersistedAuthState {
        match read_state(&self.state_path) {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring persisted auth state: {:#}", e);
                PersistedAuthState::default()
            }
        }
    }

    /// Restore and resume a guest session if one was persisted.
    pub fn init(&mut self) -> Option<&User> {
        if self.initialized {
            return self.user.as_ref();
        }
        let state = self.restore();
        if let Some(guest) = state.guest_user {
            info!("Restored guest session {}", guest.id);
            let session = self.auth.resume(guest);
            self.user = Some(session.user);
        }
        self.initialized = true;
        self.user.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.auth.session()
    }

    pub fn auth_client(&mut self) -> &mut dyn AuthClient {
        &mut self.auth
    }

    /// Persists the guest first, so a failed write leaves the context signed out.
    pub fn sign_in_guest(&mut self) -> Result<User> {
        let user = User::guest();
        write_state(
            &self.state_path,
            &PersistedAuthState {
                guest_user: Some(user.clone()),
            },
        )?;
        let session = self.auth.resume(user);
        self.user = Some(session.user.clone());
        Ok(session.user)
    }

    pub fn sign_in(&mut self, display_name: &str) -> std::result::Result<User, AuthError> {
        let session = self.auth.sign_in(display_name)?;
        self.user = Some(session.user.clone());
        if let Err(e) = self.persist() {
            warn!("Could not persist auth state: {:#}", e);
        }
        Ok(session.user)
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.auth.sign_out();
        self.user = None;
        self.persist()
    }

    /// Write the allow-listed state and drop the in-memory session.
    pub fn teardown(&mut self) -> Result<()> {
        self.persist()?;
        self.auth.sign_out();
        self.user = None;
        self.initialized = false;
        debug!("Application context torn down");
        Ok(())
    }

    pub fn persisted_state(&self) -> PersistedAuthState {
        PersistedAuthState {
            guest_user: self.user.clone().filter(|u| u.is_guest),
        }
    }

    fn persist(&self) -> Result<()> {
        write_state(&self.state_path, &self.persisted_state())
    }
}

fn read_state(path: &Path) -> Result<PersistedAuthState> {
    if !path.exists() {
        return Ok(PersistedAuthState::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read auth state: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse auth state: {:?}", path))
}

fn write_state(path: &Path, state: &PersistedAuthState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(state)?;
    fs::write(path, json).with_context(|| format!("Failed to write auth state: {:?}", path))
}
