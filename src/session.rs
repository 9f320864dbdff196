use crate::error::{AppError, Result};
use std::path::Path;
use tracing::{debug, info};

const USER_ID_FILE: &str = "user_id";

/// User and session identifiers, created once at startup and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user_id: String,
    session_id: String,
}

impl SessionContext {
    /// Load the persisted user id from `state_dir`, creating and storing a new
    /// one when absent. A fresh session id is minted on every call.
    pub fn create_or_load<P: AsRef<Path>>(state_dir: P) -> Result<Self> {
        let dir = state_dir.as_ref();
        let path = dir.join(USER_ID_FILE);

        let stored = match std::fs::read_to_string(&path) {
            Ok(content) => Some(content.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(AppError::Io(e)),
        };

        let user_id = match stored {
            Some(id) => {
                debug!("Loaded user id from {}", path.display());
                id
            }
            None => {
                let id = format!("usr_{}", uuid::Uuid::new_v4());
                std::fs::create_dir_all(dir)?;
                std::fs::write(&path, &id)?;
                info!("Created user id at {}", path.display());
                id
            }
        };

        let context = Self {
            user_id,
            session_id: new_session_id(),
        };
        info!(
            user_id = %context.user_id,
            session_id = %context.session_id,
            "Session initialized"
        );
        Ok(context)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

fn new_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("sess_{}_{}", millis, suffix)
}
