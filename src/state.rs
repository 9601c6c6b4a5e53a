use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::auth::AuthService;
use crate::services::controller::SessionController;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub sessions: Arc<SessionController>,
    pub auth: Arc<AuthService>,
}
