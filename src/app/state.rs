//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, RefereeMode};
use crate::game::{ExternalReferee, Referee, ServerReferee, Session, SessionHandle};
use crate::util::rate_limit::{create_limiter, Limiter};
use crate::ws::protocol::BattlefieldConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: SessionHandle,
    pub api_limiter: Arc<Limiter>,
}

impl AppState {
    /// Spawns the session manager, so this must run inside the runtime
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let battlefield = BattlefieldConfig::default();

        let referee: Arc<dyn Referee> = match config.referee {
            RefereeMode::Server => Arc::new(ServerReferee::new(battlefield.clone())),
            RefereeMode::External => Arc::new(ExternalReferee),
        };
        info!(referee = ?config.referee, "Session referee selected");

        let session = SessionHandle::spawn(Session::new(battlefield), referee);
        let api_limiter = create_limiter(config.api_rate_limit);

        Self {
            config,
            session,
            api_limiter,
        }
    }
}
