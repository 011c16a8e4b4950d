//! Session manager task
//!
//! The session is owned by a single task. Handlers talk to it through a
//! [`SessionHandle`]; every command is processed to completion before the
//! next one is taken off the queue, so session state needs no locking.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::ws::protocol::Slot;

use super::error::SessionError;
use super::referee::Referee;
use super::session::{FireOutcome, Session, SessionSummary};
use super::slot::{ChannelTx, ConnectionId};
use super::validate::{FireCommand, OutcomeCommand};

/// Pending commands before senders start waiting
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<T>;

/// Requests accepted by the manager task
pub enum SessionCommand {
    Register {
        name: String,
        reply: Reply<Result<Slot, SessionError>>,
    },
    Attach {
        slot: Slot,
        connection_id: ConnectionId,
        tx: ChannelTx,
        reply: Reply<Result<bool, SessionError>>,
    },
    Detach {
        slot: Slot,
        connection_id: ConnectionId,
    },
    Fire {
        cmd: FireCommand,
        reply: Reply<Result<FireOutcome, SessionError>>,
    },
    ReportOutcome {
        cmd: OutcomeCommand,
        reply: Reply<Result<Slot, SessionError>>,
    },
    Summary {
        reply: Reply<SessionSummary>,
    },
}

/// Owns the session and applies commands one at a time
pub struct SessionManager {
    session: Session,
    referee: Arc<dyn Referee>,
    commands: mpsc::Receiver<SessionCommand>,
}

impl SessionManager {
    pub fn new(session: Session, referee: Arc<dyn Referee>) -> (Self, SessionHandle) {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let manager = Self {
            session,
            referee,
            commands,
        };
        (manager, SessionHandle { commands: tx })
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!("Session manager started");

        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }

        info!("Session manager stopped");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Register { name, reply } => {
                let result = self.session.register(&name);
                if let Err(e) = &result {
                    warn!(code = e.code(), error = %e, "Registration refused");
                }
                let _ = reply.send(result);
            }
            SessionCommand::Attach {
                slot,
                connection_id,
                tx,
                reply,
            } => {
                let result = self.session.attach(slot, connection_id, tx);
                if let Err(e) = &result {
                    warn!(slot = %slot, code = e.code(), "Channel attach refused");
                }
                let _ = reply.send(result);
            }
            SessionCommand::Detach {
                slot,
                connection_id,
            } => {
                self.session.detach(slot, connection_id);
            }
            SessionCommand::Fire { cmd, reply } => {
                let result = self.session.fire(&cmd, self.referee.as_ref());
                if let Err(e) = &result {
                    warn!(player_id = ?cmd.player_id, code = e.code(), "Shot refused");
                }
                let _ = reply.send(result);
            }
            SessionCommand::ReportOutcome { cmd, reply } => {
                let result = if self.referee.accepts_reported_outcomes() {
                    self.session.report_outcome(&cmd)
                } else {
                    Err(SessionError::OutcomeNotAccepted)
                };
                if let Err(e) = &result {
                    warn!(winner = ?cmd.winner, code = e.code(), "Reported outcome refused");
                }
                let _ = reply.send(result);
            }
            SessionCommand::Summary { reply } => {
                let _ = reply.send(self.session.summary());
            }
        }
    }
}

/// Cloneable front door to the session manager
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Spawn a manager for `session` on the current runtime
    pub fn spawn(session: Session, referee: Arc<dyn Referee>) -> Self {
        let (manager, handle) = SessionManager::new(session, referee);
        tokio::spawn(manager.run());
        handle
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SessionError::Unavailable)?;
        response.await.map_err(|_| SessionError::Unavailable)
    }

    pub async fn register(&self, name: String) -> Result<Slot, SessionError> {
        self.request(|reply| SessionCommand::Register { name, reply })
            .await?
    }

    /// Returns `true` when this attach started the game
    pub async fn attach(
        &self,
        slot: Slot,
        connection_id: ConnectionId,
        tx: ChannelTx,
    ) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::Attach {
            slot,
            connection_id,
            tx,
            reply,
        })
        .await?
    }

    /// Fire-and-forget close notification
    pub async fn detach(&self, slot: Slot, connection_id: ConnectionId) {
        let command = SessionCommand::Detach {
            slot,
            connection_id,
        };
        if self.commands.send(command).await.is_err() {
            debug!(slot = %slot, "Session manager gone, close not delivered");
        }
    }

    pub async fn fire(&self, cmd: FireCommand) -> Result<FireOutcome, SessionError> {
        self.request(|reply| SessionCommand::Fire { cmd, reply })
            .await?
    }

    pub async fn report_outcome(&self, cmd: OutcomeCommand) -> Result<Slot, SessionError> {
        self.request(|reply| SessionCommand::ReportOutcome { cmd, reply })
            .await?
    }

    pub async fn summary(&self) -> Result<SessionSummary, SessionError> {
        self.request(|reply| SessionCommand::Summary { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::referee::{ExternalReferee, ServerReferee};
    use crate::game::session::Phase;
    use crate::ws::protocol::{BattlefieldConfig, ServerMsg};
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;
    use crate::game::validate::WireId;

    fn spawn_external() -> SessionHandle {
        SessionHandle::spawn(Session::default(), Arc::new(ExternalReferee))
    }

    async fn next(rx: &mut mpsc::Receiver<String>) -> ServerMsg {
        let text = rx.recv().await.expect("channel closed");
        serde_json::from_str(&text).unwrap()
    }

    fn shot(player_id: i64, velocity: f64) -> FireCommand {
        FireCommand {
            session_id: WireId::Int(1),
            player_id: player_id.into(),
            angle: 45.0,
            velocity,
        }
    }

    #[tokio::test]
    async fn commands_drive_a_full_duel() {
        let session = spawn_external();
        assert_eq!(session.register("Alice".to_string()).await, Ok(Slot::First));
        assert_eq!(session.register("Bob".to_string()).await, Ok(Slot::Second));

        let (tx1, mut rx1) = mpsc::channel(16);
        let (tx0, mut rx0) = mpsc::channel(16);
        assert_eq!(
            session.attach(Slot::Second, Uuid::new_v4(), tx1).await,
            Ok(false)
        );
        assert_eq!(
            session.attach(Slot::First, Uuid::new_v4(), tx0).await,
            Ok(true)
        );

        match next(&mut rx0).await {
            ServerMsg::GameStart { opponent_name, .. } => assert_eq!(opponent_name, "Bob"),
            other => panic!("unexpected {other:?}"),
        }
        match next(&mut rx1).await {
            ServerMsg::GameStart { opponent_name, .. } => assert_eq!(opponent_name, "Alice"),
            other => panic!("unexpected {other:?}"),
        }
        for rx in [&mut rx0, &mut rx1] {
            assert_eq!(
                next(rx).await,
                ServerMsg::TurnChange {
                    player_id_turn: Slot::First
                }
            );
        }

        assert_ok!(session.fire(shot(0, 250.0)).await);
        assert_eq!(
            session.fire(shot(0, 250.0)).await,
            Err(SessionError::NotYourTurn)
        );
        assert_ok!(session.fire(shot(1, 250.0)).await);

        let summary = session.summary().await.unwrap();
        assert_eq!(summary.phase, Phase::Active);
        assert_eq!(summary.turn, Some(Slot::First));
    }

    #[tokio::test]
    async fn close_resets_the_session() {
        let session = spawn_external();
        session.register("Alice".to_string()).await.unwrap();
        session.register("Bob".to_string()).await.unwrap();

        let alice = Uuid::new_v4();
        let (tx0, _rx0) = mpsc::channel(16);
        let (tx1, mut rx1) = mpsc::channel(16);
        session.attach(Slot::First, alice, tx0).await.unwrap();
        session.attach(Slot::Second, Uuid::new_v4(), tx1).await.unwrap();

        session.detach(Slot::First, alice).await;

        // Bob's writer sees the start events, then the end of the stream
        let mut received = 0;
        while rx1.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 2);

        let summary = session.summary().await.unwrap();
        assert_eq!(summary.phase, Phase::Empty);
        assert_eq!(summary.registered, 0);
        assert_eq!(session.register("Bob".to_string()).await, Ok(Slot::First));
    }

    #[tokio::test]
    async fn server_referee_ends_the_game_on_a_hit() {
        let referee = Arc::new(ServerReferee::new(BattlefieldConfig::default()));
        let session = SessionHandle::spawn(Session::default(), referee);
        session.register("Alice".to_string()).await.unwrap();
        session.register("Bob".to_string()).await.unwrap();
        let (tx0, _rx0) = mpsc::channel(16);
        let (tx1, _rx1) = mpsc::channel(16);
        session.attach(Slot::First, Uuid::new_v4(), tx0).await.unwrap();
        session.attach(Slot::Second, Uuid::new_v4(), tx1).await.unwrap();

        assert_eq!(
            session.fire(shot(0, 374.0)).await,
            Ok(FireOutcome::GameOver {
                winner: Slot::First
            })
        );
        assert_eq!(session.summary().await.unwrap().phase, Phase::Empty);
    }

    #[tokio::test]
    async fn reported_outcomes_follow_the_referee() {
        let cmd = OutcomeCommand {
            session_id: WireId::Int(1),
            winner: WireId::Int(1),
        };

        let refereed = SessionHandle::spawn(
            Session::default(),
            Arc::new(ServerReferee::new(BattlefieldConfig::default())),
        );
        assert_eq!(
            refereed.report_outcome(cmd).await,
            Err(SessionError::OutcomeNotAccepted)
        );

        let external = spawn_external();
        external.register("Alice".to_string()).await.unwrap();
        external.register("Bob".to_string()).await.unwrap();
        let (tx0, _rx0) = mpsc::channel(16);
        let (tx1, mut rx1) = mpsc::channel(16);
        external.attach(Slot::First, Uuid::new_v4(), tx0).await.unwrap();
        external.attach(Slot::Second, Uuid::new_v4(), tx1).await.unwrap();

        assert_eq!(external.report_outcome(cmd).await, Ok(Slot::Second));
        let mut last = None;
        while let Some(text) = rx1.recv().await {
            last = Some(serde_json::from_str::<ServerMsg>(&text).unwrap());
        }
        assert_eq!(
            last,
            Some(ServerMsg::GameOver {
                player_id_winner: Slot::Second
            })
        );
    }

    #[tokio::test]
    async fn stopped_manager_is_unavailable() {
        let (manager, handle) = SessionManager::new(Session::default(), Arc::new(ExternalReferee));
        drop(manager);

        assert_err!(handle.summary().await);
        assert_eq!(
            handle.register("Alice".to_string()).await,
            Err(SessionError::Unavailable)
        );
    }
}
