//! Authoritative session state and lifecycle transitions

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ws::protocol::{BattlefieldConfig, ServerMsg, Slot};

use super::broadcast::{self, Target};
use super::error::SessionError;
use super::referee::Referee;
use super::slot::{ChannelTx, ConnectionId, SlotState};
use super::validate::{validate_fire, validate_name, validate_outcome, FireCommand, OutcomeCommand};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No registrations
    Empty,
    /// At least one name registered, channels not both live
    AwaitingOpponent,
    /// Both channels live, turns alternating
    Active,
    /// Transient; folds into a reset `Empty` immediately
    Terminated,
}

/// Result of a validated shot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The turn moved to this slot
    TurnPassed(Slot),
    /// The shot was decisive and the session has been reset
    GameOver { winner: Slot },
}

/// Point-in-time view for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub phase: Phase,
    pub session_id: Option<u32>,
    pub registered: usize,
    pub connected: usize,
    pub turn: Option<Slot>,
}

/// The single duel session, reset in place between pairings
pub struct Session {
    id: Option<u32>,
    /// Last id handed out; ids are never reused within a process
    last_id: u32,
    slots: [SlotState; 2],
    turn: Slot,
    phase: Phase,
    battlefield: BattlefieldConfig,
}

impl Session {
    pub fn new(battlefield: BattlefieldConfig) -> Self {
        Self {
            id: None,
            last_id: 0,
            slots: Default::default(),
            turn: Slot::First,
            phase: Phase::Empty,
            battlefield,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn turn(&self) -> Slot {
        self.turn
    }

    /// Present only while a pairing is in progress
    #[cfg(test)]
    pub fn session_id(&self) -> Option<u32> {
        self.id
    }

    pub fn name(&self, slot: Slot) -> Option<&str> {
        self.slots[slot.index()].name.as_deref()
    }

    #[cfg(test)]
    pub fn is_live(&self, slot: Slot) -> bool {
        self.slots[slot.index()].is_live()
    }

    pub fn registered_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_registered()).count()
    }

    pub fn connected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_live()).count()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            phase: self.phase,
            session_id: self.id,
            registered: self.registered_count(),
            connected: self.connected_count(),
            turn: (self.phase == Phase::Active).then_some(self.turn),
        }
    }

    fn active_id(&self) -> Option<u32> {
        match self.phase {
            Phase::Active => self.id,
            _ => None,
        }
    }

    /// Reserve the first free slot for `raw_name`
    pub fn register(&mut self, raw_name: &str) -> Result<Slot, SessionError> {
        let name = validate_name(raw_name)?;

        if self.slots.iter().any(|s| s.name.as_deref() == Some(name.as_str())) {
            return Err(SessionError::DuplicateName(name));
        }

        let slot = Slot::ALL
            .into_iter()
            .find(|slot| !self.slots[slot.index()].is_registered())
            .ok_or(SessionError::SessionFull)?;

        self.slots[slot.index()].name = Some(name);
        if self.phase == Phase::Empty {
            self.phase = Phase::AwaitingOpponent;
        }

        info!(
            slot = %slot,
            name = self.name(slot).unwrap_or_default(),
            registered = self.registered_count(),
            "Player registered"
        );

        Ok(slot)
    }

    /// Attach a live channel to a registered slot.
    ///
    /// Before the game starts a second attach replaces the first. Returns
    /// `true` when this attach started the game.
    pub fn attach(
        &mut self,
        slot: Slot,
        connection_id: ConnectionId,
        tx: ChannelTx,
    ) -> Result<bool, SessionError> {
        if !self.slots[slot.index()].is_registered() {
            return Err(SessionError::UnknownIdentity);
        }
        if self.phase == Phase::Active {
            return Err(SessionError::AlreadyConnected);
        }

        if let Some(previous) = self.slots[slot.index()].connection_id() {
            debug!(slot = %slot, previous = %previous, "Replacing channel before start");
        }
        self.slots[slot.index()].connect(connection_id, tx);

        info!(
            slot = %slot,
            connection_id = %connection_id,
            connected = self.connected_count(),
            "Channel attached"
        );

        if self.slots.iter().all(SlotState::is_live) {
            self.start();
            return Ok(true);
        }
        Ok(false)
    }

    /// A channel closed. Only the slot's current connection counts; a stale
    /// close is ignored. Returns `true` when the session was terminated.
    pub fn detach(&mut self, slot: Slot, connection_id: ConnectionId) -> bool {
        let state = &mut self.slots[slot.index()];
        if state.connection_id() != Some(connection_id) {
            debug!(slot = %slot, connection_id = %connection_id, "Ignoring close of stale channel");
            return false;
        }
        state.disconnect();

        match self.phase {
            Phase::AwaitingOpponent | Phase::Active => {
                warn!(slot = %slot, phase = ?self.phase, "Channel closed, ending session");
                self.terminate();
                true
            }
            Phase::Empty | Phase::Terminated => false,
        }
    }

    /// Validate and apply a shot, then tell both sides what happened
    pub fn fire(
        &mut self,
        cmd: &FireCommand,
        referee: &dyn Referee,
    ) -> Result<FireOutcome, SessionError> {
        let shooter = validate_fire(cmd, self.active_id(), self.turn)?;

        info!(
            session_id = ?self.id,
            slot = %shooter,
            angle = cmd.angle,
            velocity = cmd.velocity,
            "Shot fired"
        );

        broadcast::send(
            &self.slots,
            Target::All,
            &ServerMsg::Shot {
                player_id: shooter,
                angle: cmd.angle,
                velocity: cmd.velocity,
            },
        );

        if let Some(winner) = referee.judge(shooter, cmd.angle, cmd.velocity) {
            self.finish(winner);
            return Ok(FireOutcome::GameOver { winner });
        }

        self.turn = shooter.other();
        broadcast::send(
            &self.slots,
            Target::All,
            &ServerMsg::TurnChange {
                player_id_turn: self.turn,
            },
        );

        Ok(FireOutcome::TurnPassed(self.turn))
    }

    /// Accept a terminal outcome decided outside the server
    pub fn report_outcome(&mut self, cmd: &OutcomeCommand) -> Result<Slot, SessionError> {
        let winner = validate_outcome(cmd, self.active_id())?;
        self.finish(winner);
        Ok(winner)
    }

    /// `AwaitingOpponent -> Active`
    fn start(&mut self) {
        self.last_id = self.last_id.wrapping_add(1).max(1);
        self.id = Some(self.last_id);
        self.turn = Slot::First;
        self.phase = Phase::Active;

        info!(session_id = self.last_id, "Both players connected, game starting");

        for slot in Slot::ALL {
            let opponent_name = self
                .name(slot.other())
                .map(str::to_string)
                .unwrap_or_default();

            broadcast::send(
                &self.slots,
                Target::Slot(slot),
                &ServerMsg::GameStart {
                    game_id: self.last_id,
                    player_id: slot,
                    opponent_name,
                    battlefield: self.battlefield.clone(),
                },
            );
        }

        broadcast::send(
            &self.slots,
            Target::All,
            &ServerMsg::TurnChange {
                player_id_turn: self.turn,
            },
        );
    }

    fn finish(&mut self, winner: Slot) {
        info!(session_id = ?self.id, winner = %winner, "Game over");
        broadcast::send(
            &self.slots,
            Target::All,
            &ServerMsg::GameOver {
                player_id_winner: winner,
            },
        );
        self.terminate();
    }

    /// Enter `Terminated`, then fold straight back to `Empty`.
    /// Dropping the links lets each writer drain its queue and close.
    fn terminate(&mut self) {
        self.phase = Phase::Terminated;
        info!(session_id = ?self.id, "Session terminated");

        for slot in &mut self.slots {
            slot.clear();
        }
        self.id = None;
        self.turn = Slot::First;
        self.phase = Phase::Empty;

        debug!("Session reset");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(BattlefieldConfig::default())
    }
}
