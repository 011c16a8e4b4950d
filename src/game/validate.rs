//! Command validation
//!
//! Two layers: the request structs parse untrusted JSON bodies into typed
//! commands (schema layer), and the `validate_*` functions check a typed command
//! against the current session (semantic layer). Everything here is pure.

use serde::Deserialize;
use serde_json::Value;

use crate::ws::protocol::Slot;

use super::error::SessionError;

pub const MIN_ANGLE: f64 = 0.0;
pub const MAX_ANGLE: f64 = 360.0;

const NAME_REQUIRED: &str = "Name is required";
const MISSING_FIELDS: &str = "Missing required fields";
const INVALID_TYPES: &str = "Invalid field types";

/// Body of `POST /api/v1/register`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<Value>,
}

impl RegisterRequest {
    pub fn into_name(self) -> Result<String, SessionError> {
        match self.name {
            Some(Value::String(raw)) => validate_name(&raw),
            _ => Err(SessionError::invalid(NAME_REQUIRED)),
        }
    }
}

/// Body of `POST /api/v1/fire`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireRequest {
    #[serde(default, alias = "sessionId")]
    pub game_id: Option<Value>,
    #[serde(default)]
    pub player_id: Option<Value>,
    #[serde(default)]
    pub angle: Option<Value>,
    #[serde(default)]
    pub velocity: Option<Value>,
}

/// A numeric id taken from a request body.
///
/// Any JSON number is accepted. Numbers that are not an exact integer never
/// match a session or slot, so they fail the lookup checks in their usual order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireId {
    Int(i64),
    Unmatched,
}

impl WireId {
    pub fn as_i64(self) -> Option<i64> {
        match self {
            WireId::Int(id) => Some(id),
            WireId::Unmatched => None,
        }
    }
}

impl From<i64> for WireId {
    fn from(id: i64) -> Self {
        WireId::Int(id)
    }
}

/// A structurally valid shot, not yet checked against the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireCommand {
    pub session_id: WireId,
    pub player_id: WireId,
    pub angle: f64,
    pub velocity: f64,
}

impl FireRequest {
    pub fn into_command(self) -> Result<FireCommand, SessionError> {
        let (Some(game_id), Some(player_id), Some(angle), Some(velocity)) =
            (self.game_id, self.player_id, self.angle, self.velocity)
        else {
            return Err(SessionError::invalid(MISSING_FIELDS));
        };

        Ok(FireCommand {
            session_id: id(&game_id)?,
            player_id: id(&player_id)?,
            angle: number(&angle)?,
            velocity: number(&velocity)?,
        })
    }
}

/// Body of `POST /api/v1/game-over`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverRequest {
    #[serde(default, alias = "sessionId")]
    pub game_id: Option<Value>,
    #[serde(default, alias = "playerId_winner")]
    pub winner: Option<Value>,
}

/// An externally reported outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeCommand {
    pub session_id: WireId,
    pub winner: WireId,
}

impl GameOverRequest {
    pub fn into_command(self) -> Result<OutcomeCommand, SessionError> {
        let (Some(game_id), Some(winner)) = (self.game_id, self.winner) else {
            return Err(SessionError::invalid(MISSING_FIELDS));
        };

        Ok(OutcomeCommand {
            session_id: id(&game_id)?,
            winner: id(&winner)?,
        })
    }
}

fn id(value: &Value) -> Result<WireId, SessionError> {
    let Value::Number(n) = value else {
        return Err(SessionError::invalid(INVALID_TYPES));
    };
    if let Some(id) = n.as_i64() {
        return Ok(WireId::Int(id));
    }

    // 2^63 as f64; anything at or above it does not fit an i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) => Ok(WireId::Int(f as i64)),
        _ => Ok(WireId::Unmatched),
    }
}

fn number(value: &Value) -> Result<f64, SessionError> {
    value
        .as_f64()
        .ok_or_else(|| SessionError::invalid(INVALID_TYPES))
}

/// Trim a display name; blank names are rejected
pub fn validate_name(raw: &str) -> Result<String, SessionError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SessionError::invalid(NAME_REQUIRED));
    }
    Ok(name.to_string())
}

/// `active` is the current session id, present only while the session is `Active`
pub fn check_session(session_id: WireId, active: Option<u32>) -> Result<(), SessionError> {
    match (active, session_id.as_i64()) {
        (Some(current), Some(id)) if i64::from(current) == id => Ok(()),
        _ => Err(SessionError::UnknownSession),
    }
}

pub fn validate_angle(angle: f64) -> Result<(), SessionError> {
    if (MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
        Ok(())
    } else {
        Err(SessionError::AngleOutOfRange)
    }
}

pub fn validate_velocity(velocity: f64) -> Result<(), SessionError> {
    if velocity.is_finite() && velocity > 0.0 {
        Ok(())
    } else {
        Err(SessionError::InvalidVelocity)
    }
}

/// Check a shot in order: session, participant, turn, angle, velocity.
/// Returns the acting slot.
pub fn validate_fire(
    cmd: &FireCommand,
    active: Option<u32>,
    turn: Slot,
) -> Result<Slot, SessionError> {
    check_session(cmd.session_id, active)?;
    let slot = cmd
        .player_id
        .as_i64()
        .and_then(Slot::from_id)
        .ok_or(SessionError::UnknownParticipant)?;
    if slot != turn {
        return Err(SessionError::NotYourTurn);
    }
    validate_angle(cmd.angle)?;
    validate_velocity(cmd.velocity)?;
    Ok(slot)
}

/// Parse the `playerId` query parameter of a channel connect
pub fn validate_identity(raw: Option<&str>) -> Result<Slot, SessionError> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(Slot::from_id)
        .ok_or(SessionError::UnknownIdentity)
}

/// Returns the winning slot
pub fn validate_outcome(cmd: &OutcomeCommand, active: Option<u32>) -> Result<Slot, SessionError> {
    check_session(cmd.session_id, active)?;
    cmd.winner
        .as_i64()
        .and_then(Slot::from_id)
        .ok_or(SessionError::UnknownParticipant)
}
