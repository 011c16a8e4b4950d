//! WebSocket protocol message definitions
//! These are the wire types pushed from the server to both participants

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two participant positions in a duel.
///
/// On the wire a slot is its index: `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Slot {
    /// Left castle, always fires first
    First,
    /// Right castle
    Second,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::First, Slot::Second];

    /// Position of this slot in the session's slot array
    pub fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }

    /// The opponent's slot
    pub fn other(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }

    /// Map an untrusted numeric identifier onto a slot
    pub fn from_id(id: i64) -> Option<Slot> {
        match id {
            0 => Some(Slot::First),
            1 => Some(Slot::Second),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> Self {
        slot.index() as u8
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Slot::from_id(i64::from(value)).ok_or_else(|| format!("invalid player slot {value}"))
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Both participants are connected; sent to each slot individually
    GameStart {
        #[serde(rename = "gameId")]
        game_id: u32,
        /// The receiving participant's own slot
        #[serde(rename = "playerId")]
        player_id: Slot,
        /// Display name of the other participant
        #[serde(rename = "opponentName")]
        opponent_name: String,
        battlefield: BattlefieldConfig,
    },

    /// A validated shot, relayed for animation
    Shot {
        #[serde(rename = "playerId")]
        player_id: Slot,
        /// Degrees, in [0, 360]
        angle: f64,
        velocity: f64,
    },

    /// The slot now allowed to fire
    TurnChange {
        #[serde(rename = "playerId_turn")]
        player_id_turn: Slot,
    },

    /// The duel is over; the session resets right after this
    GameOver {
        #[serde(rename = "playerId_winner")]
        player_id_winner: Slot,
    },

    /// Connection-level rejection, followed by a close
    Error { message: String },
}

impl ServerMsg {
    /// Wire tag, for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMsg::GameStart { .. } => "game_start",
            ServerMsg::Shot { .. } => "shot",
            ServerMsg::TurnChange { .. } => "turn_change",
            ServerMsg::GameOver { .. } => "game_over",
            ServerMsg::Error { .. } => "error",
        }
    }
}

/// Static layout of the duel, shared by the referee and the clients' renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattlefieldConfig {
    pub canvas_width: f64,
    pub canvas_height: f64,
    /// Flat ground line (screen y grows downward)
    pub ground_y: f64,
    /// Pixels per second squared
    pub gravity: f64,
    pub castles: [CastleConfig; 2],
}

/// A castle sitting on the ground, centred on `x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastleConfig {
    pub player_id: Slot,
    pub x: f64,
    /// Top edge of the castle
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BattlefieldConfig {
    pub fn castle(&self, slot: Slot) -> &CastleConfig {
        &self.castles[slot.index()]
    }
}

impl Default for BattlefieldConfig {
    fn default() -> Self {
        let ground_y = 140.0;
        let castle = |player_id, x| CastleConfig {
            player_id,
            x,
            y: ground_y - 10.0,
            width: 10.0,
            height: 10.0,
        };

        Self {
            canvas_width: 280.0,
            canvas_height: 150.0,
            ground_y,
            gravity: 600.0,
            castles: [castle(Slot::First, 20.0), castle(Slot::Second, 260.0)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slot_serializes_as_index() {
        assert_eq!(serde_json::to_value(Slot::First).unwrap(), json!(0));
        assert_eq!(serde_json::to_value(Slot::Second).unwrap(), json!(1));
        assert!(serde_json::from_value::<Slot>(json!(2)).is_err());
    }

    #[test]
    fn turn_change_uses_wire_field_names() {
        let msg = ServerMsg::TurnChange {
            player_id_turn: Slot::Second,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "turn_change", "playerId_turn": 1 })
        );
    }

    #[test]
    fn shot_and_game_over_shapes() {
        let shot = ServerMsg::Shot {
            player_id: Slot::First,
            angle: 45.0,
            velocity: 250.0,
        };
        assert_eq!(
            serde_json::to_value(&shot).unwrap(),
            json!({ "type": "shot", "playerId": 0, "angle": 45.0, "velocity": 250.0 })
        );

        let over = ServerMsg::GameOver {
            player_id_winner: Slot::Second,
        };
        assert_eq!(
            serde_json::to_value(&over).unwrap(),
            json!({ "type": "game_over", "playerId_winner": 1 })
        );
    }

    #[test]
    fn game_start_round_trips_through_the_tagged_enum() {
        let start = ServerMsg::GameStart {
            game_id: 7,
            player_id: Slot::Second,
            opponent_name: "Alice".to_string(),
            battlefield: BattlefieldConfig::default(),
        };
        let text = serde_json::to_string(&start).unwrap();
        assert!(text.contains("\"type\":\"game_start\""));
        assert!(text.contains("\"opponentName\":\"Alice\""));
        assert!(text.contains("\"canvasWidth\":280.0"));

        let parsed: ServerMsg = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, start);
    }

    #[test]
    fn default_battlefield_places_castles_on_the_ground() {
        let field = BattlefieldConfig::default();
        for slot in Slot::ALL {
            let castle = field.castle(slot);
            assert_eq!(castle.player_id, slot);
            assert_eq!(castle.y + castle.height, field.ground_y);
        }
        assert!(field.castle(Slot::First).x < field.castle(Slot::Second).x);
    }
}
