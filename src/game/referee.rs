//! Shot adjudication

use tracing::debug;

use crate::ws::protocol::{BattlefieldConfig, Slot};

use super::physics::{Impact, PhysicsSystem, Rect};

/// Decides whether a validated shot ends the game
pub trait Referee: Send + Sync {
    /// Returns the winning slot when the shot is decisive
    fn judge(&self, shooter: Slot, angle: f64, velocity: f64) -> Option<Slot>;

    /// Whether outcomes reported from outside are accepted
    fn accepts_reported_outcomes(&self) -> bool {
        false
    }
}

/// Recomputes every trajectory and ends the game on a castle hit
pub struct ServerReferee {
    field: BattlefieldConfig,
}

impl ServerReferee {
    pub fn new(field: BattlefieldConfig) -> Self {
        Self { field }
    }
}

impl Referee for ServerReferee {
    fn judge(&self, shooter: Slot, angle: f64, velocity: f64) -> Option<Slot> {
        let projectile = PhysicsSystem::launch(&self.field, shooter, angle, velocity);
        let target = Rect::from(self.field.castle(shooter.other()));

        match PhysicsSystem::fly(&self.field, projectile, target) {
            Impact::Target { x, y } => {
                debug!(slot = %shooter, x, y, "Shot hit the opposing castle");
                Some(shooter)
            }
            Impact::Missed { x, y } => {
                debug!(slot = %shooter, x, y, "Shot missed");
                None
            }
            Impact::Expired => None,
        }
    }
}

/// Never declares a winner; the outcome arrives through `report_outcome`
pub struct ExternalReferee;

impl Referee for ExternalReferee {
    fn judge(&self, _shooter: Slot, _angle: f64, _velocity: f64) -> Option<Slot> {
        None
    }

    fn accepts_reported_outcomes(&self) -> bool {
        true
    }
}
