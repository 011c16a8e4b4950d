//! Projectile ballistics on the battlefield

use crate::ws::protocol::{BattlefieldConfig, CastleConfig, Slot};

/// Integration step (seconds)
pub const STEP_SECS: f64 = 1.0 / 120.0;

/// Upper bound on integration steps for a single flight
pub const MAX_STEPS: usize = 20_000;

/// Projectile state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
}

/// Axis-aligned rectangle in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl From<&CastleConfig> for Rect {
    fn from(castle: &CastleConfig) -> Self {
        Self {
            left: castle.x - castle.width / 2.0,
            top: castle.y,
            right: castle.x + castle.width / 2.0,
            bottom: castle.y + castle.height,
        }
    }
}

/// How a flight ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Impact {
    /// Entered the target rectangle
    Target { x: f64, y: f64 },
    /// Reached the ground or left the canvas
    Missed { x: f64, y: f64 },
    /// Still airborne after `MAX_STEPS`
    Expired,
}

pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Launch a shot from the top centre of the shooter's castle.
    /// Slot 1 sits on the right, so its angle is mirrored to aim left.
    pub fn launch(field: &BattlefieldConfig, shooter: Slot, angle_deg: f64, velocity: f64) -> Projectile {
        let angle_deg = match shooter {
            Slot::First => angle_deg,
            Slot::Second => 180.0 - angle_deg,
        };
        let (vel_x, vel_y) = Self::velocity_components(angle_deg, velocity);
        let castle = field.castle(shooter);

        Projectile {
            x: castle.x,
            y: castle.y,
            vel_x,
            vel_y,
        }
    }

    /// Screen y grows downward, so upward launches have negative `vel_y`
    pub fn velocity_components(angle_deg: f64, velocity: f64) -> (f64, f64) {
        let angle = angle_deg.to_radians();
        (velocity * angle.cos(), -velocity * angle.sin())
    }

    /// Advance one step: position first, then gravity on the vertical velocity
    pub fn step(p: Projectile, gravity: f64, dt: f64) -> Projectile {
        Projectile {
            x: p.x + p.vel_x * dt,
            y: p.y + p.vel_y * dt,
            vel_x: p.vel_x,
            vel_y: p.vel_y + gravity * dt,
        }
    }

    /// Fly the projectile until it enters `target`, lands or leaves the canvas
    pub fn fly(field: &BattlefieldConfig, mut p: Projectile, target: Rect) -> Impact {
        for _ in 0..MAX_STEPS {
            let next = Self::step(p, field.gravity, STEP_SECS);

            if Self::segment_hits_rect((p.x, p.y), (next.x, next.y), &target) {
                return Impact::Target { x: next.x, y: next.y };
            }

            p = next;
            if p.y >= field.ground_y || p.x < 0.0 || p.x > field.canvas_width {
                return Impact::Missed { x: p.x, y: p.y };
            }
        }
        Impact::Expired
    }

    /// Liang-Barsky clip of the segment `from -> to` against `rect`
    pub fn segment_hits_rect(from: (f64, f64), to: (f64, f64), rect: &Rect) -> bool {
        let (x0, y0) = from;
        let dx = to.0 - x0;
        let dy = to.1 - y0;

        let mut t_enter = 0.0_f64;
        let mut t_exit = 1.0_f64;
        let edges = [
            (-dx, x0 - rect.left),
            (dx, rect.right - x0),
            (-dy, y0 - rect.top),
            (dy, rect.bottom - y0),
        ];

        for (p, q) in edges {
            if p == 0.0 {
                // Parallel to this edge and outside it
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t_exit {
                    return false;
                }
                t_enter = t_enter.max(r);
            } else {
                if r < t_enter {
                    return false;
                }
                t_exit = t_exit.min(r);
            }
        }

        true
    }
}
