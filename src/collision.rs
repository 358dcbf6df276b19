//! Wall collision: an axis-aligned room, an interpenetration test, and the
//! per-axis impulse pass applied once the contact time has been bracketed
//! by [`crate::particle_system::ParticleSystem::single_step`].

use glam::DVec3;
use tracing::trace;

use crate::particle::Particle;

/// Positional tolerance used both to decide which side of a wall a
/// particle is resting against and as the impulse pass's dead zone.
const EPSILON: f64 = 1e-5;

/// A closed axis-aligned box centred at the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Room {
    /// Half-extents along each axis.
    pub half_extents: DVec3,
}

impl Room {
    pub fn new(half_extents: DVec3) -> Room {
        Room { half_extents }
    }

    /// True iff any dynamic particle has any coordinate strictly outside
    /// `[-half_extents, half_extents]`.
    pub fn any_interpenetrating(&self, particles: &[Particle]) -> bool {
        particles.iter().any(|p| self.interpenetrates(p))
    }

    fn interpenetrates(&self, p: &Particle) -> bool {
        let h = self.half_extents;
        p.position.x < -h.x
            || p.position.x > h.x
            || p.position.y < -h.y
            || p.position.y > h.y
            || p.position.z < -h.z
            || p.position.z > h.z
    }

    /// Applies the per-axis reflection + restitution-scaling impulse pass
    /// to every dynamic particle, in place (spec.md §4.3).
    pub fn apply_impulses(&self, particles: &mut [Particle], elastic_collision_factor: f64) {
        let h = self.half_extents;
        for p in particles.iter_mut() {
            let mut penalized = false;

            if p.position.x < -h.x + EPSILON && p.momentum.x < 0.0 {
                p.momentum.x = -p.momentum.x;
                penalized = true;
            } else if p.position.x > h.x - EPSILON && p.momentum.x > 0.0 {
                p.momentum.x = -p.momentum.x;
                penalized = true;
            }

            if p.position.y < -h.y + EPSILON && p.momentum.y < 0.0 {
                p.momentum.y = -p.momentum.y;
                penalized = true;
            } else if p.position.y > h.y - EPSILON && p.momentum.y > 0.0 {
                p.momentum.y = -p.momentum.y;
                penalized = true;
            }

            if p.position.z < -h.z + EPSILON && p.momentum.z < 0.0 {
                p.momentum.z = -p.momentum.z;
                penalized = true;
            } else if p.position.z > h.z - EPSILON && p.momentum.z > 0.0 {
                p.momentum.z = -p.momentum.z;
                penalized = true;
            }

            if penalized {
                p.momentum *= elastic_collision_factor;
                trace!(momentum = ?p.momentum, "wall impulse applied");
            }
        }
    }
}

impl Default for Room {
    /// spec.md §6's default room half-extents `(5, 2.5, 5)`.
    fn default() -> Self {
        Room::new(DVec3::new(5.0, 2.5, 5.0))
    }
}
