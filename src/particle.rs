use glam::DVec3;

/// A point mass integrated by the [`crate::particle_system::ParticleSystem`].
///
/// `velocity` and `net_force` are transient: they only hold meaningful
/// values while a derivative evaluation is in progress (see
/// [`crate::particle_system::ParticleSystem::evaluate_derivative`]).
/// Reading them outside of that window is not a contract violation, but
/// their contents are whatever the most recent derivative evaluation left
/// behind.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    /// Reciprocal mass. Zero marks an infinitely heavy, kinematic particle.
    pub inv_mass: f64,
    pub position: DVec3,
    pub momentum: DVec3,
    pub velocity: DVec3,
    pub net_force: DVec3,
}

impl Particle {
    pub fn new(position: DVec3, momentum: DVec3, inv_mass: f64) -> Particle {
        Particle {
            inv_mass,
            position,
            momentum,
            velocity: DVec3::ZERO,
            net_force: DVec3::ZERO,
        }
    }

    pub fn at_rest(position: DVec3, inv_mass: f64) -> Particle {
        Particle::new(position, DVec3::ZERO, inv_mass)
    }
}

impl Default for Particle {
    fn default() -> Self {
        Particle::new(DVec3::ZERO, DVec3::ZERO, 1.0)
    }
}

/// A kinematic endpoint supplying a position/momentum pair to spring
/// constraints without being subject to integration. The soft box rebuilds
/// the full set of these every tick from the control frame's corners.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticParticle {
    pub position: DVec3,
    pub momentum: DVec3,
}

impl StaticParticle {
    pub fn new(position: DVec3, momentum: DVec3) -> StaticParticle {
        StaticParticle { position, momentum }
    }
}

/// Either endpoint of a [`crate::constraint::SpringConstraint`].
///
/// spec.md's endpoint encoding uses a signed index (non-negative = dynamic,
/// negative = static) purely as a compact representation; that sign
/// convention isn't part of the external contract, so this crate uses the
/// equivalent tagged variant instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Dynamic(usize),
    Static(usize),
}

impl Endpoint {
    pub fn is_dynamic(self) -> bool {
        matches!(self, Endpoint::Dynamic(_))
    }

    pub fn is_static(self) -> bool {
        matches!(self, Endpoint::Static(_))
    }
}
