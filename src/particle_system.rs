//! Particle state, spring-force assembly, and the RK4 + bisection tick
//! driver. Grounded in `original_source/source/ParticleState.cpp`
//! (`storePhysicsState`/`applyPhysicsState`/`evaluateDerivative`/`update`)
//! generalized with the wall-collision bisection from spec.md §4.2.

use glam::DVec3;
use rand::Rng;
use tracing::{instrument, trace};

use crate::collision::Room;
use crate::constraint::SpringConstraint;
use crate::integrator::Rk4Integrator;
use crate::particle::{Endpoint, Particle, StaticParticle};

/// Maximum duration of a single RK4 substep, regardless of the wall-clock
/// `dt` the host supplies (spec.md §4.2).
const MAX_SUBSTEP: f64 = 0.01;
/// The outer substep loop stops consuming time budget once less than this
/// remains (spec.md §4.2).
const MIN_REMAINING: f64 = 1e-5;
/// Lower bound of the bisection bracket; kept above zero so a particle
/// already resting at a wall doesn't produce a zero-time contact loop
/// (spec.md §4.2, §9).
const BISECTION_FLOOR: f64 = 0.001;
/// Bisection stops narrowing the bracket once it's this tight.
const BISECTION_TOLERANCE: f64 = 1e-2;

const FIELDS_PER_PARTICLE: usize = 6;

#[derive(Clone, Debug)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    static_particles: Vec<StaticParticle>,
    constraints: Vec<SpringConstraint>,
    room: Room,
    /// Global velocity-proportional drag coefficient, γ.
    pub movement_attenuation: f64,
    /// Restitution coefficient applied to momentum after a wall impulse.
    pub elastic_collision_factor: f64,
    integrator: Rk4Integrator,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        ParticleSystem {
            particles: Vec::new(),
            static_particles: Vec::new(),
            constraints: Vec::new(),
            room: Room::default(),
            movement_attenuation: 0.0,
            elastic_collision_factor: 1.0,
            integrator: Rk4Integrator::new(),
        }
    }
}

impl ParticleSystem {
    pub fn new(room: Room) -> ParticleSystem {
        ParticleSystem {
            room,
            ..Default::default()
        }
    }

    pub fn room(&self) -> Room {
        self.room
    }

    pub fn set_room(&mut self, room: Room) {
        self.room = room;
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.constraints.clear();
    }

    pub fn add_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    pub fn add_constraint(&mut self, constraint: SpringConstraint) {
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[SpringConstraint] {
        &self.constraints
    }

    pub fn constraints_mut(&mut self) -> &mut [SpringConstraint] {
        &mut self.constraints
    }

    pub fn set_static_particles(&mut self, particles: Vec<StaticParticle>) {
        self.static_particles = particles;
    }

    pub fn get_static_particles(&self) -> &[StaticParticle] {
        &self.static_particles
    }

    pub fn get_particle_states(&self) -> &[Particle] {
        &self.particles
    }

    pub fn get_particle_states_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Sets `inv_mass = 1 / mass` on every dynamic particle.
    pub fn update_soft_box_particles_mass(&mut self, mass: f64) {
        let inv_mass = 1.0 / mass;
        for p in &mut self.particles {
            p.inv_mass = inv_mass;
        }
    }

    /// Applies `(spring_constant, attenuation)` to every spring whose
    /// endpoints are both dynamic.
    pub fn update_soft_box_constraints(&mut self, spring_constant: f64, attenuation: f64) {
        for c in &mut self.constraints {
            if c.is_internal() {
                c.spring_constant = spring_constant;
                c.attenuation_factor = attenuation;
            }
        }
    }

    /// Applies `(spring_constant, attenuation)` to every spring with at
    /// least one static endpoint.
    pub fn update_frame_constraints(&mut self, spring_constant: f64, attenuation: f64) {
        for c in &mut self.constraints {
            if !c.is_internal() {
                c.spring_constant = spring_constant;
                c.attenuation_factor = attenuation;
            }
        }
    }

    pub fn update_environment_constant(&mut self, movement_attenuation: f64, elastic_collision_factor: f64) {
        self.movement_attenuation = movement_attenuation;
        self.elastic_collision_factor = elastic_collision_factor;
    }

    /// Replaces every dynamic particle's momentum with an independent
    /// uniform sample in `[-1, 1]^3`.
    pub fn apply_random_disturbance(&mut self) {
        let mut rng = rand::thread_rng();
        for p in &mut self.particles {
            p.momentum = DVec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            );
        }
    }

    fn store_state(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.particles.len() * FIELDS_PER_PARTICLE);
        for p in &self.particles {
            out.push(p.position.x);
            out.push(p.position.y);
            out.push(p.position.z);
            out.push(p.momentum.x);
            out.push(p.momentum.y);
            out.push(p.momentum.z);
        }
        out
    }

    fn apply_state(&mut self, state: &[f64]) {
        debug_assert_eq!(state.len(), self.particles.len() * FIELDS_PER_PARTICLE);
        for (i, p) in self.particles.iter_mut().enumerate() {
            let base = i * FIELDS_PER_PARTICLE;
            p.position = DVec3::new(state[base], state[base + 1], state[base + 2]);
            p.momentum = DVec3::new(state[base + 3], state[base + 4], state[base + 5]);
        }
    }

    fn endpoint_state(&self, endpoint: Endpoint) -> (DVec3, DVec3, f64) {
        match endpoint {
            Endpoint::Dynamic(i) => {
                let p = &self.particles[i];
                (p.position, p.momentum, p.inv_mass)
            }
            Endpoint::Static(k) => {
                let s = &self.static_particles[k];
                (s.position, s.momentum, 0.0)
            }
        }
    }

    fn clear_forces(&mut self) {
        for p in &mut self.particles {
            p.net_force = DVec3::ZERO;
        }
    }

    fn calculate_forces(&mut self) {
        for i in 0..self.constraints.len() {
            let c = self.constraints[i];
            let (pos_a, mom_a, inv_mass_a) = self.endpoint_state(c.endpoint_a);
            let (pos_b, mom_b, inv_mass_b) = self.endpoint_state(c.endpoint_b);
            let force = c.force_on_a(pos_a, mom_a, inv_mass_a, pos_b, mom_b, inv_mass_b);

            if let Endpoint::Dynamic(a) = c.endpoint_a {
                self.particles[a].net_force += force;
            }
            if let Endpoint::Dynamic(b) = c.endpoint_b {
                self.particles[b].net_force -= force;
            }
        }
    }

    /// Derivative function fed to the RK4 integrator: writes `state` back
    /// into the particles, re-assembles forces, and emits `(velocity,
    /// net_force)` per particle (spec.md §4.2).
    fn evaluate_derivative(&mut self, state: &[f64], _t: f64) -> Vec<f64> {
        self.apply_state(state);
        self.clear_forces();
        self.calculate_forces();

        let gamma = self.movement_attenuation;
        for p in &mut self.particles {
            p.velocity = p.inv_mass * p.momentum;
            p.net_force -= gamma * p.velocity;
        }

        let mut out = Vec::with_capacity(self.particles.len() * FIELDS_PER_PARTICLE);
        for p in &self.particles {
            out.push(p.velocity.x);
            out.push(p.velocity.y);
            out.push(p.velocity.z);
            out.push(p.net_force.x);
            out.push(p.net_force.y);
            out.push(p.net_force.z);
        }
        out
    }

    /// Runs one RK4 step of duration `h` from snapshot `s0` and applies
    /// the resulting state to the live particles.
    fn advance_from(&mut self, s0: &[f64], h: f64) {
        let integrator = self.integrator;
        let next = integrator.step(s0, 0.0, h, |s, t| self.evaluate_derivative(s, t));
        self.apply_state(&next);
    }

    /// Advances up to `h` seconds, truncating at the first wall
    /// interpenetration and returning the time actually advanced
    /// (spec.md §4.2).
    #[instrument(level = "trace", skip(self))]
    pub fn single_step(&mut self, h: f64) -> f64 {
        let s0 = self.store_state();

        self.advance_from(&s0, h);
        if !self.room.any_interpenetrating(&self.particles) {
            return h;
        }

        let mut h_lo = BISECTION_FLOOR;
        let mut h_hi = h;
        while h_hi - h_lo > BISECTION_TOLERANCE {
            let m = (h_lo + h_hi) / 2.0;
            self.advance_from(&s0, m);
            if self.room.any_interpenetrating(&self.particles) {
                h_hi = m;
            } else {
                h_lo = m;
            }
            trace!(h_lo, h_hi, "bisection bracket narrowed");
        }

        let contact_time = h_lo;
        self.advance_from(&s0, contact_time);

        let elastic_collision_factor = self.elastic_collision_factor;
        self.room.apply_impulses(&mut self.particles, elastic_collision_factor);

        contact_time
    }

    /// Drives the simulation forward by `dt` seconds using one or more
    /// substeps, each bounded by [`MAX_SUBSTEP`] (spec.md §4.2).
    #[instrument(level = "trace", skip(self))]
    pub fn update(&mut self, dt: f64) {
        let mut remaining = dt;
        while remaining > MIN_REMAINING {
            let h = remaining.min(MAX_SUBSTEP);
            let advanced = self.single_step(h);
            remaining -= advanced;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec3;

    /// S1 — a free particle with no springs, no drag, travels in a
    /// straight line at constant velocity.
    #[test]
    fn free_particle_travels_in_a_straight_line() {
        let mut system = ParticleSystem::new(Room::new(dvec3(10.0, 5.0, 10.0)));
        system.update_environment_constant(0.0, 1.0);
        system.add_particle(Particle::new(DVec3::ZERO, dvec3(1.0, 0.0, 0.0), 1.0));

        system.update(1.0);

        let p = &system.get_particle_states()[0];
        assert!((p.position.x - 1.0).abs() < 1e-6);
        assert!(p.position.y.abs() < 1e-9);
        assert!(p.position.z.abs() < 1e-9);
    }

    /// T2 — dimension law: stored state has six scalars per particle and
    /// the derivative has the same dimension.
    #[test]
    fn state_dimension_is_six_times_particle_count() {
        let mut system = ParticleSystem::default();
        for _ in 0..4 {
            system.add_particle(Particle::default());
        }
        let state = system.store_state();
        assert_eq!(state.len(), 24);
        let derivative = system.evaluate_derivative(&state, 0.0);
        assert_eq!(derivative.len(), 24);
    }

    /// T1 — storing then re-applying a state round-trips position and
    /// momentum exactly.
    #[test]
    fn state_round_trips() {
        let mut system = ParticleSystem::default();
        system.add_particle(Particle::new(dvec3(1.0, 2.0, 3.0), dvec3(4.0, 5.0, 6.0), 0.5));
        system.add_particle(Particle::new(dvec3(-1.0, 0.0, 2.0), dvec3(0.0, 1.0, 0.0), 1.0));

        let before = system.get_particle_states().to_vec();
        let state = system.store_state();
        system.apply_state(&state);
        let after = system.get_particle_states();

        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.momentum, b.momentum);
        }
    }

    /// T5 — static particles never move from whatever was last pushed via
    /// `set_static_particles`, no matter how many ticks run.
    #[test]
    fn static_particles_are_immune_to_ticking() {
        let mut system = ParticleSystem::new(Room::new(dvec3(10.0, 10.0, 10.0)));
        system.add_particle(Particle::new(dvec3(0.0, 0.0, 0.0), DVec3::ZERO, 1.0));
        system.set_static_particles(vec![StaticParticle::new(dvec3(3.0, 0.0, 0.0), DVec3::ZERO)]);
        system.add_constraint(SpringConstraint::new(
            Endpoint::Dynamic(0),
            Endpoint::Static(0),
            0.0,
            2.0,
            0.5,
        ));

        for _ in 0..20 {
            system.update(0.016);
        }

        assert_eq!(system.get_static_particles()[0].position, dvec3(3.0, 0.0, 0.0));
    }

    /// T6 — after `update` returns, every dynamic particle is within the
    /// bisection tolerance of the room bounds.
    #[test]
    fn containment_after_update() {
        let mut system = ParticleSystem::new(Room::new(dvec3(5.0, 5.0, 5.0)));
        system.update_environment_constant(0.0, 1.0);
        system.add_particle(Particle::new(DVec3::ZERO, dvec3(100.0, 0.0, 0.0), 1.0));

        for _ in 0..200 {
            system.update(0.016);
        }

        let p = &system.get_particle_states()[0];
        assert!(p.position.x.abs() <= 5.0 + BISECTION_TOLERANCE + 1e-6);
    }

    /// S3 — a damped two-particle spring oscillates with decreasing
    /// amplitude while its midpoint stays pinned at the origin.
    #[test]
    fn damped_spring_oscillation_decays_around_its_midpoint() {
        let mut system = ParticleSystem::new(Room::new(dvec3(100.0, 100.0, 100.0)));
        system.update_environment_constant(0.0, 1.0);
        system.add_particle(Particle::new(dvec3(-1.5, 0.0, 0.0), DVec3::ZERO, 1.0));
        system.add_particle(Particle::new(dvec3(1.5, 0.0, 0.0), DVec3::ZERO, 1.0));
        system.add_constraint(SpringConstraint::new(
            Endpoint::Dynamic(0),
            Endpoint::Dynamic(1),
            2.0,
            5.0,
            1.0,
        ));

        let initial_spread = {
            let p = system.get_particle_states();
            (p[1].position - p[0].position).length()
        };

        for _ in 0..300 {
            system.update(0.016);
        }

        let final_spread = {
            let p = system.get_particle_states();
            (p[1].position - p[0].position).length()
        };
        let midpoint = {
            let p = system.get_particle_states();
            (p[0].position + p[1].position) / 2.0
        };

        assert!((final_spread - 2.0).abs() < (initial_spread - 2.0).abs());
        assert!(midpoint.length() < 1e-2);
    }

    /// T7 — with zero external force and positive drag, total kinetic plus
    /// spring-potential energy never increases tick-over-tick (up to a
    /// small allowance for integrator error).
    #[test]
    fn total_energy_is_non_increasing_under_drag() {
        let mut system = ParticleSystem::new(Room::new(dvec3(100.0, 100.0, 100.0)));
        system.update_environment_constant(0.3, 1.0);
        system.add_particle(Particle::new(dvec3(-1.5, 0.0, 0.0), DVec3::ZERO, 1.0));
        system.add_particle(Particle::new(dvec3(1.5, 0.0, 0.0), DVec3::ZERO, 1.0));
        system.add_constraint(SpringConstraint::new(
            Endpoint::Dynamic(0),
            Endpoint::Dynamic(1),
            2.0,
            5.0,
            1.0,
        ));

        let total_energy = |system: &ParticleSystem| {
            let p = system.get_particle_states();
            let kinetic: f64 = p
                .iter()
                .map(|p| 0.5 * (p.momentum.length_squared()) * p.inv_mass)
                .sum();
            let spring: f64 = system
                .constraints()
                .iter()
                .map(|c| {
                    let a = p[0].position;
                    let b = p[1].position;
                    let extension = (b - a).length() - c.rest_length;
                    0.5 * c.spring_constant * extension * extension
                })
                .sum();
            kinetic + spring
        };

        let mut previous = total_energy(&system);
        for _ in 0..200 {
            system.update(0.016);
            let current = total_energy(&system);
            assert!(current <= previous + 1e-9, "energy increased: {previous} -> {current}");
            previous = current;
        }
    }
}
