//! Damped-spring constraints between two particle endpoints.
//!
//! The force law is lifted directly from
//! `original_source/source/ParticleState.cpp::SpringConstraint::getForce`:
//! a Hookean restoring force plus a damping term proportional to the
//! endpoints' relative velocity projected onto the spring's direction.

use glam::DVec3;
use tracing::trace;

use crate::particle::Endpoint;

/// Below this spring length the direction is undefined; we fall back to
/// `+X` rather than propagate NaN (spec.md §4.2).
const DEGENERATE_LENGTH: f64 = 1e-4;

/// An undirected damped-spring link between two endpoints, each of which
/// may be a dynamic (integrated) or static (kinematic) particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringConstraint {
    pub rest_length: f64,
    pub spring_constant: f64,
    pub attenuation_factor: f64,
    pub endpoint_a: Endpoint,
    pub endpoint_b: Endpoint,
}

impl SpringConstraint {
    pub fn new(
        endpoint_a: Endpoint,
        endpoint_b: Endpoint,
        rest_length: f64,
        spring_constant: f64,
        attenuation_factor: f64,
    ) -> SpringConstraint {
        SpringConstraint {
            rest_length,
            spring_constant,
            attenuation_factor,
            endpoint_a,
            endpoint_b,
        }
    }

    /// True when both endpoints are static — such a constraint is legal
    /// but inert, since neither side can receive an updated force.
    pub fn is_inert(&self) -> bool {
        self.endpoint_a.is_static() && self.endpoint_b.is_static()
    }

    /// True when both endpoints are dynamic, i.e. this is an internal
    /// lattice spring rather than a frame anchor.
    pub fn is_internal(&self) -> bool {
        self.endpoint_a.is_dynamic() && self.endpoint_b.is_dynamic()
    }

    /// Computes the force applied to endpoint A; the force on B is its
    /// exact negation (spec.md §8, T4).
    ///
    /// `pos_a`/`mom_a`/`inv_mass_a` (and the `_b` counterparts) are the
    /// resolved endpoint state, looked up by the caller from either the
    /// dynamic or static particle arrays.
    pub fn force_on_a(
        &self,
        pos_a: DVec3,
        mom_a: DVec3,
        inv_mass_a: f64,
        pos_b: DVec3,
        mom_b: DVec3,
        inv_mass_b: f64,
    ) -> DVec3 {
        let relation = pos_b - pos_a;
        let length = relation.length();
        let direction = if length < DEGENERATE_LENGTH {
            DVec3::X
        } else {
            relation / length
        };

        let relative_velocity_a = inv_mass_a * direction.dot(mom_a);
        let relative_velocity_b = inv_mass_b * direction.dot(mom_b);
        let extension_velocity = relative_velocity_b - relative_velocity_a;

        let signed_force =
            -extension_velocity * self.attenuation_factor - (length - self.rest_length) * self.spring_constant;
        trace!(length, signed_force, "spring force evaluated");

        -direction * signed_force
    }
}
