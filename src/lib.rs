//! Physics core of an interactive soft-body cube simulator: a 4x4x4
//! lattice of point masses connected by damped springs, anchored to an
//! orientable control frame, integrated with a fixed-step RK4 solver and
//! confined to a rectangular room via bisection-bracketed wall collision.
//!
//! The renderer, GUI, camera, window system, and main frame loop are
//! deliberately out of scope; this crate exposes particle positions and
//! frame corners through plain getters and takes no dependency on a
//! graphics or windowing stack.

pub mod collision;
pub mod constraint;
pub mod control_frame;
pub mod integrator;
pub mod particle;
pub mod particle_system;
pub mod soft_box;

pub use collision::Room;
pub use constraint::SpringConstraint;
pub use control_frame::ControlFrame;
pub use integrator::Rk4Integrator;
pub use particle::{Endpoint, Particle, StaticParticle};
pub use particle_system::ParticleSystem;
pub use soft_box::{Aabb, LatticeSize, SoftBox, SoftBoxConfig};
