//! The particle field simulation: a collection of orbiting, pointer-reactive particles and the
//! faint connective lines between nearby pairs.

use glam::Vec2;
use rand::SeedableRng as _;

use super::particle::{self, Bounds, Particle};

/// The distance below which a pair of particles gets a connection line.
pub const CONNECTION_RADIUS: f32 = 120.0;

/// The alpha of a connection line at zero distance. Falls off linearly to 0 at the radius.
const CONNECTION_MAX_ALPHA: f32 = 0.3;

/// A line segment between 2 nearby particles.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct Connection {
    /// One endpoint.
    pub from: Vec2,
    /// The other endpoint.
    pub to: Vec2,
    /// The hue of the line, the midpoint of the 2 particles' hues.
    pub hue: f32,
    /// The opacity of the line.
    pub alpha: f32,
}

/// `Simulation`
#[non_exhaustive]
pub struct Simulation {
    /// Width of the viewport in pixels.
    pub width: f32,
    /// Height of the viewport in pixels.
    pub height: f32,
    /// Whether particles react to the pointer at all.
    pub interactive: bool,
    /// The most recent pointer sample, if any has arrived yet.
    pub pointer: Option<Vec2>,
    /// All the particles. The length always equals the configured density.
    pub particles: Vec<Particle>,
    /// The simulation's own source of randomness, seedable for reproducible fields.
    rng: rand::rngs::StdRng,
}

impl Simulation {
    /// Instantiate. The simulation stays empty until the first `resize()` with a non-zero
    /// viewport.
    #[must_use]
    pub fn new(interactive: bool, maybe_seed: Option<u64>) -> Self {
        let rng = match maybe_seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_entropy(),
        };

        Self {
            width: 0.0,
            height: 0.0,
            interactive,
            pointer: None,
            particles: Vec::default(),
            rng,
        }
    }

    /// The current viewport extent.
    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        Bounds {
            width: self.width,
            height: self.height,
        }
    }

    /// Whether the simulation has a viewport and particles to advance.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && !self.particles.is_empty()
    }

    /// Update the stored viewport dimensions and rebuild the particle collection to match.
    /// A zero-sized viewport, as seen during a layout thrash, empties the field instead.
    pub fn resize(&mut self, width: f32, height: f32, density: usize) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        self.initialize(density);
    }

    /// Update the stored pointer coordinate. The coordinate is unconstrained, it may transiently
    /// sit outside the viewport during a drag out.
    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer = Some(Vec2::new(x, y));
    }

    /// (Re)populate the field with `density` particles at uniformly random positions. The old
    /// collection is discarded wholesale, so repeated calls never leak particles. On a zero-sized
    /// viewport there is nowhere to spawn anything, so the field is left empty instead.
    pub fn initialize(&mut self, density: usize) {
        if self.width <= 0.0 || self.height <= 0.0 {
            self.particles.clear();
            return;
        }

        let bounds = self.bounds();
        self.particles = (0..density)
            .map(|_| particle::spawn(bounds, &mut self.rng))
            .collect();
    }

    /// Advance every particle by one tick, in index order.
    pub fn tick(&mut self) {
        let pointer = if self.interactive { self.pointer } else { None };
        let bounds = self.bounds();

        for particle in &mut self.particles {
            particle::advance(particle, pointer, bounds, &mut self.rng);
        }
    }

    /// Collect the connection lines for the current particle positions: one line per unordered
    /// pair closer than `CONNECTION_RADIUS`, with alpha falling off linearly with distance.
    /// Each line takes the midpoint of its endpoints' hues, so it reads as a blend of the 2
    /// particles it joins rather than a third, unrelated colour.
    ///
    /// This is an O(n²) pass, which is fine for the tens of particles the field is configured
    /// with, but it is the reason `density` should stay small.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        let mut connections = Vec::new();

        for (index, left) in self.particles.iter().enumerate() {
            for right in self.particles.iter().skip(index + 1) {
                let distance = (left.position - right.position).length();
                if distance < CONNECTION_RADIUS {
                    connections.push(Connection {
                        from: left.position,
                        to: right.position,
                        hue: (left.hue + right.hue) / 2.0,
                        alpha: (CONNECTION_RADIUS - distance) / CONNECTION_RADIUS
                            * CONNECTION_MAX_ALPHA,
                    });
                }
            }
        }

        connections
    }

    /// Replace the field with hand-built particles. Only used by tests that need exact control
    /// over starting conditions.
    #[cfg(test)]
    pub fn set_particles(&mut self, particles: Vec<Particle>) {
        self.particles = particles;
    }
}

#[cfg(test)]
#[expect(
    clippy::default_numeric_fallback,
    clippy::indexing_slicing,
    clippy::unwrap_used,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;
    use crate::field::particle::{OPACITY_CEILING, OPACITY_FLOOR, ORBIT_AMPLITUDE};

    fn placed_particle(position: Vec2, orbit_speed: f32) -> Particle {
        Particle {
            position,
            base: position,
            velocity: Vec2::ZERO,
            orbit_angle: 0.0,
            orbit_speed,
            size: 1.5,
            opacity: 0.5,
            hue: 220.0,
        }
    }

    #[test]
    fn initialize_places_every_base_within_bounds() {
        let mut simulation = Simulation::new(true, Some(7));
        simulation.resize(200.0, 100.0, 50);

        assert_eq!(simulation.particles.len(), 50);
        for particle in &simulation.particles {
            assert!(particle.base.x >= 0.0 && particle.base.x <= 200.0);
            assert!(particle.base.y >= 0.0 && particle.base.y <= 100.0);
        }
    }

    #[test]
    fn reinitialize_replaces_the_collection_wholesale() {
        let mut simulation = Simulation::new(true, Some(7));
        simulation.resize(200.0, 100.0, 50);
        simulation.initialize(50);
        assert_eq!(simulation.particles.len(), 50);
        simulation.initialize(50);
        assert_eq!(simulation.particles.len(), 50);
    }

    #[test]
    fn zero_sized_viewport_empties_the_field() {
        let mut simulation = Simulation::new(true, Some(7));
        simulation.resize(200.0, 100.0, 50);
        simulation.resize(0.0, 100.0, 50);
        assert!(simulation.particles.is_empty());
        assert!(!simulation.is_ready());
    }

    #[test]
    fn initialize_on_a_zero_viewport_leaves_the_field_empty() {
        // A fresh simulation has no viewport yet, so there's no range to sample positions from.
        let mut simulation = Simulation::new(true, Some(7));
        simulation.initialize(50);
        assert!(simulation.particles.is_empty());
        assert!(!simulation.is_ready());

        simulation.resize(200.0, 0.0, 50);
        simulation.initialize(50);
        assert!(simulation.particles.is_empty());
    }

    #[test]
    fn orbit_is_exactly_deterministic_without_interaction() {
        let mut simulation = Simulation::new(false, Some(7));
        simulation.resize(1000.0, 1000.0, 1);
        let base = Vec2::new(500.0, 500.0);
        let orbit_speed = 0.02;
        simulation.set_particles(vec![placed_particle(base, orbit_speed)]);
        // A pointer sample arriving must make no difference when interaction is off.
        simulation.set_pointer(500.0, 500.0);

        let ticks = 25;
        for _ in 0..ticks {
            simulation.tick();
        }

        // Accumulate the angle with the same repeated addition the simulation uses, so the
        // expectation is bit-for-bit identical.
        let mut angle = 0.0f32;
        for _ in 0..ticks {
            angle += orbit_speed;
        }
        let expected = base + ORBIT_AMPLITUDE * Vec2::new(angle.cos(), angle.sin());
        assert_eq!(simulation.particles[0].position, expected);
    }

    #[test]
    fn connections_are_symmetric_and_duplicate_free() {
        let positions = [
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(50.0, 80.0),
            Vec2::new(500.0, 500.0),
        ];

        let pair_set = |particles: Vec<Particle>| {
            let mut simulation = Simulation::new(false, Some(7));
            simulation.width = 1000.0;
            simulation.height = 1000.0;
            simulation.set_particles(particles);
            let mut pairs: Vec<_> = simulation
                .connections()
                .iter()
                .map(|connection| {
                    let mut endpoints = [connection.from.to_array(), connection.to.to_array()];
                    endpoints.sort_by(|left, right| left.partial_cmp(right).unwrap());
                    endpoints
                })
                .collect();
            pairs.sort_by(|left, right| left.partial_cmp(right).unwrap());
            pairs
        };

        let forwards = pair_set(
            positions
                .iter()
                .map(|position| placed_particle(*position, 0.02))
                .collect(),
        );
        let backwards = pair_set(
            positions
                .iter()
                .rev()
                .map(|position| placed_particle(*position, 0.02))
                .collect(),
        );

        assert_eq!(forwards, backwards);
        // The far-away fourth particle connects to nothing, the close trio fully connects.
        assert_eq!(forwards.len(), 3);
        // No unordered pair appears twice.
        let mut deduplicated = forwards.clone();
        deduplicated.dedup();
        assert_eq!(deduplicated, forwards);
    }

    #[test]
    fn connection_alpha_falls_off_linearly() {
        let mut simulation = Simulation::new(false, Some(7));
        simulation.width = 1000.0;
        simulation.height = 1000.0;
        simulation.set_particles(vec![
            placed_particle(Vec2::new(0.0, 0.0), 0.02),
            placed_particle(Vec2::new(60.0, 0.0), 0.02),
        ]);

        let connections = simulation.connections();
        assert_eq!(connections.len(), 1);
        let expected = (CONNECTION_RADIUS - 60.0) / CONNECTION_RADIUS * 0.3;
        assert!((connections[0].alpha - expected).abs() < f32::EPSILON);
    }

    #[test]
    fn non_interactive_field_stays_near_its_orbits() {
        let mut simulation = Simulation::new(false, Some(7));
        simulation.resize(100.0, 100.0, 3);
        assert_eq!(simulation.particles.len(), 3);

        for _ in 0..10 {
            simulation.tick();
        }

        for particle in &simulation.particles {
            // The base anchor is always in bounds, even after a reseed, and the drawn position
            // sits on the orbit ring around it, so the whole field stays within an orbit radius
            // of the viewport.
            assert!(particle.base.x >= 0.0 && particle.base.x <= 100.0);
            assert!(particle.base.y >= 0.0 && particle.base.y <= 100.0);
            assert!(particle.position.x >= -ORBIT_AMPLITUDE);
            assert!(particle.position.x <= 100.0 + ORBIT_AMPLITUDE);
            assert!(particle.position.y >= -ORBIT_AMPLITUDE);
            assert!(particle.position.y <= 100.0 + ORBIT_AMPLITUDE);
            assert!(particle.opacity >= OPACITY_FLOOR && particle.opacity <= OPACITY_CEILING);
        }
    }
}
