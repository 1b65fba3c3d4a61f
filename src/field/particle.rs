//! A single particle of the field: a plain data record plus free functions to spawn and advance
//! it. Keeping the behaviour out of the struct makes the maths trivially testable.

use glam::Vec2;
use rand::Rng;

/// The radius of the circular drift around a particle's base position.
pub const ORBIT_AMPLITUDE: f32 = 50.0;

/// The distance within which the pointer repels particles.
pub const POINTER_RADIUS: f32 = 150.0;

/// The fraction of the proportional repulsion force applied per tick.
const REPULSION_RATE: f32 = 0.1;

/// How far a displaced particle moves back towards its orbit per tick, as a fraction of the
/// remaining distance. An exponential decay towards the orbit path.
const EASING_RATE: f32 = 0.1;

/// The opacity gain per tick when the pointer is near, scaled by the repulsion force.
const OPACITY_BOOST: f32 = 0.5;

/// The opacity lost per tick when the pointer is far away.
const OPACITY_DECAY: f32 = 0.01;

/// Opacity never decays below this.
pub const OPACITY_FLOOR: f32 = 0.2;

/// Opacity never rises above this.
pub const OPACITY_CEILING: f32 = 1.0;

/// The extent of the viewport, in pixels.
#[derive(Clone, Copy, Debug)]
#[expect(
    clippy::exhaustive_structs,
    reason = "It's very unlikely that this is going to have any more fields added to it"
)]
pub struct Bounds {
    /// Width of the viewport
    pub width: f32,
    /// Height of the viewport
    pub height: f32,
}

/// A single particle
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Particle {
    /// The currently drawn position.
    pub position: Vec2,
    /// The anchor that the particle orbits around.
    pub base: Vec2,
    /// A directional bias given at spawn. The orbit motion dominates, so it is currently unused,
    /// but it is kept so that spawn distributions stay tunable in one place.
    pub velocity: Vec2,
    /// The current angle of the orbit, in radians. Increases monotonically.
    pub orbit_angle: f32,
    /// The per-particle angular speed, in radians per tick.
    pub orbit_speed: f32,
    /// The drawn radius of the particle's core.
    pub size: f32,
    /// The current opacity, always within `[OPACITY_FLOOR, OPACITY_CEILING]`.
    pub opacity: f32,
    /// A fixed hue in the blue-purple spectrum, in degrees.
    pub hue: f32,
}

/// Spawn a particle at a uniformly random position within the viewport.
pub fn spawn(bounds: Bounds, rng: &mut impl Rng) -> Particle {
    let position = Vec2::new(
        rng.gen_range(0.0..bounds.width),
        rng.gen_range(0.0..bounds.height),
    );

    Particle {
        position,
        base: position,
        velocity: Vec2::new(rng.gen_range(-0.25..0.25), rng.gen_range(-0.25..0.25)),
        orbit_angle: rng.gen_range(0.0..std::f32::consts::TAU),
        orbit_speed: rng.gen_range(0.005..0.03),
        size: rng.gen_range(1.0..3.0),
        opacity: rng.gen_range(OPACITY_FLOOR..OPACITY_CEILING),
        hue: rng.gen_range(200.0..260.0),
    }
}

/// Advance a particle by one tick.
///
/// The orbit target is re-derived from the base position and orbit angle every tick. Without a
/// pointer the particle sits exactly on its orbit, so the motion is fully deterministic. With a
/// pointer nearby the drawn position is pushed away proportionally to how close the pointer is,
/// and otherwise it eases back onto the orbit path.
///
/// If the resulting position leaves the viewport, the offending base coordinate is reseeded to a
/// new random in-bounds value. The position itself is not clamped, it converges back via the
/// orbit and easing terms on later ticks.
pub fn advance(particle: &mut Particle, pointer: Option<Vec2>, bounds: Bounds, rng: &mut impl Rng) {
    particle.orbit_angle += particle.orbit_speed;
    let orbit = particle.base
        + ORBIT_AMPLITUDE * Vec2::new(particle.orbit_angle.cos(), particle.orbit_angle.sin());

    match pointer {
        None => particle.position = orbit,
        Some(pointer) => {
            let offset = particle.position - pointer;
            let distance = offset.length();
            if distance < POINTER_RADIUS {
                let force = (POINTER_RADIUS - distance) / POINTER_RADIUS;
                particle.position += offset * (force * REPULSION_RATE);
                particle.opacity =
                    (particle.opacity + force * OPACITY_BOOST).min(OPACITY_CEILING);
            } else {
                particle.position += (orbit - particle.position) * EASING_RATE;
                particle.opacity = (particle.opacity - OPACITY_DECAY).max(OPACITY_FLOOR);
            }
        }
    }

    if particle.position.x < 0.0 || particle.position.x > bounds.width {
        particle.base.x = rng.gen_range(0.0..bounds.width);
    }
    if particle.position.y < 0.0 || particle.position.y > bounds.height {
        particle.base.y = rng.gen_range(0.0..bounds.height);
    }
}

#[cfg(test)]
#[expect(clippy::default_numeric_fallback, reason = "Tests aren't so strict")]
mod test {
    use super::*;
    use rand::SeedableRng as _;

    fn fixed_particle(base: Vec2) -> Particle {
        Particle {
            position: base,
            base,
            velocity: Vec2::ZERO,
            orbit_angle: 0.0,
            orbit_speed: 0.02,
            size: 1.5,
            opacity: 0.5,
            hue: 220.0,
        }
    }

    #[test]
    fn opacity_stays_clamped() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let bounds = Bounds {
            width: 1000.0,
            height: 1000.0,
        };
        let mut particle = fixed_particle(Vec2::new(500.0, 500.0));

        // The pointer sits right on top of the particle, boosting opacity every tick.
        for _ in 0..100 {
            let pointer = particle.position;
            advance(&mut particle, Some(pointer), bounds, &mut rng);
            assert!(particle.opacity >= OPACITY_FLOOR);
            assert!(particle.opacity <= OPACITY_CEILING);
        }
        assert!((particle.opacity - OPACITY_CEILING).abs() < f32::EPSILON);

        // Now the pointer is far away and opacity decays to the floor.
        for _ in 0..1000 {
            advance(&mut particle, Some(Vec2::new(-2000.0, -2000.0)), bounds, &mut rng);
            assert!(particle.opacity >= OPACITY_FLOOR);
            assert!(particle.opacity <= OPACITY_CEILING);
        }
        assert!((particle.opacity - OPACITY_FLOOR).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_bounds_reseeds_base_not_position() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let bounds = Bounds {
            width: 40.0,
            height: 100.0,
        };
        let mut particle = fixed_particle(Vec2::new(5.0, 5.0));
        // After one advance the orbit angle lands on π, so the orbit term puts the particle at
        // roughly (5 - 50, 5), well outside the left edge.
        particle.orbit_angle = std::f32::consts::PI - particle.orbit_speed;

        advance(&mut particle, None, bounds, &mut rng);

        assert!(particle.position.x < 0.0);
        assert!(particle.base.x >= 0.0);
        assert!(particle.base.x <= bounds.width);
        // Only the x bound was violated, so the y anchor is untouched.
        assert!((particle.base.y - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn repulsion_pushes_directly_away_from_the_pointer() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let bounds = Bounds {
            width: 1000.0,
            height: 1000.0,
        };
        let mut particle = fixed_particle(Vec2::new(500.0, 500.0));
        particle.orbit_speed = 0.0;
        let pointer = Vec2::new(400.0, 500.0);

        let distance_before = (particle.position - pointer).length();
        advance(&mut particle, Some(pointer), bounds, &mut rng);
        let distance_after = (particle.position - pointer).length();

        assert!(distance_after > distance_before);
        // The push is along the pointer-to-particle axis, so y is unchanged.
        assert!((particle.position.y - 500.0).abs() < f32::EPSILON);
    }
}
