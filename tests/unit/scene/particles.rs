use super::*;
use crate::foundation::core::Canvas;

const ALL_EFFECTS: [ParticleEffect; 11] = [
    ParticleEffect::Rain,
    ParticleEffect::Snow,
    ParticleEffect::Sparkle,
    ParticleEffect::Heart,
    ParticleEffect::Embers,
    ParticleEffect::Fireflies,
    ParticleEffect::Petals,
    ParticleEffect::Dust,
    ParticleEffect::Fog,
    ParticleEffect::Bokeh,
    ParticleEffect::Confetti,
];

fn settings(effect: ParticleEffect, density: f64) -> ParticleSettings {
    ParticleSettings {
        effect,
        density,
        ..ParticleSettings::default()
    }
}

#[test]
fn population_is_floor_of_twice_density() {
    for effect in ALL_EFFECTS {
        for density in [0.0, 1.0, 12.5, 37.7, 50.0] {
            let mut sys = ParticleSystem::new(7);
            sys.reset(&settings(effect, density), 1280.0, 720.0);
            assert_eq!(sys.len(), (density * 2.0).floor() as usize, "{effect:?}");
        }
    }
}

#[test]
fn none_effect_has_no_particles() {
    let mut sys = ParticleSystem::new(1);
    sys.reset(&settings(ParticleEffect::None, 50.0), 1280.0, 720.0);
    assert!(sys.is_empty());
}

#[test]
fn reset_replaces_the_whole_population() {
    let mut sys = ParticleSystem::new(3);
    sys.reset(&settings(ParticleEffect::Snow, 10.0), 100.0, 100.0);
    sys.reset(&settings(ParticleEffect::Confetti, 5.0), 100.0, 100.0);
    assert_eq!(sys.len(), 10);
    assert!(
        sys.particles()
            .iter()
            .all(|p| matches!(p.shape, ParticleShape::Confetti { .. }))
    );
}

#[test]
fn same_seed_same_population() {
    let mut a = ParticleSystem::new(42);
    let mut b = ParticleSystem::new(42);
    a.reset(&settings(ParticleEffect::Bokeh, 20.0), 640.0, 360.0);
    b.reset(&settings(ParticleEffect::Bokeh, 20.0), 640.0, 360.0);
    assert_eq!(a.particles(), b.particles());
}

#[test]
fn falling_particles_respawn_at_top() {
    let mut sys = ParticleSystem::new(5);
    sys.reset(&settings(ParticleEffect::Rain, 1.0), 100.0, 100.0);
    sys.particles[0].y = 99.0;
    sys.particles[0].speed_y = 5.0;
    sys.advance(1.0);
    assert_eq!(sys.particles[0].y, -10.0);
    assert!((0.0..=100.0).contains(&sys.particles[0].x));
}

#[test]
fn embers_rise_and_wrap_to_bottom() {
    let mut sys = ParticleSystem::new(5);
    sys.reset(&settings(ParticleEffect::Embers, 1.0), 100.0, 100.0);
    sys.particles[0].y = -9.0;
    sys.particles[0].speed_y = 2.0;
    sys.advance(1.0);
    assert_eq!(sys.particles[0].y, 110.0);
}

#[test]
fn fog_drifts_and_wraps_from_left() {
    let mut sys = ParticleSystem::new(5);
    sys.reset(&settings(ParticleEffect::Fog, 1.0), 100.0, 100.0);
    let y = sys.particles[0].y;
    sys.particles[0].x = 99.5;
    sys.particles[0].speed_x = 1.0;
    sys.advance(1.0);
    assert_eq!(sys.particles[0].x, -sys.particles[0].size);
    assert_eq!(sys.particles[0].y, y);
}

#[test]
fn drifting_particles_reflect_off_edges() {
    let mut sys = ParticleSystem::new(5);
    sys.reset(&settings(ParticleEffect::Dust, 1.0), 100.0, 100.0);
    sys.particles[0].x = 99.0;
    sys.particles[0].speed_x = 2.0;
    sys.advance(1.0);
    assert_eq!(sys.particles[0].speed_x, -2.0);
}

#[test]
fn delta_scales_movement() {
    let mut sys = ParticleSystem::new(5);
    sys.reset(&settings(ParticleEffect::Snow, 1.0), 1000.0, 1000.0);
    sys.particles[0].y = 10.0;
    sys.particles[0].speed_y = 1.5;
    sys.advance(2.0);
    assert_eq!(sys.particles[0].y, 13.0);
}

#[test]
fn firefly_pulse_reverses_at_bounds() {
    let mut sys = ParticleSystem::new(5);
    sys.reset(&settings(ParticleEffect::Fireflies, 1.0), 100.0, 100.0);
    sys.particles[0].opacity = 0.99;
    sys.particles[0].shape = ParticleShape::Firefly { pulse: 0.05 };
    sys.advance(1.0);
    assert_eq!(sys.particles[0].shape, ParticleShape::Firefly { pulse: -0.05 });
}

#[test]
fn confetti_angle_advances_with_rotation_speed() {
    let mut sys = ParticleSystem::new(5);
    sys.reset(&settings(ParticleEffect::Confetti, 1.0), 100.0, 10_000.0);
    let p = sys.particles[0];
    let ParticleShape::Confetti { rotation_speed, .. } = p.shape else {
        panic!("expected confetti");
    };
    sys.advance(2.0);
    let expected = p.angle + rotation_speed * 0.01 * 2.0;
    assert!((sys.particles[0].angle - expected).abs() < 1e-12);
}

#[test]
fn confetti_hue_uses_the_angle_before_rotation() {
    let mut sys = ParticleSystem::new(9);
    sys.reset(&settings(ParticleEffect::Confetti, 1.0), 100.0, 10_000.0);
    let before = sys.particles[0].angle;
    sys.advance(1.5);
    let p = sys.particles[0];
    let ParticleShape::Confetti {
        hue_angle,
        rotation_speed,
        ..
    } = p.shape
    else {
        panic!("expected confetti");
    };
    assert_eq!(hue_angle, before);
    assert_eq!(p.angle, before + rotation_speed * 0.01 * 1.5);
}

#[test]
fn render_paints_fixed_color_particles() {
    let mut s = Surface::new(Canvas::new(64, 64).unwrap());
    let mut painter = Painter::new();
    let cfg = ParticleSettings {
        opacity: 1.0,
        ..settings(ParticleEffect::Snow, 1.0)
    };
    let mut sys = ParticleSystem::new(9);
    sys.reset(&cfg, 64.0, 64.0);
    for p in &mut sys.particles {
        p.x = 32.0;
        p.y = 32.0;
        p.size = 10.0;
        p.opacity = 1.0;
    }
    sys.render(&mut painter, &mut s, &cfg, 0.0).unwrap();
    assert_eq!(s.pixel(32, 32), [255, 255, 255, 255]);
    assert_eq!(s.pixel(2, 2), [0, 0, 0, 0]);
}

#[test]
fn render_of_glowing_effects_succeeds() {
    for effect in [ParticleEffect::Embers, ParticleEffect::Fireflies, ParticleEffect::Fog] {
        let mut s = Surface::new(Canvas::new(64, 64).unwrap());
        let mut painter = Painter::new();
        let cfg = settings(effect, 5.0);
        let mut sys = ParticleSystem::new(11);
        sys.reset(&cfg, 64.0, 64.0);
        sys.render(&mut painter, &mut s, &cfg, 10.0).unwrap();
    }
}
