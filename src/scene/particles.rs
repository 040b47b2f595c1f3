use std::f64::consts::TAU;

use tracing::debug;

use crate::foundation::color::{Rgb, hsl};
use crate::foundation::core::{Affine, Point, Rect};
use crate::foundation::error::StudioResult;
use crate::render::composite::BlendMode;
use crate::render::gradient::{Gradient, GradientStop, fill_gradient};
use crate::render::{Painter, Surface};
use crate::settings::visual::{ColorMode, ParticleEffect, ParticleSettings};

/// Confetti palette: red, green, blue, yellow, cyan, magenta.
const CONFETTI_COLORS: [Rgb; 6] = [
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 0, 255),
];
const PETAL_PINK: Rgb = Rgb::new(0xff, 0xb7, 0xc5);
const FIREFLY_GREEN: Rgb = Rgb::new(0xcc, 0xff, 0x00);
const EMBER_ORANGE: Rgb = Rgb::new(0xff, 0x45, 0x00);
const FOG_GRAY: Rgb = Rgb::new(200, 200, 200);

const FIREFLY_GLOW: f64 = 5.0;
const EMBER_GLOW: f64 = 10.0;
/// Row a falling particle respawns at after leaving the bottom edge.
const RESPAWN_TOP: f64 = -10.0;

/// Kind-specific particle state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParticleShape {
    /// Rain, embers, sparkle and heart: straight movement with an unused wobble phase.
    Plain {
        /// Phase in radians.
        wobble: f64,
    },
    /// Snowflake.
    Flake,
    /// Rotating ellipse.
    Petal {
        /// Angle change per tick unit, scaled by 0.01.
        rotation_speed: f64,
    },
    /// Rotating rectangle with a fixed palette color.
    Confetti {
        /// Angle change per tick unit, scaled by 0.01.
        rotation_speed: f64,
        /// Palette color used in fixed color mode.
        color: Rgb,
        /// Angle the rainbow hue is keyed on; trails `angle` by one advance.
        hue_angle: f64,
    },
    /// Large radial blob.
    Fog,
    /// Pulsing dot.
    Firefly {
        /// Opacity change per tick unit; flips sign at the bounds.
        pulse: f64,
    },
    /// Tiny point.
    Dust,
    /// Large soft circle.
    Bokeh,
}

/// One simulated particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    /// Horizontal position in pixels.
    pub x: f64,
    /// Vertical position in pixels.
    pub y: f64,
    /// Horizontal velocity per tick unit.
    pub speed_x: f64,
    /// Vertical velocity per tick unit.
    pub speed_y: f64,
    /// Radius-like size in pixels.
    pub size: f64,
    /// Per-particle opacity, multiplied by the layer opacity when drawn.
    pub opacity: f64,
    /// Rotation in radians.
    pub angle: f64,
    /// Kind-specific state.
    pub shape: ParticleShape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Motion {
    /// Fall and respawn at the top.
    Fall,
    /// Rise and respawn at the bottom.
    Rise,
    /// Horizontal drift wrapping from the left edge.
    Drift,
    /// Free movement reflecting off all edges.
    Bounce,
}

fn motion_for(effect: ParticleEffect) -> Motion {
    match effect {
        ParticleEffect::Rain
        | ParticleEffect::Snow
        | ParticleEffect::Petals
        | ParticleEffect::Confetti => Motion::Fall,
        ParticleEffect::Embers => Motion::Rise,
        ParticleEffect::Fog => Motion::Drift,
        ParticleEffect::None
        | ParticleEffect::Sparkle
        | ParticleEffect::Heart
        | ParticleEffect::Fireflies
        | ParticleEffect::Dust
        | ParticleEffect::Bokeh => Motion::Bounce,
    }
}

/// Population of particles for the active effect.
#[derive(Debug)]
pub struct ParticleSystem {
    effect: ParticleEffect,
    particles: Vec<Particle>,
    rng: fastrand::Rng,
    width: f64,
    height: f64,
}

impl ParticleSystem {
    /// Empty system; `seed` makes every reseed reproducible.
    pub fn new(seed: u64) -> Self {
        Self {
            effect: ParticleEffect::None,
            particles: Vec::new(),
            rng: fastrand::Rng::with_seed(seed),
            width: 0.0,
            height: 0.0,
        }
    }

    /// Active effect.
    pub fn effect(&self) -> ParticleEffect {
        self.effect
    }

    /// Current population.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Population size.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether there are no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Discard the population and seed `floor(density * 2)` new particles.
    pub fn reset(&mut self, settings: &ParticleSettings, width: f64, height: f64) {
        self.effect = settings.effect;
        self.width = width;
        self.height = height;
        self.particles.clear();
        if settings.effect == ParticleEffect::None {
            debug!("particles cleared");
            return;
        }

        let count = (settings.density * 2.0).floor().max(0.0) as usize;
        self.particles.reserve(count);
        for _ in 0..count {
            let p = self.seed_one(settings);
            self.particles.push(p);
        }
        debug!(effect = ?settings.effect, count, "particles reseeded");
    }

    fn rand(&mut self) -> f64 {
        f64::from(self.rng.f32())
    }

    fn seed_one(&mut self, s: &ParticleSettings) -> Particle {
        let mut p = Particle {
            x: self.rand() * self.width,
            y: self.rand() * self.height,
            size: (self.rand() * 5.0 + 2.0) * (s.size / 2.0),
            opacity: self.rand() * s.opacity,
            angle: self.rand() * TAU,
            speed_x: 0.0,
            speed_y: 0.0,
            shape: ParticleShape::Flake,
        };
        let speed = s.speed;
        match s.effect {
            ParticleEffect::Snow => {
                p.speed_y = (self.rand() * 2.0 + 1.0) * speed;
                p.speed_x = (self.rand() - 0.5) * 0.5;
            }
            ParticleEffect::Fog => {
                p.speed_x = (self.rand() * 0.5 + 0.1) * speed;
                p.size *= 20.0;
                p.opacity *= 0.3;
                p.shape = ParticleShape::Fog;
            }
            ParticleEffect::Petals => {
                p.speed_y = (self.rand() * 1.5 + 0.5) * speed;
                p.speed_x = (self.rand() - 0.5) * 1.5;
                // The initial rotation draw only advances the generator.
                let _ = self.rand();
                p.shape = ParticleShape::Petal {
                    rotation_speed: (self.rand() - 0.5) * 2.0,
                };
            }
            ParticleEffect::Fireflies => {
                p.speed_x = (self.rand() - 0.5) * speed;
                p.speed_y = (self.rand() - 0.5) * speed;
                p.opacity = self.rand();
                p.shape = ParticleShape::Firefly { pulse: 0.05 };
            }
            ParticleEffect::Dust => {
                p.speed_x = (self.rand() - 0.5) * 0.5 * speed;
                p.speed_y = (self.rand() - 0.5) * 0.5 * speed;
                p.size = self.rand() * 2.0;
                p.shape = ParticleShape::Dust;
            }
            ParticleEffect::Bokeh => {
                p.speed_x = (self.rand() - 0.5) * 0.2 * speed;
                p.speed_y = (self.rand() - 0.5) * 0.2 * speed;
                p.size = self.rand() * 30.0 + 10.0;
                p.opacity = self.rand() * 0.3;
                p.shape = ParticleShape::Bokeh;
            }
            ParticleEffect::Confetti => {
                p.speed_y = (self.rand() * 3.0 + 2.0) * speed;
                p.speed_x = (self.rand() - 0.5) * 2.0;
                let _ = self.rand();
                let rotation_speed = (self.rand() - 0.5) * 5.0;
                let color = CONFETTI_COLORS[self.rng.usize(..CONFETTI_COLORS.len())];
                p.shape = ParticleShape::Confetti {
                    rotation_speed,
                    color,
                    hue_angle: p.angle,
                };
            }
            ParticleEffect::None
            | ParticleEffect::Rain
            | ParticleEffect::Sparkle
            | ParticleEffect::Heart
            | ParticleEffect::Embers => {
                p.speed_y = (self.rand() * 2.0 + 0.5) * speed;
                p.shape = ParticleShape::Plain {
                    wobble: self.rand() * TAU,
                };
            }
        }
        p
    }

    /// Move every particle by one tick scaled by `delta`.
    pub fn advance(&mut self, delta: f64) {
        let (w, h) = (self.width, self.height);
        let motion = motion_for(self.effect);
        for i in 0..self.particles.len() {
            let p = &mut self.particles[i];
            let mut respawn = false;
            match motion {
                Motion::Fall => {
                    p.y += p.speed_y * delta;
                    p.x += p.speed_x * delta;
                    if p.y > h {
                        p.y = RESPAWN_TOP;
                        respawn = true;
                    }
                }
                Motion::Rise => {
                    p.y -= p.speed_y * delta;
                    if p.y < RESPAWN_TOP {
                        p.y = h + 10.0;
                        respawn = true;
                    }
                }
                Motion::Drift => {
                    p.x += p.speed_x * delta;
                    if p.x > w {
                        p.x = -p.size;
                    }
                }
                Motion::Bounce => {
                    p.x += p.speed_x * delta;
                    p.y += p.speed_y * delta;
                    if p.x < 0.0 || p.x > w {
                        p.speed_x = -p.speed_x;
                    }
                    if p.y < 0.0 || p.y > h {
                        p.speed_y = -p.speed_y;
                    }
                }
            }

            match &mut p.shape {
                ParticleShape::Petal { rotation_speed } => {
                    p.angle += *rotation_speed * 0.01 * delta;
                }
                ParticleShape::Confetti {
                    rotation_speed,
                    hue_angle,
                    ..
                } => {
                    *hue_angle = p.angle;
                    p.angle += *rotation_speed * 0.01 * delta;
                }
                ParticleShape::Firefly { pulse } => {
                    p.opacity += *pulse * delta;
                    if p.opacity > 1.0 || p.opacity < 0.2 {
                        *pulse = -*pulse;
                    }
                }
                _ => {}
            }

            if respawn {
                let x = self.rand() * w;
                self.particles[i].x = x;
            }
        }
    }

    /// Paint the population. Glowing kinds get an analytic halo beneath their cores.
    pub fn render(
        &self,
        painter: &mut Painter,
        surface: &mut Surface,
        settings: &ParticleSettings,
        color_cycle: f64,
    ) -> StudioResult<()> {
        if self.effect == ParticleEffect::None || self.particles.is_empty() {
            return Ok(());
        }
        let base = match settings.color_mode {
            ColorMode::Rainbow => hsl(color_cycle % 360.0, 1.0, 0.7),
            ColorMode::Fixed => settings.color,
        };
        let default_white = settings.color_mode == ColorMode::Fixed && settings.color == Rgb::WHITE;
        let layer_opacity = settings.opacity;

        match self.effect {
            ParticleEffect::Fog => {
                for p in &self.particles {
                    let g = Gradient::radial(
                        Point::new(p.x, p.y),
                        0.0,
                        p.size,
                        [
                            GradientStop::new(0.0, FOG_GRAY, (0.4 * layer_opacity) as f32),
                            GradientStop::new(1.0, Rgb::WHITE, 0.0),
                        ],
                    );
                    let rect = Rect::new(p.x - p.size, p.y - p.size, p.x + p.size, p.y + p.size);
                    let alpha = (p.opacity * layer_opacity).clamp(0.0, 1.0) as f32;
                    fill_gradient(surface, &g, rect, Affine::IDENTITY, alpha, BlendMode::Normal)?;
                }
                return Ok(());
            }
            ParticleEffect::Fireflies => {
                let color = if default_white { FIREFLY_GREEN } else { base };
                for p in &self.particles {
                    let a = (p.opacity * layer_opacity).clamp(0.0, 1.0);
                    glow(surface, p, p.size, FIREFLY_GLOW, color, a)?;
                }
            }
            ParticleEffect::Embers => {
                let color = if default_white { EMBER_ORANGE } else { base };
                for p in &self.particles {
                    let a = (p.opacity * layer_opacity).clamp(0.0, 1.0);
                    glow(surface, p, p.size, EMBER_GLOW, color, a)?;
                }
            }
            _ => {}
        }

        let effect = self.effect;
        painter.layer(surface, BlendMode::Normal, 1.0, |shapes| {
            for p in &self.particles {
                let alpha = p.opacity * layer_opacity;
                let center = Point::new(p.x, p.y);
                match (effect, p.shape) {
                    (_, ParticleShape::Confetti { color, hue_angle, .. }) => {
                        let fill = match settings.color_mode {
                            ColorMode::Rainbow => {
                                hsl((hue_angle * 57.0 + color_cycle) % 360.0, 1.0, 0.5)
                            }
                            ColorMode::Fixed => color,
                        };
                        shapes.set_color(fill, alpha);
                        shapes.set_transform(
                            Affine::translate((p.x, p.y)) * Affine::rotate(p.angle),
                        );
                        let s = p.size;
                        shapes.fill_rect(Rect::new(
                            -s / 2.0,
                            -s / 2.0,
                            s / 2.0,
                            -s / 2.0 + s * 0.6,
                        ));
                        shapes.reset_transform();
                    }
                    (_, ParticleShape::Petal { .. }) => {
                        let fill = if default_white { PETAL_PINK } else { base };
                        shapes.set_color(fill, alpha);
                        shapes.set_transform(
                            Affine::translate((p.x, p.y)) * Affine::rotate(p.angle),
                        );
                        shapes.fill_ellipse(Point::ZERO, p.size, p.size / 2.0);
                        shapes.reset_transform();
                    }
                    (_, ParticleShape::Firefly { .. }) => {
                        let fill = if default_white { FIREFLY_GREEN } else { base };
                        let a = (p.opacity * layer_opacity).clamp(0.0, 1.0);
                        shapes.set_color(fill, a);
                        // Two passes over the core.
                        shapes.fill_circle(center, p.size);
                        shapes.fill_circle(center, p.size);
                    }
                    (ParticleEffect::Rain, _) => {
                        shapes.set_color(base, alpha);
                        shapes.fill_rect(Rect::new(p.x, p.y, p.x + 1.0, p.y + p.size * 5.0));
                    }
                    (_, ParticleShape::Flake) => {
                        shapes.set_color(base, alpha);
                        shapes.fill_circle(center, p.size / 2.0);
                    }
                    (ParticleEffect::Embers, _) => {
                        let fill = if default_white { EMBER_ORANGE } else { base };
                        shapes.set_color(fill, alpha);
                        shapes.fill_circle(center, p.size);
                    }
                    _ => {
                        shapes.set_color(base, alpha);
                        shapes.fill_circle(center, p.size);
                    }
                }
            }
            Ok(())
        })
    }
}

/// Soft halo approximating a canvas shadow of `blur` pixels around a disc of `radius`.
fn glow(
    surface: &mut Surface,
    p: &Particle,
    radius: f64,
    blur: f64,
    color: Rgb,
    alpha: f64,
) -> StudioResult<()> {
    if alpha <= 0.0 || radius <= 0.0 {
        return Ok(());
    }
    let outer = radius + blur;
    let inner = (radius / outer) as f32;
    let g = Gradient::radial(
        Point::new(p.x, p.y),
        0.0,
        outer,
        [
            GradientStop::new(0.0, color, alpha as f32),
            GradientStop::new(inner, color, (alpha * 0.6) as f32),
            GradientStop::new(1.0, color, 0.0),
        ],
    );
    let rect = Rect::new(p.x - outer, p.y - outer, p.x + outer, p.y + outer);
    fill_gradient(surface, &g, rect, Affine::IDENTITY, 1.0, BlendMode::Normal)
}

#[cfg(test)]
#[path = "../../tests/unit/scene/particles.rs"]
mod tests;
