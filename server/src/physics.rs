use log::debug;
use shared::Vec2;

/// Index of a body inside a [`Physics`] world.
pub type BodyId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Moved only through `set_position`; never pushed by contacts.
    Kinematic,
    /// Integrated from velocity and forces; bounces off walls and kinematic bodies.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub mass: f32,
    /// Fraction of normal speed kept after a bounce.
    pub restitution: f32,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            mass: 1.0,
            restitution: 1.0,
        }
    }
}

/// Shape, initial placement and material for a new body. Shapes are
/// axis-aligned boxes described by their full size.
#[derive(Debug, Clone, Copy)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub size: Vec2,
    pub position: Vec2,
    pub velocity: Vec2,
    pub angular_velocity: f64,
    pub material: Material,
}

/// Upper bounds on solver work per `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationBudget {
    /// Minimum number of integration substeps.
    pub velocity: u32,
    /// Maximum contact resolution passes per substep.
    pub position: u32,
}

impl Default for IterationBudget {
    fn default() -> Self {
        IterationBudget {
            velocity: 1,
            position: 3,
        }
    }
}

/// The contract the simulator relies on. Solver internals are up to the implementation.
pub trait Physics {
    fn add_body(&mut self, desc: BodyDesc) -> BodyId;
    fn step(&mut self, dt: f32, budget: IterationBudget);
    fn set_position(&mut self, body: BodyId, position: Vec2);
    fn position(&self, body: BodyId) -> Vec2;
    /// Orientation in radians.
    fn orientation(&self, body: BodyId) -> f64;
    fn set_velocity(&mut self, body: BodyId, velocity: Vec2);
    fn velocity(&self, body: BodyId) -> Vec2;
    /// Accumulates a force applied during the next `step` only.
    fn apply_force(&mut self, body: BodyId, force: Vec2);
}

#[derive(Debug, Clone, Copy)]
struct Body {
    desc: BodyDesc,
    position: Vec2,
    velocity: Vec2,
    orientation: f64,
    angular_velocity: f64,
    force: Vec2,
}

impl Body {
    fn half(&self) -> Vec2 {
        self.desc.size.scale(0.5)
    }
}

/// Small box-vs-box world bounded by a floor and a ceiling. The left and
/// right sides are open; leaving through them is a game rule, not a contact.
#[derive(Debug, Clone)]
pub struct ArcadePhysics {
    bodies: Vec<Body>,
    floor: f32,
    ceiling: f32,
}

impl ArcadePhysics {
    pub fn new(floor: f32, ceiling: f32) -> Self {
        ArcadePhysics {
            bodies: Vec::new(),
            floor,
            ceiling,
        }
    }

    /// Substeps needed so no dynamic body moves more than half of the smallest
    /// half-extent in one substep.
    fn required_substeps(&self, dt: f32) -> u32 {
        const SAFETY_FACTOR: f32 = 0.5;

        let min_half = self
            .bodies
            .iter()
            .map(|b| b.half().x.min(b.half().y))
            .fold(f32::MAX, f32::min);
        let max_speed = self
            .bodies
            .iter()
            .filter(|b| b.desc.kind == BodyKind::Dynamic)
            .map(|b| b.velocity.magnitude())
            .fold(0.0, f32::max);

        let max_movement_per_step = min_half * SAFETY_FACTOR;
        let max_movement_this_tick = max_speed * dt;

        if max_movement_per_step > 0.0 && max_movement_this_tick > max_movement_per_step {
            (max_movement_this_tick / max_movement_per_step).ceil() as u32
        } else {
            1
        }
    }

    fn integrate(body: &mut Body, dt: f32) {
        let acceleration = body.force.scale(1.0 / body.desc.material.mass.max(f32::EPSILON));
        body.velocity = body.velocity.add(&acceleration.scale(dt));
        body.position = body.position.add(&body.velocity.scale(dt));
        body.orientation += body.angular_velocity * f64::from(dt);
    }

    fn bounce_walls(&self, body: &mut Body) {
        let half = body.half().y;
        let restitution = body.desc.material.restitution;

        if body.position.y - half < self.floor {
            body.position.y = self.floor + half;
            body.velocity.y = body.velocity.y.abs() * restitution;
        } else if body.position.y + half > self.ceiling {
            body.position.y = self.ceiling - half;
            body.velocity.y = -body.velocity.y.abs() * restitution;
        }
    }

    /// Resolves overlap against one kinematic box along the shallowest axis.
    /// Returns true if a contact was resolved.
    fn resolve_contact(body: &mut Body, other: &Body) -> bool {
        let half = body.half();
        let other_half = other.half();

        let overlap_x = (half.x + other_half.x) - (body.position.x - other.position.x).abs();
        let overlap_y = (half.y + other_half.y) - (body.position.y - other.position.y).abs();

        if overlap_x <= 0.0 || overlap_y <= 0.0 {
            return false;
        }

        let restitution = body.desc.material.restitution;
        if overlap_x < overlap_y {
            if body.position.x < other.position.x {
                body.position.x = other.position.x - other_half.x - half.x;
                body.velocity.x = -body.velocity.x.abs() * restitution;
            } else {
                body.position.x = other.position.x + other_half.x + half.x;
                body.velocity.x = body.velocity.x.abs() * restitution;
            }
            body.angular_velocity = -body.angular_velocity;
        } else if body.position.y < other.position.y {
            body.position.y = other.position.y - other_half.y - half.y;
            body.velocity.y = -body.velocity.y.abs() * restitution;
        } else {
            body.position.y = other.position.y + other_half.y + half.y;
            body.velocity.y = body.velocity.y.abs() * restitution;
        }
        true
    }
}

impl Physics for ArcadePhysics {
    fn add_body(&mut self, desc: BodyDesc) -> BodyId {
        self.bodies.push(Body {
            desc,
            position: desc.position,
            velocity: desc.velocity,
            orientation: 0.0,
            angular_velocity: desc.angular_velocity,
            force: Vec2::ZERO,
        });
        self.bodies.len() - 1
    }

    fn step(&mut self, dt: f32, budget: IterationBudget) {
        let substeps = self.required_substeps(dt).max(budget.velocity).max(1);
        let sub_dt = dt / substeps as f32;

        let kinematic: Vec<Body> = self
            .bodies
            .iter()
            .filter(|b| b.desc.kind == BodyKind::Kinematic)
            .copied()
            .collect();

        for index in 0..self.bodies.len() {
            if self.bodies[index].desc.kind != BodyKind::Dynamic {
                continue;
            }

            let mut body = self.bodies[index];
            for _ in 0..substeps {
                Self::integrate(&mut body, sub_dt);
                for _ in 0..budget.position.max(1) {
                    let mut contact = false;
                    for other in &kinematic {
                        contact |= Self::resolve_contact(&mut body, other);
                    }
                    self.bounce_walls(&mut body);
                    if !contact {
                        break;
                    }
                }
            }
            body.force = Vec2::ZERO;
            self.bodies[index] = body;
        }

        if substeps > 1 {
            debug!("Physics step used {} substeps", substeps);
        }
    }

    fn set_position(&mut self, body: BodyId, position: Vec2) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.position = position;
        }
    }

    fn position(&self, body: BodyId) -> Vec2 {
        self.bodies.get(body).map(|b| b.position).unwrap_or_default()
    }

    fn orientation(&self, body: BodyId) -> f64 {
        self.bodies.get(body).map(|b| b.orientation).unwrap_or_default()
    }

    fn set_velocity(&mut self, body: BodyId, velocity: Vec2) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.velocity = velocity;
        }
    }

    fn velocity(&self, body: BodyId) -> Vec2 {
        self.bodies.get(body).map(|b| b.velocity).unwrap_or_default()
    }

    fn apply_force(&mut self, body: BodyId, force: Vec2) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.force = b.force.add(&force);
        }
    }
}
