use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::entity::{BALL, PLAYER};
use shared::{
    EntityId, EntityStore, PlayerIntent, ReplicationTracker, SchemaError, SchemaRegistry,
    VariableUpdate, Vec2, BALL_SIZE, BALL_SPEED, BALL_SPIN, COURT_CENTER, COURT_HEIGHT, COURT_WIDTH,
    PADDLE_HEIGHT, PADDLE_SPEED, PADDLE_WIDTH, PADDLE_X, PLAYER_COUNT,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::physics::{
    ArcadePhysics, BodyDesc, BodyId, BodyKind, IterationBudget, Material, Physics,
};
use crate::timestep::FixedTimestep;

/// Simulation parameters taken from the server configuration.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    /// Fixed increment per tick, in seconds.
    pub step: f32,
    pub serve_angle_jitter: f32,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step: 1.0 / 60.0,
            serve_angle_jitter: 0.0,
            seed: 0,
        }
    }
}

/// Result of one simulation tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Every replicated field written since the previous tick's push.
    pub updates: Vec<VariableUpdate>,
    /// Participant who conceded a goal this tick.
    pub conceded: Option<usize>,
}

/// The authoritative game. Owned by the simulation thread; the command
/// context only reaches it through the intent handles from [`Simulator::intents`].
pub struct Simulator<P: Physics = ArcadePhysics> {
    store: EntityStore,
    ball: EntityId,
    players: [EntityId; PLAYER_COUNT],
    intents: [Arc<PlayerIntent>; PLAYER_COUNT],

    physics: P,
    ball_body: BodyId,
    paddle_bodies: [BodyId; PLAYER_COUNT],
    budget: IterationBudget,

    tracker: ReplicationTracker,
    resync: Arc<AtomicBool>,
    config: SimulationConfig,
    rng: StdRng,
    tick: u64,
    goals_against: [u32; PLAYER_COUNT],
}

impl Simulator<ArcadePhysics> {
    pub fn new(config: SimulationConfig) -> Result<Self, SchemaError> {
        Self::with_physics(config, ArcadePhysics::new(0.0, COURT_HEIGHT))
    }
}

impl<P: Physics> Simulator<P> {
    /// Creates the ball and both players and places their bodies in `physics`.
    pub fn with_physics(config: SimulationConfig, mut physics: P) -> Result<Self, SchemaError> {
        let mut store = EntityStore::new(SchemaRegistry::pong()?);

        let ball = store.create(BALL)?;
        let players = [store.create(PLAYER)?, store.create(PLAYER)?];

        let mut intents = Vec::with_capacity(PLAYER_COUNT);
        let mut paddle_bodies = [0; PLAYER_COUNT];
        for (index, id) in players.iter().enumerate() {
            let player = store
                .player_mut(*id)
                .ok_or(SchemaError::UnknownEntity(id.0))?;
            let start = Vec2::new(PADDLE_X[index], COURT_HEIGHT / 2.0);
            player.position.set(start);
            player.size.set(Vec2::new(PADDLE_WIDTH, PADDLE_HEIGHT));
            intents.push(player.intent_handle());

            paddle_bodies[index] = physics.add_body(BodyDesc {
                kind: BodyKind::Kinematic,
                size: Vec2::new(PADDLE_WIDTH, PADDLE_HEIGHT),
                position: start,
                velocity: Vec2::ZERO,
                angular_velocity: 0.0,
                material: Material::default(),
            });
        }
        let intents: [Arc<PlayerIntent>; PLAYER_COUNT] = intents
            .try_into()
            .map_err(|_| SchemaError::UnknownKind(PLAYER.to_string()))?;

        let serve = Vec2::new(1.0, 0.0);
        let ball_state = store
            .ball_mut(ball)
            .ok_or(SchemaError::UnknownEntity(ball.0))?;
        ball_state.position.set(COURT_CENTER);
        ball_state.size.set(Vec2::new(BALL_SIZE, BALL_SIZE));
        ball_state.direction.set(serve);
        ball_state.rotation.set(0.0);

        let ball_body = physics.add_body(BodyDesc {
            kind: BodyKind::Dynamic,
            size: Vec2::new(BALL_SIZE, BALL_SIZE),
            position: COURT_CENTER,
            velocity: serve.scale(BALL_SPEED),
            angular_velocity: BALL_SPIN,
            material: Material::default(),
        });

        Ok(Self {
            store,
            ball,
            players,
            intents,
            physics,
            ball_body,
            paddle_bodies,
            budget: IterationBudget::default(),
            tracker: ReplicationTracker::new(),
            resync: Arc::new(AtomicBool::new(false)),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            tick: 0,
            goals_against: [0; PLAYER_COUNT],
        })
    }

    /// Intent handles for the command context, indexed by participant identifier.
    pub fn intents(&self) -> [Arc<PlayerIntent>; PLAYER_COUNT] {
        self.intents.clone()
    }

    /// Flag that makes the next push carry every field. Raised when a participant joins.
    pub fn resync_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.resync)
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn ball_id(&self) -> EntityId {
        self.ball
    }

    pub fn player_id(&self, index: usize) -> Option<EntityId> {
        self.players.get(index).copied()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn goals_against(&self) -> [u32; PLAYER_COUNT] {
        self.goals_against
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn ball_body(&self) -> BodyId {
        self.ball_body
    }

    /// Runs one fixed step and returns the replication push for it.
    pub fn tick(&mut self) -> TickReport {
        if self.resync.swap(false, Ordering::AcqRel) {
            self.tracker.invalidate();
        }

        let dt = self.config.step;

        self.physics.step(dt, self.budget);
        self.move_paddles(dt);
        let conceded = self.check_goal();

        let orientation = self.physics.orientation(self.ball_body);
        if let Some(ball) = self.store.ball_mut(self.ball) {
            ball.rotation.set(orientation);
        }

        self.tick += 1;
        TickReport {
            tick: self.tick,
            updates: self.tracker.collect(&self.store),
            conceded,
        }
    }

    fn move_paddles(&mut self, dt: f32) {
        let half = PADDLE_HEIGHT / 2.0;

        for index in 0..PLAYER_COUNT {
            let intent = self.intents[index].snapshot();
            if !intent.moving {
                continue;
            }

            let body = self.paddle_bodies[index];
            let current = self.physics.position(body);
            let y = (current.y + intent.direction.sign() * PADDLE_SPEED * dt)
                .clamp(half, COURT_HEIGHT - half);
            let position = Vec2::new(current.x, y);

            self.physics.set_position(body, position);
            if let Some(player) = self.store.player_mut(self.players[index]) {
                player.position.set(position);
            }
        }
    }

    /// Writes the ball position and heading, resetting the ball to the center
    /// if it left the court.
    fn check_goal(&mut self) -> Option<usize> {
        let position = self.physics.position(self.ball_body);
        let half = BALL_SIZE / 2.0;

        let conceded = if position.x - half <= 0.0 {
            Some(0)
        } else if position.x + half >= COURT_WIDTH {
            Some(1)
        } else {
            None
        };

        let Some(conceded) = conceded else {
            let heading = self.physics.velocity(self.ball_body).normalize();
            if let Some(ball) = self.store.ball_mut(self.ball) {
                ball.position.set(position);
                // Only bounces change the heading; unchanged ticks stay out of the push.
                if ball.direction.get() != heading {
                    ball.direction.set(heading);
                }
            }
            return None;
        };

        self.goals_against[conceded] += 1;
        info!(
            "Goal against player {} (goals against: {:?})",
            conceded, self.goals_against
        );

        let serve = self.serve_direction(conceded);
        self.physics.set_position(self.ball_body, COURT_CENTER);
        self.physics.set_velocity(self.ball_body, serve.scale(BALL_SPEED));

        if let Some(ball) = self.store.ball_mut(self.ball) {
            ball.position.set(COURT_CENTER);
            ball.direction.set(serve);
        }
        Some(conceded)
    }

    /// Unit serve vector toward the participant who conceded.
    fn serve_direction(&mut self, conceded: usize) -> Vec2 {
        let toward = if conceded == 0 { -1.0 } else { 1.0 };
        let jitter = self.config.serve_angle_jitter.abs();
        if jitter == 0.0 {
            return Vec2::new(toward, 0.0);
        }

        let angle: f32 = self.rng.gen_range(-jitter..=jitter);
        Vec2::new(toward * angle.cos(), angle.sin())
    }
}

/// Drives `simulator` at a fixed rate until `stop` is raised.
///
/// Runs on the simulation thread. `push` receives each tick's report right
/// after the tick. The stop flag is checked after every tick and before every
/// sleep, so a stop request finishes the current tick and then returns.
pub fn run_simulation<P, F>(
    mut simulator: Simulator<P>,
    mut clock: FixedTimestep,
    stop: Arc<AtomicBool>,
    mut push: F,
) -> Simulator<P>
where
    P: Physics,
    F: FnMut(TickReport),
{
    info!(
        "Simulation started ({:.1}Hz)",
        1.0 / clock.step_secs().max(f32::EPSILON)
    );

    let mut last = Instant::now();
    'outer: loop {
        let now = Instant::now();
        let steps = clock.advance(now.duration_since(last));
        last = now;

        for _ in 0..steps {
            let report = simulator.tick();
            if report.tick % 60 == 0 {
                debug!(
                    "Tick {}: {} updates pushed",
                    report.tick,
                    report.updates.len()
                );
            }
            push(report);

            if stop.load(Ordering::Acquire) {
                break 'outer;
            }
        }

        if stop.load(Ordering::Acquire) {
            break;
        }
        thread::sleep(clock.until_next_step());
    }

    info!("Simulation stopped after {} ticks", simulator.tick_count());
    simulator
}
