use shared::{DEFAULT_PORT, DEFAULT_TICK_RATE};
use std::time::Duration;

/// Startup configuration for a simulator process.
///
/// The participant capacity is not part of it: it is fixed at
/// [`shared::PLAYER_COUNT`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the UDP socket binds to. Port 0 picks a free port.
    pub bind_addr: String,
    /// Simulation steps per second.
    pub tick_rate: u32,
    /// Clients silent for longer than this are disconnected.
    pub client_timeout: Duration,
    /// Largest wall-clock frame the timestep accumulator accepts at once.
    pub max_frame_time: Duration,
    /// Half-width, in radians, of the random serve angle after a goal.
    pub serve_angle_jitter: f32,
    pub seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            tick_rate: DEFAULT_TICK_RATE,
            client_timeout: Duration::from_secs(5),
            max_frame_time: Duration::from_millis(250),
            serve_angle_jitter: 0.35,
            seed: 0,
        }
    }
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}
