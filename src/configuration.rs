//! Config for the trainer behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive: set them to `"true"` to enable them.
//! Numbers that do not parse are ignored with a warning and the default is kept.
//!
//! - `HFO_SERVER_HOST`, `HFO_SERVER_PORT`, `HFO_COACH_PORT`: where the simulator listens
//!   (default: `127.0.0.1`, `6000`, `6001`)
//! - `HFO_OFFENSE_AGENTS`, `HFO_OFFENSE_NPCS`, `HFO_DEFENSE_AGENTS`, `HFO_DEFENSE_NPCS`: squad
//!   composition (default: `0`, `1`, `0`, `0`)
//! - `HFO_OFFENSE_TEAM`, `HFO_DEFENSE_TEAM`: team names (default: `base_left`, `base_right`)
//! - `HFO_MAX_TRIALS`, `HFO_MAX_FRAMES`, `HFO_MAX_FRAMES_PER_TRIAL`: budgets, non-positive
//!   means unlimited (default: `-1`)
//! - `HFO_SEED`: seed of the placement generator (default: random)
//! - `HFO_AGENT_BASE_PORT`: first port handed to agents (default: `7000`)
//! - `HFO_AGENT_ON_BALL`: place the first offense agent on the ball (default: `false`)
//! - `HFO_NPC_BINARY`, `HFO_AGENT_BINARY`, `HFO_FORMATION_DIR`, `HFO_PLAYER_CONFIG`,
//!   `HFO_LOG_DIR`, `HFO_LIB_DIR`: paths used to launch players
//! - `HFO_RECORD`: ask players to record their games (default: `false`)
//! - `HFO_VERBOSE`: print progress to stdout (default: `true`)
//! - `HFO_LOG`: enable logging to a file (default: `false`)
//! - `HFO_DEBUG_PLAYER_STDERR`: let players print to stderr (default: `false`)
//! - `HFO_HANDSHAKE_RETRIES`: retries for the `(init ok)` reply, negative means forever
//!   (default: `5`)
//! - `HFO_CONNECT_TIMEOUT_SECS`: how long a launched player may take to show up on the field
//!   (default: `30`)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{ensure, Result};
use tracing::warn;

use crate::geometry::PlayableArea;
use crate::link::LinkTimings;
use crate::roster::TEAM_SIZE;
use crate::supervisor::LaunchSpec;
use crate::trial::TrialLimits;

/// Configuration for trainer behaviors.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub(crate) server_host: String,
    pub(crate) server_port: u16,
    pub(crate) coach_port: u16,
    pub(crate) offense_agents: usize,
    pub(crate) offense_npcs: usize,
    pub(crate) defense_agents: usize,
    pub(crate) defense_npcs: usize,
    pub(crate) offense_team_name: String,
    pub(crate) defense_team_name: String,
    pub(crate) max_trials: Option<u32>,
    pub(crate) max_frames: Option<u64>,
    pub(crate) max_frames_per_trial: Option<u32>,
    pub(crate) seed: Option<u64>,
    pub(crate) agent_base_port: u16,
    pub(crate) agent_on_ball: bool,
    pub(crate) playable_area: PlayableArea,
    pub(crate) npc_binary: PathBuf,
    pub(crate) agent_binary: PathBuf,
    pub(crate) formation_dir: PathBuf,
    pub(crate) player_config: PathBuf,
    pub(crate) log_dir: PathBuf,
    pub(crate) lib_dir: Option<PathBuf>,
    pub(crate) record: bool,
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) debug_player_stderr: bool,
    pub(crate) receive_timeout: Duration,
    pub(crate) retry_pause: Duration,
    pub(crate) handshake_retries: Option<u32>,
    pub(crate) connect_retries: u32,
    pub(crate) connect_timeout: Duration,
    pub(crate) ready_retries: u32,
    pub(crate) kill_grace: Duration,
}

fn positive<T: TryFrom<i64>>(value: i64) -> Option<T> {
    if value > 0 {
        T::try_from(value).ok()
    } else {
        None
    }
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default one scripted attacker plays against an empty defense on a local server,
    /// without any budget, and progress is printed to stdout.
    pub fn new() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 6000,
            coach_port: 6001,
            offense_agents: 0,
            offense_npcs: 1,
            defense_agents: 0,
            defense_npcs: 0,
            offense_team_name: "base_left".to_string(),
            defense_team_name: "base_right".to_string(),
            max_trials: None,
            max_frames: None,
            max_frames_per_trial: None,
            seed: None,
            agent_base_port: 7000,
            agent_on_ball: false,
            playable_area: PlayableArea::HALF_FIELD,
            npc_binary: PathBuf::from("bin/teams/base/player/sample_player"),
            agent_binary: PathBuf::from("bin/teams/base/player/agent"),
            formation_dir: PathBuf::from("bin/teams/base/config/formations-dt"),
            player_config: PathBuf::from("bin/teams/base/config/player.conf"),
            log_dir: PathBuf::from("log"),
            lib_dir: None,
            record: false,
            verbose: true,
            log: false,
            debug_player_stderr: false,
            receive_timeout: Duration::from_secs(5),
            retry_pause: Duration::from_millis(300),
            handshake_retries: Some(5),
            connect_retries: 10,
            connect_timeout: Duration::from_secs(30),
            ready_retries: 1000,
            kill_grace: Duration::from_millis(100),
        }
    }

    /// Create configuration from `HFO_*` environment variables.
    ///
    /// Any unset variable keeps the value of [`Configuration::new()`].
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_value<T: FromStr>(var: &str, default: T) -> T {
            match std::env::var(var) {
                Ok(val) => val.trim().parse().unwrap_or_else(|_| {
                    warn!(var, %val, "could not parse environment variable, using default");
                    default
                }),
                Err(_) => default,
            }
        }

        fn get_env_budget<T: TryFrom<i64>>(var: &str) -> Option<T> {
            positive(get_env_value(var, -1))
        }

        let d = Self::new();
        Self {
            server_host: get_env_value("HFO_SERVER_HOST", d.server_host),
            server_port: get_env_value("HFO_SERVER_PORT", d.server_port),
            coach_port: get_env_value("HFO_COACH_PORT", d.coach_port),
            offense_agents: get_env_value("HFO_OFFENSE_AGENTS", d.offense_agents),
            offense_npcs: get_env_value("HFO_OFFENSE_NPCS", d.offense_npcs),
            defense_agents: get_env_value("HFO_DEFENSE_AGENTS", d.defense_agents),
            defense_npcs: get_env_value("HFO_DEFENSE_NPCS", d.defense_npcs),
            offense_team_name: get_env_value("HFO_OFFENSE_TEAM", d.offense_team_name),
            defense_team_name: get_env_value("HFO_DEFENSE_TEAM", d.defense_team_name),
            max_trials: get_env_budget("HFO_MAX_TRIALS"),
            max_frames: get_env_budget("HFO_MAX_FRAMES"),
            max_frames_per_trial: get_env_budget("HFO_MAX_FRAMES_PER_TRIAL"),
            seed: std::env::var("HFO_SEED").ok().and_then(|s| s.trim().parse().ok()),
            agent_base_port: get_env_value("HFO_AGENT_BASE_PORT", d.agent_base_port),
            agent_on_ball: get_env_flag("HFO_AGENT_ON_BALL", d.agent_on_ball),
            npc_binary: get_env_value("HFO_NPC_BINARY", d.npc_binary),
            agent_binary: get_env_value("HFO_AGENT_BINARY", d.agent_binary),
            formation_dir: get_env_value("HFO_FORMATION_DIR", d.formation_dir),
            player_config: get_env_value("HFO_PLAYER_CONFIG", d.player_config),
            log_dir: get_env_value("HFO_LOG_DIR", d.log_dir),
            lib_dir: std::env::var_os("HFO_LIB_DIR").map(PathBuf::from),
            record: get_env_flag("HFO_RECORD", d.record),
            verbose: get_env_flag("HFO_VERBOSE", d.verbose),
            log: get_env_flag("HFO_LOG", d.log),
            debug_player_stderr: get_env_flag("HFO_DEBUG_PLAYER_STDERR", d.debug_player_stderr),
            handshake_retries: match get_env_value("HFO_HANDSHAKE_RETRIES", 5i64) {
                n if n < 0 => None,
                n => u32::try_from(n).ok(),
            },
            connect_timeout: Duration::from_secs(get_env_value(
                "HFO_CONNECT_TIMEOUT_SECS",
                d.connect_timeout.as_secs(),
            )),
            ..d
        }
    }

    /// Checks that the squads can be fielded.
    ///
    /// The offense never fills its goalie slot, so it has at most ten players.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.num_offense() <= TEAM_SIZE - 1,
            "offense has {} players, at most {} are allowed",
            self.num_offense(),
            TEAM_SIZE - 1
        );
        ensure!(
            self.num_defense() <= TEAM_SIZE,
            "defense has {} players, at most {TEAM_SIZE} are allowed",
            self.num_defense()
        );
        ensure!(
            self.num_offense() > 0 || self.num_defense() > 0,
            "no player to launch"
        );
        ensure!(
            self.offense_team_name != self.defense_team_name,
            "both teams are named '{}'",
            self.offense_team_name
        );
        ensure!(
            !self.agent_on_ball || self.offense_agents > 0,
            "agent on ball requires an offense agent"
        );
        let agents = self.offense_agents + self.defense_agents;
        if agents > 0 {
            let last_port = usize::from(self.agent_base_port) + agents - 1;
            ensure!(
                last_port <= usize::from(u16::MAX),
                "agent ports {}..={last_port} do not fit in a port number",
                self.agent_base_port
            );
        }
        ensure!(
            self.playable_area.x.min < self.playable_area.x.max
                && self.playable_area.y.min < self.playable_area.y.max,
            "playable area is empty"
        );
        Ok(())
    }

    /// Players on offense
    pub fn num_offense(&self) -> usize {
        self.offense_agents + self.offense_npcs
    }

    /// Players on defense
    pub fn num_defense(&self) -> usize {
        self.defense_agents + self.defense_npcs
    }

    /// Whether progress is printed to stdout
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Whether logs are written to a file
    pub fn log(&self) -> bool {
        self.log
    }

    /// Directory for log files
    pub fn log_dir(&self) -> &PathBuf {
        &self.log_dir
    }

    /// `host:port` of the coach channel
    pub fn coach_address(&self) -> (String, u16) {
        (self.server_host.clone(), self.coach_port)
    }

    pub(crate) fn link_timings(&self) -> LinkTimings {
        LinkTimings {
            receive_timeout: self.receive_timeout,
            retry_pause: self.retry_pause,
        }
    }

    pub(crate) fn trial_limits(&self) -> TrialLimits {
        TrialLimits {
            max_trials: self.max_trials,
            max_frames: self.max_frames,
            max_frames_per_trial: self.max_frames_per_trial,
        }
    }

    pub(crate) fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec {
            npc_binary: self.npc_binary.clone(),
            agent_binary: self.agent_binary.clone(),
            server_port: self.server_port,
            formation_dir: self.formation_dir.clone(),
            player_config: self.player_config.clone(),
            log_dir: self.log_dir.clone(),
            record: self.record,
            lib_dir: self.lib_dir.clone(),
            allow_stderr: self.debug_player_stderr,
        }
    }

    /// Set the server host.
    pub fn with_server_host(mut self, value: impl Into<String>) -> Self {
        self.server_host = value.into();
        self
    }

    /// Set the player port and the coach port of the server.
    pub fn with_ports(mut self, server_port: u16, coach_port: u16) -> Self {
        self.server_port = server_port;
        self.coach_port = coach_port;
        self
    }

    /// Set the offensive squad.
    pub fn with_offense(mut self, agents: usize, npcs: usize) -> Self {
        self.offense_agents = agents;
        self.offense_npcs = npcs;
        self
    }

    /// Set the defensive squad.
    pub fn with_defense(mut self, agents: usize, npcs: usize) -> Self {
        self.defense_agents = agents;
        self.defense_npcs = npcs;
        self
    }

    /// Set both team names.
    pub fn with_team_names(mut self, offense: impl Into<String>, defense: impl Into<String>) -> Self {
        self.offense_team_name = offense.into();
        self.defense_team_name = defense.into();
        self
    }

    /// Stop after this many trials. Non-positive means unlimited.
    pub fn with_max_trials(mut self, value: i64) -> Self {
        self.max_trials = positive(value);
        self
    }

    /// Stop after this many frames. Non-positive means unlimited.
    pub fn with_max_frames(mut self, value: i64) -> Self {
        self.max_frames = positive(value);
        self
    }

    /// End any trial longer than this many frames. Non-positive means unlimited.
    pub fn with_max_frames_per_trial(mut self, value: i64) -> Self {
        self.max_frames_per_trial = positive(value);
        self
    }

    /// Seed the placement generator for reproducible trials.
    pub fn with_seed(mut self, value: u64) -> Self {
        self.seed = Some(value);
        self
    }

    /// First port handed to agents.
    pub fn with_agent_base_port(mut self, value: u16) -> Self {
        self.agent_base_port = value;
        self
    }

    /// Set the rectangle the ball must stay in during a trial.
    pub fn with_playable_area(mut self, value: PlayableArea) -> Self {
        self.playable_area = value;
        self
    }

    /// Enable or disable placing the first offense agent on the ball.
    pub fn with_agent_on_ball(mut self, value: bool) -> Self {
        self.agent_on_ball = value;
        self
    }

    /// Set the scripted player binary.
    pub fn with_npc_binary(mut self, value: impl Into<PathBuf>) -> Self {
        self.npc_binary = value.into();
        self
    }

    /// Set the learning agent binary.
    pub fn with_agent_binary(mut self, value: impl Into<PathBuf>) -> Self {
        self.agent_binary = value.into();
        self
    }

    /// Set the formation directory and the player configuration file.
    pub fn with_player_files(
        mut self,
        formation_dir: impl Into<PathBuf>,
        player_config: impl Into<PathBuf>,
    ) -> Self {
        self.formation_dir = formation_dir.into();
        self.player_config = player_config.into();
        self
    }

    /// Set the directory for trainer and player logs.
    pub fn with_log_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.log_dir = value.into();
        self
    }

    /// Set the library directory exported to players.
    pub fn with_lib_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.lib_dir = Some(value.into());
        self
    }

    /// Enable or disable game recording by players.
    pub fn with_record(mut self, value: bool) -> Self {
        self.record = value;
        self
    }

    /// Enable or disable silent mode.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable player stderr output (debug purposes only).
    pub fn with_debug_player_stderr(mut self, value: bool) -> Self {
        self.debug_player_stderr = value;
        self
    }

    /// Set the receive deadline and the pause between two empty receives.
    pub fn with_receive_timing(mut self, timeout: Duration, pause: Duration) -> Self {
        self.receive_timeout = timeout;
        self.retry_pause = pause;
        self
    }

    /// Set the retry budgets: handshake (`None` waits forever), connection checks and the
    /// agent readiness barrier.
    pub fn with_retries(mut self, handshake: Option<u32>, connect: u32, ready: u32) -> Self {
        self.handshake_retries = handshake;
        self.connect_retries = connect;
        self.ready_retries = ready;
        self
    }

    /// Set how long a launched player may take to show up on the field.
    pub fn with_connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    /// Set how long a player may take to exit after `SIGTERM`.
    pub fn with_kill_grace(mut self, value: Duration) -> Self {
        self.kill_grace = value;
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budgets_use_non_positive_as_unlimited() {
        let c = Configuration::new()
            .with_max_trials(-1)
            .with_max_frames(0)
            .with_max_frames_per_trial(300);
        assert_eq!(c.trial_limits().max_trials, None);
        assert_eq!(c.trial_limits().max_frames, None);
        assert_eq!(c.trial_limits().max_frames_per_trial, Some(300));
        assert_eq!(Configuration::new().with_max_trials(12).max_trials, Some(12));
    }

    #[test]
    fn default_squad_is_valid() {
        let c = Configuration::default();
        assert_eq!(c.num_offense(), 1);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn impossible_squads_are_rejected() {
        assert!(Configuration::new().with_offense(4, 7).validate().is_err());
        assert!(Configuration::new().with_defense(1, 11).validate().is_err());
        assert!(Configuration::new().with_offense(0, 0).validate().is_err());
        assert!(Configuration::new()
            .with_team_names("same", "same")
            .validate()
            .is_err());
        assert!(Configuration::new()
            .with_agent_on_ball(true)
            .validate()
            .is_err());
        assert!(Configuration::new()
            .with_offense(1, 9)
            .with_defense(2, 9)
            .validate()
            .is_ok());
    }

    #[test]
    fn agent_ports_must_fit_in_a_port_number() {
        let near_top = Configuration::new()
            .with_offense(1, 0)
            .with_defense(1, 0)
            .with_agent_base_port(u16::MAX);
        assert!(near_top.validate().is_err());
        assert!(near_top
            .clone()
            .with_agent_base_port(u16::MAX - 1)
            .validate()
            .is_ok());
        // without agents the base port is never used
        assert!(Configuration::new()
            .with_agent_base_port(u16::MAX)
            .validate()
            .is_ok());
    }

    #[test]
    fn playable_area_can_be_narrowed() {
        use crate::geometry::Range;

        let narrow = PlayableArea {
            x: Range::new(0.0, 52.5),
            y: Range::new(-20.0, 20.0),
        };
        let c = Configuration::new().with_playable_area(narrow);
        assert_eq!(c.playable_area, narrow);
        assert!(c.validate().is_ok());
        let empty = PlayableArea {
            x: Range::new(10.0, 10.0),
            ..narrow
        };
        assert!(Configuration::new()
            .with_playable_area(empty)
            .validate()
            .is_err());
    }

    #[test]
    fn launch_spec_follows_configuration() {
        let spec = Configuration::new()
            .with_ports(6100, 6101)
            .with_record(true)
            .with_lib_dir("/opt/hfo/lib")
            .with_debug_player_stderr(true)
            .launch_spec();
        assert_eq!(spec.server_port, 6100);
        assert!(spec.record);
        assert!(spec.allow_stderr);
        assert_eq!(spec.lib_dir, Some(PathBuf::from("/opt/hfo/lib")));
    }
}
