//! Player processes: launch, connection check, liveness and teardown.
//!
//! Connection is confirmed through the protocol, never by waiting a fixed delay: the supervisor
//! asks the server for a `(look)` until the player shows up in the reply.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::error::{Result, TrainerError};
use crate::link::{Channel, RetryBudget};
use crate::message::{parse, Command, MessageNode, WorldSnapshot};
use crate::process::ManagedProcess;
use crate::roster::{Side, GOALIE_UNUM};

/// How player binaries are started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Scripted player binary
    pub npc_binary: PathBuf,
    /// Learning agent binary
    pub agent_binary: PathBuf,
    /// Player port of the server
    pub server_port: u16,
    /// Formation configuration directory
    pub formation_dir: PathBuf,
    /// Player configuration file
    pub player_config: PathBuf,
    /// Directory handed to players for their own logs
    pub log_dir: PathBuf,
    /// Ask players to record their games
    pub record: bool,
    /// Prepended to `LD_LIBRARY_PATH` of every player
    pub lib_dir: Option<PathBuf>,
    /// Let players write to the trainer's stderr
    pub allow_stderr: bool,
}

/// Team context of a learning agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSlot {
    /// Number of other players on the agent's side
    pub num_teammates: usize,
    /// Number of players on the other side
    pub num_opponents: usize,
    /// Port the agent serves its own clients on
    pub port: u16,
}

impl LaunchSpec {
    fn common_args(&self, team: &str) -> Vec<String> {
        vec![
            "-t".into(),
            team.into(),
            "-p".into(),
            self.server_port.to_string(),
        ]
    }

    fn tail_args(&self, unum: u8, args: &mut Vec<String>) {
        if self.record {
            args.push("--record".into());
        }
        if unum == GOALIE_UNUM {
            args.push("-g".into());
        }
    }

    /// Command line of a scripted player.
    pub fn npc_args(&self, team: &str, unum: u8) -> Vec<String> {
        let mut args = self.common_args(team);
        args.extend([
            "--config_dir".into(),
            self.formation_dir.display().to_string(),
            "--log_dir".into(),
            self.log_dir.display().to_string(),
            "--player-config".into(),
            self.player_config.display().to_string(),
        ]);
        self.tail_args(unum, &mut args);
        args
    }

    /// Command line of a learning agent.
    pub fn agent_args(&self, team: &str, side: Side, unum: u8, slot: AgentSlot) -> Vec<String> {
        let mut args = self.common_args(team);
        args.extend([
            "--numTeammates".into(),
            slot.num_teammates.to_string(),
            "--numOpponents".into(),
            slot.num_opponents.to_string(),
            "--playingOffense".into(),
            u8::from(side == Side::Offense).to_string(),
            "--serverPort".into(),
            slot.port.to_string(),
            "--log_dir".into(),
            self.log_dir.display().to_string(),
            "--player-config".into(),
            self.player_config.display().to_string(),
            "--config_dir".into(),
            self.formation_dir.display().to_string(),
        ]);
        self.tail_args(unum, &mut args);
        args
    }

    fn env(&self) -> Vec<(String, String)> {
        let Some(lib_dir) = &self.lib_dir else {
            return Vec::new();
        };
        let mut path = lib_dir.display().to_string();
        if let Ok(current) = std::env::var("LD_LIBRARY_PATH") {
            if !current.is_empty() {
                path = format!("{path}:{current}");
            }
        }
        vec![("LD_LIBRARY_PATH".to_string(), path)]
    }
}

/// Bounds of [`ProcessSupervisor::wait_for_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionWait {
    /// Retry budget of every receive
    pub budget: RetryBudget,
    /// Pause between two look rounds
    pub pause: Duration,
    /// Overall time allowed for the player to show up
    pub timeout: Duration,
}

/// A launched player and the OS process behind it.
#[derive(Debug)]
pub struct SupervisedProcess {
    /// Display name, e.g. `offense_npc_7`
    pub name: String,
    /// Team the player joins
    pub team: String,
    /// Unum the player is expected to get
    pub unum: u8,
    /// Side of the team
    pub side: Side,
    /// Learning agent rather than scripted player
    pub is_agent: bool,
    /// The run fails when a required process exits
    pub required: bool,
    process: ManagedProcess,
}

impl SupervisedProcess {
    /// The underlying process
    pub fn process(&mut self) -> &mut ManagedProcess {
        &mut self.process
    }

    /// Exit status seen by the last liveness poll or termination
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.process.exit_status()
    }

    /// Error describing this process' exit.
    pub fn failure(&self) -> TrainerError {
        TrainerError::ProcessFailure {
            name: self.name.clone(),
            status: self
                .process
                .exit_status()
                .map_or_else(|| "still running".to_string(), |s| s.to_string()),
        }
    }
}

/// Owns every player process of a run.
#[derive(Debug)]
pub struct ProcessSupervisor {
    spec: LaunchSpec,
    kill_grace: Duration,
    processes: Vec<SupervisedProcess>,
}

impl ProcessSupervisor {
    /// Creates an empty supervisor.
    pub fn new(spec: LaunchSpec, kill_grace: Duration) -> ProcessSupervisor {
        ProcessSupervisor {
            spec,
            kill_grace,
            processes: Vec::new(),
        }
    }

    /// Every tracked process, in launch order
    pub fn processes(&self) -> &[SupervisedProcess] {
        &self.processes
    }

    /// Launch configuration
    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    fn push(
        &mut self,
        name: String,
        binary: PathBuf,
        args: Vec<String>,
        (team, side, unum): (&str, Side, u8),
        is_agent: bool,
        required: bool,
    ) -> Result<()> {
        let process =
            ManagedProcess::launch(&name, binary, &args, &self.spec.env(), self.spec.allow_stderr)?;
        self.processes.push(SupervisedProcess {
            name,
            team: team.to_string(),
            unum,
            side,
            is_agent,
            required,
            process,
        });
        Ok(())
    }

    /// Starts a scripted player meant to get `unum`.
    ///
    /// Players launched only to occupy a unum are not `required`.
    #[instrument(skip(self))]
    pub fn launch_npc(&mut self, team: &str, side: Side, unum: u8, required: bool) -> Result<()> {
        let name = format!("{side}_npc_{unum}");
        let args = self.spec.npc_args(team, unum);
        let binary = self.spec.npc_binary.clone();
        self.push(name, binary, args, (team, side, unum), false, required)
    }

    /// Starts a learning agent meant to get `unum`. Agents are always required.
    #[instrument(skip(self))]
    pub fn launch_agent(&mut self, team: &str, side: Side, unum: u8, slot: AgentSlot) -> Result<()> {
        info!("launching {side} agent {unum} on port {}", slot.port);
        let name = format!("{side}_agent_{unum}");
        let args = self.spec.agent_args(team, side, unum, slot);
        let binary = self.spec.agent_binary.clone();
        self.push(name, binary, args, (team, side, unum), true, true)
    }

    /// Sends `(look)` until player `unum` of `team` is on the field.
    ///
    /// Messages other than look replies are returned, in arrival order, for the caller to
    /// dispatch. Liveness is polled between looks so a player dying during startup fails fast.
    /// Look rounds that do not show the player are `wait.pause` apart, and the wait gives up
    /// once `wait.timeout` has elapsed.
    ///
    /// # Errors
    /// [`TrainerError::Timeout`] when a receive exhausts `wait.budget`,
    /// [`TrainerError::ConnectionTimeout`] when the player never shows up,
    /// [`TrainerError::ProcessFailure`] when a required process exits, protocol errors from the
    /// server.
    #[instrument(skip(self, link))]
    pub fn wait_for_connection(
        &mut self,
        link: &mut impl Channel,
        team: &str,
        unum: u8,
        wait: ConnectionWait,
    ) -> Result<Vec<MessageNode>> {
        let deadline = Instant::now() + wait.timeout;
        let mut deferred = Vec::new();
        let mut looks = 0;
        loop {
            self.check_liveness()?;
            link.send_command(&Command::Look)?;
            looks += 1;
            loop {
                let msg = parse(&link.receive(wait.budget)?)?;
                if let Some(body) = look_body(&msg) {
                    let snapshot = WorldSnapshot::from_body(body)?;
                    if snapshot
                        .players
                        .iter()
                        .any(|p| p.team == team && p.unum == unum)
                    {
                        debug!(looks, deferred = deferred.len(), "player connected");
                        return Ok(deferred);
                    }
                    break;
                }
                deferred.push(msg);
            }
            if Instant::now() + wait.pause >= deadline {
                warn!(looks, "player did not show up");
                return Err(TrainerError::ConnectionTimeout {
                    team: team.to_string(),
                    unum,
                    looks,
                });
            }
            std::thread::sleep(wait.pause);
        }
    }

    /// Removes player `unum` of `team` from the server and stops its process.
    #[instrument(skip(self, link))]
    pub fn disconnect(&mut self, link: &mut impl Channel, team: &str, unum: u8) -> Result<()> {
        link.send_command(&Command::DisconnectPlayer {
            team: team.to_string(),
            unum,
        })?;
        let Some(pos) = self
            .processes
            .iter()
            .position(|p| p.team == team && p.unum == unum)
        else {
            return Err(TrainerError::unknown_player(
                team,
                format_args!("no process for unum {unum}"),
            ));
        };
        let mut removed = self.processes.remove(pos);
        removed.process.terminate(self.kill_grace)?;
        info!(name = %removed.name, "unneeded player disconnected");
        Ok(())
    }

    /// First required process that has exited, if any. Never blocks.
    pub fn poll_liveness(&mut self) -> Option<&SupervisedProcess> {
        let index = self
            .processes
            .iter_mut()
            .position(|p| p.required && !p.process.is_alive())?;
        Some(&self.processes[index])
    }

    /// [`poll_liveness`](Self::poll_liveness) as an error.
    pub fn check_liveness(&mut self) -> Result<()> {
        match self.poll_liveness() {
            Some(dead) => {
                let err = dead.failure();
                warn!("something necessary closed: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Terminates every tracked process, dead or alive, and returns how many were attempted.
    ///
    /// A failure on one process does not stop the others.
    pub fn terminate_all(&mut self) -> usize {
        for p in &mut self.processes {
            if let Err(e) = p.process.terminate(self.kill_grace) {
                warn!(name = %p.name, "could not terminate: {e}");
            }
        }
        self.processes.len()
    }
}

fn look_body(msg: &MessageNode) -> Option<&[MessageNode]> {
    match msg.as_list()? {
        [ok, look, body @ ..] if ok.as_atom() == Some("ok") && look.as_atom() == Some("look") => {
            Some(body)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    struct Script {
        replies: VecDeque<&'static str>,
        sent: Vec<String>,
    }

    impl Channel for Script {
        fn send(&mut self, msg: &str) -> Result<()> {
            self.sent.push(msg.to_string());
            Ok(())
        }

        fn receive(&mut self, _budget: RetryBudget) -> Result<String> {
            self.replies
                .pop_front()
                .map(str::to_string)
                .ok_or(TrainerError::Timeout { retries: 0 })
        }

        fn close(&mut self) {}
    }

    fn script(replies: &[&'static str]) -> Script {
        Script {
            replies: replies.iter().copied().collect(),
            sent: Vec::new(),
        }
    }

    fn quick_wait() -> ConnectionWait {
        ConnectionWait {
            budget: RetryBudget::NONE,
            pause: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    fn spec(binary: &str) -> LaunchSpec {
        LaunchSpec {
            npc_binary: binary.into(),
            agent_binary: binary.into(),
            server_port: 6000,
            formation_dir: "formations-dt".into(),
            player_config: "player.conf".into(),
            log_dir: "log".into(),
            record: false,
            lib_dir: None,
            allow_stderr: false,
        }
    }

    #[test]
    fn npc_and_agent_command_lines() {
        let mut s = spec("player");
        assert_eq!(
            s.npc_args("base_left", 1).join(" "),
            "-t base_left -p 6000 --config_dir formations-dt --log_dir log \
             --player-config player.conf -g"
        );
        s.record = true;
        let slot = AgentSlot {
            num_teammates: 1,
            num_opponents: 2,
            port: 7001,
        };
        assert_eq!(
            s.agent_args("base_right", Side::Defense, 4, slot).join(" "),
            "-t base_right -p 6000 --numTeammates 1 --numOpponents 2 --playingOffense 0 \
             --serverPort 7001 --log_dir log --player-config player.conf \
             --config_dir formations-dt --record"
        );
    }

    #[test]
    fn lib_dir_is_exported() {
        let mut s = spec("player");
        assert!(s.env().is_empty());
        s.lib_dir = Some("/opt/hfo/lib".into());
        let env = s.env();
        assert_eq!(env[0].0, "LD_LIBRARY_PATH");
        assert!(env[0].1.starts_with("/opt/hfo/lib"));
    }

    #[test]
    fn waits_until_player_is_seen_and_defers_other_messages() {
        let mut sup = ProcessSupervisor::new(spec("true"), Duration::from_millis(50));
        let mut link = script(&[
            "(server_param (goal_width 14.02))",
            "(ok look 0 ((b) 0 0) ((g l) -52.5 0) ((g r) 52.5 0))",
            "(hear 0 (p \"base_left\" 1) \"5ready\")",
            "(ok look 1 ((b) 0 0) ((g l) -52.5 0) ((g r) 52.5 0) ((p \"base_left\" 1) -3 0))",
        ]);
        let deferred = sup
            .wait_for_connection(&mut link, "base_left", 1, quick_wait())
            .unwrap();
        assert_eq!(link.sent, vec!["(look)", "(look)"]);
        assert_eq!(deferred.len(), 2);
        assert_eq!(deferred[0].as_list().unwrap()[0].as_atom(), Some("server_param"));
    }

    #[test]
    fn connection_wait_times_out() {
        let mut sup = ProcessSupervisor::new(spec("true"), Duration::from_millis(50));
        let mut link = script(&["(ok look 0 ((b) 0 0))"]);
        let err = sup
            .wait_for_connection(&mut link, "base_left", 2, quick_wait())
            .unwrap_err();
        assert!(matches!(err, TrainerError::Timeout { .. }));
    }

    /// Server that answers every look, never with the awaited player.
    struct CrowdedField {
        looks: u32,
    }

    impl Channel for CrowdedField {
        fn send(&mut self, msg: &str) -> Result<()> {
            if msg == "(look)" {
                self.looks += 1;
            }
            Ok(())
        }

        fn receive(&mut self, _budget: RetryBudget) -> Result<String> {
            Ok("(ok look 0 ((b) 0 0) ((p \"base_left\" 3) 0 0))".to_string())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn player_that_never_shows_up_ends_the_wait() {
        let mut sup = ProcessSupervisor::new(spec("true"), Duration::from_millis(50));
        let mut link = CrowdedField { looks: 0 };
        let wait = ConnectionWait {
            budget: RetryBudget::NONE,
            pause: Duration::from_millis(5),
            timeout: Duration::from_millis(60),
        };
        let start = Instant::now();
        let err = sup
            .wait_for_connection(&mut link, "base_left", 2, wait)
            .unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(5));
        match err {
            TrainerError::ConnectionTimeout { team, unum, looks } => {
                assert_eq!((team.as_str(), unum), ("base_left", 2));
                assert_eq!(looks, link.looks);
                assert!((1..=20).contains(&looks));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dead_required_process_is_reported_and_teardown_covers_everyone() {
        let mut sup = ProcessSupervisor::new(spec("sleep"), Duration::from_millis(50));
        sup.launch_npc("base_left", Side::Offense, 2, true).unwrap();
        assert!(sup.poll_liveness().is_none());

        // `true` ignores its arguments and exits at once
        sup.spec.npc_binary = "true".into();
        sup.launch_npc("base_left", Side::Offense, 3, true).unwrap();
        let mut failed = None;
        for _ in 0..200 {
            if let Some(p) = sup.poll_liveness() {
                failed = Some(p.name.clone());
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(failed.as_deref(), Some("offense_npc_3"));
        assert!(matches!(
            sup.check_liveness(),
            Err(TrainerError::ProcessFailure { .. })
        ));

        assert_eq!(sup.terminate_all(), 2);
        assert_eq!(sup.terminate_all(), 2);
        assert!(sup.processes.iter_mut().all(|p| !p.process.is_alive()));
    }

    #[test]
    fn unneeded_player_is_disconnected_and_stopped() {
        let mut sup = ProcessSupervisor::new(spec("true"), Duration::from_millis(50));
        sup.launch_npc("base_right", Side::Defense, 5, false).unwrap();
        let mut link = script(&[]);
        sup.disconnect(&mut link, "base_right", 5).unwrap();
        assert_eq!(link.sent, vec!["(disconnect_player base_right 5)"]);
        assert!(sup.processes().is_empty());
        assert!(sup.disconnect(&mut link, "base_right", 5).is_err());
    }

    #[test]
    fn optional_process_exit_is_not_a_failure() {
        let mut sup = ProcessSupervisor::new(spec("true"), Duration::from_millis(50));
        sup.launch_npc("base_left", Side::Offense, 1, false).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(sup.poll_liveness().is_none());
        assert!(sup.check_liveness().is_ok());
    }
}
