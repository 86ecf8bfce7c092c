//! The trainer service: wires link, handlers, roster, possession, trials and processes together.
//!
//! A run goes through these phases, each driven by the handlers registered at that moment:
//!
//! 1. handshake with the coach port
//! 2. launch offense then defense, unum by unum, confirming each connection
//! 3. wait until both teams are known and exactly the configured players are on the field
//! 4. wait for every agent to announce `ready`, broadcast `HFO_SETUP`
//! 5. play: one [`Trainer::step`] per received message, one trial decision per new frame
//!
//! Whatever ends the run (budget, `DONE`, interrupt, error) goes through [`Trainer::shutdown`].

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, instrument, warn};

use crate::configuration::Configuration;
use crate::error::{DoneReason, Result, TrainerError};
use crate::geometry::Vector2;
use crate::handlers::HandlerRegistry;
use crate::link::{Channel, RetryBudget, ServerLink};
use crate::logger::init_logger;
use crate::message::{
    parse, team_names, Command, HearMessage, MessageNode, WorldSnapshot, LOOK_PREFIX_LEN,
};
use crate::possession::PossessionTracker;
use crate::roster::{RosterMap, Side};
use crate::server_params::ServerParams;
use crate::supervisor::{AgentSlot, ConnectionWait, ProcessSupervisor};
use crate::trial::{Squads, TrialLifecycle, TrialOutcome, TrialStats, Transition};

/// Result of one main loop iteration.
#[derive(Debug)]
pub enum LoopStep {
    /// Keep going
    Continue,
    /// Normal end of the run
    Done(DoneReason),
    /// The run cannot go on
    Failed(TrainerError),
}

/// Lets another thread (typically a signal handler) end the run.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests the run to finish at the next iteration
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`stop`](Self::stop) was called
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What to do with a dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Ignore,
    ServerParams,
    Hear,
    TeamNames,
    CountPlayers,
    SeeGlobal,
}

/// Coach-side orchestrator of a Half Field Offense run.
#[derive(Debug)]
pub struct Trainer<C: Channel, R: Rng = StdRng> {
    config: Configuration,
    link: C,
    registry: HandlerRegistry<Handler>,
    params: ServerParams,
    roster: RosterMap,
    tracker: PossessionTracker,
    lifecycle: TrialLifecycle<R>,
    supervisor: ProcessSupervisor,
    pending: VecDeque<MessageNode>,
    teams: Vec<String>,
    connected_players: Option<usize>,
    agents_ready: HashSet<(String, String)>,
    frame: u32,
    ball: Vector2,
    players: Vec<(Side, usize, Vector2)>,
    done: Option<DoneReason>,
    setup_done: bool,
    stop: StopHandle,
    shut_down: bool,
}

impl Trainer<ServerLink> {
    /// Opens the coach link described by `config`.
    ///
    /// The placement generator is seeded from the configuration, or from the OS when no seed
    /// is set.
    pub fn connect(config: Configuration) -> Result<Trainer<ServerLink>> {
        let link = ServerLink::connect(config.coach_address(), config.link_timings())?;
        Ok(Trainer::new(config, link))
    }
}

impl<C: Channel> Trainer<C> {
    /// Trainer over an already opened channel.
    pub fn new(config: Configuration, link: C) -> Trainer<C> {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Trainer::with_rng(config, link, rng)
    }
}

impl<C: Channel, R: Rng> Trainer<C, R> {
    /// Trainer with an explicit placement generator.
    ///
    /// When file logging is enabled, the global log subscriber is installed here.
    pub fn with_rng(config: Configuration, link: C, rng: R) -> Trainer<C, R> {
        if config.log() {
            match init_logger(config.log_dir()) {
                Ok(path) => info!(path = %path.display(), "logging to file"),
                Err(e) => eprintln!("[Trainer] file logging disabled: {e:#}"),
            }
        }
        let roster = RosterMap::build(&config.offense_team_name, &config.defense_team_name);
        let squads = Squads {
            num_offense: config.num_offense(),
            num_defense: config.num_defense(),
            on_ball: (config.agent_on_ball && config.offense_agents > 0).then_some(1),
        };
        let params = ServerParams::default();
        let lifecycle = TrialLifecycle::new(
            roster.clone(),
            squads,
            config.trial_limits(),
            &params,
            rng,
        )
        .with_area(config.playable_area);
        let supervisor = ProcessSupervisor::new(config.launch_spec(), config.kill_grace);

        let mut registry = HandlerRegistry::new();
        let ignored: [&[&str]; 7] = [
            &["player_param"],
            &["player_type"],
            &["ok", "change_mode"],
            &["ok", "ear"],
            &["ok", "move"],
            &["ok", "recover"],
            &["ok", "say"],
        ];
        for prefix in ignored {
            registry.register(prefix, Handler::Ignore);
        }
        registry.register(&["server_param"], Handler::ServerParams);
        registry.register(&["hear"], Handler::Hear);

        Trainer {
            tracker: PossessionTracker::from_params(&params),
            config,
            link,
            registry,
            params,
            roster,
            lifecycle,
            supervisor,
            pending: VecDeque::new(),
            teams: Vec::new(),
            connected_players: None,
            agents_ready: HashSet::new(),
            frame: 0,
            ball: Vector2::default(),
            players: Vec::new(),
            done: None,
            setup_done: false,
            stop: StopHandle::default(),
            shut_down: false,
        }
    }

    /// Handle that ends the run from outside
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Results so far
    pub fn stats(&self) -> &TrialStats {
        self.lifecycle.stats()
    }

    /// The channel to the server
    pub fn link(&self) -> &C {
        &self.link
    }

    /// Player processes
    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Last simulation frame seen
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Parameters announced by the server
    pub fn server_params(&self) -> &ServerParams {
        &self.params
    }

    /// Sets up the match, plays until the run ends and shuts everything down.
    ///
    /// Reaching a budget, a `DONE` message or an interrupt is a success.
    pub fn run(&mut self) -> Result<TrialStats> {
        let mut step = self.setup();
        while matches!(step, LoopStep::Continue) {
            step = self.step();
        }
        match &step {
            LoopStep::Done(reason) => {
                info!(%reason, "run finished");
                self.say("[Trainer] Finished");
            }
            LoopStep::Failed(TrainerError::Timeout { .. }) => {
                error!("haven't heard from the server for too long");
                self.say("[Trainer] Haven't heard from the server for too long, Exiting");
            }
            LoopStep::Failed(e) => error!("run failed: {e}"),
            LoopStep::Continue => {}
        }
        self.shutdown();
        match step {
            LoopStep::Failed(e) => Err(e),
            _ => Ok(*self.stats()),
        }
    }

    fn say(&self, line: &str) {
        if self.config.verbose {
            println!("{line}");
        }
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        self.link.send_command(command)
    }

    fn send_all(&mut self, commands: &[Command]) -> Result<()> {
        commands.iter().try_for_each(|c| self.send(c))
    }

    fn interrupted(&self) -> Option<DoneReason> {
        if self.stop.is_stopped() {
            Some(DoneReason::Interrupted)
        } else {
            self.done
        }
    }

    /// Everything before the first trial.
    pub fn setup(&mut self) -> LoopStep {
        match self.try_setup() {
            Ok(()) => match self.interrupted() {
                Some(reason) => LoopStep::Done(reason),
                None => LoopStep::Continue,
            },
            Err(e) => LoopStep::Failed(e),
        }
    }

    fn try_setup(&mut self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| TrainerError::Configuration(e.to_string()))?;
        self.init_comm()?;
        self.launch_side(Side::Offense)?;
        self.wait_on_team()?;
        self.launch_side(Side::Defense)?;
        self.wait_on_team()?;
        self.check_all_connected()?;
        self.wait_agents_ready()?;
        if self.interrupted().is_some() {
            return Ok(());
        }
        self.broadcast_setup()?;
        self.say("[Trainer] Starting game");
        self.setup_done = true;
        self.start_game()
    }

    #[instrument(skip(self))]
    fn init_comm(&mut self) -> Result<()> {
        let budget = RetryBudget::from_option(self.config.handshake_retries);
        self.link.handshake(budget)?;
        info!("coach handshake done");
        Ok(())
    }

    fn connect_budget(&self) -> RetryBudget {
        RetryBudget::Limited(self.config.connect_retries)
    }

    /// Reads and handles one message, deferred ones first.
    fn process_next(&mut self, budget: RetryBudget) -> Result<()> {
        let msg = match self.pending.pop_front() {
            Some(msg) => msg,
            None => parse(&self.link.receive(budget)?)?,
        };
        self.handle(&msg)
    }

    fn handle(&mut self, msg: &MessageNode) -> Result<()> {
        let Some(items) = msg.as_list() else {
            return Err(TrainerError::malformed(msg.to_string(), "not a list"));
        };
        let Some((handler, rest)) = self.registry.dispatch(items) else {
            return Ok(());
        };
        match handler {
            Handler::Ignore => Ok(()),
            Handler::ServerParams => {
                self.params = ServerParams::from_body(rest);
                debug!(n = self.params.len(), "server parameters received");
                Ok(())
            }
            Handler::Hear => self.hear(rest),
            Handler::TeamNames => {
                self.teams = team_names(rest);
                debug!(teams = ?self.teams);
                Ok(())
            }
            Handler::CountPlayers => {
                self.connected_players = Some(rest.len().saturating_sub(LOOK_PREFIX_LEN));
                self.send(&Command::Look)
            }
            Handler::SeeGlobal => self.see_global(rest),
        }
    }

    fn hear(&mut self, body: &[MessageNode]) -> Result<()> {
        let Some(heard) = HearMessage::from_body(body) else {
            return Ok(());
        };
        match heard.payload.as_str() {
            "START" => {
                if self.lifecycle.is_playing() {
                    info!("already playing, ignoring START");
                    Ok(())
                } else if !self.setup_done {
                    info!("START heard during setup, play begins once every player is in");
                    Ok(())
                } else {
                    self.start_game()
                }
            }
            "DONE" => {
                info!(team = %heard.team, unum = %heard.unum, "DONE received");
                self.done = Some(DoneReason::DoneMessage);
                Ok(())
            }
            "ready" => {
                info!(team = %heard.team, unum = %heard.unum, "agent ready");
                self.say(&format!("[Trainer] Agent Ready: {} {}", heard.team, heard.unum));
                self.agents_ready.insert((heard.team, heard.unum));
                Ok(())
            }
            other => {
                debug!(payload = other, "unhandled message from agent");
                Ok(())
            }
        }
    }

    fn see_global(&mut self, body: &[MessageNode]) -> Result<()> {
        let snapshot = WorldSnapshot::from_body(body)?;
        self.send(&Command::Look)?;
        self.frame = snapshot.time;
        if let Some(ball) = snapshot.ball {
            self.ball = ball;
        }
        self.players.clear();
        for p in snapshot.players {
            let side = self
                .roster
                .side_of(&p.team)
                .ok_or_else(|| TrainerError::unknown_player(&p.team, "team is not playing"))?;
            let index = self.roster.to_internal(&p.team, p.unum)?;
            self.players.push((side, index, p.position));
        }
        Ok(())
    }

    /// Unums the squad of `side` needs, and the agent unums among them (ascending).
    fn squad_unums(&self, side: Side) -> (Vec<u8>, Vec<u8>) {
        let order = self.roster.team(side).order();
        let (size, agents, skip) = match side {
            Side::Offense => (self.config.num_offense(), self.config.offense_agents, 1),
            Side::Defense => (self.config.num_defense(), self.config.defense_agents, 0),
        };
        let needed = order[skip..skip + size].to_vec();
        let mut agent_unums = order[skip..skip + agents].to_vec();
        agent_unums.sort_unstable();
        (needed, agent_unums)
    }

    fn agent_slot(&self, side: Side, agent_num: usize) -> Result<AgentSlot> {
        let (own, other, offset) = match side {
            Side::Offense => (self.config.num_offense(), self.config.num_defense(), 0),
            Side::Defense => (
                self.config.num_defense(),
                self.config.num_offense(),
                self.config.offense_agents,
            ),
        };
        let port = usize::from(self.config.agent_base_port) + offset + agent_num;
        let port = u16::try_from(port).map_err(|_| {
            TrainerError::Configuration(format!("agent port {port} is out of range"))
        })?;
        Ok(AgentSlot {
            num_teammates: own.saturating_sub(1),
            num_opponents: other,
            port,
        })
    }

    /// Launches the players of `side` in unum order and waits for each to connect.
    ///
    /// Unums below the highest needed one are filled too, since the server hands them out in
    /// connection order; the fillers are disconnected once the side is complete.
    #[instrument(skip(self))]
    fn launch_side(&mut self, side: Side) -> Result<()> {
        let (needed, agents) = self.squad_unums(side);
        let Some(&highest) = needed.iter().max() else {
            return Ok(());
        };
        let team = self.roster.team(side).name().to_string();
        let wait = ConnectionWait {
            budget: self.connect_budget(),
            pause: self.config.retry_pause,
            timeout: self.config.connect_timeout,
        };
        let mut agent_num = 0;
        let mut fillers = Vec::new();
        for unum in 1..=highest {
            if agents.contains(&unum) {
                let slot = self.agent_slot(side, agent_num)?;
                self.say(&format!("[Trainer] Launching {side} Agent {agent_num}"));
                self.supervisor.launch_agent(&team, side, unum, slot)?;
                agent_num += 1;
            } else {
                let required = needed.contains(&unum);
                self.supervisor.launch_npc(&team, side, unum, required)?;
                if !required {
                    fillers.push(unum);
                }
            }
            let deferred = self
                .supervisor
                .wait_for_connection(&mut self.link, &team, unum, wait)?;
            self.pending.extend(deferred);
        }
        for unum in fillers {
            self.supervisor.disconnect(&mut self.link, &team, unum)?;
        }
        info!(%team, players = needed.len(), "side launched");
        Ok(())
    }

    fn launched_teams(&self) -> usize {
        [Side::Offense, Side::Defense]
            .into_iter()
            .filter(|&side| self.supervisor.processes().iter().any(|p| p.side == side))
            .count()
    }

    /// Asks for team names until every launched team is known to the server.
    #[instrument(skip(self))]
    fn wait_on_team(&mut self) -> Result<()> {
        let expected = self.launched_teams();
        self.registry.register(&["ok", "team_names"], Handler::TeamNames);
        self.send(&Command::TeamNames)?;
        while self.teams.len() < expected {
            self.process_next(self.connect_budget())?;
            if self.teams.len() < expected && self.pending.is_empty() {
                std::thread::sleep(self.config.retry_pause);
                self.send(&Command::TeamNames)?;
            }
        }
        self.registry.register(&["ok", "team_names"], Handler::Ignore);
        for side in [Side::Offense, Side::Defense] {
            let name = self.roster.team(side).name();
            let launched = self.supervisor.processes().iter().any(|p| p.side == side);
            if launched && !self.teams.iter().any(|t| t == name) {
                warn!(%name, teams = ?self.teams, "launched team is unknown to the server");
            }
        }
        Ok(())
    }

    /// Polls `(look)` until exactly the configured players are on the field.
    #[instrument(skip(self))]
    fn check_all_connected(&mut self) -> Result<()> {
        let expected = self.config.num_offense() + self.config.num_defense();
        self.connected_players = None;
        self.registry.register(&["ok", "look"], Handler::CountPlayers);
        self.send(&Command::Look)?;
        while self.connected_players != Some(expected) {
            self.supervisor.check_liveness()?;
            self.process_next(self.connect_budget())?;
        }
        self.registry.register(&["ok", "look"], Handler::Ignore);
        info!(players = expected, "all players connected");
        Ok(())
    }

    fn required_agents(&self) -> HashSet<(String, String)> {
        self.supervisor
            .processes()
            .iter()
            .filter(|p| p.is_agent)
            .map(|p| (p.team.clone(), p.unum.to_string()))
            .collect()
    }

    /// Handles messages until every agent said `ready`.
    #[instrument(skip(self))]
    fn wait_agents_ready(&mut self) -> Result<()> {
        let required = self.required_agents();
        if required.is_empty() {
            return Ok(());
        }
        self.say("[Trainer] Agents awaiting your connections");
        let budget = RetryBudget::Limited(self.config.ready_retries);
        while !required.is_subset(&self.agents_ready) {
            if self.interrupted().is_some() {
                return Ok(());
            }
            self.supervisor.check_liveness()?;
            self.process_next(budget)?;
        }
        info!(agents = required.len(), "all agents ready");
        Ok(())
    }

    fn setup_message(&self) -> Result<String> {
        let nums = |side: Side, range: std::ops::Range<usize>| -> Result<String> {
            let unums = range
                .map(|index| Ok(self.roster.player(side, index)?.unum.to_string()))
                .collect::<Result<Vec<_>>>()?;
            Ok(unums.join(" "))
        };
        let num_offense = self.config.num_offense();
        let num_defense = self.config.num_defense();
        Ok(format!(
            "HFO_SETUP offense_name {} defense_name {} num_offense {} num_defense {} \
             offense_nums {} defense_nums {}",
            self.config.offense_team_name,
            self.config.defense_team_name,
            num_offense,
            num_defense,
            nums(Side::Offense, 1..num_offense + 1)?,
            nums(Side::Defense, 0..num_defense)?,
        ))
    }

    fn broadcast_setup(&mut self) -> Result<()> {
        let text = self.setup_message()?;
        info!(%text, "broadcasting setup");
        self.send(&Command::Say(text))
    }

    /// Places everyone for the first trial and switches to frame tracking.
    #[instrument(skip(self))]
    fn start_game(&mut self) -> Result<()> {
        self.lifecycle.apply_params(&self.params);
        self.tracker = PossessionTracker::from_params(&self.params);
        let commands = self.lifecycle.start(self.frame);
        self.send_all(&commands)?;
        self.registry.register(&["see_global"], Handler::SeeGlobal);
        self.registry.register(&["ok", "look"], Handler::SeeGlobal);
        self.send(&Command::Look)
    }

    /// One main loop iteration: stop checks, liveness, one message, and a trial decision when
    /// the frame advanced.
    pub fn step(&mut self) -> LoopStep {
        if let Some(reason) = self.interrupted() {
            return LoopStep::Done(reason);
        }
        if let Err(e) = self.supervisor.check_liveness() {
            return LoopStep::Failed(e);
        }
        let previous = self.frame;
        if let Err(e) = self.process_next(RetryBudget::NONE) {
            return LoopStep::Failed(e);
        }
        if let Some(reason) = self.interrupted() {
            return LoopStep::Done(reason);
        }
        if self.frame == previous || !self.lifecycle.is_playing() {
            return LoopStep::Continue;
        }
        match self.advance_frame() {
            Ok(None) => LoopStep::Continue,
            Ok(Some(reason)) => LoopStep::Done(reason),
            Err(e) => LoopStep::Failed(e),
        }
    }

    fn advance_frame(&mut self) -> Result<Option<DoneReason>> {
        let holder = self
            .tracker
            .observe(self.ball, self.players.iter().copied())?;
        match self.lifecycle.step(self.frame, self.ball, holder) {
            Transition::Continue => Ok(None),
            Transition::Reset { outcome, commands } => {
                self.end_of_trial(outcome);
                self.tracker.clear();
                self.send_all(&commands)?;
                Ok(None)
            }
            Transition::Finished {
                outcome,
                reason,
                commands,
            } => {
                self.end_of_trial(outcome);
                self.send_all(&commands)?;
                Ok(Some(reason))
            }
        }
    }

    fn end_of_trial(&self, outcome: TrialOutcome) {
        let stats = self.lifecycle.stats();
        self.say(&format!(
            "[Trainer] EndOfTrial: {} / {} {} {}",
            stats.goals, stats.trials, self.frame, outcome
        ));
    }

    /// Says goodbye, terminates every process, closes the link and reports statistics.
    ///
    /// Every step runs even if an earlier one fails. Only the first call has an effect.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if let Err(e) = self.link.send_command(&Command::Bye) {
            warn!("could not say bye: {e}");
        }
        let terminated = self.supervisor.terminate_all();
        info!(terminated, "player processes terminated");
        self.link.close();
        let report = self.lifecycle.stats().to_string();
        for line in report.lines() {
            info!("{line}");
            self.say(&format!("[Trainer] {line}"));
        }
    }
}

impl<C: Channel, R: Rng> Drop for Trainer<C, R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Channel that accepts everything and never answers.
    #[derive(Debug, Default)]
    struct Mute {
        sent: Vec<String>,
    }

    impl Channel for Mute {
        fn send(&mut self, msg: &str) -> Result<()> {
            self.sent.push(msg.to_string());
            Ok(())
        }

        fn receive(&mut self, _: RetryBudget) -> Result<String> {
            Err(TrainerError::Timeout { retries: 0 })
        }

        fn close(&mut self) {}
    }

    fn trainer(config: Configuration) -> Trainer<Mute> {
        Trainer::new(config.with_seed(3).with_verbose(false), Mute::default())
    }

    #[test]
    fn defense_agents_take_ports_after_offense_agents() {
        let t = trainer(
            Configuration::new()
                .with_offense(2, 1)
                .with_defense(2, 0)
                .with_agent_base_port(7100),
        );

        let first = t.agent_slot(Side::Offense, 0).unwrap();
        assert_eq!(first.port, 7100);
        assert_eq!(first.num_teammates, 2);
        assert_eq!(first.num_opponents, 2);
        assert_eq!(t.agent_slot(Side::Offense, 1).unwrap().port, 7101);

        let goalie = t.agent_slot(Side::Defense, 0).unwrap();
        assert_eq!(goalie.port, 7102);
        assert_eq!(goalie.num_teammates, 1);
        assert_eq!(goalie.num_opponents, 3);
        assert_eq!(t.agent_slot(Side::Defense, 1).unwrap().port, 7103);
    }

    #[test]
    fn port_past_the_last_one_is_a_configuration_error() {
        let t = trainer(
            Configuration::new()
                .with_offense(1, 0)
                .with_defense(1, 0)
                .with_agent_base_port(u16::MAX),
        );

        assert_eq!(t.agent_slot(Side::Offense, 0).unwrap().port, u16::MAX);
        assert!(matches!(
            t.agent_slot(Side::Defense, 0),
            Err(TrainerError::Configuration(_))
        ));
    }

    #[test]
    fn agents_are_the_first_players_of_their_roster() {
        let t = trainer(
            Configuration::new()
                .with_team_names("Borregos", "WrightEagle")
                .with_offense(2, 1)
                .with_defense(1, 2),
        );

        let (needed, agents) = t.squad_unums(Side::Offense);
        assert_eq!(needed, vec![2, 4, 6]);
        assert_eq!(agents, vec![2, 4]);
        let (needed, agents) = t.squad_unums(Side::Defense);
        assert_eq!(needed, vec![1, 5, 2]);
        assert_eq!(agents, vec![1]);
    }

    #[test]
    fn setup_announces_roster_unums() {
        let t = trainer(
            Configuration::new()
                .with_team_names("Borregos", "WrightEagle")
                .with_offense(0, 2)
                .with_defense(0, 2),
        );

        assert_eq!(
            t.setup_message().unwrap(),
            "HFO_SETUP offense_name Borregos defense_name WrightEagle num_offense 2 \
             num_defense 2 offense_nums 2 4 defense_nums 1 5"
        );
    }

    #[test]
    fn start_before_setup_ends_is_held_back() {
        let mut t = trainer(Configuration::new());
        let start = parse("(hear 0 (p \"base_left\" 2) \"5START\")").unwrap();

        t.handle(&start).unwrap();

        assert!(!t.lifecycle.is_playing());
        assert!(t.link.sent.is_empty());
    }
}
