//! Trial lifecycle.
//!
//! ```text
//! Setup --start--> Live --terminal condition--> Resetting --next frame--> Live ...
//!                        \--budget reached--> Finished
//! ```
//!
//! Once per simulation frame the lifecycle classifies the frame (goal, out of bounds, captured
//! by defense, out of time, or nothing) in that priority order, updates [`TrialStats`] and
//! produces the commands that place ball and players for the next trial. It never talks to the
//! server itself: the caller sends the returned commands.

use std::fmt::Display;

use rand::Rng;
use tracing::{debug, info, instrument};

use crate::error::DoneReason;
use crate::geometry::{PlayableArea, Range, Vector2, PITCH_LENGTH};
use crate::message::Command;
use crate::possession::Holder;
use crate::roster::{RosterMap, Side};
use crate::server_params::ServerParams;

/// A trial ends when the ball was untouched for more frames than this.
pub const UNTOUCHED_LENGTH: u32 = 100;

/// Frames after a reset during which no terminal decision is taken.
pub const SETTLE_FRAMES: u32 = 5;

const DEFAULT_GOAL_WIDTH: f64 = 14.02;

/// Offsets of the offensive roles around the ball, in tenths of the pitch length.
const OFFENSE_OFFSETS: [(f64, f64); 10] = [
    (-1.0, -1.0),
    (-1.0, 1.0),
    (1.0, 1.0),
    (1.0, -1.0),
    (0.0, 2.0),
    (0.0, -2.0),
    (-2.0, -2.0),
    (-2.0, 2.0),
    (2.0, 2.0),
    (2.0, -2.0),
];

/// Why a trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    /// The offense scored
    Goal,
    /// The ball left the playable area
    OutOfBounds,
    /// A defender holds the ball
    CapturedByDefense,
    /// Ball untouched for too long, or the trial exceeded its frame limit
    OutOfTime,
}

impl TrialOutcome {
    /// Token broadcast with `(say ...)` so that players learn the outcome
    pub fn say_token(self) -> &'static str {
        match self {
            TrialOutcome::Goal => "GOAL",
            TrialOutcome::OutOfBounds => "OUT_OF_BOUNDS",
            TrialOutcome::CapturedByDefense => "CAPTURED_BY_DEFENSE",
            TrialOutcome::OutOfTime => "OUT_OF_TIME",
        }
    }
}

impl Display for TrialOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrialOutcome::Goal => "Goal",
            TrialOutcome::OutOfBounds => "Out of Bounds",
            TrialOutcome::CapturedByDefense => "Defense Captured",
            TrialOutcome::OutOfTime => "Ball untouched for too long",
        };
        write!(f, "{s}")
    }
}

/// Cumulative results of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialStats {
    /// Trials played
    pub trials: u32,
    /// Frames spent in finished trials
    pub frames: u64,
    /// Trials ending in a goal
    pub goals: u32,
    /// Frames spent in goal-scoring trials
    pub goal_frames: u64,
    /// Trials ending with the defense holding the ball
    pub captured: u32,
    /// Trials ending out of bounds
    pub out_of_bounds: u32,
    /// Trials ending out of time
    pub out_of_time: u32,
}

impl TrialStats {
    /// Average frames per trial, NaN before the first trial
    pub fn avg_frames_per_trial(&self) -> f64 {
        if self.trials > 0 {
            self.frames as f64 / self.trials as f64
        } else {
            f64::NAN
        }
    }

    /// Average frames per goal, NaN before the first goal
    pub fn avg_frames_per_goal(&self) -> f64 {
        if self.goals > 0 {
            self.goal_frames as f64 / self.goals as f64
        } else {
            f64::NAN
        }
    }

    fn record(&mut self, outcome: TrialOutcome, trial_frames: u64) {
        match outcome {
            TrialOutcome::Goal => {
                self.goals += 1;
                self.goal_frames += trial_frames;
            }
            TrialOutcome::OutOfBounds => self.out_of_bounds += 1,
            TrialOutcome::CapturedByDefense => self.captured += 1,
            TrialOutcome::OutOfTime => self.out_of_time += 1,
        }
        self.trials += 1;
        self.frames += trial_frames;
    }
}

impl Display for TrialStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "TotalFrames = {}, AvgFramesPerTrial = {:.1}, AvgFramesPerGoal = {:.1}",
            self.frames,
            self.avg_frames_per_trial(),
            self.avg_frames_per_goal()
        )?;
        writeln!(f, "Trials             : {}", self.trials)?;
        writeln!(f, "Goals              : {}", self.goals)?;
        writeln!(f, "Defense Captured   : {}", self.captured)?;
        writeln!(f, "Balls Out of Bounds: {}", self.out_of_bounds)?;
        write!(f, "Out of Time        : {}", self.out_of_time)
    }
}

/// Budgets of a run. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialLimits {
    /// Stop after this many trials
    pub max_trials: Option<u32>,
    /// Stop once finished trials add up to this many frames
    pub max_frames: Option<u64>,
    /// A single trial ends out of time after this many frames
    pub max_frames_per_trial: Option<u32>,
}

/// Players placed on the field at every reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Squads {
    /// Offensive players, at internal indices `1..=num_offense`
    pub num_offense: usize,
    /// Defensive players, at internal indices `0..num_defense`
    pub num_defense: usize,
    /// Offensive player moved onto the ball after placement
    pub on_ball: Option<usize>,
}

/// Where the lifecycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    /// Waiting for `start`
    Setup,
    /// A trial is being played
    Live,
    /// The field was just reset; the next frame starts a new trial
    Resetting,
    /// A budget was reached
    Finished,
}

/// What a frame changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The trial goes on
    Continue,
    /// The trial ended and the field must be reset with `commands`
    Reset {
        /// Why the trial ended
        outcome: TrialOutcome,
        /// Commands to send, in order
        commands: Vec<Command>,
    },
    /// The trial ended and the run is over
    Finished {
        /// Why the last trial ended
        outcome: TrialOutcome,
        /// Which budget was reached
        reason: DoneReason,
        /// Commands to send before shutting down
        commands: Vec<Command>,
    },
}

/// The trial state machine, generic over its random source.
#[derive(Debug)]
pub struct TrialLifecycle<R> {
    state: TrialState,
    stats: TrialStats,
    limits: TrialLimits,
    squads: Squads,
    roster: RosterMap,
    area: PlayableArea,
    goal_width: f64,
    rng: R,
    last_trial_start: u32,
    last_touch: u32,
}

impl<R: Rng> TrialLifecycle<R> {
    /// Creates a lifecycle in [`TrialState::Setup`].
    pub fn new(
        roster: RosterMap,
        squads: Squads,
        limits: TrialLimits,
        params: &ServerParams,
        rng: R,
    ) -> Self {
        TrialLifecycle {
            state: TrialState::Setup,
            stats: TrialStats::default(),
            limits,
            squads,
            roster,
            area: PlayableArea::HALF_FIELD,
            goal_width: params.number("goal_width").unwrap_or(DEFAULT_GOAL_WIDTH),
            rng,
            last_trial_start: 0,
            last_touch: 0,
        }
    }

    /// Takes the goal width from parameters announced after construction
    pub fn apply_params(&mut self, params: &ServerParams) {
        if let Some(width) = params.number("goal_width") {
            self.goal_width = width;
        }
    }

    /// Replaces the playable area
    pub fn with_area(mut self, area: PlayableArea) -> Self {
        self.area = area;
        self
    }

    /// Current state
    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Results so far
    pub fn stats(&self) -> &TrialStats {
        &self.stats
    }

    /// True while a trial is played or being reset
    pub fn is_playing(&self) -> bool {
        matches!(self.state, TrialState::Live | TrialState::Resetting)
    }

    /// Starts the first trial at `frame` and returns the placement commands.
    #[instrument(skip(self))]
    pub fn start(&mut self, frame: u32) -> Vec<Command> {
        self.last_trial_start = frame;
        self.last_touch = frame;
        self.state = TrialState::Live;
        info!("starting first trial");
        self.reset_commands()
    }

    /// Classifies the ball situation at `frame`, ignoring the settle window.
    ///
    /// Conditions are checked in priority order; the first match wins.
    pub fn classify(&self, frame: u32, ball: Vector2, holder: Option<Holder>) -> Option<TrialOutcome> {
        if self.is_goal(ball) {
            Some(TrialOutcome::Goal)
        } else if self.area.excludes(ball) {
            Some(TrialOutcome::OutOfBounds)
        } else if holder.is_some_and(|h| h.side == Side::Defense) {
            Some(TrialOutcome::CapturedByDefense)
        } else if self.is_out_of_time(frame) {
            Some(TrialOutcome::OutOfTime)
        } else {
            None
        }
    }

    fn is_goal(&self, ball: Vector2) -> bool {
        ball.x > self.area.x.max && ball.y.abs() <= 0.5 * self.goal_width
    }

    fn is_out_of_time(&self, frame: u32) -> bool {
        frame.saturating_sub(self.last_touch) > UNTOUCHED_LENGTH
            || self
                .limits
                .max_frames_per_trial
                .is_some_and(|max| frame.saturating_sub(self.last_trial_start) > max)
    }

    /// Advances the lifecycle by one simulation frame.
    ///
    /// `holder` is this frame's result of the possession tracker.
    pub fn step(&mut self, frame: u32, ball: Vector2, holder: Option<Holder>) -> Transition {
        match self.state {
            TrialState::Setup | TrialState::Finished => return Transition::Continue,
            TrialState::Resetting => self.state = TrialState::Live,
            TrialState::Live => {}
        }
        if holder.is_some() {
            self.last_touch = frame;
        }
        if frame.saturating_sub(self.last_trial_start) < SETTLE_FRAMES {
            return Transition::Continue;
        }
        let Some(outcome) = self.classify(frame, ball, holder) else {
            return Transition::Continue;
        };

        let trial_frames = u64::from(frame.saturating_sub(self.last_trial_start));
        self.stats.record(outcome, trial_frames);
        self.last_trial_start = frame;
        self.last_touch = frame;
        info!(
            "EndOfTrial: {} / {} {} {}",
            self.stats.goals, self.stats.trials, frame, outcome
        );

        let mut commands = vec![Command::Say(outcome.say_token().to_string())];
        if let Some(reason) = self.budget_reached() {
            self.state = TrialState::Finished;
            return Transition::Finished {
                outcome,
                reason,
                commands,
            };
        }
        commands.extend(self.reset_commands());
        self.state = TrialState::Resetting;
        Transition::Reset { outcome, commands }
    }

    fn budget_reached(&self) -> Option<DoneReason> {
        if self.limits.max_trials.is_some_and(|max| self.stats.trials >= max) {
            Some(DoneReason::TrialBudget)
        } else if self.limits.max_frames.is_some_and(|max| self.stats.frames >= max) {
            Some(DoneReason::FrameBudget)
        } else {
            None
        }
    }

    fn reset_commands(&mut self) -> Vec<Command> {
        let ball = self.random_ball_position();
        let mut commands = vec![Command::MoveBall(ball)];

        let offense = self.roster.team(Side::Offense).clone();
        for index in 1..=self.squads.num_offense {
            let pos = self.offense_position(ball);
            commands.push(Self::move_player(offense.name(), offense.order()[index], pos));
        }
        if let Some(index) = self.squads.on_ball {
            commands.push(Self::move_player(offense.name(), offense.order()[index], ball));
        }

        let defense = self.roster.team(Side::Defense).clone();
        if self.squads.num_defense > 0 {
            let goal = Vector2::new(0.5 * PITCH_LENGTH, 0.0);
            commands.push(Self::move_player(defense.name(), defense.order()[0], goal));
        }
        for index in 1..self.squads.num_defense {
            let pos = self.defense_position();
            commands.push(Self::move_player(defense.name(), defense.order()[index], pos));
        }

        commands.push(Command::Recover);
        commands.push(Command::play_on());
        debug!(?ball, n = commands.len(), "field reset");
        commands
    }

    fn move_player(team: &str, unum: u8, pos: Vector2) -> Command {
        Command::MovePlayer {
            team: team.to_string(),
            unum,
            pos,
        }
    }

    fn random_point(&mut self, x: Range, y: Range) -> Vector2 {
        let p = Vector2::new(x.lerp(self.rng.random()), y.lerp(self.rng.random()));
        self.area.clamp(p)
    }

    fn random_ball_position(&mut self) -> Vector2 {
        let x = self.area.x.scaled(0.2, 0.05 * PITCH_LENGTH);
        let y = self.area.y.scaled(0.8, 0.0);
        self.random_point(x, y)
    }

    fn offense_position(&mut self, ball: Vector2) -> Vector2 {
        let (ox, oy) = OFFENSE_OFFSETS[self.rng.random_range(0..OFFENSE_OFFSETS.len())];
        let jitter = Vector2::new(self.rng.random(), self.rng.random());
        let offset = (jitter + Vector2::new(ox, oy)) * (0.1 * PITCH_LENGTH);
        self.area.clamp(ball + offset)
    }

    fn defense_position(&mut self) -> Vector2 {
        let x = Range::new(0.25 * PITCH_LENGTH, 0.375 * PITCH_LENGTH);
        let y = self.area.y.scaled(0.8, 0.0);
        self.random_point(x, y)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::server_params::ParamValue;

    const MIDFIELD: Vector2 = Vector2::new(10.0, 0.0);

    fn lifecycle(limits: TrialLimits, seed: u64) -> TrialLifecycle<StdRng> {
        let params = ServerParams::default().with("goal_width", ParamValue::Float(14.02));
        TrialLifecycle::new(
            RosterMap::build("base_left", "base_right"),
            Squads {
                num_offense: 2,
                num_defense: 3,
                on_ball: None,
            },
            limits,
            &params,
            StdRng::seed_from_u64(seed),
        )
    }

    fn ball_moves(commands: &[Command]) -> Vec<Vector2> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::MoveBall(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn goal_has_priority_over_out_of_bounds() {
        let trial = lifecycle(TrialLimits::default(), 0);
        let ball = Vector2::new(53.0, 1.0);
        assert!(PlayableArea::HALF_FIELD.excludes(ball));
        assert_eq!(trial.classify(0, ball, None), Some(TrialOutcome::Goal));
        assert_eq!(
            trial.classify(0, Vector2::new(53.0, 20.0), None),
            Some(TrialOutcome::OutOfBounds)
        );
    }

    #[test]
    fn capture_beats_out_of_time() {
        let trial = lifecycle(TrialLimits::default(), 0);
        let defender = Some(Holder {
            side: Side::Defense,
            index: 2,
        });
        assert_eq!(
            trial.classify(500, MIDFIELD, defender),
            Some(TrialOutcome::CapturedByDefense)
        );
        let attacker = Some(Holder {
            side: Side::Offense,
            index: 1,
        });
        assert_eq!(trial.classify(50, MIDFIELD, attacker), None);
    }

    #[test]
    fn goal_scenario_resets_the_field() {
        let mut trial = lifecycle(TrialLimits::default(), 7);
        let start = trial.start(100);
        assert_eq!(ball_moves(&start).len(), 1);

        let goal = Vector2::new(0.5 * PITCH_LENGTH + 0.6, 0.0);
        // inside the settle window nothing is decided
        assert_eq!(trial.step(102, goal, None), Transition::Continue);

        let Transition::Reset { outcome, commands } = trial.step(105, goal, None) else {
            panic!("trial should have ended");
        };
        assert_eq!(outcome, TrialOutcome::Goal);
        assert_eq!(trial.stats().goals, 1);
        assert_eq!(trial.stats().trials, 1);
        assert_eq!(trial.stats().goal_frames, 5);
        assert_eq!(commands[0], Command::Say("GOAL".into()));
        assert_eq!(commands.last(), Some(&Command::play_on()));
        assert!(commands.contains(&Command::Recover));

        let moved = ball_moves(&commands);
        assert_eq!(moved.len(), 1);
        assert_ne!(moved[0], goal);
        assert!((5.0..=16.0).contains(&moved[0].x), "{:?}", moved[0]);
        assert!(moved[0].y.abs() <= 0.8 * 34.0);
        let players = commands
            .iter()
            .filter(|c| matches!(c, Command::MovePlayer { .. }))
            .count();
        assert_eq!(players, 2 + 3);
        assert_eq!(trial.state(), TrialState::Resetting);
    }

    #[test]
    fn untouched_ball_runs_out_of_time() {
        let mut trial = lifecycle(TrialLimits::default(), 1);
        trial.start(0);
        for frame in 1..=UNTOUCHED_LENGTH {
            assert_eq!(trial.step(frame, MIDFIELD, None), Transition::Continue);
        }
        let transition = trial.step(UNTOUCHED_LENGTH + 1, MIDFIELD, None);
        assert!(matches!(
            transition,
            Transition::Reset {
                outcome: TrialOutcome::OutOfTime,
                ..
            }
        ));
        assert_eq!(trial.stats().out_of_time, 1);
        assert_eq!(trial.stats().frames, u64::from(UNTOUCHED_LENGTH + 1));
    }

    #[test]
    fn touching_the_ball_extends_the_trial() {
        let mut trial = lifecycle(TrialLimits::default(), 1);
        trial.start(0);
        let attacker = Some(Holder {
            side: Side::Offense,
            index: 1,
        });
        assert_eq!(trial.step(60, MIDFIELD, attacker), Transition::Continue);
        assert_eq!(trial.step(150, MIDFIELD, None), Transition::Continue);
        assert_ne!(trial.step(161, MIDFIELD, None), Transition::Continue);
    }

    #[test]
    fn frame_limit_per_trial() {
        let limits = TrialLimits {
            max_frames_per_trial: Some(20),
            ..Default::default()
        };
        let mut trial = lifecycle(limits, 1);
        trial.start(0);
        let attacker = Some(Holder {
            side: Side::Offense,
            index: 1,
        });
        assert_eq!(trial.step(20, MIDFIELD, attacker), Transition::Continue);
        assert!(matches!(
            trial.step(21, MIDFIELD, attacker),
            Transition::Reset {
                outcome: TrialOutcome::OutOfTime,
                ..
            }
        ));
    }

    #[test]
    fn trial_budget_finishes_the_run() {
        let limits = TrialLimits {
            max_trials: Some(2),
            ..Default::default()
        };
        let mut trial = lifecycle(limits, 3);
        trial.start(0);
        let out = Vector2::new(20.0, 40.0);
        assert!(matches!(trial.step(10, out, None), Transition::Reset { .. }));
        // first frame after a reset only re-enters Live
        assert_eq!(trial.step(11, out, None), Transition::Continue);
        assert_eq!(trial.state(), TrialState::Live);
        let Transition::Finished {
            outcome,
            reason,
            commands,
        } = trial.step(20, out, None)
        else {
            panic!("run should be finished");
        };
        assert_eq!(outcome, TrialOutcome::OutOfBounds);
        assert_eq!(reason, DoneReason::TrialBudget);
        assert_eq!(commands, vec![Command::Say("OUT_OF_BOUNDS".into())]);
        assert_eq!(trial.state(), TrialState::Finished);
        assert_eq!(trial.step(40, out, None), Transition::Continue);
        assert_eq!(trial.stats().out_of_bounds, 2);
    }

    #[test]
    fn placements_are_reproducible() {
        let mut a = lifecycle(TrialLimits::default(), 42);
        let mut b = lifecycle(TrialLimits::default(), 42);
        assert_eq!(a.start(0), b.start(0));
        let mut c = lifecycle(TrialLimits::default(), 43);
        assert_ne!(a.start(0), c.start(0));
    }

    #[test]
    fn defense_goalie_guards_the_goal_and_agent_takes_the_ball() {
        let params = ServerParams::default();
        let mut trial = TrialLifecycle::new(
            RosterMap::build("base_left", "base_right"),
            Squads {
                num_offense: 1,
                num_defense: 1,
                on_ball: Some(1),
            },
            TrialLimits::default(),
            &params,
            StdRng::seed_from_u64(0),
        );
        let commands = trial.start(0);
        let ball = ball_moves(&commands)[0];
        assert!(commands.contains(&Command::MovePlayer {
            team: "base_right".into(),
            unum: 1,
            pos: Vector2::new(52.5, 0.0),
        }));
        assert!(commands.contains(&Command::MovePlayer {
            team: "base_left".into(),
            unum: 11,
            pos: ball,
        }));
    }

    #[test]
    fn stats_report() {
        let stats = TrialStats {
            trials: 4,
            frames: 400,
            goals: 1,
            goal_frames: 50,
            captured: 1,
            out_of_bounds: 1,
            out_of_time: 1,
        };
        let report = stats.to_string();
        assert!(report.starts_with("TotalFrames = 400, AvgFramesPerTrial = 100.0, AvgFramesPerGoal = 50.0"));
        assert!(report.contains("Goals              : 1"));
        assert!(TrialStats::default().avg_frames_per_goal().is_nan());
    }
}
