//! Session Controller
//!
//! Drives one tutoring session over a [`RobotProxy`]: spoken login, then each
//! configured puzzle in turn until it is solved or skipped, with hints fetched
//! from the hint generator whenever the user says something that is neither
//! an answer nor a control word.
//!
//! Every robot side effect goes through the command channel; the only other
//! effects are the hint and analytics collaborator calls.

use crate::{channel::Transport, robot::RobotProxy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tutor_core::{
    analytics::AnalyticsSink,
    hint::HintGenerator,
    puzzle::Puzzle,
    store::{CredentialStore, PuzzleStore, StoreError},
    user::User,
};

/// Spoken digits accepted while capturing a PIN, indexed by value.
pub const DIGIT_WORDS: [&str; 10] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

const REPROMPT: &str = "I'm listening. Say the answer, or ask for a hint.";
const SKIPPING: &str = "Okay, skipping this one.";
const HINT_APOLOGY: &str = "I'm sorry, I couldn't come up with a hint right now. Give it another try!";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub puzzle_ids: Vec<String>,
    pub login_vocabulary: Vec<String>,
    pub login_timeout: Duration,
    pub answer_timeout: Duration,
    pub pin_length: usize,
    pub max_login_attempts: u32,
    /// Consecutive silent listens tolerated before a puzzle is skipped.
    pub max_reprompts: u32,
    pub inter_puzzle_pause: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            puzzle_ids: vec![
                "puzzle_01".to_string(),
                "puzzle_02".to_string(),
                "puzzle_03".to_string(),
            ],
            login_vocabulary: vec!["Alex".to_string(), "DrEvans".to_string()],
            login_timeout: Duration::from_secs(10),
            answer_timeout: Duration::from_secs(15),
            pin_length: 4,
            max_login_attempts: 2,
            max_reprompts: 5,
            inter_puzzle_pause: Duration::from_secs(2),
        }
    }
}

/// The external services a session talks to besides the robot.
#[derive(Clone)]
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialStore>,
    pub puzzles: Arc<dyn PuzzleStore>,
    pub hints: Arc<dyn HintGenerator>,
    pub analytics: Arc<dyn AnalyticsSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PuzzleState {
    Presented,
    AwaitingInput,
    HintRequested,
    Solved,
    Skipped,
}

impl PuzzleState {
    pub fn is_finished(self) -> bool {
        matches!(self, PuzzleState::Solved | PuzzleState::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingLogin { attempt: u32 },
    Authenticating { username: String },
    LoginFailed,
    SessionActive { puzzle_index: usize, puzzle: PuzzleState },
    SessionComplete,
}

/// What the user's reply means for the open puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance<'a> {
    Silence,
    Answer(&'a str),
    Skip,
    HintRequest(&'a str),
}

impl<'a> Utterance<'a> {
    pub fn classify(puzzle: &Puzzle, heard: &'a str) -> Self {
        let word = heard.trim();
        if word.is_empty() {
            Utterance::Silence
        } else if puzzle.is_solution(word) {
            Utterance::Answer(word)
        } else if word.eq_ignore_ascii_case("quit") || word.eq_ignore_ascii_case("skip") {
            Utterance::Skip
        } else {
            // "hint", "help" and anything unexpected all ask for help.
            Utterance::HintRequest(word)
        }
    }
}

/// Per-login bookkeeping, dropped when the controller is.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub puzzle_index: usize,
    /// Set while a hint call is in flight.
    pub pending_hint: Option<Instant>,
    pub hints_given: u32,
    pub solved: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    LoginFailed,
    Completed { solved: u32, skipped: u32 },
}

pub struct SessionController<T: Transport> {
    robot: RobotProxy<T>,
    collaborators: Collaborators,
    settings: SessionSettings,
    state: SessionState,
    session: Option<Session>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(robot: RobotProxy<T>, collaborators: Collaborators, settings: SessionSettings) -> Self {
        Self {
            robot,
            collaborators,
            settings,
            state: SessionState::AwaitingLogin { attempt: 1 },
            session: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn robot(&self) -> &RobotProxy<T> {
        &self.robot
    }

    /// Runs login and, if it succeeds, every configured puzzle.
    ///
    /// Only a credential or puzzle store failure is returned as an error;
    /// robot failures are logged by the channel and the session carries on.
    pub async fn run(&mut self) -> Result<SessionOutcome, StoreError> {
        let Some(user) = self.login().await? else {
            return Ok(SessionOutcome::LoginFailed);
        };
        self.start_session(user);

        let puzzle_ids = self.settings.puzzle_ids.clone();
        for (index, puzzle_id) in puzzle_ids.iter().enumerate() {
            self.run_puzzle(index, puzzle_id).await?;
            if index + 1 < puzzle_ids.len() {
                tokio::time::sleep(self.settings.inter_puzzle_pause).await;
                self.robot.say("Great! Let's try the next one.").await;
            }
        }

        self.robot
            .say("You've completed all the puzzles for today! You did a fantastic job. Goodbye!")
            .await;
        self.robot.rest().await;
        self.state = SessionState::SessionComplete;

        let (solved, skipped) = self
            .session
            .as_ref()
            .map(|s| (s.solved, s.skipped))
            .unwrap_or_default();
        info!(solved, skipped, "Puzzle session finished successfully.");
        Ok(SessionOutcome::Completed { solved, skipped })
    }

    /// Asks for a username and a spoken PIN, retrying up to
    /// `max_login_attempts` times. Returns `None` once attempts run out.
    async fn login(&mut self) -> Result<Option<User>, StoreError> {
        self.robot.say("Hello, please say your username to begin.").await;

        for attempt in 1..=self.settings.max_login_attempts {
            self.state = SessionState::AwaitingLogin { attempt };
            if attempt > 1 {
                self.robot.say("Let's try again. Please say your username.").await;
            }

            let vocabulary = self.settings.login_vocabulary.clone();
            let username = self.robot.listen(&vocabulary, self.settings.login_timeout).await;
            if username.is_empty() {
                warn!(attempt, "No username heard");
                self.robot.say("I didn't hear a valid name.").await;
                continue;
            }

            self.state = SessionState::Authenticating {
                username: username.clone(),
            };
            self.robot
                .say(&format!(
                    "Welcome, {}. Please say your PIN, one digit at a time.",
                    username
                ))
                .await;

            let Some(pin) = self.capture_pin().await else {
                warn!(attempt, username = %username, "PIN capture incomplete");
                self.robot.say("I didn't catch your whole PIN.").await;
                continue;
            };

            match self.collaborators.credentials.authenticate(&username, &pin).await? {
                Some(user) => {
                    info!(user_id = user.id, username = %user.username, "User authenticated");
                    self.robot.say("Login successful. Let's begin the session.").await;
                    return Ok(Some(user));
                }
                None => {
                    warn!(attempt, username = %username, "Authentication failed");
                    self.robot.say("That didn't match my records.").await;
                }
            }
        }

        self.state = SessionState::LoginFailed;
        error!(
            attempts = self.settings.max_login_attempts,
            "Login failed; ending session"
        );
        self.robot
            .say("I'm sorry, I could not verify your identity. Goodbye.")
            .await;
        self.robot.rest().await;
        Ok(None)
    }

    /// Listens for `pin_length` digit words. Any silence aborts the capture.
    async fn capture_pin(&mut self) -> Option<String> {
        let vocabulary: Vec<String> = DIGIT_WORDS.iter().map(|w| w.to_string()).collect();
        let mut pin = String::with_capacity(self.settings.pin_length);
        for _ in 0..self.settings.pin_length {
            let word = self.robot.listen(&vocabulary, self.settings.login_timeout).await;
            let digit = DIGIT_WORDS
                .iter()
                .position(|d| d.eq_ignore_ascii_case(word.trim()))?;
            pin.push_str(&digit.to_string());
        }
        Some(pin)
    }

    /// Opens a session for an already authenticated user.
    pub fn start_session(&mut self, user: User) {
        info!(user_id = user.id, username = %user.username, "Session started");
        self.session = Some(Session {
            user,
            puzzle_index: 0,
            pending_hint: None,
            hints_given: 0,
            solved: 0,
            skipped: 0,
        });
    }

    async fn run_puzzle(&mut self, index: usize, puzzle_id: &str) -> Result<PuzzleState, StoreError> {
        let username = self
            .session
            .as_mut()
            .map(|s| {
                s.puzzle_index = index;
                s.user.username.clone()
            })
            .unwrap_or_default();
        info!(puzzle_id, user = %username, "--- Starting puzzle ---");

        let Some(puzzle) = self.collaborators.puzzles.get_puzzle(puzzle_id).await? else {
            error!(puzzle_id, "Could not find puzzle; skipping it");
            self.finish_puzzle(index, PuzzleState::Skipped);
            return Ok(PuzzleState::Skipped);
        };

        self.state = SessionState::SessionActive {
            puzzle_index: index,
            puzzle: PuzzleState::Presented,
        };
        self.robot.show_image(&puzzle.image_ref).await;
        self.robot.say(&puzzle.question).await;

        let vocabulary = puzzle.vocabulary();
        let mut silences = 0;
        loop {
            self.state = SessionState::SessionActive {
                puzzle_index: index,
                puzzle: PuzzleState::AwaitingInput,
            };
            let heard = self.robot.listen(&vocabulary, self.settings.answer_timeout).await;

            if Utterance::classify(&puzzle, &heard) == Utterance::Silence {
                silences += 1;
                if silences > self.settings.max_reprompts {
                    warn!(puzzle_id, silences, "No answer after repeated prompts; skipping puzzle");
                    self.robot.say("Let's leave this one for another time.").await;
                    self.finish_puzzle(index, PuzzleState::Skipped);
                    return Ok(PuzzleState::Skipped);
                }
            } else {
                silences = 0;
            }

            let next = self.handle_utterance(&puzzle, &heard).await;
            if next.is_finished() {
                self.finish_puzzle(index, next);
                return Ok(next);
            }
        }
    }

    fn finish_puzzle(&mut self, index: usize, outcome: PuzzleState) {
        if let Some(session) = self.session.as_mut() {
            match outcome {
                PuzzleState::Solved => session.solved += 1,
                _ => session.skipped += 1,
            }
        }
        self.state = SessionState::SessionActive {
            puzzle_index: index,
            puzzle: outcome,
        };
    }

    /// Reacts to one reply while `puzzle` is open and returns the puzzle's
    /// next state. A hint request ends back in `AwaitingInput`.
    pub async fn handle_utterance(&mut self, puzzle: &Puzzle, heard: &str) -> PuzzleState {
        let puzzle_index = self.session.as_ref().map(|s| s.puzzle_index).unwrap_or_default();

        let next = match Utterance::classify(puzzle, heard) {
            Utterance::Silence => {
                self.robot.say(REPROMPT).await;
                PuzzleState::AwaitingInput
            }
            Utterance::Answer(word) => {
                self.robot.play_animation("celebrate").await;
                self.robot
                    .say(&format!("That's it! The answer is {}. Excellent work!", word))
                    .await;
                PuzzleState::Solved
            }
            Utterance::Skip => {
                self.robot.say(SKIPPING).await;
                PuzzleState::Skipped
            }
            Utterance::HintRequest(input) => {
                self.state = SessionState::SessionActive {
                    puzzle_index,
                    puzzle: PuzzleState::HintRequested,
                };
                self.request_hint(puzzle, input).await;
                PuzzleState::AwaitingInput
            }
        };

        self.state = SessionState::SessionActive {
            puzzle_index,
            puzzle: next,
        };
        next
    }

    async fn request_hint(&mut self, puzzle: &Puzzle, input: &str) {
        self.robot.play_animation("thinking").await;
        self.robot
            .say("That's a good thought. Let me check for a hint.")
            .await;

        let Some(session) = self.session.as_mut() else {
            error!("Hint requested without an active session");
            self.robot.say(HINT_APOLOGY).await;
            return;
        };

        let hints = &self.collaborators.hints;
        let started = Instant::now();
        session.pending_hint = Some(started);
        let hint = hints.generate_hint(puzzle, input, &session.user.profile).await;
        let elapsed = started.elapsed().as_secs_f64();
        session.pending_hint = None;
        session.hints_given += 1;
        let user_id = session.user.id;

        if let Err(e) = self
            .collaborators
            .analytics
            .record(user_id, hints.model_name(), elapsed)
            .await
        {
            warn!(error = %e, "Failed to record hint analytics");
        }

        let line = match hint {
            Ok(hint) => hint,
            Err(e) => {
                error!(error = %e, puzzle_id = %puzzle.id, "Hint generation failed");
                HINT_APOLOGY.to_string()
            }
        };
        self.robot.say(&line).await;
    }
}
