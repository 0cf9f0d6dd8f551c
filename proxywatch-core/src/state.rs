//! Shared monitoring state and the command executor.
//!
//! [`MonitorState`] holds the armed flag read by the poll loop and written by
//! command handling. It is owned by the server role and shared through an
//! `Arc`; the last-observed proxy values live in [`crate::ChangeMonitor`]
//! because only the poll loop touches them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::command::{encode_response, Command};

/// The armed flag. `true` means proxy changes are logged.
#[derive(Debug)]
pub struct MonitorState {
    armed: AtomicBool,
}

impl MonitorState {
    pub fn new(armed: bool) -> Self {
        Self {
            armed: AtomicBool::new(armed),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Flip the flag from `from` to `!from`. Returns `false` when the flag
    /// already held `!from`.
    fn flip_from(&self, from: bool) -> bool {
        self.armed
            .compare_exchange(from, !from, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Result of executing one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command changed the armed flag.
    Applied,
    /// The requested state already held.
    NoOp,
    /// Quit: the owner must shut the server down. No response is sent.
    Terminate,
    /// The command is not valid here ([`Command::None`]).
    Rejected,
}

impl Outcome {
    /// The byte returned to the client, or `None` when no reply is sent.
    pub fn response_byte(self) -> Option<u8> {
        match self {
            Outcome::Applied => Some(encode_response(true)),
            Outcome::NoOp | Outcome::Rejected => Some(encode_response(false)),
            Outcome::Terminate => None,
        }
    }

    pub fn is_applied(self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Maps commands onto armed-flag transitions.
///
/// Cloning is cheap; every clone drives the same [`MonitorState`]. The socket
/// server and any in-process trigger call [`Executor::execute`] alike.
#[derive(Debug, Clone)]
pub struct Executor {
    state: Arc<MonitorState>,
}

impl Executor {
    pub fn new(state: Arc<MonitorState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    pub fn execute(&self, command: Command) -> Outcome {
        match command {
            Command::Start => {
                if self.state.flip_from(false) {
                    tracing::info!("now monitoring proxy changes");
                    Outcome::Applied
                } else {
                    Outcome::NoOp
                }
            }
            Command::Stop => {
                if self.state.flip_from(true) {
                    tracing::info!("no longer monitoring proxy changes");
                    Outcome::Applied
                } else {
                    Outcome::NoOp
                }
            }
            Command::Quit => {
                tracing::info!("quit requested");
                Outcome::Terminate
            }
            Command::None => Outcome::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn executor(armed: bool) -> Executor {
        Executor::new(Arc::new(MonitorState::new(armed)))
    }

    #[rstest]
    #[case(Command::Start, false, Outcome::Applied, true)]
    #[case(Command::Start, true, Outcome::NoOp, true)]
    #[case(Command::Stop, true, Outcome::Applied, false)]
    #[case(Command::Stop, false, Outcome::NoOp, false)]
    fn start_stop_transitions(
        #[case] cmd: Command,
        #[case] armed_before: bool,
        #[case] expected: Outcome,
        #[case] armed_after: bool,
    ) {
        let exec = executor(armed_before);
        assert_eq!(exec.execute(cmd), expected);
        assert_eq!(exec.state().is_armed(), armed_after);
    }

    #[test]
    fn start_twice_then_stop_twice() {
        let exec = executor(false);
        assert_eq!(exec.execute(Command::Start), Outcome::Applied);
        assert_eq!(exec.execute(Command::Start), Outcome::NoOp);
        assert_eq!(exec.execute(Command::Stop), Outcome::Applied);
        assert_eq!(exec.execute(Command::Stop), Outcome::NoOp);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn quit_terminates_without_touching_the_flag(#[case] armed: bool) {
        let exec = executor(armed);
        let outcome = exec.execute(Command::Quit);
        assert_eq!(outcome, Outcome::Terminate);
        assert_eq!(outcome.response_byte(), None);
        assert_eq!(exec.state().is_armed(), armed);
    }

    #[test]
    fn none_is_rejected_with_a_zero_reply() {
        let exec = executor(false);
        let outcome = exec.execute(Command::None);
        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(outcome.response_byte(), Some(0));
        assert!(!exec.state().is_armed());
    }

    #[test]
    fn clones_share_state() {
        let exec = executor(true);
        let other = exec.clone();
        assert_eq!(other.execute(Command::Stop), Outcome::Applied);
        assert!(!exec.state().is_armed());
        assert_eq!(exec.execute(Command::Stop), Outcome::NoOp);
    }

    #[test]
    fn concurrent_identical_commands_apply_once() {
        for _ in 0..50 {
            let exec = executor(false);
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let exec = exec.clone();
                    std::thread::spawn(move || exec.execute(Command::Start))
                })
                .collect();
            let applied = handles
                .into_iter()
                .map(|h| h.join().expect("join"))
                .filter(|o| o.is_applied())
                .count();
            assert_eq!(applied, 1, "exactly one start should win");
            assert!(exec.state().is_armed());
        }
    }

    #[test]
    fn concurrent_mixed_commands_alternate() {
        for initial in [false, true] {
            for _ in 0..50 {
                let exec = executor(initial);
                let handles: Vec<_> = (0..16)
                    .map(|i| {
                        let exec = exec.clone();
                        let cmd = if i % 2 == 0 { Command::Start } else { Command::Stop };
                        std::thread::spawn(move || (cmd, exec.execute(cmd)))
                    })
                    .collect();

                let (mut starts, mut stops) = (0i32, 0i32);
                for handle in handles {
                    match handle.join().expect("join") {
                        (Command::Start, Outcome::Applied) => starts += 1,
                        (Command::Stop, Outcome::Applied) => stops += 1,
                        (_, outcome) => assert_eq!(outcome, Outcome::NoOp),
                    }
                }

                // Every applied command flipped the flag, so applied starts and
                // stops interleave and differ by at most one.
                let flips = starts + stops;
                assert_eq!(exec.state().is_armed(), initial ^ (flips % 2 == 1));
                let lead = if initial { stops - starts } else { starts - stops };
                assert!(lead == 0 || lead == 1, "starts={starts} stops={stops}");
            }
        }
    }
}
