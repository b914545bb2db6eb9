//! Shared fixtures for the async tests: a scriptable mock UCI engine and a
//! shakmaty-backed board implementing the orchestrator's `GameBoard` trait.

use std::{
    fs,
    path::{Path, PathBuf},
};

use shakmaty::{fen::Fen, uci::UciMove, Chess, Color, EnPassantMode, Position};
use tempfile::TempDir;

use crate::{orchestrator::GameBoard, types::EngineResult};

pub fn start_fen() -> &'static str {
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
}

/// A `/bin/sh` stand-in for a UCI engine.
///
/// Speaks a complete handshake, then answers the n-th `go` with the n-th
/// scripted reply block. With no reply configured it stays silent, which is
/// how the hang/cancel/watchdog paths are exercised.
pub struct MockEngine {
    // Held so the scripts survive for the engine's lifetime
    _dir: TempDir,
    script: PathBuf,
}

impl MockEngine {
    pub fn builder() -> MockEngineBuilder {
        MockEngineBuilder {
            replies: Vec::new(),
            stop_reply: None,
            ignore_quit: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.script
    }
}

pub struct MockEngineBuilder {
    replies: Vec<Vec<String>>,
    stop_reply: Option<String>,
    ignore_quit: bool,
}

impl MockEngineBuilder {
    /// Lines emitted in response to the next unanswered `go`
    pub fn reply(mut self, lines: &[&str]) -> Self {
        self.replies.push(lines.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Line emitted when a `stop` arrives (cooperative cancellation)
    pub fn on_stop(mut self, line: &str) -> Self {
        self.stop_reply = Some(line.to_string());
        self
    }

    /// Swallow `stop` without reacting
    pub fn ignore_stop(mut self) -> Self {
        self.stop_reply = None;
        self
    }

    /// Refuse to exit on `quit`, forcing the kill path
    pub fn ignore_quit(mut self) -> Self {
        self.ignore_quit = true;
        self
    }

    pub fn build(self) -> MockEngine {
        let dir = TempDir::new().expect("create mock engine dir");

        for (index, lines) in self.replies.iter().enumerate() {
            let reply_path = dir.path().join(format!("reply_{}.txt", index + 1));
            fs::write(&reply_path, lines.join("\n") + "\n").expect("write reply block");
        }

        let stop_arm = match &self.stop_reply {
            Some(line) => format!("echo \"{line}\""),
            None => ":".to_string(),
        };
        let quit_arm = if self.ignore_quit { ":" } else { "exit 0" };
        let dir_path = dir.path().display();

        let script_text = format!(
            r#"#!/bin/sh
n=0
while IFS= read -r line; do
  case "$line" in
    uci)
      echo "id name MockEngine"
      echo "id author orchestration tests"
      echo "option name MultiPV type spin default 1 min 1 max 500"
      echo "option name Skill Level type spin default 20 min 0 max 20"
      echo "option name UCI_LimitStrength type check default false"
      echo "option name UCI_Elo type spin default 1320 min 1320 max 3190"
      echo "option name Threads type spin default 1 min 1 max 1024"
      echo "option name Hash type spin default 16 min 1 max 1048576"
      echo "uciok"
      ;;
    isready)
      echo "readyok"
      ;;
    go*)
      n=$((n+1))
      if [ -f "{dir_path}/reply_$n.txt" ]; then
        cat "{dir_path}/reply_$n.txt"
      fi
      ;;
    stop)
      {stop_arm}
      ;;
    quit)
      {quit_arm}
      ;;
  esac
done
"#
        );

        let script = dir.path().join("mock-engine.sh");
        fs::write(&script, script_text).expect("write mock engine script");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
                .expect("mark mock engine executable");
        }

        MockEngine { _dir: dir, script }
    }
}

/// Minimal board collaborator backed by shakmaty
pub struct TestBoard {
    position: Chess,
    moves: Vec<String>,
}

impl TestBoard {
    pub fn start() -> Self {
        Self {
            position: Chess::default(),
            moves: Vec::new(),
        }
    }

    /// Moves applied so far, in UCI notation
    pub fn moves(&self) -> &Vec<String> {
        &self.moves
    }
}

impl GameBoard for TestBoard {
    fn current_position(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    fn side_to_move(&self) -> Color {
        self.position.turn()
    }

    fn apply_move(&mut self, uci: &str) -> EngineResult<()> {
        let parsed = UciMove::from_ascii(uci.as_bytes())?;
        let mv = parsed.to_move(&self.position)?;
        self.position.play_unchecked(&mv);
        self.moves.push(uci.to_string());
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.position.is_game_over()
    }
}
