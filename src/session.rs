use std::{
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use log::{debug, info, trace, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
    sync::Mutex,
    time::{timeout, Instant},
};

use crate::{
    protocol::{
        self, classify_handshake_line, classify_search_line, EngineCapabilities, HandshakeEvent,
        SearchCollector, SearchEvent,
    },
    types::{
        Candidate, EngineConfig, EngineError, EngineResult, Evaluation, MoveRequest, ProtocolLine,
        SessionState, BUSY_TIMEOUT_FACTOR, CANCEL_GRACE, MAX_CONSECUTIVE_MALFORMED, QUIT_GRACE,
        STARTUP_TIMEOUT,
    },
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Raw outcome of one search, before any selection policy is applied
#[derive(Debug, Clone)]
pub struct EngineReply {
    /// Candidate lines ordered best to worst; never empty
    pub candidates: Vec<Candidate>,
    /// Last evaluation the engine reported for its top line
    pub evaluation: Option<Evaluation>,
}

impl EngineReply {
    /// The engine's top choice, in UCI notation
    pub fn best(&self) -> &str {
        &self.candidates[0].uci
    }
}

/// Managed handle to one running engine process.
///
/// Handles are cheap to clone; all clones refer to the same process. At most
/// one request may be outstanding at a time — a second `request_move` while
/// the session is busy fails with `SessionBusy` rather than queueing.
#[derive(Debug, Clone)]
pub struct EngineSession {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    id: u64,
    config: EngineConfig,
    capabilities: EngineCapabilities,
    state: StdMutex<SessionState>,
    stdin: Mutex<ChildStdin>,
    reader: Mutex<Lines<BufReader<ChildStdout>>>,
    child: Mutex<Option<Child>>,
    last_position: StdMutex<Option<String>>,
    log: StdMutex<Vec<ProtocolLine>>,
}

impl EngineSession {
    /// Spawn the engine process and complete the startup handshake.
    ///
    /// Returns a `Ready` session, or `StartupFailed` / `StartupTimeout` /
    /// `InvalidConfig` with the process already torn down.
    pub async fn start(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        info!("session #{id}: starting engine {:?}", config.path);

        let mut child = spawn_engine(&config.path)?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            EngineError::StartupFailed("engine process has no stdin handle".into())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            EngineError::StartupFailed("engine process has no stdout handle".into())
        })?;
        let mut reader = BufReader::with_capacity(1024, stdout).lines();
        let mut log = Vec::new();

        let capabilities = match timeout(
            STARTUP_TIMEOUT,
            handshake(&mut stdin, &mut reader, &config, &mut log),
        )
        .await
        {
            Ok(Ok(capabilities)) => capabilities,
            Ok(Err(e)) => {
                warn!("session #{id}: handshake failed: {e}");
                let _ = child.kill().await;
                return Err(e);
            }
            Err(_) => {
                warn!("session #{id}: handshake timed out");
                let _ = child.kill().await;
                return Err(EngineError::StartupTimeout);
            }
        };

        if let Err(e) = capabilities.check_config(&config) {
            let _ = child.kill().await;
            return Err(e);
        }

        spawn_stderr_drain(child.stderr.take(), id);
        info!(
            "session #{id}: engine '{}' ready ({} declared options)",
            capabilities.name,
            capabilities.options.len()
        );

        Ok(Self {
            inner: Arc::new(SessionInner {
                id,
                config,
                capabilities,
                state: StdMutex::new(SessionState::Ready),
                stdin: Mutex::new(stdin),
                reader: Mutex::new(reader),
                child: Mutex::new(Some(child)),
                last_position: StdMutex::new(None),
                log: StdMutex::new(log),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn capabilities(&self) -> &EngineCapabilities {
        &self.inner.capabilities
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().unwrap()
    }

    /// Last position sent to the engine, in FEN
    pub fn last_position(&self) -> Option<String> {
        self.inner.last_position.lock().unwrap().clone()
    }

    /// Snapshot of the protocol traffic so far
    pub fn protocol_log(&self) -> Vec<ProtocolLine> {
        self.inner.log.lock().unwrap().clone()
    }

    /// OS process id, while the process is live
    pub async fn process_id(&self) -> Option<u32> {
        self.inner.child.lock().await.as_ref().and_then(|c| c.id())
    }

    /// Whether the engine process is still running
    pub async fn is_alive(&self) -> bool {
        match self.inner.child.lock().await.as_mut() {
            // Err means the status could not be determined; assume alive
            Some(child) => !matches!(child.try_wait(), Ok(Some(_))),
            None => false,
        }
    }

    /// Run one search and return the engine's candidate lines.
    ///
    /// Sends `position` + `go movetime`, then consumes streamed info lines
    /// until the terminating best-move line. Fails with `SessionBusy` if a
    /// request is already outstanding, `Protocol` after too many consecutive
    /// malformed lines, and `EngineCrashed` when the process dies or exceeds
    /// the watchdog deadline — the latter two tear the session down.
    pub async fn request_move(&self, request: &MoveRequest) -> EngineResult<EngineReply> {
        let expected_lines =
            protocol::effective_multi_line(self.inner.config.multi_line_count, &request.position)?;

        self.begin_request()?;
        let guard = BusyGuard {
            inner: self.inner.clone(),
            armed: true,
        };

        debug!(
            "session #{}: searching {} (budget {:?}, {} lines)",
            self.inner.id, request.position, request.time_budget, expected_lines
        );

        let outcome = self.drive_search(request, expected_lines).await;
        guard.disarm();

        match outcome {
            Ok(reply) => {
                self.finish_request();
                Ok(reply)
            }
            Err(e) => {
                warn!("session #{}: search failed: {e}", self.inner.id);
                self.force_kill().await;
                self.mark_crashed_from_busy();
                Err(e)
            }
        }
    }

    /// Ask a busy engine to wind down its current search.
    ///
    /// Cooperative: sends `stop` and waits for the in-flight request to
    /// resolve. If the engine ignores the stop for the whole grace period it
    /// is force-stopped and the session reports `EngineCrashed` on next use.
    pub async fn cancel(&self) -> EngineResult<()> {
        if self.state() != SessionState::Busy {
            debug!("session #{}: cancel with no request in flight", self.inner.id);
            return Ok(());
        }

        info!("session #{}: cancelling in-flight search", self.inner.id);
        {
            let mut stdin = self.inner.stdin.lock().await;
            // A dead pipe just means the in-flight request is about to fail
            let _ = self.send(&mut stdin, "stop\n").await;
        }

        let deadline = Instant::now() + CANCEL_GRACE;
        while Instant::now() < deadline {
            if self.state() != SessionState::Busy {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        warn!(
            "session #{}: engine ignored stop for {:?}, force-stopping",
            self.inner.id, CANCEL_GRACE
        );
        self.force_kill().await;
        self.mark_crashed_from_busy();
        Ok(())
    }

    /// Tear the session down. Idempotent, callable in any state, never fails;
    /// always ends in `Stopped` with no live process.
    pub async fn stop(&self) {
        let prior = {
            let mut state = self.inner.state.lock().unwrap();
            let prior = *state;
            *state = SessionState::Stopping;
            prior
        };

        if prior != SessionState::Stopped {
            info!("session #{}: stopping (was {:?})", self.inner.id, prior);
            let mut stdin = self.inner.stdin.lock().await;
            if self.send(&mut stdin, "quit\n").await.is_ok() {
                tokio::time::sleep(QUIT_GRACE).await;
            }
        }

        self.force_kill().await;
        self.set_state(SessionState::Stopped);
    }

    // =========================================================================
    // Private Implementation
    // =========================================================================

    async fn drive_search(
        &self,
        request: &MoveRequest,
        expected_lines: u16,
    ) -> EngineResult<EngineReply> {
        let budget_ms = request.time_budget.as_millis().max(1);
        {
            let mut stdin = self.inner.stdin.lock().await;
            self.send(&mut stdin, &format!("position fen {}\n", request.position))
                .await?;
            self.send(&mut stdin, &format!("go movetime {budget_ms}\n"))
                .await?;
        }
        *self.inner.last_position.lock().unwrap() = Some(request.position.clone());

        let deadline = Instant::now() + request.time_budget * BUSY_TIMEOUT_FACTOR;
        let mut collector = SearchCollector::new(expected_lines);
        let mut consecutive_malformed = 0u32;
        let mut reader = self.inner.reader.lock().await;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("session #{}: search watchdog expired", self.inner.id);
                return Err(EngineError::EngineCrashed);
            }

            let line = match timeout(remaining, reader.next_line()).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => {
                    warn!("session #{}: engine closed its pipe mid-search", self.inner.id);
                    return Err(EngineError::EngineCrashed);
                }
                Ok(Err(e)) => return Err(map_stream_error(e)),
                Err(_) => {
                    warn!("session #{}: search watchdog expired", self.inner.id);
                    return Err(EngineError::EngineCrashed);
                }
            };

            trace!("session #{} <- {line}", self.inner.id);
            self.inner
                .log
                .lock()
                .unwrap()
                .push(ProtocolLine::Engine(line.clone()));

            match classify_search_line(&line) {
                SearchEvent::Candidate(candidate) => {
                    consecutive_malformed = 0;
                    collector.record(candidate);
                }
                SearchEvent::BestMove { uci } => {
                    let evaluation = collector.reported_evaluation();
                    let candidates = collector.finish(&uci);
                    debug!(
                        "session #{}: bestmove {uci} ({} candidates)",
                        self.inner.id,
                        candidates.len()
                    );
                    return Ok(EngineReply {
                        candidates,
                        evaluation,
                    });
                }
                SearchEvent::Noise => consecutive_malformed = 0,
                SearchEvent::Malformed => {
                    consecutive_malformed += 1;
                    if consecutive_malformed >= MAX_CONSECUTIVE_MALFORMED {
                        return Err(EngineError::Protocol(format!(
                            "{consecutive_malformed} consecutive malformed lines"
                        )));
                    }
                }
            }
        }
    }

    async fn send(&self, stdin: &mut ChildStdin, command: &str) -> EngineResult<()> {
        trace!("session #{} -> {}", self.inner.id, command.trim_end());
        send_command(stdin, command).await?;
        self.inner
            .log
            .lock()
            .unwrap()
            .push(ProtocolLine::Gui(command.trim_end().to_string()));
        Ok(())
    }

    fn begin_request(&self) -> EngineResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        match *state {
            SessionState::Ready => {
                *state = SessionState::Busy;
                Ok(())
            }
            SessionState::Busy | SessionState::Starting => Err(EngineError::SessionBusy),
            SessionState::Crashed | SessionState::Stopping | SessionState::Stopped => {
                Err(EngineError::EngineCrashed)
            }
        }
    }

    /// Busy -> Ready, unless a concurrent stop already moved the state on
    fn finish_request(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if *state == SessionState::Busy {
            *state = SessionState::Ready;
        }
    }

    fn mark_crashed_from_busy(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if *state == SessionState::Busy {
            *state = SessionState::Crashed;
        }
    }

    fn set_state(&self, new_state: SessionState) {
        let mut state = self.inner.state.lock().unwrap();
        if *state != new_state {
            debug!(
                "session #{}: {:?} -> {:?}",
                self.inner.id, *state, new_state
            );
            *state = new_state;
        }
    }

    async fn force_kill(&self) {
        if let Some(mut child) = self.inner.child.lock().await.take() {
            debug!("session #{}: killing engine process", self.inner.id);
            if let Err(e) = child.kill().await {
                warn!("session #{}: kill failed: {e}", self.inner.id);
            }
            if let Err(e) = child.wait().await {
                warn!("session #{}: wait failed: {e}", self.inner.id);
            }
        }
    }
}

/// Restores session sanity when a request future is dropped mid-flight: the
/// engine may still be streaming, so the session cannot be reused.
struct BusyGuard {
    inner: Arc<SessionInner>,
    armed: bool,
}

impl BusyGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("session #{}: request abandoned mid-flight", self.inner.id);
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state == SessionState::Busy {
                *state = SessionState::Crashed;
            }
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = self.inner.clone();
            handle.spawn(async move {
                if let Some(mut child) = inner.child.lock().await.take() {
                    let _ = child.kill().await;
                }
            });
        }
    }
}

// =============================================================================
// Process Plumbing
// =============================================================================

fn spawn_engine(path: &Path) -> EngineResult<Child> {
    debug!("spawning engine process: {path:?}");

    let mut command = Command::new(path);
    command.current_dir(path.parent().unwrap_or_else(|| Path::new(".")));
    command
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .env("TERM", "dumb")
        .kill_on_drop(true);

    command
        .spawn()
        .map_err(|e| EngineError::StartupFailed(format!("cannot spawn {path:?}: {e}")))
}

async fn handshake(
    stdin: &mut ChildStdin,
    reader: &mut Lines<BufReader<ChildStdout>>,
    config: &EngineConfig,
    log: &mut Vec<ProtocolLine>,
) -> EngineResult<EngineCapabilities> {
    let mut capabilities = EngineCapabilities::default();

    send_logged(stdin, "uci\n", log).await?;
    loop {
        let line = match reader.next_line().await.map_err(map_stream_error)? {
            Some(line) => line,
            None => {
                return Err(EngineError::StartupFailed(
                    "engine closed its pipe during handshake".into(),
                ))
            }
        };
        log.push(ProtocolLine::Engine(line.clone()));
        match classify_handshake_line(&line) {
            HandshakeEvent::Id(name) => capabilities.name = name,
            HandshakeEvent::DeclaredOption(opt) => capabilities.options.push(opt),
            HandshakeEvent::UciOk => break,
            HandshakeEvent::ReadyOk | HandshakeEvent::Noise => {}
        }
    }

    for option in &config.options {
        let command = format!("setoption name {} value {}\n", option.name, option.value);
        send_logged(stdin, &command, log).await?;
    }
    if config.multi_line_count > 1 && config.option("MultiPV").is_none() {
        let command = format!("setoption name MultiPV value {}\n", config.multi_line_count);
        send_logged(stdin, &command, log).await?;
    }

    // Synchronize after the configure batch
    send_logged(stdin, "isready\n", log).await?;
    loop {
        let line = match reader.next_line().await.map_err(map_stream_error)? {
            Some(line) => line,
            None => {
                return Err(EngineError::StartupFailed(
                    "engine closed its pipe before readyok".into(),
                ))
            }
        };
        log.push(ProtocolLine::Engine(line.clone()));
        if matches!(classify_handshake_line(&line), HandshakeEvent::ReadyOk) {
            return Ok(capabilities);
        }
    }
}

async fn send_logged(
    stdin: &mut ChildStdin,
    command: &str,
    log: &mut Vec<ProtocolLine>,
) -> EngineResult<()> {
    send_command(stdin, command).await?;
    log.push(ProtocolLine::Gui(command.trim_end().to_string()));
    Ok(())
}

async fn send_command(stdin: &mut ChildStdin, command: &str) -> EngineResult<()> {
    stdin
        .write_all(command.as_bytes())
        .await
        .map_err(map_stream_error)?;
    // Flush immediately so the engine sees the command without delay
    stdin.flush().await.map_err(map_stream_error)?;
    Ok(())
}

fn map_stream_error(e: std::io::Error) -> EngineError {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::UnexpectedEof => EngineError::EngineCrashed,
        _ => EngineError::Io(e),
    }
}

fn spawn_stderr_drain(stderr: Option<ChildStderr>, id: u64) {
    if let Some(stderr) = stderr {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("session #{id} stderr: {line}");
            }
        });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{start_fen, MockEngine};
    use crate::types::STARTUP_TIMEOUT;
    use shakmaty::Color;

    fn request(position: &str, budget_ms: u64) -> MoveRequest {
        MoveRequest {
            position: position.to_string(),
            time_budget: Duration::from_millis(budget_ms),
            side_to_move: Color::White,
        }
    }

    #[tokio::test]
    async fn missing_executable_is_startup_failure() {
        let config = EngineConfig::new("/nonexistent/engine-that-is-not-there");
        let started = std::time::Instant::now();
        let result = EngineSession::start(config).await;
        assert!(matches!(result, Err(EngineError::StartupFailed(_))));
        assert!(started.elapsed() < STARTUP_TIMEOUT);
    }

    #[tokio::test]
    async fn forced_move_round_trip() {
        let mock = MockEngine::builder()
            .reply(&[
                "info depth 5 multipv 1 score cp 0 pv h1h2",
                "bestmove h1h2",
            ])
            .build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();

        let forced = "7k/8/8/8/8/8/7q/7K w - - 0 1";
        let reply = session.request_move(&request(forced, 200)).await.unwrap();
        assert_eq!(reply.best(), "h1h2");
        assert_eq!(reply.evaluation, Some(Evaluation::Centipawns(0)));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.last_position().as_deref(), Some(forced));

        session.stop().await;
    }

    #[tokio::test]
    async fn second_request_while_busy_is_rejected() {
        // Engine that only answers once it is told to stop
        let mock = MockEngine::builder().on_stop("bestmove e2e4").build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();

        let in_flight = {
            let session = session.clone();
            tokio::spawn(async move { session.request_move(&request(start_fen(), 30_000)).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(session.state(), SessionState::Busy);

        let second = session.request_move(&request(start_fen(), 1_000)).await;
        assert!(matches!(second, Err(EngineError::SessionBusy)));

        // Cooperative cancel resolves the first request
        session.cancel().await.unwrap();
        let first = in_flight.await.unwrap().unwrap();
        assert_eq!(first.best(), "e2e4");
        assert_eq!(session.state(), SessionState::Ready);

        session.stop().await;
    }

    #[tokio::test]
    async fn cancel_without_request_is_a_noop() {
        let mock = MockEngine::builder().build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();
        session.cancel().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_leaves_no_process() {
        let mock = MockEngine::builder().build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();
        let pid = session.process_id().await.unwrap();

        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        session.stop().await;
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);

        #[cfg(target_os = "linux")]
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
        let _ = pid;
    }

    #[tokio::test]
    async fn stubborn_engine_is_force_stopped_on_cancel() {
        // Ignores stop and quit entirely
        let mock = MockEngine::builder().ignore_stop().ignore_quit().build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();
        let pid = session.process_id().await.unwrap();

        let in_flight = {
            let session = session.clone();
            tokio::spawn(async move { session.request_move(&request(start_fen(), 60_000)).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        session.cancel().await.unwrap();
        assert_eq!(session.state(), SessionState::Crashed);
        assert!(matches!(
            in_flight.await.unwrap(),
            Err(EngineError::EngineCrashed)
        ));

        // Next use reports the crash
        let next = session.request_move(&request(start_fen(), 1_000)).await;
        assert!(matches!(next, Err(EngineError::EngineCrashed)));

        #[cfg(target_os = "linux")]
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
        let _ = pid;
    }

    #[tokio::test]
    async fn malformed_line_flood_is_a_protocol_error() {
        let mock = MockEngine::builder()
            .reply(&[
                "%% garbage one",
                "%% garbage two",
                "%% garbage three",
                "%% garbage four",
                "%% garbage five",
                "bestmove e2e4",
            ])
            .build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();

        let result = session.request_move(&request(start_fen(), 500)).await;
        assert!(matches!(result, Err(EngineError::Protocol(_))));
        assert_eq!(session.state(), SessionState::Crashed);
    }

    #[tokio::test]
    async fn scattered_malformed_lines_are_absorbed() {
        let mock = MockEngine::builder()
            .reply(&[
                "%% garbage one",
                "%% garbage two",
                "info depth 3 score cp 12 pv e2e4",
                "%% garbage three",
                "%% garbage four",
                "bestmove e2e4",
            ])
            .build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();

        let reply = session.request_move(&request(start_fen(), 500)).await.unwrap();
        assert_eq!(reply.best(), "e2e4");
        assert_eq!(session.state(), SessionState::Ready);
        session.stop().await;
    }

    #[tokio::test]
    async fn hung_engine_trips_the_watchdog() {
        // Never answers `go` at all
        let mock = MockEngine::builder().ignore_stop().build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let result = session.request_move(&request(start_fen(), 100)).await;
        assert!(matches!(result, Err(EngineError::EngineCrashed)));
        // Bounded by budget * factor, with scheduling slack
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(session.state(), SessionState::Crashed);
    }

    #[tokio::test]
    async fn capabilities_are_collected_during_handshake() {
        let mock = MockEngine::builder().build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();
        assert_eq!(session.capabilities().name, "MockEngine");
        assert!(session.capabilities().supports("MultiPV"));
        assert!(session.capabilities().supports("Skill Level"));
        session.stop().await;
    }

    #[tokio::test]
    async fn out_of_range_option_is_rejected_at_start() {
        let mock = MockEngine::builder().build();
        let config = EngineConfig::new(mock.path()).with_option("Skill Level", 19);
        let session = EngineSession::start(config).await.unwrap();
        session.stop().await;

        // Mock declares MultiPV max 500; 9999 must be rejected before Ready
        let config = EngineConfig::new(mock.path()).with_option("MultiPV", 9999);
        let result = EngineSession::start(config).await;
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn protocol_log_records_both_directions() {
        let mock = MockEngine::builder()
            .reply(&["bestmove e2e4"])
            .build();
        let session = EngineSession::start(EngineConfig::new(mock.path()))
            .await
            .unwrap();
        session.request_move(&request(start_fen(), 200)).await.unwrap();

        let log = session.protocol_log();
        let guis: Vec<_> = log
            .iter()
            .filter_map(|l| match l {
                ProtocolLine::Gui(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert!(guis.iter().any(|s| *s == "uci"));
        assert!(guis.iter().any(|s| s.starts_with("position fen")));
        assert!(guis.iter().any(|s| s.starts_with("go movetime")));
        session.stop().await;
    }
}
