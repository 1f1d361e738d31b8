use super::{AppState, LaserFenceApp};
use crate::archive::{DiskArchiver, SessionMetadata};
use crate::capture::{CaptureSession, PairCaptureLoop, SessionOutcome};
use crate::emitter::ResultEmitter;
use crate::error::{LaserFenceError, Result};
use crate::judge::PassFailJudge;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

impl LaserFenceApp {
    /// Run one capture session with signal handling
    ///
    /// The session itself is synchronous and runs on the blocking pool;
    /// SIGINT and SIGTERM only cancel the token it polls.
    pub async fn run(self) -> Result<SessionOutcome> {
        let token = self.cancellation_token();
        setup_signal_handlers(token.clone());

        let mut app = self;
        let result = tokio::task::spawn_blocking(move || app.run_blocking())
            .await
            .map_err(|e| LaserFenceError::system(format!("Capture task failed: {}", e)))?;

        // Release the signal listeners
        token.cancel();
        result
    }

    /// Start, capture and shut down on the current thread
    pub fn run_blocking(&mut self) -> Result<SessionOutcome> {
        let result = self
            .start()
            .and_then(|session| self.capture(session));

        let clean = self.shutdown();
        if !clean {
            warn!("Camera did not shut down cleanly");
        }

        match &result {
            Ok(outcome) => info!(
                "Session finished: {} pairs, {:?}",
                outcome.pairs_completed, outcome.reason
            ),
            Err(e) => {
                error!("Session failed: {}", e);
                self.set_state(AppState::Failed);
            }
        }
        result
    }

    fn capture(&mut self, session: CaptureSession) -> Result<SessionOutcome> {
        let config = self.config.clone();
        let mut metadata = SessionMetadata::start(
            self.camera.family(),
            config.mask,
            config.session.capture_count,
        );

        let mut emitter = ResultEmitter::new(&mut self.output);
        let outcome = PairCaptureLoop::new(
            self.camera.as_mut(),
            session,
            config.mask,
            &mut emitter,
            self.cancellation_token.clone(),
        )?
        .with_trigger(&config.camera.trigger)
        .with_max_pair_retries(config.session.max_pair_retries)
        .with_judge(config.judge.threshold.map(PassFailJudge::new))
        .with_archiver(DiskArchiver::new(&config.archive, &config.mask))
        .run()?;

        if session.is_batch() && config.archive.save_metadata {
            metadata.finish(&outcome);
            DiskArchiver::new(&config.archive, &config.mask).write_metadata(&metadata)?;
        }

        Ok(outcome)
    }
}

fn setup_signal_handlers(token: CancellationToken) {
    // Handle SIGTERM (systemd stop) - Unix only
    #[cfg(unix)]
    {
        let token = token.clone();
        tokio::spawn(async move {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };
            tokio::select! {
                Some(()) = sigterm.recv() => {
                    info!("Received SIGTERM signal");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        });
    }

    // Handle SIGINT (Ctrl+C) - Cross-platform
    tokio::spawn(async move {
        tokio::select! {
            Ok(()) = signal::ctrl_c() => {
                info!("Received SIGINT signal (Ctrl+C)");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}
