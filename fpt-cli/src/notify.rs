// Completion notice
// Best-effort desktop notification and sound after a model call returns

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use color_eyre::{
    eyre::{eyre, Context},
    Report, Result,
};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

const TITLE: &str = "Request Finished!";

/// How long a one-shot run waits for its notice before exiting
pub const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Show the notice in the background; failures are only logged.
///
/// Callers that are about to exit should pass the handle to `wait_for_notice`,
/// otherwise the runtime drops the task on shutdown.
pub fn spawn_completion_notice(elapsed: Duration, model: String, sound: Option<PathBuf>) -> JoinHandle<()> {
    spawn_best_effort(async move {
        let message = notice_message(elapsed, &model);
        if let Err(e) = show_notification(TITLE, &message).await {
            debug!(error = %e, "desktop notification failed");
        }
        if let Some(sound) = sound {
            play_sound(&sound)
                .await
                .with_context(|| format!("Failed to play {}", sound.display()))?;
        }
        Ok::<_, Report>(())
    })
}

fn spawn_best_effort<F>(task: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            debug!(error = %e, "completion notice failed");
        }
    })
}

/// Wait up to `limit` for a notice task, then give up on it
pub async fn wait_for_notice(handle: JoinHandle<()>, limit: Duration) {
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "completion notice task panicked"),
        Err(_) => debug!(?limit, "completion notice still running at exit"),
    }
}

fn notice_message(elapsed: Duration, model: &str) -> String {
    format!("Took {:.2} seconds. Model: {}", elapsed.as_secs_f64(), model)
}

/// Quote a string for an AppleScript literal
fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

async fn show_notification(title: &str, message: &str) -> Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        let mut command = Command::new("osascript");
        command.arg("-e").arg(format!(
            "display notification {} with title {}",
            applescript_quote(message),
            applescript_quote(title)
        ));
        command
    } else if cfg!(target_os = "linux") {
        let mut command = Command::new("notify-send");
        command
            .arg("--app-name=fpt")
            .arg("--expire-time=10000")
            .arg(title)
            .arg(message);
        command
    } else {
        return Err(eyre!("Desktop notifications are not supported on this platform"));
    };
    run(&mut command).await
}

async fn play_sound(path: &Path) -> Result<()> {
    let player = if cfg!(target_os = "macos") {
        "afplay"
    } else if cfg!(target_os = "linux") {
        "aplay"
    } else {
        return Err(eyre!("Unable to play notification sound: unsupported platform"));
    };
    run(Command::new(player).arg(path)).await
}

async fn run(command: &mut Command) -> Result<()> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .with_context(|| format!("Failed to spawn {}", program))?;
    if !status.success() {
        return Err(eyre!("{} exited with {}", program, status));
    }
    Ok(())
}
