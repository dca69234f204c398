//! Thin OS-level launcher (§6 external interfaces): hands a path to
//! whatever the platform considers "open" or "reveal in file manager".
//! The core never interprets these paths itself — any failure here is
//! non-retryable, so it's reported as [`CoreError::Extraction`] rather
//! than wired into the retry/backoff machinery that real indexing
//! failures use.

use std::path::Path;
use std::process::Command;

use localdoc_core::Error as CoreError;

/// Opens `path` with the platform default application. If `start_time`
/// is given, appends a `#t=` fragment so media players that honor
/// `file://` fragments can seek directly (only meaningful on platforms
/// where the default handler is itself a `file://`-aware player).
pub fn open(path: &Path, start_time: Option<f64>) -> Result<(), CoreError> {
    let target = start_time.map_or_else(
        || path.display().to_string(),
        |t| format!("file://{}#t={}", path.display(), t.floor()),
    );
    spawn_launcher(&target)
}

/// Reveals `path` selected in the platform's file manager.
pub fn reveal(path: &Path) -> Result<(), CoreError> {
    #[cfg(target_os = "macos")]
    {
        run("open", &["-R", &path.display().to_string()])
    }
    #[cfg(target_os = "windows")]
    {
        run("explorer", &[&format!("/select,{}", path.display())])
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let parent = path.parent().unwrap_or(path);
        run("xdg-open", &[&parent.display().to_string()])
    }
}

fn spawn_launcher(target: &str) -> Result<(), CoreError> {
    #[cfg(target_os = "macos")]
    {
        run("open", &[target])
    }
    #[cfg(target_os = "windows")]
    {
        run("cmd", &["/C", "start", "", target])
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        run("xdg-open", &[target])
    }
}

fn run(program: &str, args: &[&str]) -> Result<(), CoreError> {
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| CoreError::Extraction(format!("failed to launch {program}: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(CoreError::Extraction(format!("{program} exited with {status}")))
    }
}
