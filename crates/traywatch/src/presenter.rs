//! Shows the derived status: a log line per change and, optionally, the icon
//! name in a file that a bar or tray integration can watch.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use traywatch_core::{StatusLevel, Theme};

/// Runs until every status sender is gone.
///
/// The channel's initial value is never shown: nothing is presented until
/// the first status is published after a successful sync.
pub fn spawn_presenter(
    mut status: watch::Receiver<StatusLevel>,
    theme: Theme,
    status_file: Option<PathBuf>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        status.mark_unchanged();
        let mut shown: Option<StatusLevel> = None;
        while status.changed().await.is_ok() {
            let level = *status.borrow_and_update();
            if shown != Some(level) {
                present(level, theme, status_file.as_deref()).await;
                shown = Some(level);
            }
        }
    })
}

async fn present(level: StatusLevel, theme: Theme, status_file: Option<&Path>) {
    let icon = level.icon_name(theme);
    info!(status = %level, icon, "Status changed");

    if let Some(path) = status_file {
        if let Err(e) = write_status_file(path, icon).await {
            warn!(path = %path.display(), error = %e, "Could not write status file");
        }
    }
}

/// Replace the file contents atomically so readers never see a partial write.
pub async fn write_status_file(path: &Path, icon: &str) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, format!("{}\n", icon)).await?;
    tokio::fs::rename(&tmp, path).await
}
