//! Running grive and turning its output into sync events

use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, trace};

use crate::config::{ConfigKey, ConfigStore};
use crate::error::{GriveUtilsError, Result};
use crate::status::SyncEvent;
use crate::version::GriveBinary;

/// What one sync run reported
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub lines: usize,
    pub changes: usize,
}

/// Runs grive against the configured sync root
pub struct GriveRunner<'a> {
    grive: &'a GriveBinary,
    config: &'a ConfigStore,
}

impl<'a> GriveRunner<'a> {
    pub fn new(grive: &'a GriveBinary, config: &'a ConfigStore) -> Self {
        Self { grive, config }
    }

    /// Arguments for a sync run: root path plus any rate caps
    pub fn sync_args(config: &ConfigStore) -> Result<Vec<OsString>> {
        let mut args: Vec<OsString> = vec!["-p".into(), config.sync_root().into_os_string()];

        let up_rate = config.get_int(ConfigKey::UpRate)?;
        if up_rate > 0 {
            args.push("-U".into());
            args.push(up_rate.to_string().into());
        }

        let down_rate = config.get_int(ConfigKey::DownRate)?;
        if down_rate > 0 {
            args.push("-D".into());
            args.push(down_rate.to_string().into());
        }

        Ok(args)
    }

    /// Interactive first-run authorization (`grive -a`), creating the sync
    /// root if needed
    pub async fn authorize(&self) -> Result<()> {
        let root = self.config.sync_root();
        if !root.exists() {
            info!("Creating sync folder {:?}", root);
            tokio::fs::create_dir_all(&root).await?;
        }

        info!("Authorizing grive for {:?}", root);
        let status = Command::new(self.grive.path())
            .arg("-a")
            .arg("-p")
            .arg(&root)
            .current_dir(&root)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if !status.success() {
            return Err(GriveUtilsError::GriveFailed(status));
        }
        Ok(())
    }

    /// Run one sync, calling `on_event` for every change grive reports
    pub async fn sync<F>(&self, on_event: F) -> Result<SyncSummary>
    where
        F: FnMut(SyncEvent),
    {
        let root = self.config.sync_root();
        if !root.is_dir() {
            return Err(GriveUtilsError::Config(format!(
                "Sync folder {} does not exist",
                root.display()
            )));
        }

        let args = Self::sync_args(self.config)?;
        debug!("Running {:?} {:?}", self.grive.path(), args);

        let started = Local::now();
        let mut child = Command::new(self.grive.path())
            .args(&args)
            .current_dir(&root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GriveUtilsError::Config("grive stdout was not captured".to_string()))?;

        let (lines, changes) = stream_events(BufReader::new(stdout), on_event).await?;

        let status = child.wait().await?;
        if !status.success() {
            return Err(GriveUtilsError::GriveFailed(status));
        }

        Ok(SyncSummary {
            started,
            finished: Local::now(),
            lines,
            changes,
        })
    }
}

/// Feed every line of `reader` through the status parser.
///
/// Returns the number of lines read and the number of events produced.
pub async fn stream_events<R, F>(reader: R, mut on_event: F) -> Result<(usize, usize)>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(SyncEvent),
{
    let mut lines = reader.lines();
    let mut read = 0;
    let mut changes = 0;

    while let Some(line) = lines.next_line().await? {
        read += 1;
        trace!("grive: {}", line);
        if let Some(event) = SyncEvent::from_line(&line) {
            changes += 1;
            on_event(event);
        }
    }

    Ok((read, changes))
}
