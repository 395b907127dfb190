//! Main application orchestrator

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ConfigKey, ConfigStore};
use crate::dialog::{DialogResponse, PrefsDialog};
use crate::error::Result;
use crate::grive::{GriveRunner, SyncSummary};
use crate::status::{
    parse_entity, parse_status, ChangeKind, Entity, EntityKind, SyncEvent, SyncStatus,
};
use crate::version::{GriveBinary, MINIMUM_VERSION};

/// Main application struct
pub struct GriveUtils {
    config: ConfigStore,
    grive_override: Option<PathBuf>,
}

/// One classified line for `parse --json`
#[derive(Debug, Serialize)]
struct ParsedLine<'a> {
    line: &'a str,
    entity: Option<Entity>,
    in_sync: bool,
    change: Option<ChangeKind>,
}

impl GriveUtils {
    /// Load configuration from `config_path`, or the per-user file
    pub fn new(config_path: Option<&Path>, grive_override: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => ConfigStore::load_from(path)?,
            None => ConfigStore::load()?,
        };

        Ok(Self {
            config,
            grive_override,
        })
    }

    fn locate_grive(&self) -> Result<GriveBinary> {
        match &self.grive_override {
            Some(path) => Ok(GriveBinary::at(path)),
            None => GriveBinary::locate(),
        }
    }

    /// Locate grive and make sure it is recent enough
    fn grive(&self) -> Result<GriveBinary> {
        let grive = self.locate_grive()?;
        grive.ensure_supported()?;
        Ok(grive)
    }

    /// Report the installed grive version
    pub fn check(&self) -> Result<()> {
        let grive = self.locate_grive()?;
        let version = grive.ensure_supported()?;
        println!("grive {} at {}", version, grive.path().display());
        println!("Minimum supported version: {}", MINIMUM_VERSION);
        println!("✓ Supported");
        Ok(())
    }

    /// Open the preferences dialog on the terminal
    pub fn preferences(&mut self) -> Result<()> {
        match PrefsDialog::terminal().run(&mut self.config)? {
            DialogResponse::Confirmed(prefs) => {
                debug!("New preferences: {:?}", prefs);
            }
            DialogResponse::Cancelled => {}
        }
        Ok(())
    }

    /// Print every option and where it is stored
    pub fn show(&self) -> Result<()> {
        println!("Configuration file: {}", self.config.path().display());
        if !self.config.path().exists() {
            println!("(not saved yet, showing defaults)");
        }
        println!();
        for (name, value) in self.config.entries() {
            println!("  {:<12} {}", name, value);
        }
        Ok(())
    }

    /// Set or clear the pause flag and persist it
    pub fn set_paused(&mut self, paused: bool) -> Result<()> {
        self.config.set_bool(ConfigKey::Pause, paused);
        self.config.save()?;
        if paused {
            println!("Syncing paused. Run 'grive-utils resume' to continue.");
        } else {
            println!("Syncing resumed.");
        }
        Ok(())
    }

    /// Open the sync folder with the desktop's file manager
    pub fn open_folder(&self) -> Result<()> {
        let root = self.config.sync_root();
        info!("Opening {:?}", root);
        open::that(&root)?;
        Ok(())
    }

    /// Classify lines of grive output read from `input`
    pub fn parse_lines<R: BufRead, W: Write>(input: R, mut output: W, json: bool) -> Result<()> {
        for line in input.lines() {
            let line = line?;
            let entity = parse_entity(&line);
            let status = parse_status(&line);
            if entity.is_none() && status.is_none() {
                continue;
            }

            if json {
                let parsed = ParsedLine {
                    line: &line,
                    entity,
                    in_sync: status == Some(SyncStatus::InSync),
                    change: status.and_then(SyncStatus::change),
                };
                writeln!(output, "{}", serde_json::to_string(&parsed)?)?;
                continue;
            }

            if let Some(entity) = entity {
                let kind = match entity.kind {
                    Some(EntityKind::File) => "file",
                    Some(EntityKind::Folder) => "folder",
                    None => "item",
                };
                writeln!(output, "{:<7}{}", kind, entity.path)?;
            }
            match status {
                Some(SyncStatus::InSync) => writeln!(output, "  -> already in sync")?,
                Some(SyncStatus::Changed(change)) => writeln!(output, "  -> {}", change)?,
                None => {}
            }
        }
        Ok(())
    }

    /// Authorize on first use, then run one sync
    pub async fn sync(&mut self, json: bool) -> Result<()> {
        let grive = self.grive()?;
        self.ensure_initialized(&grive).await?;
        let summary = self.sync_once(&grive, json).await?;
        if !json {
            print_summary(&summary);
        }
        Ok(())
    }

    /// Sync every `Interval` minutes until Ctrl-C
    pub async fn watch(&mut self, json: bool) -> Result<()> {
        let grive = self.grive()?;
        self.ensure_initialized(&grive).await?;

        loop {
            // Other invocations (prefs, pause, resume) write the file while
            // we run; pick their changes up between runs.
            match ConfigStore::load_from(self.config.path()) {
                Ok(config) => self.config = config,
                Err(e) => warn!("Keeping previous settings, could not reload config: {}", e),
            }

            if self.config.get_bool(ConfigKey::Pause)? {
                info!("Sync is paused");
            } else {
                match self.sync_once(&grive, json).await {
                    Ok(summary) if !json => print_summary(&summary),
                    Ok(_) => {}
                    Err(e) => warn!("Sync failed: {}", e),
                }
            }

            let minutes = self.config.get_int(ConfigKey::Interval)?;
            if minutes <= 0 {
                info!("Interval is 0, automatic sync is off");
                return Ok(());
            }

            debug!("Next sync in {} minutes", minutes);
            let pause = Duration::from_secs((minutes as u64).saturating_mul(60));
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Stopping watch");
                    return Ok(());
                }
            }
        }
    }

    /// Run `grive -a` once and remember that we did
    async fn ensure_initialized(&mut self, grive: &GriveBinary) -> Result<()> {
        if self.config.get_bool(ConfigKey::Init)? {
            return Ok(());
        }

        println!("First run: grive needs access to your Google Drive.");
        GriveRunner::new(grive, &self.config).authorize().await?;

        self.config.set_bool(ConfigKey::Init, true);
        self.config.save()?;
        info!("grive authorized, sync folder {:?}", self.config.sync_root());
        Ok(())
    }

    async fn sync_once(&self, grive: &GriveBinary, json: bool) -> Result<SyncSummary> {
        let notify = self.config.get_bool(ConfigKey::Notify)?;

        let spinner = if json {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("Syncing {}", self.config.sync_root().display()));
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        };

        let mut json_error = None;
        let result = GriveRunner::new(grive, &self.config)
            .sync(|event: SyncEvent| {
                if json {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => json_error = Some(e),
                    }
                } else if notify {
                    spinner.println(format!("• {}", event));
                } else {
                    debug!("{}", event);
                }
            })
            .await;

        spinner.finish_and_clear();
        if let Some(e) = json_error {
            return Err(e.into());
        }
        result
    }
}

fn print_summary(summary: &SyncSummary) {
    debug!("grive printed {} lines", summary.lines);
    let took = summary.finished - summary.started;
    println!(
        "Sync finished at {} ({} change{}, {}s)",
        summary.finished.format("%H:%M:%S"),
        summary.changes,
        if summary.changes == 1 { "" } else { "s" },
        took.num_seconds()
    );
}

/// Whether stdin can answer a dialog
pub fn interactive() -> bool {
    use std::io::IsTerminal;
    io::stdin().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_new_uses_defaults_without_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grive-utils");
        let app = GriveUtils::new(Some(path.as_path()), None).unwrap();
        assert_eq!(app.config.get_int(ConfigKey::Interval).unwrap(), 60);
    }

    #[test]
    fn test_pause_and_resume_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grive-utils");

        let mut app = GriveUtils::new(Some(path.as_path()), None).unwrap();
        app.set_paused(true).unwrap();
        let reloaded = ConfigStore::load_from(&path).unwrap();
        assert!(reloaded.get_bool(ConfigKey::Pause).unwrap());

        app.set_paused(false).unwrap();
        let reloaded = ConfigStore::load_from(&path).unwrap();
        assert!(!reloaded.get_bool(ConfigKey::Pause).unwrap());
    }

    #[test]
    fn test_missing_grive_override_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grive-utils");
        let app = GriveUtils::new(Some(path.as_path()), Some(dir.path().join("no-grive"))).unwrap();
        let err = app.grive().unwrap_err();
        assert!(err.fatal_title().is_some());
    }

    #[test]
    fn test_parse_lines_text() {
        let input = concat!(
            "file \"a/b.txt\"\n",
            "noise\n",
            "doesn't exist in server, uploading\n",
            "already in sync\n",
        );
        let mut out = Vec::new();
        GriveUtils::parse_lines(Cursor::new(input), &mut out, false).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "file   a/b.txt\n  -> Created\n  -> already in sync\n"
        );
    }

    #[test]
    fn test_parse_lines_json() {
        let input = "sync \"./x\" changed in remote. downloading\n";
        let mut out = Vec::new();
        GriveUtils::parse_lines(Cursor::new(input), &mut out, true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["entity"]["path"], "x");
        assert_eq!(value["entity"]["kind"], serde_json::Value::Null);
        assert_eq!(value["change"], "Modified");
        assert_eq!(value["in_sync"], false);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_first_run_authorizes_and_saves_init() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grive-utils");
        let root = dir.path().join("drive");
        let grive = crate::version::fake_grive(dir.path(), "exit 0");

        let mut config = ConfigStore::with_defaults(&path);
        config.set_str(ConfigKey::Path, root.display().to_string());
        config.save().unwrap();

        let mut app =
            GriveUtils::new(Some(path.as_path()), Some(grive.path().to_path_buf())).unwrap();
        app.ensure_initialized(&grive).await.unwrap();

        assert!(root.is_dir());
        let reloaded = ConfigStore::load_from(&path).unwrap();
        assert!(reloaded.get_bool(ConfigKey::Init).unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_watch_skips_sync_while_paused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grive-utils");
        let marker = dir.path().join("synced");
        let grive = crate::version::fake_grive(
            dir.path(),
            &format!("touch '{}'\nexit 0", marker.display()),
        );

        let mut config = ConfigStore::with_defaults(&path);
        config.set_bool(ConfigKey::Init, true);
        config.set_bool(ConfigKey::Pause, true);
        config.set_int(ConfigKey::Interval, 0);
        config.set_str(ConfigKey::Path, dir.path().display().to_string());
        config.save().unwrap();

        let mut app =
            GriveUtils::new(Some(path.as_path()), Some(grive.path().to_path_buf())).unwrap();
        app.watch(true).await.unwrap();

        assert!(!marker.exists());
    }
}
