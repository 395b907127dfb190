//! Modal terminal dialogs: the preferences form and the fatal-error popup
//!
//! Both dialogs block the caller until the user answers. Input and output
//! are injected so the same code drives a real terminal and the tests.

use std::io::{self, BufRead, Write};
use tracing::{debug, info};

use crate::config::{ConfigKey, ConfigStore, MAX_INTERVAL, MAX_RATE};
use crate::error::Result;

/// Values edited by the preferences form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub interval: i64,
    pub up_rate: i64,
    pub down_rate: i64,
    pub notify: bool,
    pub light_panel: bool,
}

impl Preferences {
    /// Current values from the store
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        Ok(Self {
            interval: store.get_int(ConfigKey::Interval)?,
            up_rate: store.get_int(ConfigKey::UpRate)?,
            down_rate: store.get_int(ConfigKey::DownRate)?,
            notify: store.get_bool(ConfigKey::Notify)?,
            light_panel: store.get_bool(ConfigKey::LightPanel)?,
        })
    }

    /// Write the form values into the store (does not save)
    pub fn apply(&self, store: &mut ConfigStore) {
        store.set_int(ConfigKey::Interval, self.interval);
        store.set_int(ConfigKey::UpRate, self.up_rate);
        store.set_int(ConfigKey::DownRate, self.down_rate);
        store.set_bool(ConfigKey::Notify, self.notify);
        store.set_bool(ConfigKey::LightPanel, self.light_panel);
    }
}

/// How a modal dialog was closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogResponse<T> {
    Confirmed(T),
    Cancelled,
}

/// Preferences form bound to a [`ConfigStore`]
pub struct PrefsDialog<R, W> {
    input: R,
    output: W,
}

impl PrefsDialog<io::StdinLock<'static>, io::Stdout> {
    /// Dialog on the process terminal
    pub fn terminal() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PrefsDialog<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Show the form and block until it is confirmed or cancelled.
    ///
    /// On confirm the edited values are written into `store` and saved.
    /// On cancel the store is left exactly as it was.
    pub fn run(mut self, store: &mut ConfigStore) -> Result<DialogResponse<Preferences>> {
        let response = self.prompt(&Preferences::from_store(store)?)?;

        match &response {
            DialogResponse::Confirmed(prefs) => {
                prefs.apply(store);
                store.save()?;
                info!("Preferences saved to {:?}", store.path());
                writeln!(self.output, "\nPreferences saved.")?;
            }
            DialogResponse::Cancelled => {
                debug!("Preferences dialog cancelled");
                writeln!(self.output, "\nNo changes made.")?;
            }
        }

        Ok(response)
    }

    /// Collect values without touching any store
    pub fn prompt(&mut self, current: &Preferences) -> Result<DialogResponse<Preferences>> {
        writeln!(self.output, "Preferences")?;
        writeln!(self.output, "===========\n")?;
        writeln!(self.output, "Press Enter to keep the value in brackets.\n")?;

        let Some(prefs) = self.fill(current)? else {
            return Ok(DialogResponse::Cancelled);
        };

        match self.ask("\n[ Cancel ] [ OK ]  Save these settings? (y/N)")? {
            Some(answer) if matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes" | "ok") => {
                Ok(DialogResponse::Confirmed(prefs))
            }
            _ => Ok(DialogResponse::Cancelled),
        }
    }

    fn fill(&mut self, current: &Preferences) -> Result<Option<Preferences>> {
        let Some(interval) =
            self.ask_int("Check Google Drive every (minutes)", current.interval, MAX_INTERVAL)?
        else {
            return Ok(None);
        };
        let Some(up_rate) =
            self.ask_int("Upload rate (kbps, 0 = unlimited)", current.up_rate, MAX_RATE)?
        else {
            return Ok(None);
        };
        let Some(down_rate) =
            self.ask_int("Download rate (kbps, 0 = unlimited)", current.down_rate, MAX_RATE)?
        else {
            return Ok(None);
        };
        let Some(notify) = self.ask_switch("Show notifications", current.notify)? else {
            return Ok(None);
        };
        let Some(light_panel) = self.ask_switch("Light panel theme", current.light_panel)? else {
            return Ok(None);
        };

        Ok(Some(Preferences {
            interval,
            up_rate,
            down_rate,
            notify,
            light_panel,
        }))
    }

    /// One line of input, `None` at end of input
    fn ask(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{}: ", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask_int(&mut self, label: &str, current: i64, max: i64) -> Result<Option<i64>> {
        loop {
            let Some(answer) = self.ask(&format!("{} [{}]", label, current))? else {
                return Ok(None);
            };
            if answer.is_empty() && (0..=max).contains(&current) {
                return Ok(Some(current));
            }
            match answer.parse::<i64>() {
                Ok(value) if (0..=max).contains(&value) => return Ok(Some(value)),
                _ => writeln!(self.output, "  Please enter a number between 0 and {}.", max)?,
            }
        }
    }

    fn ask_switch(&mut self, label: &str, current: bool) -> Result<Option<bool>> {
        let shown = if current { "on" } else { "off" };
        loop {
            let Some(answer) = self.ask(&format!("{} (on/off) [{}]", label, shown))? else {
                return Ok(None);
            };
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(Some(current)),
                "on" | "y" | "yes" | "true" => return Ok(Some(true)),
                "off" | "n" | "no" | "false" => return Ok(Some(false)),
                _ => writeln!(self.output, "  Please answer on or off.")?,
            }
        }
    }
}

/// One-button dialog for errors the program cannot continue from
pub struct FatalDialog<'a> {
    title: &'a str,
    message: &'a str,
}

impl<'a> FatalDialog<'a> {
    pub fn new(title: &'a str, message: &'a str) -> Self {
        Self { title, message }
    }

    /// Print the dialog and wait for the acknowledgement
    pub fn show<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> io::Result<()> {
        self.render(&mut output)?;
        write!(output, "[ OK ] ")?;
        output.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        Ok(())
    }

    /// Print the dialog without waiting, for non-interactive sessions
    pub fn render<W: Write>(&self, mut output: W) -> io::Result<()> {
        let width = self
            .message
            .lines()
            .map(|l| l.chars().count())
            .chain(std::iter::once(self.title.chars().count()))
            .max()
            .unwrap_or(0);
        let rule = "=".repeat(width);

        writeln!(output, "\n{}", self.title)?;
        writeln!(output, "{}", rule)?;
        for line in self.message.lines() {
            writeln!(output, "{}", line)?;
        }
        writeln!(output, "{}", rule)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn run_dialog(store: &mut ConfigStore, answers: &str) -> (DialogResponse<Preferences>, String) {
        let mut out = Vec::new();
        let response = PrefsDialog::new(Cursor::new(answers.as_bytes()), &mut out)
            .run(store)
            .unwrap();
        (response, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_confirm_writes_and_saves() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grive-utils");
        let mut store = ConfigStore::load_from(&path).unwrap();

        let (response, _) = run_dialog(&mut store, "30\n100\n\noff\non\ny\n");

        let expected = Preferences {
            interval: 30,
            up_rate: 100,
            down_rate: 0,
            notify: false,
            light_panel: true,
        };
        assert_eq!(response, DialogResponse::Confirmed(expected.clone()));
        assert_eq!(Preferences::from_store(&store).unwrap(), expected);

        let reloaded = ConfigStore::load_from(&path).unwrap();
        assert_eq!(Preferences::from_store(&reloaded).unwrap(), expected);
    }

    #[test]
    fn test_cancel_never_saves() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grive-utils");
        let mut store = ConfigStore::load_from(&path).unwrap();
        let before = Preferences::from_store(&store).unwrap();

        let (response, out) = run_dialog(&mut store, "5\n5\n5\non\non\nn\n");

        assert_eq!(response, DialogResponse::Cancelled);
        assert_eq!(Preferences::from_store(&store).unwrap(), before);
        assert!(!path.exists());
        assert!(out.contains("No changes made."));
    }

    #[test]
    fn test_end_of_input_cancels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grive-utils");
        let mut store = ConfigStore::load_from(&path).unwrap();

        let (response, _) = run_dialog(&mut store, "15\n");

        assert_eq!(response, DialogResponse::Cancelled);
        assert_eq!(store.get_int(ConfigKey::Interval).unwrap(), 60);
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_input_reprompts() {
        let dir = tempdir().unwrap();
        let mut store = ConfigStore::load_from(dir.path().join("grive-utils")).unwrap();

        let (response, out) = run_dialog(&mut store, "-1\n99999\nsoon\n45\n\n\nmaybe\n\n\nyes\n");

        match response {
            DialogResponse::Confirmed(prefs) => {
                assert_eq!(prefs.interval, 45);
                assert!(prefs.notify);
            }
            DialogResponse::Cancelled => panic!("expected confirmation"),
        }
        assert_eq!(out.matches("between 0 and 43200").count(), 3);
        assert!(out.contains("Please answer on or off."));
    }

    #[test]
    fn test_fatal_dialog_shows_title_and_message() {
        let mut out = Vec::new();
        FatalDialog::new("grive not found", "Install grive 0.5.1 or newer.")
            .show(Cursor::new(&b"\n"[..]), &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("grive not found"));
        assert!(text.contains("Install grive 0.5.1 or newer."));
        assert!(text.contains("[ OK ]"));
    }

    #[test]
    fn test_out_of_range_current_value_is_not_kept() {
        let current = Preferences {
            interval: MAX_INTERVAL + 1,
            up_rate: 0,
            down_rate: 0,
            notify: true,
            light_panel: false,
        };
        let mut out = Vec::new();
        let response = PrefsDialog::new(Cursor::new(&b"\n20\n\n\n\n\ny\n"[..]), &mut out)
            .prompt(&current)
            .unwrap();

        match response {
            DialogResponse::Confirmed(prefs) => assert_eq!(prefs.interval, 20),
            DialogResponse::Cancelled => panic!("expected confirmation"),
        }
    }
}
