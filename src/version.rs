//! grive version detection and minimum-version check

use regex::Regex;
use std::cmp::Ordering;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::{GriveUtilsError, Result};

/// Oldest grive release whose command line and output we understand
pub const MINIMUM_VERSION: &str = "0.5.1";

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+\.\d+(?:\.\d+)?").expect("version pattern is valid"))
}

/// A dotted numeric version such as `0.5` or `0.5.1`.
///
/// Ordering is component-wise and numeric; missing trailing components
/// compare as zero, so `0.5` == `0.5.0`.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Extract the first version token found anywhere in `text`
    pub fn extract(text: &str) -> Result<Self> {
        let unparsable = || GriveUtilsError::VersionUnparsable(text.trim().to_string());
        let token = version_pattern().find(text).ok_or_else(unparsable)?;
        token.as_str().parse().map_err(|_| unparsable())
    }

    pub fn minimum() -> Self {
        Self {
            components: vec![0, 5, 1],
        }
    }

    pub fn is_supported(&self) -> bool {
        *self >= Self::minimum()
    }

    fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = GriveUtilsError;

    fn from_str(s: &str) -> Result<Self> {
        let components = s
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| GriveUtilsError::InvalidVersion(s.to_string()))?;

        if !(2..=3).contains(&components.len()) {
            return Err(GriveUtilsError::InvalidVersion(s.to_string()));
        }

        Ok(Self { components })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Location of the grive executable
#[derive(Debug, Clone)]
pub struct GriveBinary {
    path: PathBuf,
}

impl GriveBinary {
    #[cfg(windows)]
    const EXECUTABLE: &'static str = "grive.exe";
    #[cfg(not(windows))]
    const EXECUTABLE: &'static str = "grive";

    /// Search `PATH` for grive
    pub fn locate() -> Result<Self> {
        let search_path = env::var_os("PATH").ok_or(GriveUtilsError::GriveNotFound)?;
        env::split_paths(&search_path)
            .map(|dir| dir.join(Self::EXECUTABLE))
            .find(|candidate| candidate.is_file())
            .map(|path| {
                debug!("Found grive at {:?}", path);
                Self { path }
            })
            .ok_or(GriveUtilsError::GriveNotFound)
    }

    /// Use an explicit executable path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `grive --version` and parse its output
    pub fn version(&self) -> Result<Version> {
        let output = Command::new(&self.path)
            .arg("--version")
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => GriveUtilsError::GriveNotFound,
                _ => GriveUtilsError::Io(e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("grive --version: {}", stdout.trim());
        Version::extract(&stdout)
    }

    /// Fail unless the installed grive is at least [`MINIMUM_VERSION`]
    pub fn ensure_supported(&self) -> Result<Version> {
        let version = self.version()?;
        if !version.is_supported() {
            return Err(GriveUtilsError::UnsupportedVersion {
                found: version.to_string(),
                minimum: MINIMUM_VERSION.to_string(),
            });
        }
        info!("Using grive {}", version);
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_minimum_matches_constant() {
        assert_eq!(Version::minimum(), v(MINIMUM_VERSION));
        assert_eq!(Version::minimum().to_string(), MINIMUM_VERSION);
    }

    #[test]
    fn test_version_ordering_against_minimum() {
        assert!(v("0.5.10").is_supported());
        assert!(v("0.5.2").is_supported());
        assert!(v("0.5.1").is_supported());
        assert!(v("0.6").is_supported());
        assert!(v("1.0.0").is_supported());
        assert!(!v("0.4.9").is_supported());
        assert!(!v("0.5").is_supported());
        assert!(!v("0.5.0").is_supported());
    }

    #[test]
    fn test_missing_component_is_zero() {
        assert_eq!(v("0.5"), v("0.5.0"));
        assert!(v("0.5") < v("0.5.1"));
        assert!(v("0.10") > v("0.9.9"));
    }

    #[test]
    fn test_rejects_bad_versions() {
        assert!("0".parse::<Version>().is_err());
        assert!("0.5.1.2".parse::<Version>().is_err());
        assert!("0.x".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn test_extract_from_tool_output() {
        let out = "grive version 0.5.1-dev Mar 20 2017 11:23:42\n";
        assert_eq!(Version::extract(out).unwrap(), v("0.5.1"));

        let out = "grive version 0.4\n";
        assert_eq!(Version::extract(out).unwrap(), v("0.4"));
    }

    #[test]
    fn test_extract_without_version_fails() {
        let err = Version::extract("grive: command failed\n").unwrap_err();
        assert!(matches!(err, GriveUtilsError::VersionUnparsable(_)));
    }

    #[test]
    fn test_missing_binary_reports_not_found() {
        let grive = GriveBinary::at("/nonexistent/grive-utils-test/grive");
        assert!(matches!(
            grive.version().unwrap_err(),
            GriveUtilsError::GriveNotFound
        ));
    }

    #[test]
    fn test_oversized_component_is_unparsable() {
        let err = Version::extract("grive version 99999999999999999999.1\n").unwrap_err();
        assert!(matches!(err, GriveUtilsError::VersionUnparsable(_)));
        assert!(err.fatal_title().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_version_from_script() {
        let dir = tempfile::tempdir().unwrap();
        let grive = fake_grive(dir.path(), "exit 0");
        assert_eq!(grive.ensure_supported().unwrap(), v("0.5.3"));
    }
}

/// Write an executable stand-in for grive into `dir`.
///
/// `--version` prints 0.5.3; any other invocation runs `body`.
#[cfg(all(test, unix))]
pub(crate) fn fake_grive(dir: &Path, body: &str) -> GriveBinary {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("grive");
    let content = format!(
        concat!(
            "#!/bin/sh\n",
            "if [ \"$1\" = \"--version\" ]; then\n",
            "  echo 'grive version 0.5.3 Jan  1 2020'\n",
            "  exit 0\n",
            "fi\n",
            "{}\n",
        ),
        body
    );
    std::fs::write(&script, content).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    GriveBinary::at(script)
}
