//! Process-wide settings and path resolution
//!
//! Settings are resolved once at startup (usually through
//! [`Settings::from_env`]) and then passed explicitly to every constructor
//! that needs a location on disk. Nothing else in the crate reads the
//! environment.
//!
//! Layout: `<home>/projects/<project>/runs/<run_name>.sqlite`

use std::path::{Path, PathBuf};

/// Environment variable overriding the home directory
pub const ENV_HOME: &str = "RUNLOG_HOME";

/// Environment variable overriding the default project name
pub const ENV_PROJECT: &str = "RUNLOG_PROJECT";

/// Project used when none is configured
pub const DEFAULT_PROJECT: &str = "default";

/// File extension of run store files
pub const RUN_FILE_EXTENSION: &str = "sqlite";

const HOME_DIR_NAME: &str = ".runlog";
const PROJECTS_DIR_NAME: &str = "projects";
const RUNS_DIR_NAME: &str = "runs";

/// Resolved locations and defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root directory holding `projects/`
    pub home: PathBuf,

    /// Project used by runs that do not name one
    pub default_project: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: default_home(),
            default_project: DEFAULT_PROJECT.to_string(),
        }
    }
}

impl Settings {
    /// Create settings rooted at an explicit home directory
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            default_project: DEFAULT_PROJECT.to_string(),
        }
    }

    /// Resolve settings from `RUNLOG_HOME` and `RUNLOG_PROJECT`, falling
    /// back to `~/.runlog` and `default`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup(ENV_HOME)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_home);
        let default_project = lookup(ENV_PROJECT)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string());

        Self {
            home,
            default_project,
        }
    }

    /// Override the default project
    pub fn default_project(mut self, project: impl Into<String>) -> Self {
        self.default_project = project.into();
        self
    }

    /// Directory containing one subdirectory per project
    pub fn projects_dir(&self) -> PathBuf {
        self.home.join(PROJECTS_DIR_NAME)
    }

    /// Path of the store file for a run
    pub fn run_path(&self, project: &str, run_name: &str) -> PathBuf {
        run_path_in(&self.projects_dir(), project, run_name)
    }
}

/// Path of a run file below an explicit projects directory
pub fn run_path_in(projects_dir: &Path, project: &str, run_name: &str) -> PathBuf {
    runs_dir_in(projects_dir, project).join(run_file_name(run_name))
}

/// Directory holding the run files of one project
pub fn runs_dir_in(projects_dir: &Path, project: &str) -> PathBuf {
    projects_dir.join(project).join(RUNS_DIR_NAME)
}

/// File name for a run
pub fn run_file_name(run_name: &str) -> String {
    format!("{}.{}", run_name, RUN_FILE_EXTENSION)
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HOME_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_path_layout() {
        let settings = Settings::with_home("/data/runlog");
        assert_eq!(
            settings.run_path("vision", "bold-otter"),
            PathBuf::from("/data/runlog/projects/vision/runs/bold-otter.sqlite")
        );
        assert_eq!(settings.projects_dir(), PathBuf::from("/data/runlog/projects"));
    }

    #[test]
    fn test_lookup_overrides() {
        let settings = Settings::from_lookup(|key| match key {
            ENV_HOME => Some("/srv/rl".to_string()),
            ENV_PROJECT => Some("nlp".to_string()),
            _ => None,
        });
        assert_eq!(settings.home, PathBuf::from("/srv/rl"));
        assert_eq!(settings.default_project, "nlp");
    }

    #[test]
    fn test_lookup_defaults() {
        let settings = Settings::from_lookup(|_| None);
        assert!(settings.home.ends_with(".runlog"));
        assert_eq!(settings.default_project, DEFAULT_PROJECT);
    }

    #[test]
    fn test_blank_values_ignored() {
        let settings = Settings::from_lookup(|_| Some("  ".to_string()));
        assert!(settings.home.ends_with(".runlog"));
        assert_eq!(settings.default_project, DEFAULT_PROJECT);
    }
}
