//! Configuration for an import run.
//!
//! Command-line flags and `INDIANA_*` environment variables are merged by
//! clap (flag wins). [`Settings::resolve`] then applies the legacy
//! `AZUREDEVOPS_*` fallbacks and checks that everything the command needs is
//! present. The result is built once in `main` and passed down by reference;
//! nothing below it reads the environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::tracker::azure::DEFAULT_API_URL;

/// Environment variable for the personal access token.
pub const ENV_TOKEN: &str = "INDIANA_TOKEN";
/// Environment variable for the orchestrator.
pub const ENV_ORCHESTRATOR: &str = "INDIANA_ORCHESTRATOR";
/// Environment variable for the organization.
pub const ENV_ORGANIZATION: &str = "INDIANA_ORGANIZATION";
/// Environment variable for the project.
pub const ENV_PROJECT: &str = "INDIANA_PROJECT";
/// Environment variable for the input document.
pub const ENV_FILE: &str = "INDIANA_FILE";
/// Environment variable for the service root.
pub const ENV_API_URL: &str = "INDIANA_API_URL";

/// Older variable names, consulted only when the `INDIANA_*` value is absent.
pub const LEGACY_ENV_TOKEN: &str = "AZUREDEVOPS_PAT";
pub const LEGACY_ENV_ORGANIZATION: &str = "AZUREDEVOPS_ORGNAME";
pub const LEGACY_ENV_PROJECT: &str = "AZUREDEVOPS_PROJECTNAME";

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors. All of them stop the run before any remote call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No {name} provided. Pass --{flag} or set {env}.")]
    Missing { name: &'static str, flag: &'static str, env: &'static str },

    #[error("Orchestrator '{0}' is not supported yet, only 'azdo' is")]
    UnsupportedOrchestrator(String),

    #[error("Unknown orchestrator '{0}', expected 'azdo'")]
    UnknownOrchestrator(String),

    #[error("Invalid API URL '{0}', expected an http(s) URL")]
    InvalidApiUrl(String),
}

/// Backend that hosts the work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orchestrator {
    /// Azure DevOps Services or Server
    AzureDevOps,
}

impl FromStr for Orchestrator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "azdo" | "ado" | "azure-devops" | "azuredevops" => Ok(Self::AzureDevOps),
            "github" => Err(ConfigError::UnsupportedOrchestrator(s.to_string())),
            _ => Err(ConfigError::UnknownOrchestrator(s.to_string())),
        }
    }
}

impl fmt::Display for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AzureDevOps => write!(f, "azdo"),
        }
    }
}

/// Unvalidated values as they come from clap.
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    pub token: Option<String>,
    pub orchestrator: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub file: Option<PathBuf>,
    pub api_url: Option<String>,
}

/// Which options a command cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub token: bool,
    pub file: bool,
}

impl Requirements {
    /// Creating work items on the backend.
    pub const IMPORT: Self = Self { token: true, file: true };
    /// Walking the document without calling the backend.
    pub const DRY_RUN: Self = Self { token: false, file: true };
    /// Listing existing work items.
    pub const LIST: Self = Self { token: true, file: false };
}

/// Validated settings.
#[derive(Clone)]
pub struct Settings {
    token: Option<String>,
    orchestrator: Orchestrator,
    organization: String,
    project: String,
    file: Option<PathBuf>,
    api_url: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token", &self.token.as_ref().map(|_| "********"))
            .field("orchestrator", &self.orchestrator)
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("file", &self.file)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Treat blank values as absent.
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Settings {
    /// Resolve settings, reading legacy variables through `lookup`.
    ///
    /// Precedence for each option: flag, then `INDIANA_*` (both already merged
    /// into `raw` by clap), then the legacy `AZUREDEVOPS_*` variable.
    pub fn resolve<F>(raw: RawSettings, requirements: Requirements, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = present(raw.token).or_else(|| present(lookup(LEGACY_ENV_TOKEN)));
        if requirements.token && token.is_none() {
            return Err(ConfigError::Missing { name: "token", flag: "token", env: ENV_TOKEN });
        }

        let orchestrator = present(raw.orchestrator).ok_or(ConfigError::Missing {
            name: "orchestrator",
            flag: "orchestrator",
            env: ENV_ORCHESTRATOR,
        })?;
        let orchestrator: Orchestrator = orchestrator.parse()?;

        let organization = present(raw.organization)
            .or_else(|| present(lookup(LEGACY_ENV_ORGANIZATION)))
            .ok_or(ConfigError::Missing {
                name: "organization",
                flag: "organization",
                env: ENV_ORGANIZATION,
            })?;

        let project = present(raw.project)
            .or_else(|| present(lookup(LEGACY_ENV_PROJECT)))
            .ok_or(ConfigError::Missing { name: "project", flag: "project", env: ENV_PROJECT })?;

        let file = raw.file.filter(|f| !f.as_os_str().is_empty());
        if requirements.file && file.is_none() {
            return Err(ConfigError::Missing { name: "file", flag: "file", env: ENV_FILE });
        }

        let api_url = present(raw.api_url).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !(api_url.starts_with("https://") || api_url.starts_with("http://")) {
            return Err(ConfigError::InvalidApiUrl(api_url));
        }

        Ok(Self {
            token,
            orchestrator,
            organization,
            project,
            file,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve settings against the process environment.
    pub fn resolve_from_env(raw: RawSettings, requirements: Requirements) -> ConfigResult<Self> {
        Self::resolve(raw, requirements, |key| std::env::var(key).ok())
    }

    /// Personal access token.
    pub fn token(&self) -> ConfigResult<&str> {
        self.token.as_deref().ok_or(ConfigError::Missing {
            name: "token",
            flag: "token",
            env: ENV_TOKEN,
        })
    }

    /// Input document path.
    pub fn file(&self) -> ConfigResult<&Path> {
        self.file.as_deref().ok_or(ConfigError::Missing {
            name: "file",
            flag: "file",
            env: ENV_FILE,
        })
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}
