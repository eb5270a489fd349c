//! Runner settings beyond the supervisor configuration.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use transcoder_models::invocation::DEFAULT_TRANSPORT;
use transcoder_models::RemoteTransport;

/// Runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkerSettings {
    /// Run the encoder on another host
    pub remote: Option<RemoteTransport>,
    /// Veto the run at the first progress sample past this limit
    pub max_runtime: Option<Duration>,
    /// Print the run report as JSON on stdout
    pub print_report: bool,
}

impl WorkerSettings {
    /// Create settings from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let remote = match get("TRANSCODER_REMOTE_HOST") {
            Some(host) => {
                let Some(user) = get("TRANSCODER_REMOTE_USER") else {
                    bail!("TRANSCODER_REMOTE_USER is required with TRANSCODER_REMOTE_HOST");
                };
                let launcher =
                    get("TRANSCODER_SSH").unwrap_or_else(|| DEFAULT_TRANSPORT.to_string());
                Some(RemoteTransport::new(launcher, user, host)?)
            }
            None => None,
        };

        let max_runtime = get("TRANSCODER_MAX_RUNTIME_SECS")
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| format!("TRANSCODER_MAX_RUNTIME_SECS: {raw:?}"))
            })
            .transpose()?;

        let print_report = get("TRANSCODER_PRINT_REPORT")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            remote,
            max_runtime,
            print_report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<WorkerSettings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_local_by_default() {
        assert_eq!(settings(&[]).unwrap(), WorkerSettings::default());
    }

    #[test]
    fn test_remote_settings() {
        let s = settings(&[
            ("TRANSCODER_REMOTE_HOST", "10.0.0.5"),
            ("TRANSCODER_REMOTE_USER", "bob"),
            ("TRANSCODER_MAX_RUNTIME_SECS", "7200"),
            ("TRANSCODER_PRINT_REPORT", "true"),
        ])
        .unwrap();

        let remote = s.remote.unwrap();
        assert_eq!(remote.launcher, "ssh");
        assert_eq!(remote.login(), "bob@10.0.0.5");
        assert_eq!(s.max_runtime, Some(Duration::from_secs(7200)));
        assert!(s.print_report);
    }

    #[test]
    fn test_remote_requires_user() {
        assert!(settings(&[("TRANSCODER_REMOTE_HOST", "10.0.0.5")]).is_err());
    }

    #[test]
    fn test_bad_runtime() {
        assert!(settings(&[("TRANSCODER_MAX_RUNTIME_SECS", "forever")]).is_err());
    }
}
