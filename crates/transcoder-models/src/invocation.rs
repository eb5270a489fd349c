//! Encoder invocation descriptions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ModelError, ModelResult};

/// Default launcher used for remote invocations.
pub const DEFAULT_TRANSPORT: &str = "ssh";

/// Remote-login prefix that turns a local invocation into a remote one.
///
/// The launcher is treated as an opaque command: authentication and
/// transport reliability belong to it, not to us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RemoteTransport {
    /// Launcher binary (e.g., "ssh")
    pub launcher: String,
    /// Remote login user
    pub user: String,
    /// Remote host name or address
    pub host: String,
}

impl RemoteTransport {
    /// Create a transport, rejecting empty components.
    pub fn new(
        launcher: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
    ) -> ModelResult<Self> {
        let transport = Self {
            launcher: launcher.into(),
            user: user.into(),
            host: host.into(),
        };
        if transport.launcher.is_empty() {
            return Err(ModelError::IncompleteTransport("launcher"));
        }
        if transport.user.is_empty() {
            return Err(ModelError::IncompleteTransport("user"));
        }
        if transport.host.is_empty() {
            return Err(ModelError::IncompleteTransport("host"));
        }
        Ok(transport)
    }

    /// Create an ssh transport.
    pub fn ssh(user: impl Into<String>, host: impl Into<String>) -> ModelResult<Self> {
        Self::new(DEFAULT_TRANSPORT, user, host)
    }

    /// Login target in `user@host` form.
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Immutable description of one encoder run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodeInvocation {
    /// Encoder executable (e.g., "/usr/bin/HandBrakeCLI")
    executable: PathBuf,
    /// Encoder arguments, passed verbatim
    args: Vec<String>,
    /// Remote transport, if the encoder runs on another host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote: Option<RemoteTransport>,
}

impl EncodeInvocation {
    /// Describe a local run of `executable` with `args`.
    pub fn local<I, S>(executable: impl Into<PathBuf>, args: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let executable = executable.into();
        if executable.as_os_str().is_empty() {
            return Err(ModelError::EmptyExecutable);
        }
        Ok(Self {
            executable,
            args: args.into_iter().map(Into::into).collect(),
            remote: None,
        })
    }

    /// Describe a run of `executable` on the host reached through `transport`.
    pub fn remote<I, S>(
        transport: RemoteTransport,
        executable: impl Into<PathBuf>,
        args: I,
    ) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut invocation = Self::local(executable, args)?;
        invocation.remote = Some(transport);
        Ok(invocation)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn remote_transport(&self) -> Option<&RemoteTransport> {
        self.remote.as_ref()
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Build the full argument vector, program first.
    ///
    /// Local: `[executable, args...]`.
    /// Remote: `[launcher, user@host, executable, args...]`.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 3);

        if let Some(transport) = &self.remote {
            argv.push(transport.launcher.clone());
            argv.push(transport.login());
        }

        argv.push(self.executable.to_string_lossy().to_string());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Space-joined command line, for diagnostics only.
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_args() -> Vec<&'static str> {
        vec!["-i", "in.mkv", "-o", "out.mkv"]
    }

    #[test]
    fn test_local_argv() {
        let invocation = EncodeInvocation::local("/usr/bin/HandBrakeCLI", encode_args()).unwrap();

        assert_eq!(
            invocation.argv(),
            vec!["/usr/bin/HandBrakeCLI", "-i", "in.mkv", "-o", "out.mkv"]
        );
        assert!(!invocation.is_remote());
    }

    #[test]
    fn test_remote_argv() {
        let transport = RemoteTransport::new("ssh", "bob", "10.0.0.5").unwrap();
        let invocation =
            EncodeInvocation::remote(transport, "/usr/bin/HandBrakeCLI", encode_args()).unwrap();

        assert_eq!(
            invocation.argv(),
            vec![
                "ssh",
                "bob@10.0.0.5",
                "/usr/bin/HandBrakeCLI",
                "-i",
                "in.mkv",
                "-o",
                "out.mkv"
            ]
        );
        assert_eq!(
            invocation.command_line(),
            "ssh bob@10.0.0.5 /usr/bin/HandBrakeCLI -i in.mkv -o out.mkv"
        );
    }

    #[test]
    fn test_args_are_not_split_or_quoted() {
        let invocation =
            EncodeInvocation::local("HandBrakeCLI", ["-o", "my movie; rm -rf.mkv"]).unwrap();

        assert_eq!(invocation.argv()[2], "my movie; rm -rf.mkv");
    }

    #[test]
    fn test_rejects_incomplete_input() {
        assert_eq!(
            EncodeInvocation::local("", Vec::<String>::new()),
            Err(ModelError::EmptyExecutable)
        );
        assert_eq!(
            RemoteTransport::ssh("", "host"),
            Err(ModelError::IncompleteTransport("user"))
        );
        assert_eq!(
            RemoteTransport::ssh("bob", ""),
            Err(ModelError::IncompleteTransport("host"))
        );
    }

    #[test]
    fn test_serde_omits_missing_remote() {
        let invocation = EncodeInvocation::local("HandBrakeCLI", ["--version"]).unwrap();
        let json = serde_json::to_value(&invocation).unwrap();

        assert!(json.get("remote").is_none());
        let back: EncodeInvocation = serde_json::from_value(json).unwrap();
        assert_eq!(back, invocation);
    }
}
