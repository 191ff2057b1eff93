use crate::error::ContainerError;
use async_trait::async_trait;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle of the containers packages are installed into.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Names of every container, running or not.
    async fn list_containers(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ContainerError>;

    async fn init_container(
        &self,
        flag: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError>;

    async fn install_package(
        &self,
        flag: &str,
        package: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError>;

    /// Starts `command` inside the container without waiting for it to exit.
    async fn launch(&self, flag: &str, command: &str) -> Result<(), ContainerError>;
}

/// Drives `apx`, asking `podman` for the container list.
#[derive(Debug, Clone)]
pub struct ApxRuntime {
    apx: PathBuf,
    podman: PathBuf,
}

impl Default for ApxRuntime {
    fn default() -> Self {
        Self::new("apx", "podman")
    }
}

impl ApxRuntime {
    pub fn new(apx: impl Into<PathBuf>, podman: impl Into<PathBuf>) -> Self {
        Self {
            apx: apx.into(),
            podman: podman.into(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for ApxRuntime {
    async fn list_containers(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ContainerError> {
        let stdout = run(&self.podman, &["ps", "-a", "--format", "{{.Names}}"], cancel).await?;
        Ok(parse_names(&stdout))
    }

    async fn init_container(
        &self,
        flag: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError> {
        run(&self.apx, &[flag, "init"], cancel).await.map(|_| ())
    }

    async fn install_package(
        &self,
        flag: &str,
        package: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ContainerError> {
        run(&self.apx, &[flag, "install", "-y", package], cancel)
            .await
            .map(|_| ())
    }

    async fn launch(&self, flag: &str, command: &str) -> Result<(), ContainerError> {
        let args = [flag, "run", command];
        let rendered = render(&self.apx, &args);
        debug!("launching `{rendered}`");
        Command::new(&self.apx)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|source| ContainerError::Spawn {
                command: rendered,
                source,
            })
    }
}

/// Runs `program` to completion and returns its stdout. The child is killed
/// when `cancel` fires.
async fn run(
    program: &Path,
    args: &[&str],
    cancel: &CancellationToken,
) -> Result<String, ContainerError> {
    let command = render(program, args);
    if cancel.is_cancelled() {
        return Err(ContainerError::Cancelled { command });
    }
    debug!("running `{command}`");
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ContainerError::Spawn {
            command: command.clone(),
            source,
        })?;

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(ContainerError::Cancelled { command }),
        output = child.wait_with_output() => output.map_err(|source| ContainerError::Spawn {
            command: command.clone(),
            source,
        })?,
    };
    if !output.status.success() {
        return Err(ContainerError::CommandFailed {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn render(program: &Path, args: &[&str]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

fn parse_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
