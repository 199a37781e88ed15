//! Container runs for work that needs tools from another distribution.
//!
//! Commands are queued on a [`RunSpec`] and executed in one
//! `bash -c` inside a fresh container, with host directories bind-mounted.

use crate::{FlorError, Reporter};
use anyhow::{Context, Result, bail};
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::image::{BuildImageOptions, CreateImageOptions};
use bollard::models::{ContainerWaitResponse, HostConfig};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

pub const USERNAME_VAR: &str = "DOCKER_USERNAME";
pub const PASSWORD_VAR: &str = "DOCKER_PASSWORD";

/// Exit status reported by a container's wait stream.
///
/// A non-zero exit surfaces as a wait error carrying the code; any other
/// wait error is returned.
fn exit_status<I>(results: I) -> Result<i64, bollard::errors::Error>
where
    I: IntoIterator<Item = Result<ContainerWaitResponse, bollard::errors::Error>>,
{
    let mut exit_code = 0;
    for result in results {
        match result {
            Ok(response) => exit_code = response.status_code,
            Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => exit_code = code,
            Err(e) => return Err(e),
        }
    }
    Ok(exit_code)
}

/// Bind mounts and queued commands of the next run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    /// host path -> (container path, mode)
    directory_map: BTreeMap<String, (String, String)>,
    bash_cmds: Vec<String>,
}

impl RunSpec {
    /// Mount `host` at `container` (same path when `None`).
    pub fn map_directory(&mut self, host: &str, container: Option<&str>, mode: &str) {
        self.directory_map.insert(
            host.to_string(),
            (container.unwrap_or(host).to_string(), mode.to_string()),
        );
    }

    pub fn add_bash_command(&mut self, cmd: &str) {
        self.bash_cmds.push(cmd.to_string());
    }

    pub fn clear_commands(&mut self) {
        self.bash_cmds.clear();
    }

    /// The queued commands joined with `&&`.
    pub fn script(&self) -> String {
        self.bash_cmds.join(" && ")
    }

    /// `bash -c '<cmd1> && <cmd2>'`, as shown to the user.
    pub fn command_string(&self) -> String {
        format!("bash -c '{}'", self.script())
    }

    /// Docker `binds` entries, `host:container:mode`.
    pub fn binds(&self) -> Vec<String> {
        self.directory_map
            .iter()
            .map(|(host, (container, mode))| format!("{host}:{container}:{mode}"))
            .collect()
    }
}

/// Directory holding the `Dockerfile` for `path` (the file or its directory).
///
/// # Errors
///
/// Returns [`FlorError::NoDockerfile`] when there is no `Dockerfile` there.
pub fn dockerfile_context(path: &Path) -> Result<PathBuf, FlorError> {
    let dir = if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    if dir.is_dir() && dir.join("Dockerfile").is_file() {
        Ok(dir)
    } else {
        Err(FlorError::NoDockerfile(dir))
    }
}

/// Registry credentials from the environment, else an interactive prompt.
///
/// # Errors
///
/// Returns [`FlorError::Credentials`] when the variables are unset and stdin
/// is not a terminal, or when the prompt fails.
pub fn resolve_credentials(
    username: Option<String>,
    password: Option<String>,
    interactive: bool,
) -> Result<(String, String), FlorError> {
    if let (Some(user), Some(pass)) = (username, password) {
        return Ok((user, pass));
    }
    if !interactive {
        return Err(FlorError::Credentials(format!(
            "Please set '{USERNAME_VAR}' and '{PASSWORD_VAR}' when not in interactive mode."
        )));
    }
    let prompt_failed = |e: dialoguer::Error| FlorError::Credentials(e.to_string());
    let user = dialoguer::Input::<String>::new()
        .with_prompt("Docker username")
        .interact_text()
        .map_err(prompt_failed)?;
    let pass = dialoguer::Password::new()
        .with_prompt("Docker password")
        .interact()
        .map_err(prompt_failed)?;
    Ok((user, pass))
}

pub struct Docker {
    client: bollard::Docker,
    image: Option<String>,
    credentials: Option<DockerCredentials>,
    spec: RunSpec,
}

impl std::fmt::Debug for Docker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Docker")
            .field("image", &self.image)
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl Docker {
    /// Connect to the local daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon settings cannot be read.
    pub fn connect() -> Result<Self> {
        let client = bollard::Docker::connect_with_local_defaults()
            .context("Failed to connect to docker")?;
        Ok(Self {
            client,
            image: None,
            credentials: None,
            spec: RunSpec::default(),
        })
    }

    /// Mounts and commands of the next [`Docker::run`].
    pub fn apply(&mut self, spec: RunSpec) {
        self.spec = spec;
    }

    /// Build an image from the directory holding `dockerfile` and tag it.
    ///
    /// # Errors
    ///
    /// Returns [`FlorError::NoDockerfile`] when there is no `Dockerfile`, or
    /// an error when the build fails.
    pub async fn build(&mut self, dockerfile: &Path, tag: &str) -> Result<()> {
        let dir = dockerfile_context(dockerfile)?;
        let mut context = tar::Builder::new(Vec::new());
        context
            .append_dir_all(".", &dir)
            .with_context(|| format!("Failed to pack build context {}", dir.display()))?;
        let context = context.into_inner()?;

        let options = BuildImageOptions {
            t: tag,
            dockerfile: "Dockerfile",
            rm: true,
            ..Default::default()
        };
        let mut stream = self
            .client
            .build_image(options, None, Some(context.into()));
        while let Some(info) = stream.next().await {
            let info = info.context("Docker build failed")?;
            if let Some(line) = info.stream {
                tracing::debug!("build: {}", line.trim_end());
            }
            if let Some(error) = info.error {
                bail!("Docker build failed: {error}");
            }
        }
        self.image = Some(tag.to_string());
        Ok(())
    }

    /// Pull `<org>/<repo>:<tag>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails.
    pub async fn pull(&mut self, org: &str, repo: &str, tag: &str) -> Result<()> {
        let image = format!("{org}/{repo}:{tag}");
        let options = CreateImageOptions {
            from_image: image.as_str(),
            ..Default::default()
        };
        let mut stream = self
            .client
            .create_image(Some(options), None, self.credentials.clone());
        while let Some(info) = stream.next().await {
            let info = info.with_context(|| format!("Failed to pull {image}"))?;
            if let Some(status) = info.status {
                tracing::debug!("pull: {status}");
            }
            if let Some(error) = info.error {
                bail!("Failed to pull {image}: {error}");
            }
        }
        drop(stream);
        self.image = Some(image);
        Ok(())
    }

    /// Resolve registry credentials for later pulls.
    ///
    /// # Errors
    ///
    /// Returns [`FlorError::Credentials`] when none can be obtained.
    pub fn login(&mut self) -> Result<(), FlorError> {
        let (username, password) = resolve_credentials(
            std::env::var(USERNAME_VAR).ok(),
            std::env::var(PASSWORD_VAR).ok(),
            std::io::stdin().is_terminal(),
        )?;
        self.credentials = Some(DockerCredentials {
            username: Some(username),
            password: Some(password),
            ..Default::default()
        });
        Ok(())
    }

    /// Run the queued commands in a container of the built or pulled image.
    ///
    /// # Errors
    ///
    /// Returns an error if no image is set, the container cannot be
    /// started, or the commands exit non-zero.
    pub async fn run(
        &self,
        rm: bool,
        show_cmd: bool,
        privileged: bool,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        let Some(image) = self.image.as_deref() else {
            bail!("No docker image was built or pulled");
        };
        if show_cmd {
            reporter.info(&format!(
                "Running container with command string '{}'...",
                self.spec.command_string()
            ));
        }
        let config = Config {
            image: Some(image.to_string()),
            cmd: Some(vec!["bash".to_string(), "-c".to_string(), self.spec.script()]),
            host_config: Some(HostConfig {
                binds: Some(self.spec.binds()),
                privileged: Some(privileged),
                ..Default::default()
            }),
            ..Default::default()
        };
        let container = self
            .client
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .context("Failed to create container")?;
        self.client
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start container")?;

        let results: Vec<_> = self
            .client
            .wait_container(&container.id, None::<WaitContainerOptions<String>>)
            .collect()
            .await;
        let status = exit_status(results);
        if rm {
            let removed = self
                .client
                .remove_container(
                    &container.id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
            if let Err(e) = removed {
                if status.is_ok() {
                    return Err(e).context("Failed to remove container");
                }
                tracing::warn!("failed to remove container {}: {e}", container.id);
            }
        }
        let exit_code = status.context("Failed waiting for container")?;
        if exit_code != 0 {
            bail!("Container exited with status {exit_code}");
        }
        reporter.ok("Docker container exited.");
        Ok(())
    }
}
