use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::RendererConfig;

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("{0}")]
    Failed(String),
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
}

/// An external diagram renderer.
pub trait Renderer: Send + Sync {
    /// Render `source` into `out_dir`. The tool picks the output file name
    /// (PlantUML uses the `@startuml <name>` title when there is one).
    fn render<'a>(&'a self, source: &'a Path, out_dir: &'a Path) -> BoxFuture<'a, Result<(), RenderError>>;
}

/// Runs `java -jar plantuml.jar -tpng <source> -o <out_dir>`.
pub struct PlantUmlRenderer {
    java_bin: String,
    jar: PathBuf,
    timeout: Duration,
}

impl PlantUmlRenderer {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            java_bin: config.java_bin.clone(),
            jar: config.plantuml_jar.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl Renderer for PlantUmlRenderer {
    fn render<'a>(&'a self, source: &'a Path, out_dir: &'a Path) -> BoxFuture<'a, Result<(), RenderError>> {
        async move {
            if !self.jar.exists() {
                return Err(RenderError::Failed(format!(
                    "PlantUML jar not found at {}",
                    self.jar.display()
                )));
            }

            let mut cmd = tokio::process::Command::new(&self.java_bin);
            cmd.arg("-jar")
                .arg(&self.jar)
                .arg("-tpng")
                .arg(source)
                .arg("-o")
                .arg(out_dir)
                .kill_on_drop(true);

            let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(RenderError::Failed(format!(
                        "failed to run {}: {e}",
                        self.java_bin
                    )))
                }
                Err(_) => return Err(RenderError::Timeout(self.timeout)),
            };

            if output.status.success() {
                return Ok(());
            }

            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let diagnostic = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            Err(RenderError::Failed(format!(
                "PlantUML exited with {}: {diagnostic}",
                output.status
            )))
        }
        .boxed()
    }
}
