//! External HTML to PDF converters.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tokio::process::Command;
use uuid::Uuid;

use super::{BackendError, PdfBackend};

/// Gotenberg's Chromium HTML route.
pub struct GotenbergBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GotenbergBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self { client, base_url: base_url.into(), timeout }
    }
}

#[async_trait]
impl PdfBackend for GotenbergBackend {
    fn name(&self) -> &'static str { "gotenberg" }

    async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, BackendError> {
        let part = Part::text(html.to_string())
            .file_name("index.html")
            .mime_str("text/html")?;
        let response = self.client
            .post(format!("{}/forms/chromium/convert/html", self.base_url.trim_end_matches('/')))
            .multipart(Form::new().part("files", part))
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Failed(format!("gotenberg returned {}", response.status())));
        }
        let bytes = response.bytes().await?.to_vec();
        check_pdf(bytes)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandFlavor {
    Chromium,
    Wkhtmltopdf,
}

/// Runs a converter binary on a scratch HTML file.
pub struct CommandBackend {
    flavor: CommandFlavor,
    program: String,
    scratch_dir: PathBuf,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(flavor: CommandFlavor, program: impl Into<String>, timeout: Duration) -> Self {
        Self { flavor, program: program.into(), scratch_dir: std::env::temp_dir(), timeout }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.flavor {
            CommandFlavor::Chromium => {
                cmd.args(["--headless", "--disable-gpu", "--no-sandbox", "--no-pdf-header-footer"])
                    .arg(format!("--print-to-pdf={}", output.display()))
                    .arg(format!("file://{}", input.display()));
            }
            CommandFlavor::Wkhtmltopdf => {
                cmd.args(["--quiet", "--encoding", "utf-8"]).arg(input).arg(output);
            }
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped()).kill_on_drop(true);
        cmd
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<Vec<u8>, BackendError> {
        let child = self.command(input, output).spawn()?;
        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(BackendError::Failed(format!("{} exited with {}: {}", self.program, result.status, stderr.trim())));
        }
        check_pdf(tokio::fs::read(output).await?)
    }
}

#[async_trait]
impl PdfBackend for CommandBackend {
    fn name(&self) -> &'static str {
        match self.flavor {
            CommandFlavor::Chromium => "chromium",
            CommandFlavor::Wkhtmltopdf => "wkhtmltopdf",
        }
    }

    async fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, BackendError> {
        let stem = format!("invoice-{}", Uuid::new_v4().simple());
        let input = self.scratch_dir.join(format!("{stem}.html"));
        let output = self.scratch_dir.join(format!("{stem}.pdf"));
        tokio::fs::write(&input, html).await?;
        let result = self.run(&input, &output).await;
        let _ = tokio::fs::remove_file(&input).await;
        let _ = tokio::fs::remove_file(&output).await;
        result
    }
}

fn check_pdf(bytes: Vec<u8>) -> Result<Vec<u8>, BackendError> {
    if bytes.starts_with(b"%PDF-") {
        Ok(bytes)
    } else {
        Err(BackendError::Failed(format!("output is not a PDF ({} bytes)", bytes.len())))
    }
}
