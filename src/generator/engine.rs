//! Headless browser HTML to PDF conversion.
//!
//! Each conversion writes the page to `{tmp}/{name}.html`, starts one
//! browser process with its own throwaway profile directory, prints the page
//! to a partial file next to the output and renames it once complete. The
//! browser process is always closed, and killed if it is still running,
//! whatever the outcome.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::process::{Child, Command};

use crate::error::{DocumentError, Result};

/// A4 page and background printing.
const PRINT_STYLE: &str = "<style>@page { size: A4; margin: 0; } \
html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }</style>";

#[async_trait]
pub trait PdfConverter: Send + Sync {
    /// Converts `html` into `{pdf_dir}/{output_name}.pdf` and returns its path.
    async fn html_to_pdf(&self, id: &str, html: &str, output_name: &str) -> Result<PathBuf>;
}

/// Files of one conversion.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: String,
    pub html_path: PathBuf,
    pub pdf_path: PathBuf,
    pub profile_dir: PathBuf,
}

impl PrintJob {
    pub fn page_url(&self) -> Result<String> {
        file_url(&self.html_path)
    }
}

/// Absolute, percent-encoded `file://` URL of `path`.
pub fn file_url(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .map_err(|e| DocumentError::render(format!("cannot resolve {}: {}", path.display(), e)))?;
    url::Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| DocumentError::render(format!("no file url for {}", absolute.display())))
}

#[async_trait]
pub trait BrowserProcess: Send {
    /// Loads the page and prints it to `PrintJob::pdf_path`.
    async fn render(&mut self) -> Result<()>;

    /// Closes the browser and kills it if it did not exit.
    async fn close(&mut self);
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, job: &PrintJob) -> Result<Box<dyn BrowserProcess>>;
}

/// Launches a Chromium binary in headless print mode.
pub struct ChromiumLauncher {
    executable: PathBuf,
}

impl ChromiumLauncher {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn args(job: &PrintJob) -> Result<Vec<String>> {
        Ok(vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--disable-software-rasterizer".to_string(),
            "--disable-extensions".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-component-update".to_string(),
            "--disable-default-apps".to_string(),
            "--disable-sync".to_string(),
            "--disable-breakpad".to_string(),
            "--disable-crash-reporter".to_string(),
            "--metrics-recording-only".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--mute-audio".to_string(),
            "--hide-scrollbars".to_string(),
            "--host-resolver-rules=MAP * ~NOTFOUND".to_string(),
            "--no-pdf-header-footer".to_string(),
            format!("--user-data-dir={}", job.profile_dir.display()),
            format!("--print-to-pdf={}", job.pdf_path.display()),
            job.page_url()?,
        ])
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, job: &PrintJob) -> Result<Box<dyn BrowserProcess>> {
        let child = Command::new(&self.executable)
            .args(Self::args(job)?)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(
                    "failed to launch {} for {}: {}",
                    self.executable.display(),
                    job.id,
                    e
                );
                DocumentError::render(format!("cannot launch browser: {}", e))
            })?;
        debug!("browser started (pid {:?}) for {}", child.id(), job.id);
        Ok(Box::new(ChromiumProcess {
            child: Some(child),
            job: job.clone(),
        }))
    }
}

struct ChromiumProcess {
    child: Option<Child>,
    job: PrintJob,
}

#[async_trait]
impl BrowserProcess for ChromiumProcess {
    async fn render(&mut self) -> Result<()> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| DocumentError::render("browser already closed"))?;
        let status = child
            .wait()
            .await
            .map_err(|e| DocumentError::render(format!("browser wait failed: {}", e)))?;
        if !status.success() {
            return Err(DocumentError::render(format!("browser exited with {}", status)));
        }
        if !self.job.pdf_path.is_file() {
            return Err(DocumentError::render("browser produced no pdf"));
        }
        Ok(())
    }

    async fn close(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(_)) => {}
            _ => {
                warn!("browser for {} still running, killing it", self.job.id);
                if let Err(e) = child.kill().await {
                    error!("failed to kill browser for {}: {}", self.job.id, e);
                }
            }
        }
    }
}

/// Render engine adapter around a [`BrowserLauncher`].
pub struct ChromeHeadless {
    launcher: Arc<dyn BrowserLauncher>,
    tmp_dir: PathBuf,
    pdf_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ChromeHeadless {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        tmp_dir: impl Into<PathBuf>,
        pdf_dir: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            launcher,
            tmp_dir: tmp_dir.into(),
            pdf_dir: pdf_dir.into(),
            timeout,
        }
    }

    /// Adapter driving the Chromium executable at `executable`.
    pub fn chromium(
        executable: impl Into<PathBuf>,
        tmp_dir: impl Into<PathBuf>,
        pdf_dir: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Self {
        Self::new(
            Arc::new(ChromiumLauncher::new(executable)),
            tmp_dir,
            pdf_dir,
            timeout,
        )
    }

    async fn print(&self, job: &PrintJob) -> Result<()> {
        let mut process = self.launcher.launch(job).await?;
        let rendered = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, process.render()).await {
                Ok(result) => result,
                Err(_) => Err(DocumentError::render(format!(
                    "browser did not finish within {:?}",
                    limit
                ))),
            },
            None => process.render().await,
        };
        process.close().await;
        rendered
    }
}

fn with_print_style(html: &str) -> String {
    match html.find("</head>") {
        Some(at) => format!("{}{}{}", &html[..at], PRINT_STYLE, &html[at..]),
        None => format!("{}{}", PRINT_STYLE, html),
    }
}

async fn finalize(partial: &Path, target: &Path) -> std::io::Result<()> {
    let file = tokio::fs::File::open(partial).await?;
    file.sync_all().await?;
    tokio::fs::rename(partial, target).await
}

#[async_trait]
impl PdfConverter for ChromeHeadless {
    async fn html_to_pdf(&self, id: &str, html: &str, output_name: &str) -> Result<PathBuf> {
        let name = sanitize_filename::sanitize(output_name);
        if name.is_empty() {
            return Err(DocumentError::validation("output name is empty"));
        }

        for dir in [&self.tmp_dir, &self.pdf_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| DocumentError::storage(format!("cannot create {}: {}", dir.display(), e)))?;
        }

        let html_path = self.tmp_dir.join(format!("{}.html", name));
        tokio::fs::write(&html_path, with_print_style(html))
            .await
            .map_err(|e| DocumentError::storage(format!("cannot write {}: {}", html_path.display(), e)))?;

        let profile = tempfile::Builder::new()
            .prefix("browser-profile-")
            .tempdir_in(&self.tmp_dir)
            .map_err(|e| DocumentError::storage(format!("cannot create browser profile: {}", e)))?;

        let target = self.pdf_dir.join(format!("{}.pdf", name));
        let job = PrintJob {
            id: id.to_string(),
            html_path,
            pdf_path: self.pdf_dir.join(format!(".{}.pdf.partial", name)),
            profile_dir: profile.path().to_path_buf(),
        };

        info!("converting {} to {}", job.id, target.display());
        if let Err(e) = self.print(&job).await {
            error!("pdf conversion of {} ({}) failed: {}", job.id, name, e);
            let _ = tokio::fs::remove_file(&job.pdf_path).await;
            return Err(match e {
                DocumentError::RenderFailed(_) => e,
                other => DocumentError::render(other.to_string()),
            });
        }

        finalize(&job.pdf_path, &target).await.map_err(|e| {
            error!("cannot finalize pdf of {}: {}", job.id, e);
            DocumentError::render(format!("cannot write pdf: {}", e))
        })?;
        Ok(target)
    }
}
