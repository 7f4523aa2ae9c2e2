//! Static export: writes the listing and every post page under one directory.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::application::{
    listing::ListingService,
    pages::{PageError, PageScheduler},
};

const SOURCE: &str = "pressroom::export";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to prepare output directory `{path}`")]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to enumerate posts")]
    Paths(#[from] PageError),
    #[error("{failed} page(s) failed to export")]
    Incomplete { failed: usize },
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

pub struct StaticExporter {
    listing: ListingService,
    pages: PageScheduler,
}

impl StaticExporter {
    pub fn new(listing: ListingService, pages: PageScheduler) -> Self {
        Self { listing, pages }
    }

    /// Attempt every page, then fail if any of them could not be written.
    pub async fn export(&self, out: &Path, concurrency: usize) -> Result<ExportReport, ExportError> {
        fs::create_dir_all(out)
            .await
            .map_err(|source| ExportError::Prepare {
                path: out.to_path_buf(),
                source,
            })?;

        let mut report = ExportReport::default();

        match self.listing.render_index().await {
            Ok(html) => record(&mut report, "/", write_page(&out.join("index.html"), &html).await),
            Err(err) => {
                warn!(target = SOURCE, error = %err, "listing export failed");
                report.failed.push(("/".to_string(), err.to_string()));
            }
        }

        let prebuilt = self.pages.prebuild(concurrency).await?;
        for (slug, reason) in prebuilt.failed {
            report.failed.push((format!("/post/{slug}"), reason));
        }

        for slug in prebuilt.built {
            let route = format!("/post/{slug}");
            match self.pages.request(&slug).await {
                Ok(served) => {
                    let path = out.join("post").join(&slug).join("index.html");
                    record(&mut report, &route, write_page(&path, &served.page.html).await);
                }
                Err(err) => {
                    warn!(target = SOURCE, route = %route, error = %err, "page vanished during export");
                    report.failed.push((route, err.to_string()));
                }
            }
        }

        info!(
            target = SOURCE,
            out = %out.display(),
            written = report.written.len(),
            failed = report.failed.len(),
            "export finished"
        );

        if report.failed.is_empty() {
            Ok(report)
        } else {
            Err(ExportError::Incomplete {
                failed: report.failed.len(),
            })
        }
    }
}

async fn write_page(path: &Path, html: &str) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, html).await?;
    Ok(path.to_path_buf())
}

fn record(report: &mut ExportReport, route: &str, result: io::Result<PathBuf>) {
    match result {
        Ok(path) => report.written.push(path),
        Err(err) => {
            warn!(target = SOURCE, route, error = %err, "failed to write page");
            report.failed.push((route.to_string(), err.to_string()));
        }
    }
}
