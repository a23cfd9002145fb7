use futures::StreamExt;
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::models::bundle::Bundle;

/// Stream `bundle` to `output_path`, calling `progress` with each chunk size.
///
/// Returns the number of bytes written. A partially written file is removed
/// on failure.
pub async fn download_bundle<F>(
    http: &Client,
    bundle: &Bundle,
    output_path: &Path,
    mut progress: F,
) -> Result<u64, DownloadError>
where
    F: FnMut(u64),
{
    tracing::info!(url = %bundle.download_url, path = %output_path.display(), "Downloading bundle");

    let response = http.get(&bundle.download_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            status: status.as_u16(),
            url: bundle.download_url.clone(),
        });
    }

    let file = File::create(output_path)
        .await
        .map_err(|source| io_error(output_path, source))?;

    match write_body(response, file, output_path, &mut progress).await {
        Ok(written) => {
            tracing::info!(bytes = written, path = %output_path.display(), "Bundle downloaded");
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(output_path).await {
                tracing::warn!(path = %output_path.display(), error = %cleanup, "Failed to remove partial download");
            }
            Err(e)
        }
    }
}

async fn write_body(
    response: Response,
    mut file: File,
    output_path: &Path,
    progress: &mut dyn FnMut(u64),
) -> Result<u64, DownloadError> {
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|source| io_error(output_path, source))?;
        written += chunk.len() as u64;
        progress(chunk.len() as u64);
    }

    file.flush()
        .await
        .map_err(|source| io_error(output_path, source))?;
    Ok(written)
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Bundle download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bundle download returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path, source: std::io::Error) -> DownloadError {
    DownloadError::Io {
        path: path.to_path_buf(),
        source,
    }
}
