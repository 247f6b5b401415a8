//! Download and extraction of resource archives.
//!
//! A resource is fetched with the first [`Transport`] that succeeds into a
//! hidden temporary file inside the destination directory, then unpacked in
//! place. The temporary file is deleted whatever happens, so a failed
//! download never leaves a partial archive behind.

use super::InstallError;
use crate::process::{find_executable, CommandRunner};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a single [`Transport`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Connection, TLS or protocol failure.
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("Server returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The body was shorter than announced.
    #[error("Truncated body from {url}: expected {expected} bytes, received {received}")]
    Truncated { url: String, expected: u64, received: u64 },

    /// The transport cannot run on this machine.
    #[error("{transport} is not available")]
    Unavailable { transport: String },

    /// The downloaded bytes could not be written.
    #[error("Cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A way to fetch a URL into a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Download `url` into `dest`, replacing its content. Returns the number
    /// of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransportError>;
}

/// Buffered HTTP(S) download with `reqwest`.
///
/// The whole body is read before anything is written, and a body shorter
/// than its `Content-Length` is rejected.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let request_error = |e: reqwest::Error| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(request_error)?;
        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let expected = response.content_length();
        let bytes = response.bytes().await.map_err(request_error)?;
        let received = bytes.len() as u64;
        if let Some(expected) = expected.filter(|&n| n != received) {
            return Err(TransportError::Truncated {
                url: url.to_string(),
                expected,
                received,
            });
        }

        tokio::fs::write(dest, &bytes).await.map_err(|source| TransportError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(received)
    }
}

/// Download through the external `curl` program.
pub struct CurlTransport {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl CurlTransport {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

#[async_trait]
impl Transport for CurlTransport {
    fn name(&self) -> &str {
        "curl"
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let curl = find_executable("curl").ok_or_else(|| TransportError::Unavailable {
            transport: "curl".to_string(),
        })?;

        let command = format!(
            "{} -fsSL --max-time {} -o {} {}",
            shell_words::quote(&curl.to_string_lossy()),
            self.timeout.as_secs().max(1),
            shell_words::quote(&dest.to_string_lossy()),
            shell_words::quote(url)
        );
        // Leave curl its own --max-time before killing it.
        let limit = self.timeout + Duration::from_secs(5);
        let out = self.runner.run(&command, Some(limit)).await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !out.success() {
            return Err(TransportError::Request {
                url: url.to_string(),
                message: format!("curl exited with code {:?}: {}", out.exit_code, out.stderr),
            });
        }

        let metadata = tokio::fs::metadata(dest).await.map_err(|source| TransportError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(metadata.len())
    }
}

/// Archive formats resources are shipped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArchiveFormat {
    Zip,
    Tar,
}

impl ArchiveFormat {
    /// Format implied by a file name's extension.
    pub(crate) fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::Tar => ".tar",
        }
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), String> {
        let file = File::open(archive).map_err(|e| e.to_string())?;
        match self {
            Self::Zip => zip::ZipArchive::new(file)
                .and_then(|mut zip| zip.extract(dest))
                .map_err(|e| e.to_string()),
            Self::Tar => tar::Archive::new(file).unpack(dest).map_err(|e| e.to_string()),
        }
    }
}

/// URL of `file_name` under `base`.
///
/// SourceForge serves files from a `/download` suffix.
pub(crate) fn resource_url(base: &str, file_name: &str) -> String {
    let mut url = base.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(file_name);
    if base.contains("sourceforge") {
        url.push_str("/download");
    }
    url
}

/// Download `file_name` from `base` and unpack it into `dest_dir`.
pub(crate) async fn install_resource(
    transports: &[Arc<dyn Transport>],
    base: &str,
    file_name: &str,
    dest_dir: &Path,
) -> Result<(), InstallError> {
    let format = ArchiveFormat::from_file_name(file_name).ok_or_else(|| InstallError::Archive {
        path: PathBuf::from(file_name),
        message: "unsupported file extension, expected zip or tar".to_string(),
        fix: "Fix the resource name in the feature descriptor".to_string(),
    })?;
    let url = resource_url(base, file_name);
    tracing::debug!(url = %url, dest = %dest_dir.display(), "downloading resource");

    let io_error = |e: std::io::Error| InstallError::Io {
        message: format!("{}: {}", dest_dir.display(), e),
        fix: format!("Check that {} is writable", dest_dir.display()),
    };
    tokio::fs::create_dir_all(dest_dir).await.map_err(io_error)?;
    let temp = tempfile::Builder::new()
        .prefix(".download-")
        .suffix(format.extension())
        .tempfile_in(dest_dir)
        .map_err(io_error)?;

    let mut failures = Vec::new();
    let mut fetched = false;
    for transport in transports {
        match transport.fetch(&url, temp.path()).await {
            Ok(bytes) => {
                tracing::info!(url = %url, transport = transport.name(), bytes, "downloaded");
                fetched = true;
                break;
            }
            Err(e) => {
                tracing::warn!(url = %url, transport = transport.name(), error = %e, "download failed");
                failures.push(format!("{}: {}", transport.name(), e));
            }
        }
    }
    if !fetched {
        if failures.is_empty() {
            failures.push("no transport configured".to_string());
        }
        return Err(InstallError::Transport {
            url,
            message: failures.join("; "),
            fix: format!(
                "Check your internet connection, or download {} by hand and unpack it in {}",
                file_name,
                dest_dir.display()
            ),
        });
    }

    let archive = temp.path().to_path_buf();
    let dest = dest_dir.to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || format.extract(&archive, &dest))
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result);
    drop(temp);

    extracted.map_err(|message| InstallError::Archive {
        path: dest_dir.join(file_name),
        message,
        fix: format!("Download {url} again or unpack it by hand"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Serves fixed bytes, or fails.
    struct StaticTransport {
        body: Option<Vec<u8>>,
    }

    #[async_trait]
    impl Transport for StaticTransport {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
            match &self.body {
                Some(body) => {
                    std::fs::write(dest, body).unwrap();
                    Ok(body.len() as u64)
                }
                None => Err(TransportError::Request {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    fn tar_with(name: &str, content: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content).unwrap();
        builder.into_inner().unwrap()
    }

    fn zip_with(name: &str, content: &[u8]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn only_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_resource_url() {
        assert_eq!(resource_url("https://sppas.org/resources", "fra.zip"), "https://sppas.org/resources/fra.zip");
        assert_eq!(
            resource_url("https://sourceforge.net/projects/sppas/files/", "face.tar"),
            "https://sourceforge.net/projects/sppas/files/face.tar/download"
        );
    }

    #[test]
    fn test_archive_format() {
        assert_eq!(ArchiveFormat::from_file_name("fra.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_file_name("FACE.TAR"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_file_name("fra.7z"), None);
    }

    #[tokio::test]
    async fn test_install_tar_resource() {
        let dir = tempfile::tempdir().unwrap();
        let transports: Vec<Arc<dyn Transport>> = vec![Arc::new(StaticTransport {
            body: Some(tar_with("face/model.txt", b"weights")),
        })];

        install_resource(&transports, "https://example.org/", "face.tar", dir.path())
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("face").join("model.txt")).unwrap();
        assert_eq!(content, "weights");
        assert_eq!(only_entries(dir.path()), vec!["face"]);
    }

    #[tokio::test]
    async fn test_fallback_transport_used() {
        let dir = tempfile::tempdir().unwrap();
        let transports: Vec<Arc<dyn Transport>> = vec![
            Arc::new(StaticTransport { body: None }),
            Arc::new(StaticTransport {
                body: Some(zip_with("fra/vocab.txt", b"bonjour")),
            }),
        ];

        install_resource(&transports, "https://example.org/", "fra.zip", dir.path())
            .await
            .unwrap();
        assert!(dir.path().join("fra").join("vocab.txt").exists());
    }

    #[tokio::test]
    async fn test_all_transports_fail_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let transports: Vec<Arc<dyn Transport>> =
            vec![Arc::new(StaticTransport { body: None }), Arc::new(StaticTransport { body: None })];

        let error = install_resource(&transports, "https://example.org/", "fra.zip", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(error, InstallError::Transport { .. }));
        assert!(error.to_string().contains("connection refused"));
        assert!(only_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let transports: Vec<Arc<dyn Transport>> = vec![Arc::new(StaticTransport {
            body: Some(b"<html>not found</html>".to_vec()),
        })];

        let error = install_resource(&transports, "https://example.org/", "fra.zip", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(error, InstallError::Archive { .. }));
        assert!(only_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let error = install_resource(&[], "https://example.org/", "fra.7z", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(error, InstallError::Archive { .. }));
    }
}
