//! # pdfium-auto
//!
//! Locate a [PDFium](https://pdfium.googlesource.com/pdfium/) shared library
//! for `pdfium-render`, downloading and caching a pinned build when none is
//! available locally.
//!
//! ## Resolution order
//!
//! [`resolve_library`] tries, in order:
//!
//! 1. `PDFIUM_LIB_PATH`: an explicit library file. Its build is unknown, so
//!    [`ResolvedLibrary::version`] is `None`.
//! 2. The per-version cache directory (see [`pdfium_cache_dir`]).
//! 3. A download of the platform archive for [`PDFIUM_VERSION`] from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    extracted into the cache directory.
//!
//! The first successful resolution is memoised for the rest of the process.
//!
//! ```rust,no_run
//! let (pdfium, library) = pdfium_auto::bind_resolved(None).expect("PDFium unavailable");
//! println!("bound {} ({:?})", library.path.display(), library.origin);
//! # drop(pdfium);
//! ```
//!
//! ## Environment variable overrides
//!
//! - `PDFIUM_LIB_PATH`: path to an existing pdfium library; skips download.
//! - `PDFIUM_AUTO_CACHE_DIR`: override the default cache directory.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

const BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Download progress callback: `(bytes_downloaded, total_bytes)`.
pub type ProgressFn<'a> = &'a dyn Fn(u64, Option<u64>);

/// Errors returned by pdfium-auto operations.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// `pdfium-render` could not load the library.
    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

// ── Platform table ──────────────────────────────────────────────────────────

/// Where the platform library lives, both in the release and on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Asset filename in the GitHub release, e.g. `pdfium-mac-arm64.tgz`.
    pub archive_name: &'static str,
    /// Relative path inside the archive, e.g. `lib/libpdfium.dylib`.
    pub member: &'static str,
    /// Filename written to the cache directory.
    pub lib_name: &'static str,
}

const fn platform(
    archive_name: &'static str,
    member: &'static str,
    lib_name: &'static str,
) -> PlatformInfo {
    PlatformInfo {
        archive_name,
        member,
        lib_name,
    }
}

const PLATFORMS: &[(&str, &str, PlatformInfo)] = &[
    (
        "macos",
        "aarch64",
        platform("pdfium-mac-arm64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
    ),
    ("macos", "x86_64", platform("pdfium-mac-x64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib")),
    ("linux", "x86_64", platform("pdfium-linux-x64.tgz", "lib/libpdfium.so", "libpdfium.so")),
    ("linux", "aarch64", platform("pdfium-linux-arm64.tgz", "lib/libpdfium.so", "libpdfium.so")),
    ("windows", "x86_64", platform("pdfium-win-x64.tgz", "bin/pdfium.dll", "pdfium.dll")),
    ("windows", "aarch64", platform("pdfium-win-arm64.tgz", "bin/pdfium.dll", "pdfium.dll")),
    ("windows", "x86", platform("pdfium-win-x86.tgz", "bin/pdfium.dll", "pdfium.dll")),
];

/// Look up the release asset for an `(os, arch)` pair as reported by
/// [`std::env::consts`].
pub fn platform_for(os: &str, arch: &str) -> Result<PlatformInfo, PdfiumAutoError> {
    PLATFORMS
        .iter()
        .find(|(o, a, _)| *o == os && *a == arch)
        .map(|(_, _, info)| *info)
        .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        })
}

/// The release asset for the running platform.
pub fn current_platform() -> Result<PlatformInfo, PdfiumAutoError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Release page for a pdfium-binaries build, e.g. `.../chromium%2F7690`.
pub fn release_url(version: &str) -> String {
    format!("{BASE_URL}/chromium%2F{version}")
}

// ── Cache directory ─────────────────────────────────────────────────────────

/// Per-version cache directory for the PDFium library.
///
/// Defaults to `<platform cache dir>/pdf2img/pdfium-{VERSION}/`; override the
/// base with `PDFIUM_AUTO_CACHE_DIR`.
pub fn pdfium_cache_dir() -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");
    if let Ok(override_dir) = std::env::var("PDFIUM_AUTO_CACHE_DIR") {
        return PathBuf::from(override_dir).join(versioned);
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("pdf2img")
        .join(versioned)
}

// ── Resolution ──────────────────────────────────────────────────────────────

/// How a library path was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryOrigin {
    /// `PDFIUM_LIB_PATH` pointed at an existing file.
    EnvOverride,
    /// Found in the cache directory from an earlier download.
    Cached,
    /// Downloaded during this call.
    Downloaded,
}

/// A PDFium library on disk and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLibrary {
    pub path: PathBuf,
    pub origin: LibraryOrigin,
}

impl ResolvedLibrary {
    /// The pdfium-binaries build tag, when known.
    ///
    /// Libraries supplied through `PDFIUM_LIB_PATH` are of unknown build.
    pub fn version(&self) -> Option<&'static str> {
        match self.origin {
            LibraryOrigin::EnvOverride => None,
            LibraryOrigin::Cached | LibraryOrigin::Downloaded => Some(PDFIUM_VERSION),
        }
    }
}

static RESOLVED: OnceLock<ResolvedLibrary> = OnceLock::new();

/// Returns the library that [`resolve_library`] would use without touching
/// the network, or `None` when a download is required.
pub fn find_local_library() -> Option<ResolvedLibrary> {
    if let Some(resolved) = RESOLVED.get() {
        return Some(resolved.clone());
    }
    if let Some(path) = env_override() {
        return Some(ResolvedLibrary {
            path,
            origin: LibraryOrigin::EnvOverride,
        });
    }
    let info = current_platform().ok()?;
    let path = pdfium_cache_dir().join(info.lib_name);
    path.exists().then_some(ResolvedLibrary {
        path,
        origin: LibraryOrigin::Cached,
    })
}

/// Resolve a PDFium library, downloading it into the cache if needed.
///
/// Blocking; call from `spawn_blocking` in async code. Concurrent callers
/// may both download, but only the first result is memoised.
pub fn resolve_library(
    on_progress: Option<ProgressFn<'_>>,
) -> Result<ResolvedLibrary, PdfiumAutoError> {
    if let Some(resolved) = RESOLVED.get() {
        return Ok(resolved.clone());
    }

    let resolved = match find_local_library() {
        Some(local) => local,
        None => {
            let info = current_platform()?;
            let dest = pdfium_cache_dir().join(info.lib_name);
            download_into(&info, &dest, on_progress)?;
            ResolvedLibrary {
                path: dest,
                origin: LibraryOrigin::Downloaded,
            }
        }
    };

    debug!(path = %resolved.path.display(), origin = ?resolved.origin, "PDFium library resolved");
    Ok(RESOLVED.get_or_init(|| resolved).clone())
}

/// Resolve a library (see [`resolve_library`]) and bind to it.
pub fn bind_resolved(
    on_progress: Option<ProgressFn<'_>>,
) -> Result<(Pdfium, ResolvedLibrary), PdfiumAutoError> {
    let library = resolve_library(on_progress)?;
    let pdfium = bind_from_path(&library.path)?;
    Ok((pdfium, library))
}

/// Bind to a PDFium library at an explicit `path`.
pub fn bind_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// ── Internal helpers ────────────────────────────────────────────────────────

fn env_override() -> Option<PathBuf> {
    let raw = std::env::var("PDFIUM_LIB_PATH").ok()?;
    let path = PathBuf::from(raw);
    if path.exists() {
        Some(path)
    } else {
        warn!(path = %path.display(), "PDFIUM_LIB_PATH does not exist; ignoring");
        None
    }
}

fn download_into(
    info: &PlatformInfo,
    dest: &Path,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<(), PdfiumAutoError> {
    let url = format!("{}/{}", release_url(PDFIUM_VERSION), info.archive_name);
    info!(%url, "Downloading PDFium");

    if let Some(dir) = dest.parent() {
        std::fs::create_dir_all(dir).map_err(PdfiumAutoError::CacheDir)?;
    }

    let archive = download_bytes(&url, on_progress)?;
    extract_member(&archive, info.member, dest)?;
    info!(path = %dest.display(), bytes = archive.len(), "PDFium cached");
    Ok(())
}

/// Stream `url` into memory, reporting progress every 64 KiB chunk.
fn download_bytes(
    url: &str,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut buf = Vec::with_capacity(total.unwrap_or(32 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    let mut downloaded: u64 = 0;

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PdfiumAutoError::Download(format!("Read error: {e}"))),
        }
    }

    Ok(buf)
}

/// Unpack the single `member` of a gzipped tarball to `dest`.
fn extract_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let extract_err = |e: std::io::Error| PdfiumAutoError::Extract(e.to_string());
    let mut tarball = Archive::new(GzDecoder::new(archive));

    for entry in tarball.entries().map_err(extract_err)? {
        let mut entry = entry.map_err(extract_err)?;
        let matches = entry.path().map_err(extract_err)?.to_string_lossy() == member;
        if matches {
            entry
                .unpack(dest)
                .map_err(|e| PdfiumAutoError::Extract(format!("Unpack failed: {e}")))?;
            return Ok(());
        }
    }

    Err(PdfiumAutoError::Extract(format!(
        "Library '{member}' not found in archive"
    )))
}
