//! Environment-variable configuration (§6): typed defaults, no
//! config-file format since none is specified.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{EngineError, Result};

fn env_string(var: &'static str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => value
            .parse()
            .map_err(|_| EngineError::InvalidEnvVar { var, value }),
    }
}

/// Tunables for the PDF sub-pipeline's VLM fallback, mirrored from
/// `localdoc_pdf::PdfPipelineConfig` so the engine can read the
/// `PDF_VLM_*`/`PDF_MIN_CHARS_PER_PAGE` variables once and hand the
/// result straight to [`localdoc_pdf::PdfPipeline`].
#[derive(Debug, Clone)]
pub struct PdfConfig {
    /// Model name passed to the VLM generation endpoint for PDF pages.
    pub vlm_model: String,
    /// Page-level VLM call deadline.
    pub vlm_timeout: Duration,
    /// Render resolution for pages submitted to the VLM.
    pub dpi: u16,
    /// Maximum image-heavy pages submitted to the VLM per document.
    pub max_pages: usize,
    /// Maximum concurrent in-flight VLM page calls.
    pub workers: usize,
    /// Character threshold below which a page is considered image-heavy.
    pub min_chars_per_page: usize,
    /// Absolute path to the Pdfium dynamic library used to rasterize
    /// image-heavy pages for the VLM fallback. Unset means the pipeline
    /// falls back to the system search paths (`§4.4` step 3).
    pub pdfium_library_path: Option<String>,
}

/// Engine-wide configuration, loaded once at startup from the
/// documented environment variables (§6 config variables).
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the local Ollama-compatible model runtime.
    pub ollama_host: String,
    /// Root directory for persisted state (`docs.db`, `vectors/`, `cache/`).
    pub data_dir: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"`.
    pub log_level: String,
    /// Model name passed to the embedding endpoint.
    pub embedding_model: String,
    /// Model name passed to the generation endpoint for the image
    /// processor's description calls.
    pub vlm_model: String,
    /// PDF sub-pipeline tunables.
    pub pdf: PdfConfig,
}

impl Config {
    /// Loads configuration from the environment, falling back to the
    /// documented defaults for anything unset.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidEnvVar`] if a numeric/duration
    /// variable is set but unparsable.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("DATA_DIR").map_or_else(
            |_| default_data_dir(),
            PathBuf::from,
        );

        Ok(Self {
            ollama_host: env_string("OLLAMA_HOST", "http://localhost:11434"),
            data_dir,
            log_level: env_string("LOG_LEVEL", "info"),
            embedding_model: env_string("EMBEDDING_MODEL", "nomic-embed-text"),
            vlm_model: env_string("VLM_MODEL", "llava"),
            pdf: PdfConfig {
                vlm_model: env_string("PDF_VLM_MODEL", "llava"),
                vlm_timeout: Duration::from_secs(env_parsed("PDF_VLM_TIMEOUT", 60)?),
                dpi: env_parsed("PDF_VLM_DPI", 150)?,
                max_pages: env_parsed("PDF_VLM_MAX_PAGES", 20)?,
                workers: env_parsed("PDF_VLM_WORKERS", 2)?,
                min_chars_per_page: env_parsed("PDF_MIN_CHARS_PER_PAGE", 100)?,
                pdfium_library_path: std::env::var("PDF_VLM_PDFIUM_PATH").ok(),
            },
        })
    }

    /// Path the relational/full-text store opens (`docs.db` under
    /// `data_dir`).
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("docs.db")
    }

    /// Path the embedding cache persists segments under.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".local/share/local-doc-search"))
        .unwrap_or_else(|_| PathBuf::from("./local-doc-search-data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        // SAFETY: test runs single-threaded within this process; no
        // other test reads `NONEXISTENT_VAR_FOR_THIS_TEST`.
        unsafe {
            std::env::remove_var("PDF_VLM_TIMEOUT");
        }
        let pdf = PdfConfig {
            vlm_model: "llava".into(),
            vlm_timeout: Duration::from_secs(env_parsed("PDF_VLM_TIMEOUT", 60).unwrap()),
            dpi: 150,
            max_pages: 20,
            workers: 2,
            min_chars_per_page: 100,
            pdfium_library_path: None,
        };
        assert_eq!(pdf.vlm_timeout, Duration::from_secs(60));
    }

    #[test]
    fn pdfium_library_path_env_var_is_read_when_set() {
        // SAFETY: scoped to this test, restored before returning.
        unsafe {
            std::env::set_var("PDF_VLM_PDFIUM_PATH", "/opt/lib/libpdfium.so");
        }
        let path = std::env::var("PDF_VLM_PDFIUM_PATH").ok();
        unsafe {
            std::env::remove_var("PDF_VLM_PDFIUM_PATH");
        }
        assert_eq!(path.as_deref(), Some("/opt/lib/libpdfium.so"));
    }

    #[test]
    fn pdfium_library_path_defaults_to_none_when_unset() {
        // SAFETY: scoped to this test; the var is not set elsewhere.
        unsafe {
            std::env::remove_var("PDF_VLM_PDFIUM_PATH");
        }
        assert_eq!(std::env::var("PDF_VLM_PDFIUM_PATH").ok(), None);
    }

    #[test]
    fn invalid_numeric_env_var_is_rejected() {
        // SAFETY: scoped to this test, restored before returning.
        unsafe {
            std::env::set_var("PDF_VLM_DPI", "not-a-number");
        }
        let result: Result<u16> = env_parsed("PDF_VLM_DPI", 150);
        unsafe {
            std::env::remove_var("PDF_VLM_DPI");
        }
        assert!(result.is_err());
    }

    #[test]
    fn store_and_cache_paths_nest_under_data_dir() {
        let config = Config {
            ollama_host: "http://localhost:11434".into(),
            data_dir: PathBuf::from("/tmp/lds-data"),
            log_level: "info".into(),
            embedding_model: "nomic-embed-text".into(),
            vlm_model: "llava".into(),
            pdf: PdfConfig {
                vlm_model: "llava".into(),
                vlm_timeout: Duration::from_secs(60),
                dpi: 150,
                max_pages: 20,
                workers: 2,
                min_chars_per_page: 100,
                pdfium_library_path: None,
            },
        };
        assert_eq!(config.store_path(), PathBuf::from("/tmp/lds-data/docs.db"));
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/lds-data/cache"));
    }
}
