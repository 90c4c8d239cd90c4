//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::WavCodec;
use crate::config::DemixConfig;
use crate::control::{ControlView, Controller, JobOutcome, StemArtifact};
use crate::error::{DemixError, Result};
use crate::model::{DurableCache, HttpFetcher, ModelCacheManager, VerifyOutcome};
use crate::neural::MockSeparator;
use crate::worker::{JobOrchestrator, WorkerHandle};

const PROGRESS_WIDTH: usize = 30;

/// Renders to the terminal and saves stems into a directory
#[derive(Debug)]
pub struct ConsoleView {
    output_dir: PathBuf,
    progress_visible: bool,
    written: Vec<PathBuf>,
    failures: Vec<String>,
}

impl ConsoleView {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            progress_visible: false,
            written: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Stem files saved so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn save(&self, stem: &StemArtifact) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(&stem.file_name);
        std::fs::write(&path, stem.data.as_slice())?;
        Ok(path)
    }
}

impl ControlView for ConsoleView {
    fn set_status(&mut self, text: &str) {
        if self.progress_visible {
            eprintln!();
        }
        println!("{}", text);
    }

    fn show_progress(&mut self, fraction: f64) {
        let filled = ((fraction * PROGRESS_WIDTH as f64).round() as usize).min(PROGRESS_WIDTH);
        eprint!(
            "\r[{}{}] {:5.1}%",
            "#".repeat(filled),
            " ".repeat(PROGRESS_WIDTH - filled),
            fraction * 100.0
        );
        self.progress_visible = true;
    }

    fn hide_progress(&mut self) {
        if self.progress_visible {
            eprintln!();
            self.progress_visible = false;
        }
    }

    fn clear_stems(&mut self) {
        self.written.clear();
        self.failures.clear();
    }

    fn show_stems(&mut self, stems: Vec<StemArtifact>) {
        for stem in &stems {
            match self.save(stem) {
                Ok(path) => {
                    println!(
                        "  {:<8} {} ({:.1} MB, {})",
                        stem.name,
                        path.display(),
                        stem.data.len() as f64 / (1024.0 * 1024.0),
                        stem.mime
                    );
                    self.written.push(path);
                }
                Err(e) => {
                    tracing::error!(stem = %stem.name, error = %e, "Failed to save stem");
                    self.failures.push(format!("{}: {}", stem.file_name, e));
                }
            }
        }
    }
}

/// Run one separation job and write the stems into `output`
pub fn separate(config: &DemixConfig, input: &Path, output: &Path) -> Result<JobOutcome> {
    let bytes = std::fs::read(input)?;
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let orchestrator = JobOrchestrator::new(
        Arc::new(MockSeparator::new()),
        cache_manager(config)?,
        config.model_source(),
        Arc::new(config.stem_encoder()?),
    );
    let worker = WorkerHandle::spawn(orchestrator)?;
    let mut controller = Controller::new(worker, Arc::new(WavCodec::new()), ConsoleView::new(output));

    if !controller.select_file(&name, &bytes)? {
        return Err(DemixError::InvalidAudio {
            reason: format!("could not decode {}", input.display()),
        });
    }
    let outcome = controller.run_to_completion()?;
    let view = controller.shutdown()?;
    tracing::debug!(files = view.written().len(), dir = %output.display(), "Stems saved");

    if !view.failures.is_empty() {
        return Err(DemixError::Io(std::io::Error::other(format!(
            "failed to save stems: {}",
            view.failures.join(", ")
        ))));
    }
    Ok(outcome)
}

/// Make sure the model is in the cache
pub fn fetch_model(config: &DemixConfig) -> Result<()> {
    let manager = cache_manager(config)?;
    let source = config.model_source();

    let artifact = runtime()?.block_on(manager.acquire(&source))?;
    println!("Model ready: {} ({:.1} MB)", source.url, artifact.size_mb());
    println!("Cache: {}", config.open_cache().dir().display());
    Ok(())
}

/// Print the cached entry and disk usage
pub fn cache_status(config: &DemixConfig) -> Result<()> {
    let cache = config.open_cache();
    println!("Cache directory: {}", cache.dir().display());

    match cache.entry_info(&config.model.url)? {
        Some(info) => {
            let size_mb = info.content_length as f64 / (1024.0 * 1024.0);
            let valid = config.model_source().accepts(info.content_length);
            println!("Model: {}", info.key);
            println!("  Size:      {:.1} MB{}", size_mb, if valid { "" } else { " (below minimum)" });
            println!("  Stored at: {}", info.stored_at.to_rfc3339());
            println!("  SHA-256:   {}", info.sha256);
        }
        None => println!("Model: not cached"),
    }

    let usage = cache.usage();
    println!(
        "Disk usage: {} files, {:.1} MB",
        usage.file_count,
        usage.total_size_mb()
    );
    Ok(())
}

/// Re-hash the cached model body
pub fn cache_verify(config: &DemixConfig) -> Result<()> {
    let cache = config.open_cache();
    match cache.verify(&config.model.url)? {
        VerifyOutcome::Missing => {
            println!("Model not cached");
            Ok(())
        }
        VerifyOutcome::Valid => {
            println!("Cached model checksum OK");
            Ok(())
        }
        VerifyOutcome::Mismatch { expected, actual } => Err(DemixError::Cache {
            reason: format!(
                "checksum mismatch (expected {}, found {}); run `demix-cli cache clear`",
                expected, actual
            ),
            source: None,
        }),
    }
}

/// Drop the cached model
pub fn cache_clear(config: &DemixConfig) -> Result<()> {
    let cache = config.open_cache();
    let removed = runtime()?.block_on(cache.delete(&config.model.url))?;
    if removed {
        println!("Removed cached model from {}", cache.dir().display());
    } else {
        println!("Nothing to remove");
    }
    Ok(())
}

fn cache_manager(config: &DemixConfig) -> Result<ModelCacheManager> {
    Ok(ModelCacheManager::new(
        Arc::new(config.open_cache()),
        Arc::new(HttpFetcher::new(config.download_timeout())?),
    ))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioEncoder;
    use crate::model::FetchResponse;
    use bytes::Bytes;
    use tempfile::TempDir;

    // Points at a closed port so any attempted download fails fast
    const URL: &str = "http://127.0.0.1:9/htdemucs.onnx";

    fn config(temp: &TempDir) -> DemixConfig {
        let mut config = DemixConfig::default();
        config.model.url = URL.to_string();
        config.model.min_size = 16;
        config.cache.dir = temp.path().join("cache");
        config.download_timeout_secs = 2;
        config
    }

    fn seed_cache(config: &DemixConfig) {
        let response = FetchResponse::new(200, Some(64), Bytes::from(vec![3u8; 64]));
        runtime()
            .unwrap()
            .block_on(config.open_cache().put(URL, &response))
            .unwrap();
    }

    #[test]
    fn test_separate_writes_four_stems_from_warm_cache() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        seed_cache(&config);

        let input = temp.path().join("song.wav");
        let wav = WavCodec::new()
            .encode(&[vec![0.1; 256], vec![0.2; 256]], 44100)
            .unwrap();
        std::fs::write(&input, wav).unwrap();
        let output = temp.path().join("stems");

        let outcome = separate(&config, &input, &output).unwrap();

        assert_eq!(outcome, JobOutcome::Completed { stems: 4 });
        for stem in ["drums", "bass", "other", "vocals"] {
            assert!(output.join(format!("{}.wav", stem)).exists());
        }
    }

    #[test]
    fn test_separate_rejects_undecodable_input() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let input = temp.path().join("notes.txt");
        std::fs::write(&input, "not audio").unwrap();

        let err = separate(&config, &input, temp.path()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AUDIO");
    }

    #[test]
    fn test_cache_commands_on_seeded_cache() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        seed_cache(&config);

        cache_status(&config).unwrap();
        cache_verify(&config).unwrap();
        cache_clear(&config).unwrap();
        assert!(config.open_cache().entry_info(URL).unwrap().is_none());
    }

    #[test]
    fn test_cache_verify_reports_tampered_body() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        seed_cache(&config);
        let cache = config.open_cache();
        let info = cache.entry_info(URL).unwrap().unwrap();
        std::fs::write(cache.dir().join(info.file), [0u8; 64]).unwrap();

        let err = cache_verify(&config).unwrap_err();
        assert_eq!(err.error_code(), "CACHE_ERROR");
    }
}
