//! Lifecycle of the external inference engine.
//!
//! Loading a model validates the GGUF file, launches a `llama-server`
//! process for it and waits until the server reports healthy. At most one
//! engine process is alive at a time; it is killed on unload or when the
//! manager is dropped.

use crate::core::config::data::{path_display, ServerConfig};
use crate::core::generation::ModelParams;
use crate::core::gguf::{self, GgufError, GgufHeader};
use crate::core::runner::{LlamaServerRunner, ModelRunner};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub const MODEL_EXTENSION: &str = "gguf";
pub const LARGE_MODEL_BYTES: u64 = 20 * 1024 * 1024 * 1024;
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub enum ModelLoadError {
    NotFound(PathBuf),
    NotGguf(PathBuf),
    Header { path: PathBuf, source: GgufError },
    Spawn { binary: String, source: std::io::Error },
    Process(std::io::Error),
    Exited { status: String },
    Timeout { secs: u64 },
    /// Something already answers health checks on the configured address.
    PortInUse { address: String },
}

impl fmt::Display for ModelLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLoadError::NotFound(path) => {
                write!(f, "Model file not found: {}", path_display(path))
            }
            ModelLoadError::NotGguf(path) => write!(
                f,
                "Not a GGUF model file (expected a .gguf extension): {}",
                path_display(path)
            ),
            ModelLoadError::Header { path, source } => {
                write!(f, "Invalid GGUF file {}: {source}", path_display(path))
            }
            ModelLoadError::Spawn { binary, source } => write!(
                f,
                "Failed to start inference server '{binary}': {source}. \
                 Set server.binary in the config to your llama-server executable"
            ),
            ModelLoadError::Process(err) => write!(f, "Inference server error: {err}"),
            ModelLoadError::Exited { status } => write!(
                f,
                "Inference server exited during startup ({status}). \
                 Try reducing n_ctx or n_gpu_layers"
            ),
            ModelLoadError::Timeout { secs } => {
                write!(f, "Inference server was not ready after {secs}s")
            }
            ModelLoadError::PortInUse { address } => write!(
                f,
                "Another server is already running at {address}. \
                 Stop it or set server.port to a free port"
            ),
        }
    }
}

impl std::error::Error for ModelLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelLoadError::Header { source, .. } => Some(source),
            ModelLoadError::Spawn { source, .. } => Some(source),
            ModelLoadError::Process(err) => Some(err),
            _ => None,
        }
    }
}

/// Facts about the currently loaded model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub path: PathBuf,
    pub params: ModelParams,
    pub file_size: u64,
    pub load_time: Duration,
    pub loaded_at: DateTime<Utc>,
    pub architecture: Option<String>,
    pub model_name: Option<String>,
    pub context_length: Option<u64>,
    pub base_url: String,
}

impl ModelInfo {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_display(&self.path))
    }
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model: {}", self.file_name())?;
        writeln!(f, "Path: {}", path_display(&self.path))?;
        if let Some(name) = &self.model_name {
            writeln!(f, "Name: {name}")?;
        }
        if let Some(arch) = &self.architecture {
            writeln!(f, "Architecture: {arch}")?;
        }
        if let Some(ctx) = self.context_length {
            writeln!(f, "Trained context: {ctx}")?;
        }
        writeln!(f, "Size: {}", format_size(self.file_size))?;
        writeln!(f, "Parameters: {}", self.params)?;
        writeln!(
            f,
            "Loaded: {} (took {:.2}s)",
            self.loaded_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.load_time.as_secs_f64()
        )?;
        write!(f, "Server: {}", self.base_url)
    }
}

struct LoadedModel {
    child: Child,
    runner: LlamaServerRunner,
    info: ModelInfo,
}

pub struct ModelManager {
    server: ServerConfig,
    client: Client,
    loaded: Option<LoadedModel>,
}

impl ModelManager {
    pub fn new(server: ServerConfig, client: Client) -> Self {
        Self {
            server,
            client,
            loaded: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn info(&self) -> Option<&ModelInfo> {
        self.loaded.as_ref().map(|loaded| &loaded.info)
    }

    pub fn runner(&self) -> Option<&dyn ModelRunner> {
        self.loaded
            .as_ref()
            .map(|loaded| &loaded.runner as &dyn ModelRunner)
    }

    /// Load `path`, replacing whatever model is running.
    pub async fn load(
        &mut self,
        path: &Path,
        params: &ModelParams,
    ) -> Result<&ModelInfo, ModelLoadError> {
        let (file_size, header) = validate_model_file(path)?;
        if file_size > LARGE_MODEL_BYTES {
            warn!(
                size = %format_size(file_size),
                "large model file, loading may take some time"
            );
        }

        self.unload().await;

        let runner = LlamaServerRunner::new(self.client.clone(), self.server.base_url());
        if runner.is_healthy().await {
            return Err(ModelLoadError::PortInUse {
                address: runner.base_url().to_string(),
            });
        }

        let started = Instant::now();
        let args = server_args(path, params, &self.server);
        debug!(binary = %self.server.binary, ?args, "starting inference server");

        let mut child = Command::new(&self.server.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ModelLoadError::Spawn {
                binary: self.server.binary.clone(),
                source,
            })?;

        if let Err(err) = self.wait_until_ready(&mut child, &runner).await {
            let _ = child.kill().await;
            return Err(err);
        }

        let load_time = started.elapsed();
        let info = ModelInfo {
            path: path.to_path_buf(),
            params: params.clone(),
            file_size,
            load_time,
            loaded_at: Utc::now(),
            architecture: header.architecture().map(str::to_string),
            model_name: header.name().map(str::to_string),
            context_length: header.context_length(),
            base_url: runner.base_url().to_string(),
        };
        info!(
            model = %info.file_name(),
            secs = load_time.as_secs_f64(),
            "model loaded"
        );

        let loaded = self.loaded.insert(LoadedModel {
            child,
            runner,
            info,
        });
        Ok(&loaded.info)
    }

    async fn wait_until_ready(
        &self,
        child: &mut Child,
        runner: &LlamaServerRunner,
    ) -> Result<(), ModelLoadError> {
        let deadline = Instant::now() + Duration::from_secs(self.server.startup_timeout_secs);
        loop {
            exited_early(child)?;
            if runner.is_healthy().await {
                // Another process may have taken the port after the pre-check.
                return exited_early(child);
            }
            if Instant::now() >= deadline {
                return Err(ModelLoadError::Timeout {
                    secs: self.server.startup_timeout_secs,
                });
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    /// Stop the running engine. Returns `false` if nothing was loaded.
    pub async fn unload(&mut self) -> bool {
        let Some(mut loaded) = self.loaded.take() else {
            return false;
        };
        if let Err(err) = loaded.child.kill().await {
            warn!(error = %err, "failed to stop inference server");
        }
        info!(model = %loaded.info.file_name(), "model unloaded");
        true
    }
}

fn exited_early(child: &mut Child) -> Result<(), ModelLoadError> {
    match child.try_wait().map_err(ModelLoadError::Process)? {
        Some(status) => Err(ModelLoadError::Exited {
            status: status.to_string(),
        }),
        None => Ok(()),
    }
}

/// Check that `path` is an existing `.gguf` file with a readable header.
pub fn validate_model_file(path: &Path) -> Result<(u64, GgufHeader), ModelLoadError> {
    let metadata = std::fs::metadata(path)
        .ok()
        .filter(|metadata| metadata.is_file())
        .ok_or_else(|| ModelLoadError::NotFound(path.to_path_buf()))?;
    if !has_model_extension(path) {
        return Err(ModelLoadError::NotGguf(path.to_path_buf()));
    }
    let header = gguf::read_header_from_path(path).map_err(|source| ModelLoadError::Header {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((metadata.len(), header))
}

/// Command-line arguments passed to `llama-server`.
pub fn server_args(path: &Path, params: &ModelParams, server: &ServerConfig) -> Vec<String> {
    let mut args = vec![
        "-m".to_string(),
        path.to_string_lossy().into_owned(),
        "-c".to_string(),
        params.n_ctx.to_string(),
        "-b".to_string(),
        params.n_batch.to_string(),
        "-ngl".to_string(),
        params.n_gpu_layers.to_string(),
    ];
    if let Some(threads) = params.n_threads {
        args.push("-t".to_string());
        args.push(threads.to_string());
    }
    args.extend([
        "--host".to_string(),
        server.host.clone(),
        "--port".to_string(),
        server.port.to_string(),
    ]);
    args
}

fn has_model_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MODEL_EXTENSION))
}

/// `.gguf` files directly inside `dir`, sorted by path. A missing directory
/// yields an empty list.
pub fn available_models(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut models = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && has_model_extension(&path) {
            models.push(path);
        }
    }
    models.sort();
    Ok(models)
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.2} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gguf::test_support::minimal_model_bytes;
    use tempfile::TempDir;

    fn write_model(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, minimal_model_bytes()).unwrap();
        path
    }

    fn manager_with_binary(binary: &str) -> ModelManager {
        let server = ServerConfig {
            binary: binary.to_string(),
            port: 9,
            startup_timeout_secs: 10,
            ..ServerConfig::default()
        };
        ModelManager::new(server, Client::new())
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = validate_model_file(&dir.path().join("absent.gguf")).unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound(_)));
        let err = validate_model_file(dir.path()).unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound(_)));
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, "model.bin");
        assert!(matches!(
            validate_model_file(&path),
            Err(ModelLoadError::NotGguf(_))
        ));
    }

    #[test]
    fn bad_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.gguf");
        std::fs::write(&path, b"not a model at all").unwrap();
        assert!(matches!(
            validate_model_file(&path),
            Err(ModelLoadError::Header {
                source: GgufError::BadMagic(_),
                ..
            })
        ));
    }

    #[test]
    fn valid_file_reports_size_and_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, "tiny.GGUF");
        let (size, header) = validate_model_file(&path).unwrap();
        assert_eq!(size, minimal_model_bytes().len() as u64);
        assert_eq!(header.architecture(), Some("llama"));
    }

    #[test]
    fn server_args_carry_model_params() {
        let params = ModelParams {
            n_ctx: 4096,
            n_batch: 256,
            n_gpu_layers: -1,
            n_threads: Some(8),
        };
        let args = server_args(Path::new("/m/a.gguf"), &params, &ServerConfig::default());
        assert_eq!(
            args,
            vec![
                "-m", "/m/a.gguf", "-c", "4096", "-b", "256", "-ngl", "-1", "-t", "8", "--host",
                "127.0.0.1", "--port", "8089"
            ]
        );

        let args = server_args(
            Path::new("a.gguf"),
            &ModelParams::default(),
            &ServerConfig::default(),
        );
        assert!(!args.contains(&"-t".to_string()));
    }

    #[test]
    fn available_models_lists_gguf_files_sorted() {
        let dir = TempDir::new().unwrap();
        write_model(&dir, "b.gguf");
        write_model(&dir, "a.gguf");
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub.gguf")).unwrap();

        let names: Vec<String> = available_models(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.gguf", "b.gguf"]);
        assert!(available_models(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, "tiny.gguf");
        let mut manager = manager_with_binary("/nonexistent/llama-server-for-tests");

        let err = manager.load(&path, &ModelParams::default()).await.unwrap_err();
        assert!(matches!(err, ModelLoadError::Spawn { .. }));
        assert!(!manager.is_loaded());
        assert!(manager.runner().is_none());
        assert!(manager.info().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn server_that_exits_early_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, "tiny.gguf");
        let mut manager = manager_with_binary("false");

        let err = manager.load(&path, &ModelParams::default()).await.unwrap_err();
        assert!(matches!(err, ModelLoadError::Exited { .. }));
        assert!(!manager.is_loaded());
    }

    /// Answer every request with `200 OK` until the task is aborted.
    async fn spawn_health_server() -> (u16, tokio::task::JoinHandle<()>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let body = r#"{"status":"ok"}"#;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (port, handle)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn occupied_port_is_rejected_before_spawning() {
        let dir = TempDir::new().unwrap();
        let path = write_model(&dir, "tiny.gguf");
        let (port, server) = spawn_health_server().await;

        let config = ServerConfig {
            binary: "false".to_string(),
            port,
            startup_timeout_secs: 5,
            ..ServerConfig::default()
        };
        let mut manager = ModelManager::new(config, Client::new());

        let err = manager.load(&path, &ModelParams::default()).await.unwrap_err();
        assert!(matches!(err, ModelLoadError::PortInUse { .. }));
        assert!(err.to_string().contains(&port.to_string()));
        assert!(!manager.is_loaded());
        assert!(manager.runner().is_none());
        server.abort();
    }

    #[tokio::test]
    async fn unload_without_model_is_noop() {
        let mut manager = manager_with_binary("llama-server");
        assert!(!manager.unload().await);
    }
}
