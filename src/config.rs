use crate::services::presign_service::MAX_GRANT_TTL;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

/// Which object store implementation backs the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// S3-compatible endpoint (MinIO, RustFS, AWS).
    S3,
    /// In-process store; contents are lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend `{}`", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_url: String,
    pub staging_dir: String,
    pub upload_ttl: Duration,
    pub download_ttl: Duration,
    pub redirect_ttl: Duration,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Object store gateway with range-aware media streaming")]
pub struct Args {
    /// Host to bind to (overrides OBJECT_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides OBJECT_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store backend (overrides OBJECT_GATEWAY_STORE)
    #[arg(long, value_enum)]
    pub store: Option<StoreBackend>,

    /// S3 endpoint URL (overrides MINIO_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Region for new buckets and request signing (overrides MINIO_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Access key (overrides MINIO_ROOT_USER)
    #[arg(long)]
    pub access_key: Option<String>,

    /// Secret key (overrides MINIO_ROOT_PASSWORD)
    #[arg(long)]
    pub secret_key: Option<String>,

    /// Base URL returned for uploaded objects (overrides OBJECT_GATEWAY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Directory for spooled uploads (overrides OBJECT_GATEWAY_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<String>,

    /// Validity of presigned upload URLs in seconds
    #[arg(long)]
    pub upload_ttl_secs: Option<u64>,

    /// Default validity of presigned download URLs in seconds
    #[arg(long)]
    pub download_ttl_secs: Option<u64>,

    /// Validity of URLs issued when redirecting generic files, in seconds
    #[arg(long)]
    pub redirect_ttl_secs: Option<u64>,

    /// Largest accepted multipart upload body in bytes
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

/// Parse an optional environment variable, falling back to `default`.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

/// Grant lifetimes outside what the store can sign fail at startup.
fn grant_ttl(name: &str, secs: u64) -> Result<Duration> {
    let ttl = Duration::from_secs(secs);
    if ttl.is_zero() || ttl > MAX_GRANT_TTL {
        bail!(
            "{} must be between 1 and {} seconds, got {}",
            name,
            MAX_GRANT_TTL.as_secs(),
            secs
        );
    }
    Ok(ttl)
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Merge already-parsed CLI args over the environment.
    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_port = env_parse("OBJECT_GATEWAY_PORT", 3000u16)?;
        let env_store = env_parse("OBJECT_GATEWAY_STORE", StoreBackend::S3)?;
        let env_upload_ttl = env_parse("OBJECT_GATEWAY_UPLOAD_TTL_SECS", 3600u64)?;
        let env_download_ttl = env_parse("OBJECT_GATEWAY_DOWNLOAD_TTL_SECS", 300u64)?;
        let env_redirect_ttl = env_parse("OBJECT_GATEWAY_REDIRECT_TTL_SECS", 3600u64)?;
        let env_max_upload = env_parse("OBJECT_GATEWAY_MAX_UPLOAD_BYTES", 512 * 1024 * 1024usize)?;

        let endpoint = args
            .endpoint
            .unwrap_or_else(|| env_or("MINIO_ENDPOINT", "http://localhost:9000"));
        let public_url = args
            .public_url
            .or_else(|| env::var("OBJECT_GATEWAY_PUBLIC_URL").ok())
            .unwrap_or_else(|| endpoint.clone());

        // --- Merge ---
        Ok(Self {
            host: args
                .host
                .unwrap_or_else(|| env_or("OBJECT_GATEWAY_HOST", "0.0.0.0")),
            port: args.port.unwrap_or(env_port),
            store: args.store.unwrap_or(env_store),
            endpoint,
            region: args
                .region
                .unwrap_or_else(|| env_or("MINIO_REGION", "us-east-1")),
            access_key: args
                .access_key
                .unwrap_or_else(|| env_or("MINIO_ROOT_USER", "minioadmin")),
            secret_key: args
                .secret_key
                .unwrap_or_else(|| env_or("MINIO_ROOT_PASSWORD", "miniopassword")),
            public_url,
            staging_dir: args
                .staging_dir
                .unwrap_or_else(|| env_or("OBJECT_GATEWAY_STAGING_DIR", "./data/staging")),
            upload_ttl: grant_ttl(
                "upload ttl",
                args.upload_ttl_secs.unwrap_or(env_upload_ttl),
            )?,
            download_ttl: grant_ttl(
                "download ttl",
                args.download_ttl_secs.unwrap_or(env_download_ttl),
            )?,
            redirect_ttl: grant_ttl(
                "redirect ttl",
                args.redirect_ttl_secs.unwrap_or(env_redirect_ttl),
            )?,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for AppConfig {
    /// Same as `Debug` but with the secret key redacted, for startup logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} store={:?} endpoint={} region={} access_key={} public_url={} staging_dir={}",
            self.host,
            self.port,
            self.store,
            self.endpoint,
            self.region,
            self.access_key,
            self.public_url,
            self.staging_dir
        )
    }
}
