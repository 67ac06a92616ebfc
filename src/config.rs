use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub bucket: String,
    pub allowed_origin: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP file gateway over an S3-compatible object store")]
pub struct Args {
    /// Host to bind to (overrides S3_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides S3_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store endpoint URL (overrides S3_GATEWAY_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Object store region (overrides S3_GATEWAY_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Access key id (overrides S3_GATEWAY_ACCESS_KEY)
    #[arg(long)]
    pub s3_access_key: Option<String>,

    /// Secret access key (overrides S3_GATEWAY_SECRET_KEY)
    #[arg(long)]
    pub s3_secret_key: Option<String>,

    /// Bucket all file operations target (overrides S3_GATEWAY_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Origin allowed by CORS; omit to disable the layer
    /// (overrides S3_GATEWAY_ALLOWED_ORIGIN)
    #[arg(long)]
    pub allowed_origin: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("S3_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("S3_GATEWAY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing S3_GATEWAY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading S3_GATEWAY_PORT"),
        };
        let env_endpoint =
            env::var("S3_GATEWAY_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:9000".into());
        let env_region = env::var("S3_GATEWAY_REGION").unwrap_or_else(|_| "us-east-1".into());
        let env_access_key = env::var("S3_GATEWAY_ACCESS_KEY").ok();
        let env_secret_key = env::var("S3_GATEWAY_SECRET_KEY").ok();
        let env_bucket = env::var("S3_GATEWAY_BUCKET").unwrap_or_else(|_| "my-bucket".into());
        let env_origin = env::var("S3_GATEWAY_ALLOWED_ORIGIN").ok();

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            s3_endpoint: args.s3_endpoint.unwrap_or(env_endpoint),
            s3_region: args.s3_region.unwrap_or(env_region),
            s3_access_key: args.s3_access_key.or(env_access_key),
            s3_secret_key: args.s3_secret_key.or(env_secret_key),
            bucket: args.bucket.unwrap_or(env_bucket),
            allowed_origin: args.allowed_origin.or(env_origin),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
