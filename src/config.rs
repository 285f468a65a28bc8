use crate::services::{
    batch_service::DEFAULT_MAX_CONCURRENT_LOOKUPS,
    resolver::{DEFAULT_TTL, ResolverSettings, S3_SINGLE_PUT_LIMIT},
    storage::S3Settings,
};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

/// Longest lifetime S3 accepts for a presigned URL (7 days).
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Which authorization strategy guards the batch endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    /// A single static user/password pair.
    Static,
    /// GitHub token whose owner belongs to an organization.
    GithubOrg,
    /// No authorization at all.
    None,
}

impl FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        <AuthMode as ValueEnum>::from_str(s, true).map_err(|e| anyhow!(e))
    }
}

/// Resolved authorization settings.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    Static { user: String, pass: String },
    GithubOrg { org: String },
    None,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::Static { user, .. } => {
                write!(f, "Static {{ user: {user:?}, pass: *** }}")
            }
            AuthConfig::GithubOrg { org } => write!(f, "GithubOrg {{ org: {org:?} }}"),
            AuthConfig::None => write!(f, "None"),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub s3: S3Settings,
    pub resolver: ResolverSettings,
    pub max_concurrent_lookups: usize,
    pub auth: AuthConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("endpoint", &self.s3.endpoint)
            .field("region", &self.s3.region)
            .field("bucket", &self.s3.bucket)
            .field("prefix", &self.resolver.prefix)
            .field("ttl", &self.resolver.ttl)
            .field("max_upload_size", &self.resolver.max_upload_size)
            .field("max_concurrent_lookups", &self.max_concurrent_lookups)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Git LFS batch API server backed by S3 presigned URLs")]
pub struct Args {
    /// Host to bind to (overrides LFS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides LFS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Bucket holding LFS objects (overrides LFS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// S3 endpoint host without scheme (overrides LFS_ENDPOINT).
    /// Defaults to s3.<region>.amazonaws.com
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Signing region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Talk to the endpoint over plain HTTP (overrides LFS_NO_SSL)
    #[arg(long)]
    pub no_ssl: bool,

    /// Hand out S3 Transfer Acceleration URLs (overrides LFS_S3_ACCELERATE)
    #[arg(long)]
    pub s3_accelerate: bool,

    /// Access key id (overrides LFS_ACCESS_KEY_ID)
    #[arg(long)]
    pub access_key_id: Option<String>,

    /// Secret access key (overrides LFS_SECRET_ACCESS_KEY)
    #[arg(long)]
    pub secret_access_key: Option<String>,

    /// Session token (overrides LFS_SESSION_TOKEN)
    #[arg(long)]
    pub session_token: Option<String>,

    /// Key prefix prepended to every oid (overrides LFS_PREFIX)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Presigned URL lifetime in seconds (overrides LFS_TTL_SECS)
    #[arg(long)]
    pub ttl_secs: Option<u64>,

    /// Largest object accepted for upload, in bytes (overrides LFS_MAX_UPLOAD_SIZE)
    #[arg(long)]
    pub max_upload_size: Option<i64>,

    /// Objects resolved in parallel per request (overrides LFS_MAX_CONCURRENT_LOOKUPS)
    #[arg(long)]
    pub max_concurrent_lookups: Option<usize>,

    /// Authorization strategy (overrides LFS_AUTH)
    #[arg(long, value_enum)]
    pub auth: Option<AuthMode>,

    /// User for static authorization (overrides LFS_USER)
    #[arg(long)]
    pub user: Option<String>,

    /// Password for static authorization (overrides LFS_PASS)
    #[arg(long)]
    pub pass: Option<String>,

    /// Organization required by github-org authorization (overrides LFS_GITHUB_ORG)
    #[arg(long)]
    pub github_org: Option<String>,
}

/// Source of environment values. Abstracted so resolution can be tested
/// without touching the process environment.
pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment. Empty values count as unset.
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), &ProcessEnv)
    }

    /// Merge CLI args over environment values and validate the result.
    pub fn resolve(args: Args, env: &impl Env) -> Result<Self> {
        let host = args
            .host
            .or_else(|| env.var("LFS_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = pick(args.port, env, "LFS_PORT")?.unwrap_or(5000);

        // --- Storage endpoint ---
        let region = args.region.or_else(|| env.var("AWS_REGION"));
        let endpoint_host = match args.endpoint.or_else(|| env.var("LFS_ENDPOINT")) {
            Some(endpoint) => endpoint,
            None => {
                let region = region
                    .as_deref()
                    .ok_or_else(|| anyhow!("endpoint required (set LFS_ENDPOINT or AWS_REGION)"))?;
                format!("s3.{region}.amazonaws.com")
            }
        };
        let no_ssl = args.no_ssl || flag(env, "LFS_NO_SSL")?;
        let s3_accelerate = args.s3_accelerate || flag(env, "LFS_S3_ACCELERATE")?;

        let bucket = args
            .bucket
            .or_else(|| env.var("LFS_BUCKET"))
            .ok_or_else(|| anyhow!("bucket required (set LFS_BUCKET)"))?;

        // --- Credentials ---
        let mut access_key_id = args.access_key_id.or_else(|| env.var("LFS_ACCESS_KEY_ID"));
        let mut secret_access_key = args
            .secret_access_key
            .or_else(|| env.var("LFS_SECRET_ACCESS_KEY"));
        let mut session_token = args.session_token.or_else(|| env.var("LFS_SESSION_TOKEN"));
        if access_key_id.is_none() {
            if !is_amazon_endpoint(&endpoint_host) {
                bail!("access key & id required for {endpoint_host}");
            }
            access_key_id = env.var("AWS_ACCESS_KEY_ID");
            if access_key_id.is_none() {
                bail!("AWS access key ID required for {endpoint_host}");
            }
            secret_access_key = env.var("AWS_SECRET_ACCESS_KEY");
            if secret_access_key.is_none() {
                bail!("AWS secret access key required for {endpoint_host}");
            }
            session_token = env.var("AWS_SESSION_TOKEN");
        }
        let access_key_id = access_key_id.unwrap_or_default();
        let secret_access_key = secret_access_key
            .ok_or_else(|| anyhow!("secret access key required for {endpoint_host}"))?;

        let scheme = if no_ssl { "http" } else { "https" };
        let (endpoint, virtual_hosted) = if s3_accelerate {
            (format!("{scheme}://{bucket}.s3-accelerate.amazonaws.com"), true)
        } else {
            (format!("{scheme}://{endpoint_host}"), false)
        };

        let s3 = S3Settings {
            endpoint,
            region: region
                .or_else(|| region_from_endpoint(&endpoint_host))
                .unwrap_or_else(|| "us-east-1".into()),
            bucket,
            access_key_id,
            secret_access_key,
            session_token,
            allow_http: no_ssl,
            virtual_hosted,
        };

        // --- Resolution knobs ---
        let ttl_secs = pick(args.ttl_secs, env, "LFS_TTL_SECS")?.unwrap_or(DEFAULT_TTL.as_secs());
        if ttl_secs == 0 || ttl_secs > MAX_TTL_SECS {
            bail!("ttl must be between 1 and {MAX_TTL_SECS} seconds, got {ttl_secs}");
        }
        let max_upload_size =
            pick(args.max_upload_size, env, "LFS_MAX_UPLOAD_SIZE")?.unwrap_or(S3_SINGLE_PUT_LIMIT);
        if max_upload_size < 0 {
            bail!("max upload size must not be negative, got {max_upload_size}");
        }
        let resolver = ResolverSettings {
            prefix: args.prefix.or_else(|| env.var("LFS_PREFIX")).unwrap_or_default(),
            ttl: Duration::from_secs(ttl_secs),
            max_upload_size,
        };
        let max_concurrent_lookups =
            pick(args.max_concurrent_lookups, env, "LFS_MAX_CONCURRENT_LOOKUPS")?
                .unwrap_or(DEFAULT_MAX_CONCURRENT_LOOKUPS);
        if max_concurrent_lookups == 0 {
            bail!("max concurrent lookups must be at least 1");
        }

        // --- Authorization ---
        let mode = pick(args.auth, env, "LFS_AUTH")?.unwrap_or(AuthMode::Static);
        let auth = match mode {
            AuthMode::Static => {
                let user = args.user.or_else(|| env.var("LFS_USER"));
                let pass = args.pass.or_else(|| env.var("LFS_PASS"));
                match (user, pass) {
                    (Some(user), Some(pass)) => AuthConfig::Static { user, pass },
                    _ => bail!("LFS_USER and LFS_PASS must be set"),
                }
            }
            AuthMode::GithubOrg => AuthConfig::GithubOrg {
                org: args
                    .github_org
                    .or_else(|| env.var("LFS_GITHUB_ORG"))
                    .ok_or_else(|| anyhow!("LFS_GITHUB_ORG must be set for github-org auth"))?,
            },
            AuthMode::None => AuthConfig::None,
        };

        Ok(Self {
            host,
            port,
            s3,
            resolver,
            max_concurrent_lookups,
            auth,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CLI value if given, otherwise the parsed environment value.
fn pick<T>(cli: Option<T>, env: &impl Env, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if cli.is_some() {
        return Ok(cli);
    }
    env.var(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| anyhow!("{e}"))
                .with_context(|| format!("parsing {key} value `{value}`"))
        })
        .transpose()
}

fn flag(env: &impl Env, key: &str) -> Result<bool> {
    match env.var(key) {
        None => Ok(false),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("parsing {key} value `{value}`: expected a boolean"),
        },
    }
}

fn is_amazon_endpoint(host: &str) -> bool {
    let host = host.split(':').next().unwrap_or(host);
    host == "amazonaws.com" || host.ends_with(".amazonaws.com")
}

/// `s3.<region>.amazonaws.com` -> `<region>`.
fn region_from_endpoint(host: &str) -> Option<String> {
    host.strip_prefix("s3.")?
        .strip_suffix(".amazonaws.com")
        .filter(|r| !r.is_empty() && !r.contains('.'))
        .map(str::to_string)
}
