//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use castgen_publish::ChannelSelection;

/// Orchestrator and worker configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scratch directory for downloaded sources and extracted audio
    pub work_dir: PathBuf,
    /// Per-call timeout for audio extraction
    pub extract_timeout: Duration,
    /// Per-call timeout for one generation adapter call
    pub generate_timeout: Duration,
    /// Per-call timeout for the publish upload
    pub publish_timeout: Duration,
    /// Total attempts per generation call (initial call included)
    pub generation_attempts: u32,
    /// Base delay for generation retry backoff (doubles each attempt)
    pub generation_backoff: Duration,
    /// Total attempts for the extraction call on transient failures
    pub extract_attempts: u32,
    /// Total attempts per publish or caption call on transient failures
    pub publish_attempts: u32,
    /// Base delay for extraction/publish retry backoff
    pub retry_backoff: Duration,
    /// Job lease duration in seconds
    pub lease_ttl_secs: u64,
    /// Maximum jobs processed concurrently by one worker
    pub max_concurrent_jobs: usize,
    /// How often the worker polls the store for pending jobs
    pub poll_interval: Duration,
    /// Graceful shutdown drain timeout
    pub shutdown_timeout: Duration,
    /// Publish target channel; publishing is disabled when unset
    pub channel_id: Option<String>,
    /// Privacy status for published videos
    pub privacy: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/castgen"),
            extract_timeout: Duration::from_secs(600),
            generate_timeout: Duration::from_secs(300),
            publish_timeout: Duration::from_secs(900),
            generation_attempts: 3,
            generation_backoff: Duration::from_millis(500),
            extract_attempts: 2,
            publish_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            lease_ttl_secs: 300,
            max_concurrent_jobs: 2,
            poll_interval: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
            channel_id: None,
            privacy: "private".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("CASTGEN_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            extract_timeout: Duration::from_secs(env_parse(
                "CASTGEN_EXTRACT_TIMEOUT_SECS",
                defaults.extract_timeout.as_secs(),
            )),
            generate_timeout: Duration::from_secs(env_parse(
                "CASTGEN_GENERATE_TIMEOUT_SECS",
                defaults.generate_timeout.as_secs(),
            )),
            publish_timeout: Duration::from_secs(env_parse(
                "CASTGEN_PUBLISH_TIMEOUT_SECS",
                defaults.publish_timeout.as_secs(),
            )),
            generation_attempts: env_parse(
                "CASTGEN_GENERATION_ATTEMPTS",
                defaults.generation_attempts,
            )
            .max(1),
            generation_backoff: Duration::from_millis(env_parse(
                "CASTGEN_GENERATION_BACKOFF_MS",
                defaults.generation_backoff.as_millis() as u64,
            )),
            extract_attempts: env_parse("CASTGEN_EXTRACT_ATTEMPTS", defaults.extract_attempts)
                .max(1),
            publish_attempts: env_parse("CASTGEN_PUBLISH_ATTEMPTS", defaults.publish_attempts)
                .max(1),
            retry_backoff: Duration::from_millis(env_parse(
                "CASTGEN_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )),
            lease_ttl_secs: env_parse("CASTGEN_LEASE_TTL_SECS", defaults.lease_ttl_secs),
            max_concurrent_jobs: env_parse("CASTGEN_MAX_JOBS", defaults.max_concurrent_jobs),
            poll_interval: Duration::from_secs(env_parse(
                "CASTGEN_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )),
            shutdown_timeout: Duration::from_secs(env_parse(
                "CASTGEN_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )),
            channel_id: std::env::var("CASTGEN_CHANNEL_ID").ok(),
            privacy: std::env::var("CASTGEN_PRIVACY").unwrap_or(defaults.privacy),
        }
    }

    /// Lease TTL as a chrono duration for the job store.
    pub fn lease_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_ttl_secs as i64)
    }

    /// The configured publish target, when any.
    pub fn channel_selection(&self) -> Option<ChannelSelection> {
        self.channel_id.as_ref().map(|id| {
            let mut channel = ChannelSelection::new(id);
            channel.privacy = self.privacy.clone();
            channel
        })
    }
}
