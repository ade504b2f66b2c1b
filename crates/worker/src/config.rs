use std::path::PathBuf;
use std::time::Duration;

/// A configuration variable held a value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Which HTTP contract the render backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendDialect {
    ComfyUi,
    Generic,
}

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for a worker running next to a local
/// ComfyUI instance.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub backend_url: String,
    pub dialect: BackendDialect,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub poll_backoff_multiplier: f64,
    pub poll_max_interval: Duration,
    /// How long to wait for the backend to come up before a job.
    pub ready_timeout: Duration,
    /// Timeout for each individual HTTP request.
    pub request_timeout: Duration,
    pub workflow_template: PathBuf,
    /// Publish fetched outputs here; publishing is off when unset.
    pub output_dir: Option<PathBuf>,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default                  |
    /// |---------------------------|--------------------------|
    /// | `COMFY_URL`               | `http://127.0.0.1:8188`  |
    /// | `BACKEND_DIALECT`         | `comfyui`                |
    /// | `POLL_INTERVAL_MS`        | `1000`                   |
    /// | `MAX_WAIT_SECS`           | `300`                    |
    /// | `POLL_BACKOFF_MULTIPLIER` | `1.0`                    |
    /// | `POLL_MAX_INTERVAL_MS`    | `10000`                  |
    /// | `READY_TIMEOUT_SECS`      | `120`                    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                     |
    /// | `WORKFLOW_TEMPLATE`       | `workflows/faceswap.json`|
    /// | `OUTPUT_DIR`              | unset                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend_url = get("COMFY_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8188".into())
            .trim_end_matches('/')
            .to_string();

        let dialect = match get("BACKEND_DIALECT").as_deref() {
            None | Some("comfyui") => BackendDialect::ComfyUi,
            Some("generic") => BackendDialect::Generic,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "BACKEND_DIALECT",
                    value: other.to_string(),
                    expected: "'comfyui' or 'generic'",
                })
            }
        };

        let poll_interval = Duration::from_millis(parse_u64(&get, "POLL_INTERVAL_MS", 1000)?);
        let max_wait = Duration::from_secs(parse_u64(&get, "MAX_WAIT_SECS", 300)?);
        let poll_max_interval =
            Duration::from_millis(parse_u64(&get, "POLL_MAX_INTERVAL_MS", 10_000)?);
        let ready_timeout = Duration::from_secs(parse_u64(&get, "READY_TIMEOUT_SECS", 120)?);
        let request_timeout = Duration::from_secs(parse_u64(&get, "REQUEST_TIMEOUT_SECS", 30)?);

        let poll_backoff_multiplier = match get("POLL_BACKOFF_MULTIPLIER") {
            None => 1.0,
            Some(raw) => match raw.parse::<f64>() {
                Ok(m) if m.is_finite() && m >= 1.0 => m,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "POLL_BACKOFF_MULTIPLIER",
                        value: raw,
                        expected: "a number >= 1.0",
                    })
                }
            },
        };

        if poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_MS",
                value: "0".into(),
                expected: "a positive integer",
            });
        }

        Ok(Self {
            backend_url,
            dialect,
            poll_interval,
            max_wait,
            poll_backoff_multiplier,
            poll_max_interval,
            ready_timeout,
            request_timeout,
            workflow_template: get("WORKFLOW_TEMPLATE")
                .unwrap_or_else(|| "workflows/faceswap.json".into())
                .into(),
            output_dir: get("OUTPUT_DIR").map(PathBuf::from),
        })
    }
}

fn parse_u64(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            var,
            value: raw,
            expected: "a non-negative integer",
        }),
    }
}
