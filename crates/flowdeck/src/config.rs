use clap::Parser;
use flowdeck_core::engine::DEFAULT_PAGE_SIZE;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_POLL_MS: u64 = 5000;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MIN_POLL_MS: u64 = 250;

#[derive(Parser, Debug)]
#[command(name = "flowdeck")]
#[command(about = "Terminal flow browser for Tulip", long_about = None)]
#[command(rename_all = "kebab-case")]
pub struct Cli {
    /// Location to open, e.g. `/flow/<id>?service=web`. Overrides the saved session.
    pub location: Option<String>,
    #[arg(long, env = "FLOWDECK_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,
    #[arg(long, env = "FLOWDECK_POLL_MS", default_value_t = DEFAULT_POLL_MS)]
    pub poll_ms: u64,
    #[arg(long, env = "FLOWDECK_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
    #[arg(long, env = "FLOWDECK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
    #[arg(long, env = "FLOWDECK_LOG_FILE")]
    pub log_file: Option<PathBuf>,
    /// Restrict to flows matching this flag (repeatable).
    #[arg(long = "flag")]
    pub flags: Vec<String>,
    /// Restrict to flows matching this flag id (repeatable).
    #[arg(long = "flag-id")]
    pub flag_ids: Vec<String>,
    #[arg(long, env = "FLOWDECK_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub poll_interval: Duration,
    pub page_size: usize,
    pub state_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub flags: Vec<String>,
    pub flag_ids: Vec<String>,
    pub timeout: Duration,
    pub location: Option<String>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Self {
        Self {
            api_url: cli.api_url.trim().to_string(),
            poll_interval: Duration::from_millis(cli.poll_ms.max(MIN_POLL_MS)),
            page_size: cli.page_size.max(1),
            state_dir: cli.state_dir.unwrap_or_else(default_state_dir),
            log_file: cli.log_file,
            flags: cli.flags,
            flag_ids: cli.flag_ids,
            timeout: Duration::from_secs(cli.timeout_secs.max(1)),
            location: cli.location.filter(|value| !value.trim().is_empty()),
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.state_dir.join("session.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            poll_interval: Duration::from_secs(5),
            page_size: DEFAULT_PAGE_SIZE,
            state_dir: PathBuf::from("."),
            log_file: None,
            flags: Vec::new(),
            flag_ids: Vec::new(),
            timeout: Duration::from_secs(10),
            location: None,
        }
    }
}

pub fn load_config() -> Config {
    Config::from_cli(Cli::parse())
}

fn default_state_dir() -> PathBuf {
    if let Ok(path) = env::var("XDG_STATE_HOME") {
        if !path.trim().is_empty() {
            return PathBuf::from(path).join("flowdeck");
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local/state/flowdeck")
}
