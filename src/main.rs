//! burrow command-line entry point

use burrow::config::{
    load_config_file, load_default_config_file, OutputFormat, RobotsMode, RunMode, Settings,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// burrow: a concurrent web content discovery engine
///
/// Expands a wordlist against one or more scope roots, spiders HTML
/// responses for further paths, and reports every reachable resource.
#[derive(Parser, Debug)]
#[command(name = "burrow", version, about = "A concurrent web content discovery engine")]
struct Cli {
    /// Starting URLs and scope roots
    #[arg(long = "url", value_name = "URL")]
    url: Vec<String>,

    /// Additional starting URLs (same as --url)
    #[arg(value_name = "URL")]
    extra_urls: Vec<String>,

    /// Run mode
    #[arg(long, value_enum, default_value_t = RunMode::Enumeration)]
    mode: RunMode,

    /// Number of workers (defaults to twice the CPU count)
    #[arg(long)]
    workers: Option<usize>,

    /// Wordlist file or built-in name (default built-in)
    #[arg(long)]
    wordlist: Option<String>,

    /// Extensions to append to extensionless paths
    #[arg(long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// Don't probe backup-filename variants
    #[arg(long)]
    no_mangle: bool,

    /// Don't parse HTML documents for links to follow
    #[arg(long)]
    no_html: bool,

    /// Don't add slash-suffixed wordlist variants
    #[arg(long)]
    no_slashes: bool,

    /// Add case-mangled wordlist variants
    #[arg(long)]
    mangle_cases: bool,

    /// URLs to exclude from the scan
    #[arg(long = "exclude", value_name = "URL")]
    exclude: Vec<String>,

    /// Proxy to use (socks5://, socks5h://, http://); repeatable
    #[arg(long = "proxy", value_name = "URL")]
    proxy: Vec<String>,

    /// Network timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Sleep between requests per worker, in milliseconds
    #[arg(long, value_name = "MILLIS")]
    sleep: Option<u64>,

    /// Internal queue size
    #[arg(long)]
    queue_size: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(long)]
    outfile: Option<PathBuf>,

    /// Include redirects in reports
    #[arg(long)]
    include_redirects: bool,

    /// robots.txt handling
    #[arg(long, value_enum, default_value_t = RobotsMode::Ignore)]
    robots_mode: RobotsMode,

    /// Allow HTTP scope roots to cover their HTTPS equivalents
    #[arg(long)]
    allow_upgrade: bool,

    /// HTTP response codes to continue spidering on
    #[arg(long, value_delimiter = ',')]
    spider_codes: Option<Vec<u16>>,

    /// Username for HTTP Basic auth
    #[arg(long)]
    http_username: Option<String>,

    /// Password for HTTP Basic auth
    #[arg(long)]
    http_password: Option<String>,

    /// Header to send with every request ("Name: value"); repeatable
    #[arg(long = "header", value_name = "HEADER")]
    header: Vec<String>,

    /// Headers to try one at a time ("Name: value"); repeatable
    #[arg(long = "optional-header", value_name = "HEADER")]
    optional_header: Vec<String>,

    /// User-Agent for requests
    #[arg(long)]
    user_agent: Option<String>,

    /// Config file (overrides the default search paths)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn into_settings(self) -> Result<Settings, burrow::ConfigError> {
        let mut settings = Settings::default();

        let file = match &self.config {
            Some(path) => Some(load_config_file(path)?),
            None => load_default_config_file()?,
        };
        if let Some(file) = file {
            settings.apply_file(&file);
        }

        settings.urls = self.url;
        settings.urls.extend(self.extra_urls);
        settings.run_mode = self.mode;
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if self.wordlist.is_some() {
            settings.wordlist = self.wordlist;
        }
        if let Some(extensions) = self.extensions {
            settings.extensions = extensions.into_iter().filter(|e| !e.is_empty()).collect();
        }
        settings.mangle = !self.no_mangle;
        settings.parse_html = !self.no_html;
        settings.add_slashes = !self.no_slashes;
        settings.mangle_cases = self.mangle_cases;
        settings.exclude_paths = self.exclude;
        settings.proxies = self.proxy;
        if let Some(seconds) = self.timeout {
            settings.timeout = Duration::from_secs(seconds);
        }
        if let Some(millis) = self.sleep {
            settings.sleep_time = Duration::from_millis(millis);
        }
        if let Some(queue_size) = self.queue_size {
            settings.queue_size = queue_size;
        }
        settings.format = self.format;
        settings.output_path = self.outfile;
        settings.include_redirects = self.include_redirects;
        settings.robots_mode = self.robots_mode;
        settings.allow_upgrade = self.allow_upgrade;
        if let Some(spider_codes) = self.spider_codes {
            settings.spider_codes = spider_codes;
        }
        settings.http_username = self.http_username;
        settings.http_password = self.http_password;
        settings.header = self.header;
        settings.optional_header = self.optional_header;
        if let Some(user_agent) = self.user_agent {
            settings.user_agent = user_agent;
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("burrow=warn"),
            1 => EnvFilter::new("burrow=info"),
            2 => EnvFilter::new("burrow=debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let settings = match cli.into_settings() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!("{err}");
            return Err(err.into());
        }
    };

    match burrow::engine::run(settings).await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!("scan failed: {err}");
            Err(err.into())
        }
    }
}
