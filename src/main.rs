use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use web_chaos::browser::{BrowserKind, MockApp, MockBrowserFactory, WebDriverConfig, WebDriverFactory};
use web_chaos::config::{self, ChaosConfig};
use web_chaos::harness::HarnessError;
use web_chaos::http::{BlockingHttpClient, HttpClient, StaticHttpClient};
use web_chaos::payload::PayloadCatalog;
use web_chaos::runner::{SuiteResult, SuiteRunner, run_matrix};
use web_chaos::scenarios::ScenarioKind;

/// Web Chaos - adversarial robustness checks for web applications
#[derive(Parser, Debug)]
#[command(
    name = "web-chaos",
    about = "Throws malformed input, random clicks, history chaos and garbage API requests at a web app",
    after_help = "ENVIRONMENT VARIABLES:\n\
        BASE_URL                   Application under test (default http://localhost:3000)\n\
        CI                         On CI: 2 retries, 1 worker\n\
        CHAOS_WEBDRIVER_URL        WebDriver endpoint\n\
        CHAOS_BROWSER              chromium, firefox, webkit, a comma list, or all\n\
        CHAOS_SEED                 Fixed monkey seed\n\
        CHAOS_ARTIFACTS_DIR        Where failure screenshots go\n\
        RUST_LOG                   Log filter (default info)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the chaos suite against a live application through WebDriver
    Run {
        /// Root URL of the application under test
        #[arg(long, env = "BASE_URL")]
        base_url: Option<String>,

        /// WebDriver endpoint
        #[arg(long, env = "CHAOS_WEBDRIVER_URL")]
        webdriver: Option<String>,

        /// Browser: chromium, firefox, webkit or all (repeatable; the suite runs once per browser)
        #[arg(long = "browser", short = 'b')]
        browsers: Vec<String>,

        /// Scenario to run (repeatable; default: all)
        #[arg(long = "scenario", short = 's')]
        scenarios: Vec<ScenarioKind>,

        /// Fixed seed for the monkey
        #[arg(long)]
        seed: Option<u64>,

        /// Whole-scenario re-runs after a failure
        #[arg(long)]
        retries: Option<u32>,

        /// Scenarios run concurrently
        #[arg(long, short = 'w')]
        workers: Option<usize>,

        /// Random clicks per monkey run
        #[arg(long)]
        rounds: Option<u32>,

        /// Directory for failure screenshots
        #[arg(long)]
        artifacts: Option<PathBuf>,

        /// Post every catalog payload to the API, not just the standard two
        #[arg(long)]
        api_all_payloads: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run the suite against the built-in in-memory demo application
    Demo {
        /// Fixed seed for the monkey
        #[arg(long)]
        seed: Option<u64>,

        /// Status the fake API answers with
        #[arg(long, default_value = "400")]
        api_status: u16,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the payload catalog
    Payloads {
        /// Output as JSON (full values)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Some(Commands::Run {
            base_url,
            webdriver,
            browsers,
            scenarios,
            seed,
            retries,
            workers,
            rounds,
            artifacts,
            api_all_payloads,
            json,
            report,
        }) => {
            let mut config = config::get().clone();
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            if let Some(webdriver) = webdriver {
                config.webdriver_url = webdriver;
            }
            if !browsers.is_empty() {
                config.browsers = BrowserKind::parse_list(&browsers.join(","))?;
            }
            config.seed = seed.or(config.seed);
            config.retries = retries.unwrap_or(config.retries);
            config.workers = workers.unwrap_or(config.workers);
            config.monkey_rounds = rounds.unwrap_or(config.monkey_rounds);
            config.artifacts_dir = artifacts.or(config.artifacts_dir);
            config.api_all_payloads |= api_all_payloads;
            config.validate()?;

            let http: Arc<dyn HttpClient> = Arc::new(
                BlockingHttpClient::new(config.navigation_timeout).map_err(HarnessError::from)?,
            );
            let kinds = if scenarios.is_empty() {
                ScenarioKind::all().to_vec()
            } else {
                scenarios
            };

            let result = run_matrix(&config.browsers, &kinds, |browser| {
                let webdriver = WebDriverConfig::new(&config.webdriver_url)
                    .browser(browser)
                    .headless(config.headless)
                    .command_timeout(config.navigation_timeout);
                SuiteRunner::new(config.clone(), Arc::new(WebDriverFactory::new(webdriver)), Arc::clone(&http))
            });
            if let Some(path) = report {
                std::fs::write(&path, serde_json::to_string_pretty(&result)?)?;
                tracing::info!(path = %path.display(), "report written");
            }
            finish(&result, json)?;
        }

        Some(Commands::Demo { seed, api_status, json }) => {
            let mut config = ChaosConfig::defaults().fast();
            config.monkey_delay = Duration::from_millis(10);
            config.seed = seed;

            let runner = SuiteRunner::new(
                config,
                Arc::new(MockBrowserFactory::new(MockApp::demo())),
                Arc::new(StaticHttpClient::new(api_status)),
            );
            let result = runner.run(&ScenarioKind::all());
            finish(&result, json)?;
        }

        Some(Commands::Payloads { json }) => {
            let catalog = PayloadCatalog::standard();
            if json {
                let payloads: Vec<_> = catalog.iter().collect();
                println!("{}", serde_json::to_string_pretty(&payloads)?);
            } else {
                for payload in catalog.iter() {
                    let kind = if payload.tag.is_injection() { "injection" } else { "malformed" };
                    println!("{:<20} {:<10} {}", payload.tag.name(), kind, payload.preview());
                }
            }
        }

        None => {
            println!("Web Chaos - adversarial robustness checks for web applications");
            println!();
            println!("Usage: web-chaos <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run       Run the chaos suite against a live application");
            println!("  demo      Run the suite against the built-in demo application");
            println!("  payloads  Print the payload catalog");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

/// Print the result and exit non-zero when anything failed
fn finish(result: &SuiteResult, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", result.summary());
        for scenario in result.failures() {
            for artifact in &scenario.artifacts {
                println!("  artifact: {}", artifact.display());
            }
        }
    }
    if !result.passed {
        std::process::exit(1);
    }
    Ok(())
}
