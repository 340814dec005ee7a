//! Live scenario runner
//!
//! Runs the scenario catalog against a real server and browser. Configure
//! with SSOPROBE_SERVER_URL (unset = skip, so plain `cargo test` stays green
//! on machines without the server under test).
//!
//! Run with: cargo test --package ssoprobe-scenarios --test live

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ssoprobe_harness::{BrowserConfig, Harness, HarnessConfig, Session};
use ssoprobe_scenarios::{catalog, Scenario};

#[derive(Parser, Debug)]
#[command(name = "ssoprobe-live")]
#[command(about = "Live SSO scenario runner")]
struct Args {
    /// Base URL of the server under test (e.g. https://localhost:8443/cas)
    #[arg(long, env = "SSOPROBE_SERVER_URL")]
    server: Option<String>,

    /// Run only the named scenario
    #[arg(long)]
    scenario: Option<String>,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,

    /// Browser binary
    #[arg(long, env = "SSOPROBE_BROWSER")]
    browser: Option<PathBuf>,

    /// Keep the browser window visible
    #[arg(long)]
    headed: bool,

    /// Output directory for screenshots
    #[arg(long, default_value = "test-results/screenshots")]
    artifacts: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let args = Args::parse();

    if args.list {
        for scenario in catalog() {
            println!("{:<28} {}", scenario.name, scenario.description);
        }
        return;
    }

    let Some(server) = args.server.clone() else {
        eprintln!("SSOPROBE_SERVER_URL not set; skipping live scenarios");
        return;
    };

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    std::process::exit(rt.block_on(run(args, server)));
}

async fn run(args: Args, server: String) -> i32 {
    let harness = match Harness::new(HarnessConfig {
        server_base: server,
        artifact_dir: args.artifacts.clone(),
        ..Default::default()
    }) {
        Ok(harness) => harness,
        Err(e) => {
            error!("harness setup failed: {e}");
            return 2;
        }
    };

    let scenarios: Vec<Scenario> = catalog()
        .into_iter()
        .filter(|s| args.scenario.as_deref().map_or(true, |name| s.name == name))
        .collect();
    if scenarios.is_empty() {
        error!("no scenario matches the requested name");
        return 2;
    }

    info!("Running {} scenario(s)...", scenarios.len());
    let mut passed = 0;

    for scenario in &scenarios {
        let start = Instant::now();

        let mut browser_config = BrowserConfig {
            headless: !args.headed,
            ..Default::default()
        };
        if let Some(binary) = &args.browser {
            browser_config.binary = binary.clone();
        }

        // One session per scenario; teardown is scoped to this iteration on
        // every path out of it.
        let mut session = match Session::launch(browser_config).await {
            Ok(session) => session,
            Err(e) => {
                error!("✗ {} - browser launch failed: {e}", scenario.name);
                return 2;
            }
        };

        let result = (scenario.run)(&harness, &mut session).await;
        session.shutdown();

        match result {
            Ok(()) => {
                passed += 1;
                info!("✓ {} ({} ms)", scenario.name, start.elapsed().as_millis());
            }
            Err(e) => {
                // Fail fast: the first broken scenario ends the run.
                error!("✗ {} - {e}", scenario.name);
                info!("{passed} passed before the failure");
                return 1;
            }
        }
    }

    info!("All {passed} scenario(s) passed");
    0
}
