use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use formpilot::LivePage;
use formpilot_page::{Document, MessageRouter, PageRequest, PageResponse};
use formpilot_runner::{
    bridge, document, AiClient, Completion, Config, PageHost, Profile, ResumeParser, RunReport,
    ScriptedFlow, StepDriver,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "formpilot.yaml";

#[derive(Parser)]
#[command(name = "formpilot")]
#[command(about = "AI-assisted multi-step form filling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ./formpilot.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fill a form flow from a profile
    Run {
        /// HTML page, one per step, in order (can be used multiple times)
        #[arg(long = "page", value_name = "FILE", conflicts_with = "url")]
        pages: Vec<PathBuf>,

        /// Live page to open in the browser
        #[arg(long)]
        url: Option<String>,

        /// Profile YAML (overrides config)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Run the browser headless (overrides config)
        #[arg(long)]
        headless: bool,
    },

    /// Print the fields the extractor sees, as JSON
    Analyze {
        #[arg(long, value_name = "FILE", conflicts_with = "url")]
        page: Option<PathBuf>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        headless: bool,
    },

    /// Build a profile from a resume
    ImportResume {
        /// Resume document (plain text)
        file: PathBuf,

        /// Where to write the profile
        #[arg(long, default_value = "profile.yaml")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            pages,
            url,
            profile,
            headless,
        } => {
            if headless {
                config.browser.headless = true;
            }
            let profile_path = profile
                .or_else(|| config.profile.clone())
                .context("no profile given; pass --profile or set `profile` in the config")?;
            let profile = Profile::load(&profile_path)
                .with_context(|| format!("loading profile {}", profile_path.display()))?;

            let ai = Arc::new(AiClient::new(&config.ai)?);
            let report = match (url, pages.is_empty()) {
                (Some(url), _) => {
                    let live = LivePage::launch(&config.browser).await?;
                    match live.goto(&url).await {
                        Ok(()) => {
                            let (report, live) = drive(live, ai, &config, profile).await?;
                            live.close_with(report).await?
                        }
                        Err(e) => live.close_with(Err(e)).await?,
                    }
                }
                (None, false) => {
                    let html = pages
                        .iter()
                        .map(|p| {
                            std::fs::read_to_string(p)
                                .with_context(|| format!("reading {}", p.display()))
                        })
                        .collect::<anyhow::Result<Vec<_>>>()?;
                    let flow = ScriptedFlow::from_html(html)?;
                    let (report, flow) = drive(flow, ai, &config, profile).await?;
                    info!("Ended on page {} of {}", flow.current() + 1, flow.pages().len());
                    report?
                }
                (None, true) => bail!("nothing to fill; pass --page FILE or --url URL"),
            };

            print_report(&report);
        }

        Command::Analyze {
            page,
            url,
            headless,
        } => {
            let mut doc = match (page, url) {
                (Some(path), _) => {
                    let html = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Document::parse_html(&html)?
                }
                (None, Some(url)) => {
                    if headless {
                        config.browser.headless = true;
                    }
                    let live = LivePage::launch(&config.browser).await?;
                    let doc = match live.goto(&url).await {
                        Ok(()) => live.snapshot().await,
                        Err(e) => Err(e),
                    };
                    live.close_with(doc).await?
                }
                (None, None) => bail!("pass --page FILE or --url URL"),
            };

            match MessageRouter.handle(&mut doc, PageRequest::Analyze) {
                PageResponse::Analyze(res) => {
                    println!("{}", serde_json::to_string_pretty(&res.fields)?)
                }
                other => bail!("unexpected {} response", other.name()),
            }
        }

        Command::ImportResume { file, out } => {
            let text = document::read_text(&file)?;
            let client = AiClient::new(&config.ai)?;
            let profile = client.parse_resume(&text).await?;
            profile.save(&out)?;

            println!("✓ Profile written to {}", out.display());
            if let Some(name) = profile.full_name() {
                println!("  Name: {}", name);
            }
            println!(
                "  Experience: {}, education: {}, skills: {}",
                profile.experience.len(),
                profile.education.len(),
                profile.skills.len()
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None if Path::new(DEFAULT_CONFIG).exists() => Ok(Config::load(DEFAULT_CONFIG)?),
        None => Ok(Config::from_env()),
    }
}

/// Run the driver against `host` and hand the host back afterwards, whether
/// or not the run succeeded.
async fn drive<H: PageHost>(
    host: H,
    ai: Arc<AiClient>,
    config: &Config,
    profile: Profile,
) -> anyhow::Result<(formpilot_runner::Result<RunReport>, H)> {
    let (client, handle) = bridge::spawn(host);

    let mut driver = StepDriver::new(client, ai.clone(), ai, profile).with_config(config);
    let result = driver.run().await;
    drop(driver);

    let host = handle.await.context("page host task panicked")?;
    Ok((result, host))
}

fn print_report(report: &RunReport) {
    println!();
    match report.completion {
        Completion::Finished => println!("✓ Finished"),
        Completion::SafetyLimit => println!("⚠ Stopped at the step limit"),
    }
    println!("  Steps: {}", report.steps);
    println!("  Fields filled: {}", report.filled);
}
