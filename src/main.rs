//! cfddns - keep Cloudflare records in sync with this host's addresses.

use anyhow::Context;
use cfddns::config::{parse_domains, Config};
use cfddns::detector::IpDetector;
use cfddns::providers::{CloudflareProvider, DnsProvider};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cfddns")]
#[command(about = "Keep Cloudflare A/AAAA records pointed at this host")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log every provider call
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prompt for credentials and domains and save them
    Setup,

    /// Update DNS records now
    Update,

    /// Show discovered addresses and current records
    Status,

    /// Validate configuration and credentials
    Validate,
}

fn get_config_path(cli_path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match cli_path {
        Some(path) => Ok(path),
        None => Ok(Config::default_path()?),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "cfddns=debug" } else { "cfddns=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config_path = get_config_path(cli.config)?;

    match cli.command {
        Commands::Setup => cmd_setup(&config_path)?,
        Commands::Update => {
            let config = load(&config_path)?;
            cmd_update(config).await;
        }
        Commands::Status => {
            let config = load(&config_path)?;
            cmd_status(config).await;
        }
        Commands::Validate => {
            let config = Config::load_from(&config_path)?;
            cmd_validate(config).await?;
        }
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load_from(path)?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn clients(config: &Config) -> (IpDetector, CloudflareProvider) {
    (
        IpDetector::with_service(config.ipv4_service_url.clone()),
        CloudflareProvider::with_base_url(config.credentials(), config.api_base_url.clone()),
    )
}

fn prompt(
    input: &mut impl BufRead,
    label: &str,
    current: &str,
    secret: bool,
) -> anyhow::Result<String> {
    match (current.is_empty(), secret) {
        (true, _) => print!("{}: ", label),
        (false, true) => print!("{} [unchanged]: ", label),
        (false, false) => print!("{} [{}]: ", label, current),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();

    Ok(if answer.is_empty() {
        current.to_string()
    } else {
        answer.to_string()
    })
}

fn cmd_setup(path: &Path) -> anyhow::Result<()> {
    let mut config = if path.exists() {
        Config::load_from(path)?
    } else {
        Config::default()
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();

    config.email = prompt(&mut input, "Cloudflare email", &config.email, false)?;
    config.api_key = prompt(&mut input, "Cloudflare API key", &config.api_key, true)?;
    let domains = prompt(
        &mut input,
        "Domains (comma separated)",
        &config.domains.join(","),
        false,
    )?;
    config.domains = parse_domains(&domains);

    config.validate()?;
    config
        .save_to(path)
        .with_context(|| format!("could not write {}", path.display()))?;

    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn cmd_update(config: Config) {
    let (detector, provider) = clients(&config);
    let report = cfddns::run(&config.domains, &detector, &provider).await;
    println!("{}", report);
}

async fn cmd_status(config: Config) {
    let (detector, provider) = clients(&config);
    let report = cfddns::status::status(&config.domains, &detector, &provider).await;
    println!("{}", report);
}

async fn cmd_validate(config: Config) -> anyhow::Result<()> {
    println!("Validating configuration...\n");

    if let Err(e) = config.validate() {
        println!("  config: FAILED - {}", e);
        std::process::exit(1);
    }
    println!("  config: OK ({} domain(s))", config.domains.len());

    let (_, provider) = clients(&config);
    let mut all_valid = true;

    for domain in &config.domains {
        print!("  {}: ", domain);

        let Some(apex) = cfddns::reconciler::apex_domain(domain) else {
            println!("FAILED - not a registrable domain name");
            all_valid = false;
            continue;
        };

        match provider.find_zone(&apex).await {
            Ok(Some(zone)) => println!("OK (zone {})", zone.name),
            Ok(None) => {
                println!("FAILED - zone {} not managed by this account", apex);
                all_valid = false;
            }
            Err(e) => {
                println!("FAILED - {}", e);
                all_valid = false;
                break;
            }
        }
    }

    println!();

    if all_valid {
        println!("Configuration is valid.");
    } else {
        println!("Configuration has problems.");
        std::process::exit(1);
    }

    Ok(())
}
