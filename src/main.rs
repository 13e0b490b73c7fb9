use clap::{Arg, ArgMatches, Command};
use client_mail_router::config::{MailConfig, StoreConfig};
use client_mail_router::google_auth::GoogleAuth;
use client_mail_router::mailer::{GmailMailer, LogMailer};
use client_mail_router::reply::OfflineGenerator;
use client_mail_router::store::{FileStore, MemoryStore, SheetsStore};
use client_mail_router::{
    route_pending, Actions, Config, GeminiClient, MailFacility, ReplyGenerator, RowOutcome,
    TableStore,
};
use log::LevelFilter;
use std::process;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let matches = Command::new("client-mail-router")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Routes logged client email into per-client logs and drafts replies")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/client-mail-router.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("route")
                .long("route")
                .help("Run one routing pass over the pending log")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("watch")
                .long("watch")
                .help("Run routing passes on the configured schedule until interrupted")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .help("List the latest row of each thread the viewer takes part in")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("viewer")
                .long("viewer")
                .value_name("EMAIL")
                .help("Viewer identity (defaults to viewer_email from the configuration)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("draft")
                .long("draft")
                .value_name("THREAD_ID")
                .help("Generate a reply draft for a thread")
                .requires("source")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("source")
                .long("source")
                .value_name("REFERENCE")
                .help("Destination log holding the thread")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("send")
                .long("send")
                .help("Send a message (use with --to, --subject and --body)")
                .requires_all(["to", "subject", "body"])
                .action(clap::ArgAction::SetTrue),
        )
        .arg(Arg::new("to").long("to").value_name("EMAIL").action(clap::ArgAction::Set))
        .arg(Arg::new("subject").long("subject").value_name("TEXT").action(clap::ArgAction::Set))
        .arg(Arg::new("body").long("body").value_name("TEXT").action(clap::ArgAction::Set))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("/etc/client-mail-router.yaml");

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    let store = match build_store(&config.store) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening table store: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&matches, &config, store.as_ref()).await {
        log::error!("{e}");
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches, config: &Config, store: &dyn TableStore) -> anyhow::Result<()> {
    if matches.get_flag("watch") {
        return watch(config, store).await;
    }

    if matches.get_flag("route") {
        let report = route_pending(store, config).await?;
        print_routing(&report);
        return Ok(());
    }

    let wants_actions = matches.get_flag("threads")
        || matches.get_flag("send")
        || matches.contains_id("draft");
    if !wants_actions {
        println!("Nothing to do. Try --route, --watch, --threads, --draft or --send (see --help).");
        return Ok(());
    }

    let mailer = build_mailer(&config.mail)?;
    let generator = build_generator(config);
    let actions = Actions::new(store, generator.as_ref(), mailer.as_ref(), config);

    let viewer = matches
        .get_one::<String>("viewer")
        .cloned()
        .or_else(|| config.viewer_email.clone())
        .unwrap_or_default();

    if matches.get_flag("threads") {
        if viewer.is_empty() {
            anyhow::bail!("--threads needs --viewer or viewer_email in the configuration");
        }
        let home = actions.refresh(&viewer).await;
        println!("{}", home.notification);
        for candidate in &home.candidates {
            let draft = if candidate.has_draft() {
                truncate_string(&candidate.needs_draft, 60)
            } else {
                "(no draft)".to_string()
            };
            println!(
                "  [{}] {} | {} -> {} | {}",
                candidate.thread_id, candidate.subject, candidate.from, candidate.to, draft
            );
        }
        for (reference, scan) in &home.report.logs {
            log::debug!("{reference}: {scan:?}");
        }
    }

    if let Some(thread_id) = matches.get_one::<String>("draft") {
        let source = matches
            .get_one::<String>("source")
            .map(String::as_str)
            .unwrap_or_default();
        println!("{}", actions.generate_draft(&viewer, thread_id, source).await);
    }

    if matches.get_flag("send") {
        let arg = |name: &str| {
            matches
                .get_one::<String>(name)
                .map(String::as_str)
                .unwrap_or_default()
        };
        println!("{}", actions.send_draft(arg("to"), arg("subject"), arg("body")).await);
    }

    Ok(())
}

async fn watch(config: &Config, store: &dyn TableStore) -> anyhow::Result<()> {
    let period = Duration::from_secs(config.schedule_interval_seconds.max(1));
    let mut interval = tokio::time::interval(period);
    log::info!("Routing every {} seconds, Ctrl-C to stop", period.as_secs());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match route_pending(store, config).await {
                    Ok(report) => log::info!("{}", report.summary()),
                    Err(e) => log::error!("Routing pass failed: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

fn build_store(store: &StoreConfig) -> anyhow::Result<Box<dyn TableStore>> {
    Ok(match store {
        StoreConfig::Memory => {
            log::warn!("Using an empty in-memory table store");
            Box::new(MemoryStore::new())
        }
        StoreConfig::File { dir } => Box::new(FileStore::new(dir)),
        StoreConfig::Sheets { api_base } => {
            let auth = GoogleAuth::from_env()?;
            Box::new(SheetsStore::new(auth, api_base.as_deref())?)
        }
    })
}

fn build_mailer(mail: &MailConfig) -> anyhow::Result<Box<dyn MailFacility>> {
    Ok(match mail {
        MailConfig::Log => Box::new(LogMailer::new()),
        MailConfig::Gmail { api_base } => {
            let auth = GoogleAuth::from_env()?;
            Box::new(GmailMailer::new(auth, api_base.as_deref()))
        }
    })
}

fn build_generator(config: &Config) -> Box<dyn ReplyGenerator> {
    match GeminiClient::from_env(&config.reply) {
        Ok(client) => Box::new(client),
        Err(e) => {
            log::warn!("Reply generation disabled: {e}");
            Box::new(OfflineGenerator)
        }
    }
}

fn print_routing(report: &client_mail_router::RoutingReport) {
    println!("{}", report.summary());
    for row in &report.rows {
        let line = match &row.outcome {
            RowOutcome::Forwarded {
                domain,
                destination,
            } => format!("forwarded {domain} -> {destination}"),
            RowOutcome::NoExternalDomain => "discarded: no external domain".to_string(),
            RowOutcome::NotAllowlisted { domain } => format!("discarded: {domain} not allowlisted"),
            RowOutcome::ForwardFailed { domain, reason, .. } => {
                format!("forward failed: {domain} ({reason})")
            }
        };
        let deleted = if row.deleted { "" } else { " [not deleted]" };
        println!("  row {}: {}{}", row.index + 1, line, deleted);
    }
}

fn test_config(config: &Config) {
    println!("🔍 Testing configuration...");
    println!();
    println!("Organization domain: {}", config.org_domain);
    println!(
        "Pending log: {} ({})",
        config.pending_log.reference, config.pending_log.tab
    );
    println!(
        "Client registry: {} ({})",
        config.registry.reference, config.registry.tab
    );
    println!("Destination tab: {}", config.destination_tab);

    let problems = config.validate();
    if problems.is_empty() {
        println!("✅ Configuration is valid");
    } else {
        println!("❌ Configuration validation failed:");
        for problem in &problems {
            println!("  - {problem}");
        }
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max_len {
        flat
    } else {
        let kept: String = flat.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
