/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::{fs, sync::Arc};

use directory::{
    config::{ConfigDirectory, DomainSettings},
    probe::{DomainProber, PortKind, ReachableDomains},
    trusts, Identity,
};
use engine::{
    config::EngineSettings,
    render::TextRenderer,
    run::{self, RunEnvironment},
    store::FileStore,
    variables::AttributeVariables,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use utils::{config::Config, failed, UnwrapFailure};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Read configuration parameters
    let config = parse_config();
    let settings = EngineSettings::from_config(&config).failed("Configuration error");
    let domain_settings = DomainSettings::from_config(&config).failed("Configuration error");
    let prober = DomainProber::from_config(&config).failed("Configuration error");
    let variables = AttributeVariables::from_config(&config).failed("Configuration error");
    let identities = parse_identities(&config).failed("Configuration error");
    let directory = Arc::new(config.parse_directory().failed("Configuration error"));
    if settings.signatures.is_none() && settings.auto_reply.is_none() {
        failed("No template flows configured: set signatures.path or auto-reply.path.");
    }

    // Enable tracing
    let _tracer = enable_tracing(&config).failed("Failed to enable tracing");
    tracing::info!(
        "Starting mailsig template deployment v{}...",
        env!("CARGO_PKG_VERSION")
    );

    // Expand the domain working set and prune what does not answer
    let working_set = trusts::expand(
        &directory,
        &domain_settings.home,
        &domain_settings.include,
    )
    .await
    .failed("Failed to enumerate domain trusts");
    let reachable = prober
        .verify(&directory, working_set, PortKind::Directory)
        .await;
    let global = prober
        .verify(&directory, reachable.clone(), PortKind::GlobalCatalog)
        .await;
    let domains = ReachableDomains {
        directory: reachable,
        global,
    };
    if !domains.contains(PortKind::Directory, &domain_settings.home)
        || !domains.contains(PortKind::GlobalCatalog, &domain_settings.home)
    {
        failed(&format!(
            "Home domain {:?} did not answer on the directory and global catalog ports.",
            domain_settings.home
        ));
    }

    // Deploy
    let writer = FileStore::open(&settings.output)
        .await
        .failed("Failed to open the output store");
    let mut env = RunEnvironment {
        directory,
        domains,
        variables: Box::new(variables),
        renderer: Box::new(TextRenderer),
        writer: Box::new(writer),
    };
    let now = chrono::Local::now().naive_local();
    let report = run::execute(&settings, &mut env, identities, now)
        .await
        .failed("Deployment run aborted");

    tracing::info!(
        context = "run",
        event = "completed",
        identities = report.identities,
        rendered = report.rendered,
        "Template deployment completed"
    );

    Ok(())
}

// The identity feed, as the external profile enumerator hands it over:
// one [[mailbox]] entry per account, in deployment order.
fn parse_identities(config: &Config) -> utils::config::Result<Vec<Identity>> {
    let mut identities = Vec::new();
    for id in config.sub_keys("mailbox") {
        let mut identity =
            Identity::new(config.value_require(("mailbox", id, "address"))?);
        identity.legacy_dn = config
            .value(("mailbox", id, "legacy-dn"))
            .map(|value| value.to_string());
        identity.proxy_addresses = config
            .values(("mailbox", id, "proxy-addresses"))
            .map(|(_, value)| value.to_string())
            .collect();
        identities.push(identity);
    }
    if identities.is_empty() {
        Err("No mailboxes in the identity feed: add at least one [[mailbox]] entry.".to_string())
    } else {
        Ok(identities)
    }
}

fn enable_tracing(config: &Config) -> utils::config::Result<Option<WorkerGuard>> {
    let level = config.value("tracing.level").unwrap_or("info");
    let env_filter = EnvFilter::builder()
        .parse(format!(
            "mailsig={level},engine={level},directory={level},utils={level}"
        ))
        .failed("Failed to parse log level");
    match config.value("tracing.method").unwrap_or("stdout") {
        "log" => {
            let path = config.value_require("tracing.path")?;
            let prefix = config.value_require("tracing.prefix")?;
            let file_appender = match config.value("tracing.rotate").unwrap_or("daily") {
                "daily" => tracing_appender::rolling::daily(path, prefix),
                "hourly" => tracing_appender::rolling::hourly(path, prefix),
                "minutely" => tracing_appender::rolling::minutely(path, prefix),
                "never" => tracing_appender::rolling::never(path, prefix),
                rotate => {
                    return Err(format!("Unsupported log rotation strategy {rotate:?}"));
                }
            };

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing::subscriber::set_global_default(
                tracing_subscriber::FmtSubscriber::builder()
                    .with_env_filter(env_filter)
                    .with_writer(non_blocking)
                    .finish(),
            )
            .failed("Failed to set subscriber");
            Ok(guard.into())
        }
        "stdout" => {
            tracing::subscriber::set_global_default(
                tracing_subscriber::FmtSubscriber::builder()
                    .with_env_filter(env_filter)
                    .finish(),
            )
            .failed("Failed to set subscriber");
            Ok(None)
        }
        "none" | "off" => Ok(None),
        method => Err(format!("Unsupported tracing method {method:?}")),
    }
}

fn parse_config() -> Config {
    let mut config_path = None;
    let mut found_param = false;

    for arg in std::env::args().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            if key.starts_with("--config") {
                config_path = value.trim().to_string().into();
                break;
            } else {
                failed(&format!("Invalid command line argument: {key}"));
            }
        } else if found_param {
            config_path = arg.into();
            break;
        } else if arg.starts_with("--config") {
            found_param = true;
        } else {
            failed(&format!("Invalid command line argument: {arg}"));
        }
    }

    Config::new(
        &fs::read_to_string(config_path.failed("Missing parameter --config=<path-to-config>."))
            .failed("Could not read configuration file"),
    )
    .failed("Invalid configuration file")
}
