//! Questlink CLI - real-time notification client for Questboard.

use std::future::Future;
use std::process;
use std::time::Duration;

use clap::Parser;
use questlink::cli::{Cli, Commands, ConfigCommands, NotificationCommands, TokenCommands};
use questlink::commands::notifications::Action;
use questlink::commands::{self, Output};
use questlink::config::{ConfigOverrides, ConfigPaths, OutputFormat, resolve_config, resolve_token};
use questlink::logging::{self, LoggingConfig};
use questlink::notifications::api::NotificationsApi;
use questlink::notifications::{Category, NotificationFilter};

fn main() {
    let cli = Cli::parse();
    let mut human = cli.human_readable;

    let result = ConfigPaths::discover().and_then(|paths| {
        // A broken config file is reported by the command itself.
        let file = paths.read_config().unwrap_or_default();
        if !human && file.output_format == Some(OutputFormat::Human) {
            human = true;
        }
        let _guard = logging::init(&LoggingConfig {
            verbosity: cli.verbose,
            format: file.log_format.unwrap_or_default(),
            file: cli.log_file.clone(),
        });
        run_command(cli, &paths, human)
    });

    if let Err(e) = result {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

fn run_command(cli: Cli, paths: &ConfigPaths, human: bool) -> Result<(), questlink::Error> {
    let mut overrides = ConfigOverrides::new();
    overrides.host = cli.host;
    overrides.port = cli.port;
    if human {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    let cli_token = cli.token;

    match cli.command {
        Commands::Listen { groups, max_frames } => {
            let config = resolve_config(paths, &overrides)?;
            let token = require_token(paths, cli_token.as_deref())?;
            let summary = block_on(commands::live::listen(
                config.client_settings(),
                token,
                groups,
                max_frames,
                human,
                ctrl_c(),
            ))?;
            output(&summary, human);
        }

        Commands::Send { kind, data, group } => {
            let frame = commands::live::build_frame(&kind, data.as_deref(), group.as_deref())?;
            let config = resolve_config(paths, &overrides)?;
            let token = require_token(paths, cli_token.as_deref())?;
            let report = block_on(commands::live::send(config.client_settings(), token, frame))?;
            output(&report, human);
        }

        Commands::Ping { timeout } => {
            let config = resolve_config(paths, &overrides)?;
            let token = require_token(paths, cli_token.as_deref())?;
            let report = block_on(commands::live::ping(
                config.client_settings(),
                token,
                Duration::from_secs(timeout),
            ))?;
            output(&report, human);
        }

        Commands::Notifications { command } => {
            let config = resolve_config(paths, &overrides)?;
            let token = resolve_token(paths, cli_token.as_deref())?.map(|t| t.value().to_string());
            let api = NotificationsApi::new(config.api_base(), token);
            match command {
                NotificationCommands::List {
                    page,
                    limit,
                    unread,
                    category,
                } => {
                    let category = match category {
                        Some(raw) => Some(Category::parse(&raw).ok_or_else(|| {
                            questlink::Error::InvalidInput(format!("unknown category '{}'", raw))
                        })?),
                        None => None,
                    };
                    let filter = NotificationFilter {
                        category,
                        is_read: unread.then_some(false),
                        ..Default::default()
                    };
                    let list = block_on(commands::notifications::list(&api, page, limit, &filter))?;
                    output(&list, human);
                }
                NotificationCommands::Stats => {
                    let stats = block_on(commands::notifications::stats(&api))?;
                    output(&stats, human);
                }
                NotificationCommands::Read { id } => {
                    let done = block_on(commands::notifications::apply(&api, Action::Read(id)))?;
                    output(&done, human);
                }
                NotificationCommands::ReadAll => {
                    let done = block_on(commands::notifications::apply(&api, Action::ReadAll))?;
                    output(&done, human);
                }
                NotificationCommands::Dismiss { id } => {
                    let done = block_on(commands::notifications::apply(&api, Action::Dismiss(id)))?;
                    output(&done, human);
                }
                NotificationCommands::DismissAll => {
                    let done =
                        block_on(commands::notifications::apply(&api, Action::DismissAll))?;
                    output(&done, human);
                }
                NotificationCommands::Delete { id } => {
                    let done = block_on(commands::notifications::apply(&api, Action::Delete(id)))?;
                    output(&done, human);
                }
            }
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                output(&commands::config::config_show(paths, &overrides)?, human)
            }
            ConfigCommands::Set { key, value } => {
                output(&commands::config::config_set(paths, &key, &value)?, human)
            }
        },

        Commands::Token { command } => match command {
            TokenCommands::Set { value } => {
                output(&commands::token::token_set(paths, &value)?, human)
            }
            TokenCommands::Clear => output(&commands::token::token_clear(paths)?, human),
            TokenCommands::Show => output(
                &commands::token::token_show(paths, cli_token.as_deref())?,
                human,
            ),
        },
    }

    Ok(())
}

fn require_token(paths: &ConfigPaths, cli: Option<&str>) -> Result<String, questlink::Error> {
    resolve_token(paths, cli)?
        .map(|t| t.value().to_string())
        .ok_or(questlink::Error::MissingToken)
}

/// Run a future on a single-threaded runtime. The notification client is
/// driven from one task and is not `Send`.
fn block_on<T>(
    future: impl Future<Output = Result<T, questlink::Error>>,
) -> Result<T, questlink::Error> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| questlink::Error::Other(format!("Failed to create runtime: {}", e)))?
        .block_on(future)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
