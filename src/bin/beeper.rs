//! Command-line client for the Beeper Desktop API.
//!
//! # Usage
//!
//! ```bash
//! # List chats as text
//! beeper --output text chats list
//!
//! # Read the last 50 messages of a chat
//! beeper messages list --chat-id '!abc:beeper.com' --limit 50
//!
//! # Send a message
//! beeper send --chat-id '!abc:beeper.com' --message "On my way"
//!
//! # Search across all chats, errors as JSON
//! beeper --json-errors search dinner plans
//! ```
//!
//! # Exit codes
//!
//! - 0: success
//! - 1: user or application error (bad arguments, missing resources, permission denied)
//! - 2: system or network error (connection failed, timeout, server error)

use std::process::ExitCode;

use arrrg::CommandLine;
use tracing_subscriber::EnvFilter;

use beeper_cli::client::{BeeperClient, discover, discovery_candidates};
use beeper_cli::config::{
    self, Args, Config, ConfigLayer, DEFAULT_LIMIT, ENV_TOKEN, OutputFormat,
};
use beeper_cli::render::{
    render_chat, render_chats, render_error, render_messages, render_send_result,
};
use beeper_cli::update::{UpdateChecker, format_update_notice};
use beeper_cli::{Error, Result, VERSION};

const USAGE: &str = "beeper [OPTIONS] <COMMAND> [ARGS]...";

const COMMANDS: &str = "\
Commands:
  chats list                      List chats
  chats get <CHAT_ID>             Show one chat
  messages list --chat-id ID      List messages in a chat (--limit N)
  send --chat-id ID --message T   Send a message
  search <QUERY>...               Search messages (--limit N)
  ping                            Check that the API is reachable
  discover                        Find the API on common local ports
  info                            Show CLI, config and connectivity details
  config show                     Show the effective configuration
  config set-url <URL>            Persist the API URL
  config set-format <FORMAT>      Persist the output format (json, text, markdown)
  version                         Print version information

Environment:
  BEEPER_TOKEN           API token sent as a bearer token
  BEEPER_API_URL         Override the configured API URL
  BEEPER_OUTPUT_FORMAT   Override the configured output format
  BEEPER_LOG             Log filter for diagnostics on stderr (default: warn)
";

/// Main entry point for the beeper command-line tool.
#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let (args, words) = Args::from_command_line_relaxed(USAGE);
    let quiet = args.quiet;
    let json_errors = args.json_errors;

    let command = words.first().map(String::as_str).unwrap_or("help");
    let update = if quiet || matches!(command, "version" | "help") {
        None
    } else {
        Some(UpdateChecker::new(VERSION).spawn())
    };

    match run(&args, &words).await {
        Ok(()) => {
            if let Some(info) = update.and_then(|handle| handle.try_take()) {
                if let Some(notice) = format_update_notice(&info) {
                    eprint!("{notice}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprint!("{}", render_error(&err, json_errors, quiet));
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("BEEPER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Loads the file and environment layers and applies the flags on top.
fn load_config(args: &Args) -> Result<Config> {
    let file = match config::config_path() {
        Some(path) => config::load_config_file(&path)?,
        None => ConfigLayer::default(),
    };
    Ok(config::resolve(&file, &ConfigLayer::from_env(), &args.overrides()))
}

fn token() -> Option<String> {
    std::env::var(ENV_TOKEN).ok().filter(|t| !t.is_empty())
}

async fn run(args: &Args, words: &[String]) -> Result<()> {
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    match words.as_slice() {
        [] | ["help"] => {
            println!("Usage: {USAGE}\n\n{COMMANDS}");
            Ok(())
        }
        ["version"] => {
            print_version();
            Ok(())
        }
        ["config", rest @ ..] => run_config(args, rest),
        _ => {
            let config = load_config(args)?;
            config.validate()?;
            let client = BeeperClient::new(&config, token())?;
            run_api(args, &words, &config, &client).await
        }
    }
}

async fn run_api(
    args: &Args,
    words: &[&str],
    config: &Config,
    client: &BeeperClient,
) -> Result<()> {
    let format = config.format();
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT);
    let chat_id = args.chat_id.as_deref().unwrap_or_default();
    match words {
        ["chats", "list"] => {
            let chats = client.list_chats().await?.into_payload();
            print!("{}", render_chats(&chats, &format));
        }
        ["chats", "get", id] => {
            let chat = client.get_chat(id).await?.into_payload();
            print!("{}", render_chat(&chat, &format));
        }
        ["chats", "get"] => {
            return Err(usage_error("chats get requires a chat ID"));
        }
        ["messages", "list"] => {
            let messages = client.list_messages(chat_id, limit).await?.into_payload();
            print!("{}", render_messages(&messages, &format));
        }
        ["send"] => {
            let text = args.message.as_deref().unwrap_or_default();
            let result = client.send_message(chat_id, text).await?.into_payload();
            print!("{}", render_send_result(&result, &format)?);
        }
        ["search", query @ ..] => {
            let query = query.join(" ");
            let messages = client.search_messages(&query, limit).await?.into_payload();
            print!("{}", render_messages(&messages, &format));
        }
        ["ping"] => {
            let resp = client.ping().await?;
            println!("API is reachable at {}", client.base_url());
            if let Some(version) = resp.desktop_version {
                println!("Beeper Desktop version: {version}");
            }
        }
        ["discover"] => {
            let url = discover(discovery_candidates()).await?;
            println!("Found Beeper Desktop API at {url}");
            if url != config.api_url && !args.quiet {
                println!("\nHint: Run 'beeper config set-url {url}' to use it by default.");
            }
        }
        ["info"] => run_info(args, config, client).await,
        _ => {
            return Err(usage_error(format!("unknown command: {}", words.join(" "))));
        }
    }
    Ok(())
}

fn usage_error(message: impl Into<String>) -> Error {
    Error::validation(message).with_hint(format!(
        "Usage: {USAGE}. Run 'beeper help' to list commands."
    ))
}

fn run_config(args: &Args, words: &[&str]) -> Result<()> {
    let path = config::config_path()
        .ok_or_else(|| Error::config("could not determine home directory"))?;
    match words {
        ["show"] | [] => {
            let config = load_config(args)?;
            println!("Config File:   {}", path.display());
            println!("API URL:       {}", config.api_url);
            println!("Output Format: {}", config.output_format);
        }
        ["set-url", url] => {
            let update = ConfigLayer {
                api_url: Some(url.to_string()),
                output_format: None,
            };
            let saved = config::update_config_file(&path, &update)?;
            println!("API URL set to: {}", saved.api_url.unwrap_or_default());
        }
        ["set-format", format] => {
            let format: OutputFormat = format.parse()?;
            let update = ConfigLayer {
                api_url: None,
                output_format: Some(format.to_string()),
            };
            config::update_config_file(&path, &update)?;
            println!("Output format set to: {format}");
        }
        _ => {
            return Err(usage_error(format!("unknown config command: {}", words.join(" "))));
        }
    }
    Ok(())
}

fn print_version() {
    println!("beeper-api-cli version {VERSION}");
    println!("  OS/Arch:    {}/{}", std::env::consts::OS, std::env::consts::ARCH);
    if let Some(path) = config::config_path() {
        println!("  Config:     {}", path.display());
    }
}

async fn run_info(args: &Args, config: &Config, client: &BeeperClient) {
    println!("Beeper API CLI Information");
    println!("==========================\n");
    println!("Version:        {VERSION}");
    println!(
        "Platform:       {}/{}\n",
        std::env::consts::OS,
        std::env::consts::ARCH
    );

    println!("Configuration");
    println!("-------------");
    match config::config_path() {
        Some(path) => {
            println!("Config File:    {}", path.display());
            if !path.exists() {
                println!("                (not created yet, using defaults)");
            }
        }
        None => println!("Config File:    (no home directory)"),
    }
    println!("API URL:        {}", config.api_url);
    println!("Output Format:  {}\n", config.output_format);

    println!("Authentication");
    println!("--------------");
    match token() {
        Some(token) => println!("{ENV_TOKEN}:   Set ({})", mask_token(&token)),
        None => {
            println!("{ENV_TOKEN}:   Not set");
            println!("                (Set this environment variable to authenticate API requests)");
        }
    }
    println!();

    println!("API Connectivity");
    println!("----------------");
    match client.ping().await {
        Ok(resp) => {
            println!("Status:         Connected");
            if let Some(version) = resp.desktop_version {
                println!("Desktop Ver:    {version}");
            }
        }
        Err(err) => {
            println!("Status:         Unreachable");
            println!("Error:          {err}");
            if !args.quiet {
                println!("\nHint: Make sure Beeper Desktop is running and the API is enabled.");
                println!("      Try 'beeper discover' to find the API endpoint.");
            }
        }
    }

    if args.test_permissions {
        println!("\nPermission Test");
        println!("---------------");
        let read = client.list_chats().await.map(|_| ());
        println!("Read (list chats):  {}", describe_outcome(&read));
        let search = client.search_messages("test", 1).await.map(|_| ());
        println!("Search messages:    {}", describe_outcome(&search));
        println!("\nNote: Write permissions cannot be tested without making actual changes.");
    }
}

fn describe_outcome(outcome: &Result<()>) -> String {
    match outcome {
        Ok(()) => "OK".to_string(),
        Err(err) if err.is_auth() => "FAILED - Authentication required".to_string(),
        Err(err) if err.is_permission() => "FAILED - Insufficient permissions".to_string(),
        Err(err) if err.is_network() => "FAILED - Network error".to_string(),
        Err(err) => format!("FAILED - {}", err.message()),
    }
}

/// Masks all but the first and last four characters of a token.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_masking() {
        assert_eq!(mask_token("short"), "****");
        assert_eq!(mask_token("abcdefghijkl"), "abcd...ijkl");
    }

    #[test]
    fn outcome_descriptions() {
        assert_eq!(describe_outcome(&Ok(())), "OK");
        assert_eq!(
            describe_outcome(&Err(Error::auth("no"))),
            "FAILED - Authentication required"
        );
        assert_eq!(
            describe_outcome(&Err(Error::permission("scope"))),
            "FAILED - Insufficient permissions"
        );
        assert_eq!(
            describe_outcome(&Err(Error::network("down"))),
            "FAILED - Network error"
        );
        assert_eq!(
            describe_outcome(&Err(Error::not_found("gone"))),
            "FAILED - gone"
        );
    }
}
