//! agenda-cli — developer console for the Agenda booking assistant
//!
//! Posts messages to the webhook exactly as the messaging transport does
//! (form fields `From` and `Body`) and prints the text of the TwiML reply.
//!
//! # Subcommands
//! - `send <message> [--from <phone>]` — one turn
//! - `chat [--from <phone>]`           — read turns from stdin until EOF or `/sair`
//! - `status`                          — show server health

use std::io::{BufRead, Write};

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
const DEFAULT_WEBHOOK: &str = "/whatsapp";
const DEFAULT_FROM: &str = "whatsapp:+5511900000000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "agenda-cli",
    version,
    about = "Talk to the Agenda booking assistant from a terminal"
)]
struct Cli {
    /// Agenda HTTP server URL (overrides AGENDA_HTTP_URL env var)
    #[arg(long, env = "AGENDA_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Webhook path configured on the server
    #[arg(long, default_value = DEFAULT_WEBHOOK)]
    webhook: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Send {
        /// Message text
        message: String,

        /// Sender address, as the transport would format it
        #[arg(long, default_value = DEFAULT_FROM)]
        from: String,
    },

    /// Interactive conversation
    Chat {
        /// Sender address, as the transport would format it
        #[arg(long, default_value = DEFAULT_FROM)]
        from: String,
    },

    /// Show Agenda server status
    Status,
}

// ============================================================================
// TwiML reply
// ============================================================================

/// `<Response><Message>…</Message></Response>`
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename = "Response")]
pub struct TwimlResponse {
    #[serde(rename = "Message", default)]
    pub messages: Vec<String>,
}

/// Extract the reply text from a TwiML document.
pub fn parse_twiml(xml: &str) -> anyhow::Result<String> {
    let response: TwimlResponse = quick_xml::de::from_str(xml)?;
    Ok(response.messages.join("\n"))
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

/// POST one message to the webhook and return the reply text.
fn send_message(
    client: &reqwest::blocking::Client,
    url: &str,
    from: &str,
    message: &str,
) -> anyhow::Result<String> {
    let resp = client
        .post(url)
        .form(&[("From", from), ("Body", message)])
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        anyhow::bail!("server returned {}: {}", status, body);
    }

    parse_twiml(&resp.text()?)
}

fn do_send(url: &str, from: &str, message: &str) -> anyhow::Result<()> {
    let client = client()?;
    println!("{}", send_message(&client, url, from, message)?);
    Ok(())
}

fn do_chat(url: &str, from: &str) -> anyhow::Result<()> {
    let client = client()?;
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    eprintln!("Conversando como {} (\"/sair\" para encerrar)", from);
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim() == "/sair" {
            break;
        }

        match send_message(&client, url, from, line) {
            Ok(reply) => println!("{}\n", reply),
            Err(e) => eprintln!("agenda-cli: {}", e),
        }
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client()?;

    let url = format!("{}/health", server);
    let resp = client.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Agenda server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Backend:       {}", body["backend"].as_str().unwrap_or("?"));
            if let Some(pg) = body["postgresql"].as_str() {
                println!("PostgreSQL:    {}", pg);
            }
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("agenda-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("agenda-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Join the server URL and the webhook path with exactly one slash.
fn webhook_url(server: &str, webhook: &str) -> String {
    format!(
        "{}/{}",
        server.trim_end_matches('/'),
        webhook.trim_start_matches('/')
    )
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();
    let url = webhook_url(&server, &cli.webhook);

    let result = match cli.command {
        Commands::Send { message, from } => do_send(&url, &from, &message),
        Commands::Chat { from } => do_chat(&url, &from),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("agenda-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
