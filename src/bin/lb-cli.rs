use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "lb-cli")]
#[command(about = "Management CLI for the TCP load balancer", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check balancer status
    Status,
    /// List backend health and active connections
    Backends,
    /// Show the latest pool snapshot
    Snapshot,
    /// Show recent telemetry records
    Events {
        /// Number of most recent records to fetch
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

impl Commands {
    fn path(&self) -> String {
        match self {
            Commands::Status => "/admin/status".to_string(),
            Commands::Backends => "/admin/backends".to_string(),
            Commands::Snapshot => "/admin/snapshot".to_string(),
            Commands::Events { limit } => format!("/admin/events?limit={}", limit),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
