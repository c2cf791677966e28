use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use rpc_mux::rpc::VERSION;

#[derive(Parser)]
#[command(name = "rpc-cli")]
#[command(about = "Client CLI for the JSON-RPC server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "/rpc/v1/")]
    path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a single method
    Call {
        method: String,
        /// Params as JSON (e.g. '{"Text":"hi"}')
        #[arg(long)]
        params: Option<String>,
        #[arg(long, default_value_t = 1)]
        id: u64,
        /// Send without an id
        #[arg(long)]
        notify: bool,
    },
    /// Send a raw batch (a JSON array of request objects)
    Batch { payload: String },
    /// Check the server's health endpoint
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let endpoint = format!("{}{}", cli.url.trim_end_matches('/'), cli.path);

    match cli.command {
        Commands::Call { method, params, id, notify } => {
            let mut request = json!({ "jsonrpc": VERSION, "method": method });
            if let Some(params) = params {
                request["params"] = serde_json::from_str::<Value>(&params)?;
            }
            if !notify {
                request["id"] = json!(id);
            }
            let res = client.post(&endpoint).json(&request).send().await?;
            print_response(res).await?;
        }
        Commands::Batch { payload } => {
            let batch: Value = serde_json::from_str(&payload)?;
            let res = client.post(&endpoint).json(&batch).send().await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url.trim_end_matches('/'))).send().await?;
            println!("{}", res.status());
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
