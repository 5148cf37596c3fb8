use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "onboard-cli")]
#[command(about = "Admin CLI for the Onboard Hero API", long_about = None)]
struct Cli {
    #[arg(short, long, env = "ONBOARD_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Access token of an admin (or higher) account.
    #[arg(short, long, env = "ONBOARD_TOKEN")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service status and configured integrations
    Status,
    /// Show organization analytics
    Analytics {
        /// Another organization (requires global admin)
        #[arg(long)]
        organization: Option<String>,
    },
    /// Change a user's role
    SetRole {
        user_id: String,
        /// One of: user, admin, owner, global_admin
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", cli.token))?);

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/api/admin/status", base)),
        Commands::Analytics { organization } => {
            let mut req = client.get(format!("{}/api/admin/analytics", base));
            if let Some(org) = organization {
                req = req.query(&[("organizationId", org)]);
            }
            req
        }
        Commands::SetRole { user_id, role } => client
            .patch(format!("{}/api/admin/users/{}/role", base, user_id))
            .json(&json!({ "role": role })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        let message = body["error"]["message"].as_str().unwrap_or("no error message");
        eprintln!("Error: API returned {}: {}", status, message);
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&body["data"])?);
    Ok(())
}
