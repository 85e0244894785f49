use clap::{Args, Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "hunt-cli")]
#[command(about = "Command-line client for the Hunt API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:4000")]
    url: String,

    /// Bearer token from `login`.
    #[arg(short, long, env = "HUNT_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Health,
    /// Exchange email and password for an authentication token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Activate a freshly registered user
    Activate {
        #[arg(long)]
        token: String,
    },
    /// Work with companies
    #[command(subcommand)]
    Company(CompanyCommand),
}

#[derive(Subcommand)]
enum CompanyCommand {
    /// Show one company
    Get { id: i64 },
    /// Create a company
    Create(CompanyFields),
    /// Change some fields of a company
    Patch {
        id: i64,
        #[command(flatten)]
        fields: CompanyFields,
    },
    /// Delete a company
    Delete { id: i64 },
}

#[derive(Args)]
struct CompanyFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    url: Option<String>,
    /// Repeat for each technology
    #[arg(long = "tech")]
    tech_stack: Vec<String>,
}

impl CompanyFields {
    fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(name) = &self.name {
            body.insert("name".into(), json!(name));
        }
        if let Some(url) = &self.url {
            body.insert("url".into(), json!(url));
        }
        if !self.tech_stack.is_empty() {
            body.insert("tech_stack".into(), json!(self.tech_stack));
        }
        Value::Object(body)
    }
}

struct Api {
    client: reqwest::Client,
    base: String,
    headers: HeaderMap,
}

impl Api {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base))
            .headers(self.headers.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    }
    let api = Api {
        client: reqwest::Client::new(),
        base: cli.url.trim_end_matches('/').to_string(),
        headers,
    };

    let request = match cli.command {
        Commands::Health => api.request(Method::GET, "/health"),
        Commands::Login { email, password } => api
            .request(Method::POST, "/v1/login")
            .json(&json!({ "email": email, "password": password })),
        Commands::Activate { token } => api
            .request(Method::POST, "/v1/users/activate")
            .json(&json!({ "token": token })),
        Commands::Company(CompanyCommand::Get { id }) => {
            api.request(Method::GET, &format!("/v1/companies/{id}"))
        }
        Commands::Company(CompanyCommand::Create(fields)) => {
            api.request(Method::POST, "/v1/companies").json(&fields.to_json())
        }
        Commands::Company(CompanyCommand::Patch { id, fields }) => api
            .request(Method::PATCH, &format!("/v1/companies/{id}"))
            .json(&fields.to_json()),
        Commands::Company(CompanyCommand::Delete { id }) => {
            api.request(Method::DELETE, &format!("/v1/companies/{id}"))
        }
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: API returned status {status}");
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
