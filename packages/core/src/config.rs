use std::env;

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub messenger_url: String,
    pub operator_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is required")?;

        let bind_addr =
            env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let messenger_url =
            env::var("MESSENGER_URL").map_err(|_| "MESSENGER_URL is required")?;

        let operator_api_key =
            env::var("OPERATOR_API_KEY").map_err(|_| "OPERATOR_API_KEY is required")?;

        Ok(Self {
            database_url,
            bind_addr,
            messenger_url,
            operator_api_key,
        })
    }

    /// CLI flags win over environment variables.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind {
            self.bind_addr = bind.clone();
        }
        if let Some(database_url) = &cli.database_url {
            self.database_url = database_url.clone();
        }
        if let Some(messenger_url) = &cli.messenger_url {
            self.messenger_url = messenger_url.clone();
        }
    }
}
