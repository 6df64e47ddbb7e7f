use std::collections::HashMap;

use anyhow::{bail, Result};

/// Full application configuration.
/// Everything comes from the process environment, falling back to `.env`.
#[derive(Debug, Clone)]
pub struct Config {
    // Knowledge base (Weaviate)
    pub knowledge_base_endpoint: String,
    pub knowledge_base_api_key: String,
    /// Forwarded to the knowledge base for query vectorization.
    pub knowledge_base_openai_key: String,

    // Chat model
    /// "azure" (default) or "ollama".
    pub backend: String,
    /// Deployment URL, e.g. `https://<hub>.openai.azure.com/openai/deployments/gpt-4o`.
    pub azure_endpoint: String,
    pub azure_api_key: String,
    pub azure_api_version: String,
    pub ollama_url: String,
    pub ollama_model: String,

    // Legal database
    pub legal_db_base_url: String,
    /// Search results and articles each kept in memory, per cache.
    pub legal_db_cache_entries: usize,

    // Agent lifecycle
    pub agent_turn_delay_s: u64,
    pub agent_throttle_backoff_s: u64,
    pub agent_max_tool_rounds: u32,
    pub agent_max_continuations: u32,
    pub agent_timeout_s: u64,
    pub max_concurrent_runs: u32,

    // Web
    pub web_bind: String,
    pub web_port: u16,
}

fn parse_dotenv() -> HashMap<String, String> {
    match std::fs::read_to_string(".env") {
        Ok(contents) => parse_dotenv_str(&contents),
        Err(_) => HashMap::new(),
    }
}

/// Parse `KEY=VALUE` lines, ignoring blanks and `#` comments.
/// Values may be wrapped in single or double quotes.
pub fn parse_dotenv_str(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .or_else(|| v.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
                .unwrap_or(v);
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get(key: &str, vars: &HashMap<String, String>) -> Option<String> {
    vars.get(key).cloned()
}

fn get_str(key: &str, vars: &HashMap<String, String>, default: &str) -> String {
    get(key, vars).unwrap_or_else(|| default.to_string())
}

fn get_u32(key: &str, vars: &HashMap<String, String>, default: u32) -> u32 {
    get(key, vars)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u64(key: &str, vars: &HashMap<String, String>, default: u64) -> u64 {
    get(key, vars)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u16(key: &str, vars: &HashMap<String, String>, default: u16) -> u16 {
    get(key, vars)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from `.env` overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut vars = parse_dotenv();
        vars.extend(std::env::vars());
        Self::from_map(&vars)
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        let backend = get_str("BACKEND", vars, "azure").to_lowercase();
        if backend != "azure" && backend != "ollama" {
            bail!("unknown BACKEND {backend:?}; expected \"azure\" or \"ollama\"");
        }

        Ok(Config {
            knowledge_base_endpoint: get_str("OPENPAWS_KNOWLEDGE_BASE_REST_ENDPOINT", vars, ""),
            knowledge_base_api_key: get_str("OPENPAWS_KNOWLEDGE_BASE_READONLY_API_KEY", vars, ""),
            knowledge_base_openai_key: get_str("OPENPAWS_OPEN_AI_KEY", vars, ""),
            backend,
            azure_endpoint: get_str("AZURE_OPENAI_ENDPOINT", vars, ""),
            azure_api_key: get_str("AZURE_OPENAI_KEY", vars, ""),
            azure_api_version: get_str("AZURE_OPENAI_API_VERSION", vars, "2024-08-01-preview"),
            ollama_url: get_str("OLLAMA_URL", vars, "http://localhost:11434"),
            ollama_model: get_str("OLLAMA_MODEL", vars, "llama3.1"),
            legal_db_base_url: get_str("LEGAL_DB_BASE_URL", vars, "https://www.animallaw.info"),
            legal_db_cache_entries: get_u32("LEGAL_DB_CACHE_ENTRIES", vars, 256).max(1) as usize,
            agent_turn_delay_s: get_u64("AGENT_TURN_DELAY_S", vars, 5),
            agent_throttle_backoff_s: get_u64("AGENT_THROTTLE_BACKOFF_S", vars, 40),
            agent_max_tool_rounds: get_u32("AGENT_MAX_TOOL_ROUNDS", vars, 25),
            agent_max_continuations: get_u32("AGENT_MAX_CONTINUATIONS", vars, 8),
            agent_timeout_s: get_u64("AGENT_TIMEOUT_S", vars, 300),
            max_concurrent_runs: get_u32("MAX_CONCURRENT_RUNS", vars, 2).max(1),
            web_bind: get_str("WEB_BIND", vars, "127.0.0.1"),
            web_port: get_u16("WEB_PORT", vars, 8501),
        })
    }

    /// Names of required settings that are empty for the selected backend.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.backend == "azure" {
            if self.azure_endpoint.is_empty() {
                missing.push("AZURE_OPENAI_ENDPOINT");
            }
            if self.azure_api_key.is_empty() {
                missing.push("AZURE_OPENAI_KEY");
            }
        }
        if self.knowledge_base_endpoint.is_empty() {
            missing.push("OPENPAWS_KNOWLEDGE_BASE_REST_ENDPOINT");
        }
        if self.knowledge_base_api_key.is_empty() {
            missing.push("OPENPAWS_KNOWLEDGE_BASE_READONLY_API_KEY");
        }
        missing
    }

    /// Fail if the selected chat backend cannot be reached without credentials.
    /// Knowledge-base gaps only degrade the lookup tools, so they are not fatal.
    pub fn validate_for_backend(&self) -> Result<()> {
        let fatal: Vec<&str> = self
            .missing_credentials()
            .into_iter()
            .filter(|k| k.starts_with("AZURE_"))
            .collect();
        if !fatal.is_empty() {
            bail!("missing configuration for backend {}: {}", self.backend, fatal.join(", "));
        }
        Ok(())
    }
}
