use anyhow::Context;
use crate::store::{StoreError, TableRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The organization's own mail domain, e.g. `example.com`
    pub org_domain: String,
    pub pending_log: PendingLogConfig,
    pub registry: RegistryConfig,
    /// Tab holding the routed rows inside every destination log
    #[serde(default = "default_destination_tab")]
    pub destination_tab: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval_seconds: u64,
    /// Fallback identity when none is given on the command line
    #[serde(default)]
    pub viewer_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingLogConfig {
    pub reference: String,
    #[serde(default = "default_pending_tab")]
    pub tab: String,
    #[serde(default = "default_from_column")]
    pub from_column: usize,
    #[serde(default = "default_to_column")]
    pub to_column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub reference: String,
    #[serde(default = "default_registry_tab")]
    pub tab: String,
    #[serde(default = "default_destination_column")]
    pub destination_column: usize,
    #[serde(default = "default_website_column")]
    pub website_column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local tables; only useful for demos and tests
    #[default]
    Memory,
    File {
        dir: String,
    },
    Sheets {
        api_base: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    pub api_base: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum MailConfig {
    /// Only log drafts and sends
    #[default]
    Log,
    Gmail {
        api_base: Option<String>,
    },
}

fn default_destination_tab() -> String {
    "Log".to_string()
}

fn default_pending_tab() -> String {
    "Email Logger".to_string()
}

fn default_registry_tab() -> String {
    "Info".to_string()
}

fn default_from_column() -> usize {
    3
}

fn default_to_column() -> usize {
    4
}

fn default_destination_column() -> usize {
    17
}

fn default_website_column() -> usize {
    18
}

fn default_schedule_interval() -> u64 {
    300
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-pro".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            org_domain: "example.com".to_string(),
            pending_log: PendingLogConfig {
                reference: "PENDING_LOG_SPREADSHEET_ID_GOES_HERE".to_string(),
                tab: default_pending_tab(),
                from_column: default_from_column(),
                to_column: default_to_column(),
            },
            registry: RegistryConfig {
                reference: "CLIENT_REGISTRY_SPREADSHEET_ID_GOES_HERE".to_string(),
                tab: default_registry_tab(),
                destination_column: default_destination_column(),
                website_column: default_website_column(),
            },
            destination_tab: default_destination_tab(),
            store: StoreConfig::default(),
            reply: ReplyConfig::default(),
            mail: MailConfig::default(),
            schedule_interval_seconds: default_schedule_interval(),
            viewer_email: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing configuration file {path}"))?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing configuration file {path}"))?;
        Ok(())
    }

    pub fn pending_table(&self) -> Result<TableRef, StoreError> {
        TableRef::resolve(&self.pending_log.reference, Some(&self.pending_log.tab))
    }

    pub fn registry_table(&self) -> Result<TableRef, StoreError> {
        TableRef::resolve(&self.registry.reference, Some(&self.registry.tab))
    }

    /// Problems that would stop a run; empty when the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let org = self.org_domain.trim();
        if org.is_empty() || !org.contains('.') {
            problems.push(format!("org_domain '{}' is not a domain", self.org_domain));
        }
        if org != org.to_lowercase() {
            problems.push("org_domain must be lowercase".to_string());
        }
        if let Err(e) = self.pending_table() {
            problems.push(format!("pending_log: {e}"));
        }
        if let Err(e) = self.registry_table() {
            problems.push(format!("registry: {e}"));
        }
        if self.pending_log.from_column == self.pending_log.to_column {
            problems.push("pending_log from_column and to_column must differ".to_string());
        }
        if self.registry.destination_column == self.registry.website_column {
            problems.push("registry destination_column and website_column must differ".to_string());
        }
        if self.destination_tab.trim().is_empty() {
            problems.push("destination_tab must not be empty".to_string());
        }
        if self.schedule_interval_seconds == 0 {
            problems.push("schedule_interval_seconds must be positive".to_string());
        }

        problems
    }
}
