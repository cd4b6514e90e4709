use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where workspaces, clones and diagrams are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Repository opened at startup
    pub repo_path: Option<PathBuf>,
    /// Diagram renderer settings
    pub renderer: RendererConfig,
    /// LLM provider configuration. `None` disables embeddings and answers.
    pub llm: Option<LlmConfig>,
    /// Timeout for `git log` and other git subprocesses
    pub git_timeout_secs: u64,
    /// Clone timeout in seconds
    pub clone_timeout_secs: u64,
    /// Git personal access token for cloning private repos
    pub git_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Path to the PlantUML jar
    pub plantuml_jar: PathBuf,
    /// Java executable used to run the jar
    pub java_bin: String,
    /// File extensions recognised as diagram sources (without the dot)
    pub source_extensions: Vec<String>,
    /// Render timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            plantuml_jar: PathBuf::from("./plantuml.jar"),
            java_bin: "java".to_string(),
            source_extensions: vec!["plantuml".to_string(), "puml".to_string()],
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer synthesis. `None` disables answers.
    pub chat_model: Option<String>,
    /// Model name for embeddings. `None` disables vector retrieval.
    pub embedding_model: Option<String>,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:3001".to_string(),
            repo_path: None,
            renderer: RendererConfig::default(),
            llm: None,
            git_timeout_secs: 30,
            clone_timeout_secs: 300,
            git_token: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: Some("llama3.2".to_string()),
            embedding_model: Some("nomic-embed-text".to_string()),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = get("DECISION_GRAPH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = get("DECISION_GRAPH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(path) = get("REPO_PATH").filter(|p| !p.trim().is_empty()) {
            config.repo_path = Some(PathBuf::from(path));
        }
        if let Some(jar) = get("PLANTUML_JAR") {
            config.renderer.plantuml_jar = PathBuf::from(jar);
        }
        if let Some(java) = get("JAVA_BIN") {
            config.renderer.java_bin = java;
        }
        if let Some(exts) = get("DIAGRAM_EXTENSIONS") {
            let parsed: Vec<String> = exts
                .split(',')
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.renderer.source_extensions = parsed;
            }
        }
        if let Some(v) = get("RENDER_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.renderer.timeout_secs = v;
        }
        if let Some(v) = get("GIT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.git_timeout_secs = v;
        }
        if let Some(v) = get("CLONE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.clone_timeout_secs = v;
        }
        if let Some(token) = get("DECISION_GRAPH_GIT_TOKEN") {
            config.git_token = Some(token);
        }

        // The LLM integration is opt-in: without a provider or base URL there
        // are no embeddings and no synthesized answers.
        let provider = get("LLM_PROVIDER");
        let base_url = get("LLM_BASE_URL");
        if provider.is_some() || base_url.is_some() {
            let mut llm = LlmConfig::default();
            if let Some(provider) = provider {
                llm.provider = provider;
            }
            if let Some(url) = base_url {
                llm.base_url = url.trim_end_matches('/').to_string();
            }
            if let Some(model) = get("LLM_CHAT_MODEL") {
                llm.chat_model = non_empty(model);
            }
            if let Some(model) = get("LLM_EMBEDDING_MODEL") {
                llm.embedding_model = non_empty(model);
            }
            if let Some(key) = get("LLM_API_KEY") {
                llm.api_key = non_empty(key);
            }
            if let Some(v) = get("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
                llm.timeout_secs = v;
            }
            config.llm = Some(llm);
        }

        config
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.data_dir.join("repos")
    }

    pub fn workspaces_dir(&self) -> PathBuf {
        self.data_dir.join("workspaces")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
