use crate::config::{Config, EmptySourcesPolicy, ProviderConfig};
use crate::llm::client::{LlmError, ProviderKind};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.output_path, PathBuf::from("./data/outputs"));
    assert_eq!(config.llm.provider, "claude");
    assert_eq!(config.llm.max_tokens, 4000);
    assert_eq!(config.llm.temperature, 0.7);
    assert_eq!(config.fetch.per_url_timeout_secs, 10);
    assert_eq!(config.fetch.max_content_length, 5000);
    assert_eq!(config.fetch.max_download_bytes, 5 * 1024 * 1024);
    assert_eq!(config.research.max_sources, 5);
    assert_eq!(
        config.research.empty_sources_policy,
        EmptySourcesPolicy::Abort
    );
    assert!(config.research.framework_path.is_none());
    assert!(!config.verbose);
}

#[test]
fn test_provider_kind_parsing_is_exact() {
    let config = ProviderConfig {
        provider: "gemini".to_string(),
        ..ProviderConfig::default()
    };
    assert_eq!(config.kind().unwrap(), ProviderKind::Gemini);

    for provider in ["Gemini", " gemini", "anthropic", ""] {
        let config = ProviderConfig {
            provider: provider.to_string(),
            ..ProviderConfig::default()
        };
        assert_eq!(
            config.kind(),
            Err(LlmError::UnknownProvider(provider.to_string()))
        );
    }
}

#[test]
fn test_provider_defaults_per_kind() {
    let config = ProviderConfig::default();

    assert_eq!(config.model_for(ProviderKind::Claude), "claude-sonnet-4-20250514");
    assert_eq!(config.model_for(ProviderKind::Ollama), "llama2");
    assert_eq!(
        config.api_key_ref_for(ProviderKind::OpenAI).as_deref(),
        Some("OPENAI_API_KEY")
    );
    assert!(config.api_key_ref_for(ProviderKind::Ollama).is_none());
    assert_eq!(
        config.base_url_for(ProviderKind::Ollama),
        "http://localhost:11434"
    );
    assert_eq!(
        config.request_timeout_for(ProviderKind::Claude),
        Duration::from_secs(60)
    );
    assert_eq!(
        config.request_timeout_for(ProviderKind::Ollama),
        Duration::from_secs(120)
    );
}

#[test]
fn test_provider_overrides() {
    let config = ProviderConfig {
        provider: "ollama".to_string(),
        model: Some("mistral:7b".to_string()),
        base_url: Some("http://gpu-box:11434/".to_string()),
        timeout_seconds: Some(30),
        ..ProviderConfig::default()
    };

    assert_eq!(config.model_for(ProviderKind::Ollama), "mistral:7b");
    assert_eq!(config.base_url_for(ProviderKind::Ollama), "http://gpu-box:11434");
    assert_eq!(
        config.request_timeout_for(ProviderKind::Ollama),
        Duration::from_secs(30)
    );
}

#[test]
fn test_resolve_api_key() {
    let inline = ProviderConfig {
        api_key: Some("sk-inline".to_string()),
        api_key_ref: Some("RESEARCH_PILOT_TEST_UNSET_KEY".to_string()),
        ..ProviderConfig::default()
    };
    assert_eq!(
        inline.resolve_api_key(ProviderKind::Claude).as_deref(),
        Some("sk-inline")
    );

    let blank = ProviderConfig {
        api_key: Some("   ".to_string()),
        api_key_ref: Some("RESEARCH_PILOT_TEST_UNSET_KEY".to_string()),
        ..ProviderConfig::default()
    };
    assert!(blank.resolve_api_key(ProviderKind::Claude).is_none());
}

#[test]
fn test_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("research-pilot.toml");
    std::fs::write(
        &path,
        r#"
output_path = "./reports"
verbose = true

[llm]
provider = "openai"
model = "gpt-4o"
api_key_ref = "TEAM_OPENAI_KEY"
temperature = 0.2

[fetch]
per_url_timeout_secs = 5
max_concurrent_fetches = 8

[research]
max_sources = 3
empty_sources_policy = "proceed"
framework_path = "docs/framework.md"
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.output_path, PathBuf::from("./reports"));
    assert!(config.verbose);
    assert_eq!(config.llm.provider, "openai");
    assert_eq!(config.llm.model.as_deref(), Some("gpt-4o"));
    assert_eq!(config.llm.api_key_ref.as_deref(), Some("TEAM_OPENAI_KEY"));
    assert_eq!(config.llm.temperature, 0.2);
    // 未出现的字段保持默认值
    assert_eq!(config.llm.max_tokens, 4000);
    assert_eq!(config.fetch.per_url_timeout(), Duration::from_secs(5));
    assert_eq!(config.fetch.max_concurrent_fetches, 8);
    assert_eq!(config.fetch.max_content_length, 5000);
    assert_eq!(config.research.max_sources, 3);
    assert_eq!(
        config.research.empty_sources_policy,
        EmptySourcesPolicy::Proceed
    );
    assert_eq!(
        config.research.framework_path,
        Some(PathBuf::from("docs/framework.md"))
    );
}

#[test]
fn test_config_from_file_rejects_invalid_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[llm\nprovider = ").unwrap();

    assert!(Config::from_file(&path).is_err());
    assert!(Config::from_file(&temp_dir.path().join("missing.toml")).is_err());
}
