// ABOUTME: Template registry facade consumed by user interfaces
// ABOUTME: Lists templates and commands, renders, runs, cancels and imports templates

pub mod error;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

pub use error::{RegistryError, Result};

use crate::engine::{EngineEvent, ExecutionConfig, OutputChunk, RunId, RunManager, RunSnapshot};
use crate::parser::{
    template_from_command, Command, DocumentFormat, TemplateFile, TemplateParser, ValidationReport,
};
use crate::store::{hub_url, FavoritesStore, HttpFetcher, StoreError, TemplateFetcher, TemplateStore};
use crate::template::{InputValues, RenderedCommand, TemplateEngine};

/// Source of the single setting the registry consumes. The value is used
/// as given.
pub trait SettingsProvider: Send + Sync {
    fn hub_base_url(&self) -> String;
}

/// Settings fixed at construction
#[derive(Debug, Clone)]
pub struct StaticSettings {
    pub hub_base_url: String,
}

impl SettingsProvider for StaticSettings {
    fn hub_base_url(&self) -> String {
        self.hub_base_url.clone()
    }
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self {
            hub_base_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub command_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub variable_count: usize,
}

pub struct TemplateRegistry {
    store: TemplateStore,
    runs: RunManager,
    parser: TemplateParser,
    engine: TemplateEngine,
    settings: Arc<dyn SettingsProvider>,
    fetcher: Arc<dyn TemplateFetcher>,
    /// None when no home directory could be found
    favorites: Option<FavoritesStore>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new(ExecutionConfig::default(), Arc::new(StaticSettings::default()))
    }
}

impl TemplateRegistry {
    pub fn new(execution: ExecutionConfig, settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            store: TemplateStore::new(),
            runs: RunManager::new(execution),
            parser: TemplateParser::new(),
            engine: TemplateEngine::new(),
            settings,
            fetcher: Arc::new(HttpFetcher::new()),
            favorites: FavoritesStore::new().ok(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn TemplateFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_favorites_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.favorites = Some(FavoritesStore::with_dir(dir));
        self
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn runs(&self) -> &RunManager {
        &self.runs
    }

    // Templates

    pub async fn list_templates(&self) -> Vec<TemplateSummary> {
        self.store
            .list()
            .await
            .into_iter()
            .map(|(id, template)| TemplateSummary {
                id,
                name: template.name.clone(),
                description: template.description.clone(),
                version: template.version.clone(),
                author: template.author.clone(),
                command_count: template.cmds.len(),
            })
            .collect()
    }

    pub async fn list_commands(&self, template_id: &str) -> Result<Vec<CommandSummary>> {
        let template = self.store.require(template_id).await?;
        Ok(template
            .cmds
            .iter()
            .map(|cmd| CommandSummary {
                id: cmd.id.clone(),
                name: cmd.name.clone(),
                description: cmd.description.clone(),
                variable_count: cmd.variables.len(),
            })
            .collect())
    }

    pub async fn get_template(&self, template_id: &str) -> Result<Arc<TemplateFile>> {
        Ok(self.store.require(template_id).await?)
    }

    /// A copy of the command as loaded
    pub async fn get_command(&self, template_id: &str, command_id: &str) -> Result<Command> {
        let template = self.store.require(template_id).await?;
        template
            .get_command(command_id)
            .cloned()
            .ok_or_else(|| RegistryError::CommandNotFound {
                template_id: template_id.to_string(),
                command_id: command_id.to_string(),
            })
    }

    pub async fn load_template<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let (template_id, _) = self.store.load(path).await?;
        Ok(template_id)
    }

    pub async fn load_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<String>> {
        Ok(self.store.load_dir(dir).await?)
    }

    pub async fn save_template<P: AsRef<Path>>(&self, template_id: &str, destination: P) -> Result<()> {
        Ok(self.store.save_by_id(template_id, destination).await?)
    }

    pub async fn unload_template(&self, template_id: &str) -> bool {
        self.store.unload(template_id).await.is_some()
    }

    pub async fn import_from_url(&self, url: &str, template_id: &str) -> Result<Arc<TemplateFile>> {
        Ok(self
            .store
            .import(self.fetcher.as_ref(), url, template_id)
            .await?)
    }

    /// Import `path` relative to the configured hub base URL
    pub async fn import_from_hub(&self, path: &str, template_id: &str) -> Result<Arc<TemplateFile>> {
        let url = hub_url(&self.settings.hub_base_url(), path);
        info!("Importing '{}' from hub: {}", template_id, url);
        self.import_from_url(&url, template_id).await
    }

    /// Structural report for a document, registering nothing
    pub fn validate_document(&self, content: &str, format: DocumentFormat) -> Result<ValidationReport> {
        Ok(self.parser.check_string(content, format)?)
    }

    pub fn generate_template(&self, command_line: &str) -> Result<TemplateFile> {
        Ok(template_from_command(command_line)?)
    }

    // Favorites

    pub fn favorites(&self) -> Result<&FavoritesStore> {
        self.favorites.as_ref().ok_or_else(|| {
            StoreError::FavoritesDirUnavailable {
                reason: "cannot determine the home directory".to_string(),
            }
            .into()
        })
    }

    /// Keep the loaded template `template_id` as a favorite
    pub async fn save_favorite(&self, template_id: &str) -> Result<PathBuf> {
        let template = self.store.require(template_id).await?;
        Ok(self.favorites()?.save(&template).await?)
    }

    pub async fn list_favorites(&self) -> Result<Vec<TemplateFile>> {
        Ok(self.favorites()?.list().await?)
    }

    pub async fn get_favorite(&self, name: &str) -> Result<TemplateFile> {
        Ok(self.favorites()?.get(name).await?)
    }

    pub async fn update_favorite(&self, name: &str, template: &TemplateFile) -> Result<PathBuf> {
        Ok(self.favorites()?.update(name, template).await?)
    }

    pub async fn delete_favorite(&self, name: &str) -> Result<()> {
        Ok(self.favorites()?.delete(name).await?)
    }

    /// Register the favorite `name` under `template_id`
    pub async fn load_favorite(&self, name: &str, template_id: &str) -> Result<Arc<TemplateFile>> {
        let template = self.get_favorite(name).await?;
        Ok(self.store.insert(template_id.to_string(), template).await)
    }

    // Rendering and runs

    /// Preview without executing
    pub async fn render_command(
        &self,
        template_id: &str,
        command_id: &str,
        values: &InputValues,
    ) -> Result<RenderedCommand> {
        let command = self.get_command(template_id, command_id).await?;
        Ok(self.engine.render(&command, values)?)
    }

    pub async fn start_run(
        &self,
        template_id: &str,
        command_id: &str,
        values: &InputValues,
    ) -> Result<RunId> {
        let (run_id, _) = self
            .start_run_subscribed(template_id, command_id, values)
            .await?;
        Ok(run_id)
    }

    /// Start a run with an output subscription taken before the process starts
    pub async fn start_run_subscribed(
        &self,
        template_id: &str,
        command_id: &str,
        values: &InputValues,
    ) -> Result<(RunId, broadcast::Receiver<OutputChunk>)> {
        // Resolve against a snapshot so later reloads cannot affect this run
        let command = self.get_command(template_id, command_id).await?;
        Ok(self
            .runs
            .start_run_subscribed(template_id, &command, values)
            .await?)
    }

    pub async fn subscribe_output(&self, run_id: RunId) -> Result<broadcast::Receiver<OutputChunk>> {
        Ok(self.runs.subscribe_output(run_id).await?)
    }

    pub async fn latest_output(&self, run_id: RunId) -> Result<Option<OutputChunk>> {
        Ok(self.runs.latest_output(run_id).await?)
    }

    pub async fn cancel_run(&self, run_id: RunId) -> Result<RunSnapshot> {
        Ok(self.runs.cancel_run(run_id).await?)
    }

    pub async fn get_run_status(&self, run_id: RunId) -> Result<RunSnapshot> {
        Ok(self.runs.run_status(run_id).await?)
    }

    pub async fn wait_run(&self, run_id: RunId) -> Result<RunSnapshot> {
        Ok(self.runs.wait_run(run_id).await?)
    }

    pub async fn forget_run(&self, run_id: RunId) -> Result<RunSnapshot> {
        Ok(self.runs.forget_run(run_id).await?)
    }

    pub async fn list_runs(&self) -> Vec<RunSnapshot> {
        self.runs.list_runs().await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.runs.subscribe_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;
    use serde_json::json;
    use std::sync::Mutex;

    const NET: &str = r#"{
        "name": "Network",
        "cliq_template_version": "2.0",
        "cmds": [{
            "id": "ping",
            "name": "Ping",
            "command": "ping -c 1 {{target}}",
            "variables": [{"name": "target", "type": "string", "required": true}]
        }]
    }"#;

    struct RecordingFetcher {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl TemplateFetcher for RecordingFetcher {
        async fn fetch(&self, url: &str) -> store::Result<String> {
            if let Ok(mut urls) = self.urls.lock() {
                urls.push(url.to_string());
            }
            Ok(NET.to_string())
        }
    }

    async fn registry() -> TemplateRegistry {
        let registry = TemplateRegistry::default();
        registry
            .store()
            .load_str("net", NET, DocumentFormat::Json)
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let registry = registry().await;
        let templates = registry.list_templates().await;
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].id, "net");
        assert_eq!(templates[0].command_count, 1);

        let commands = registry.list_commands("net").await.unwrap();
        assert_eq!(commands[0].id, "ping");

        assert!(matches!(
            registry.get_command("net", "nope").await,
            Err(RegistryError::CommandNotFound { .. })
        ));
        assert!(registry.list_commands("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_render_preview() {
        let registry = registry().await;
        let values: InputValues = [("target".to_string(), json!("example.com"))].into();
        let rendered = registry.render_command("net", "ping", &values).await.unwrap();
        assert_eq!(rendered.display(), "ping -c 1 example.com");

        let err = registry
            .render_command("net", "ping", &InputValues::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.validation_failure().unwrap().missing_variables(),
            vec!["target"]
        );
    }

    #[tokio::test]
    async fn test_import_from_hub_joins_base_url() {
        let fetcher = Arc::new(RecordingFetcher {
            urls: Mutex::new(Vec::new()),
        });
        let settings = Arc::new(StaticSettings {
            hub_base_url: "http://hub.local/".to_string(),
        });
        let registry = TemplateRegistry::new(ExecutionConfig::default(), settings)
            .with_fetcher(fetcher.clone());

        registry
            .import_from_hub("/templates/net.json", "hub-net")
            .await
            .unwrap();

        assert_eq!(
            fetcher.urls.lock().unwrap().as_slice(),
            ["http://hub.local/templates/net.json".to_string()]
        );
        assert!(registry.get_template("hub-net").await.is_ok());
    }

    #[tokio::test]
    async fn test_favorites_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = registry().await.with_favorites_dir(dir.path());

        let path = registry.save_favorite("net").await.unwrap();
        assert!(path.starts_with(dir.path()));

        let favorites = registry.list_favorites().await.unwrap();
        assert_eq!(favorites.len(), 1);
        let name = favorites[0].name.clone();

        let loaded = registry.load_favorite(&name, "fav-net").await.unwrap();
        assert_eq!(loaded.cmds[0].id, "ping");
        assert!(registry.get_command("fav-net", "ping").await.is_ok());

        registry.delete_favorite(&name).await.unwrap();
        assert!(matches!(
            registry.get_favorite(&name).await,
            Err(RegistryError::Store(StoreError::FavoriteNotFound { .. }))
        ));
        assert!(matches!(
            registry.save_favorite("missing").await,
            Err(RegistryError::Store(StoreError::TemplateNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_validate_document_does_not_register() {
        let registry = TemplateRegistry::default();
        let report = registry
            .validate_document(NET, DocumentFormat::Json)
            .unwrap();
        assert!(report.is_valid);
        assert!(registry.list_templates().await.is_empty());
    }
}
