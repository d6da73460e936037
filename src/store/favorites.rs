// ABOUTME: On-disk store of favorite templates under the user's config directory
// ABOUTME: Files are named by the MD5 of the template name so any name maps to a safe file name

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::error::{Result, StoreError};
use super::write_atomic;
use crate::parser::{DocumentFormat, TemplateFile, TemplateParser};

const FAVORITE_SUFFIX: &str = ".cliqfile.yaml";
const FAVORITE_SUFFIX_SHORT: &str = ".cliqfile.yml";

/// Favorite templates, one YAML file per template name.
///
/// A favorite lives at `<md5(name)>.cliqfile.yaml`. Files written by older
/// versions as `<name>.cliqfile.yaml` are still found by name.
pub struct FavoritesStore {
    dir: PathBuf,
    parser: TemplateParser,
}

impl FavoritesStore {
    /// `~/.config/cliq/fav_templates`
    pub fn default_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config").join("cliq").join("fav_templates"))
            .ok_or_else(|| StoreError::FavoritesDirUnavailable {
                reason: "cannot determine the home directory".to_string(),
            })
    }

    pub fn new() -> Result<Self> {
        Ok(Self::with_dir(Self::default_dir()?))
    }

    pub fn with_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            parser: TemplateParser::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name_for(name: &str) -> String {
        format!("{:x}{}", md5::compute(name.as_bytes()), FAVORITE_SUFFIX)
    }

    /// Store `template` under its name, replacing any favorite of that name
    #[instrument(skip_all, fields(name = %template.name))]
    pub async fn save(&self, template: &TemplateFile) -> Result<PathBuf> {
        require_name(&template.name)?;
        fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(Self::file_name_for(&template.name));
        self.write(&path, template).await?;
        info!("Saved favorite '{}' to {}", template.name, path.display());
        Ok(path)
    }

    /// Every readable favorite, in file name order. Files that cannot be
    /// read or parsed are logged and skipped.
    pub async fn list(&self) -> Result<Vec<TemplateFile>> {
        fs::create_dir_all(&self.dir).await?;

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_favorite_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            match self.parser.parse_file(&path).await {
                Ok(template) => templates.push(template),
                Err(e) => warn!("Skipping favorite {}: {}", path.display(), e),
            }
        }
        Ok(templates)
    }

    pub async fn get(&self, name: &str) -> Result<TemplateFile> {
        let path = self.require_existing(name).await?;
        Ok(self.parser.parse_file(&path).await?)
    }

    /// Replace the favorite `name` with `template`.
    ///
    /// When the template was renamed the file moves to the new name's
    /// location.
    #[instrument(skip(self, template))]
    pub async fn update(&self, name: &str, template: &TemplateFile) -> Result<PathBuf> {
        require_name(&template.name)?;
        let existing = self.require_existing(name).await?;

        let target = self.dir.join(Self::file_name_for(&template.name));
        self.write(&target, template).await?;
        if existing != target {
            fs::remove_file(&existing).await?;
            debug!("Moved favorite '{}' to {}", name, target.display());
        }
        info!("Updated favorite '{}'", name);
        Ok(target)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.require_existing(name).await?;
        fs::remove_file(&path).await?;
        info!("Deleted favorite '{}'", name);
        Ok(())
    }

    async fn write(&self, path: &Path, template: &TemplateFile) -> Result<()> {
        let content = self.parser.to_string(template, DocumentFormat::Yaml)?;
        write_atomic(path.to_path_buf(), content).await
    }

    async fn require_existing(&self, name: &str) -> Result<PathBuf> {
        require_name(name)?;
        self.locate(name)
            .await
            .ok_or_else(|| StoreError::FavoriteNotFound {
                name: name.to_string(),
            })
    }

    /// Hashed file first, then the legacy plain-name file
    async fn locate(&self, name: &str) -> Option<PathBuf> {
        let hashed = self.dir.join(Self::file_name_for(name));
        if is_file(&hashed).await {
            return Some(hashed);
        }

        if !is_plain_file_name(name) {
            return None;
        }
        let legacy = self.dir.join(format!("{}{}", name, FAVORITE_SUFFIX));
        is_file(&legacy).await.then_some(legacy)
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidSource {
            source_name: "favorite".to_string(),
            reason: "template name cannot be empty".to_string(),
        });
    }
    Ok(())
}

/// Names that cannot point outside the favorites directory
fn is_plain_file_name(name: &str) -> bool {
    !name.contains(['/', '\\', '\0']) && name != "." && name != ".."
}

fn is_favorite_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(FAVORITE_SUFFIX) || name.ends_with(FAVORITE_SUFFIX_SHORT))
        .unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Command;
    use tempfile::TempDir;

    fn template(name: &str) -> TemplateFile {
        let mut template = TemplateFile::new(name);
        template.cmds.push(Command {
            id: "hello".to_string(),
            name: "Hello".to_string(),
            description: String::new(),
            command: "echo hello".to_string(),
            variables: Vec::new(),
        });
        template
    }

    fn store() -> (TempDir, FavoritesStore) {
        let dir = TempDir::new().unwrap();
        let store = FavoritesStore::with_dir(dir.path().join("fav_templates"));
        (dir, store)
    }

    #[test]
    fn test_file_name_is_md5_of_name() {
        assert_eq!(
            FavoritesStore::file_name_for("hello"),
            "5d41402abc4b2a76b9719d911017c592.cliqfile.yaml"
        );
        assert_eq!(
            FavoritesStore::file_name_for("../etc/passwd").len(),
            32 + FAVORITE_SUFFIX.len()
        );
    }

    #[tokio::test]
    async fn test_save_get_and_list() {
        let (_dir, store) = store();

        let path = store.save(&template("Net Tools")).await.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            FavoritesStore::file_name_for("Net Tools")
        );
        store.save(&template("Files")).await.unwrap();

        let fetched = store.get("Net Tools").await.unwrap();
        assert_eq!(fetched, template("Net Tools"));

        let mut names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Files", "Net Tools"]);
    }

    #[tokio::test]
    async fn test_list_creates_dir_and_skips_unreadable_files() {
        let (_dir, store) = store();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.dir().is_dir());

        store.save(&template("Good")).await.unwrap();
        std::fs::write(store.dir().join("broken.cliqfile.yaml"), "name: [unclosed").unwrap();
        std::fs::write(store.dir().join("notes.txt"), "ignored").unwrap();

        let templates = store.list().await.unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "Good");
    }

    #[tokio::test]
    async fn test_get_falls_back_to_legacy_file_name() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.dir()).unwrap();
        let yaml = TemplateParser::new()
            .to_string(&template("old"), DocumentFormat::Yaml)
            .unwrap();
        std::fs::write(store.dir().join("old.cliqfile.yaml"), yaml).unwrap();

        assert_eq!(store.get("old").await.unwrap().name, "old");
        store.delete("old").await.unwrap();
        assert!(!store.dir().join("old.cliqfile.yaml").exists());
    }

    #[tokio::test]
    async fn test_traversal_names_never_resolve_outside_dir() {
        let (dir, store) = store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(dir.path().join("x.cliqfile.yaml"), "name: x").unwrap();

        assert!(matches!(
            store.get("../x").await,
            Err(StoreError::FavoriteNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_renames_file() {
        let (_dir, store) = store();
        let old_path = store.save(&template("Before")).await.unwrap();

        let mut renamed = template("After");
        renamed.description = "edited".to_string();
        let new_path = store.update("Before", &renamed).await.unwrap();

        assert!(!old_path.exists());
        assert!(new_path.exists());
        assert_eq!(store.get("After").await.unwrap().description, "edited");
        assert!(matches!(
            store.get("Before").await,
            Err(StoreError::FavoriteNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_favorite() {
        let (_dir, store) = store();
        assert!(matches!(
            store.update("ghost", &template("ghost")).await,
            Err(StoreError::FavoriteNotFound { .. })
        ));
        assert!(matches!(
            store.delete("ghost").await,
            Err(StoreError::FavoriteNotFound { .. })
        ));
        assert!(store.get("").await.is_err());
    }
}
