//! Catalog loader.
//!
//! The catalog is a TOML document of `[[category]]` and `[[service]]` tables.
//! Each service names its category and a status rule that is evaluated
//! against the monitoring snapshot when the catalog is built.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Category, Column, MonitoringSnapshot, Service, ServiceState, StatusRule};

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub column: Column,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub category: String,
    pub rule: StatusRule,
}

/// Parsed but not yet validated catalog document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogDefinition {
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryDefinition>,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceDefinition>,
}

impl CatalogDefinition {
    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw)
            .map_err(|e| AppError::CatalogLoad(format!("Invalid catalog definition: {}", e)))
    }
}

/// Services and categories with states derived from one monitoring snapshot.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub services: BTreeMap<String, Service>,
    /// Categories in definition order
    pub categories: Vec<Category>,
    /// Last modification of the monitoring snapshot file
    pub snapshot_updated_at: Option<DateTime<Utc>>,
}

impl Catalog {
    /// Validate `definition` and derive every service's raw state.
    ///
    /// A rule that cannot be evaluated leaves that one service at NA.
    pub fn build(
        definition: CatalogDefinition,
        monitoring: MonitoringSnapshot,
        snapshot_updated_at: Option<DateTime<Utc>>,
    ) -> Result<Self, AppError> {
        let mut categories: Vec<Category> = Vec::with_capacity(definition.categories.len());
        for def in definition.categories {
            if categories.iter().any(|c| c.id == def.id) {
                return Err(AppError::CatalogLoad(format!(
                    "Duplicate category {:?}",
                    def.id
                )));
            }
            categories.push(Category {
                name: def.name.unwrap_or_else(|| def.id.clone()),
                id: def.id,
                column: def.column,
                services: Vec::new(),
            });
        }

        let mut services = BTreeMap::new();
        for def in definition.services {
            if services.contains_key(&def.id) {
                return Err(AppError::CatalogLoad(format!(
                    "Duplicate service {:?}",
                    def.id
                )));
            }
            let category = categories
                .iter_mut()
                .find(|c| c.id == def.category)
                .ok_or_else(|| {
                    AppError::CatalogLoad(format!(
                        "Service {:?} references unknown category {:?}",
                        def.id, def.category
                    ))
                })?;
            category.services.push(def.id.clone());

            let raw_status = def.rule.evaluate(&monitoring).unwrap_or_else(|e| {
                tracing::warn!("Status of service {} unavailable: {}", def.id, e);
                ServiceState::Na
            });

            services.insert(
                def.id.clone(),
                Service {
                    display_name: def.name.unwrap_or_else(|| def.id.clone()),
                    id: def.id,
                    category: def.category,
                    rule: def.rule,
                    raw_status,
                },
            );
        }

        Ok(Self {
            services,
            categories,
            snapshot_updated_at,
        })
    }

    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.get(id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Category ids per column; every column is present, possibly empty.
    pub fn columns(&self) -> BTreeMap<Column, Vec<String>> {
        let mut columns: BTreeMap<Column, Vec<String>> =
            Column::ALL.iter().map(|c| (*c, Vec::new())).collect();
        for category in &self.categories {
            columns
                .entry(category.column)
                .or_default()
                .push(category.id.clone());
        }
        columns
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.categories.is_empty()
    }
}

/// Read the monitoring snapshot and its modification time.
pub async fn load_snapshot(
    path: &Path,
) -> Result<(MonitoringSnapshot, Option<DateTime<Utc>>), AppError> {
    let record = path.display().to_string();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::io(&record, e))?;
    let snapshot = MonitoringSnapshot::from_json(&raw)?;

    let modified = tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    Ok((snapshot, modified))
}

/// Load the monitoring snapshot, then the catalog definition, and build the catalog.
pub async fn load_catalog(catalog_path: &Path, snapshot_path: &Path) -> Result<Catalog, AppError> {
    let (monitoring, snapshot_updated_at) = load_snapshot(snapshot_path).await?;

    let raw = tokio::fs::read_to_string(catalog_path).await.map_err(|e| {
        AppError::CatalogLoad(format!("Cannot read {}: {}", catalog_path.display(), e))
    })?;
    let definition = CatalogDefinition::from_toml(&raw)?;

    let catalog = Catalog::build(definition, monitoring, snapshot_updated_at)?;
    tracing::debug!(
        "Catalog loaded: {} services in {} categories",
        catalog.services.len(),
        catalog.categories.len()
    );
    Ok(catalog)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{CATALOG, SNAPSHOT};
    use super::*;
    use tempfile::TempDir;

    fn build(catalog: &str) -> Result<Catalog, AppError> {
        Catalog::build(
            CatalogDefinition::from_toml(catalog)?,
            MonitoringSnapshot::from_json(SNAPSHOT)?,
            None,
        )
    }

    #[test]
    fn test_build_derives_raw_states() {
        let catalog = build(CATALOG).unwrap();

        let state = |id: &str| catalog.service(id).unwrap().raw_status;
        assert_eq!(state("www"), ServiceState::Up);
        assert_eq!(state("catalogue"), ServiceState::Warning);
        assert_eq!(state("mail"), ServiceState::Down);
        assert_eq!(state("cluster"), ServiceState::Up);
        assert_eq!(state("docs"), ServiceState::Up);
        // Undecodable entry only affects its own service.
        assert_eq!(state("broken"), ServiceState::Na);
    }

    #[test]
    fn test_names_default_to_ids() {
        let catalog = build(CATALOG).unwrap();
        assert_eq!(catalog.service("www").unwrap().display_name, "Website");
        assert_eq!(catalog.service("catalogue").unwrap().display_name, "catalogue");
        assert_eq!(catalog.category("infra").unwrap().name, "infra");
    }

    #[test]
    fn test_category_membership_and_columns() {
        let catalog = build(CATALOG).unwrap();
        assert_eq!(
            catalog.category("web").unwrap().services,
            vec!["www", "catalogue"]
        );
        assert_eq!(catalog.service("cluster").unwrap().category, "infra");

        let columns = catalog.columns();
        assert_eq!(columns[&Column::One], vec!["web", "infra"]);
        assert_eq!(columns[&Column::Two], vec!["mail"]);
        assert!(columns[&Column::Three].is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let unknown_category = r#"
[[service]]
id = "x"
category = "nowhere"
rule = { kind = "host", host = "h" }
"#;
        assert!(matches!(build(unknown_category), Err(AppError::CatalogLoad(_))));

        let duplicate = r#"
[[category]]
id = "a"
column = 1

[[category]]
id = "a"
column = 2
"#;
        assert!(matches!(build(duplicate), Err(AppError::CatalogLoad(_))));

        let bad_column = r#"
[[category]]
id = "a"
column = 4
"#;
        assert!(matches!(build(bad_column), Err(AppError::CatalogLoad(_))));

        let bad_rule = r#"
[[category]]
id = "a"
column = 1

[[service]]
id = "x"
category = "a"
rule = { kind = "telepathy" }
"#;
        assert!(matches!(build(bad_rule), Err(AppError::CatalogLoad(_))));
    }

    #[tokio::test]
    async fn test_load_catalog_from_disk() {
        let dir = TempDir::new().unwrap();
        let catalog_path = dir.path().join("services.toml");
        let snapshot_path = dir.path().join("status.json");
        std::fs::write(&catalog_path, CATALOG).unwrap();
        std::fs::write(&snapshot_path, SNAPSHOT).unwrap();

        let catalog = load_catalog(&catalog_path, &snapshot_path).await.unwrap();
        assert_eq!(catalog.services.len(), 6);
        assert!(catalog.snapshot_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_load_catalog_failures() {
        let dir = TempDir::new().unwrap();
        let catalog_path = dir.path().join("services.toml");
        let snapshot_path = dir.path().join("status.json");
        std::fs::write(&catalog_path, CATALOG).unwrap();

        let err = load_catalog(&catalog_path, &snapshot_path).await.unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));

        std::fs::write(&snapshot_path, "{ truncated").unwrap();
        let err = load_catalog(&catalog_path, &snapshot_path).await.unwrap_err();
        assert!(matches!(err, AppError::SnapshotFormat(_)));

        std::fs::write(&snapshot_path, SNAPSHOT).unwrap();
        std::fs::remove_file(&catalog_path).unwrap();
        let err = load_catalog(&catalog_path, &snapshot_path).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogLoad(_)));
    }
}
