//! Output formatting

use serde::Serialize;

use crate::backend::ContainerState;
use crate::error::Result;
use crate::output::human::format_human;
use crate::output::json::format_json;
use crate::registry::{keys, ArchiveEntry, PackageEntry, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// One line of `burrow list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub backend: String,
    pub distro: String,
    pub install_status: String,
    pub is_default: bool,
}

/// Everything the registry knows about one container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerReport {
    #[serde(flatten)]
    pub summary: ContainerSummary,
    pub multiarch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ContainerState>,
    pub archives: Vec<ArchiveEntry>,
    pub packages: Vec<PackageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Report {
    List(Vec<ContainerSummary>),
    Container(Box<ContainerReport>),
    Message(String),
}

impl ContainerSummary {
    pub fn collect(registry: &mut Registry) -> Result<Vec<ContainerSummary>> {
        let document = registry.document()?;
        let default = document.default_container.as_deref();
        Ok(document
            .container_list
            .iter()
            .filter_map(|entry| {
                let id = entry.id()?;
                let field = |key| entry.get_str(key).unwrap_or_default().to_string();
                Some(ContainerSummary {
                    id: id.to_string(),
                    name: field(keys::NAME),
                    backend: field(keys::TYPE),
                    distro: field(keys::DISTRO),
                    install_status: field(keys::INSTALL_STATUS),
                    is_default: default == Some(id),
                })
            })
            .collect())
    }
}

impl ContainerReport {
    /// Report for `id`, or `None` if the registry does not know it.
    pub fn collect(registry: &mut Registry, id: &str) -> Result<Option<ContainerReport>> {
        let Some(summary) = ContainerSummary::collect(registry)?
            .into_iter()
            .find(|s| s.id == id)
        else {
            return Ok(None);
        };
        Ok(Some(ContainerReport {
            summary,
            multiarch: registry.get_container_multiarch_support(id)?.to_string(),
            state: None,
            archives: registry.archives(id)?,
            packages: registry.packages(id)?,
        }))
    }
}

pub fn format_output(report: &Report, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(report),
        OutputFormat::Json => format_json(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PersistentStore;
    use tempfile::TempDir;

    #[test]
    fn test_collect_marks_default() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::new(PersistentStore::new(dir.path().join("c.json")));
        registry.add_container("a", "Alpha", "lxc", "bionic").unwrap();
        registry.add_container("b", "Beta", "lxc", "focal").unwrap();

        let list = ContainerSummary::collect(&mut registry).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].is_default);
        assert!(!list[1].is_default);
        assert_eq!(list[1].distro, "focal");
        assert_eq!(list[1].install_status, "new");
    }

    #[test]
    fn test_report_unknown_container() {
        let dir = TempDir::new().unwrap();
        let mut registry = Registry::new(PersistentStore::new(dir.path().join("c.json")));
        assert!(ContainerReport::collect(&mut registry, "x").unwrap().is_none());
    }
}
