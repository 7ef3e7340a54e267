//! Container-level operations on the registry

use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use log::{info, warn};
use regex::Regex;
use serde_json::Value;

use super::document::{
    keys, ArchiveEntry, ContainerEntry, InstallStatus, ItemStatus, Multiarch, PackageEntry,
};
use super::manager::Registry;
use super::store::{merge, PersistentStore};
use crate::error::{BurrowError, Result};
use crate::host::HostProfile;

/// Container ids become directory names on the host.
const CONTAINER_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]*$";

fn container_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CONTAINER_ID_PATTERN).expect("container id pattern is valid"))
}

pub fn validate_container_id(id: &str) -> Result<()> {
    if container_id_regex().is_match(id) {
        Ok(())
    } else {
        Err(BurrowError::InvalidContainerId(id.to_string()))
    }
}

impl Registry {
    pub fn container_exists(&mut self, id: &str) -> Result<bool> {
        Ok(self.get_entry(id)?.is_some())
    }

    /// Ids in registry order.
    pub fn container_ids(&mut self) -> Result<Vec<String>> {
        Ok(self.document()?.ids())
    }

    pub fn get_default_container_id(&mut self) -> Result<Option<String>> {
        Ok(self.document()?.default_container.clone())
    }

    /// Register a new container with status `new`. It becomes the default
    /// when there is none yet.
    pub fn add_container(&mut self, id: &str, name: &str, backend: &str, distro: &str) -> Result<()> {
        validate_container_id(id)?;
        self.refresh()?;

        let document = self.document_mut();
        if document.contains(id) {
            return Err(BurrowError::ContainerExists(id.to_string()));
        }
        document
            .container_list
            .push(ContainerEntry::new(id, name, backend, distro));
        if document.default_container.is_none() {
            document.default_container = Some(id.to_string());
        }

        info!("added container '{}' ({} {})", id, backend, distro);
        self.persist()
    }

    /// Remove a container. Afterwards the default names a remaining
    /// container (the first one, unless the current default still exists),
    /// or is cleared when none remain.
    pub fn delete_container(&mut self, id: &str) -> Result<()> {
        self.refresh()?;

        let document = self.document_mut();
        if document.container_list.is_empty() {
            return Err(BurrowError::NoContainers);
        }
        let index = document
            .position(id)
            .ok_or_else(|| BurrowError::UnknownContainer(id.to_string()))?;
        document.container_list.remove(index);
        document.repair_default();

        info!("deleted container '{}'", id);
        self.persist()
    }

    pub fn set_default_container_id(&mut self, id: &str, persist: bool) -> Result<()> {
        self.refresh()?;
        let document = self.document_mut();
        if !document.contains(id) {
            return Err(BurrowError::UnknownContainer(id.to_string()));
        }
        document.default_container = Some(id.to_string());
        if persist {
            self.persist()?;
        }
        Ok(())
    }

    pub fn clear_default_container_id(&mut self, persist: bool) -> Result<()> {
        self.refresh()?;
        self.document_mut().default_container = None;
        if persist {
            self.persist()?;
        }
        Ok(())
    }

    /// Resolve the container a command should act on. No id means the
    /// default (which may itself be unset); an unknown id is an error.
    pub fn check_container_id(&mut self, id: Option<&str>) -> Result<Option<String>> {
        match id.filter(|s| !s.is_empty()) {
            None => self.get_default_container_id(),
            Some(id) if self.container_exists(id)? => Ok(Some(id.to_string())),
            Some(id) => Err(BurrowError::UnknownContainer(id.to_string())),
        }
    }

    /// Fold the registry document at `path` into this one and persist.
    /// Incoming entries win on id clashes. The incoming default is adopted
    /// only when this registry has none.
    pub fn merge_external_document(&mut self, path: &Path) -> Result<()> {
        let incoming = PersistentStore::load(path)?;
        self.refresh()?;

        let document = self.document_mut();
        merge(document, &incoming);
        if document.default_container.is_none() {
            document.default_container = incoming
                .default_container
                .clone()
                .filter(|id| document.contains(id));
        }
        document.repair_default();

        info!(
            "merged {} containers from {}",
            incoming.container_list.len(),
            path.display()
        );
        self.persist()
    }

    pub fn get_container_name(&mut self, id: &str) -> Result<Option<String>> {
        self.get_string(id, keys::NAME)
    }

    pub fn get_container_type(&mut self, id: &str) -> Result<Option<String>> {
        self.get_string(id, keys::TYPE)
    }

    pub fn get_container_distro(&mut self, id: &str) -> Result<Option<String>> {
        self.get_string(id, keys::DISTRO)
    }

    pub fn update_container_install_status(&mut self, id: &str, status: InstallStatus) -> Result<()> {
        self.set_scalar_field(id, keys::INSTALL_STATUS, status.as_str())
    }

    pub fn get_container_install_status(&mut self, id: &str) -> Result<Option<InstallStatus>> {
        self.get_parsed(id, keys::INSTALL_STATUS)
    }

    /// Multiarch cannot be enabled on a 32-bit x86 host.
    pub fn update_container_multiarch_support(
        &mut self,
        id: &str,
        multiarch: Multiarch,
        host: &HostProfile,
    ) -> Result<()> {
        let effective = if host.is_i386() && multiarch == Multiarch::Enabled {
            warn!("multiarch is not available on i386 hosts, leaving it disabled");
            Multiarch::Disabled
        } else {
            multiarch
        };
        self.set_scalar_field(id, keys::MULTIARCH, effective.as_str())
    }

    pub fn get_container_multiarch_support(&mut self, id: &str) -> Result<Multiarch> {
        Ok(self
            .get_parsed(id, keys::MULTIARCH)?
            .unwrap_or(Multiarch::Disabled))
    }

    pub fn add_archive(&mut self, id: &str, archive_name: &str) -> Result<()> {
        if self.archive_exists(id, archive_name)? {
            return Ok(());
        }
        let archive = ArchiveEntry {
            archive_name: archive_name.to_string(),
            archive_status: ItemStatus::New,
        };
        self.append_structured_field(id, keys::EXTRA_ARCHIVES, &archive)
    }

    pub fn delete_archive(&mut self, id: &str, archive_name: &str) -> Result<bool> {
        self.delete_nested_item(id, keys::EXTRA_ARCHIVES, keys::ARCHIVE_NAME, archive_name)
    }

    pub fn update_archive_status(&mut self, id: &str, archive_name: &str, status: ItemStatus) -> Result<bool> {
        self.set_nested_field(
            id,
            keys::EXTRA_ARCHIVES,
            keys::ARCHIVE_NAME,
            archive_name,
            keys::ARCHIVE_STATUS,
            status.as_str(),
        )
    }

    pub fn get_archive_status(&mut self, id: &str, archive_name: &str) -> Result<Option<ItemStatus>> {
        let value = self.get_nested_field(
            id,
            keys::EXTRA_ARCHIVES,
            keys::ARCHIVE_NAME,
            archive_name,
            keys::ARCHIVE_STATUS,
        )?;
        Ok(parse_value(value))
    }

    pub fn archive_exists(&mut self, id: &str, archive_name: &str) -> Result<bool> {
        self.nested_item_exists(id, keys::EXTRA_ARCHIVES, keys::ARCHIVE_NAME, archive_name)
    }

    /// Archives of a container; records that do not parse are skipped.
    pub fn archives(&mut self, id: &str) -> Result<Vec<ArchiveEntry>> {
        self.typed_list(id, keys::EXTRA_ARCHIVES)
    }

    pub fn add_package(&mut self, id: &str, package_name: &str) -> Result<()> {
        if self.package_exists(id, package_name)? {
            return Ok(());
        }
        let package = PackageEntry {
            package_name: package_name.to_string(),
            app_status: ItemStatus::New,
        };
        self.append_structured_field(id, keys::INSTALLED_APPS, &package)
    }

    pub fn delete_package(&mut self, id: &str, package_name: &str) -> Result<bool> {
        self.delete_nested_item(id, keys::INSTALLED_APPS, keys::PACKAGE_NAME, package_name)
    }

    pub fn update_package_status(&mut self, id: &str, package_name: &str, status: ItemStatus) -> Result<bool> {
        self.set_nested_field(
            id,
            keys::INSTALLED_APPS,
            keys::PACKAGE_NAME,
            package_name,
            keys::APP_STATUS,
            status.as_str(),
        )
    }

    pub fn get_package_status(&mut self, id: &str, package_name: &str) -> Result<Option<ItemStatus>> {
        let value = self.get_nested_field(
            id,
            keys::INSTALLED_APPS,
            keys::PACKAGE_NAME,
            package_name,
            keys::APP_STATUS,
        )?;
        Ok(parse_value(value))
    }

    pub fn package_exists(&mut self, id: &str, package_name: &str) -> Result<bool> {
        self.nested_item_exists(id, keys::INSTALLED_APPS, keys::PACKAGE_NAME, package_name)
    }

    pub fn packages(&mut self, id: &str) -> Result<Vec<PackageEntry>> {
        self.typed_list(id, keys::INSTALLED_APPS)
    }

    fn get_string(&mut self, id: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .get_field(id, key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    fn get_parsed<T: FromStr>(&mut self, id: &str, key: &str) -> Result<Option<T>> {
        Ok(self.get_string(id, key)?.and_then(|s| s.parse().ok()))
    }

    fn typed_list<T: serde::de::DeserializeOwned>(&mut self, id: &str, key: &str) -> Result<Vec<T>> {
        Ok(self
            .get_entry(id)?
            .map(|entry| {
                entry
                    .list(key)
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn parse_value<T: FromStr>(value: Option<Value>) -> Option<T> {
    value.and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::store::PersistentStore;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> Registry {
        Registry::new(PersistentStore::new(dir.path().join("containers.json")))
    }

    fn host(arch: &str) -> HostProfile {
        HostProfile {
            user: "alice".to_string(),
            uid: 1000,
            gid: 1000,
            home: "/home/alice".into(),
            arch: arch.to_string(),
        }
    }

    #[test]
    fn test_validate_container_id() {
        assert!(validate_container_id("bionic-1.0_x").is_ok());
        assert!(validate_container_id("").is_err());
        assert!(validate_container_id("../etc").is_err());
        assert!(std::ptr::eq(container_id_regex(), container_id_regex()));
        assert!(validate_container_id(".hidden").is_err());
        assert!(validate_container_id("a/b").is_err());
    }

    #[test]
    fn test_add_container_sets_first_default() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("c1", "One", "lxc", "bionic").unwrap();
        reg.add_container("c2", "Two", "lxc", "focal").unwrap();

        assert_eq!(reg.get_default_container_id().unwrap(), Some("c1".to_string()));
        assert_eq!(reg.container_ids().unwrap(), vec!["c1", "c2"]);
        assert_eq!(
            reg.get_container_install_status("c2").unwrap(),
            Some(InstallStatus::New)
        );
        assert_eq!(reg.get_container_distro("c2").unwrap(), Some("focal".to_string()));
        assert_eq!(reg.get_container_type("c2").unwrap(), Some("lxc".to_string()));
    }

    #[test]
    fn test_add_duplicate_container() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("c1", "One", "lxc", "bionic").unwrap();
        let err = reg.add_container("c1", "Again", "lxc", "bionic").unwrap_err();
        assert!(matches!(err, BurrowError::ContainerExists(_)));
    }

    #[test]
    fn test_delete_repairs_default() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        reg.add_container("b", "B", "lxc", "bionic").unwrap();
        reg.add_container("c", "C", "lxc", "bionic").unwrap();
        reg.set_default_container_id("b", true).unwrap();

        reg.delete_container("b").unwrap();
        assert_eq!(reg.get_default_container_id().unwrap(), Some("a".to_string()));

        reg.delete_container("c").unwrap();
        assert_eq!(reg.get_default_container_id().unwrap(), Some("a".to_string()));

        reg.delete_container("a").unwrap();
        assert_eq!(reg.get_default_container_id().unwrap(), None);
    }

    #[test]
    fn test_delete_assigns_default_after_clear() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        reg.add_container("b", "B", "lxc", "bionic").unwrap();
        reg.clear_default_container_id(true).unwrap();

        reg.delete_container("b").unwrap();
        assert_eq!(reg.container_ids().unwrap(), vec!["a"]);
        assert_eq!(reg.get_default_container_id().unwrap(), Some("a".to_string()));
    }

    #[test]
    fn test_delete_replaces_stale_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("containers.json");
        fs::write(
            &path,
            json!({
                "containerList": [{"id": "a"}, {"id": "b"}],
                "defaultContainer": "ghost"
            })
            .to_string(),
        )
        .unwrap();

        let mut reg = registry(&dir);
        reg.delete_container("b").unwrap();
        assert_eq!(reg.container_ids().unwrap(), vec!["a"]);
        assert_eq!(reg.get_default_container_id().unwrap(), Some("a".to_string()));
    }

    #[test]
    fn test_delete_from_empty_registry() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        assert!(matches!(reg.delete_container("x"), Err(BurrowError::NoContainers)));
    }

    #[test]
    fn test_delete_unknown_container() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        assert!(matches!(
            reg.delete_container("x"),
            Err(BurrowError::UnknownContainer(_))
        ));
        assert_eq!(reg.container_ids().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_set_default_without_persist() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        reg.add_container("b", "B", "lxc", "bionic").unwrap();

        reg.set_default_container_id("b", false).unwrap();
        let on_disk = PersistentStore::new(dir.path().join("containers.json")).read().unwrap();
        assert_eq!(on_disk.default_container.as_deref(), Some("a"));

        reg.clear_default_container_id(true).unwrap();
        let on_disk = PersistentStore::new(dir.path().join("containers.json")).read().unwrap();
        assert!(on_disk.default_container.is_none());
    }

    #[test]
    fn test_set_default_unknown() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        assert!(reg.set_default_container_id("ghost", true).unwrap_err().is_validation());
    }

    #[test]
    fn test_check_container_id() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        assert_eq!(reg.check_container_id(None).unwrap(), None);

        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        reg.add_container("b", "B", "lxc", "bionic").unwrap();
        assert_eq!(reg.check_container_id(None).unwrap(), Some("a".to_string()));
        assert_eq!(reg.check_container_id(Some("")).unwrap(), Some("a".to_string()));
        assert_eq!(reg.check_container_id(Some("b")).unwrap(), Some("b".to_string()));
        assert!(matches!(
            reg.check_container_id(Some("zzz")),
            Err(BurrowError::UnknownContainer(id)) if id == "zzz"
        ));
    }

    #[test]
    fn test_merge_external_document() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        reg.add_container("b", "B", "lxc", "bionic").unwrap();

        let other = dir.path().join("other.json");
        fs::write(
            &other,
            json!({
                "containerList": [
                    {"id": "c", "name": "C"},
                    {"id": "a", "name": "A2"}
                ],
                "defaultContainer": "c"
            })
            .to_string(),
        )
        .unwrap();

        reg.merge_external_document(&other).unwrap();
        assert_eq!(reg.container_ids().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(reg.get_container_name("a").unwrap(), Some("A2".to_string()));
        assert_eq!(reg.get_default_container_id().unwrap(), Some("a".to_string()));
    }

    #[test]
    fn test_merge_into_empty_adopts_default() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        let other = dir.path().join("other.json");
        fs::write(
            &other,
            json!({
                "containerList": [{"id": "x"}, {"id": "y"}],
                "defaultContainer": "y"
            })
            .to_string(),
        )
        .unwrap();

        reg.merge_external_document(&other).unwrap();
        assert_eq!(reg.container_ids().unwrap(), vec!["x", "y"]);
        assert_eq!(reg.get_default_container_id().unwrap(), Some("y".to_string()));
    }

    #[test]
    fn test_multiarch_defaults_to_disabled() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        assert_eq!(reg.get_container_multiarch_support("a").unwrap(), Multiarch::Disabled);

        reg.update_container_multiarch_support("a", Multiarch::Enabled, &host("amd64"))
            .unwrap();
        assert_eq!(reg.get_container_multiarch_support("a").unwrap(), Multiarch::Enabled);
    }

    #[test]
    fn test_multiarch_forced_off_on_i386() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        reg.update_container_multiarch_support("a", Multiarch::Enabled, &host("i386"))
            .unwrap();
        assert_eq!(reg.get_container_multiarch_support("a").unwrap(), Multiarch::Disabled);
    }

    #[test]
    fn test_archive_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();

        reg.add_archive("a", "ppa:team/tools").unwrap();
        reg.add_archive("a", "ppa:team/tools").unwrap();
        assert_eq!(reg.archives("a").unwrap().len(), 1);
        assert_eq!(
            reg.get_archive_status("a", "ppa:team/tools").unwrap(),
            Some(ItemStatus::New)
        );

        assert!(reg
            .update_archive_status("a", "ppa:team/tools", ItemStatus::Installed)
            .unwrap());
        assert_eq!(
            reg.get_archive_status("a", "ppa:team/tools").unwrap(),
            Some(ItemStatus::Installed)
        );

        assert!(reg.delete_archive("a", "ppa:team/tools").unwrap());
        assert!(!reg.archive_exists("a", "ppa:team/tools").unwrap());
        assert!(!reg.delete_archive("a", "ppa:team/tools").unwrap());
    }

    #[test]
    fn test_package_lifecycle() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();

        reg.add_package("a", "gedit").unwrap();
        reg.add_package("a", "vim").unwrap();
        assert!(reg.package_exists("a", "vim").unwrap());
        reg.update_package_status("a", "vim", ItemStatus::Installing).unwrap();

        let packages = reg.packages("a").unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[1].package_name, "vim");
        assert_eq!(packages[1].app_status, ItemStatus::Installing);

        reg.delete_package("a", "gedit").unwrap();
        assert_eq!(reg.get_package_status("a", "gedit").unwrap(), None);
    }

    #[test]
    fn test_install_status_update() {
        let dir = TempDir::new().unwrap();
        let mut reg = registry(&dir);
        reg.add_container("a", "A", "lxc", "bionic").unwrap();
        reg.update_container_install_status("a", InstallStatus::Ready).unwrap();
        assert_eq!(
            reg.get_container_install_status("a").unwrap(),
            Some(InstallStatus::Ready)
        );
    }
}
