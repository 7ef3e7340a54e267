//! In-memory shape of the registry document
//!
//! Container entries are kept as ordered JSON maps so that fields this
//! version does not know about survive a read/write cycle, and so the
//! generic field accessors can address any key. The well-known keys and
//! status values have typed helpers here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names used in container entries and their nested records.
pub mod keys {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const DISTRO: &str = "distro";
    pub const INSTALL_STATUS: &str = "installStatus";
    pub const MULTIARCH: &str = "multiarch";
    pub const INSTALLED_APPS: &str = "installedApps";
    pub const EXTRA_ARCHIVES: &str = "extraArchives";
    pub const PACKAGE_NAME: &str = "packageName";
    pub const APP_STATUS: &str = "appStatus";
    pub const ARCHIVE_NAME: &str = "archiveName";
    pub const ARCHIVE_STATUS: &str = "archiveStatus";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDocument {
    #[serde(default)]
    pub container_list: Vec<ContainerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_container: Option<String>,
    /// Top-level keys written by other tools.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistryDocument {
    pub fn position(&self, id: &str) -> Option<usize> {
        self.container_list.iter().position(|c| c.id() == Some(id))
    }

    pub fn get(&self, id: &str) -> Option<&ContainerEntry> {
        self.container_list.iter().find(|c| c.id() == Some(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ContainerEntry> {
        self.container_list.iter_mut().find(|c| c.id() == Some(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Point the default at the first container whenever it is unset or
    /// names a container that is gone. Cleared when the list is empty.
    pub fn repair_default(&mut self) {
        let valid = self
            .default_container
            .as_deref()
            .map_or(false, |id| self.contains(id));
        if !valid {
            self.default_container = self
                .container_list
                .first()
                .and_then(|c| c.id())
                .map(str::to_string);
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.container_list
            .iter()
            .filter_map(|c| c.id().map(str::to_string))
            .collect()
    }
}

/// One container's record. Keys are kept sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerEntry(Map<String, Value>);

impl ContainerEntry {
    /// A freshly added container: status `new`, no applications.
    pub fn new(id: &str, name: &str, backend: &str, distro: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(keys::ID.into(), Value::from(id));
        fields.insert(keys::NAME.into(), Value::from(name));
        fields.insert(keys::TYPE.into(), Value::from(backend));
        fields.insert(keys::DISTRO.into(), Value::from(distro));
        fields.insert(
            keys::INSTALL_STATUS.into(),
            Value::from(InstallStatus::New.as_str()),
        );
        fields.insert(keys::INSTALLED_APPS.into(), Value::Array(Vec::new()));
        Self(fields)
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str(keys::ID)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// Items of the list stored under `key`, empty if there is none.
    pub fn list(&self, key: &str) -> &[Value] {
        match self.0.get(key) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }

    /// The list stored under `key`, created (or replacing a non-list value)
    /// if needed.
    pub fn list_mut(&mut self, key: &str) -> &mut Vec<Value> {
        let slot = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(items) => items,
            _ => unreachable!("slot was just made an array"),
        }
    }
}

/// The falsy-as-absent rule used by every existence check: a missing value,
/// `null`, `false`, `0`, an empty string, an empty list and an empty object
/// all count as "not there".
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// A package installed into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEntry {
    pub package_name: String,
    pub app_status: ItemStatus,
}

/// An extra package archive enabled in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub archive_name: String,
    pub archive_status: ItemStatus,
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

string_enum! {
    /// Where a container is in its install/remove cycle.
    InstallStatus {
        New => "new",
        Installing => "installing",
        Ready => "ready",
        Removing => "removing",
    }
}

string_enum! {
    /// Status of a package or archive inside a container.
    ItemStatus {
        New => "new",
        Installing => "installing",
        Installed => "installed",
        Removing => "removing",
        Failed => "failed",
    }
}

string_enum! {
    Multiarch {
        Enabled => "enabled",
        Disabled => "disabled",
    }
}
