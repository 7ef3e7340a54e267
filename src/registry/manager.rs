//! Cache-coherent access to the registry document
//!
//! `Registry` owns an in-memory copy of the document and the checksum of
//! the bytes it was loaded from. Every public operation first calls
//! [`Registry::refresh`], which reloads the document only when the file has
//! changed on disk. Writes go straight through to the store.

use log::debug;
use serde::Serialize;
use serde_json::Value;

use super::document::{is_present, ContainerEntry, RegistryDocument};
use super::store::{checksum, parse_document, PersistentStore};
use crate::error::Result;

#[derive(Debug)]
pub struct Registry {
    store: PersistentStore,
    document: RegistryDocument,
    /// Checksum of the bytes `document` came from; `None` until first load.
    checksum: Option<String>,
}

impl Registry {
    pub fn new(store: PersistentStore) -> Self {
        Self {
            store,
            document: RegistryDocument::default(),
            checksum: None,
        }
    }

    /// Reload the document if the file changed since it was last seen.
    /// Returns whether a reload happened.
    pub fn refresh(&mut self) -> Result<bool> {
        let bytes = self.store.read_bytes()?;
        let current = checksum(&bytes);
        if self.checksum.as_deref() == Some(current.as_str()) {
            return Ok(false);
        }

        self.document = parse_document(&bytes, self.store.path())?;
        debug!(
            "reloaded {} ({} containers)",
            self.store.path().display(),
            self.document.container_list.len()
        );
        self.checksum = Some(current);
        Ok(true)
    }

    /// A fresh view of the whole document.
    pub fn document(&mut self) -> Result<&RegistryDocument> {
        self.refresh()?;
        Ok(&self.document)
    }

    pub(super) fn document_mut(&mut self) -> &mut RegistryDocument {
        &mut self.document
    }

    /// Flush the in-memory document to disk.
    pub fn persist(&mut self) -> Result<()> {
        let written = self.store.write(&self.document)?;
        self.checksum = Some(written);
        Ok(())
    }

    pub fn get_entry(&mut self, id: &str) -> Result<Option<&ContainerEntry>> {
        self.refresh()?;
        Ok(self.document.get(id))
    }

    pub fn get_field(&mut self, id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self.get_entry(id)?.and_then(|c| c.get(key)).cloned())
    }

    /// Overwrite a string-valued field. Does nothing if `id` is unknown.
    pub fn set_scalar_field(&mut self, id: &str, key: &str, value: &str) -> Result<()> {
        self.refresh()?;
        let Some(entry) = self.document.get_mut(id) else {
            return Ok(());
        };
        entry.set(key, Value::from(value));
        self.persist()
    }

    /// Append `record` to the list stored under `key`, creating the list on
    /// first use. Does nothing if `id` is unknown.
    pub fn append_structured_field<T: Serialize>(
        &mut self,
        id: &str,
        key: &str,
        record: &T,
    ) -> Result<()> {
        let value = serde_json::to_value(record)?;
        self.refresh()?;
        let Some(entry) = self.document.get_mut(id) else {
            return Ok(());
        };
        entry.list_mut(key).push(value);
        self.persist()
    }

    /// `field_key` of the first item in `list_key` whose `match_key` equals
    /// `match_value`.
    pub fn get_nested_field(
        &mut self,
        id: &str,
        list_key: &str,
        match_key: &str,
        match_value: &str,
        field_key: &str,
    ) -> Result<Option<Value>> {
        let Some(entry) = self.get_entry(id)? else {
            return Ok(None);
        };
        Ok(entry
            .list(list_key)
            .iter()
            .find(|item| matches(item, match_key, match_value))
            .and_then(|item| item.get(field_key))
            .cloned())
    }

    /// Set `field_key` on the first matching item. Returns whether an item
    /// matched; nothing is written otherwise.
    pub fn set_nested_field(
        &mut self,
        id: &str,
        list_key: &str,
        match_key: &str,
        match_value: &str,
        field_key: &str,
        value: &str,
    ) -> Result<bool> {
        self.refresh()?;
        let Some(entry) = self.document.get_mut(id) else {
            return Ok(false);
        };
        let Some(index) = find_item(entry, list_key, match_key, match_value) else {
            return Ok(false);
        };
        if let Some(fields) = entry.list_mut(list_key)[index].as_object_mut() {
            fields.insert(field_key.to_string(), Value::from(value));
        }
        self.persist()?;
        Ok(true)
    }

    /// Remove the first matching item. Returns whether one was removed.
    pub fn delete_nested_item(
        &mut self,
        id: &str,
        list_key: &str,
        match_key: &str,
        match_value: &str,
    ) -> Result<bool> {
        self.refresh()?;
        let Some(entry) = self.document.get_mut(id) else {
            return Ok(false);
        };
        let Some(index) = find_item(entry, list_key, match_key, match_value) else {
            return Ok(false);
        };
        entry.list_mut(list_key).remove(index);
        self.persist()?;
        Ok(true)
    }

    /// Whether `key` holds a present value (see [`is_present`]) and, if
    /// `value` is given, whether it equals that string.
    pub fn field_exists(&mut self, id: &str, key: &str, value: Option<&str>) -> Result<bool> {
        let Some(entry) = self.get_entry(id)? else {
            return Ok(false);
        };
        let stored = entry.get(key);
        if !is_present(stored) {
            return Ok(false);
        }
        Ok(match value {
            None => true,
            Some(expected) => stored.and_then(Value::as_str) == Some(expected),
        })
    }

    /// Whether some item in `list_key` has `match_key` equal to `value`.
    pub fn nested_item_exists(
        &mut self,
        id: &str,
        list_key: &str,
        match_key: &str,
        value: &str,
    ) -> Result<bool> {
        let Some(entry) = self.get_entry(id)? else {
            return Ok(false);
        };
        Ok(entry
            .list(list_key)
            .iter()
            .any(|item| matches(item, match_key, value) && is_present(item.get(match_key))))
    }
}

fn matches(item: &Value, key: &str, expected: &str) -> bool {
    item.get(key).and_then(Value::as_str) == Some(expected)
}

fn find_item(entry: &ContainerEntry, list_key: &str, match_key: &str, value: &str) -> Option<usize> {
    entry
        .list(list_key)
        .iter()
        .position(|item| matches(item, match_key, value))
}
