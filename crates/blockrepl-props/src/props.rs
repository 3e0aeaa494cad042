//! Writable property container and the container traits

use blockrepl_common::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Separator between key segments
pub const PATH_SEPARATOR: char = '/';

/// Read access to a property container
///
/// Keys passed to lookups are relative to the container's path; keys
/// reported by [`map`](Self::map) and [`keys`](Self::keys) are absolute.
pub trait PropsContainer: Sized {
    /// Absolute path of this container (empty for the root)
    fn path(&self) -> &str;

    /// Look up a value by key relative to this container
    fn get_prop(&self, key: &str) -> Result<Option<String>>;

    /// Look up `key` inside the relative `namespace`
    fn get_prop_in(&self, key: &str, namespace: &str) -> Result<Option<String>> {
        let namespace = normalize_key(namespace)?;
        let key = normalize_key(key)?;
        self.get_prop(&join(&namespace, &key))
    }

    /// Number of entries in this container, including nested namespaces
    fn size(&self) -> usize;

    /// Whether the container has no entries
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of all entries, keyed by absolute key, in key order
    fn map(&self) -> BTreeMap<String, String>;

    /// Absolute keys in key order
    fn keys(&self) -> Vec<String> {
        self.map().into_keys().collect()
    }

    /// Values in key order
    fn values(&self) -> Vec<String> {
        self.map().into_values().collect()
    }

    /// View of the relative `namespace`, or `None` if no key lies under it
    fn get_namespace(&self, namespace: &str) -> Result<Option<Self>>;

    /// Names of the direct child namespaces, in order
    fn iterate_namespaces(&self) -> Vec<String>;
}

/// Write access to a property container
pub trait PropsMut {
    /// Set a value, returning the previous one
    fn set_prop(&self, key: &str, value: &str) -> Result<Option<String>>;

    /// Set `key` inside the relative `namespace`
    fn set_prop_in(&self, key: &str, value: &str, namespace: &str) -> Result<Option<String>>;

    /// Remove a value, returning it
    fn remove_prop(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key` inside the relative `namespace`
    fn remove_prop_in(&self, key: &str, namespace: &str) -> Result<Option<String>>;

    /// Remove every entry of this container
    fn clear(&self) -> Result<()>;
}

/// Validate a key and strip an optional leading separator
pub(crate) fn normalize_key(key: &str) -> Result<String> {
    let trimmed = key.strip_prefix(PATH_SEPARATOR).unwrap_or(key);
    if trimmed.is_empty() {
        return Err(Error::invalid_key("key cannot be empty"));
    }
    for segment in trimmed.split(PATH_SEPARATOR) {
        if segment.is_empty() {
            return Err(Error::invalid_key(format!(
                "key '{key}' contains an empty segment"
            )));
        }
        if segment.chars().any(char::is_control) {
            return Err(Error::invalid_key(format!(
                "key '{key}' contains a control character"
            )));
        }
    }
    Ok(trimmed.to_string())
}

pub(crate) fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}{PATH_SEPARATOR}{key}")
    }
}

fn prefix_of(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}{PATH_SEPARATOR}")
    }
}

fn entries_under<'a>(
    map: &'a BTreeMap<String, String>,
    path: &str,
) -> impl Iterator<Item = (&'a String, &'a String)> + 'a {
    let prefix = prefix_of(path);
    map.range(prefix.clone()..)
        .take_while(move |(key, _)| key.starts_with(&prefix))
}

/// Writable property container
///
/// Cloning a `Props` (or taking a namespace of it) yields another handle on
/// the same entries: changes through one handle are visible through all.
#[derive(Clone, Default)]
pub struct Props {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
    path: String,
}

impl Props {
    /// Create an empty root container
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root container from key/value pairs
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let props = Self::new();
        {
            let mut map = props.entries.write();
            for (key, value) in entries {
                map.insert(normalize_key(key.as_ref())?, value.into());
            }
        }
        Ok(props)
    }

    /// Read-only view on the same entries
    #[must_use]
    pub fn read_only(&self) -> crate::ReadOnlyProps {
        crate::ReadOnlyProps::new(self.clone())
    }

    fn absolute(&self, key: &str) -> Result<String> {
        Ok(join(&self.path, &normalize_key(key)?))
    }
}

impl PropsContainer for Props {
    fn path(&self) -> &str {
        &self.path
    }

    fn get_prop(&self, key: &str) -> Result<Option<String>> {
        let key = self.absolute(key)?;
        Ok(self.entries.read().get(&key).cloned())
    }

    fn size(&self) -> usize {
        entries_under(&self.entries.read(), &self.path).count()
    }

    fn map(&self) -> BTreeMap<String, String> {
        entries_under(&self.entries.read(), &self.path)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn get_namespace(&self, namespace: &str) -> Result<Option<Self>> {
        let path = self.absolute(namespace)?;
        let present = entries_under(&self.entries.read(), &path).next().is_some();
        Ok(present.then(|| Self {
            entries: Arc::clone(&self.entries),
            path,
        }))
    }

    fn iterate_namespaces(&self) -> Vec<String> {
        let prefix_len = prefix_of(&self.path).len();
        let names: BTreeSet<String> = entries_under(&self.entries.read(), &self.path)
            .filter_map(|(key, _)| {
                key[prefix_len..]
                    .split_once(PATH_SEPARATOR)
                    .map(|(first, _)| first.to_string())
            })
            .collect();
        names.into_iter().collect()
    }
}

impl PropsMut for Props {
    fn set_prop(&self, key: &str, value: &str) -> Result<Option<String>> {
        let key = self.absolute(key)?;
        Ok(self.entries.write().insert(key, value.to_string()))
    }

    fn set_prop_in(&self, key: &str, value: &str, namespace: &str) -> Result<Option<String>> {
        let namespace = normalize_key(namespace)?;
        self.set_prop(&join(&namespace, &normalize_key(key)?), value)
    }

    fn remove_prop(&self, key: &str) -> Result<Option<String>> {
        let key = self.absolute(key)?;
        Ok(self.entries.write().remove(&key))
    }

    fn remove_prop_in(&self, key: &str, namespace: &str) -> Result<Option<String>> {
        let namespace = normalize_key(namespace)?;
        self.remove_prop(&join(&namespace, &normalize_key(key)?))
    }

    fn clear(&self) -> Result<()> {
        let mut map = self.entries.write();
        if self.path.is_empty() {
            map.clear();
        } else {
            let prefix = prefix_of(&self.path);
            map.retain(|key, _| !key.starts_with(&prefix));
        }
        Ok(())
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("path", &self.path)
            .field("entries", &self.map())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn sample() -> Props {
        Props::from_entries([
            ("DrbdOptions/Net/max-buffers", "8000"),
            ("DrbdOptions/Net/protocol", "C"),
            ("DrbdOptions/Disk/al-extents", "6007"),
            ("Paths/path1/nodeA", "eth1"),
            ("Paths/path1/nodeB", "eth1"),
            ("PrefNic", "fast"),
        ])
        .unwrap()
    }

    #[test]
    fn test_get_and_set() {
        let props = Props::new();
        assert_eq!(props.set_prop("a/b", "1").unwrap(), None);
        assert_eq!(props.set_prop("a/b", "2").unwrap(), Some("1".to_string()));
        assert_eq!(props.get_prop("a/b").unwrap().as_deref(), Some("2"));
        assert_eq!(props.get_prop("/a/b").unwrap().as_deref(), Some("2"));
        assert_eq!(props.get_prop("a/c").unwrap(), None);
        assert_eq!(props.remove_prop("a/b").unwrap(), Some("2".to_string()));
        assert!(props.is_empty());
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let props = Props::from_entries([("PrefNic", "eth0")]).unwrap();
        assert!(props.get_prop("prefnic").unwrap().is_none());
        assert!(props.get_prop("PrefNic").unwrap().is_some());
    }

    #[test]
    fn test_invalid_keys() {
        let props = Props::new();
        assert!(matches!(props.set_prop("", "x"), Err(Error::InvalidKey(_))));
        assert!(matches!(props.set_prop("a//b", "x"), Err(Error::InvalidKey(_))));
        assert!(matches!(props.set_prop("a/", "x"), Err(Error::InvalidKey(_))));
        assert!(matches!(props.get_prop("a\nb"), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_namespace_view_keeps_absolute_keys() {
        let props = sample();
        let net = props.get_namespace("DrbdOptions/Net").unwrap().unwrap();
        assert_eq!(net.path(), "DrbdOptions/Net");
        assert_eq!(net.size(), 2);
        assert_eq!(
            net.keys(),
            vec![
                "DrbdOptions/Net/max-buffers".to_string(),
                "DrbdOptions/Net/protocol".to_string()
            ]
        );
        assert_eq!(net.get_prop("protocol").unwrap().as_deref(), Some("C"));
    }

    #[test]
    fn test_missing_namespace() {
        let props = sample();
        assert!(props.get_namespace("DrbdOptions/Handlers").unwrap().is_none());
        // A plain key is not a namespace
        assert!(props.get_namespace("PrefNic").unwrap().is_none());
    }

    #[test]
    fn test_iterate_namespaces() {
        let props = sample();
        assert_eq!(props.iterate_namespaces(), vec!["DrbdOptions", "Paths"]);
        let drbd = props.get_namespace("DrbdOptions").unwrap().unwrap();
        assert_eq!(drbd.iterate_namespaces(), vec!["Disk", "Net"]);
        let path1 = props.get_namespace("Paths/path1").unwrap().unwrap();
        assert!(path1.iterate_namespaces().is_empty());
        assert_eq!(path1.size(), 2);
    }

    #[test]
    fn test_namespace_is_live() {
        let props = sample();
        let net = props.get_namespace("DrbdOptions/Net").unwrap().unwrap();
        props.set_prop("DrbdOptions/Net/sndbuf-size", "0").unwrap();
        assert_eq!(net.size(), 3);

        net.set_prop("rcvbuf-size", "0").unwrap();
        assert_eq!(
            props.get_prop("DrbdOptions/Net/rcvbuf-size").unwrap().as_deref(),
            Some("0")
        );
    }

    #[test]
    fn test_namespaced_variants() {
        let props = Props::new();
        props.set_prop_in("max-buffers", "8000", "DrbdOptions/Net").unwrap();
        assert_eq!(
            props.get_prop_in("max-buffers", "DrbdOptions/Net").unwrap().as_deref(),
            Some("8000")
        );
        assert_eq!(
            props.remove_prop_in("max-buffers", "DrbdOptions/Net").unwrap().as_deref(),
            Some("8000")
        );
        assert!(props.is_empty());
    }

    #[test]
    fn test_clear_namespace_only() {
        let props = sample();
        let net = props.get_namespace("DrbdOptions/Net").unwrap().unwrap();
        net.clear().unwrap();
        assert!(net.is_empty());
        assert_eq!(props.size(), 4);
        assert!(props.get_namespace("DrbdOptions/Net").unwrap().is_none());
    }

    #[test]
    fn test_iteration_order_independent_of_insertion() {
        let mut keys: Vec<String> = (0..50).map(|i| format!("ns/key{i:02}")).collect();
        let expected = keys.clone();
        keys.shuffle(&mut rand::thread_rng());

        let props = Props::new();
        for key in &keys {
            props.set_prop(key, "v").unwrap();
        }
        assert_eq!(props.keys(), expected);
    }

    #[test]
    fn test_sibling_prefix_not_included() {
        let props = Props::from_entries([("Net/a", "1"), ("Net-x/b", "2"), ("Netz", "3")]).unwrap();
        let net = props.get_namespace("Net").unwrap().unwrap();
        assert_eq!(net.size(), 1);
    }
}
