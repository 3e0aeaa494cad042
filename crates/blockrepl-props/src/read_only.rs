//! Read-only access to a properties container

use crate::props::{Props, PropsContainer, PropsMut};
use blockrepl_common::{Error, Result};
use std::collections::BTreeMap;

/// Read-only view of a [`Props`] container
///
/// Reads go straight to the wrapped handle, so changes made through the
/// writable container are visible here. Every mutation fails with
/// [`Error::PermissionDenied`], and namespaces taken from the view are
/// read-only as well.
#[derive(Clone, Debug)]
pub struct ReadOnlyProps {
    props: Props,
}

impl ReadOnlyProps {
    /// Wrap a writable container
    #[must_use]
    pub const fn new(props: Props) -> Self {
        Self { props }
    }

    /// An empty read-only container
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Props::new())
    }

    fn deny(&self) -> Error {
        Error::PermissionDenied(format!(
            "cannot modify the read-only properties container at '{}'",
            self.props.path()
        ))
    }
}

impl PropsContainer for ReadOnlyProps {
    fn path(&self) -> &str {
        self.props.path()
    }

    fn get_prop(&self, key: &str) -> Result<Option<String>> {
        self.props.get_prop(key)
    }

    fn size(&self) -> usize {
        self.props.size()
    }

    fn map(&self) -> BTreeMap<String, String> {
        self.props.map()
    }

    fn get_namespace(&self, namespace: &str) -> Result<Option<Self>> {
        Ok(self.props.get_namespace(namespace)?.map(Self::new))
    }

    fn iterate_namespaces(&self) -> Vec<String> {
        self.props.iterate_namespaces()
    }
}

impl PropsMut for ReadOnlyProps {
    fn set_prop(&self, _key: &str, _value: &str) -> Result<Option<String>> {
        Err(self.deny())
    }

    fn set_prop_in(&self, _key: &str, _value: &str, _namespace: &str) -> Result<Option<String>> {
        Err(self.deny())
    }

    fn remove_prop(&self, _key: &str) -> Result<Option<String>> {
        Err(self.deny())
    }

    fn remove_prop_in(&self, _key: &str, _namespace: &str) -> Result<Option<String>> {
        Err(self.deny())
    }

    fn clear(&self) -> Result<()> {
        Err(self.deny())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations_denied() {
        let props = Props::from_entries([("DrbdOptions/Net/protocol", "C")]).unwrap();
        let view = props.read_only();

        assert!(matches!(view.set_prop("a", "b"), Err(Error::PermissionDenied(_))));
        assert!(matches!(
            view.set_prop_in("a", "b", "ns"),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            view.remove_prop("DrbdOptions/Net/protocol"),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(view.clear(), Err(Error::PermissionDenied(_))));
        assert_eq!(props.size(), 1);
    }

    #[test]
    fn test_reads_are_transparent() {
        let props = Props::from_entries([
            ("DrbdOptions/Net/protocol", "C"),
            ("DrbdOptions/Disk/al-extents", "6007"),
            ("PrefNic", "eth1"),
        ])
        .unwrap();
        let view = props.read_only();

        assert_eq!(view.size(), props.size());
        assert_eq!(view.keys(), props.keys());
        assert_eq!(view.iterate_namespaces(), props.iterate_namespaces());
        assert_eq!(view.get_prop("PrefNic").unwrap().as_deref(), Some("eth1"));
    }

    #[test]
    fn test_namespace_stays_read_only() {
        let props = Props::from_entries([("DrbdOptions/Net/protocol", "C")]).unwrap();
        let net = props.read_only().get_namespace("DrbdOptions/Net").unwrap().unwrap();
        assert_eq!(net.path(), "DrbdOptions/Net");
        assert!(matches!(net.set_prop("x", "y"), Err(Error::PermissionDenied(_))));
    }

    #[test]
    fn test_view_sees_later_changes() {
        let props = Props::new();
        let view = props.read_only();
        assert!(view.is_empty());

        props.set_prop("DrbdOptions/Net/protocol", "A").unwrap();
        assert_eq!(
            view.get_prop("DrbdOptions/Net/protocol").unwrap().as_deref(),
            Some("A")
        );
        assert!(view.get_namespace("DrbdOptions").unwrap().is_some());
    }
}
