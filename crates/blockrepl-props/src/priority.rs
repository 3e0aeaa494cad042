//! Priority-ordered property lookup

use crate::props::PropsContainer;
use blockrepl_common::Result;

/// Ordered list of optional containers
///
/// A lookup returns the value of the first container that defines the key.
/// Missing containers are skipped, so callers can pass e.g. the storage pool
/// properties of a resource that has no volume yet.
#[derive(Debug)]
pub struct PriorityProps<'a, P> {
    props: Vec<Option<&'a P>>,
}

impl<'a, P: PropsContainer> PriorityProps<'a, P> {
    /// Create from containers in descending priority
    pub fn new(props: impl IntoIterator<Item = Option<&'a P>>) -> Self {
        Self {
            props: props.into_iter().collect(),
        }
    }

    /// Append a container with the lowest priority so far
    pub fn add(&mut self, props: Option<&'a P>) {
        self.props.push(props);
    }

    /// Value of `key` from the highest-priority container defining it
    pub fn get_prop(&self, key: &str) -> Result<Option<String>> {
        for props in self.props.iter().flatten() {
            if let Some(value) = props.get_prop(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Value of `key` inside `namespace`, by priority
    pub fn get_prop_in(&self, key: &str, namespace: &str) -> Result<Option<String>> {
        for props in self.props.iter().flatten() {
            if let Some(value) = props.get_prop_in(key, namespace)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
