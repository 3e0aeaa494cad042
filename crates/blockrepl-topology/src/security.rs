//! Access control for topology objects
//!
//! Every protected read is performed on behalf of an [`AccessContext`]. The
//! object's [`ObjectProtection`] decides whether the context's role may
//! perform the requested [`AccessType`].

use bitflags::bitflags;
use blockrepl_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Role that owns every object unless stated otherwise
pub const SYSTEM_ROLE: &str = "SYSTEM";

/// Level of access, ordered from weakest to strongest
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Read the object and its properties
    View,
    /// Use the object (e.g. deploy onto a node)
    Use,
    /// Modify the object
    Change,
    /// Change the object's protection
    Control,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::View => "VIEW",
            Self::Use => "USE",
            Self::Change => "CHANGE",
            Self::Control => "CONTROL",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Privileges that bypass object protection
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Privilege: u32 {
        /// View access to every object
        const OBJ_VIEW = 1 << 0;
        /// Unrestricted access to every object
        const SYS_ALL = 1 << 31;
    }
}

/// Identity on whose behalf an operation runs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessContext {
    subject: String,
    role: String,
    privileges: Privilege,
}

impl AccessContext {
    /// Create a context without privileges
    pub fn new(subject: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            role: role.into(),
            privileges: Privilege::empty(),
        }
    }

    /// The unrestricted context used by the satellite itself
    #[must_use]
    pub fn system() -> Self {
        Self {
            subject: SYSTEM_ROLE.to_string(),
            role: SYSTEM_ROLE.to_string(),
            privileges: Privilege::all(),
        }
    }

    /// Add privileges to this context
    #[must_use]
    pub fn with_privileges(mut self, privileges: Privilege) -> Self {
        self.privileges |= privileges;
        self
    }

    /// Subject (user or service) name
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Role the subject acts in
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Effective privileges
    #[must_use]
    pub const fn privileges(&self) -> Privilege {
        self.privileges
    }
}

/// Protection attached to a topology object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectProtection {
    object: String,
    owner_role: String,
    acl: BTreeMap<String, AccessType>,
}

impl ObjectProtection {
    /// Protection owned by the system role with an empty ACL
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            owner_role: SYSTEM_ROLE.to_string(),
            acl: BTreeMap::new(),
        }
    }

    /// Build protection from an explicit ACL
    pub fn with_acl(
        object: impl Into<String>,
        acl: impl IntoIterator<Item = (String, AccessType)>,
    ) -> Self {
        Self {
            acl: acl.into_iter().collect(),
            ..Self::new(object)
        }
    }

    /// Grant `access` to `role`, replacing an earlier entry
    pub fn grant(&mut self, role: impl Into<String>, access: AccessType) {
        self.acl.insert(role.into(), access);
    }

    /// Description of the protected object
    #[must_use]
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Strongest access the context has on this object
    #[must_use]
    pub fn query_access(&self, ctx: &AccessContext) -> Option<AccessType> {
        if ctx.privileges.contains(Privilege::SYS_ALL) || ctx.role == self.owner_role {
            return Some(AccessType::Control);
        }
        let granted = self.acl.get(&ctx.role).copied();
        if ctx.privileges.contains(Privilege::OBJ_VIEW) {
            return granted.max(Some(AccessType::View));
        }
        granted
    }

    /// Fail with [`Error::AccessDenied`] unless the context has `access`
    pub fn require_access(&self, ctx: &AccessContext, access: AccessType) -> Result<()> {
        match self.query_access(ctx) {
            Some(granted) if granted >= access => Ok(()),
            _ => Err(Error::access_denied(format!(
                "role '{}' of subject '{}' lacks {access} access to {}",
                ctx.role, ctx.subject, self.object
            ))),
        }
    }
}
