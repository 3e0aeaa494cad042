//! Resource definitions and their per-node resources

use crate::layer::{DrbdRscData, DrbdRscDfnData, DrbdVlmDfnData};
use crate::security::{AccessContext, AccessType, ObjectProtection};
use bitflags::bitflags;
use blockrepl_common::{Error, NodeName, ResourceName, Result, StorPoolName, VolumeNumber};
use blockrepl_props::{Props, ReadOnlyProps};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

bitflags! {
    /// State flags of a resource on one node
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        const DELETE = 1 << 0;
        const DISKLESS = 1 << 2;
        const DISK_ADD_REQUESTED = 1 << 3;
        const DISK_ADDING = 1 << 4;
        const DISK_REMOVE_REQUESTED = 1 << 5;
        const DISK_REMOVING = 1 << 6;
    }
}

bitflags! {
    /// State flags of a volume
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VolumeFlags: u32 {
        const DELETE = 1 << 0;
    }
}

/// Volume of a resource definition
#[derive(Debug)]
pub struct VolumeDefinition {
    number: VolumeNumber,
    props: Props,
    drbd: Option<DrbdVlmDfnData>,
}

impl VolumeDefinition {
    #[must_use]
    pub fn new(number: VolumeNumber) -> Self {
        Self {
            number,
            props: Props::new(),
            drbd: None,
        }
    }

    #[must_use]
    pub const fn number(&self) -> VolumeNumber {
        self.number
    }

    /// Read-only view of the volume definition properties
    #[must_use]
    pub fn props(&self) -> ReadOnlyProps {
        self.props.read_only()
    }

    /// Writable handle on the volume definition properties
    #[must_use]
    pub fn props_mut(&self) -> Props {
        self.props.clone()
    }

    #[must_use]
    pub const fn layer_data(&self) -> Option<&DrbdVlmDfnData> {
        self.drbd.as_ref()
    }

    pub fn set_layer_data(&mut self, data: DrbdVlmDfnData) {
        self.drbd = Some(data);
    }
}

/// Cluster-wide definition of a replicated resource
#[derive(Debug)]
pub struct ResourceDefinition {
    uuid: Uuid,
    name: ResourceName,
    props: Props,
    protection: Arc<ObjectProtection>,
    volume_definitions: BTreeMap<VolumeNumber, VolumeDefinition>,
    drbd: Option<DrbdRscDfnData>,
}

impl ResourceDefinition {
    /// Create a definition owned by the system role
    #[must_use]
    pub fn new(name: ResourceName) -> Self {
        let protection = ObjectProtection::new(format!("resource definition {name}"));
        Self::with_protection(name, protection)
    }

    /// Create a definition with explicit protection
    #[must_use]
    pub fn with_protection(name: ResourceName, protection: ObjectProtection) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            props: Props::new(),
            protection: Arc::new(protection),
            volume_definitions: BTreeMap::new(),
            drbd: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn protection(&self) -> &ObjectProtection {
        &self.protection
    }

    /// Read-only view of the definition properties
    pub fn props(&self, ctx: &AccessContext) -> Result<ReadOnlyProps> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.props.read_only())
    }

    /// Writable handle on the definition properties
    pub fn props_mut(&self, ctx: &AccessContext) -> Result<Props> {
        self.protection.require_access(ctx, AccessType::Change)?;
        Ok(self.props.clone())
    }

    /// Add a volume definition, failing if the number is taken
    pub fn add_volume_definition(
        &mut self,
        ctx: &AccessContext,
        vlm_dfn: VolumeDefinition,
    ) -> Result<()> {
        self.protection.require_access(ctx, AccessType::Change)?;
        if self.volume_definitions.contains_key(&vlm_dfn.number) {
            return Err(Error::AlreadyExists(format!(
                "volume definition {} of resource definition '{}'",
                vlm_dfn.number, self.name
            )));
        }
        self.volume_definitions.insert(vlm_dfn.number, vlm_dfn);
        Ok(())
    }

    pub fn volume_definition(
        &self,
        ctx: &AccessContext,
        number: VolumeNumber,
    ) -> Result<Option<&VolumeDefinition>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.volume_definitions.get(&number))
    }

    /// Volume definitions ordered by volume number
    pub fn volume_definitions(
        &self,
        ctx: &AccessContext,
    ) -> Result<impl Iterator<Item = &VolumeDefinition>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.volume_definitions.values())
    }

    pub fn layer_data(&self, ctx: &AccessContext) -> Result<Option<&DrbdRscDfnData>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.drbd.as_ref())
    }

    pub fn set_layer_data(&mut self, ctx: &AccessContext, data: DrbdRscDfnData) -> Result<()> {
        self.protection.require_access(ctx, AccessType::Change)?;
        self.drbd = Some(data);
        Ok(())
    }
}

/// Volume of a resource on one node
#[derive(Debug)]
pub struct Volume {
    number: VolumeNumber,
    storage_pool: StorPoolName,
    flags: VolumeFlags,
    props: Props,
}

impl Volume {
    #[must_use]
    pub fn new(number: VolumeNumber, storage_pool: StorPoolName) -> Self {
        Self {
            number,
            storage_pool,
            flags: VolumeFlags::empty(),
            props: Props::new(),
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: VolumeFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub const fn number(&self) -> VolumeNumber {
        self.number
    }

    #[must_use]
    pub fn storage_pool(&self) -> &StorPoolName {
        &self.storage_pool
    }

    #[must_use]
    pub const fn flags(&self) -> VolumeFlags {
        self.flags
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.flags.contains(VolumeFlags::DELETE)
    }

    #[must_use]
    pub fn props(&self) -> ReadOnlyProps {
        self.props.read_only()
    }

    #[must_use]
    pub fn props_mut(&self) -> Props {
        self.props.clone()
    }
}

/// A resource definition deployed on one node
///
/// A resource shares the protection of its definition.
#[derive(Debug)]
pub struct Resource {
    uuid: Uuid,
    node_name: NodeName,
    resource_name: ResourceName,
    flags: ResourceFlags,
    props: Props,
    protection: Arc<ObjectProtection>,
    volumes: BTreeMap<VolumeNumber, Volume>,
    drbd: Option<DrbdRscData>,
}

impl Resource {
    /// Deploy `definition` on `node_name`
    #[must_use]
    pub fn new(definition: &ResourceDefinition, node_name: NodeName) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            node_name,
            resource_name: definition.name.clone(),
            flags: ResourceFlags::empty(),
            props: Props::new(),
            protection: Arc::clone(&definition.protection),
            volumes: BTreeMap::new(),
            drbd: None,
        }
    }

    #[must_use]
    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    #[must_use]
    pub fn resource_name(&self) -> &ResourceName {
        &self.resource_name
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn flags(&self, ctx: &AccessContext) -> Result<ResourceFlags> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.flags)
    }

    pub fn enable_flags(&mut self, ctx: &AccessContext, flags: ResourceFlags) -> Result<()> {
        self.protection.require_access(ctx, AccessType::Change)?;
        self.flags |= flags;
        Ok(())
    }

    pub fn is_deleted(&self, ctx: &AccessContext) -> Result<bool> {
        Ok(self.flags(ctx)?.contains(ResourceFlags::DELETE))
    }

    pub fn is_diskless(&self, ctx: &AccessContext) -> Result<bool> {
        Ok(self.flags(ctx)?.contains(ResourceFlags::DISKLESS))
    }

    /// Whether peers must treat this resource as having no disk
    ///
    /// A diskless resource that is about to get a disk still counts as
    /// diskful; one whose disk is being removed already counts as diskless.
    pub fn is_diskless_for_peers(&self, ctx: &AccessContext) -> Result<bool> {
        let flags = self.flags(ctx)?;
        let gaining_disk =
            flags.intersects(ResourceFlags::DISK_ADD_REQUESTED | ResourceFlags::DISK_ADDING);
        Ok((flags.contains(ResourceFlags::DISKLESS) && !gaining_disk)
            || flags.contains(ResourceFlags::DISK_REMOVING))
    }

    pub fn props(&self, ctx: &AccessContext) -> Result<ReadOnlyProps> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.props.read_only())
    }

    pub fn props_mut(&self, ctx: &AccessContext) -> Result<Props> {
        self.protection.require_access(ctx, AccessType::Change)?;
        Ok(self.props.clone())
    }

    pub fn add_volume(&mut self, ctx: &AccessContext, volume: Volume) -> Result<()> {
        self.protection.require_access(ctx, AccessType::Change)?;
        if self.volumes.contains_key(&volume.number) {
            return Err(Error::AlreadyExists(format!(
                "volume {} of resource '{}' on node '{}'",
                volume.number, self.resource_name, self.node_name
            )));
        }
        self.volumes.insert(volume.number, volume);
        Ok(())
    }

    pub fn volume(&self, ctx: &AccessContext, number: VolumeNumber) -> Result<Option<&Volume>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.volumes.get(&number))
    }

    /// Volumes ordered by volume number
    pub fn volumes(&self, ctx: &AccessContext) -> Result<impl Iterator<Item = &Volume>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.volumes.values())
    }

    pub fn layer_data(&self, ctx: &AccessContext) -> Result<Option<&DrbdRscData>> {
        self.protection.require_access(ctx, AccessType::View)?;
        Ok(self.drbd.as_ref())
    }

    pub fn set_layer_data(&mut self, ctx: &AccessContext, data: DrbdRscData) -> Result<()> {
        self.protection.require_access(ctx, AccessType::Change)?;
        self.drbd = Some(data);
        Ok(())
    }
}
