// VirtualMachine command implementations
//
// Version, capability, class lookup, redefinition and dispose commands

use crate::commands::{class_status, command_sets, vm_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{CommandPacket, JdwpError, JdwpResult};
use crate::reader::{read_bool, read_count, read_i32, read_id, read_string, read_u8};
use crate::types::{type_name_to_signature, RefTypeTag, ReferenceTypeId};
use bytes::BufMut;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// JVM version information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmVersion {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,
    pub vm_version: String,
    pub vm_name: String,
}

impl VmVersion {
    /// Whether the target speaks at least JDWP `major.minor`
    pub fn is_at_least(&self, major: i32, minor: i32) -> bool {
        (self.jdwp_major, self.jdwp_minor) >= (major, minor)
    }
}

/// ID sizes used by the JVM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmIdSizes {
    pub field_id_size: i32,
    pub method_id_size: i32,
    pub object_id_size: i32,
    pub reference_type_id_size: i32,
    pub frame_id_size: i32,
}

impl Default for VmIdSizes {
    fn default() -> Self {
        Self {
            field_id_size: 8,
            method_id_size: 8,
            object_id_size: 8,
            reference_type_id_size: 8,
            frame_id_size: 8,
        }
    }
}

impl VmIdSizes {
    /// IDs are carried as u64, so every declared width must fit in 1..=8 bytes
    pub fn validate(&self) -> JdwpResult<()> {
        let sizes = [
            self.field_id_size,
            self.method_id_size,
            self.object_id_size,
            self.reference_type_id_size,
            self.frame_id_size,
        ];
        match sizes.iter().find(|size| !(1..=8).contains(*size)) {
            Some(size) => Err(JdwpError::Protocol(format!("Unsupported ID size: {}", size))),
            None => Ok(()),
        }
    }
}

/// Capabilities reported by CapabilitiesNew, in wire order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_watch_field_modification: bool,
    pub can_watch_field_access: bool,
    pub can_get_bytecodes: bool,
    pub can_get_synthetic_attribute: bool,
    pub can_get_owned_monitor_info: bool,
    pub can_get_current_contended_monitor: bool,
    pub can_get_monitor_info: bool,
    pub can_redefine_classes: bool,
    pub can_add_method: bool,
    pub can_unrestrictedly_redefine_classes: bool,
    pub can_pop_frames: bool,
    pub can_use_instance_filters: bool,
    pub can_get_source_debug_extension: bool,
    pub can_request_vm_death_event: bool,
    pub can_set_default_stratum: bool,
    pub can_get_instance_info: bool,
    pub can_request_monitor_events: bool,
    pub can_get_monitor_frame_info: bool,
    pub can_use_source_name_filters: bool,
    pub can_get_constant_pool: bool,
    pub can_force_early_return: bool,
}

/// Class information from ClassesBySignature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub ref_type_tag: RefTypeTag,
    pub type_id: ReferenceTypeId,
    pub signature: String,
    pub status: i32,
}

impl ClassInfo {
    pub fn is_prepared(&self) -> bool {
        self.status & class_status::PREPARED != 0
    }
}

impl JdwpConnection {
    /// Get JVM version information (VirtualMachine.Version command)
    pub async fn get_version(&mut self) -> JdwpResult<VmVersion> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::VERSION);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        Ok(VmVersion {
            description: read_string(&mut data)?,
            jdwp_major: read_i32(&mut data)?,
            jdwp_minor: read_i32(&mut data)?,
            vm_version: read_string(&mut data)?,
            vm_name: read_string(&mut data)?,
        })
    }

    /// Get ID sizes (VirtualMachine.IDSizes command)
    /// This tells us how many bytes are used for various ID types
    pub async fn get_id_sizes(&mut self) -> JdwpResult<VmIdSizes> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::ID_SIZES);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let mut data = reply.data();

        Ok(VmIdSizes {
            field_id_size: read_i32(&mut data)?,
            method_id_size: read_i32(&mut data)?,
            object_id_size: read_i32(&mut data)?,
            reference_type_id_size: read_i32(&mut data)?,
            frame_id_size: read_i32(&mut data)?,
        })
    }

    /// Query optional capabilities (VirtualMachine.CapabilitiesNew command)
    /// Requires JDWP 1.4 or later
    pub async fn capabilities_new(&mut self) -> JdwpResult<Capabilities> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::CAPABILITIES_NEW);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        parse_capabilities(reply.data())
    }

    /// Find classes by signature (VirtualMachine.ClassesBySignature command)
    /// Signature format: "Lcom/example/MyClass;" for classes
    pub async fn classes_by_signature(&mut self, signature: &str) -> JdwpResult<Vec<ClassInfo>> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::CLASSES_BY_SIGNATURE);
        packet.put_string(signature);

        let reply = self.send_command(packet).await?;
        reply.check_error()?;

        let id_size = self.id_sizes().reference_type_id_size as usize;
        parse_classes(reply.data(), signature, id_size)
    }

    /// Find the loaded, prepared types named `type_name` ("com.example.Foo")
    ///
    /// One name can map to several types when separate class loaders have
    /// each loaded it.
    pub async fn classes_by_name(&mut self, type_name: &str) -> JdwpResult<Vec<ClassInfo>> {
        let signature = type_name_to_signature(type_name);
        let classes = self.classes_by_signature(&signature).await?;

        let total = classes.len();
        let prepared: Vec<ClassInfo> = classes.into_iter().filter(ClassInfo::is_prepared).collect();
        debug!(
            "{} matched {} types, {} prepared",
            signature,
            total,
            prepared.len()
        );

        Ok(prepared)
    }

    /// Replace class definitions (VirtualMachine.RedefineClasses command)
    ///
    /// The target applies the whole request or none of it.
    pub async fn redefine_classes(&mut self, classes: &[(ReferenceTypeId, &[u8])]) -> JdwpResult<()> {
        let id = self.next_id();
        let mut packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::REDEFINE_CLASSES);

        let id_size = self.id_sizes().reference_type_id_size as usize;
        packet.data.put_i32(classes.len() as i32);
        for (type_id, class_file) in classes {
            packet.put_id(*type_id, id_size);
            packet.data.put_i32(class_file.len() as i32);
            packet.data.extend_from_slice(class_file);
        }

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }

    /// Release the debugging session (VirtualMachine.Dispose command)
    ///
    /// The target resumes any suspended threads and drops the connection.
    pub async fn dispose(&mut self) -> JdwpResult<()> {
        let id = self.next_id();
        let packet = CommandPacket::new(id, command_sets::VIRTUAL_MACHINE, vm_commands::DISPOSE);

        let reply = self.send_command(packet).await?;
        reply.check_error()
    }
}

/// Decode a CapabilitiesNew reply (32 booleans, the last 11 reserved)
pub fn parse_capabilities(mut data: &[u8]) -> JdwpResult<Capabilities> {
    let data = &mut data;
    Ok(Capabilities {
        can_watch_field_modification: read_bool(data)?,
        can_watch_field_access: read_bool(data)?,
        can_get_bytecodes: read_bool(data)?,
        can_get_synthetic_attribute: read_bool(data)?,
        can_get_owned_monitor_info: read_bool(data)?,
        can_get_current_contended_monitor: read_bool(data)?,
        can_get_monitor_info: read_bool(data)?,
        can_redefine_classes: read_bool(data)?,
        can_add_method: read_bool(data)?,
        can_unrestrictedly_redefine_classes: read_bool(data)?,
        can_pop_frames: read_bool(data)?,
        can_use_instance_filters: read_bool(data)?,
        can_get_source_debug_extension: read_bool(data)?,
        can_request_vm_death_event: read_bool(data)?,
        can_set_default_stratum: read_bool(data)?,
        can_get_instance_info: read_bool(data)?,
        can_request_monitor_events: read_bool(data)?,
        can_get_monitor_frame_info: read_bool(data)?,
        can_use_source_name_filters: read_bool(data)?,
        can_get_constant_pool: read_bool(data)?,
        can_force_early_return: read_bool(data)?,
    })
}

/// Decode a ClassesBySignature reply
pub fn parse_classes(mut data: &[u8], signature: &str, id_size: usize) -> JdwpResult<Vec<ClassInfo>> {
    let classes_count = read_count(&mut data)?;
    let mut classes = Vec::with_capacity(classes_count.min(16));

    for _ in 0..classes_count {
        let ref_type_tag = RefTypeTag::try_from(read_u8(&mut data)?)?;
        let type_id = read_id(&mut data, id_size)?;
        let status = read_i32(&mut data)?;

        classes.push(ClassInfo {
            ref_type_tag,
            type_id,
            signature: signature.to_string(),
            status,
        });
    }

    Ok(classes)
}
