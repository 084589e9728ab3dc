// JDWP type definitions
//
// Common types used across the JDWP protocol

use crate::protocol::{JdwpError, JdwpResult};
use serde::{Deserialize, Serialize};

// Widths are declared by the target via IDSizes; values are held as u64
pub type ObjectId = u64;
pub type ThreadId = ObjectId;
pub type ReferenceTypeId = u64;

// Reference type tags returned with every located type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RefTypeTag {
    Class = 1,
    Interface = 2,
    Array = 3,
}

impl TryFrom<u8> for RefTypeTag {
    type Error = JdwpError;

    fn try_from(tag: u8) -> JdwpResult<Self> {
        match tag {
            1 => Ok(RefTypeTag::Class),
            2 => Ok(RefTypeTag::Interface),
            3 => Ok(RefTypeTag::Array),
            other => Err(JdwpError::Protocol(format!("Invalid type tag: {}", other))),
        }
    }
}

/// Convert a dotted type name (`com.example.Foo`, `int[]`) to a JNI signature
/// (`Lcom/example/Foo;`, `[I`)
pub fn type_name_to_signature(name: &str) -> String {
    let mut base = name;
    let mut dimensions = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped;
        dimensions += 1;
    }

    let element = match base {
        "boolean" => "Z".to_string(),
        "byte" => "B".to_string(),
        "char" => "C".to_string(),
        "short" => "S".to_string(),
        "int" => "I".to_string(),
        "long" => "J".to_string(),
        "float" => "F".to_string(),
        "double" => "D".to_string(),
        "void" => "V".to_string(),
        class => format!("L{};", class.replace('.', "/")),
    };

    format!("{}{}", "[".repeat(dimensions), element)
}
