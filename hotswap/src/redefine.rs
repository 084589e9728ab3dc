// Class redefinition
//
// Looks up every loaded type for a name and submits the new class file to
// each of them.

use crate::error::{HotSwapError, Result};
use crate::session::Session;
use jdwp_client::protocol::{error_codes, error_name};
use jdwp_client::JdwpError;
use tracing::{debug, info};

/// Replace the definition of `type_name` with `image`
///
/// Each located type gets its own single-entry RedefineClasses request, so
/// a rejection for one class loader's copy is reported on its own. The
/// first rejection stops the remaining submissions; copies already
/// redefined stay redefined. Returns how many types were redefined.
pub async fn redefine(session: &mut Session, type_name: &str, image: &[u8]) -> Result<usize> {
    if type_name.is_empty() {
        return Err(HotSwapError::InvalidArgument("type name is empty".to_string()));
    }
    if image.is_empty() {
        return Err(HotSwapError::InvalidArgument(format!(
            "class file for {} is empty",
            type_name
        )));
    }

    let connection = session.connection()?;

    let classes = match connection.classes_by_name(type_name).await {
        Ok(classes) => classes,
        // Some targets answer NOT_FOUND instead of an empty list
        Err(e) if e.reply_code() == Some(error_codes::NOT_FOUND) => Vec::new(),
        Err(e) => return Err(HotSwapError::Protocol(e)),
    };

    if classes.is_empty() {
        return Err(HotSwapError::TypeNotLoaded(type_name.to_string()));
    }

    if classes.len() > 1 {
        info!("{} is loaded {} times, redefining each", type_name, classes.len());
    }

    for class in &classes {
        debug!(
            "Redefining {} (type id {:#x}, {} bytes)",
            type_name,
            class.type_id,
            image.len()
        );

        connection
            .redefine_classes(&[(class.type_id, image)])
            .await
            .map_err(|e| match e {
                JdwpError::Reply { code, .. } => HotSwapError::RedefinitionRejected {
                    type_name: type_name.to_string(),
                    reason: format!("{} ({})", error_name(code), code),
                },
                other => HotSwapError::Protocol(other),
            })?;
    }

    info!("Redefined {}", type_name);
    Ok(classes.len())
}
