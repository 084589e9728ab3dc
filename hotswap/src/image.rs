// Class file loading

use crate::error::{HotSwapError, Result};
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Read a whole class file into memory
///
/// The buffer is sized from the file's metadata and must be filled
/// completely; a short read fails instead of yielding a truncated image.
pub async fn load_image(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str().is_empty() {
        return Err(HotSwapError::InvalidArgument(
            "class file path is empty".to_string(),
        ));
    }

    let unreadable = |source: io::Error| HotSwapError::ImageUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).await.map_err(unreadable)?;
    let metadata = file.metadata().await.map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(unreadable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }

    let length = usize::try_from(metadata.len()).map_err(|_| {
        unreadable(io::Error::new(io::ErrorKind::InvalidData, "file too large"))
    })?;

    let mut bytes = vec![0u8; length];
    file.read_exact(&mut bytes).await.map_err(unreadable)?;

    debug!("Loaded {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}
