// Hot swap class files into a running JVM
//
// Attaches to a JVM listening for a JDWP socket debugger, replaces the
// bytecode of already loaded classes, and detaches again.

pub mod config;
pub mod error;
pub mod image;
pub mod paths;
pub mod redefine;
pub mod session;
pub mod transport;

pub use config::HotSwapConfig;
pub use error::{DetachWarning, HotSwapError, Result};
pub use image::load_image;
pub use paths::ClassFile;
pub use redefine::redefine;
pub use session::{attach, Session};
pub use transport::select_transport;

use serde::Serialize;
use tracing::info;

/// One class file that was applied to the target
#[derive(Debug, Clone, Serialize)]
pub struct SwappedClass {
    pub type_name: String,
    pub path: std::path::PathBuf,
    pub bytes: usize,
    /// Number of loaded copies of the type that were redefined
    pub handles: usize,
}

/// Outcome of a successful invocation
#[derive(Debug, Clone, Serialize)]
pub struct SwapReport {
    pub target: String,
    pub vm: String,
    pub swapped: Vec<SwappedClass>,
    /// Set when teardown could not cleanly release the target
    pub detach_warning: Option<String>,
}

/// Apply `files` (relative to `config.base_path`) to the target VM
///
/// Files are processed in order and the first failure stops the run. Classes
/// redefined before that failure stay redefined. The session is detached on
/// every path out of here.
pub async fn run(config: &HotSwapConfig, files: &[String]) -> Result<SwapReport> {
    if files.is_empty() {
        return Err(HotSwapError::InvalidArgument(
            "no class files given, expected paths relative to the class directory".to_string(),
        ));
    }

    let class_files = files
        .iter()
        .map(|file| ClassFile::resolve(&config.base_path, file))
        .collect::<Result<Vec<_>>>()?;

    let connector = transport::select_local_transport()?;
    let mut session =
        session::attach_with_timeout(&config.host, &config.port, config.timeout_ms, &connector).await?;

    let outcome = swap_all(&mut session, &class_files).await;
    let detach_warning = session.detach().await;

    let swapped = outcome?;
    info!("Swapped {} classes in {}", swapped.len(), session.target());

    Ok(SwapReport {
        target: session.target().to_string(),
        vm: session.version().description.clone(),
        swapped,
        detach_warning: detach_warning.map(|w| w.to_string()),
    })
}

async fn swap_all(session: &mut Session, class_files: &[ClassFile]) -> Result<Vec<SwappedClass>> {
    let mut swapped = Vec::with_capacity(class_files.len());

    for class_file in class_files {
        let bytes = load_image(&class_file.path).await?;
        let handles = redefine(session, &class_file.type_name, &bytes).await?;

        swapped.push(SwappedClass {
            type_name: class_file.type_name.clone(),
            path: class_file.path.clone(),
            bytes: bytes.len(),
            handles,
        });
    }

    Ok(swapped)
}
