// Mapping of command line file names to class files and type names

use crate::error::{HotSwapError, Result};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

const CLASS_SUFFIX: &str = ".class";

/// A class file on disk and the type it redefines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassFile {
    pub path: PathBuf,
    pub type_name: String,
}

impl ClassFile {
    /// Resolve `relative` ("com/example/Foo.class") under `base`
    ///
    /// The type name is the relative path without its suffix, with path
    /// separators turned into dots ("com.example.Foo").
    pub fn resolve(base: &Path, relative: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            HotSwapError::InvalidArgument(format!("{}: {}", relative, reason))
        };

        let stem = relative
            .strip_suffix(CLASS_SUFFIX)
            .ok_or_else(|| invalid("expected a .class file"))?;

        // Path::components drops a trailing separator or "."
        let last = stem.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default();
        if last.is_empty() || last == "." {
            return Err(invalid("missing class name"));
        }

        let mut segments = Vec::new();
        for component in Path::new(stem).components() {
            match component {
                Component::Normal(segment) => segments.push(
                    segment
                        .to_str()
                        .ok_or_else(|| invalid("path is not valid UTF-8"))?,
                ),
                Component::CurDir => {}
                _ => return Err(invalid("must be a path relative to the class directory")),
            }
        }

        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("missing class name"));
        }

        Ok(Self {
            path: base.join(relative),
            type_name: segments.join("."),
        })
    }
}
