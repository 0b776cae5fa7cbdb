//! CLI command implementations.

pub(crate) mod expand;
pub(crate) mod scan;

pub(crate) use expand::ExpandArgs;
pub(crate) use scan::ScanArgs;

use std::path::Path;

/// Read `path`, or stdin when it is `None` or `-`.
pub(crate) fn read_input(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path),
        _ => std::io::read_to_string(std::io::stdin()),
    }
}
