use std::sync::Arc;

use crate::{ExternalScanner, IndentationScanner};

/// Creates a fresh external scanner for each parse.
pub type ScannerFactory = Arc<dyn Fn() -> Box<dyn ExternalScanner> + Send + Sync>;

/// Looks up a scanner shipped with the runtime by the name grammar tables use
/// for it. Returns the factory and the number of tokens the scanner produces.
pub fn builtin_scanner(name: &str) -> Option<(ScannerFactory, usize)> {
    match name {
        "indentation" => Some((
            Arc::new(|| Box::new(IndentationScanner::new()) as Box<dyn ExternalScanner>),
            IndentationScanner::TOKEN_COUNT,
        )),
        _ => None,
    }
}
