//! Extensions shipped with repoutils

pub mod audit;

pub use audit::{AuditExtension, AuditTrail, AUDIT_SIGN, DEFAULT_AUDIT_FILE};

use crate::execution::extension::{Extension, ExtensionCatalog};
use std::sync::Arc;

/// Add the built-in extensions to `catalog`
pub fn register_builtins(catalog: &mut ExtensionCatalog) {
    catalog.insert("audit", || {
        Ok(Arc::new(AuditExtension::new(DEFAULT_AUDIT_FILE)) as Arc<dyn Extension>)
    });
}
