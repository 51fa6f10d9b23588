//! CLI Exit Code Registry
//!
//! Single source of truth for `ngallery` exit codes. Nightly jobs branch on
//! them, so a code never changes meaning once released.
//!
//! # Exit Code Ranges
//!
//! | Range | Domain    | Description                                  |
//! |-------|-----------|----------------------------------------------|
//! | 0     | Universal | Success                                      |
//! | 1     | Universal | Run completed but records were rejected      |
//! | 2     | Universal | CLI usage error (bad args)                   |
//! | 3-9   | recon     | Config, input and catalog failures           |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - every record landed, collapsed or was unchanged.
pub const EXIT_SUCCESS: u8 = 0;

/// The run finished and the catalog was written, but at least one record was
/// rejected (schema error, unresolved identity, identity conflict).
pub const EXIT_REJECTED: u8 = 1;

/// Usage error - bad arguments. Also what clap exits with.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (3-9)
// =============================================================================

/// Config file failed to parse or validate.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// A file could not be read or written.
pub const EXIT_RECON_IO: u8 = 4;

/// Catalog, manifest or key table is malformed.
pub const EXIT_RECON_PARSE: u8 = 5;

/// Catalog at rest violates an invariant (duplicate ids, misrouted paths).
pub const EXIT_RECON_INVARIANT: u8 = 6;

/// The merged catalog could not be serialized; nothing was written.
pub const EXIT_RECON_RENDER: u8 = 7;

use naval_gallery_recon::ReconError;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::CatalogParse { .. } | ReconError::KeyTable(_) => EXIT_RECON_PARSE,
        ReconError::CatalogInvariant(_) => EXIT_RECON_INVARIANT,
        ReconError::Render(_) => EXIT_RECON_RENDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_failure_has_its_own_code() {
        let err = ReconError::Render("key must be a string".into());
        assert_eq!(err.to_string(), "cannot render catalog: key must be a string");
        assert_eq!(recon_exit_code(&err), EXIT_RECON_RENDER);
        assert_ne!(EXIT_RECON_RENDER, EXIT_RECON_IO);
    }

    #[test]
    fn config_and_parse_errors_map_apart() {
        assert_eq!(recon_exit_code(&ReconError::ConfigParse("x".into())), EXIT_RECON_INVALID_CONFIG);
        assert_eq!(recon_exit_code(&ReconError::KeyTable("x".into())), EXIT_RECON_PARSE);
        assert_eq!(recon_exit_code(&ReconError::CatalogInvariant(vec![])), EXIT_RECON_INVARIANT);
    }
}
