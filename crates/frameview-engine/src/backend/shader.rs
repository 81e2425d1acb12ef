//! WGSL preparation shared by backends.

use anyhow::{anyhow, bail, Result};

/// Vertex stage entry point every program must export.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment stage entry point every program must export.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Strips a leading UTF-8 byte-order mark and whitespace.
///
/// Sources pulled from assets or edited on some platforms pick these up, and
/// strict shader front ends reject anything before the first token.
pub fn trim_source(source: &str) -> &str {
    source.strip_prefix('\u{feff}').unwrap_or(source).trim_start()
}

/// Parses and validates `source`, checking both entry points exist.
///
/// Errors carry the front end's rendered diagnostic, including the offending
/// source span.
pub fn validate_wgsl(label: &str, source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| anyhow!("{label}: WGSL parse failed:\n{}", e.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| anyhow!("{label}: WGSL validation failed:\n{}", e.emit_to_string(source)))?;

    let has_entry = |name: &str, stage: naga::ShaderStage| {
        module
            .entry_points
            .iter()
            .any(|ep| ep.name == name && ep.stage == stage)
    };

    if !has_entry(VERTEX_ENTRY, naga::ShaderStage::Vertex) {
        bail!("{label}: vertex stage missing: no @vertex fn {VERTEX_ENTRY}");
    }
    if !has_entry(FRAGMENT_ENTRY, naga::ShaderStage::Fragment) {
        bail!("{label}: fragment stage missing: no @fragment fn {FRAGMENT_ENTRY}");
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::{MARKER_SHADER, PRESENT_SHADER};

    // ── trimming ──────────────────────────────────────────────────────────

    #[test]
    fn trim_removes_bom_and_leading_whitespace() {
        assert_eq!(trim_source("\u{feff}\n\t  @vertex fn"), "@vertex fn");
        assert_eq!(trim_source("\r\n struct A"), "struct A");
        assert_eq!(trim_source("fn a() {}"), "fn a() {}");
    }

    #[test]
    fn trim_keeps_interior_bom() {
        assert_eq!(trim_source("a\u{feff}"), "a\u{feff}");
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn bundled_shaders_validate() {
        validate_wgsl("present", trim_source(PRESENT_SHADER)).unwrap();
        validate_wgsl("marker", trim_source(MARKER_SHADER)).unwrap();
    }

    #[test]
    fn syntax_error_is_reported_with_label() {
        let err = validate_wgsl("broken", "@vertex fn vs_main( {").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("broken"), "{msg}");
        assert!(msg.contains("parse"), "{msg}");
    }

    #[test]
    fn missing_fragment_entry_is_reported() {
        let src = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";
        let err = validate_wgsl("vertex-only", src).unwrap_err();
        assert!(format!("{err}").contains("fragment stage missing"));
    }
}
