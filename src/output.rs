//! Process-wide output switches

use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// Set `STOREMAP_QUIET=1` to drop colors and decorations from human output
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("STOREMAP_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}
