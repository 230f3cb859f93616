//! Literal prompt templates.
//!
//! Two placeholders, substituted verbatim: `{target}` (destination label)
//! and `{content}` (carrier text). No escaping, no other syntax.

pub const CONTENT: &str = "{content}";
pub const TARGET: &str = "{target}";

/// Fill a template. `{target}` is substituted first so that carrier text
/// containing a literal `{target}` comes through unchanged.
pub fn render(template: &str, content: &str, target: &str) -> String {
    template.replace(TARGET, target).replace(CONTENT, content)
}
