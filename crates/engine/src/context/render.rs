//! Text rendering shared by the assembler and the composer.
//!
//! A fragment renders as an optional header line followed by its body;
//! blocks are joined with a configurable separator.

use contexture_core::Fragment;

/// Header line for a fragment, e.g. `[project: Billing Service]`.
pub fn header(fragment: &Fragment) -> String {
    format!("[{}: {}]", fragment.layer_type, fragment.label())
}

/// Render `body` as the block for `fragment`.
pub fn render_block(fragment: &Fragment, body: &str, include_headers: bool) -> String {
    if include_headers {
        format!("{}\n{}", header(fragment), body)
    } else {
        body.to_string()
    }
}

/// Render each fragment's own content as a block and join them.
pub fn render_fragments<'a>(
    fragments: impl IntoIterator<Item = &'a Fragment>,
    separator: &str,
    include_headers: bool,
) -> String {
    fragments
        .into_iter()
        .map(|f| render_block(f, &f.content, include_headers))
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contexture_core::LayerType;

    #[test]
    fn header_uses_name_then_id() {
        let named = Fragment::new("p1", LayerType::Project, "x").with_name("Billing");
        assert_eq!(header(&named), "[project: Billing]");
        let unnamed = Fragment::new("t1", LayerType::Task, "x");
        assert_eq!(header(&unnamed), "[task: t1]");
    }

    #[test]
    fn blocks_joined_with_separator() {
        let a = Fragment::new("a", LayerType::Snippet, "alpha");
        let b = Fragment::new("b", LayerType::Snippet, "beta");
        assert_eq!(render_fragments([&a, &b], "\n---\n", false), "alpha\n---\nbeta");
        assert_eq!(
            render_fragments([&a], "\n\n", true),
            "[snippet: a]\nalpha"
        );
    }
}
