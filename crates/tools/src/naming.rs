//! Model-facing tool names.

use unicode_normalization::UnicodeNormalization;

/// Turn a display name into a plain ASCII identifier.
///
/// Lower-cases, replaces spaces with underscores, then decomposes accented
/// characters and drops whatever is left outside ASCII: `"Buscar Preço"`
/// becomes `"buscar_preco"`.
pub fn tool_identifier(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "_")
        .nfkd()
        .filter(char::is_ascii)
        .collect()
}
