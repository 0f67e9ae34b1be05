//! Object key naming for uploaded files.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Stem used when sanitization leaves nothing behind.
const FALLBACK_STEM: &str = "arquivo";

/// Sanitize a file name for use as a storage key.
///
/// Strips diacritics (NFD decomposition, combining marks dropped), removes
/// everything except ASCII alphanumerics, whitespace, `-` and `_`,
/// collapses whitespace runs into a single `_` and lowercases. Applying it
/// twice yields the same result as applying it once.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
            continue;
        }
        // Dropped symbols must not split a whitespace run.
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c.to_ascii_lowercase());
            in_whitespace = false;
        }
    }

    out
}

/// Split a file name into stem and extension (without the dot).
fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < file_name.len() && !file_name[pos + 1..].contains('/') => {
            (&file_name[..pos], Some(&file_name[pos + 1..]))
        }
        _ => (file_name, None),
    }
}

/// Sanitized file name that keeps the extension readable (`mapa_sul.pdf`).
pub fn storage_file_name(file_name: &str) -> String {
    let (stem, extension) = split_extension(file_name);
    let mut stem = sanitize_file_name(stem);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    match extension.map(sanitize_file_name) {
        Some(ext) if !ext.is_empty() => format!("{stem}.{ext}"),
        _ => stem,
    }
}

/// Storage key unique per upload attempt: `{timestamp_ms}_{sanitized name}`.
pub fn unique_object_key(timestamp_ms: i128, file_name: &str) -> String {
    format!("{timestamp_ms}_{}", storage_file_name(file_name))
}

/// Display name of a map: the file name without its extension.
pub fn display_name(file_name: &str) -> String {
    split_extension(file_name).0.to_string()
}

/// Guess the farm from a file name: the first token before `-`, `_` or whitespace.
pub fn farm_from_file_name(file_name: &str) -> String {
    let stem = split_extension(file_name).0;
    stem.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .find(|part| !part.is_empty())
        .unwrap_or(stem)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_diacritics_and_symbols() {
        assert_eq!(
            sanitize_file_name("Fazenda São João (Talhão 3)"),
            "fazenda_sao_joao_talhao_3"
        );
        assert_eq!(sanitize_file_name("Irrigação   Norte"), "irrigacao_norte");
        assert_eq!(sanitize_file_name("mapa-final_v2"), "mapa-final_v2");
        assert_eq!(sanitize_file_name("a\tb\n c"), "a_b_c");
        assert_eq!(sanitize_file_name("Mapa & Sul"), "mapa_sul");
        assert_eq!(sanitize_file_name("a ( b"), "a_b");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for name in [
            "Fazenda São João (Talhão 3).pdf",
            "  leading and trailing  ",
            "ÇÃÕ ÉÍ-ü_ñ",
            "already_clean-name",
            "日本語 map",
            "",
        ] {
            let once = sanitize_file_name(name);
            assert_eq!(sanitize_file_name(&once), once, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn test_storage_file_name_keeps_extension() {
        assert_eq!(storage_file_name("Mapa Sul.PDF"), "mapa_sul.pdf");
        assert_eq!(storage_file_name("日本.pdf"), "arquivo.pdf");
        assert_eq!(storage_file_name("semextensao"), "semextensao");
        assert_eq!(storage_file_name(".hidden"), "hidden");
    }

    #[test]
    fn test_unique_object_key() {
        assert_eq!(
            unique_object_key(1_720_000_000_000, "Área 1.pdf"),
            "1720000000000_area_1.pdf"
        );
    }

    #[test]
    fn test_display_name_and_farm() {
        assert_eq!(display_name("Santa Rita - Talhão 4.pdf"), "Santa Rita - Talhão 4");
        assert_eq!(display_name("no_extension"), "no_extension");
        assert_eq!(farm_from_file_name("BoaVista_talhao-1.pdf"), "BoaVista");
        assert_eq!(farm_from_file_name("Santa Rita.pdf"), "Santa");
    }
}
