use mapas_core::{CategoryId, NewMap};

/// Public URL of a stored test file.
pub fn file_url(key: &str) -> String {
    format!("http://files.test/mapas/{key}")
}

/// Metadata row for a freshly uploaded file.
pub fn new_map(name: &str, farm: &str, category: Option<CategoryId>) -> NewMap {
    NewMap {
        name: name.to_string(),
        farm: farm.to_string(),
        file_url: file_url(&format!("{}.pdf", name.to_lowercase().replace(' ', "_"))),
        category_id: category,
    }
}
