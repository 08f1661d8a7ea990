use serde::{Deserialize, Serialize};

/// A file as returned by the document store's search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriveItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "webUrl")]
    pub web_url: Option<String>,
}

/// A search result ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentHit {
    pub id: Option<String>,
    pub title: String,
    pub url: String,
}

impl From<DriveItem> for DocumentHit {
    fn from(item: DriveItem) -> Self {
        Self {
            id: item.id,
            title: item.name.unwrap_or_else(|| "(no name)".to_string()),
            url: item.web_url.unwrap_or_else(|| "#".to_string()),
        }
    }
}

/// One entry of the local notes catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "webUrl")]
    pub web_url: String,
}

impl NoteMetadata {
    /// Catalog entry for a search hit. Hits without an id cannot be fetched later.
    pub fn from_hit(hit: &DocumentHit) -> Option<Self> {
        Some(Self {
            id: hit.id.clone()?,
            name: hit.title.clone(),
            web_url: hit.url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_get_placeholders() {
        let item: DriveItem = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        let hit = DocumentHit::from(item);

        assert_eq!(hit.id.as_deref(), Some("abc"));
        assert_eq!(hit.title, "(no name)");
        assert_eq!(hit.url, "#");
    }

    #[test]
    fn test_catalog_entry_uses_web_url_key() {
        let note = NoteMetadata {
            id: "1".to_string(),
            name: "Spark.docx".to_string(),
            web_url: "https://example/spark".to_string(),
        };

        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["webUrl"], "https://example/spark");
    }

    #[test]
    fn test_hit_without_id_is_not_cataloged() {
        let hit = DocumentHit {
            id: None,
            title: "x".to_string(),
            url: "#".to_string(),
        };
        assert!(NoteMetadata::from_hit(&hit).is_none());
    }
}
