// Free-form props documents stored as JSON-in-a-string

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A props document kept verbatim for storage and slug rewriting, with the
/// known fields parsed once when the document is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Props<T> {
    raw: String,
    fields: T,
}

impl<T: DeserializeOwned + Default> Props<T> {
    /// Unparseable documents are kept as-is and expose default fields
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let fields = if raw.trim().is_empty() {
            T::default()
        } else {
            serde_json::from_str(&raw).unwrap_or_default()
        };
        Self { raw, fields }
    }

    /// Textual replace-all over the raw document
    pub fn replace_all(&self, from: &str, to: &str) -> Self {
        if from.is_empty() {
            return Self::from_raw(self.raw.clone());
        }
        Self::from_raw(self.raw.replace(from, to))
    }
}

impl<T> Props<T> {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn fields(&self) -> &T {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.raw.contains(needle)
    }
}

impl<T: Default> Default for Props<T> {
    fn default() -> Self {
        Self {
            raw: String::new(),
            fields: T::default(),
        }
    }
}

impl<T> Serialize for Props<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de, T: DeserializeOwned + Default> Deserialize<'de> for Props<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Props::from_raw(raw))
    }
}

/// Media references a node's props may carry
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeProps {
    pub audio_url: Option<String>,
    pub audio_url_alt: Option<String>,
    pub subtitles_url: Option<String>,
}

impl NodeProps {
    pub fn asset_urls(&self) -> impl Iterator<Item = &str> {
        [&self.audio_url, &self.audio_url_alt, &self.subtitles_url]
            .into_iter()
            .filter_map(|url| url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

/// Adventure-level props; currently only the font list is consumed
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdventureProps {
    pub font_list: Vec<String>,
}

/// Links carry props too, but nothing reads them server-side
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LinkProps {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_props_parsed_once() {
        let props: Props<NodeProps> = Props::from_raw(
            r#"{"audio_url":"/upload/x/a.mp3","subtitles_url":"","color":"red"}"#,
        );
        assert_eq!(props.fields().audio_url.as_deref(), Some("/upload/x/a.mp3"));
        let urls: Vec<&str> = props.fields().asset_urls().collect();
        assert_eq!(urls, vec!["/upload/x/a.mp3"]);
    }

    #[test]
    fn test_invalid_document_keeps_raw() {
        let props: Props<AdventureProps> = Props::from_raw("not json");
        assert_eq!(props.raw(), "not json");
        assert!(props.fields().font_list.is_empty());
    }

    #[test]
    fn test_serializes_as_string() {
        let props: Props<AdventureProps> =
            Props::from_raw(r#"{"font_list":["/upload/x/f.woff"]}"#);
        let json = serde_json::to_string(&props).unwrap();
        assert_eq!(json, r#""{\"font_list\":[\"/upload/x/f.woff\"]}""#);

        let back: Props<AdventureProps> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fields().font_list, vec!["/upload/x/f.woff".to_string()]);
    }

    #[test]
    fn test_replace_all_reparses() {
        let props: Props<NodeProps> =
            Props::from_raw(r#"{"audio_url":"/upload/old/a.mp3","audio_url_alt":"/upload/old/b.mp3"}"#);
        let rewritten = props.replace_all("old", "new");
        assert!(!rewritten.contains("old"));
        assert_eq!(
            rewritten.fields().audio_url_alt.as_deref(),
            Some("/upload/new/b.mp3")
        );
    }

    #[test]
    fn test_replace_all_with_empty_pattern_keeps_document() {
        let props: Props<NodeProps> = Props::from_raw(r#"{"audio_url":"/upload/abc/a.mp3"}"#);
        let same = props.replace_all("", "new");
        assert_eq!(same, props);
        assert_eq!(same.fields().audio_url.as_deref(), Some("/upload/abc/a.mp3"));
    }
}
