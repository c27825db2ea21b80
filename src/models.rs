//! Data models for topic discovery, image search, and thread posting.
//!
//! This module defines the wire shapes and in-run structures used throughout
//! the application:
//! - [`CategoryMembersResponse`]: envelope for the Wikipedia category listing
//! - [`ImageCandidate`]: one image-search result, scored against the topic
//! - [`ThreadItem`]: one segment of the outgoing thread with optional media
//!
//! Wire models mirror the upstream JSON field names, hence the occasional
//! non-idiomatic field naming.

use serde::Deserialize;

/// Envelope for the Wikipedia `list=categorymembers` response.
///
/// Only the fields the selector reads are modeled; everything else in the
/// response is ignored during deserialization.
#[derive(Debug, Deserialize)]
pub struct CategoryMembersResponse {
    /// The `query` object; absent when the API returns an error document.
    pub query: Option<CategoryQuery>,
}

/// The `query` object of a category-members response.
#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    /// Raw member entries for the requested category.
    #[serde(default)]
    pub categorymembers: Vec<CategoryMember>,
}

/// One member entry of a Wikipedia category.
#[derive(Debug, Deserialize)]
pub struct CategoryMember {
    /// The page title, e.g. `"McLaren F1"` or `"Category:Sports cars"`.
    pub title: String,
}

/// Envelope for a Google Custom Search image query.
#[derive(Debug, Deserialize)]
pub struct ImageSearchResponse {
    /// Result items; the API omits the field entirely for empty result sets.
    pub items: Option<Vec<ImageCandidate>>,
}

/// A single image-search result, scored against the topic's keywords before
/// it is considered for download.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageCandidate {
    /// Direct URL of the image file.
    pub link: String,
    /// Title of the page the image was found on.
    pub title: String,
    /// Text snippet surrounding the image, when the API provides one.
    pub snippet: Option<String>,
}

impl ImageCandidate {
    /// Fraction of `keywords` present in this candidate's title and snippet,
    /// matched case-insensitively. Always in `[0.0, 1.0]`; an empty keyword
    /// set scores `0.0` so that nothing is accepted on a degenerate topic.
    pub fn match_ratio(&self, keywords: &[String]) -> f64 {
        if keywords.is_empty() {
            return 0.0;
        }
        let haystack = match &self.snippet {
            Some(snippet) => format!("{} {}", self.title, snippet).to_lowercase(),
            None => self.title.to_lowercase(),
        };
        let hits = keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
        hits as f64 / keywords.len() as f64
    }
}

/// One segment of the outgoing thread: the text to post and the media handle
/// attached to it, if any. Segment *i* carries image *i* of the run.
#[derive(Debug, Clone)]
pub struct ThreadItem {
    /// The segment text (truncated to the post length limit at send time).
    pub text: String,
    /// Uploaded media handle to attach, if an image was paired with this slot.
    pub media_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, snippet: Option<&str>) -> ImageCandidate {
        ImageCandidate {
            link: "https://example.com/img.jpg".to_string(),
            title: title.to_string(),
            snippet: snippet.map(str::to_string),
        }
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_match_ratio_all_keywords_present() {
        let c = candidate("2021 Bugatti Chiron Review", None);
        let kw = keywords(&["bugatti", "chiron"]);
        assert_eq!(c.match_ratio(&kw), 1.0);
    }

    #[test]
    fn test_match_ratio_partial() {
        let c = candidate("Bugatti factory tour", Some("molsheim assembly line"));
        let kw = keywords(&["bugatti", "chiron"]);
        assert_eq!(c.match_ratio(&kw), 0.5);
    }

    #[test]
    fn test_match_ratio_uses_snippet() {
        let c = candidate("Road test", Some("the Koenigsegg Jesko at speed"));
        let kw = keywords(&["koenigsegg", "jesko"]);
        assert_eq!(c.match_ratio(&kw), 1.0);
    }

    #[test]
    fn test_match_ratio_case_insensitive() {
        let c = candidate("FERRARI F40 WALLPAPER", None);
        let kw = keywords(&["ferrari", "f40"]);
        assert_eq!(c.match_ratio(&kw), 1.0);
    }

    #[test]
    fn test_match_ratio_empty_keywords_scores_zero() {
        let c = candidate("anything", None);
        assert_eq!(c.match_ratio(&[]), 0.0);
    }

    #[test]
    fn test_match_ratio_is_deterministic_and_bounded() {
        let c = candidate("Pagani Huayra rear wing detail", Some("active aero"));
        let kw = keywords(&["pagani", "huayra", "roadster"]);
        let first = c.match_ratio(&kw);
        let second = c.match_ratio(&kw);
        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first));
    }

    #[test]
    fn test_category_members_deserialization() {
        let json = r#"{
            "batchcomplete": "",
            "query": {
                "categorymembers": [
                    {"pageid": 1, "ns": 0, "title": "McLaren F1"},
                    {"pageid": 2, "ns": 14, "title": "Category:McLaren vehicles"}
                ]
            }
        }"#;
        let parsed: CategoryMembersResponse = serde_json::from_str(json).unwrap();
        let members = parsed.query.unwrap().categorymembers;
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].title, "McLaren F1");
    }

    #[test]
    fn test_category_members_error_document() {
        let json = r#"{"error": {"code": "invalidcategory"}}"#;
        let parsed: CategoryMembersResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.query.is_none());
    }

    #[test]
    fn test_image_search_empty_result_set() {
        let json = r#"{"kind": "customsearch#search"}"#;
        let parsed: ImageSearchResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.items.is_none());
    }

    #[test]
    fn test_image_candidate_deserialization() {
        let json = r#"{
            "link": "https://images.example.com/chiron.jpg",
            "title": "Bugatti Chiron",
            "snippet": "press photo"
        }"#;
        let c: ImageCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.link, "https://images.example.com/chiron.jpg");
        assert_eq!(c.snippet.as_deref(), Some("press photo"));
    }
}
