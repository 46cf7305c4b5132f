/// Keyword gate applied to every listing before it becomes a record.
///
/// Matching is plain case-insensitive substring containment over title and
/// description: "sap" matches "sapphire". Downstream consumers rely on that
/// looseness, so there is no tokenizing or word-boundary logic here.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
    exclude_keywords: Vec<String>,
}

impl RelevanceFilter {
    pub fn new<K, E>(keywords: K, exclude_keywords: E) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let lower = |s: &str| s.trim().to_lowercase();
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| lower(k.as_ref()))
                .filter(|k| !k.is_empty())
                .collect(),
            exclude_keywords: exclude_keywords
                .into_iter()
                .map(|k| lower(k.as_ref()))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Exclusions are checked first and always win.
    pub fn is_relevant(&self, title: &str, description: &str) -> bool {
        let title = title.to_lowercase();
        let description = description.to_lowercase();
        let hit =
            |word: &String| title.contains(word.as_str()) || description.contains(word.as_str());

        if self.exclude_keywords.iter().any(hit) {
            return false;
        }
        self.keywords.iter().any(hit)
    }
}
