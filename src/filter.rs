use crate::catalog::Catalog;

/// Accept/reject gate run before any LLM work. A plain case-insensitive
/// substring match, no weighting.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::new(&catalog.keywords)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn first_match(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| haystack.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Title, feed summary and scraped body joined the way they are matched.
    pub fn accepts(&self, title: &str, summary: &str, full_text: &str) -> bool {
        self.matches(&format!("{title} {summary} {full_text}"))
    }
}
