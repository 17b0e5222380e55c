//! Country mentions from free text, matched against the catalog gazetteer.
//! Geocoding and map rendering happen elsewhere; this only produces names.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::Catalog;
use crate::models::Article;

#[derive(Debug, Clone)]
pub struct Gazetteer {
    countries: Vec<(String, String)>,
    aliases: Vec<(String, String)>,
}

impl Gazetteer {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            countries: catalog
                .countries
                .iter()
                .map(|c| (c.to_lowercase(), c.clone()))
                .collect(),
            aliases: catalog
                .country_aliases
                .iter()
                .map(|a| (a.alias.clone(), a.country.clone()))
                .collect(),
        }
    }

    /// Full names match as case-insensitive substrings. Aliases such as
    /// "US" or "UK" must appear as a whole, exactly-cased word.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if text.is_empty() {
            return found;
        }

        let lower = text.to_lowercase();
        for (needle, name) in &self.countries {
            if lower.contains(needle.as_str()) {
                found.insert(name.clone());
            }
        }

        let words: BTreeSet<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        for (alias, name) in &self.aliases {
            if words.contains(alias.as_str()) {
                found.insert(name.clone());
            }
        }

        found
    }

    /// Comma-separated form stored in the `locations` column.
    pub fn locations(&self, text: &str) -> String {
        self.extract(text).into_iter().collect::<Vec<_>>().join(", ")
    }
}

/// How many articles mention each country. Uses the stored `locations`
/// column, falling back to the full text when it is empty.
pub fn country_mentions(articles: &[Article], gazetteer: &Gazetteer) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for article in articles {
        let stored = article.location_list();
        let countries: Vec<String> = if stored.is_empty() {
            gazetteer.extract(&article.full_text).into_iter().collect()
        } else {
            stored.into_iter().map(str::to_string).collect()
        };
        for country in countries {
            *counts.entry(country).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gazetteer() -> Gazetteer {
        Gazetteer::from_catalog(&Catalog::default())
    }

    #[test]
    fn finds_full_names_and_aliases() {
        let found = gazetteer().extract("New LNG deal between saudi arabia and the UAE.");
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["Saudi Arabia", "United Arab Emirates"]
        );
    }

    #[test]
    fn aliases_need_whole_words() {
        let found = gazetteer().extract("Business users must focus on the bus schedule");
        assert!(found.is_empty());
    }

    #[test]
    fn locations_are_sorted_and_deduplicated() {
        assert_eq!(
            gazetteer().locations("US shale vs United States offshore and Canada"),
            "Canada, United States"
        );
        assert_eq!(gazetteer().locations(""), "");
    }

    #[test]
    fn mentions_prefer_stored_locations() {
        let base = Article {
            id: 1,
            title: String::new(),
            link: "https://x/1".to_string(),
            snippet: String::new(),
            summary: None,
            full_text: "Operations in Brazil".to_string(),
            published_date: String::new(),
            source: "Rigzone".to_string(),
            relevance_score: 0.0,
            novelty_score: 0.0,
            heat_score: 0.0,
            locations: "Norway, Canada".to_string(),
        };
        let mut derived = base.clone();
        derived.id = 2;
        derived.locations = String::new();

        let counts = country_mentions(&[base, derived], &gazetteer());
        assert_eq!(counts.get("Norway"), Some(&1));
        assert_eq!(counts.get("Canada"), Some(&1));
        assert_eq!(counts.get("Brazil"), Some(&1));
    }
}
