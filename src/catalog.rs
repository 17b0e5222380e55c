//! Static reference data shared by the fetcher, filter, scorers and dashboard.
//!
//! Everything here can be overridden by pointing `catalog_path` in the config
//! at a TOML file with the same shape; missing tables fall back to the
//! built-in defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Source name stored for every arXiv entry.
pub const ARXIV_SOURCE: &str = "arXiv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryAlias {
    pub alias: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub feeds: Vec<FeedSource>,
    pub keywords: Vec<String>,
    pub categories: Vec<Category>,
    pub relevance_keywords: Vec<String>,
    pub innovation_indicators: Vec<WeightedTerm>,
    pub trending_indicators: Vec<WeightedTerm>,
    pub countries: Vec<String>,
    pub country_aliases: Vec<CountryAlias>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Catalog = toml::from_str(&content)?;

        for feed in &catalog.feeds {
            url::Url::parse(&feed.url).map_err(|e| {
                AppError::Config(format!("feed '{}' has an invalid url: {}", feed.name, e))
            })?;
        }
        Ok(catalog)
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            feeds: FEEDS
                .iter()
                .map(|(name, url)| FeedSource {
                    name: name.to_string(),
                    url: url.to_string(),
                })
                .collect(),
            keywords: strings(TECHNOLOGY_KEYWORDS),
            categories: CATEGORIES
                .iter()
                .map(|(name, keywords)| Category {
                    name: name.to_string(),
                    keywords: strings(keywords),
                })
                .collect(),
            relevance_keywords: strings(RELEVANCE_KEYWORDS),
            innovation_indicators: weighted(INNOVATION_INDICATORS),
            trending_indicators: weighted(TRENDING_INDICATORS),
            countries: strings(COUNTRIES),
            country_aliases: COUNTRY_ALIASES
                .iter()
                .map(|(alias, country)| CountryAlias {
                    alias: alias.to_string(),
                    country: country.to_string(),
                })
                .collect(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn weighted(items: &[(&str, f64)]) -> Vec<WeightedTerm> {
    items
        .iter()
        .map(|(term, weight)| WeightedTerm {
            term: term.to_string(),
            weight: *weight,
        })
        .collect()
}

const FEEDS: &[(&str, &str)] = &[
    ("Rigzone", "https://www.rigzone.com/news/rss/rigzone_latest.aspx"),
    ("OilPrice", "https://oilprice.com/rss"),
    ("Offshore Energy.biz", "https://www.offshore-energy.biz/feed/"),
    ("Energy Voice", "https://www.energyvoice.com/feed/"),
    ("Oil and Gas IQ", "https://www.oilandgasiq.com/rss/articles"),
    ("World Oil: Latest News", "https://worldoil.com/rss?feed=news"),
    ("World Oil: Current Issues", "https://worldoil.com/rss?feed=issue"),
    (
        "OGJ: General Interest",
        "https://www.ogj.com/__rss/website-scheduled-content.xml?input=%7B%22sectionAlias%22%3A%22general-interest%22%7D",
    ),
    (
        "OGJ: Exploration and Development",
        "https://www.ogj.com/__rss/website-scheduled-content.xml?input=%7B%22sectionAlias%22%3A%22exploration-development%22%7D",
    ),
    (
        "OGJ: Drilling and Production",
        "https://www.ogj.com/__rss/website-scheduled-content.xml?input=%7B%22sectionAlias%22%3A%22drilling-production%22%7D",
    ),
    (
        "OGJ: Refining",
        "https://www.ogj.com/__rss/website-scheduled-content.xml?input=%7B%22sectionAlias%22%3A%22refining-processing%22%7D",
    ),
    (
        "OGJ: Pipelines",
        "https://www.ogj.com/__rss/website-scheduled-content.xml?input=%7B%22sectionAlias%22%3A%22pipelines-transportation%22%7D",
    ),
    (
        "OGJ: Energy Transition",
        "https://www.ogj.com/__rss/website-scheduled-content.xml?input=%7B%22sectionAlias%22%3A%22energy-transition%22%7D",
    ),
    ("US Energy and Information Administration", "https://www.eia.gov/rss/todayinenergy.xml"),
    ("Oil and Gas 360", "https://www.oilandgas360.com/feed/"),
    ("Shale", "https://shalemag.com/feed/"),
    ("MEES", "https://www.mees.com/latest-issue/rss"),
    ("Egypt Oil and Gas", "https://egyptoil-gas.com/news/feed/"),
    ("DIC Oil", "https://dicoiltools.wordpress.com/feed/"),
    ("Permian Basin", "http://pboilandgasmagazine.com/feed/"),
    ("Schneider", "https://blog.se.com/oil-and-gas/feed/"),
    ("Oil and Gas Magazine", "https://www.oilandgasmagazine.com.mx/feed/"),
    ("BOE Report", "https://boereport.com/feed/"),
    ("AOG Digital", "https://aogdigital.com/news/latest?format=feed"),
    ("Adrian", "http://adrianoil.blogspot.com/feeds/posts/default?alt=rss"),
    ("Oil and Gas Investments", "https://oilandgas-investments.com/feed/"),
    ("Yokogawa", "https://www.yokogawa.com/eu/blog/oil-gas/en/feed/"),
    ("Medium", "https://medium.com/feed/deepstream-tech"),
];

const TECHNOLOGY_KEYWORDS: &[&str] = &[
    // General industry terms
    "oil", "gas", "petroleum",
    // Digital transformation & automation
    "technology", "innovation", "AI", "machine learning", "automation",
    "robotics", "digital transformation", "IoT", "sustainability",
    "digital twin", "predictive analytics", "edge computing", "cloud computing",
    "industrial IoT", "big data analytics", "cybersecurity in oil & gas",
    "SCADA", "remote monitoring", "5G in oil & gas", "AI-driven optimization",
    "process automation", "digital oilfield", "smart sensors", "machine vision",
    // AI & machine learning applications
    "AI-assisted drilling", "AI in reservoir simulation", "reinforcement learning in drilling",
    "predictive maintenance AI", "autonomous drilling", "AI-powered seismic interpretation",
    "cognitive computing in exploration", "deep learning for oilfield analytics",
    "AI-based pipeline monitoring", "LLM", "LLMs in oil and gas",
    // Robotics & machinery
    "autonomous underwater vehicles", "remotely operated vehicles", "AI-driven inspection robots",
    "self-healing pipelines", "automated drilling rigs", "drone inspections in oil & gas",
    "smart drilling", "digital roughnecks", "robotic well intervention",
    "robotic refinery maintenance",
    // Energy transition & carbon management
    "carbon capture", "carbon utilization", "carbon storage", "carbon sequestration",
    "direct air capture", "low-carbon hydrogen", "blue hydrogen", "green hydrogen",
    "hydrogen blending in pipelines", "carbon footprint reduction", "carbon intensity reduction",
    "methane detection", "methane emissions monitoring", "flare gas recovery",
    "renewable natural gas", "decarbonization strategies", "biofuels in oil & gas",
    "CO₂ injection", "net-zero emissions", "sustainable drilling",
    // Enhanced oil recovery
    "chemical EOR", "thermal EOR", "microbial EOR", "CO₂ EOR", "nanotechnology in EOR",
    "gas injection EOR", "smart water flooding", "surfactant-polymer flooding",
    "smart tracers in EOR", "low-salinity water injection",
    // Subsurface & seismic
    "subsurface imaging", "AI-assisted seismic processing", "fiber optic sensing",
    "seismic inversion", "distributed acoustic sensing", "4D seismic analysis",
    "electromagnetic exploration", "seismic reflection tomography", "microseismic monitoring",
    "seismic while drilling", "AI-based reservoir modeling",
    // Drilling & wells
    "drilling automation", "automated drilling control", "managed pressure drilling",
    "intelligent completions", "smart well technology", "rotary steerable systems",
    "logging while drilling", "measurement while drilling", "wellbore stability analysis",
    "digital drilling fluids", "expandable tubulars", "real-time downhole monitoring",
    "casing drilling technology", "high-temperature drilling tools",
    // Pipelines & refining
    "AI-driven pipeline monitoring", "smart pipeline coatings", "leak detection systems",
    "pipeline integrity management", "hydrogen pipeline transport", "pipeline pigging technology",
    "AI-based predictive pipeline maintenance", "refinery digitalization",
    "advanced catalyst development", "renewable refining technologies",
    // Offshore & deepwater
    "subsea production systems", "floating LNG", "offshore wind integration with oil & gas",
    "deepwater drilling automation", "AI-driven FPSO monitoring", "subsea robotics",
    "autonomous underwater monitoring", "digital twin for offshore platforms",
    "subsea factory concept", "autonomous tanker loading",
    // Materials & nanotechnology
    "nanomaterials in oil recovery", "smart drilling fluids", "self-healing materials",
    "graphene-based sensors", "smart coatings for pipelines", "high-temperature superconductors",
    "nano-enhanced lubricants", "superhydrophobic coatings for pipelines",
    // Alternative & hybrid energy
    "gas-to-liquids", "power-to-gas", "synthetic fuels", "hybrid energy systems in oilfields",
    "enhanced geothermal systems", "hydrogen-powered drilling", "floating solar in oilfields",
    "renewable diesel", "bio-refineries in oil & gas", "AI-driven energy storage optimization",
    // Computing
    "quantum computing",
    // Operators
    "Saudi Aramco", "ExxonMobil", "Chevron", "Shell", "PetroChina", "TotalEnergies",
    "BP", "Sinopec", "Gazprom", "ConocoPhillips", "Rosneft", "Eni", "Equinor",
    "Phillips 66", "Valero Energy", "Marathon Petroleum", "Petrobras", "Lukoil",
    "Occidental Petroleum", "Repsol", "Devon Energy", "Hess Corporation", "OMV",
    "CNOOC", "Canadian Natural Resources", "ADNOC",
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("Oil & Gas Industry", &["oil", "gas", "petroleum"]),
    (
        "Digital Transformation & Automation",
        &["technology", "innovation", "digital transformation"],
    ),
    (
        "AI & Machine Learning Applications",
        &["AI", "machine learning", "big data analytics"],
    ),
    (
        "Sustainability & Energy Transition",
        &["carbon capture", "hydrogen", "renewable energy"],
    ),
    (
        "Advanced Materials & Sensing",
        &["nanomaterials", "smart sensors", "fiber optic sensing"],
    ),
    (
        "Subsurface & Seismic Technologies",
        &["seismic inversion", "electromagnetic exploration", "microseismic monitoring"],
    ),
];

const RELEVANCE_KEYWORDS: &[&str] = &[
    "AI", "machine learning", "energy", "ESG", "sustainability",
    "oil", "gas", "renewable", "digital", "automation",
];

const INNOVATION_INDICATORS: &[(&str, f64)] = &[
    ("breakthrough", 10.0),
    ("revolutionary", 8.0),
    ("first-ever", 10.0),
    ("innovative", 7.0),
    ("novel", 6.0),
    ("new technology", 8.0),
    ("patent", 7.0),
    ("prototype", 5.0),
    ("research", 4.0),
    ("development", 3.0),
    ("latest", 4.0),
    ("emerging", 5.0),
];

const TRENDING_INDICATORS: &[(&str, f64)] = &[
    ("trending", 10.0),
    ("viral", 9.0),
    ("popular", 7.0),
    ("breaking", 8.0),
    ("exclusive", 6.0),
    ("report", 4.0),
    ("announces", 5.0),
    ("launches", 6.0),
];

const COUNTRIES: &[&str] = &[
    "United States", "United Kingdom", "Saudi Arabia", "China", "India",
    "Germany", "France", "United Arab Emirates", "Brazil", "Canada",
    "Norway", "Qatar", "Kuwait", "Iraq", "Iran", "Russia", "Nigeria",
    "Mexico", "Venezuela", "Oman", "Egypt", "Australia", "Kazakhstan",
];

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("USA", "United States"),
    ("UAE", "United Arab Emirates"),
    ("UK", "United Kingdom"),
    ("KSA", "Saudi Arabia"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_populated() {
        let catalog = Catalog::default();
        assert!(catalog.feeds.len() > 20);
        assert!(catalog.keywords.len() > 150);
        assert_eq!(catalog.categories.len(), 6);
        assert!(catalog.keywords.iter().any(|k| k == "carbon capture"));
    }

    #[test]
    fn category_lookup_ignores_case() {
        let catalog = Catalog::default();
        let category = catalog.category("oil & gas industry").unwrap();
        assert_eq!(category.keywords, vec!["oil", "gas", "petroleum"]);
        assert!(catalog.category("Nope").is_none());
    }

    #[test]
    fn partial_catalog_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(
            &path,
            r#"
keywords = ["flare stack"]

[[feeds]]
name = "Local"
url = "http://localhost/feed.xml"
"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.keywords, vec!["flare stack"]);
        assert_eq!(catalog.feeds.len(), 1);
        assert_eq!(catalog.categories.len(), 6);
    }

    #[test]
    fn invalid_feed_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, "[[feeds]]\nname = \"Broken\"\nurl = \"not a url\"\n").unwrap();

        assert!(matches!(Catalog::load(&path), Err(AppError::Config(_))));
    }
}
