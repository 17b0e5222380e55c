mod document;
mod page_scraper;

pub use document::extract_document_text;
pub use page_scraper::{is_scrape_error, PageScraper, FETCH_FAILED};
