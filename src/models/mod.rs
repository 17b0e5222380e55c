mod article;

pub use article::{Article, ArticleQuery, DateRange, FeedEntry, NewArticle, SortOrder, SourceFilter};
