mod product;

pub use product::ProductScraper;
