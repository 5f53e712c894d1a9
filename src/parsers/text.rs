use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

use super::clean_text;

/// Elements whose text never describes the product.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("Invalid title selector"));
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).expect("Invalid meta selector"));
static MAIN_CONTENT: Lazy<[Selector; 3]> = Lazy::new(|| {
    [
        Selector::parse("main").expect("Invalid main selector"),
        Selector::parse("article").expect("Invalid article selector"),
        Selector::parse(r#"div[class*="content"], div[class*="main"], div[class*="product"]"#)
            .expect("Invalid content div selector"),
    ]
});
static CONTENT_BLOCKS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p, h1, h2, h3, h4, h5, h6, li, td, th").expect("Invalid content block selector")
});
static SPEC_BLOCKS: Lazy<Selector> = Lazy::new(|| Selector::parse("table, dl").expect("Invalid spec selector"));

/// Pull the product-describing text out of a page, one part per line:
/// title, meta description, the text blocks of the main content region,
/// then every table/definition list as a `Specifications:` line.
pub fn extract_raw_text(document: &Html) -> String {
    let mut parts = Vec::new();

    if let Some(title) = document.select(&TITLE).next() {
        let text = visible_text(title);
        if !text.is_empty() {
            parts.push(format!("Title: {}", text));
        }
    }

    if let Some(meta) = document.select(&META_DESCRIPTION).next() {
        let content = clean_text(meta.value().attr("content").unwrap_or_default());
        if !content.is_empty() {
            parts.push(format!("Meta Description: {}", content));
        }
    }

    let main = MAIN_CONTENT
        .iter()
        .find_map(|selector| document.select(selector).next());
    if let Some(main) = main {
        for block in main.select(&CONTENT_BLOCKS) {
            let text = visible_text(block);
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }

    for spec in document.select(&SPEC_BLOCKS) {
        let text = visible_text(spec);
        if !text.is_empty() {
            parts.push(format!("Specifications: {}", text));
        }
    }

    parts.join("\n")
}

/// Whitespace-normalized text of an element, ignoring script-like descendants.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    clean_text(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}
