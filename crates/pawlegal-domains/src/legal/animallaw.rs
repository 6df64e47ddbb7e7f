use std::{collections::HashMap, hash::Hash};

use anyhow::{Context, Result};
use pawlegal_core::{
    sources::SourceLog,
    types::{CombineOp, MaterialType, SearchEntry},
};
use scraper::{ElementRef, Html};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE: &str = "https://www.animallaw.info";

/// Results table rows, counted from `<html>`. `(tag, n)` is the n-th direct
/// child element with that tag.
const SEARCH_ROWS_PATH: &[(&str, usize)] = &[
    ("body", 0),
    ("div", 2),
    ("main", 0),
    ("div", 0),
    ("div", 1),
    ("table", 0),
    ("tbody", 0),
];

/// Container of the article body paragraphs.
const ARTICLE_BODY_PATH: &[(&str, usize)] = &[
    ("body", 0),
    ("div", 2),
    ("main", 0),
    ("article", 0),
    ("section", 0),
    ("span", 0),
    ("span", 0),
    ("span", 0),
];

const SUMMARY_COLUMN: usize = 4;

/// Entries kept per cache unless overridden with `with_cache_capacity`.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Search URL on the public site.
pub fn build_url(
    material_type: MaterialType,
    combine_op: CombineOp,
    query: &str,
    page: u32,
) -> String {
    build_url_at(DEFAULT_BASE, material_type, combine_op, query, page)
}

pub fn build_url_at(
    base: &str,
    material_type: MaterialType,
    combine_op: CombineOp,
    query: &str,
    page: u32,
) -> String {
    let keyword = query
        .split(' ')
        .map(|w| urlencoding::encode(w).into_owned())
        .collect::<Vec<_>>()
        .join("+");
    format!(
        "{}/filters?topic=All&species=All&type={}&country=All&jurisdiction=All&{}=contains&keyword={}&page={}",
        base.trim_end_matches('/'),
        urlencoding::encode(material_type.as_str()),
        combine_op.as_str(),
        keyword,
        page,
    )
}

/// Absolute URL of a site-relative article link.
pub fn href_url(href: &str) -> String {
    href_url_at(DEFAULT_BASE, href)
}

pub fn href_url_at(base: &str, href: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), href)
}

fn nth_child<'a>(el: ElementRef<'a>, tag: &str, n: usize) -> Option<ElementRef<'a>> {
    children(el, tag).nth(n)
}

fn children<'a, 'b>(el: ElementRef<'a>, tag: &'b str) -> impl Iterator<Item = ElementRef<'a>> + 'b
where
    'a: 'b,
{
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(move |c| c.value().name() == tag)
}

fn walk<'a>(root: ElementRef<'a>, path: &[(&str, usize)]) -> Option<ElementRef<'a>> {
    path.iter()
        .try_fold(root, |el, (tag, n)| nth_child(el, tag, *n))
}

/// Text directly inside `el`, excluding nested elements, with whitespace collapsed.
fn own_text(el: ElementRef<'_>) -> String {
    let raw: String = el
        .children()
        .filter_map(|n| n.value().as_text().map(|t| &**t))
        .collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_search_row(row: ElementRef<'_>) -> Option<SearchEntry> {
    let cells: Vec<ElementRef<'_>> = children(row, "td").collect();
    let cell = cells.get(SUMMARY_COLUMN)?;

    let mut summary = own_text(*cell);
    if summary.is_empty() {
        summary = nth_child(*cell, "p", 0).map(own_text).unwrap_or_default();
    }
    if summary.is_empty() {
        return None;
    }

    let href = nth_child(*cells.first()?, "a", 0)?.value().attr("href")?;
    Some(SearchEntry {
        summary,
        href: href.to_string(),
    })
}

/// Extract `{summary, href}` rows from a search results page.
/// A page whose layout no longer matches yields no entries.
pub fn parse_search(html: &str) -> Vec<SearchEntry> {
    let doc = Html::parse_document(html);
    let Some(tbody) = walk(doc.root_element(), SEARCH_ROWS_PATH) else {
        warn!("search page layout not recognized, no results table");
        return Vec::new();
    };
    children(tbody, "tr").filter_map(parse_search_row).collect()
}

/// Concatenate the body paragraphs of an article page, each prefixed by a
/// blank line. A page whose layout no longer matches yields "".
pub fn parse_content(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Some(body) = walk(doc.root_element(), ARTICLE_BODY_PATH) else {
        warn!("article page layout not recognized, no body");
        return String::new();
    };
    children(body, "p")
        .map(own_text)
        .filter(|t| !t.is_empty())
        .fold(String::new(), |mut out, t| {
            out.push_str("\n\n");
            out.push_str(&t);
            out
        })
}

/// Insert into a memo map holding at most `capacity` entries, evicting an
/// arbitrary older entry when full.
fn insert_bounded<K: Eq + Hash + Clone, V>(
    map: &mut HashMap<K, V>,
    capacity: usize,
    key: K,
    value: V,
) {
    if !map.contains_key(&key) && map.len() >= capacity {
        if let Some(evict) = map.keys().next().cloned() {
            map.remove(&evict);
        }
    }
    map.insert(key, value);
}

/// Scrapes the animal law database. Search results and articles are cached,
/// up to `cache_capacity` entries each.
pub struct LegalDatabaseClient {
    base_url: String,
    http: reqwest::Client,
    cache_capacity: usize,
    searches: Mutex<HashMap<(String, MaterialType), Vec<SearchEntry>>>,
    articles: Mutex<HashMap<String, String>>,
}

impl Default for LegalDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LegalDatabaseClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE.into(),
            http: reqwest::Client::builder()
                .user_agent("pawlegal/0.1 (animal-welfare legal assistant)")
                .build()
                .unwrap_or_default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            searches: Mutex::new(HashMap::new()),
            articles: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_cache_capacity(mut self, entries: usize) -> Self {
        self.cache_capacity = entries.max(1);
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .text()
            .await
            .context("reading response body")
    }

    /// Search the database, matching each word of `query`.
    pub async fn search(
        &self,
        query: &str,
        material_type: MaterialType,
    ) -> Result<Vec<SearchEntry>> {
        let key = (query.to_string(), material_type);
        if let Some(hit) = self.searches.lock().await.get(&key) {
            debug!(query, %material_type, "search cache hit");
            return Ok(hit.clone());
        }

        let url = build_url_at(&self.base_url, material_type, CombineOp::Word, query, 0);
        let html = self.get_text(&url).await?;
        let entries = parse_search(&html);
        info!(query, %material_type, results = entries.len(), "legal database search");

        insert_bounded(
            &mut *self.searches.lock().await,
            self.cache_capacity,
            key,
            entries.clone(),
        );
        Ok(entries)
    }

    /// Full text of the article at `href`. The article URL is recorded in
    /// `sources`, cached or not.
    pub async fn fetch_article(&self, href: &str, sources: &SourceLog) -> Result<String> {
        let url = href_url_at(&self.base_url, href);
        let cached = self.articles.lock().await.get(href).cloned();
        let text = match cached {
            Some(text) => {
                debug!(href, "article cache hit");
                text
            }
            None => {
                let html = self.get_text(&url).await?;
                let text = parse_content(&html);
                info!(href, text_len = text.len(), "fetched legal database article");
                insert_bounded(
                    &mut *self.articles.lock().await,
                    self.cache_capacity,
                    href.to_string(),
                    text.clone(),
                );
                text
            }
        };
        sources.record(url);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_matches_site_filter_format() {
        assert_eq!(
            build_url(MaterialType::All, CombineOp::Word, "bear captivity", 0),
            "https://www.animallaw.info/filters?topic=All&species=All&type=All&country=All&jurisdiction=All&word=contains&keyword=bear+captivity&page=0"
        );
    }

    #[test]
    fn url_encodes_material_type_and_keyword() {
        let url = build_url(MaterialType::LocalOrdinance, CombineOp::Contains, "dogs & cats", 2);
        assert!(url.contains("type=Local%20Ordinance"));
        assert!(url.contains("&contains=contains&"));
        assert!(url.contains("keyword=dogs+%26+cats&page=2"));
    }

    #[test]
    fn empty_query_gives_empty_keyword() {
        let url = build_url(MaterialType::Case, CombineOp::Word, "", 0);
        assert!(url.ends_with("&keyword=&page=0"));
    }

    #[test]
    fn href_is_joined_to_site_root() {
        assert_eq!(href_url("/case/bear_rescue"), "https://www.animallaw.info/case/bear_rescue");
        assert_eq!(href_url_at("http://127.0.0.1:9/", "/case/x"), "http://127.0.0.1:9/case/x");
    }

    #[test]
    fn bounded_insert_evicts_when_full() {
        let mut map = HashMap::new();
        insert_bounded(&mut map, 2, "a", 1);
        insert_bounded(&mut map, 2, "b", 2);
        insert_bounded(&mut map, 2, "b", 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map["b"], 3);
        insert_bounded(&mut map, 2, "c", 4);
        assert_eq!(map.len(), 2);
        assert_eq!(map["c"], 4);
    }

    #[test]
    fn own_text_skips_nested_elements() {
        let doc = Html::parse_fragment("<p>Before <b>bold</b>  after\n more</p>");
        let p = doc
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .unwrap();
        assert_eq!(own_text(p), "Before after more");
    }
}
