// src/sec/client.rs
use crate::sec::models::{FilingPeriod, IndexDocument};
use crate::utils::error::FetchError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;

/// Page listing every published "Official List of Section 13(f) Securities".
pub const SEC_13F_LIST_URL: &str = "https://www.sec.gov/divisions/investment/13flists.htm";
/// Lists before this year are scanned images without a text layer.
pub const DEFAULT_MIN_YEAR: u16 = 2004;
/// SEC asks for 10 requests/second max. Stay well below that.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 200;

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[href]").expect("Failed to compile LINK_SELECTOR")
});

// Link text such as "4th Quarter 2005"
static QUARTER_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d)(?:st|nd|rd|th)\s+quarter\s+(\d{4})").expect("Failed to compile QUARTER_LINK_RE")
});

/// Settings for talking to sec.gov.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub index_url: String,
    /// SEC requires a declared "Name email" user agent on automated requests.
    pub user_agent: String,
    pub min_year: u16,
    pub request_delay: Duration,
}

impl FetchConfig {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            index_url: SEC_13F_LIST_URL.to_string(),
            user_agent: user_agent.into(),
            min_year: DEFAULT_MIN_YEAR,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
        }
    }
}

/// Creates a reqwest client configured for sec.gov interaction.
pub fn build_sec_client(config: &FetchConfig) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str()) // Set the required User-Agent
        .gzip(true)
        .build()?;
    Ok(client)
}

/// GETs a URL and maps the common SEC failure statuses onto [`FetchError`].
async fn get_checked(client: &reqwest::Client, url: &str) -> Result<reqwest::Response, FetchError> {
    let response = client.get(url)
        .header(header::ACCEPT, "text/html,application/pdf,*/*")
        .send()
        .await?; // Propagates reqwest::Error as FetchError::Network

    let status = response.status();
    if !status.is_success() {
        tracing::error!("HTTP error status: {} for URL: {}", status, url);
        if status == reqwest::StatusCode::FORBIDDEN {
            tracing::warn!("Received 403 Forbidden - check User-Agent and rate limits.");
            return Err(FetchError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::DocumentNotFound(url.to_string()));
        }
        return Err(FetchError::Http(status));
    }

    Ok(response)
}

/// Downloads the 13F list page and returns the quarterly documents it links to.
pub async fn fetch_index(client: &reqwest::Client, config: &FetchConfig) -> Result<Vec<IndexDocument>, FetchError> {
    tracing::info!("Fetching 13F list index from: {}", config.index_url);
    tracing::debug!("Using User-Agent: {}", config.user_agent);

    let body = get_checked(client, &config.index_url).await?.text().await?;
    tracing::debug!("Index page is {} bytes", body.len());

    parse_index_page(&body, &config.index_url, config.min_year)
}

/// Pulls quarterly list links out of the index page HTML.
///
/// Links are kept in page order. Relative hrefs are resolved against `base_url`.
/// Periods before `min_year` and repeated periods are dropped.
pub fn parse_index_page(html: &str, base_url: &str, min_year: u16) -> Result<Vec<IndexDocument>, FetchError> {
    let base = Url::parse(base_url)
        .map_err(|e| FetchError::InvalidUrl(base_url.to_string(), e.to_string()))?;
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    for link in document.select(&LINK_SELECTOR) {
        let text = link.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        let Some(caps) = QUARTER_LINK_RE.captures(&text) else {
            continue;
        };
        let (Ok(quarter), Ok(year)) = (caps[1].parse::<u8>(), caps[2].parse::<u16>()) else {
            continue;
        };
        if year < min_year {
            tracing::trace!("Skipping list for {} quarter {} (before {})", year, quarter, min_year);
            continue;
        }
        let period = match FilingPeriod::new(year, quarter) {
            Ok(period) => period,
            Err(e) => {
                tracing::warn!("Ignoring link '{}': {}", text, e);
                continue;
            }
        };

        // a[href] guarantees the attribute
        let href = link.value().attr("href").unwrap_or_default();
        let url = base
            .join(href)
            .map_err(|e| FetchError::InvalidUrl(href.to_string(), e.to_string()))?;

        if !seen.insert(period) {
            tracing::debug!("Duplicate link for {} -> {}", period, url);
            continue;
        }
        documents.push(IndexDocument::new(period, url.as_str()));
    }

    if documents.is_empty() {
        return Err(FetchError::Parse(format!("No quarterly list links found at {}", base_url)));
    }

    Ok(documents)
}

/// Downloads one quarterly list PDF.
/// Includes basic rate limiting ahead of the request.
pub async fn download_document(
    client: &reqwest::Client,
    config: &FetchConfig,
    doc: &IndexDocument,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::sleep(config.request_delay).await;

    tracing::info!("Downloading {} from: {}", doc.period, doc.url);
    let bytes = get_checked(client, &doc.url).await?.bytes().await?;
    tracing::debug!("Successfully downloaded {} bytes from {}", bytes.len(), doc.url);

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"
        <html><body>
        <h1>Official List of Section 13(f) Securities</h1>
        <ul>
          <li><a href="/divisions/investment/13f/13flist2023q4.pdf">4th Quarter 2023</a></li>
          <li><a href="/divisions/investment/13f/13flist2023q3.pdf">3rd
              Quarter   2023</a></li>
          <li><a href="https://www.sec.gov/divisions/investment/13f/13flist2004q1.pdf">1st Quarter 2004</a></li>
          <li><a href="/divisions/investment/13f/13flist2003q4.pdf">4th Quarter 2003</a></li>
          <li><a href="/divisions/investment/13f-faq.htm">Frequently Asked Questions</a></li>
          <li><a href="/divisions/investment/13f/13flist2023q4-copy.pdf">4th quarter 2023</a></li>
        </ul>
        </body></html>
    "#;

    #[test]
    fn test_parse_index_page_finds_quarterly_links() {
        let docs = parse_index_page(INDEX_HTML, SEC_13F_LIST_URL, DEFAULT_MIN_YEAR).unwrap();

        let periods: Vec<String> = docs.iter().map(|d| d.period.to_string()).collect();
        assert_eq!(periods, vec!["2023Q4", "2023Q3", "2004Q1"]);
        assert_eq!(docs[0].url, "https://www.sec.gov/divisions/investment/13f/13flist2023q4.pdf");
        assert_eq!(docs[2].url, "https://www.sec.gov/divisions/investment/13f/13flist2004q1.pdf");
    }

    #[test]
    fn test_parse_index_page_respects_min_year() {
        let docs = parse_index_page(INDEX_HTML, SEC_13F_LIST_URL, 2023).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.period.year == 2023));
    }

    #[test]
    fn test_parse_index_page_without_links_is_an_error() {
        let html = "<html><body><p>Page moved.</p></body></html>";
        let result = parse_index_page(html, SEC_13F_LIST_URL, DEFAULT_MIN_YEAR);
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_fetch_config_defaults() {
        let config = FetchConfig::new("Jane Doe jane@example.com");
        assert_eq!(config.index_url, SEC_13F_LIST_URL);
        assert_eq!(config.min_year, 2004);
        assert_eq!(config.request_delay, Duration::from_millis(200));
    }

    fn mock_config(server: &mockito::Server) -> FetchConfig {
        FetchConfig {
            index_url: format!("{}/13flists.htm", server.url()),
            request_delay: Duration::ZERO,
            ..FetchConfig::new("Jane Doe jane@example.com")
        }
    }

    #[tokio::test]
    async fn test_download_document_maps_statuses() {
        let mut server = mockito::Server::new_async().await;
        let ok = server.mock("GET", "/13f/2023q4.pdf")
            .match_header("user-agent", "Jane Doe jane@example.com")
            .with_status(200)
            .with_body("%PDF-1.4\n")
            .create_async()
            .await;
        let _forbidden = server.mock("GET", "/13f/2023q3.pdf").with_status(403).create_async().await;
        let _missing = server.mock("GET", "/13f/2023q2.pdf").with_status(404).create_async().await;
        let _broken = server.mock("GET", "/13f/2023q1.pdf").with_status(500).create_async().await;

        let config = mock_config(&server);
        let client = build_sec_client(&config).unwrap();
        let doc = |quarter: u8| {
            let period = FilingPeriod::new(2023, quarter).unwrap();
            IndexDocument::new(period, format!("{}/13f/2023q{}.pdf", server.url(), quarter))
        };

        let bytes = download_document(&client, &config, &doc(4)).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4\n");
        ok.assert_async().await;

        let result = download_document(&client, &config, &doc(3)).await;
        assert!(matches!(result, Err(FetchError::RateLimited)));

        let result = download_document(&client, &config, &doc(2)).await;
        match result {
            Err(FetchError::DocumentNotFound(url)) => assert!(url.ends_with("/13f/2023q2.pdf")),
            other => panic!("expected DocumentNotFound, got {:?}", other),
        }

        let result = download_document(&client, &config, &doc(1)).await;
        assert!(matches!(result, Err(FetchError::Http(status)) if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_fetch_index_resolves_links_against_index_url() {
        let mut server = mockito::Server::new_async().await;
        let _index = server.mock("GET", "/13flists.htm")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(INDEX_HTML)
            .create_async()
            .await;

        let config = mock_config(&server);
        let client = build_sec_client(&config).unwrap();
        let docs = fetch_index(&client, &config).await.unwrap();

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].url, format!("{}/divisions/investment/13f/13flist2023q4.pdf", server.url()));
    }
}
