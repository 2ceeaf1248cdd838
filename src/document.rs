use reqwest::blocking::Client;
use scraper::{Html, Selector};

use crate::error::{PipelineError, Result};

pub trait DocumentFetcher {
    fn fetch(&self, url: &str) -> Result<Html>;
}

pub struct HttpDocumentFetcher {
    client: Client,
}

impl HttpDocumentFetcher {
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl DocumentFetcher for HttpDocumentFetcher {
    fn fetch(&self, url: &str) -> Result<Html> {
        let body = fetch_text(&self.client, url)?;
        Ok(Html::parse_document(&body))
    }
}

pub fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send()?;
    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::Http {
            status,
            url: url.to_string(),
        });
    }
    Ok(resp.text()?)
}

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| PipelineError::Selector(format!("{css}: {err}")))
}

pub fn element_text(el: &scraper::ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
