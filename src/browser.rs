use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpenUrlError {
    #[error("Refusing to open invalid URL: {0}")]
    Invalid(String),
    #[error("Refusing to open {0} link (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Only web links may reach the system opener; cached URLs come from feeds.
pub fn validate_url_for_open(url: &str) -> Result<Url, OpenUrlError> {
    let parsed = Url::parse(url).map_err(|_| OpenUrlError::Invalid(url.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(OpenUrlError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Something that can show a URL to the user.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Opens URLs with the platform's default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}
