//! Addresses of the application instances that make up a farm.

use std::fmt;
use std::str::FromStr;

use url::Url;

use cairn_api_types::BULK_REFRESH_PATH;

use super::error::DomainError;

/// Base URL of a remote application instance.
///
/// Stored with a trailing slash so relative endpoint paths join beneath it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerAddress(Url);

impl ServerAddress {
    pub fn new(mut url: Url) -> Result<Self, DomainError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DomainError::validation(format!(
                "server address `{url}` must use http or https"
            )));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(DomainError::validation(format!(
                "server address `{url}` has no host"
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self(url))
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// URL of the peer's bulk-refresh endpoint.
    pub fn bulk_refresh_endpoint(&self) -> Result<Url, url::ParseError> {
        self.0.join(BULK_REFRESH_PATH)
    }
}

impl FromStr for ServerAddress {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(value.trim()).map_err(|err| {
            DomainError::validation(format!("server address `{value}` is not a URL: {err}"))
        })?;
        Self::new(url)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_addresses_ignore_trailing_slash() {
        let a: ServerAddress = "http://node-a:3000".parse().expect("address");
        let b: ServerAddress = "http://node-a:3000/".parse().expect("address");
        assert_eq!(a, b);
    }

    #[test]
    fn endpoint_joins_under_base_path() {
        let address: ServerAddress = "https://farm.example/site".parse().expect("address");
        let endpoint = address.bulk_refresh_endpoint().expect("endpoint");
        assert_eq!(
            endpoint.as_str(),
            "https://farm.example/site/_cairn/cache-refresh"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!("ftp://node-a/".parse::<ServerAddress>().is_err());
        assert!("not a url".parse::<ServerAddress>().is_err());
    }
}
