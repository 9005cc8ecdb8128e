use std::{
    fs::File,
    io::{self, Read},
    path::PathBuf,
};

use tracing::debug;

use crate::command::Error;

/// Where the contact stream comes from, as given on the command line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StreamSource {
    Http(String),
    Stdin,
    File(PathBuf),
}

impl StreamSource {
    pub fn parse(uri: &str) -> Self {
        if uri == "-" {
            return Self::Stdin;
        }
        let lower = uri.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::Http(uri.to_string());
        }
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        Self::File(PathBuf::from(path))
    }

    pub fn open(&self) -> Result<Box<dyn Read>, Error> {
        match self {
            Self::Http(url) => {
                debug!(%url, "fetching contact stream");
                let response = reqwest::blocking::get(url)
                    .and_then(|response| response.error_for_status())
                    .map_err(|source| Error::Fetch {
                        url: url.clone(),
                        source,
                    })?;
                Ok(Box::new(response))
            }
            Self::Stdin => Ok(Box::new(io::stdin().lock())),
            Self::File(path) => {
                let file = File::open(path).map_err(|source| Error::OpenStream {
                    path: path.clone(),
                    source,
                })?;
                Ok(Box::new(file))
            }
        }
    }
}
