//! Three-hop download client
//!
//! 1. AS:  `X-Username` → `seal(user_key, tgs_session) || tgt`
//! 2. TGS: `tgt || seal(tgs_session, auth)` → `seal(tgs_session, fs_session) || service_ticket`
//! 3. FS:  `service_ticket || seal(fs_session, auth)` → resource bytes
//!
//! The password never leaves the process: it only derives the key that opens
//! the AS reply. Every request is bounded by `client.timeout_secs`.

use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use krb_core::config::ClientConfig;
use krb_crypto::{derive_key, SecretKey};
use krb_protocol::wire::{KEY_LENGTH_HEADER, TICKET_LENGTH_HEADER, USERNAME_HEADER};
use krb_protocol::{
    join_segments, open_session_key, parse_length, seal, split_segments, Authenticator,
    EnvelopeError, Payload,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("building HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("{service} URL {url:?} cannot carry a resource path")]
    BaseUrl { service: &'static str, url: String },

    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        source: reqwest::Error,
    },

    #[error("{service} answered {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },

    #[error("{service} reply has missing or invalid {header}")]
    Framing {
        service: &'static str,
        header: &'static str,
    },

    #[error("Invalid Password")]
    InvalidPassword,

    #[error("{service} reply could not be opened: {source}")]
    Protocol {
        service: &'static str,
        source: EnvelopeError,
    },

    #[error("sealing authenticator: {0}")]
    Seal(#[source] EnvelopeError),

    #[error("saving {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A resource written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    pub size: usize,
}

pub struct Client {
    http: reqwest::Client,
    as_url: String,
    tgs_url: String,
    fs_url: Url,
    download_dir: PathBuf,
}

impl Client {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ClientError::Build)?;
        let fs_url = Url::parse(&config.fs_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientError::BaseUrl {
                service: "FS",
                url: config.fs_url.clone(),
            })?;

        Ok(Self {
            http,
            as_url: config.as_url.trim_end_matches('/').to_string(),
            tgs_url: config.tgs_url.trim_end_matches('/').to_string(),
            fs_url,
            download_dir: config.download_dir.clone(),
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Authenticate as `username` and fetch `resource` from the FS.
    ///
    /// A wrong password is detected locally after the AS hop and reported as
    /// [`ClientError::InvalidPassword`]; the TGS is never contacted.
    pub async fn download(
        &self,
        username: &str,
        password: &SecretString,
        resource: &str,
    ) -> Result<Download, ClientError> {
        let (tgs_session, tgt) = self.authenticate(username, password).await?;
        let (fs_session, service_ticket) = self.service_ticket(username, &tgs_session, &tgt).await?;
        self.fetch(username, &fs_session, &service_ticket, resource)
            .await
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<(SecretKey, Vec<u8>), ClientError> {
        let url = format!("{}/auth", self.as_url);
        debug!(url = %url, username = %username, "requesting ticket-granting ticket");
        let response = self
            .http
            .get(&url)
            .header(USERNAME_HEADER, username)
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: "AS", source })?;
        let (enc_session, tgt) = split_reply("AS", response).await?;

        let user_key = derive_key(username, password.expose_secret());
        let tgs_session =
            open_session_key(&user_key, &enc_session).map_err(|_| ClientError::InvalidPassword)?;
        debug!(ticket_len = tgt.len(), "opened TGS session key");
        Ok((tgs_session, tgt))
    }

    async fn service_ticket(
        &self,
        username: &str,
        tgs_session: &SecretKey,
        tgt: &[u8],
    ) -> Result<(SecretKey, Vec<u8>), ClientError> {
        let url = format!("{}/ticket", self.tgs_url);
        debug!(url = %url, "requesting service ticket");
        let response = self
            .authenticated(&url, username, tgt, tgs_session)?
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: "TGS", source })?;
        let (enc_session, service_ticket) = split_reply("TGS", response).await?;

        let fs_session = open_session_key(tgs_session, &enc_session)
            .map_err(|source| ClientError::Protocol { service: "TGS", source })?;
        debug!(ticket_len = service_ticket.len(), "opened FS session key");
        Ok((fs_session, service_ticket))
    }

    async fn fetch(
        &self,
        username: &str,
        fs_session: &SecretKey,
        service_ticket: &[u8],
        resource: &str,
    ) -> Result<Download, ClientError> {
        let url = self.download_url(resource);
        debug!(url = %url, "requesting resource");
        let response = self
            .authenticated(url.as_str(), username, service_ticket, fs_session)?
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: "FS", source })?;
        let response = expect_ok("FS", response)?;

        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .and_then(|n| base_name(&n))
            .or_else(|| base_name(resource))
            .unwrap_or_else(|| "download".to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport { service: "FS", source })?;

        let path = self.download_dir.join(name);
        let io_err = |source| ClientError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(io_err)?;
        tokio::fs::write(&path, &bytes).await.map_err(io_err)?;

        info!(path = %path.display(), size = bytes.len(), "resource saved");
        Ok(Download {
            path,
            size: bytes.len(),
        })
    }

    /// `<fs_url>/download/<resource>` with every resource segment
    /// percent-encoded, so `?` and `#` stay part of the path.
    fn download_url(&self, resource: &str) -> Url {
        let mut url = self.fs_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("download")
                .extend(resource.trim_start_matches('/').split('/'));
        }
        url
    }

    /// `GET url` carrying `ticket || seal(session, Authenticator::now(username))`.
    fn authenticated(
        &self,
        url: &str,
        username: &str,
        ticket: &[u8],
        session: &SecretKey,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let enc_auth = seal(session, &Payload::Authenticator(Authenticator::now(username)))
            .map_err(ClientError::Seal)?;
        Ok(self
            .http
            .get(url)
            .header(TICKET_LENGTH_HEADER, ticket.len().to_string())
            .body(join_segments(ticket, &enc_auth)))
    }
}

fn expect_ok(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(ClientError::Status { service, status });
    }
    Ok(response)
}

/// Split a `session_key || ticket` reply using `X-Key-Length`.
async fn split_reply(
    service: &'static str,
    response: reqwest::Response,
) -> Result<(Vec<u8>, Vec<u8>), ClientError> {
    let response = expect_ok(service, response)?;
    let framing = ClientError::Framing {
        service,
        header: KEY_LENGTH_HEADER,
    };
    let key_len = match parse_length(
        response
            .headers()
            .get(KEY_LENGTH_HEADER)
            .and_then(|v| v.to_str().ok()),
    ) {
        Ok(len) => len,
        Err(_) => return Err(framing),
    };
    let body = response
        .bytes()
        .await
        .map_err(|source| ClientError::Transport { service, source })?;
    match split_segments(&body, key_len) {
        Ok((first, second)) => Ok((first.to_vec(), second.to_vec())),
        Err(_) => Err(framing),
    }
}

/// `filename` parameter of an `attachment` Content-Disposition value.
fn attachment_filename(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, raw) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// Final path component, if it is a plain file name.
fn base_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}
