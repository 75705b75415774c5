//! HTTP client for the guidebook backend
//!
//! Public reads (countries, content, PDFs) and the bearer-authenticated
//! admin calls. Content reads implement [`ContentFetcher`] so the loader can
//! sit directly on top of this client.

use crate::config::ClientConfig;
use crate::error::ContentError;
use crate::fetcher::{parse_last_modified, ContentFetcher};
use crate::session::AdminSession;
use async_trait::async_trait;
use chrono::Utc;
use guidebook_types::{
    ColorPalette, ContentData, Country, CountryPatch, ErrorBody, LoginRequest, MenuItem,
    NewCountry, SaveContentResponse, UploadResponse,
};
use reqwest::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, info};

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Backend API client (cheap to clone)
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ContentError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("guidebook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ContentError::InvalidConfig {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===================
    // Public reads
    // ===================

    pub async fn countries(&self) -> Result<Vec<Country>, ContentError> {
        let response = send(self.http.get(self.url("countries")), "fetch countries").await?;
        let response = expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ContentError::network("Failed to decode countries", e))
    }

    pub async fn country(&self, slug: &str) -> Result<Country, ContentError> {
        let response = send(
            self.http.get(self.url(&format!("countries/{slug}"))),
            "fetch country",
        )
        .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ContentError::CountryNotFound {
                slug: slug.to_string(),
            });
        }

        expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ContentError::network("Failed to decode country", e))
    }

    /// Direct URL of a PDF, for handing to a viewer widget
    pub fn pdf_url(&self, country: &str, path: &str) -> String {
        self.url(&format!("pdf/{country}/{path}"))
    }

    pub async fn pdf_exists(&self, country: &str, path: &str) -> Result<bool, ContentError> {
        let response = send(self.http.head(self.pdf_url(country, path)), "check PDF").await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(ContentError::UnexpectedStatus {
                status: status.as_u16(),
                message: "Failed to check PDF".to_string(),
            }),
        }
    }

    async fn get_content(
        &self,
        country: &str,
        path: &str,
        known_version: Option<&str>,
    ) -> Result<Option<ContentData>, ContentError> {
        let mut request = self.http.get(self.url(&format!("content/{country}/{path}")));
        if let Some(tag) = known_version.filter(|tag| !tag.is_empty()) {
            request = request.header(IF_NONE_MATCH, tag);
        }

        let response = send(request, "fetch content").await?;

        match response.status() {
            StatusCode::NOT_MODIFIED => {
                debug!(country, path, "Content not modified");
                return Ok(None);
            }
            StatusCode::NOT_FOUND => {
                return Err(ContentError::ContentNotFound {
                    country: country.to_string(),
                    path: path.to_string(),
                });
            }
            _ => {}
        }

        let response = expect_success(response).await?;

        let headers = response.headers();
        let version_tag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let last_modified = parse_last_modified(
            headers.get(LAST_MODIFIED).and_then(|v| v.to_str().ok()),
        )
        .unwrap_or_else(Utc::now);

        let body = response
            .text()
            .await
            .map_err(|e| ContentError::network("Failed to read content body", e))?;

        Ok(Some(ContentData {
            body,
            version_tag,
            last_modified,
        }))
    }

    // ===================
    // Admin
    // ===================

    /// Exchange the admin password for a session
    pub async fn login(&self, password: &str) -> Result<AdminSession, ContentError> {
        let response = send(
            self.http.post(self.url("admin/login")).json(&LoginRequest {
                password: password.to_string(),
            }),
            "log in",
        )
        .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ContentError::InvalidCredentials);
        }
        expect_success(response).await?;

        info!("Admin session started");
        Ok(AdminSession::new(password.to_string()))
    }

    pub async fn create_country(
        &self,
        session: &AdminSession,
        country: &NewCountry,
    ) -> Result<Country, ContentError> {
        let request = self.http.post(self.url("admin/countries")).json(country);
        let response = self.send_admin(session, request, "create country").await?;
        decode(response, "created country").await
    }

    pub async fn update_country(
        &self,
        session: &AdminSession,
        slug: &str,
        patch: &CountryPatch,
    ) -> Result<Country, ContentError> {
        let request = self
            .http
            .put(self.url(&format!("admin/countries/{slug}")))
            .json(patch);
        let response = self.send_admin(session, request, "update country").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ContentError::CountryNotFound {
                slug: slug.to_string(),
            });
        }
        decode(response, "updated country").await
    }

    /// Persist a reordered or edited menu tree
    pub async fn update_menu(
        &self,
        session: &AdminSession,
        slug: &str,
        mut items: Vec<MenuItem>,
    ) -> Result<Country, ContentError> {
        MenuItem::renumber(&mut items);
        self.update_country(session, slug, &CountryPatch::menu(items))
            .await
    }

    pub async fn update_palette(
        &self,
        session: &AdminSession,
        slug: &str,
        palette: ColorPalette,
    ) -> Result<Country, ContentError> {
        self.update_country(session, slug, &CountryPatch::palette(palette))
            .await
    }

    pub async fn delete_country(
        &self,
        session: &AdminSession,
        slug: &str,
    ) -> Result<(), ContentError> {
        let request = self.http.delete(self.url(&format!("admin/countries/{slug}")));
        let response = self.send_admin(session, request, "delete country").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ContentError::CountryNotFound {
                slug: slug.to_string(),
            });
        }
        expect_success(response).await?;
        Ok(())
    }

    pub async fn save_content(
        &self,
        session: &AdminSession,
        country: &str,
        path: &str,
        markdown: &str,
    ) -> Result<SaveContentResponse, ContentError> {
        let request = self
            .http
            .put(self.url(&format!("admin/content/{country}/{path}")))
            .header(CONTENT_TYPE, "text/markdown")
            .body(markdown.to_string());
        let response = self.send_admin(session, request, "save content").await?;
        decode(response, "save response").await
    }

    pub async fn delete_content(
        &self,
        session: &AdminSession,
        country: &str,
        path: &str,
    ) -> Result<(), ContentError> {
        let request = self
            .http
            .delete(self.url(&format!("admin/content/{country}/{path}")));
        let response = self.send_admin(session, request, "delete content").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ContentError::ContentNotFound {
                country: country.to_string(),
                path: path.to_string(),
            });
        }
        expect_success(response).await?;
        Ok(())
    }

    /// Upload a PDF as multipart field `file`
    pub async fn upload_pdf(
        &self,
        session: &AdminSession,
        country: &str,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ContentError> {
        let mime = if file_name.to_ascii_lowercase().ends_with(".docx") {
            DOCX_MIME
        } else {
            PDF_MIME
        };

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| ContentError::network("Invalid upload MIME type", e))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .http
            .post(self.url(&format!("admin/upload/{country}/{path}")))
            .multipart(form);
        let response = self.send_admin(session, request, "upload PDF").await?;
        decode(response, "upload response").await
    }

    /// Attach the bearer secret; a 401 ends the session
    async fn send_admin(
        &self,
        session: &AdminSession,
        request: RequestBuilder,
        action: &str,
    ) -> Result<Response, ContentError> {
        let Some(secret) = session.bearer() else {
            return Err(ContentError::Unauthorized);
        };

        let response = send(request.bearer_auth(secret), action).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            session.reject();
            return Err(ContentError::Unauthorized);
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentFetcher for ApiClient {
    async fn fetch(&self, country: &str, path: &str) -> Result<ContentData, ContentError> {
        self.get_content(country, path, None)
            .await?
            .ok_or_else(|| ContentError::UnexpectedStatus {
                status: StatusCode::NOT_MODIFIED.as_u16(),
                message: "Unconditional request answered 304".to_string(),
            })
    }

    async fn fetch_if_changed(
        &self,
        country: &str,
        path: &str,
        known_version: &str,
    ) -> Result<Option<ContentData>, ContentError> {
        let fresh = self.get_content(country, path, Some(known_version)).await?;
        Ok(fresh.filter(|data| data.version_tag != known_version))
    }
}

async fn send(request: RequestBuilder, action: &str) -> Result<Response, ContentError> {
    request
        .send()
        .await
        .map_err(|e| ContentError::network(format!("Failed to {action}"), e))
}

/// Pass 2xx through; turn anything else into `UnexpectedStatus` with the
/// backend's error message when it sent one
async fn expect_success(response: Response) -> Result<Response, ContentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    Err(ContentError::UnexpectedStatus {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: Response,
    what: &str,
) -> Result<T, ContentError> {
    expect_success(response)
        .await?
        .json()
        .await
        .map_err(|e| ContentError::network(format!("Failed to decode {what}"), e))
}
