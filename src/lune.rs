//! Blocking client for the Lune API.
//!
//! Only the handful of endpoints the pipeline needs are covered, and the
//! response models only declare the fields that are used; everything else
//! in a response body is ignored.
//!
//! Error statuses come back as [`RemoteError::Api`] carrying the API's
//! error code. HTTP 429 is retried with exponential backoff since a rate
//! limited request never reached the handler; nothing else is retried.

use crate::remote::{AccountMode, Entity, OffsetService, PurchaseRequest, RemoteError};
use log::debug;
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::thread;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.lune.co";
pub const DEFAULT_PORTFOLIO: &str = "Oxford Offsetting Principles Portfolio";

const PAGE_BASE_URL: &str = "https://sustainability.lune.co";
const ACCOUNT_HEADER: &str = "Lune-Account";
const REQUEST_ID_HEADER: &str = "cf-ray";
const IDEMPOTENCY_CONFLICT: &str = "order_idempotency_already_exists";
const PAGE_SIZE: &str = "100";
const SLUG_LEN: usize = 40;
const MAX_ATTEMPTS: u32 = 5;
const BACKOFF: Duration = Duration::from_millis(200);
const TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings, read from the environment by the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuneSettings {
    pub api_key: String,
    pub api_url: String,
    /// Label of the bundle portfolio orders are split across.
    pub portfolio: String,
}

impl LuneSettings {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        LuneSettings {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            portfolio: DEFAULT_PORTFOLIO.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Account {
    id: String,
    name: String,
    #[serde(rename = "type")]
    mode: AccountMode,
    currency: String,
    #[serde(default)]
    beneficiary: Option<String>,
}

impl Account {
    fn into_entity(self) -> Entity {
        Entity {
            id: self.id,
            name: self.name,
            mode: self.mode,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResultPage<T> {
    data: Vec<T>,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct LogoUpload {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SustainabilityPage {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct Order {
    id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BundleSelectionItem {
    bundle_id: String,
    // The API hands out both numbers and strings here.
    percentage: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BundlePortfolio {
    label: String,
    bundle_selection: Vec<BundleSelectionItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    message: Option<String>,
}

/// [`OffsetService`] backed by the Lune HTTP API.
pub struct LuneClient {
    http: Client,
    settings: LuneSettings,
    main_account: Option<Account>,
    client_accounts: Option<Vec<Account>>,
    bundle_selection: Option<Vec<BundleSelectionItem>>,
}

impl LuneClient {
    /// Builds the client. No request is made until the first call.
    pub fn new(settings: LuneSettings) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(TIMEOUT).build()?;
        Ok(LuneClient {
            http,
            settings,
            main_account: None,
            client_accounts: None,
            bundle_selection: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    /// Sends the request built by `build`, retrying while rate limited.
    ///
    /// The builder runs once per attempt because request bodies (multipart
    /// uploads in particular) cannot be replayed.
    fn execute<T, F>(&self, build: F) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> Result<RequestBuilder, RemoteError>,
    {
        let mut attempt = 1;
        loop {
            let response = build(&self.http)?
                .bearer_auth(&self.settings.api_key)
                .send()?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let delay = BACKOFF * 2u32.pow(attempt - 1);
                debug!("Rate limited by the API, retrying in {:?}", delay);
                thread::sleep(delay);
                attempt += 1;
                continue;
            }
            return decode(response);
        }
    }

    fn main_account(&mut self) -> Result<Account, RemoteError> {
        if let Some(account) = &self.main_account {
            return Ok(account.clone());
        }
        let url = self.url("accounts/me");
        let account: Account = self.execute(|http| Ok(http.get(&url)))?;
        debug!("Main account {} ({:?}, {})", account.id, account.mode, account.currency);
        self.main_account = Some(account.clone());
        Ok(account)
    }

    fn list_client_accounts(&self) -> Result<Vec<Account>, RemoteError> {
        let url = self.url("accounts/client");
        let mut accounts = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page: ResultPage<Account> = self.execute(|http| {
                let mut query = vec![("limit", PAGE_SIZE.to_string())];
                if let Some(after) = &after {
                    query.push(("after", after.clone()));
                }
                Ok(http.get(&url).query(&query))
            })?;
            after = page.data.last().map(|a| a.id.clone());
            accounts.extend(page.data);
            if !page.has_more || after.is_none() {
                return Ok(accounts);
            }
        }
    }

    /// Client accounts, listed once per client and kept current by
    /// `create_entity`.
    fn client_accounts(&mut self) -> Result<&[Account], RemoteError> {
        if self.client_accounts.is_none() {
            let accounts = self.list_client_accounts()?;
            debug!("Listed {} client accounts", accounts.len());
            self.client_accounts = Some(accounts);
        }
        Ok(self.client_accounts.as_deref().unwrap_or_default())
    }

    fn bundle_selection(&mut self) -> Result<Vec<BundleSelectionItem>, RemoteError> {
        if let Some(selection) = &self.bundle_selection {
            return Ok(selection.clone());
        }
        let url = self.url("bundle-portfolios");
        let portfolios: Vec<BundlePortfolio> = self.execute(|http| Ok(http.get(&url)))?;

        let label = &self.settings.portfolio;
        let mut matching = portfolios.iter().filter(|p| &p.label == label);
        let selection = match (matching.next(), matching.next()) {
            (Some(portfolio), None) => portfolio.bundle_selection.clone(),
            _ => {
                let available: Vec<&str> = portfolios.iter().map(|p| p.label.as_str()).collect();
                return Err(RemoteError::PortfolioNotFound {
                    label: label.clone(),
                    available: available.join(", "),
                });
            }
        };

        debug!("Using portfolio {:?}: {:?}", label, selection);
        self.bundle_selection = Some(selection.clone());
        Ok(selection)
    }

    fn upload_logo(&self, account_id: &str, logo: &Path) -> Result<(), RemoteError> {
        let url = self.url(&format!("accounts/client/{}/logo", account_id));
        let upload: LogoUpload = self.execute(|http| {
            let form = multipart::Form::new()
                .file("logo", logo)
                .map_err(RemoteError::Logo)?;
            Ok(http.post(&url).multipart(form))
        })?;
        debug!("Uploaded logo for {}: {}", account_id, upload.url);
        Ok(())
    }

    fn current_page(&self, account_id: &str) -> Result<Option<SustainabilityPage>, RemoteError> {
        let url = self.url("sustainability-pages/current-account");
        let result: Result<SustainabilityPage, RemoteError> =
            self.execute(|http| Ok(http.get(&url).header(ACCOUNT_HEADER, account_id)));
        match result {
            Ok(page) => Ok(Some(page)),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_page(
        &self,
        entity: &Entity,
        beneficiary: &str,
    ) -> Result<SustainabilityPage, RemoteError> {
        let url = self.url("sustainability-pages");
        let slug = page_slug(beneficiary, &entity.id);
        debug!("Creating page {} for account {}", slug, entity.id);
        let body = json!({
            "status": "enabled",
            "slug": slug,
            "title": "by_volume",
            "description": "by_custom_description",
            "custom_description": format!("On behalf of {}", entity.name),
            "sections": ["bundles_breakdown", "certificates"],
        });
        self.execute(|http| {
            Ok(http
                .post(&url)
                .header(ACCOUNT_HEADER, entity.id.as_str())
                .json(&body))
        })
    }

    fn order_by_idempotency_key(&self, account_id: &str, key: &str) -> Result<Order, RemoteError> {
        let url = self.url(&format!("orders/by-idempotency-key/{}", key));
        self.execute(|http| Ok(http.get(&url).header(ACCOUNT_HEADER, account_id)))
    }
}

impl OffsetService for LuneClient {
    fn account_mode(&mut self) -> Result<AccountMode, RemoteError> {
        Ok(self.main_account()?.mode)
    }

    fn find_entity(
        &mut self,
        name: &str,
        beneficiary: &str,
    ) -> Result<Option<Entity>, RemoteError> {
        let mut matching: Vec<Account> = self
            .client_accounts()?
            .iter()
            .filter(|a| a.name == name)
            .filter(|a| a.beneficiary.as_deref().map_or(true, |b| b == beneficiary))
            .cloned()
            .collect();

        match matching.len() {
            0 => Ok(None),
            1 => Ok(matching.pop().map(Account::into_entity)),
            count => Err(RemoteError::AmbiguousEntity {
                name: name.to_string(),
                count,
            }),
        }
    }

    fn create_entity(&mut self, name: &str, beneficiary: &str) -> Result<Entity, RemoteError> {
        let currency = self.main_account()?.currency;
        let url = self.url("accounts/client");
        let body = json!({
            "name": name,
            "currency": currency,
            "beneficiary": beneficiary,
        });
        let account: Account = self.execute(|http| Ok(http.post(&url).json(&body)))?;
        if let Some(accounts) = &mut self.client_accounts {
            accounts.push(account.clone());
        }
        Ok(account.into_entity())
    }

    fn configure_page(
        &mut self,
        entity: &Entity,
        beneficiary: &str,
        branding: Option<&Path>,
    ) -> Result<String, RemoteError> {
        // The API does not report whether a logo is set, so it is uploaded
        // every time.
        if let Some(logo) = branding {
            self.upload_logo(&entity.id, logo)?;
        }

        let page = match self.current_page(&entity.id)? {
            Some(page) => page,
            None => self.create_page(entity, beneficiary)?,
        };
        Ok(page_url(entity.mode, &page.slug))
    }

    fn place_purchase(&mut self, request: &PurchaseRequest) -> Result<String, RemoteError> {
        let bundle_selection = self.bundle_selection()?;
        let url = self.url("orders/by-mass");
        let body = json!({
            "mass": {
                "amount": request.quantity.to_grams().to_string(),
                "unit": "g",
            },
            "idempotency_key": request.idempotency_key,
            "bundle_selection": bundle_selection,
        });

        let result: Result<Order, RemoteError> = self.execute(|http| {
            Ok(http
                .post(&url)
                .header(ACCOUNT_HEADER, request.entity_id.as_str())
                .json(&body))
        });
        let order = match result {
            Err(e) if e.code() == Some(IDEMPOTENCY_CONFLICT) => {
                debug!(
                    "Order with key {} already exists, fetching it",
                    request.idempotency_key
                );
                self.order_by_idempotency_key(&request.entity_id, &request.idempotency_key)?
            }
            other => other?,
        };
        Ok(order.id)
    }
}

/// Turns a response into `T` or the API error it carries.
fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();
    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if status.is_client_error() || status.is_server_error() {
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        let body = if is_json {
            response.json::<ErrorEnvelope>().ok().map(|e| e.error)
        } else {
            None
        };
        let (code, message) = body.map_or((None, None), |b| (b.error_code, b.message));
        return Err(RemoteError::Api {
            status: status.as_u16(),
            code,
            message,
            request_id,
        });
    }
    if !status.is_success() {
        return Err(RemoteError::UnexpectedStatus {
            status: status.as_u16(),
        });
    }
    Ok(response.json::<T>()?)
}

/// Deterministic page slug, unlikely to clash with other customers' pages.
fn page_slug(beneficiary: &str, account_id: &str) -> String {
    let digest = Sha256::digest(format!("{} {}", beneficiary, account_id).as_bytes());
    let mut slug = format!("{:x}", digest);
    slug.truncate(SLUG_LEN);
    slug
}

fn page_url(mode: AccountMode, slug: &str) -> String {
    match mode {
        AccountMode::Test => format!("{}/test/{}", PAGE_BASE_URL, slug),
        AccountMode::Live => format!("{}/{}", PAGE_BASE_URL, slug),
    }
}
