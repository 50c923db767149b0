use crate::logstore::record::RawRecord;
use crate::logstore::target::Target;
use crate::logstore::{LogStoreError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path segment that marks a G02 log store endpoint
pub const G02_ENDPOINT_MARKER: &str = "uu-cloudlogstore-maing02";

const G01_QUERY_PATH: &str = "Log/getRecordList/exec";
const G02_QUERY_PATH: &str = "log/getRecordList";

/// G02 snake_case fields and their canonical names
const G02_FIELD_REMAP: &[(&str, &str)] = &[
    ("log_level", "logLevel"),
    ("app_version", "appVersion"),
    ("runtime_stack_code", "runtimeStackCode"),
    ("app_deployment_uri", "appDeploymentUri"),
    ("node_image_name", "nodeImageName"),
    ("node_name", "nodeName"),
    ("host_name", "hostName"),
    ("record_type", "recordType"),
    ("correlation_id", "correlationId"),
];

/// Backend generation of the log-record API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiGeneration {
    /// `{totalSize, pageEntries}`, records carry ids
    G01,
    /// `{pageInfo: {total}, itemList}`, snake_case fields, no ids
    G02,
}

impl ApiGeneration {
    /// Anything without the G02 marker is treated as G01.
    pub fn detect(endpoint: &str) -> Self {
        if endpoint.contains(G02_ENDPOINT_MARKER) {
            ApiGeneration::G02
        } else {
            tracing::debug!(endpoint = %endpoint, "No generation marker in endpoint, assuming G01");
            ApiGeneration::G01
        }
    }

    pub fn query_path(&self) -> &'static str {
        match self {
            ApiGeneration::G01 => G01_QUERY_PATH,
            ApiGeneration::G02 => G02_QUERY_PATH,
        }
    }
}

/// Request window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }
}

/// Query parameters set from the target and window; criteria cannot override them
pub const RESERVED_PARAMS: [&str; 4] = ["uuUri", "asid", "from", "to"];

/// Extra `key=value` query parameters forwarded to the log store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria(BTreeMap<String, String>);

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One response page in canonical form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub total: u64,
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct G01Page {
    total_size: u64,
    page_entries: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct G02PageInfo {
    total: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct G02Page {
    page_info: G02PageInfo,
    item_list: Vec<RawRecord>,
}

/// Log store endpoint bound to one API generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_uri: String,
    generation: ApiGeneration,
}

impl Endpoint {
    /// `generation` of `None` detects it from the URI.
    pub fn new(base_uri: &str, generation: Option<ApiGeneration>) -> Self {
        let mut base_uri = base_uri.to_string();
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }
        let generation = generation.unwrap_or_else(|| ApiGeneration::detect(&base_uri));

        Self {
            base_uri,
            generation,
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn generation(&self) -> ApiGeneration {
        self.generation
    }

    /// Build the record-list query URL for one target and window
    pub fn query_url(&self, target: &Target, window: &TimeWindow, criteria: &Criteria) -> Result<String> {
        let raw = format!("{}{}", self.base_uri, self.generation.query_path());
        let mut url = Url::parse(&raw)
            .map_err(|e| LogStoreError::InvalidEndpoint(format!("{}: {}", raw, e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair(self.target_param(target), target.as_str());
            if let Some(from) = window.from {
                query.append_pair("from", &iso_millis(from));
            }
            if let Some(to) = window.to {
                query.append_pair("to", &iso_millis(to));
            }
            for (key, value) in criteria.iter() {
                if RESERVED_PARAMS.contains(&key) {
                    tracing::warn!(criterion = key, "Ignoring criterion that names a reserved query parameter");
                    continue;
                }
                query.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    fn target_param(&self, target: &Target) -> &'static str {
        match (self.generation, target) {
            (ApiGeneration::G02, Target::InstanceId(_)) => "asid",
            _ => "uuUri",
        }
    }

    /// Parse a response body into the canonical page shape
    pub fn parse_page(&self, body: &str) -> Result<Page> {
        match self.generation {
            ApiGeneration::G01 => {
                let page: G01Page = serde_json::from_str(body).map_err(LogStoreError::MalformedPage)?;
                Ok(Page {
                    total: page.total_size,
                    records: page.page_entries,
                })
            }
            ApiGeneration::G02 => {
                let page: G02Page = serde_json::from_str(body).map_err(LogStoreError::MalformedPage)?;
                Ok(Page {
                    total: page.page_info.total,
                    records: page.item_list.into_iter().map(remap_g02_fields).collect(),
                })
            }
        }
    }
}

fn iso_millis(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Rename the known G02 snake_case fields to their canonical names
pub fn remap_g02_fields(mut raw: RawRecord) -> RawRecord {
    for (snake, camel) in G02_FIELD_REMAP {
        if let Some(value) = raw.remove(*snake) {
            raw.insert(camel.to_string(), value);
        }
    }
    raw
}
