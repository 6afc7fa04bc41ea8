//! Incident record as returned by the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vessa_core::types::{IncidentId, PageRequest, PageResponse};

use super::severity::IncidentSeverity;
use super::status::IncidentStatus;

/// A security incident raised by the WAF or another detection source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: IncidentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: IncidentSeverity,
    #[serde(default)]
    pub status: IncidentStatus,
    /// `api_gateway`, `waf`, `ids`, `manual`, ...
    #[serde(default)]
    pub detection_source: Option<String>,
    #[serde(default)]
    pub affected_assets: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::timestamp::option")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
    #[serde(default)]
    pub false_positive: bool,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

/// Gateway listing page for incidents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentPage {
    #[serde(default)]
    pub items: Vec<IncidentRecord>,
    #[serde(default, alias = "total")]
    pub total_items: u64,
    #[serde(default)]
    pub total_pages: Option<u64>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u64>,
}

impl IncidentPage {
    /// Normalise into a [`PageResponse`], filling gaps from the request.
    pub fn into_page(self, request: PageRequest) -> PageResponse<IncidentRecord> {
        let page = self.page.unwrap_or(request.page);
        let page_size = self.page_size.unwrap_or(request.page_size);
        let mut response = PageResponse::new(self.items, page, page_size, self.total_items);
        if let Some(total_pages) = self.total_pages {
            response.total_pages = total_pages.max(1);
        }
        response
    }
}

/// Filters for the incident listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentQuery {
    pub page: PageRequest,
    pub severity: Option<IncidentSeverity>,
    pub status: Option<IncidentStatus>,
    pub tag: Option<String>,
}

impl IncidentQuery {
    /// Query parameters in gateway wire format.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.page.to_string()),
            ("page_size", self.page.page_size.to_string()),
        ];
        if let Some(severity) = &self.severity {
            params.push(("severity", severity.to_string()));
        }
        if let Some(status) = &self.status {
            params.push(("status", status.to_string()));
        }
        if let Some(tag) = &self.tag {
            params.push(("tag", tag.clone()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_normalisation() {
        let raw = serde_json::json!({
            "total": 45,
            "items": [{
                "id": "inc-1",
                "title": "XSS attempt",
                "description": "Script tag in comment body",
                "severity": "medium",
                "status": "open",
                "created_at": "2024-05-01T08:00:00",
                "false_positive": false
            }],
            "page": 2,
            "page_size": 20
        });
        let page: IncidentPage = serde_json::from_value(raw).expect("deserialize");
        let normalised = page.into_page(PageRequest::new(2, 20));
        assert_eq!(normalised.total_pages, 3);
        assert_eq!(normalised.items[0].severity, IncidentSeverity::Medium);
        assert!(normalised.has_previous());
    }

    #[test]
    fn test_query_params() {
        let query = IncidentQuery {
            page: PageRequest::new(1, 10),
            severity: Some(IncidentSeverity::Critical),
            status: None,
            tag: Some("sqli".to_string()),
        };
        let params = query.to_params();
        assert!(params.contains(&("severity", "critical".to_string())));
        assert!(params.contains(&("tag", "sqli".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "status"));
    }
}
