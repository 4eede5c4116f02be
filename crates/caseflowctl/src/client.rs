//! HTTP client for the caseflow daemon

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use serde_json::Value;

use caseflow_common::{Case, CaseAssignment, CourtAssignment};

/// Wire shape of a rejected request
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Case projection as returned by GET /v1/cases/:id
#[derive(Debug, Deserialize)]
pub struct CaseDetailView {
    pub case: Case,
    #[serde(default)]
    pub assignments: Vec<CaseAssignment>,
    #[serde(default)]
    pub court_assignment: Option<CourtAssignment>,
    #[serde(default)]
    pub final_report: Option<Value>,
}

/// Response of every transition endpoint
#[derive(Debug, Deserialize)]
pub struct TransitionView {
    pub case: Case,
    #[serde(default)]
    pub assignment_id: Option<String>,
}

/// Client carrying the actor context as headers
pub struct CaseflowClient {
    http: reqwest::Client,
    base: String,
    user: Option<String>,
    role: Option<String>,
    org: Option<String>,
}

impl CaseflowClient {
    pub fn new(base: &str, user: Option<String>, role: Option<String>, org: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            user,
            role,
            org,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn with_actor(&self, rb: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let (Some(user), Some(role), Some(org)) = (&self.user, &self.role, &self.org) else {
            bail!("this command acts on a case; pass --user, --role and --org");
        };
        Ok(rb
            .header("x-user-id", user)
            .header("x-user-role", role)
            .header("x-org-unit", org))
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let rb = self.with_actor(self.http.post(self.url(path)))?;
        let resp = rb.json(body).send().await.map_err(|e| self.unreachable(e))?;
        Self::handle(resp).await
    }

    pub async fn post_empty(&self, path: &str) -> Result<Value> {
        let rb = self.with_actor(self.http.post(self.url(path)))?;
        let resp = rb.send().await.map_err(|e| self.unreachable(e))?;
        Self::handle(resp).await
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Self::handle(resp).await
    }

    fn unreachable(&self, err: reqwest::Error) -> anyhow::Error {
        anyhow!(
            "cannot reach caseflowd at {}: {}\n\
             Is the daemon running? Start it with: caseflowd",
            self.base,
            err
        )
    }

    async fn handle(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if status.is_success() {
            if status == reqwest::StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return Ok(resp.json().await.unwrap_or(Value::Null));
        }
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(e) => Err(anyhow!("{} ({}): {}", e.error, status.as_u16(), e.message)),
            Err(_) => Err(anyhow!("request failed with {}: {}", status, body)),
        }
    }
}
