use std::collections::BTreeMap;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const PER_PAGE: usize = 100;

/// A pipeline as the remote API reports it. Status stays a raw string here;
/// classification happens at the poll site.
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "ref")]
    pub ref_name: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub name: String,
}

/// Blocking client for the pipeline REST API of one host.
///
/// Authenticated calls send the access token as a `PRIVATE-TOKEN` header;
/// trigger submission authenticates through the trigger token in the form
/// body instead.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(Error::config_invalid_value(
                "CI_API_V4_URL",
                Some(base_url.to_string()),
                "expected an absolute http(s) URL",
            )
            .with_hint("Point CI_API_V4_URL at the REST root, e.g. https://gitlab.com/api/v4"));
        }

        let client = Client::builder()
            .user_agent(format!("roadie/{}", VERSION))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token: token.to_string(),
        })
    }

    pub fn trigger_pipeline(
        &self,
        project_path: &str,
        trigger_token: &str,
        ref_name: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<Pipeline> {
        let url = self.url(&format!(
            "/projects/{}/trigger/pipeline",
            encode_path(project_path)
        ));
        let form = trigger_form(trigger_token, ref_name, variables);

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .map_err(|e| transport_error("create-trigger-pipeline", &url, e))?;

        parse_json_response("create-trigger-pipeline", &url, response)
    }

    pub fn pipeline(&self, project_path: &str, pipeline_id: u64) -> Result<Pipeline> {
        self.get_json(
            "get-pipeline",
            &format!(
                "/projects/{}/pipelines/{}",
                encode_path(project_path),
                pipeline_id
            ),
        )
    }

    pub fn job(&self, project_path: &str, job_id: u64) -> Result<Job> {
        self.get_json(
            "get-job",
            &format!("/projects/{}/jobs/{}", encode_path(project_path), job_id),
        )
    }

    /// All jobs of a pipeline, following pagination until exhausted.
    pub fn pipeline_jobs(&self, project_path: &str, pipeline_id: u64) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut page = 1;

        loop {
            let batch: Vec<Job> = self.get_json(
                "list-pipeline-jobs",
                &format!(
                    "/projects/{}/pipelines/{}/jobs?per_page={}&page={}",
                    encode_path(project_path),
                    pipeline_id,
                    PER_PAGE,
                    page
                ),
            )?;

            let last_page = batch.len() < PER_PAGE;
            jobs.extend(batch);
            if last_page {
                break;
            }
            page += 1;
        }

        Ok(jobs)
    }

    pub fn create_commit_comment(&self, project_path: &str, sha: &str, note: &str) -> Result<()> {
        let url = self.url(&commit_comments_path(project_path, sha));

        let response = self
            .client
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .form(&[("note", note)])
            .send()
            .map_err(|e| transport_error("create-commit-comment", &url, e))?;

        check_response("create-commit-comment", &url, response)
    }

    pub fn create_branch(&self, project_path: &str, branch: &str, ref_name: &str) -> Result<Branch> {
        let url = self.url(&format!(
            "/projects/{}/repository/branches",
            encode_path(project_path)
        ));

        let response = self
            .client
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .form(&[("branch", branch), ("ref", ref_name)])
            .send()
            .map_err(|e| transport_error("create-branch", &url, e))?;

        parse_json_response("create-branch", &url, response)
    }

    pub fn delete_branch(&self, project_path: &str, branch: &str) -> Result<()> {
        let url = self.url(&format!(
            "/projects/{}/repository/branches/{}",
            encode_path(project_path),
            encode_path(branch)
        ));

        let response = self
            .client
            .delete(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .map_err(|e| transport_error("delete-branch", &url, e))?;

        check_response("delete-branch", &url, response)
    }

    /// Most recent pipelines for a ref (first page is plenty for cleanup).
    pub fn pipelines_for_ref(&self, project_path: &str, ref_name: &str) -> Result<Vec<Pipeline>> {
        self.get_json(
            "list-pipelines-by-ref",
            &format!(
                "/projects/{}/pipelines?ref={}&per_page={}",
                encode_path(project_path),
                encode_path(ref_name),
                PER_PAGE
            ),
        )
    }

    pub fn cancel_pipeline(&self, project_path: &str, pipeline_id: u64) -> Result<Pipeline> {
        let url = self.url(&format!(
            "/projects/{}/pipelines/{}/cancel",
            encode_path(project_path),
            pipeline_id
        ));

        let response = self
            .client
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .map_err(|e| transport_error("cancel-pipeline", &url, e))?;

        parse_json_response("cancel-pipeline", &url, response)
    }

    fn get_json<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .map_err(|e| transport_error(operation, &url, e))?;

        parse_json_response(operation, &url, response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn commit_comments_path(project_path: &str, sha: &str) -> String {
    format!(
        "/projects/{}/repository/commits/{}/comments",
        encode_path(project_path),
        encode_path(sha)
    )
}

fn trigger_form(
    trigger_token: &str,
    ref_name: &str,
    variables: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("token".to_string(), trigger_token.to_string()),
        ("ref".to_string(), ref_name.to_string()),
    ];
    for (key, value) in variables {
        form.push((format!("variables[{}]", key), value.clone()));
    }
    form
}

fn transport_error(operation: &str, url: &str, e: reqwest::Error) -> Error {
    Error::remote_request_failed(operation, url, e.to_string())
}

fn parse_json_response<T: DeserializeOwned>(
    operation: &str,
    url: &str,
    response: Response,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| transport_error(operation, url, e))?;

    if !status.is_success() {
        return Err(Error::remote_api_error(operation, url, status.as_u16(), body));
    }

    serde_json::from_str(&body).map_err(|e| {
        Error::internal_json(e.to_string(), Some(format!("parse {} response", operation)))
    })
}

fn check_response(operation: &str, url: &str, response: Response) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .map_err(|e| transport_error(operation, url, e))?;
        return Err(Error::remote_api_error(operation, url, status.as_u16(), body));
    }
    Ok(())
}

/// Percent-encodes a path segment, keeping only URL-unreserved characters.
/// Project paths and branch names routinely contain `/`.
pub(crate) fn encode_path(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
