use std::path::Path;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://gitlab.com/api/v4";

/// Snapshot of the ambient CI environment, read exactly once at startup.
///
/// Components never touch `std::env` themselves; everything they need is
/// captured here (including `*_VERSION` sidecar files from the working
/// directory) and passed down by reference.
#[derive(Debug, Clone)]
pub struct CiContext {
    pub api_base_url: String,
    pub project_path: Option<String>,
    pub project_name: Option<String>,
    pub commit_sha: Option<String>,
    pub merge_request_source_sha: Option<String>,
    pub commit_ref_name: Option<String>,
    pub commit_ref_slug: Option<String>,
    pub commit_tag: Option<String>,
    pub job_url: Option<String>,
    pub job_name: Option<String>,
    pub pipeline_url: Option<String>,
    pub user_name: Option<String>,
    pub merge_request_project_id: Option<String>,
    pub merge_request_iid: Option<String>,
    pub version_files: Vec<VersionFile>,
}

/// One `*_VERSION` sidecar file, resolved at capture time: the value is the
/// non-empty environment override of the same name, else the trimmed file
/// content.
#[derive(Debug, Clone)]
pub struct VersionFile {
    pub name: String,
    pub value: String,
}

impl Default for CiContext {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            project_path: None,
            project_name: None,
            commit_sha: None,
            merge_request_source_sha: None,
            commit_ref_name: None,
            commit_ref_slug: None,
            commit_tag: None,
            job_url: None,
            job_name: None,
            pipeline_url: None,
            user_name: None,
            merge_request_project_id: None,
            merge_request_iid: None,
            version_files: Vec::new(),
        }
    }
}

impl CiContext {
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::internal_io(e.to_string(), Some("current_dir".to_string())))?;

        Ok(Self {
            api_base_url: env_non_empty("CI_API_V4_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            project_path: env_non_empty("CI_PROJECT_PATH"),
            project_name: env_non_empty("CI_PROJECT_NAME"),
            commit_sha: env_non_empty("CI_COMMIT_SHA"),
            merge_request_source_sha: env_non_empty("CI_MERGE_REQUEST_SOURCE_BRANCH_SHA"),
            commit_ref_name: env_non_empty("CI_COMMIT_REF_NAME"),
            commit_ref_slug: env_non_empty("CI_COMMIT_REF_SLUG"),
            commit_tag: env_non_empty("CI_COMMIT_TAG"),
            job_url: env_non_empty("CI_JOB_URL"),
            job_name: env_non_empty("CI_JOB_NAME"),
            pipeline_url: env_non_empty("CI_PIPELINE_URL"),
            user_name: env_non_empty("TRIGGERED_USER").or_else(|| env_non_empty("GITLAB_USER_NAME")),
            merge_request_project_id: env_non_empty("CI_MERGE_REQUEST_PROJECT_ID"),
            merge_request_iid: env_non_empty("CI_MERGE_REQUEST_IID"),
            version_files: scan_version_files(&cwd)?,
        })
    }

    /// Source SHA to forward downstream. Merged-results pipelines carry the
    /// real branch head in the merge-request source SHA, so it wins over the
    /// plain commit SHA.
    pub fn source_sha(&self) -> Option<&str> {
        self.merge_request_source_sha
            .as_deref()
            .or(self.commit_sha.as_deref())
    }

    /// Whether the upstream project builds the EE edition. The downstream
    /// projects key off the historic project names: `gitlab` itself and any
    /// `-ee` suffixed fork.
    pub fn is_ee(&self) -> bool {
        match self.project_name.as_deref() {
            Some(name) => name == "gitlab" || name.ends_with("-ee"),
            None => false,
        }
    }

    /// Slug of the upstream project name (last path component).
    pub fn project_slug(&self) -> Option<String> {
        let path = self.project_path.as_deref()?;
        let name = path.rsplit('/').next().unwrap_or(path);
        let slug = slug(name);
        if slug.is_empty() {
            None
        } else {
            Some(slug)
        }
    }

    /// Slug of the source ref, preferring the platform-provided one.
    pub fn ref_slug(&self) -> Option<String> {
        if let Some(s) = self.commit_ref_slug.as_deref() {
            return Some(s.to_string());
        }
        let name = self.commit_ref_name.as_deref()?;
        let slug = slug(name);
        if slug.is_empty() {
            None
        } else {
            Some(slug)
        }
    }
}

/// Environment lookup that treats empty values as unset.
pub(crate) fn env_non_empty(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

pub(crate) fn scan_version_files(dir: &Path) -> Result<Vec<VersionFile>> {
    scan_version_files_with(dir, env_non_empty)
}

fn scan_version_files_with(
    dir: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Vec<VersionFile>> {
    let pattern = dir.join("*_VERSION").to_string_lossy().to_string();
    let paths = glob::glob(&pattern)
        .map_err(|e| Error::internal_unexpected(format!("Invalid glob pattern: {}", e)))?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| Error::internal_io(e.to_string(), Some(pattern.clone())))?;
        if !path.is_file() {
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };

        let value = match lookup(&name) {
            Some(override_value) => override_value.trim().to_string(),
            None => std::fs::read_to_string(&path)
                .map_err(|e| {
                    Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
                })?
                .trim()
                .to_string(),
        };

        files.push(VersionFile { name, value });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Lowercase alphanumeric slug with single dashes.
pub(crate) fn slug(value: &str) -> String {
    let mut out = String::new();
    let mut prev_was_dash = false;

    for ch in value.trim().chars() {
        let normalized = match ch {
            'a'..='z' | '0'..='9' => Some(ch),
            'A'..='Z' => Some(ch.to_ascii_lowercase()),
            _ if ch.is_whitespace() || ch == '_' || ch == '-' || ch == '.' || ch == '/' => {
                Some('-')
            }
            _ => None,
        };

        if let Some(c) = normalized {
            if c == '-' {
                if out.is_empty() || prev_was_dash {
                    continue;
                }
                out.push('-');
                prev_was_dash = true;
            } else {
                out.push(c);
                prev_was_dash = false;
            }
        }
    }

    while out.ends_with('-') {
        out.pop();
    }

    out
}
