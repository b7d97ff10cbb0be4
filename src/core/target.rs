use std::collections::BTreeMap;

use crate::context::{env_non_empty, CiContext};
use crate::error::{Error, Result};
use crate::variables::insert_opt;

pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_DOCS_BASE_BRANCH: &str = "main";

/// Downstream build targets. Closed set; dispatch is by matching on the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Omnibus,
    Cng,
    Docs,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Omnibus => "omnibus",
            Target::Cng => "cng",
            Target::Docs => "docs",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            Target::Omnibus => "OMNIBUS",
            Target::Cng => "CNG",
            Target::Docs => "DOCS",
        }
    }

    /// Variable overrides this target layers onto the base set.
    pub fn extra_variables(&self, ctx: &CiContext) -> BTreeMap<String, String> {
        match self {
            Target::Omnibus => omnibus_variables(ctx),
            Target::Cng => cng_variables(ctx),
            Target::Docs => docs_variables(ctx),
        }
    }
}

/// Settings for one downstream target, resolved from the environment once.
#[derive(Debug, Clone)]
pub struct TargetSettings {
    pub target: Target,
    pub project_path: String,
    pub ref_name: String,
    pub trigger_token: String,
    pub api_token: String,
    /// Base for preview-branch creation. Docs only.
    pub docs_base_branch: Option<String>,
    /// Review-apps domain for the preview URL. Docs only, optional.
    pub review_apps_domain: Option<String>,
}

impl TargetSettings {
    pub fn from_env(target: Target, ctx: &CiContext) -> Result<Self> {
        let prefix = target.env_prefix();

        let project_path = require_env(&format!("{}_PROJECT_PATH", prefix))?;
        let trigger_token = require_env(&format!("{}_TRIGGER_TOKEN", prefix))?;
        let api_token = env_non_empty(&format!("{}_API_TOKEN", prefix))
            .or_else(|| env_non_empty("ROADIE_API_TOKEN"))
            .ok_or_else(|| {
                Error::config_missing_key(format!("{}_API_TOKEN", prefix)).with_hint(
                    "Set a project access token able to read pipelines on the downstream \
                     project (ROADIE_API_TOKEN works as a shared fallback)",
                )
            })?;

        let ref_name = match target {
            Target::Docs => env_non_empty("DOCS_BRANCH").unwrap_or_else(|| preview_branch(ctx)),
            _ => env_non_empty(&format!("{}_BRANCH", prefix))
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        };

        let (docs_base_branch, review_apps_domain) = match target {
            Target::Docs => (
                Some(
                    env_non_empty("DOCS_BASE_BRANCH")
                        .unwrap_or_else(|| DEFAULT_DOCS_BASE_BRANCH.to_string()),
                ),
                env_non_empty("DOCS_REVIEW_APPS_DOMAIN"),
            ),
            _ => (None, None),
        };

        Ok(Self {
            target,
            project_path,
            ref_name,
            trigger_token,
            api_token,
            docs_base_branch,
            review_apps_domain,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    env_non_empty(key).ok_or_else(|| {
        Error::config_missing_key(key).with_hint(format!(
            "Set {} in the CI variables of the upstream project",
            key
        ))
    })
}

/// Preview branch for docs builds. Deterministic across the deploy and
/// cleanup jobs of the same change.
pub fn preview_branch(ctx: &CiContext) -> String {
    let mut parts = vec!["docs-preview".to_string()];

    if let Some(slug) = ctx.project_slug() {
        parts.push(slug);
    }

    match ctx.merge_request_iid.as_deref() {
        Some(iid) => parts.push(format!("mr{}", iid)),
        None => {
            if let Some(slug) = ctx.ref_slug() {
                parts.push(slug);
            }
        }
    }

    parts.join("-")
}

fn omnibus_variables(ctx: &CiContext) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    insert_opt(&mut vars, "GITLAB_VERSION", ctx.source_sha());
    insert_opt(&mut vars, "IMAGE_TAG", ctx.commit_sha.as_deref());
    vars.insert("ALTERNATIVE_SOURCES".to_string(), "true".to_string());
    vars.insert(
        "ee".to_string(),
        if ctx.is_ee() { "true" } else { "false" }.to_string(),
    );
    vars
}

fn cng_variables(ctx: &CiContext) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    insert_opt(&mut vars, "GITLAB_VERSION", ctx.commit_ref_name.as_deref());
    insert_opt(&mut vars, "GITLAB_TAG", ctx.commit_tag.as_deref());

    // Tag pipelines publish assets under the tag name, branch pipelines
    // under the commit SHA.
    let assets_tag = if ctx.commit_tag.is_some() {
        ctx.commit_ref_name.as_deref()
    } else {
        ctx.commit_sha.as_deref()
    };
    insert_opt(&mut vars, "GITLAB_ASSETS_TAG", assets_tag);

    vars.insert("FORCE_RAILS_IMAGE_BUILDS".to_string(), "true".to_string());
    let edition_key = if ctx.is_ee() {
        "EE_PIPELINE"
    } else {
        "CE_PIPELINE"
    };
    vars.insert(edition_key.to_string(), "true".to_string());
    vars
}

fn docs_variables(ctx: &CiContext) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    // Tells the docs project which branch of this product to pull, e.g.
    // BRANCH_OMNIBUS_GITLAB=my-feature.
    if let Some(slug) = ctx.project_slug() {
        let key = format!("BRANCH_{}", slug.to_uppercase().replace('-', "_"));
        insert_opt(&mut vars, &key, ctx.commit_ref_name.as_deref());
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_request_context() -> CiContext {
        CiContext {
            project_path: Some("gitlab-org/gitlab".to_string()),
            project_name: Some("gitlab".to_string()),
            commit_sha: Some("deadbeef".to_string()),
            merge_request_source_sha: Some("cafe1234".to_string()),
            commit_ref_name: Some("my-feature".to_string()),
            commit_ref_slug: Some("my-feature".to_string()),
            merge_request_iid: Some("9001".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn omnibus_overrides_prefer_merge_request_sha_for_version() {
        let vars = Target::Omnibus.extra_variables(&merge_request_context());
        assert_eq!(vars.get("GITLAB_VERSION").unwrap(), "cafe1234");
        assert_eq!(vars.get("IMAGE_TAG").unwrap(), "deadbeef");
        assert_eq!(vars.get("ee").unwrap(), "true");
    }

    #[test]
    fn cng_overrides_carry_edition_flag() {
        let vars = Target::Cng.extra_variables(&merge_request_context());
        assert_eq!(vars.get("EE_PIPELINE").unwrap(), "true");
        assert!(!vars.contains_key("CE_PIPELINE"));
        assert_eq!(vars.get("GITLAB_ASSETS_TAG").unwrap(), "deadbeef");
    }

    #[test]
    fn cng_assets_tag_switches_on_tag_pipelines() {
        let mut ctx = merge_request_context();
        ctx.commit_tag = Some("v14.2.3".to_string());
        ctx.commit_ref_name = Some("v14.2.3".to_string());

        let vars = Target::Cng.extra_variables(&ctx);
        assert_eq!(vars.get("GITLAB_TAG").unwrap(), "v14.2.3");
        assert_eq!(vars.get("GITLAB_ASSETS_TAG").unwrap(), "v14.2.3");
    }

    #[test]
    fn ce_project_gets_ce_pipeline_flag() {
        let mut ctx = merge_request_context();
        ctx.project_name = Some("gitlab-foss".to_string());

        let vars = Target::Cng.extra_variables(&ctx);
        assert_eq!(vars.get("CE_PIPELINE").unwrap(), "true");
        assert!(!vars.contains_key("EE_PIPELINE"));
    }

    #[test]
    fn docs_overrides_name_the_branch_variable_after_the_project() {
        let vars = Target::Docs.extra_variables(&merge_request_context());
        assert_eq!(vars.get("BRANCH_GITLAB").unwrap(), "my-feature");
    }

    #[test]
    fn docs_overrides_empty_without_project_path() {
        let vars = Target::Docs.extra_variables(&CiContext::default());
        assert!(vars.is_empty());
    }

    #[test]
    fn preview_branch_is_merge_request_aware() {
        assert_eq!(
            preview_branch(&merge_request_context()),
            "docs-preview-gitlab-mr9001"
        );
    }

    #[test]
    fn preview_branch_uses_ref_slug_outside_merge_requests() {
        let mut ctx = merge_request_context();
        ctx.merge_request_iid = None;
        assert_eq!(preview_branch(&ctx), "docs-preview-gitlab-my-feature");
    }

    #[test]
    fn preview_branch_survives_an_empty_context() {
        assert_eq!(preview_branch(&CiContext::default()), "docs-preview");
    }
}
