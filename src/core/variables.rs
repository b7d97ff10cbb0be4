use std::collections::BTreeMap;

use regex::Regex;

use crate::context::CiContext;
use crate::target::Target;

/// Strict release versions: `14.2.3`, `14.2.3-rc1`, `14.2.3-ee`,
/// `14.2.3-rc1-ee`. Branch names and partial versions never match.
const RELEASE_VERSION_PATTERN: &str = r"^\d+\.\d+\.\d+(-rc\d+)?(-ee)?$";

/// Builds the full trigger variable map for one target.
///
/// Three layers, later layers winning on key collision: base variables from
/// the upstream context, then the target's own overrides, then one variable
/// per `*_VERSION` sidecar file.
pub fn build(target: Target, ctx: &CiContext) -> BTreeMap<String, String> {
    let mut vars = base_variables(ctx);
    vars.extend(target.extra_variables(ctx));

    for file in &ctx.version_files {
        let value = match target {
            Target::Cng => normalize_release_version(&file.value),
            _ => file.value.clone(),
        };
        vars.insert(file.name.clone(), value);
    }

    vars
}

fn base_variables(ctx: &CiContext) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    insert_opt(
        &mut vars,
        "TOP_UPSTREAM_SOURCE_PROJECT",
        ctx.project_path.as_deref(),
    );
    insert_opt(
        &mut vars,
        "TOP_UPSTREAM_SOURCE_REF",
        ctx.commit_ref_name.as_deref(),
    );
    insert_opt(&mut vars, "TOP_UPSTREAM_SOURCE_SHA", ctx.source_sha());
    insert_opt(&mut vars, "TOP_UPSTREAM_SOURCE_JOB", ctx.job_url.as_deref());
    insert_opt(
        &mut vars,
        "TOP_UPSTREAM_MERGE_REQUEST_PROJECT_ID",
        ctx.merge_request_project_id.as_deref(),
    );
    insert_opt(
        &mut vars,
        "TOP_UPSTREAM_MERGE_REQUEST_IID",
        ctx.merge_request_iid.as_deref(),
    );
    insert_opt(&mut vars, "TRIGGER_SOURCE", ctx.job_url.as_deref());
    insert_opt(&mut vars, "TRIGGERED_USER", ctx.user_name.as_deref());

    vars
}

/// Prefixes strict release versions with `v`, the tag scheme the cng image
/// repositories use. Anything else passes through untouched.
pub fn normalize_release_version(value: &str) -> String {
    let re = match Regex::new(RELEASE_VERSION_PATTERN) {
        Ok(r) => r,
        Err(_) => return value.to_string(),
    };

    if re.is_match(value) {
        format!("v{}", value)
    } else {
        value.to_string()
    }
}

pub(crate) fn insert_opt(vars: &mut BTreeMap<String, String>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        vars.insert(key.to_string(), v.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VersionFile;

    fn context() -> CiContext {
        CiContext {
            project_path: Some("gitlab-org/gitlab".to_string()),
            project_name: Some("gitlab".to_string()),
            commit_sha: Some("deadbeef".to_string()),
            commit_ref_name: Some("my-feature".to_string()),
            job_url: Some("https://gitlab.example.com/job/1".to_string()),
            user_name: Some("ada".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn base_variables_skip_missing_ambient_values() {
        let vars = base_variables(&CiContext::default());
        assert!(vars.is_empty());
    }

    #[test]
    fn base_variables_cover_the_upstream_context() {
        let vars = base_variables(&context());
        assert_eq!(
            vars.get("TOP_UPSTREAM_SOURCE_PROJECT").unwrap(),
            "gitlab-org/gitlab"
        );
        assert_eq!(vars.get("TOP_UPSTREAM_SOURCE_SHA").unwrap(), "deadbeef");
        assert_eq!(vars.get("TRIGGERED_USER").unwrap(), "ada");
        assert!(!vars.contains_key("TOP_UPSTREAM_MERGE_REQUEST_IID"));
    }

    #[test]
    fn target_overrides_win_over_base_values() {
        let mut ctx = context();
        // Force a collision: omnibus sets GITLAB_VERSION from the SHA.
        ctx.version_files = vec![];
        let vars = build(Target::Omnibus, &ctx);
        assert_eq!(vars.get("GITLAB_VERSION").unwrap(), "deadbeef");
        assert_eq!(vars.get("ee").unwrap(), "true");
    }

    #[test]
    fn version_sidecars_win_over_target_overrides() {
        let mut ctx = context();
        ctx.version_files = vec![VersionFile {
            name: "GITLAB_VERSION".to_string(),
            value: "from-sidecar".to_string(),
        }];

        let vars = build(Target::Omnibus, &ctx);
        assert_eq!(vars.get("GITLAB_VERSION").unwrap(), "from-sidecar");
    }

    #[test]
    fn keys_are_unique_and_sorted() {
        let vars = build(Target::Omnibus, &context());
        let keys: Vec<&String> = vars.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn cng_normalizes_release_version_sidecars() {
        let mut ctx = context();
        ctx.version_files = vec![
            VersionFile {
                name: "GITALY_SERVER_VERSION".to_string(),
                value: "14.2.3".to_string(),
            },
            VersionFile {
                name: "GITLAB_PAGES_VERSION".to_string(),
                value: "master".to_string(),
            },
        ];

        let vars = build(Target::Cng, &ctx);
        assert_eq!(vars.get("GITALY_SERVER_VERSION").unwrap(), "v14.2.3");
        assert_eq!(vars.get("GITLAB_PAGES_VERSION").unwrap(), "master");
    }

    #[test]
    fn omnibus_leaves_version_sidecars_untouched() {
        let mut ctx = context();
        ctx.version_files = vec![VersionFile {
            name: "GITALY_SERVER_VERSION".to_string(),
            value: "14.2.3".to_string(),
        }];

        let vars = build(Target::Omnibus, &ctx);
        assert_eq!(vars.get("GITALY_SERVER_VERSION").unwrap(), "14.2.3");
    }

    #[test]
    fn release_version_normalization_cases() {
        assert_eq!(normalize_release_version("14.2.3"), "v14.2.3");
        assert_eq!(normalize_release_version("14.2.3-rc1"), "v14.2.3-rc1");
        assert_eq!(normalize_release_version("14.2.3-ee"), "v14.2.3-ee");
        assert_eq!(
            normalize_release_version("14.2.3-rc1-ee"),
            "v14.2.3-rc1-ee"
        );
        assert_eq!(normalize_release_version("master"), "master");
        assert_eq!(normalize_release_version("14.2"), "14.2");
        assert_eq!(normalize_release_version("v14.2.3"), "v14.2.3");
        assert_eq!(normalize_release_version("14.2.3-rc"), "14.2.3-rc");
    }
}
