use std::cell::RefCell;
use std::time::Duration;

use chrono::Utc;
use roadie::api::Job;
use roadie::context::{CiContext, VersionFile};
use roadie::poller::{Poller, Status, StatusFetch};
use roadie::target::{Target, TargetSettings};
use roadie::trigger::{find_job, PipelineHandle, ResourceKind, TriggerRequest};
use roadie::{ErrorCode, Result};

struct Sequence(RefCell<Vec<Status>>);

impl Sequence {
    fn of(steps: Vec<Status>) -> Self {
        Self(RefCell::new(steps))
    }
}

impl StatusFetch for Sequence {
    fn fetch_status(&self, _handle: &PipelineHandle) -> Result<Status> {
        let mut steps = self.0.borrow_mut();
        if steps.is_empty() {
            Ok(Status::Running)
        } else {
            Ok(steps.remove(0))
        }
    }
}

fn upstream_context() -> CiContext {
    CiContext {
        project_path: Some("gitlab-org/gitlab".to_string()),
        project_name: Some("gitlab".to_string()),
        commit_sha: Some("deadbeef".to_string()),
        commit_ref_name: Some("my-feature".to_string()),
        job_url: Some("https://gitlab.example.com/jobs/1".to_string()),
        version_files: vec![VersionFile {
            name: "GITALY_SERVER_VERSION".to_string(),
            value: "14.2.3".to_string(),
        }],
        ..Default::default()
    }
}

fn omnibus_settings() -> TargetSettings {
    TargetSettings {
        target: Target::Omnibus,
        project_path: "gitlab-org/omnibus-gitlab".to_string(),
        ref_name: "master".to_string(),
        trigger_token: "tok".to_string(),
        api_token: "api".to_string(),
        docs_base_branch: None,
        review_apps_domain: None,
    }
}

fn job(id: u64, name: &str) -> Job {
    Job {
        id,
        name: name.to_string(),
        status: "created".to_string(),
        web_url: None,
    }
}

#[test]
fn trigger_request_combines_settings_and_variables() {
    let request = TriggerRequest::build(&omnibus_settings(), &upstream_context());

    assert_eq!(request.project_path, "gitlab-org/omnibus-gitlab");
    assert_eq!(request.ref_name, "master");
    assert_eq!(request.trigger_token, "tok");

    assert_eq!(
        request.variables.get("TOP_UPSTREAM_SOURCE_PROJECT").unwrap(),
        "gitlab-org/gitlab"
    );
    assert_eq!(request.variables.get("GITLAB_VERSION").unwrap(), "deadbeef");
    assert_eq!(
        request.variables.get("GITALY_SERVER_VERSION").unwrap(),
        "14.2.3"
    );
}

#[test]
fn cng_requests_normalize_version_sidecars() {
    let mut settings = omnibus_settings();
    settings.target = Target::Cng;
    settings.project_path = "gitlab-org/cng".to_string();

    let request = TriggerRequest::build(&settings, &upstream_context());
    assert_eq!(
        request.variables.get("GITALY_SERVER_VERSION").unwrap(),
        "v14.2.3"
    );
    assert_eq!(request.variables.get("EE_PIPELINE").unwrap(), "true");
}

#[test]
fn a_resolved_job_is_watched_to_completion() {
    let jobs = vec![job(11, "build"), job(12, "qa-test"), job(13, "deploy")];
    let target = find_job(&jobs, "qa-test").unwrap();

    let handle = PipelineHandle {
        project_path: "gitlab-org/omnibus-gitlab".to_string(),
        id: target.id,
        kind: ResourceKind::Job,
        web_url: target.web_url.clone(),
        started_at: Utc::now(),
    };

    let source = Sequence::of(vec![Status::Pending, Status::Running, Status::Success]);
    let summary = Poller::with_timing(Duration::ZERO, 10)
        .wait(&source, &handle)
        .unwrap();

    assert_eq!(handle.id, 12);
    assert_eq!(summary.status, "success");
    assert_eq!(summary.poll_count, 3);
}

#[test]
fn a_canceled_pipeline_fails_the_wait_with_its_status() {
    let handle = PipelineHandle {
        project_path: "gitlab-org/omnibus-gitlab".to_string(),
        id: 9110,
        kind: ResourceKind::Pipeline,
        web_url: None,
        started_at: Utc::now(),
    };

    let source = Sequence::of(vec![Status::Running, Status::Canceled]);
    let err = Poller::with_timing(Duration::ZERO, 10)
        .wait(&source, &handle)
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::PipelineFailed);
    assert_eq!(err.details["status"], "canceled");
}
