//! Publication-stage boundary: fork the upstream repository, push the fix
//! branch, and open a pull request.
//!
//! Every remote failure maps to a distinct [`RunStatus`] the router can
//! consume; nothing here is allowed to terminate the process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::domain::{Ledger, RunStatus};

/// Environment variable holding the hosting-API credential.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Fixed settle delay after requesting a fork. The remote provisions forks
/// asynchronously and is not guaranteed to exist when the request returns.
pub const FORK_SETTLE_DELAY: Duration = Duration::from_secs(5);

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "mender-agent";

/// Deterministic fix-branch name: identities uppercased, spaces to
/// underscores, fixed `_AI_Fix` suffix.
pub fn branch_name(team: &str, leader: &str) -> String {
    let team = team.trim().replace(' ', "_").to_uppercase();
    let leader = leader.trim().replace(' ', "_").to_uppercase();
    format!("{team}_{leader}_AI_Fix")
}

/// Extract `(owner, repo)` from an upstream repository URL.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let cleaned = url.trim_end_matches('/').trim_end_matches(".git");
    let path = cleaned.split("github.com").nth(1)?;
    let path = path.trim_start_matches(['/', ':']);
    let mut parts = path.splitn(2, '/');
    let owner = parts.next()?.to_string();
    let repo = parts.next()?.to_string();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

/// Precondition short-circuits evaluated before any network contact.
pub fn check_preconditions(ledger: &Ledger, token: Option<&str>) -> Option<RunStatus> {
    if ledger.fixes_applied.is_empty() {
        return Some(RunStatus::NoFixesToPush);
    }
    if token.map(str::trim).filter(|t| !t.is_empty()).is_none() {
        return Some(RunStatus::GitAuthFailed);
    }
    None
}

/// Inputs the publication stage needs from the orchestrator.
#[derive(Debug, Clone)]
pub struct PublishContext {
    /// Upstream repository URL the run was submitted against.
    pub repo_url: String,

    /// Local working copy holding the applied fix.
    pub repo_path: PathBuf,

    /// Fix-branch name from [`branch_name`].
    pub branch: String,

    /// Latest fix record's commit summary; seeds the commit and PR body.
    pub commit_summary: String,
}

/// The publication backend as seen by the orchestrator.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Run the fork → branch → push → PR protocol. Preconditions on the
    /// ledger are the caller's responsibility; this only talks to the remote.
    async fn publish(&self, ctx: &PublishContext) -> RunStatus;
}

#[derive(Deserialize)]
struct AuthenticatedUser {
    login: String,
}

#[derive(Deserialize)]
struct RepoInfo {
    #[serde(default = "default_branch_fallback")]
    default_branch: String,
}

fn default_branch_fallback() -> String {
    "main".to_string()
}

#[derive(Serialize)]
struct CreatePrRequest<'a> {
    title: &'a str,
    body: String,
    head: String,
    base: &'a str,
}

/// GitHub-backed publisher.
pub struct GitHubPublisher {
    client: reqwest::Client,
    token: String,
    settle_delay: Duration,
}

impl GitHubPublisher {
    /// Build a publisher with an explicit credential.
    pub fn new(token: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            settle_delay: FORK_SETTLE_DELAY,
        })
    }

    /// Override the fork settle delay (tests).
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.decorate(self.client.get(url))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.decorate(self.client.post(url))
    }

    fn decorate(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn run_protocol(&self, ctx: &PublishContext) -> anyhow::Result<RunStatus> {
        let (owner, repo) = parse_repo_url(&ctx.repo_url)
            .ok_or_else(|| anyhow::anyhow!("unrecognized repository URL: {}", ctx.repo_url))?;

        // 1. Authenticated identity.
        let user: AuthenticatedUser = self
            .get(&format!("{API_BASE}/user"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // 2. Upstream default branch.
        let upstream: RepoInfo = self
            .get(&format!("{API_BASE}/repos/{owner}/{repo}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // 3. Fork, then wait for asynchronous provisioning.
        info!(%owner, %repo, "requesting fork");
        self.post(&format!("{API_BASE}/repos/{owner}/{repo}/forks"))
            .send()
            .await?
            .error_for_status()?;
        tokio::time::sleep(self.settle_delay).await;

        // 4. Repoint the local remote at the fork.
        let fork_url = format!(
            "https://x-access-token:{}@github.com/{}/{}.git",
            self.token, user.login, repo
        );
        // Removal may fail when no origin exists; that is fine.
        let _ = git(&ctx.repo_path, &["remote", "remove", "origin"]).await;
        git(&ctx.repo_path, &["remote", "add", "origin", &fork_url]).await?;

        // 5. Branch, stage, commit, push.
        info!(branch = %ctx.branch, "pushing fix branch to fork");
        git(&ctx.repo_path, &["checkout", "-b", &ctx.branch]).await?;
        git(&ctx.repo_path, &["add", "."]).await?;
        git(&ctx.repo_path, &["commit", "-m", &ctx.commit_summary]).await?;
        git(&ctx.repo_path, &["push", "-u", "origin", &ctx.branch]).await?;

        // 6. Pull request back to the upstream default branch.
        let pr = CreatePrRequest {
            title: "mender: automated bug fix",
            body: format!(
                "## Autonomous Repair Report\n\nThe agent identified and resolved a failing \
                 test suite in this repository.\n\n**Fix applied:** {}",
                ctx.commit_summary
            ),
            head: format!("{}:{}", user.login, ctx.branch),
            base: &upstream.default_branch,
        };

        let resp = self
            .post(&format!("{API_BASE}/repos/{owner}/{repo}/pulls"))
            .json(&pr)
            .send()
            .await?;

        match resp.status().as_u16() {
            201 => {
                info!("pull request created");
                Ok(RunStatus::PushedToGithub)
            }
            // Already exists / no diff: idempotent re-run, success for routing.
            422 => {
                info!("pull request already exists or has no diff");
                Ok(RunStatus::PushedToGithub)
            }
            code => {
                let body = resp.text().await.unwrap_or_default();
                warn!(code, body = %body, "pull request rejected");
                Ok(RunStatus::GitPushFailed)
            }
        }
    }
}

#[async_trait]
impl Publisher for GitHubPublisher {
    async fn publish(&self, ctx: &PublishContext) -> RunStatus {
        match self.run_protocol(ctx).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "publication failed");
                RunStatus::GitPushFailed
            }
        }
    }
}

/// Run a git subcommand in `repo_path`, failing on non-zero exit.
async fn git(repo_path: &Path, args: &[&str]) -> anyhow::Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("git {:?} failed: {}", args, stderr.trim());
    }
    Ok(())
}
