use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, error, info, warn};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::{DataSource, FetchFuture, FetchOutcome};
use crate::utils::file_utils;

const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 50;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const GIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Git hosting service whose public API lists a user's repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteHost {
    GitHub,
    GitLab,
}

impl RemoteHost {
    pub fn name(self) -> &'static str {
        match self {
            RemoteHost::GitHub => "github",
            RemoteHost::GitLab => "gitlab",
        }
    }

    pub fn default_api_base(self) -> &'static str {
        match self {
            RemoteHost::GitHub => "https://api.github.com",
            RemoteHost::GitLab => "https://gitlab.com/api/v4",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    clone_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct GitLabProject {
    http_url_to_repo: Option<String>,
}

/// Every repository of one or more accounts on a git host
#[derive(Debug, Clone)]
pub struct RemoteHostSource {
    host: RemoteHost,
    usernames: Vec<String>,
    token: Option<String>,
    api_base: String,
    client: Client,
}

impl RemoteHostSource {
    pub fn new(host: RemoteHost, usernames: Vec<String>) -> Self {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to a default HTTP client: {}", e);
                Client::new()
            });

        Self {
            host,
            usernames,
            token: None,
            api_base: host.default_api_base().to_string(),
            client,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Point at another API endpoint, e.g. a self-hosted GitLab
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn host(&self) -> RemoteHost {
        self.host
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.token, self.host) {
            (Some(token), RemoteHost::GitHub) => request.header("Authorization", format!("token {token}")),
            (Some(token), RemoteHost::GitLab) => request.bearer_auth(token),
            (None, _) => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} answered {}", url, status);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Unexpected response body from {url}"))
    }

    async fn github_clone_urls(&self, username: &str) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        for page in 1..=MAX_PAGES {
            let url = format!(
                "{}/users/{}/repos?per_page={}&page={}",
                self.api_base, username, PAGE_SIZE, page
            );
            let repos: Vec<GitHubRepo> = self.get_json(&url).await?;
            let count = repos.len();
            urls.extend(repos.into_iter().filter_map(|r| r.clone_url));
            if count < PAGE_SIZE {
                break;
            }
        }
        Ok(urls)
    }

    async fn gitlab_clone_urls(&self, username: &str) -> Result<Vec<String>> {
        let lookup = format!("{}/users?username={}", self.api_base, username);
        let users: Vec<GitLabUser> = self.get_json(&lookup).await?;
        let user = users
            .first()
            .ok_or_else(|| anyhow!("User {username} not found on GitLab"))?;

        let mut urls = Vec::new();
        for page in 1..=MAX_PAGES {
            let url = format!(
                "{}/users/{}/projects?page={}&per_page={}",
                self.api_base, user.id, page, PAGE_SIZE
            );
            let projects: Vec<GitLabProject> = self.get_json(&url).await?;
            if projects.is_empty() {
                break;
            }
            urls.extend(projects.into_iter().filter_map(|p| p.http_url_to_repo));
        }
        Ok(urls)
    }

    /// Clone URLs of every account; accounts that fail are logged and skipped
    async fn clone_urls(&self) -> Vec<String> {
        let mut all = Vec::new();
        for username in &self.usernames {
            let result = match self.host {
                RemoteHost::GitHub => self.github_clone_urls(username).await,
                RemoteHost::GitLab => self.gitlab_clone_urls(username).await,
            };
            match result {
                Ok(urls) => {
                    info!("Found {} {} repositories for {}", urls.len(), self.host.name(), username);
                    all.extend(urls);
                }
                Err(e) => error!("Error fetching repos for {}: {:#}", username, e),
            }
        }
        all
    }
}

impl DataSource for RemoteHostSource {
    fn name(&self) -> &str {
        self.host.name()
    }

    fn subject(&self) -> String {
        if self.usernames.is_empty() {
            crate::store::UNKNOWN_SUBJECT.to_string()
        } else {
            self.usernames.join(", ")
        }
    }

    fn fetch_into<'a>(&'a self, scratch_dir: &'a Path) -> FetchFuture<'a> {
        Box::pin(async move {
            file_utils::ensure_dir_exists(scratch_dir)?;

            let urls = self.clone_urls().await;
            if urls.is_empty() {
                bail!(
                    "No {} repositories found for {}",
                    self.host.name(),
                    self.usernames.join(", ")
                );
            }

            let mut failed = Vec::new();
            for url in &urls {
                if let Err(e) = clone_or_update(url, scratch_dir).await {
                    error!("Failed to clone or update {}: {:#}", url, e);
                    failed.push(url.clone());
                }
            }

            info!(
                "Fetched {} of {} repositories into {}",
                urls.len() - failed.len(),
                urls.len(),
                scratch_dir.display()
            );

            Ok(FetchOutcome {
                projects_root: scratch_dir.to_path_buf(),
                repositories: urls.len(),
                failed,
            })
        })
    }
}

/// Directory name a clone URL checks out into
pub fn repo_name_from_url(url: &str) -> Option<&str> {
    let name = url.trim_end_matches('/').rsplit('/').next()?;
    let name = name.strip_suffix(".git").unwrap_or(name);
    (!name.is_empty()).then_some(name)
}

async fn clone_or_update(url: &str, dest_dir: &Path) -> Result<()> {
    let name = repo_name_from_url(url).ok_or_else(|| anyhow!("Cannot derive a name from {url}"))?;
    let repo_path = dest_dir.join(name);

    if !repo_path.exists() {
        info!("Cloning {} into {}", url, repo_path.display());
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg(url).arg(&repo_path);
        run_git(cmd).await?;
        return Ok(());
    }

    info!("Repository {} already exists, pulling updates", name);
    let mut fetch = Command::new("git");
    fetch.arg("-C").arg(&repo_path).args(["fetch", "--all"]);
    run_git(fetch).await?;

    let mut head = Command::new("git");
    head.arg("-C").arg(&repo_path).args(["symbolic-ref", "refs/remotes/origin/HEAD"]);
    let branch = match run_git(head).await {
        Ok(reference) => reference.rsplit('/').next().unwrap_or("master").to_string(),
        Err(e) => {
            warn!("Failed to determine default branch for {}, trying 'master': {:#}", name, e);
            "master".to_string()
        }
    };

    let mut checkout = Command::new("git");
    checkout.arg("-C").arg(&repo_path).args(["checkout", branch.as_str()]);
    run_git(checkout).await?;

    let mut pull = Command::new("git");
    pull.arg("-C").arg(&repo_path).args(["pull", "origin", branch.as_str()]);
    run_git(pull).await?;
    Ok(())
}

async fn run_git(mut cmd: Command) -> Result<String> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(GIT_TIMEOUT, cmd.output())
        .await
        .map_err(|_| anyhow!("git timed out after {}s", GIT_TIMEOUT.as_secs()))?
        .context("Failed to run git")?;

    if !output.status.success() {
        bail!("git exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
