//! robots.txt fetching and parsing
//!
//! Only the `user-agent` and `disallow` directives are honored. Groups are
//! kept in file order: a group accumulates `user-agent` lines until its
//! first `disallow`; the next `user-agent` after that starts a new group.
//! Lookup returns the disallow list of the first group naming the agent
//! exactly, falling back to the `*` group.

use crate::client::{Client, ClientFactory};
use crate::{BurrowError, Result};
use reqwest::header::HeaderMap;
use std::fmt;
use url::Url;

/// Parsed robots.txt contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsData {
    pub groups: Vec<RobotsGroup>,
}

/// One user-agent group with its disallowed paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsGroup {
    pub user_agents: Vec<String>,
    pub disallow: Vec<String>,
}

/// Parses robots.txt text into ordered groups.
pub fn parse_robots_txt(text: &str) -> RobotsData {
    let mut data = RobotsData::default();
    let mut curr_group = RobotsGroup::default();
    let mut agents_finished = false;

    for line in text.lines() {
        let line = trim_space_and_comments(line);
        let Some((directive, value)) = split_line(line) else {
            continue;
        };
        match directive.as_str() {
            "user-agent" => {
                if agents_finished {
                    data.groups.push(std::mem::take(&mut curr_group));
                    agents_finished = false;
                }
                curr_group.user_agents.push(value.to_string());
            }
            "disallow" => {
                agents_finished = true;
                curr_group.disallow.push(value.to_string());
            }
            _ => {}
        }
    }
    if !curr_group.user_agents.is_empty() {
        data.groups.push(curr_group);
    }
    data
}

fn trim_space_and_comments(line: &str) -> &str {
    let line = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    line.trim()
}

fn split_line(line: &str) -> Option<(String, &str)> {
    let (directive, value) = line.split_once(':')?;
    Some((directive.trim().to_lowercase(), value.trim()))
}

impl RobotsData {
    /// Disallow paths for the first group naming `agent` exactly, falling
    /// back to the `*` group. Asking for `*` with no `*` group yields
    /// nothing.
    pub fn for_user_agent(&self, agent: &str) -> Vec<String> {
        for group in &self.groups {
            if group.user_agents.iter().any(|a| a == agent) {
                return group.disallow.clone();
            }
        }
        if agent == "*" {
            return Vec::new();
        }
        self.for_user_agent("*")
    }

    /// Disallow paths across every group, in file order.
    pub fn all_paths(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.disallow.iter().cloned())
            .collect()
    }
}

impl fmt::Display for RobotsData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for agent in &group.user_agents {
                writeln!(f, "User-agent: {agent}")?;
            }
            for path in &group.disallow {
                writeln!(f, "Disallow: {path}")?;
            }
        }
        Ok(())
    }
}

/// Fetches and parses `/robots.txt` for a scope root, using a fresh client
/// from the factory.
pub async fn fetch_for_url<F: ClientFactory>(target: &Url, factory: &F) -> Result<RobotsData> {
    let mut client = factory.build()?;
    let robots_url = target.join("/robots.txt")?;
    let resp = client.request(&robots_url, None, &HeaderMap::new()).await?;
    if resp.code != 200 {
        return Err(BurrowError::Robots {
            url: robots_url.to_string(),
            message: format!("unexpected status {}", resp.code),
        });
    }
    let body = String::from_utf8_lossy(&resp.body);
    Ok(parse_robots_txt(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "User-agent: a\nDisallow: /x\nDisallow: /y\nUser-agent: *\nDisallow: /\n";

    #[test]
    fn test_parse_groups() {
        let data = parse_robots_txt(SAMPLE);
        assert_eq!(data.groups.len(), 2);
        assert_eq!(data.groups[0].user_agents, vec!["a"]);
        assert_eq!(data.groups[0].disallow, vec!["/x", "/y"]);
        assert_eq!(data.groups[1].user_agents, vec!["*"]);
        assert_eq!(data.groups[1].disallow, vec!["/"]);
    }

    #[test]
    fn test_lookup_exact_and_fallback() {
        let data = parse_robots_txt(SAMPLE);
        assert_eq!(data.for_user_agent("a"), vec!["/x", "/y"]);
        assert_eq!(data.for_user_agent("b"), vec!["/"]);
    }

    #[test]
    fn test_lookup_star_without_star_group() {
        let data = parse_robots_txt("User-agent: a\nDisallow: /x\n");
        assert!(data.for_user_agent("*").is_empty());
    }

    #[test]
    fn test_multiple_agents_per_group() {
        let data = parse_robots_txt("User-agent: a\nUser-agent: b\nDisallow: /q\n");
        assert_eq!(data.groups.len(), 1);
        assert_eq!(data.for_user_agent("b"), vec!["/q"]);
    }

    #[test]
    fn test_comments_and_whitespace() {
        let data = parse_robots_txt("  User-agent:  a  # our bot\n# whole line\nDisallow: /x # trailing\n");
        assert_eq!(data.for_user_agent("a"), vec!["/x"]);
    }

    #[test]
    fn test_lines_without_colon_ignored() {
        let data = parse_robots_txt("garbage line\nUser-agent: a\nDisallow: /x\n");
        assert_eq!(data.groups.len(), 1);
    }

    #[test]
    fn test_key_case_insensitive() {
        let data = parse_robots_txt("USER-AGENT: a\nDISALLOW: /x\n");
        assert_eq!(data.for_user_agent("a"), vec!["/x"]);
    }

    #[test]
    fn test_all_paths() {
        let data = parse_robots_txt(SAMPLE);
        assert_eq!(data.all_paths(), vec!["/x", "/y", "/"]);
    }

    #[test]
    fn test_trailing_group_without_disallow_kept() {
        let data = parse_robots_txt("User-agent: a\nDisallow: /x\nUser-agent: b\n");
        assert_eq!(data.groups.len(), 2);
        assert!(data.for_user_agent("b").is_empty());
    }

    #[test]
    fn test_display_round_trips() {
        let data = parse_robots_txt(SAMPLE);
        let printed = data.to_string();
        assert_eq!(parse_robots_txt(&printed), data);
    }

    #[test]
    fn test_empty_input() {
        let data = parse_robots_txt("");
        assert!(data.groups.is_empty());
        assert!(data.for_user_agent("anything").is_empty());
    }

    #[tokio::test]
    async fn test_fetch_resolves_robots_at_root() {
        use crate::client::mock::{MockClientFactory, MockResponse};

        let factory = MockClientFactory::new();
        factory.respond("http://x/robots.txt", MockResponse::text(200, SAMPLE));

        let target = Url::parse("http://x/deep/path").unwrap();
        let data = fetch_for_url(&target, &factory).await.unwrap();
        assert_eq!(data.groups.len(), 2);
        assert_eq!(factory.request_urls(), vec!["http://x/robots.txt"]);
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_error() {
        use crate::client::mock::{MockClientFactory, MockResponse};

        let factory = MockClientFactory::new();
        factory.respond("http://x/robots.txt", MockResponse::status(404));

        let target = Url::parse("http://x/").unwrap();
        assert!(fetch_for_url(&target, &factory).await.is_err());
    }
}
