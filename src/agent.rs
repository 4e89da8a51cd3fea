// User-Agent heuristics. The header is client controlled, unknown agents are rejected.

use tracing::debug;

pub const DEFAULT_DENY_LIST: &[&str] = &[
    "bot", "crawler", "spider", "scraper", "python", "curl", "wget", "masscan", "sqlmap",
    "nikto", "zmeu", "acunetix", "xenu", "nessus", "nmap", "megaindex", "mail.ru", "yandexbot",
];

pub const DEFAULT_ALLOW_LIST: &[&str] = &[
    "mozilla", "chrome", "safari", "firefox", "edge", "opera", "webkit", "gecko", "applewebkit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentVerdict {
    Suspicious,
    Normal,
}

#[derive(Debug, Clone)]
pub struct AgentClassifier {
    deny: Vec<String>,
    allow: Vec<String>,
}

impl Default for AgentClassifier {
    fn default() -> Self {
        Self::new(&[], &[])
    }
}

impl AgentClassifier {
    // Empty lists select the built-in defaults
    pub fn new(deny: &[String], allow: &[String]) -> Self {
        Self {
            deny: lowered_or_default(deny, DEFAULT_DENY_LIST),
            allow: lowered_or_default(allow, DEFAULT_ALLOW_LIST),
        }
    }

    pub fn classify(&self, identity: &str) -> AgentVerdict {
        if identity.is_empty() {
            debug!("Rejecting request without User-Agent");
            return AgentVerdict::Suspicious;
        }

        let lowered = identity.to_lowercase();

        if let Some(marker) = self.deny.iter().find(|m| lowered.contains(m.as_str())) {
            debug!(agent = identity, marker = marker.as_str(), "Suspicious User-Agent");
            return AgentVerdict::Suspicious;
        }

        if !self.allow.iter().any(|t| lowered.contains(t.as_str())) {
            debug!(agent = identity, "Unknown User-Agent");
            return AgentVerdict::Suspicious;
        }

        AgentVerdict::Normal
    }

    pub fn deny_len(&self) -> usize {
        self.deny.len()
    }

    pub fn allow_len(&self) -> usize {
        self.allow.len()
    }
}

fn lowered_or_default(items: &[String], defaults: &[&str]) -> Vec<String> {
    let lowered: Vec<String> = items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    if lowered.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        lowered
    }
}
