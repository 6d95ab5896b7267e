use std::fmt;
use std::str::FromStr;

use url::Url;

/// Request destination classes as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Document,
    Media,
    Xhr,
    Script,
    Stylesheet,
    Image,
    Font,
    Other,
}

impl ResourceType {
    /// Maps webRequest, CDP and HAR `_resourceType` names. Unknown names are `Other`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "main_frame" | "sub_frame" | "document" => ResourceType::Document,
            "media" => ResourceType::Media,
            "xmlhttprequest" | "xhr" | "fetch" => ResourceType::Xhr,
            "script" => ResourceType::Script,
            "stylesheet" => ResourceType::Stylesheet,
            "image" | "imageset" => ResourceType::Image,
            "font" => ResourceType::Font,
            _ => ResourceType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub pattern: String,
    pub reason: &'static str,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid match pattern {:?}: {}", self.pattern, self.reason)
    }
}

impl std::error::Error for PatternError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SchemeRule {
    HttpAny,
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostRule {
    Any,
    /// `*.example.com`: the domain itself and every subdomain.
    Suffix(String),
    Exact(String),
}

/// URL match pattern in WebExtension syntax, e.g. `*://*.cachefly.net/*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    source: String,
    scheme: SchemeRule,
    host: HostRule,
    path: String,
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let err = |reason| PatternError {
            pattern: pattern.to_string(),
            reason,
        };
        let (scheme, rest) = pattern.split_once("://").ok_or_else(|| err("missing ://"))?;
        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => return Err(err("missing path")),
        };

        let scheme = match scheme {
            "*" => SchemeRule::HttpAny,
            "" => return Err(err("empty scheme")),
            other => SchemeRule::Exact(other.to_ascii_lowercase()),
        };
        let host = if host == "*" {
            HostRule::Any
        } else if let Some(domain) = host.strip_prefix("*.") {
            if domain.is_empty() || domain.contains('*') {
                return Err(err("wildcard host must be *.domain"));
            }
            HostRule::Suffix(domain.to_ascii_lowercase())
        } else if host.is_empty() || host.contains('*') {
            return Err(err("host wildcard only allowed as leading *."));
        } else {
            HostRule::Exact(host.to_ascii_lowercase())
        };

        Ok(Self {
            source: pattern.to_string(),
            scheme,
            host,
            path: path.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        self.matches_url(&parsed)
    }

    pub fn matches_url(&self, url: &Url) -> bool {
        let scheme_ok = match &self.scheme {
            SchemeRule::HttpAny => matches!(url.scheme(), "http" | "https"),
            SchemeRule::Exact(scheme) => url.scheme() == scheme,
        };
        if !scheme_ok {
            return false;
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let host_ok = match &self.host {
            HostRule::Any => true,
            HostRule::Exact(expected) => host == *expected,
            HostRule::Suffix(domain) => {
                host == *domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        };
        if !host_ok {
            return false;
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        glob_match(&self.path, &path)
    }
}

impl FromStr for MatchPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `*` matches any run of characters, everything else is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

pub const MEDIA_REQUEST_PATTERN: &str = "*://*.cachefly.net/*";
pub const MEDIA_CLIP_MARKER: &str = "odrmediaclips.cachefly.net";
pub const READER_PAGE_PATTERN: &str = "*://*.libbyapp.com/*";

/// Which outgoing requests count as chapter media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFilter {
    pub pattern: MatchPattern,
    pub resource_type: ResourceType,
    /// Literal substring the URL must also contain.
    pub marker: String,
}

impl RequestFilter {
    pub fn new(
        pattern: MatchPattern,
        resource_type: ResourceType,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            pattern,
            resource_type,
            marker: marker.into(),
        }
    }

    pub fn matches(&self, url: &str, resource_type: ResourceType) -> bool {
        resource_type == self.resource_type
            && url.contains(&self.marker)
            && self.pattern.matches(url)
    }
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self {
            pattern: media_request_pattern(),
            resource_type: ResourceType::Media,
            marker: MEDIA_CLIP_MARKER.to_string(),
        }
    }
}

fn media_request_pattern() -> MatchPattern {
    MatchPattern {
        source: MEDIA_REQUEST_PATTERN.to_string(),
        scheme: SchemeRule::HttpAny,
        host: HostRule::Suffix("cachefly.net".to_string()),
        path: "/*".to_string(),
    }
}

pub fn reader_page_pattern() -> MatchPattern {
    MatchPattern {
        source: READER_PAGE_PATTERN.to_string(),
        scheme: SchemeRule::HttpAny,
        host: HostRule::Suffix("libbyapp.com".to_string()),
        path: "/*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_patterns_equal_parsed_ones() {
        assert_eq!(
            media_request_pattern(),
            MatchPattern::parse(MEDIA_REQUEST_PATTERN).unwrap()
        );
        assert_eq!(
            reader_page_pattern(),
            MatchPattern::parse(READER_PAGE_PATTERN).unwrap()
        );
    }

    #[test]
    fn glob_handles_multiple_stars() {
        assert!(glob_match("/*", "/"));
        assert!(glob_match("/a*c*e", "/abcde"));
        assert!(!glob_match("/a*c*e", "/abcd"));
        assert!(glob_match("/exact", "/exact"));
        assert!(!glob_match("/exact", "/exact/more"));
    }
}
