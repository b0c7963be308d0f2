//! GitHub URL shapes and the dispatch decision for a target path.
//!
//! Every pattern is anchored at the start of the target and matched
//! case-insensitively. The scheme is optional so the same rules apply to
//! `github.com/...` and `https://github.com/...`.

use regex::Regex;
use std::sync::OnceLock;

static RELEASE_ARCHIVE: OnceLock<Regex> = OnceLock::new();
static BLOB_RAW: OnceLock<Regex> = OnceLock::new();
static GIT_PROTOCOL: OnceLock<Regex> = OnceLock::new();
static RAW_CONTENT: OnceLock<Regex> = OnceLock::new();
static GIST: OnceLock<Regex> = OnceLock::new();
static TAGS: OnceLock<Regex> = OnceLock::new();
static GITHUB_HOST: OnceLock<Regex> = OnceLock::new();

/// One of the GitHub URL shapes this service relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutePattern {
    /// `github.com/<owner>/<repo>/(releases|archive)/...`
    ReleaseArchive,
    /// `github.com/<owner>/<repo>/(blob|raw)/...`
    BlobRaw,
    /// `github.com/<owner>/<repo>/(info|git-...)`, the smart HTTP git protocol.
    GitProtocol,
    /// `raw.githubusercontent.com/...` or `raw.github.com/...`
    RawContent,
    /// `gist.githubusercontent.com/...` or `gist.github.com/...`
    Gist,
    /// `github.com/<owner>/<repo>/tags...`
    Tags,
}

impl RoutePattern {
    /// Every pattern, in the order used to recognise redirect targets.
    pub const ALL: [RoutePattern; 6] = [
        RoutePattern::ReleaseArchive,
        RoutePattern::BlobRaw,
        RoutePattern::GitProtocol,
        RoutePattern::RawContent,
        RoutePattern::Gist,
        RoutePattern::Tags,
    ];

    /// Patterns that are relayed as-is, in dispatch priority order.
    const DIRECT: [RoutePattern; 5] = [
        RoutePattern::ReleaseArchive,
        RoutePattern::Gist,
        RoutePattern::Tags,
        RoutePattern::GitProtocol,
        RoutePattern::RawContent,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            RoutePattern::ReleaseArchive => "release_archive",
            RoutePattern::BlobRaw => "blob_raw",
            RoutePattern::GitProtocol => "git_protocol",
            RoutePattern::RawContent => "raw_content",
            RoutePattern::Gist => "gist",
            RoutePattern::Tags => "tags",
        }
    }

    fn regex(self) -> &'static Regex {
        let (cell, expression) = match self {
            RoutePattern::ReleaseArchive => (
                &RELEASE_ARCHIVE,
                r"(?i)^(?:https?://)?github\.com/.+?/.+?/(?:releases|archive)/.*$",
            ),
            RoutePattern::BlobRaw => (
                &BLOB_RAW,
                r"(?i)^(?:https?://)?github\.com/.+?/.+?/(?:blob|raw)/.*$",
            ),
            RoutePattern::GitProtocol => (
                &GIT_PROTOCOL,
                r"(?i)^(?:https?://)?github\.com/.+?/.+?/(?:info|git-).*$",
            ),
            RoutePattern::RawContent => (
                &RAW_CONTENT,
                r"(?i)^(?:https?://)?raw\.(?:githubusercontent|github)\.com/.+?/.+?/.+?/.+$",
            ),
            RoutePattern::Gist => (
                &GIST,
                r"(?i)^(?:https?://)?gist\.(?:githubusercontent|github)\.com/.+?/.+?/.+$",
            ),
            RoutePattern::Tags => (
                &TAGS,
                r"(?i)^(?:https?://)?github\.com/.+?/.+?/tags.*$",
            ),
        };
        cell.get_or_init(|| Regex::new(expression).expect("route pattern must compile"))
    }

    pub fn matches(self, target: &str) -> bool {
        self.regex().is_match(target)
    }
}

/// What the router should do with a target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Relay the (possibly rewritten) target through the proxy engine.
    Proxy {
        pattern: RoutePattern,
        target: String,
    },
    /// Answer with a 302 to the mirror CDN.
    RewriteToMirrorAndRedirect { location: String },
    /// Nothing matched.
    Fallback,
}

/// Find the first pattern, in dispatch order, matching `target`.
pub fn match_route(target: &str) -> Option<RoutePattern> {
    RoutePattern::DIRECT
        .into_iter()
        .chain(std::iter::once(RoutePattern::BlobRaw))
        .find(|pattern| pattern.matches(target))
}

/// Whether `url` still points at one of the relayed GitHub shapes.
pub fn is_github_shaped(url: &str) -> bool {
    RoutePattern::ALL.iter().any(|pattern| pattern.matches(url))
}

/// Classify a target path.
///
/// Raw-content hosts are always relayed directly, even in mirror mode: only
/// blob/raw paths on `github.com` are ever sent to the mirror.
pub fn classify(target: &str, mirror_base: Option<&str>) -> DispatchDecision {
    match match_route(target) {
        Some(RoutePattern::BlobRaw) => match mirror_base {
            Some(base) => DispatchDecision::RewriteToMirrorAndRedirect {
                location: blob_to_mirror(target, base),
            },
            None => DispatchDecision::Proxy {
                pattern: RoutePattern::BlobRaw,
                target: blob_to_raw(target),
            },
        },
        Some(pattern) => DispatchDecision::Proxy {
            pattern,
            target: target.to_string(),
        },
        None => DispatchDecision::Fallback,
    }
}

/// Turn a `/blob/` page into the `/raw/` download of the same file.
pub fn blob_to_raw(target: &str) -> String {
    target.replacen("/blob/", "/raw/", 1)
}

/// Build the mirror URL, `<base>/<owner>/<repo>@<ref>/<path>`.
pub fn blob_to_mirror(target: &str, mirror_base: &str) -> String {
    let joined = if target.contains("/blob/") {
        target.replacen("/blob/", "@", 1)
    } else {
        target.replacen("/raw/", "@", 1)
    };
    let host = GITHUB_HOST.get_or_init(|| {
        Regex::new(r"(?i)^(?:https?://)?github\.com").expect("github host pattern must compile")
    });
    host.replace(&joined, regex::NoExpand(mirror_base))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIRROR: &str = "https://cdn.example/gh";

    #[test]
    fn test_each_pattern_matches_representative_path() {
        let cases = [
            (
                "https://github.com/a/b/archive/master.zip",
                RoutePattern::ReleaseArchive,
            ),
            (
                "github.com/hunshcn/project/releases/download/v0.1.0/example.zip",
                RoutePattern::ReleaseArchive,
            ),
            ("https://github.com/a/b/blob/main/f.go", RoutePattern::BlobRaw),
            ("https://github.com/a/b/raw/main/f.go", RoutePattern::BlobRaw),
            (
                "https://github.com/a/b.git/info/refs?service=git-upload-pack",
                RoutePattern::GitProtocol,
            ),
            (
                "https://github.com/a/b.git/git-upload-pack",
                RoutePattern::GitProtocol,
            ),
            (
                "https://raw.githubusercontent.com/a/b/main/f.go",
                RoutePattern::RawContent,
            ),
            ("raw.github.com/a/b/main/f.go", RoutePattern::RawContent),
            (
                "https://gist.githubusercontent.com/cielpy/123/raw/cmd.py",
                RoutePattern::Gist,
            ),
            ("https://github.com/a/b/tags", RoutePattern::Tags),
        ];
        for (path, expected) in cases {
            assert_eq!(match_route(path), Some(expected), "{path}");
        }
    }

    #[test]
    fn test_matching_is_case_insensitive_and_anchored() {
        assert_eq!(
            match_route("HTTPS://GitHub.com/a/b/Releases/download/x"),
            Some(RoutePattern::ReleaseArchive)
        );
        assert_eq!(
            match_route("https://evil.example/github.com/a/b/archive/x.zip"),
            None
        );
    }

    #[test]
    fn test_non_matching_paths_fall_back() {
        for path in [
            "https://github.com/a/b",
            "https://github.com/a",
            "https://example.com/a/b/archive/x.zip",
            "https://raw.githubusercontent.com/a/b",
            "",
            "::::",
        ] {
            assert_eq!(classify(path, None), DispatchDecision::Fallback, "{path}");
        }
    }

    #[test]
    fn test_blob_is_rewritten_to_raw_without_mirror() {
        assert_eq!(
            classify("https://github.com/a/b/blob/main/f.go", None),
            DispatchDecision::Proxy {
                pattern: RoutePattern::BlobRaw,
                target: "https://github.com/a/b/raw/main/f.go".to_string(),
            }
        );
    }

    #[test]
    fn test_blob_redirects_to_mirror() {
        assert_eq!(
            classify("https://github.com/a/b/blob/main/f.go", Some(MIRROR)),
            DispatchDecision::RewriteToMirrorAndRedirect {
                location: "https://cdn.example/gh/a/b@main/f.go".to_string(),
            }
        );
        assert_eq!(
            blob_to_mirror("github.com/a/b/raw/v1/dir/f.go", MIRROR),
            "https://cdn.example/gh/a/b@v1/dir/f.go"
        );
    }

    #[test]
    fn test_raw_content_host_is_relayed_even_in_mirror_mode() {
        let decision = classify("https://raw.githubusercontent.com/a/b/main/f.go", Some(MIRROR));
        assert_eq!(
            decision,
            DispatchDecision::Proxy {
                pattern: RoutePattern::RawContent,
                target: "https://raw.githubusercontent.com/a/b/main/f.go".to_string(),
            }
        );
    }

    #[test]
    fn test_releases_win_over_blob_when_both_could_match() {
        // "/releases/" appears before "/blob/", so the direct pattern wins.
        assert_eq!(
            match_route("https://github.com/a/b/releases/blob/x"),
            Some(RoutePattern::ReleaseArchive)
        );
    }

    #[test]
    fn test_is_github_shaped() {
        assert!(is_github_shaped(
            "https://github.com/a/b/releases/download/v1/x.zip"
        ));
        assert!(is_github_shaped("https://github.com/a/b/blob/main/x"));
        assert!(!is_github_shaped(
            "https://objects.githubusercontent.com/github-production-release-asset/1"
        ));
        assert!(!is_github_shaped("https://codeload.github.com/a/b/zip/main"));
    }
}
