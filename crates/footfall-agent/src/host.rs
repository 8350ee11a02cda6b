//! # Host Environment
//!
//! What the tracker needs to know about the surface it runs in: where the
//! actor currently is, how it got there, and the forgery-protection token the
//! collector expects back.

use url::Url;

/// Read-only view of the hosting surface.
pub trait HostEnvironment: Send + Sync {
    /// Full current location (the landing page of a new visit).
    fn location(&self) -> String;

    /// Path component of the current location.
    fn pathname(&self) -> String;

    /// Current document title.
    fn title(&self) -> String;

    /// Where the actor came from, if known.
    fn referrer(&self) -> Option<String>;

    /// Screen width and height in pixels.
    fn screen_size(&self) -> (u32, u32);

    /// Form field name the collector reads the CSRF token from.
    fn csrf_param(&self) -> Option<String>;

    /// CSRF token issued by the collector.
    fn csrf_token(&self) -> Option<String>;

    /// `scheme://host[:port]` of the current location, when it is http(s).
    /// Relative collector endpoints resolve against it.
    fn origin(&self) -> Option<String> {
        let url = Url::parse(&self.location()).ok()?;
        match url.scheme() {
            "http" | "https" => Some(url.origin().ascii_serialization()),
            _ => None,
        }
    }
}

/// Fixed host description, for headless hosts and tests.
///
/// ## Example
/// ```rust
/// use footfall_agent::host::{HostEnvironment, StaticHost};
///
/// let host = StaticHost::new("https://shop.example.com/pricing?plan=pro")
///     .with_title("Pricing")
///     .with_screen(1440, 900);
///
/// assert_eq!(host.pathname(), "/pricing");
/// assert_eq!(host.screen_size(), (1440, 900));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticHost {
    pub location: String,
    pub title: String,
    pub referrer: Option<String>,
    pub screen_width: u32,
    pub screen_height: u32,
    pub csrf_param: Option<String>,
    pub csrf_token: Option<String>,
}

impl Default for StaticHost {
    fn default() -> Self {
        StaticHost::new("app://footfall/")
    }
}

impl StaticHost {
    pub fn new(location: impl Into<String>) -> Self {
        StaticHost {
            location: location.into(),
            title: String::new(),
            referrer: None,
            screen_width: 0,
            screen_height: 0,
            csrf_param: None,
            csrf_token: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_screen(mut self, width: u32, height: u32) -> Self {
        self.screen_width = width;
        self.screen_height = height;
        self
    }

    pub fn with_csrf(mut self, param: impl Into<String>, token: impl Into<String>) -> Self {
        self.csrf_param = Some(param.into());
        self.csrf_token = Some(token.into());
        self
    }
}

impl HostEnvironment for StaticHost {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn pathname(&self) -> String {
        Url::parse(&self.location)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn referrer(&self) -> Option<String> {
        self.referrer.clone().filter(|r| !r.is_empty())
    }

    fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    fn csrf_param(&self) -> Option<String> {
        self.csrf_param.clone()
    }

    fn csrf_token(&self) -> Option<String> {
        self.csrf_token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathname() {
        assert_eq!(StaticHost::new("https://example.com/a/b?c=1").pathname(), "/a/b");
        assert_eq!(StaticHost::new("https://example.com").pathname(), "/");
        assert_eq!(StaticHost::new("not a url").pathname(), "/");
    }

    #[test]
    fn test_empty_referrer_is_absent() {
        let host = StaticHost::new("https://example.com/").with_referrer("");
        assert_eq!(host.referrer(), None);
    }

    #[test]
    fn test_origin_only_for_web_locations() {
        assert_eq!(
            StaticHost::new("http://127.0.0.1:4040/pricing?plan=pro").origin().as_deref(),
            Some("http://127.0.0.1:4040")
        );
        assert_eq!(
            StaticHost::new("https://shop.example.com/").origin().as_deref(),
            Some("https://shop.example.com")
        );
        assert_eq!(StaticHost::default().origin(), None);
        assert_eq!(StaticHost::new("not a url").origin(), None);
    }
}
