extern crate url;

use self::url::Url;

pub const RESOURCES: &str = "resources";
pub const CONTENT: &str = "content";
pub const REPAIR: &str = "repair";

/// Base address of a drywall server plus helpers building the protocol URLs.
#[derive(Clone, Debug)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    #[must_use]
    pub fn new(uri: &str) -> Option<Endpoint> {
        let base = Url::parse(uri).ok()?;
        if base.cannot_be_a_base() {
            return None;
        }
        Some(Endpoint { base })
    }

    #[must_use]
    pub fn resources(&self) -> String {
        self.join(&[RESOURCES])
    }

    /// Resource names are percent-encoded as a single path segment.
    #[must_use]
    pub fn resource(&self, name: &str) -> String {
        self.join(&[RESOURCES, name])
    }

    #[must_use]
    pub fn content(&self, name: &str) -> String {
        self.join(&[RESOURCES, name, CONTENT])
    }

    #[must_use]
    pub fn repair(&self) -> String {
        self.join(&[REPAIR])
    }

    fn join(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }
}
