use serde::Deserialize;

/// One entry in a listing: a resource's name and its canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedResource {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
}

/// A page of a resource listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub count: Option<u64>,
    /// URL of the following page; `None` on the last page.
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<NamedResource>,
}

/// Downloaded bytes and the content type the server reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}
