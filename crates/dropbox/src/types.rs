use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryTag {
    File,
    Folder,
    Deleted,
}

/// One entry from a folder listing or change page. `size` and
/// `client_modified` are only present for files.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Entry {
    #[serde(rename = ".tag")]
    pub tag: EntryTag,
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub client_modified: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn is_file(&self) -> bool {
        self.tag == EntryTag::File
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ListFolderPage {
    pub entries: Vec<Entry>,
    pub cursor: String,
    pub has_more: bool,
}

#[derive(serde::Serialize)]
pub(crate) struct ListFolderRequest<'a> {
    pub path: &'a str,
    pub recursive: bool,
}

#[derive(serde::Serialize)]
pub(crate) struct ListFolderContinueRequest<'a> {
    pub cursor: &'a str,
}

#[derive(serde::Serialize)]
pub(crate) struct PathArg<'a> {
    pub path: &'a str,
}

#[derive(serde::Serialize)]
pub(crate) struct UploadArg<'a> {
    pub path: &'a str,
    pub mode: &'a str,
    pub autorename: bool,
    pub mute: bool,
}
