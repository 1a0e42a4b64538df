use std::fmt;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Folder,
    File,
    Image,
}

impl FileType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "folder" => Some(Self::Folder),
            "file" => Some(Self::File),
            "image" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::File => "file",
            Self::Image => "image",
        }
    }

    pub fn has_content(&self) -> bool {
        !matches!(self, Self::Folder)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a file lives in its owner's hierarchy.
///
/// The root is implicit: no record represents it. On the wire it is written as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParentRef {
    #[default]
    Root,
    Folder(Uuid),
}

impl ParentRef {
    /// Parses the textual form used in query strings: `"0"` is the root, anything
    /// else must be a folder id.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed == "0" {
            return Some(Self::Root);
        }
        Uuid::parse_str(trimmed).ok().map(Self::Folder)
    }

    pub fn from_column(value: Option<Uuid>) -> Self {
        value.map(Self::Folder).unwrap_or(Self::Root)
    }

    pub fn as_column(&self) -> Option<Uuid> {
        match self {
            Self::Root => None,
            Self::Folder(id) => Some(*id),
        }
    }
}

impl Serialize for ParentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Root => serializer.serialize_u8(0),
            Self::Folder(id) => serializer.collect_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub file_type: FileType,
    pub is_public: bool,
    pub parent: ParentRef,
    pub local_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub user_id: Uuid,
    pub name: String,
    pub file_type: FileType,
    pub is_public: bool,
    pub parent: ParentRef,
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = files)]
pub struct FileRow {
    pub id: Uuid,
    pub seq: i64,
    pub user_id: Uuid,
    pub name: String,
    pub file_type: String,
    pub is_public: bool,
    pub parent_id: Option<Uuid>,
    pub local_path: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FileRow {
    pub fn into_file(self) -> Option<File> {
        let file_type = FileType::parse(&self.file_type)?;
        Some(File {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            file_type,
            is_public: self.is_public,
            parent: ParentRef::from_column(self.parent_id),
            local_path: self.local_path,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = files)]
pub struct NewFileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub file_type: String,
    pub is_public: bool,
    pub parent_id: Option<Uuid>,
    pub local_path: Option<String>,
}

impl NewFileRow {
    pub fn from_new(id: Uuid, file: NewFile) -> Self {
        Self {
            id,
            user_id: file.user_id,
            name: file.name,
            file_type: file.file_type.as_str().to_string(),
            is_public: file.is_public,
            parent_id: file.parent.as_column(),
            local_path: file.local_path,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}
