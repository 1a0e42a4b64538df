//! Ownership and visibility rules over the file repository.
//!
//! A file is readable by its owner, and by anyone once it is public. Only the owner
//! may list it under a folder or flip its visibility.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::jobs::{enqueue_thumbnail, JobQueue, ThumbnailPayload};
use crate::models::{File, FileType, NewFile, ParentRef};
use crate::repository::{FileRepository, StoreError, PAGE_SIZE};
use crate::storage::ObjectStorage;

/// Widths of the generated thumbnails, in generation order.
pub const THUMBNAIL_WIDTHS: [u32; 3] = [500, 250, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentProblem {
    NotFound,
    NotAFolder,
}

impl fmt::Display for ParentProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentProblem::NotFound => f.write_str("Parent not found"),
            ParentProblem::NotAFolder => f.write_str("Parent is not a folder"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("{0}")]
    InvalidParent(ParentProblem),

    #[error("file not found")]
    NotFound,

    #[error("file belongs to another user")]
    Forbidden,

    #[error("folders have no content")]
    NotAFile,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("byte store error: {0}")]
    Storage(anyhow::Error),
}

pub type FileResult<T> = Result<T, FileError>;

/// Upload request as received from the client, before validation.
#[derive(Debug, Clone, Default)]
pub struct CreateFile {
    pub name: Option<String>,
    pub file_type: Option<String>,
    /// `None` when the client named a parent that cannot be a valid id.
    pub parent: Option<ParentRef>,
    pub is_public: bool,
    /// Base64-encoded content; required for everything but folders.
    pub data: Option<String>,
}

/// Which bytes of a file to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentVariant {
    Original,
    Thumbnail(u32),
}

impl ContentVariant {
    /// Parses the `size` query parameter. Widths without a generated thumbnail are
    /// rejected with `NotFound`, as no such bytes can exist.
    pub fn from_size(size: Option<&str>) -> FileResult<Self> {
        let Some(raw) = size.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(Self::Original);
        };
        let width: u32 = raw.parse().map_err(|_| FileError::NotFound)?;
        if THUMBNAIL_WIDTHS.contains(&width) {
            Ok(Self::Thumbnail(width))
        } else {
            Err(FileError::NotFound)
        }
    }

    pub fn key_for(&self, original: &str) -> String {
        match self {
            Self::Original => original.to_string(),
            Self::Thumbnail(width) => derivative_key(original, *width),
        }
    }
}

/// Storage key of the thumbnail of `original` at `width`.
pub fn derivative_key(original: &str, width: u32) -> String {
    format!("{original}_{width}")
}

#[derive(Clone)]
pub struct FileService {
    files: Arc<dyn FileRepository>,
    jobs: Arc<dyn JobQueue>,
    storage: Arc<dyn ObjectStorage>,
}

impl FileService {
    pub fn new(
        files: Arc<dyn FileRepository>,
        jobs: Arc<dyn JobQueue>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            files,
            jobs,
            storage,
        }
    }

    pub async fn create(&self, owner: Uuid, request: CreateFile) -> FileResult<File> {
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(FileError::Validation("Missing name"))?
            .to_string();
        let file_type = request
            .file_type
            .as_deref()
            .and_then(FileType::parse)
            .ok_or(FileError::Validation("Missing type"))?;
        if file_type.has_content() && request.data.is_none() {
            return Err(FileError::Validation("Missing data"));
        }

        let parent = request
            .parent
            .ok_or(FileError::InvalidParent(ParentProblem::NotFound))?;
        if let ParentRef::Folder(parent_id) = parent {
            let folder = self
                .files
                .find_by_id(parent_id)
                .await?
                .ok_or(FileError::InvalidParent(ParentProblem::NotFound))?;
            if folder.file_type != FileType::Folder {
                return Err(FileError::InvalidParent(ParentProblem::NotAFolder));
            }
        }

        let local_path = match (file_type.has_content(), request.data) {
            (true, Some(encoded)) => {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .map_err(|_| FileError::Validation("Invalid data"))?;
                let key = self.storage.allocate_key();
                self.storage
                    .put_object(&key, bytes)
                    .await
                    .map_err(FileError::Storage)?;
                Some(key)
            }
            _ => None,
        };

        let file = self
            .files
            .insert(NewFile {
                user_id: owner,
                name,
                file_type,
                is_public: request.is_public,
                parent,
                local_path,
            })
            .await?;
        info!(file_id = %file.id, user_id = %owner, file_type = %file.file_type, "file created");

        if file.file_type == FileType::Image {
            let payload = ThumbnailPayload {
                user_id: owner,
                file_id: file.id,
            };
            // The upload stands even if thumbnails cannot be scheduled now.
            if let Err(err) = enqueue_thumbnail(self.jobs.as_ref(), &payload).await {
                warn!(file_id = %file.id, error = %err, "failed to enqueue thumbnail job");
            }
        }

        Ok(file)
    }

    /// Fetches a file the requester may see. `requester` is `None` for anonymous reads.
    pub async fn get(&self, requester: Option<Uuid>, file_id: Uuid) -> FileResult<File> {
        let file = self
            .files
            .find_by_id(file_id)
            .await?
            .ok_or(FileError::NotFound)?;
        if file.is_public || requester == Some(file.user_id) {
            Ok(file)
        } else {
            Err(FileError::Forbidden)
        }
    }

    /// Lists the owner's own files under `parent`. Public files of other users never
    /// appear here. `None` names a parent that cannot exist and yields an empty page.
    pub async fn list(
        &self,
        owner: Uuid,
        parent: Option<ParentRef>,
        page: i64,
    ) -> FileResult<Vec<File>> {
        let Some(parent) = parent else {
            return Ok(Vec::new());
        };
        Ok(self
            .files
            .find_children(owner, parent, page, PAGE_SIZE)
            .await?)
    }

    pub async fn set_visibility(
        &self,
        owner: Uuid,
        file_id: Uuid,
        is_public: bool,
    ) -> FileResult<File> {
        let file = self
            .files
            .find_by_id(file_id)
            .await?
            .ok_or(FileError::NotFound)?;
        if file.user_id != owner {
            return Err(FileError::Forbidden);
        }
        if file.is_public == is_public {
            return Ok(file);
        }
        let updated = self
            .files
            .set_public(file_id, is_public)
            .await?
            .ok_or(FileError::NotFound)?;
        info!(file_id = %file_id, is_public, "file visibility changed");
        Ok(updated)
    }

    pub async fn read_content(
        &self,
        requester: Option<Uuid>,
        file_id: Uuid,
        variant: ContentVariant,
    ) -> FileResult<(File, Vec<u8>)> {
        let file = self.get(requester, file_id).await?;
        if file.file_type == FileType::Folder {
            return Err(FileError::NotAFile);
        }
        let original = file.local_path.as_deref().ok_or(FileError::NotFound)?;
        let bytes = self
            .storage
            .get_object(&variant.key_for(original))
            .await
            .map_err(FileError::Storage)?
            .ok_or(FileError::NotFound)?;
        Ok((file, bytes))
    }
}
