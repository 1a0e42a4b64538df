use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{File, FileRow, NewFile, NewFileRow, ParentRef};
use crate::schema::files;

use super::{page_offset, with_conn, FileRepository, StoreError, StoreResult};

#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_file(row: FileRow) -> StoreResult<File> {
    let id = row.id;
    let kind = row.file_type.clone();
    row.into_file()
        .ok_or_else(|| StoreError::Corrupt(format!("file {id} has unknown type {kind:?}")))
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn insert(&self, file: NewFile) -> StoreResult<File> {
        let row = NewFileRow::from_new(Uuid::new_v4(), file);
        with_conn(&self.pool, move |conn| {
            let inserted: FileRow = diesel::insert_into(files::table)
                .values(&row)
                .returning(FileRow::as_returning())
                .get_result(conn)?;
            to_file(inserted)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<File>> {
        with_conn(&self.pool, move |conn| {
            files::table
                .find(id)
                .select(FileRow::as_select())
                .first(conn)
                .optional()?
                .map(to_file)
                .transpose()
        })
        .await
    }

    async fn find_children(
        &self,
        owner: Uuid,
        parent: ParentRef,
        page: i64,
        page_size: i64,
    ) -> StoreResult<Vec<File>> {
        with_conn(&self.pool, move |conn| {
            let mut query = files::table
                .filter(files::user_id.eq(owner))
                .select(FileRow::as_select())
                .into_boxed();
            query = match parent {
                ParentRef::Root => query.filter(files::parent_id.is_null()),
                ParentRef::Folder(id) => query.filter(files::parent_id.eq(id)),
            };
            let rows: Vec<FileRow> = query
                .order(files::seq.asc())
                .offset(page_offset(page, page_size))
                .limit(page_size)
                .load(conn)?;
            rows.into_iter().map(to_file).collect()
        })
        .await
    }

    async fn set_public(&self, id: Uuid, is_public: bool) -> StoreResult<Option<File>> {
        with_conn(&self.pool, move |conn| {
            diesel::update(files::table.find(id))
                .set((
                    files::is_public.eq(is_public),
                    files::updated_at.eq(Utc::now().naive_utc()),
                ))
                .returning(FileRow::as_returning())
                .get_result(conn)
                .optional()?
                .map(to_file)
                .transpose()
        })
        .await
    }

    async fn count(&self) -> StoreResult<i64> {
        with_conn(&self.pool, |conn| Ok(files::table.count().get_result(conn)?)).await
    }
}
