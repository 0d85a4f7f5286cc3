use chrono::Utc;
use std::path::Path;
use tokio::fs;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{Document, DocumentChanges, DocumentFilter, NewDocument, NewDocumentRow};
use crate::storage::FileStore;

#[derive(Debug)]
pub struct DocumentFile {
    pub document: Document,
    pub file: fs::File,
}

fn required_id(value: Option<i64>, field: &'static str) -> AppResult<i64> {
    match value {
        Some(id) if id != 0 => Ok(id),
        _ => Err(AppError::MissingRequiredField(field)),
    }
}

fn required_text<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput(format!("{field} is required")))
}

/// Stores the payload, then records its metadata. The file is written before
/// the row; a failed insert leaves the file behind.
pub async fn upload(
    db: &Database,
    files: &FileStore,
    meta: NewDocument,
    file_name: &str,
    data: &[u8],
) -> AppResult<Document> {
    let category_id = required_id(meta.category_id, "category_id")?;
    let doc_type_id = required_id(meta.doc_type_id, "doc_type_id")?;
    let subtype_id = required_id(meta.subtype_id, "subtype_id")?;
    let uploaded_by = required_id(meta.uploaded_by, "uploaded_by")?;
    let doc_date = required_text(&meta.doc_date, "doc_date")?;
    let party_main_account = required_text(&meta.party_main_account, "party_main_account")?;
    let party_sub_account = required_text(&meta.party_sub_account, "party_sub_account")?;
    let file_name = FileStore::storage_name(file_name).ok_or(AppError::MissingRequiredField("file"))?;

    tracing::info!(
        category_id,
        doc_type_id,
        subtype_id,
        uploaded_by,
        file_name = %file_name,
        size = data.len(),
        "Received upload"
    );

    let path = files.save(&file_name, data).await?;
    let file_path = path.to_string_lossy().into_owned();

    let session = db.begin().await?;
    let id = session.insert_document(&NewDocumentRow {
        category_id,
        doc_type_id,
        subtype_id,
        doc_date,
        party_main_account,
        party_sub_account,
        file_path: &file_path,
        file_name: &file_name,
        uploaded_by,
        uploaded_date: Utc::now(),
        remarks: meta.remarks.as_deref(),
    })?;
    let document = session.document(id)?.ok_or(AppError::NotFound)?;
    session.commit()?;

    Ok(document)
}

pub async fn list_by_user(db: &Database, uid: i64) -> AppResult<Vec<Document>> {
    filter(db, uid, &DocumentFilter::default()).await
}

pub async fn filter(db: &Database, uid: i64, filter: &DocumentFilter) -> AppResult<Vec<Document>> {
    if let (Some(from), Some(to)) = (filter.from_date, filter.to_date) {
        if from > to {
            return Err(AppError::InvalidRange);
        }
    }

    let session = db.begin().await?;
    let docs = session.documents_by_owner(uid, filter)?;
    session.commit()?;
    Ok(docs)
}

/// Authorizes `changes.modified_by` against the owner column, then records it
/// as the modifier. The owner never changes.
pub async fn update(db: &Database, doc_id: i64, changes: DocumentChanges) -> AppResult<Document> {
    let session = db.begin().await?;
    if session.owned_document(doc_id, changes.modified_by)?.is_none() {
        return Err(AppError::NotFoundOrForbidden);
    }

    session.update_document(doc_id, &changes, Utc::now())?;
    let document = session.document(doc_id)?.ok_or(AppError::NotFoundOrForbidden)?;
    session.commit()?;

    tracing::info!(doc_id, modified_by = changes.modified_by, "Document updated");
    Ok(document)
}

/// Removes the backing file, then the row. A file that cannot be removed is
/// logged and the row is deleted anyway.
pub async fn delete(db: &Database, files: &FileStore, doc_id: i64, uid: i64) -> AppResult<Document> {
    let session = db.begin().await?;
    let document = session
        .owned_document(doc_id, uid)?
        .ok_or(AppError::NotFoundOrForbidden)?;

    match files.remove(Path::new(&document.file_path)).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(doc_id, path = %document.file_path, "Backing file already gone"),
        Err(e) => tracing::warn!(doc_id, path = %document.file_path, "Failed to remove backing file: {}", e),
    }

    session.delete_document(doc_id)?;
    session.commit()?;

    tracing::info!(doc_id, uid, "Document deleted");
    Ok(document)
}

/// Opens the stored file for any existing document. No ownership check.
pub async fn get_file(db: &Database, files: &FileStore, doc_id: i64) -> AppResult<DocumentFile> {
    let document = {
        let session = db.begin().await?;
        let document = session.document(doc_id)?;
        session.commit()?;
        document.ok_or(AppError::NotFound)?
    };

    let file = files
        .open_file(Path::new(&document.file_path))
        .await?
        .ok_or(AppError::FileMissing)?;

    Ok(DocumentFile { document, file })
}
