use axum::{
    body::{Body, Bytes},
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::documents;
use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::models::{
    empty_as_none, Document, DocumentChanges, DocumentFilter, NewDocument, NewUser, User,
};
use crate::users::{self, LoginOutcome};
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginUser {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    uid: i64,
}

#[derive(Deserialize)]
pub struct OwnerFilterQuery {
    uid: i64,
    #[serde(default, deserialize_with = "empty_as_none")]
    category_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    doc_type_id: Option<i64>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
}

impl OwnerFilterQuery {
    fn into_parts(self) -> (i64, DocumentFilter) {
        let filter = DocumentFilter {
            category_id: self.category_id,
            doc_type_id: self.doc_type_id,
            from_date: self.from_date,
            to_date: self.to_date,
        };
        (self.uid, filter)
    }
}

struct UploadedFile {
    name: String,
    data: Bytes,
}

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to the document management service" }))
}

pub async fn signup(
    State(state): State<AppState>,
    AppJson(new_user): AppJson<NewUser>,
) -> AppResult<Json<User>> {
    let user = users::register(&state.db, state.bcrypt_cost, new_user).await?;
    Ok(Json(user))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(login_data): AppJson<LoginUser>,
) -> AppResult<Json<LoginOutcome>> {
    let outcome = users::login(
        &state.db,
        &state.tokens,
        &login_data.username,
        &login_data.password,
    )
    .await?;
    Ok(Json(outcome))
}

fn parse_id(field: &str, value: &str) -> AppResult<Option<i64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| AppError::InvalidInput(format!("{field} must be an integer")))
}

/// Text parts override the query-string metadata; the first part carrying a
/// file name is the payload.
async fn read_upload(
    mut multipart: Multipart,
    mut meta: NewDocument,
) -> AppResult<(NewDocument, Option<UploadedFile>)> {
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let data = field.bytes().await?;
            if file.is_none() {
                file = Some(UploadedFile {
                    name: file_name,
                    data,
                });
            }
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "category_id" => meta.category_id = parse_id(&name, &value)?,
            "doc_type_id" => meta.doc_type_id = parse_id(&name, &value)?,
            "subtype_id" => meta.subtype_id = parse_id(&name, &value)?,
            "uploaded_by" => meta.uploaded_by = parse_id(&name, &value)?,
            "doc_date" => meta.doc_date = Some(value),
            "party_main_account" => meta.party_main_account = Some(value),
            "party_sub_account" => meta.party_sub_account = Some(value),
            "remarks" => meta.remarks = Some(value),
            _ => tracing::debug!(field = %name, "Ignoring unknown upload field"),
        }
    }

    Ok((meta, file))
}

pub async fn upload_document(
    State(state): State<AppState>,
    AppQuery(meta): AppQuery<NewDocument>,
    multipart: Multipart,
) -> AppResult<Json<Document>> {
    let (meta, file) = read_upload(multipart, meta).await?;
    let (file_name, data) = match &file {
        Some(file) => (file.name.as_str(), &file.data[..]),
        None => ("", &[][..]),
    };

    let document = documents::upload(&state.db, &state.files, meta, file_name, data).await?;
    Ok(Json(document))
}

pub async fn list_documents(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<OwnerQuery>,
) -> AppResult<Json<Vec<Document>>> {
    Ok(Json(documents::list_by_user(&state.db, query.uid).await?))
}

pub async fn list_user_documents(
    State(state): State<AppState>,
    AppPath(uid): AppPath<i64>,
) -> AppResult<Json<Vec<Document>>> {
    Ok(Json(documents::list_by_user(&state.db, uid).await?))
}

pub async fn filter_documents(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<OwnerFilterQuery>,
) -> AppResult<Json<Vec<Document>>> {
    let (uid, filter) = query.into_parts();
    Ok(Json(documents::filter(&state.db, uid, &filter).await?))
}

pub async fn filter_user_documents(
    State(state): State<AppState>,
    AppPath(uid): AppPath<i64>,
    AppQuery(filter): AppQuery<DocumentFilter>,
) -> AppResult<Json<Vec<Document>>> {
    Ok(Json(documents::filter(&state.db, uid, &filter).await?))
}

pub async fn update_document(
    State(state): State<AppState>,
    AppPath(doc_id): AppPath<i64>,
    AppJson(changes): AppJson<DocumentChanges>,
) -> AppResult<Json<Document>> {
    Ok(Json(documents::update(&state.db, doc_id, changes).await?))
}

pub async fn delete_document(
    State(state): State<AppState>,
    AppPath(doc_id): AppPath<i64>,
    AppQuery(query): AppQuery<OwnerQuery>,
) -> AppResult<Json<Document>> {
    let document = documents::delete(&state.db, &state.files, doc_id, query.uid).await?;
    Ok(Json(document))
}

pub async fn get_file(
    State(state): State<AppState>,
    AppPath(doc_id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let found = documents::get_file(&state.db, &state.files, doc_id).await?;

    let mime_type = mime_guess::from_path(&found.document.file_name).first_or_octet_stream();
    let body = Body::from_stream(ReaderStream::new(found.file));

    Ok((
        [(header::CONTENT_TYPE, mime_type.as_ref().to_string())],
        body,
    ))
}
