use actix_multipart::{Field, Multipart};
use actix_web::{http::header, http::StatusCode, web, Either, HttpResponse};
use futures_util::TryStreamExt;
use validator::Validate;

use crate::api::{error, success::Success};
use crate::modules::document::{
    model::{Base64UploadRequest, PathUploadRequest, PublicIdQuery, ResourceTypeQuery, UploadOptions},
    schema::{DeleteResult, UploadResult, UrlResult},
    service::DocumentService,
    storage::StorageGateway,
};
use crate::utils::{parse_flag, ValidatedJson, ValidatedQuery};

const MAX_TEXT_FIELD_BYTES: usize = 4 * 1024;

fn upload_response(result: UploadResult) -> Success<UploadResult> {
    if result.success {
        Success::ok(Some(result)).message("File uploaded successfully")
    } else {
        Success::with_status(StatusCode::BAD_GATEWAY, Some(result)).message("Failed to upload file")
    }
}

/// Upload a base64 encoded document
pub async fn upload_base64<S>(
    service: web::Data<DocumentService<S>>,
    body: ValidatedJson<Base64UploadRequest>,
) -> Result<Success<UploadResult>, error::Error>
where
    S: StorageGateway + Send + Sync + 'static,
{
    let result = service.upload_base64(body.0).await?;
    Ok(upload_response(result))
}

/// Upload a document sent as multipart/form-data
pub async fn upload_multipart<S>(
    mut payload: Multipart,
    service: web::Data<DocumentService<S>>,
) -> Result<Success<UploadResult>, error::Error>
where
    S: StorageGateway + Send + Sync + 'static,
{
    let mut file: Option<(Vec<u8>, Option<String>)> = None;
    let mut options = UploadOptions::default();

    while let Some(mut field) =
        payload.try_next().await.map_err(|e| error::Error::bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string);
                let bytes = read_field(&mut field, service.max_file_size()).await?;
                file = Some((bytes, filename));
            }
            "folder" => options.folder = Some(read_text(&mut field).await?),
            "public_id" => options.public_id = Some(read_text(&mut field).await?),
            "resource_type" => {
                options.resource_type =
                    read_text(&mut field).await?.parse().map_err(error::Error::bad_request)?;
            }
            "overwrite" => {
                let value = read_text(&mut field).await?;
                options.overwrite = parse_flag(&value)
                    .ok_or_else(|| error::Error::bad_request("overwrite must be a boolean"))?;
            }
            _ => {
                // unknown fields are skipped
                while field.try_next().await.map_err(|e| error::Error::bad_request(e.to_string()))?.is_some() {}
            }
        }
    }

    let (bytes, filename) =
        file.ok_or_else(|| error::Error::bad_request("No file found in request"))?;
    let result = service.upload_multipart(bytes, filename, options).await?;
    Ok(upload_response(result))
}

/// Upload a document that already exists on the serving host
pub async fn upload_from_path<S>(
    service: web::Data<DocumentService<S>>,
    body: Either<ValidatedJson<PathUploadRequest>, web::Form<PathUploadRequest>>,
) -> Result<Success<UploadResult>, error::Error>
where
    S: StorageGateway + Send + Sync + 'static,
{
    let request = match body {
        Either::Left(json) => json.0,
        Either::Right(form) => {
            let form = form.into_inner();
            form.validate().map_err(|e| error::Error::bad_request(e.to_string()))?;
            form
        }
    };

    let options = request.options();
    let result = service.upload_from_server_path(request.file_path, options).await?;
    Ok(upload_response(result))
}

/// Resolve the delivery URL of a public id given in the path
pub async fn get_url<S>(
    service: web::Data<DocumentService<S>>,
    public_id: web::Path<String>,
    query: ValidatedQuery<ResourceTypeQuery>,
) -> Result<Success<UrlResult>, error::Error>
where
    S: StorageGateway + Send + Sync + 'static,
{
    let url = service.get_url(&public_id.into_inner(), query.0.resource_type)?;
    Ok(Success::ok(Some(url)))
}

/// Resolve the delivery URL of a public id given as a query parameter
pub async fn get_url_by_query<S>(
    service: web::Data<DocumentService<S>>,
    query: ValidatedQuery<PublicIdQuery>,
) -> Result<Success<UrlResult>, error::Error>
where
    S: StorageGateway + Send + Sync + 'static,
{
    let url = service.get_url(&query.0.public_id, query.0.resource_type)?;
    Ok(Success::ok(Some(url)))
}

/// Redirect the browser to the stored document
pub async fn view_document<S>(
    service: web::Data<DocumentService<S>>,
    query: ValidatedQuery<PublicIdQuery>,
) -> Result<HttpResponse, error::Error>
where
    S: StorageGateway + Send + Sync + 'static,
{
    let url = service.get_url(&query.0.public_id, query.0.resource_type)?;
    Ok(HttpResponse::Found().insert_header((header::LOCATION, url.url)).finish())
}

/// Delete a document by public id
pub async fn delete_document<S>(
    service: web::Data<DocumentService<S>>,
    public_id: web::Path<String>,
    query: ValidatedQuery<ResourceTypeQuery>,
) -> Result<Success<DeleteResult>, error::Error>
where
    S: StorageGateway + Send + Sync + 'static,
{
    let result = service.delete_asset(&public_id.into_inner(), query.0.resource_type).await?;

    // "not found" is a normal outcome of a repeated delete
    if result.success || result.result.is_some() {
        let message =
            if result.success { "File deleted successfully" } else { "File was not deleted" };
        Ok(Success::ok(Some(result)).message(message))
    } else {
        Ok(Success::with_status(StatusCode::BAD_GATEWAY, Some(result))
            .message("Failed to delete file"))
    }
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, error::Error> {
    let mut bytes = Vec::new();
    while let Some(chunk) =
        field.try_next().await.map_err(|e| error::Error::bad_request(e.to_string()))?
    {
        if bytes.len() + chunk.len() > limit {
            return Err(error::Error::bad_request(format!(
                "File size exceeds maximum allowed size of {} bytes",
                limit
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn read_text(field: &mut Field) -> Result<String, error::Error> {
    let bytes = read_field(field, MAX_TEXT_FIELD_BYTES).await?;
    String::from_utf8(bytes).map_err(|_| error::Error::bad_request("Form fields must be UTF-8"))
}
