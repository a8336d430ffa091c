use actix_web::web;

use crate::modules::document::{handle, storage::StorageGateway};

pub fn configure<S>(cfg: &mut web::ServiceConfig)
where
    S: StorageGateway + Send + Sync + 'static,
{
    cfg.service(web::resource("/upload").route(web::post().to(handle::upload_base64::<S>)))
        .service(
            web::resource("/upload-multipart").route(web::post().to(handle::upload_multipart::<S>)),
        )
        .service(
            web::resource("/upload-from-path").route(web::post().to(handle::upload_from_path::<S>)),
        )
        .service(web::resource("/url").route(web::get().to(handle::get_url_by_query::<S>)))
        .service(web::resource("/url/{public_id:.*}").route(web::get().to(handle::get_url::<S>)))
        .service(web::resource("/view").route(web::get().to(handle::view_document::<S>)))
        .service(
            web::resource("/delete/{public_id:.*}")
                .route(web::delete().to(handle::delete_document::<S>)),
        );
}
