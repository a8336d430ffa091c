use crate::{
    api::error,
    modules::document::schema::{IdentifierPlan, UploadRequest},
};

/// Decides folder, public id and overwrite intent for an upload.
///
/// An explicit public id is forwarded verbatim; the folder travels alongside
/// it and the provider decides final placement. The id the provider returns is
/// the one callers must persist.
#[derive(Debug, Clone)]
pub struct IdentifierPolicy {
    default_folder: String,
}

impl IdentifierPolicy {
    pub fn new(default_folder: impl Into<String>) -> Self {
        Self { default_folder: default_folder.into() }
    }

    pub fn derive(&self, request: &UploadRequest) -> Result<IdentifierPlan, error::SystemError> {
        let folder = match request.folder.as_deref().map(normalize_folder) {
            Some(folder) if !folder.is_empty() => folder,
            _ => normalize_folder(&self.default_folder),
        };
        if folder.split('/').any(|segment| segment == "." || segment == ".." || segment.is_empty())
        {
            return Err(error::SystemError::invalid_input(format!("Invalid folder: '{}'", folder)));
        }

        let public_id = match request.public_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                validate_public_id(id)?;
                Some(id.to_string())
            }
            _ => None,
        };

        Ok(IdentifierPlan { folder, public_id, overwrite: request.overwrite, invalidate: true })
    }
}

fn normalize_folder(folder: &str) -> String {
    folder.trim().trim_matches('/').to_string()
}

/// Drops anything after a stray `?` or `&`, which shows up when a client
/// pastes an id copied out of a URL.
pub fn clean_public_id(raw: &str) -> &str {
    raw.split(['?', '&']).next().unwrap_or_default().trim()
}

/// Checks that a public id can be placed in a delivery URL and addressed again.
pub fn validate_public_id(public_id: &str) -> Result<(), error::SystemError> {
    let invalid = |reason: &str| {
        error::SystemError::invalid_input(format!("Invalid public_id '{}': {}", public_id, reason))
    };

    if public_id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if public_id.starts_with('/') {
        return Err(invalid("must not start with '/'"));
    }
    if public_id.split('/').any(|segment| segment == "..") {
        return Err(invalid("must not contain '..' segments"));
    }
    if public_id.chars().any(|c| c.is_control() || matches!(c, '?' | '#' | '&' | '\\')) {
        return Err(invalid("contains a reserved character"));
    }

    Ok(())
}
