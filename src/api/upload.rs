//! Multipart image uploads
//!
//! Shared by `POST /api/v1/images` and the `/images/upload` form. The file
//! goes in a field named `photo` (or `file`), its display name in `name`.

use axum::extract::Multipart;

/// A parsed upload form
#[derive(Debug, Default)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
    pub name: Option<String>,
}

/// Read the file and name fields; other fields are skipped
pub async fn read_image_upload(multipart: &mut Multipart) -> Result<ImageUpload, String> {
    let mut upload = ImageUpload::default();
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Failed to read multipart: {}", e))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "photo" | "file" => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .filter(|ct| ct != "application/octet-stream")
                    .or_else(|| filename.as_deref().and_then(content_type_for))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file: {}", e))?;

                upload.data = data.to_vec();
                upload.content_type = content_type;
                upload.filename = filename;
                has_file = true;
            }
            "name" => {
                let name = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read name: {}", e))?;
                upload.name = Some(name);
            }
            _ => {}
        }
    }

    if !has_file {
        return Err("No file provided".to_string());
    }
    Ok(upload)
}

/// Guess an image content type from a file extension
fn content_type_for(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_lowercase();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(content_type.to_string())
}
