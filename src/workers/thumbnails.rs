use std::{io::Cursor, sync::Arc};

use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, ImageReader};
use serde::Deserialize;
use tokio::task;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    jobs::JOB_THUMBNAIL,
    models::Job,
    services::files::{derivative_key, THUMBNAIL_WIDTHS},
    state::AppState,
};

use super::{JobExecution, JobHandler};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailJobPayload {
    file_id: Option<String>,
    user_id: Option<String>,
}

/// Renders every entry of [`THUMBNAIL_WIDTHS`] for an uploaded image and stores it at
/// `<localPath>_<width>`.
///
/// A failed run starts over from the first width. Each output key is fixed and
/// overwritten in full, so reruns need no record of earlier progress.
pub struct GenerateThumbnailsJob;

impl GenerateThumbnailsJob {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenerateThumbnailsJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for GenerateThumbnailsJob {
    fn job_type(&self) -> &'static str {
        JOB_THUMBNAIL
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let payload: ThumbnailJobPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid thumbnail payload: {err}"),
                }
            }
        };
        let Some(file_id) = payload.file_id else {
            return JobExecution::Failed {
                error: "Missing fileId".into(),
            };
        };
        let Some(user_id) = payload.user_id else {
            return JobExecution::Failed {
                error: "Missing userId".into(),
            };
        };

        let not_found = || JobExecution::Failed {
            error: "File not found".into(),
        };
        let (Ok(file_id), Ok(user_id)) = (Uuid::parse_str(&file_id), Uuid::parse_str(&user_id))
        else {
            return not_found();
        };

        let file = match state.files.find_by_id(file_id).await {
            Ok(Some(file)) if file.user_id == user_id => file,
            Ok(_) => return not_found(),
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "thumbnail lookup failed; will retry");
                return JobExecution::Retry {
                    error: err.to_string(),
                };
            }
        };

        let Some(original_key) = file.local_path.clone() else {
            return JobExecution::Failed {
                error: "File has no content".into(),
            };
        };

        let bytes = match state.storage.get_object(&original_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                return JobExecution::Retry {
                    error: format!("original content missing at {original_key}"),
                }
            }
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "thumbnail fetch failed; will retry");
                return JobExecution::Retry {
                    error: err.to_string(),
                };
            }
        };

        let rendered = match task::spawn_blocking(move || render_thumbnails(&bytes)).await {
            Ok(Ok(rendered)) => rendered,
            Ok(Err(err)) => return JobExecution::Failed { error: err },
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "thumbnail task panicked");
                return JobExecution::Retry {
                    error: format!("worker panicked: {join_err}"),
                };
            }
        };

        for (width, image_bytes) in rendered {
            let key = derivative_key(&original_key, width);
            if let Err(err) = state.storage.put_object(&key, image_bytes).await {
                warn!(job_id = %job.id, width, error = %err, "failed to store thumbnail; retrying");
                return JobExecution::Retry {
                    error: err.to_string(),
                };
            }
        }

        info!(job_id = %job.id, file_id = %file.id, "thumbnails generated");
        JobExecution::Success
    }
}

/// Decodes `bytes` and encodes one resized copy per width, keeping the aspect ratio
/// and, for JPEG and PNG sources, the original format.
fn render_thumbnails(bytes: &[u8]) -> Result<Vec<(u32, Vec<u8>)>, String> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| err.to_string())?;
    let format = match reader.format() {
        Some(ImageFormat::Jpeg) => ImageFormat::Jpeg,
        _ => ImageFormat::Png,
    };
    let image = reader
        .decode()
        .map_err(|err| format!("cannot decode image: {err}"))?;

    THUMBNAIL_WIDTHS
        .iter()
        .map(|&width| {
            let resized = resize_to_width(&image, width);
            encode(resized, format).map(|encoded| (width, encoded))
        })
        .collect()
}

fn resize_to_width(image: &DynamicImage, width: u32) -> DynamicImage {
    let (orig_width, orig_height) = image.dimensions();
    let height = (u64::from(orig_height) * u64::from(width) / u64::from(orig_width.max(1)))
        .clamp(1, u64::from(u32::MAX)) as u32;
    image.resize_exact(width, height, FilterType::Triangle)
}

fn encode(image: DynamicImage, format: ImageFormat) -> Result<Vec<u8>, String> {
    // The JPEG encoder has no alpha channel.
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, format)
        .map_err(|err| err.to_string())?;
    Ok(cursor.into_inner())
}
