//! Upload a local file into a Drive folder with a service account.
//!
//! ```text
//! cargo run -p provider-google-drive --example upload_sample -- \
//!     service-account.json <folder-id> ./report.pdf application/pdf
//! ```
//!
//! The folder must be shared with the service account's email address.

use anyhow::{bail, Context};
use core_runtime::config::DriveConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use provider_google_drive::{auth, scope, ListQuery};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("provider_google_drive=info,core_auth=info"),
    )?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [key_path, folder_id, file_path, mime_type] = args.as_slice() else {
        bail!("usage: upload_sample <key.json> <folder-id> <file> <mime-type>");
    };

    let config = DriveConfig::builder().build()?;
    let drive = auth::authenticate_service_account_json(&config, key_path, &[scope::DRIVE])?;

    let file_name = Path::new(file_path)
        .file_name()
        .and_then(|name| name.to_str())
        .context("file path has no usable file name")?;

    let mut content = tokio::fs::File::open(file_path)
        .await
        .with_context(|| format!("cannot open {file_path}"))?;
    let file_id = drive
        .create_upload(
            &mut content,
            file_name,
            mime_type,
            Some(folder_id),
            Some("Uploaded by upload_sample"),
        )
        .await?;
    println!("Uploaded {file_name} as {file_id}");

    let query = ListQuery::new()
        .query(format!("'{folder_id}' in parents and trashed = false"))
        .page_size(100)
        .fields("nextPageToken, files(id, name, mimeType, size)");
    for file in drive.list_all(&query).await? {
        println!(
            "{}\t{}\t{}",
            file.id.as_deref().unwrap_or_default(),
            file.name.as_deref().unwrap_or_default(),
            file.size_bytes().map(|s| s.to_string()).unwrap_or_default()
        );
    }

    Ok(())
}
