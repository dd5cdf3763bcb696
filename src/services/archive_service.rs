// Archive packaging - export an adventure as a portable zip and import it back
//
// Layout: `<name>.json` snapshot, `index.html` player page, `static/...`
// shared web assets and `upload/<slug>/...` media.

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::MediaConfig;
use crate::core::{check_slug, Permission};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::GraphStore;
use crate::infrastructure::media::MediaStore;
use crate::models::Adventure;
use crate::services::copy_service::{media_dir, rebase_snapshot, CopyService};
use crate::services::player_page::PlayerRenderer;

/// Shared web files every export carries, relative to the web directory
pub const STATIC_MANIFEST: [&str; 10] = [
    "css/ps_fonts.css",
    "css/ps.css",
    "favicon.ico",
    "js/aventyr.model.js",
    "js/aventyr.viewer.js",
    "js/markdown-it.min.js",
    "js/markdownhelper.js",
    "js/aventyr.player.js",
    "js/aventyr.props.js",
    "js/aventyr.scrollytell.js",
];

const UPLOAD_URL_PREFIX: &str = "/upload/";
const WEB_URL_PREFIX: &str = "/web/";

pub fn export_name(slug: &str) -> String {
    format!("PSadventure_{}", slug)
}

/// Every asset key an export of `adventure` tries to include
pub fn export_asset_keys(adventure: &Adventure) -> BTreeSet<String> {
    let mut keys = adventure.referenced_assets();
    keys.extend(STATIC_MANIFEST.iter().map(|f| format!("{}{}", WEB_URL_PREFIX, f)));
    keys
}

/// Name an asset key gets inside the archive
pub fn archive_entry_name(key: &str) -> String {
    key.replacen("/upload/", "upload/", 1)
        .replacen("/web/css/", "static/css/", 1)
        .replacen("/web/js/", "static/js/", 1)
        .replacen("/web/", "static/", 1)
}

/// A written export and the bytes to serve for it
#[derive(Debug, Clone)]
pub struct ExportedArchive {
    pub file_name: String,
    /// Media-relative path the archive was saved at
    pub path: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct ArchiveService {
    store: Arc<dyn GraphStore>,
    media: Arc<dyn MediaStore>,
    renderer: Arc<dyn PlayerRenderer>,
    copies: CopyService,
    config: MediaConfig,
}

impl ArchiveService {
    pub fn new(
        store: Arc<dyn GraphStore>,
        media: Arc<dyn MediaStore>,
        renderer: Arc<dyn PlayerRenderer>,
        copies: CopyService,
        config: MediaConfig,
    ) -> Self {
        Self {
            store,
            media,
            renderer,
            copies,
            config,
        }
    }

    fn upload_dir(&self) -> &str {
        self.config.upload_dir.trim_matches('/')
    }

    /// Media path an asset key is read from; keys outside upload and web are not local
    fn asset_path(&self, key: &str) -> Option<String> {
        if let Some(rest) = key.strip_prefix(UPLOAD_URL_PREFIX) {
            Some(format!("{}/{}", self.upload_dir(), rest))
        } else {
            key.strip_prefix(WEB_URL_PREFIX)
                .map(|rest| format!("{}/{}", self.config.web_dir.trim_matches('/'), rest))
        }
    }

    async fn collect_assets(&self, adventure: &Adventure) -> AppResult<Vec<(String, Vec<u8>)>> {
        let mut entries = Vec::new();
        for key in export_asset_keys(adventure) {
            let Some(path) = self.asset_path(&key) else {
                warn!("Missing: {} (not a local asset)", key);
                continue;
            };
            match self.media.open_file(&path).await {
                Ok(bytes) => {
                    let name = archive_entry_name(&key);
                    debug!("Added: {}", name);
                    entries.push((name, bytes));
                }
                Err(AppError::NotFound(_)) | Err(AppError::BadPayload(_)) => {
                    warn!("Missing: {}", key);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    /// Package the adventure reachable through either slug
    #[instrument(skip(self))]
    pub async fn export_archive(&self, slug: &str) -> AppResult<ExportedArchive> {
        check_slug(slug)?;
        let adventure = self.store.fetch_adventure(slug, Permission::Ignore).await?;
        let name = export_name(slug);

        let snapshot = serde_json::to_vec(&adventure)
            .map_err(|e| AppError::ArchiveError(format!("Failed to encode adventure: {}", e)))?;
        let page = self.renderer.render_player_page(&adventure)?;
        let assets = self.collect_assets(&adventure).await?;
        let asset_count = assets.len();

        let json_name = format!("{}.json", name);
        let bytes = tokio::task::spawn_blocking(move || {
            let mut entries = Vec::with_capacity(assets.len() + 2);
            entries.push((json_name, snapshot));
            entries.push(("index.html".to_string(), page.into_bytes()));
            entries.extend(assets);
            write_zip(entries)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Archive task failed: {}", e)))??;

        let file_name = format!("{}.zip", name);
        let path = format!("{}/{}", self.upload_dir(), file_name);
        self.media.write_file(&path, &bytes).await?;
        info!(adventure_id = %adventure.id, assets = asset_count, size = bytes.len(), "Exported adventure to {}", path);

        if bytes.len() as u64 > self.config.export_size_limit {
            return Err(AppError::PayloadTooLarge(
                "Could not export. Too large filesize.".to_string(),
            ));
        }

        Ok(ExportedArchive {
            file_name,
            path,
            bytes,
        })
    }

    /// Create a new adventure from an exported archive
    #[instrument(skip(self, archive), fields(size = archive.len()))]
    pub async fn import_archive(&self, archive: Vec<u8>) -> AppResult<Adventure> {
        // Everything is read and validated before a new identity is minted
        let contents = tokio::task::spawn_blocking(move || read_archive(&archive))
            .await
            .map_err(|e| AppError::Internal(format!("Archive task failed: {}", e)))??;
        let payload = contents.payload;

        let skeleton = self
            .copies
            .rotate_identity(&[payload.slug.as_str(), payload.view_slug.as_str()])
            .await?;
        let snapshot = rebase_snapshot(&payload, &payload.slug, &skeleton);
        let imported = self.copies.commit_into(&skeleton, &snapshot).await?;

        let source_prefix = format!("upload/{}/", payload.slug);
        let destination = media_dir(self.upload_dir(), &skeleton.edit_slug);
        let mut written = 0;
        for (name, bytes) in &contents.uploads {
            let Some(rest) = name.strip_prefix(&source_prefix) else {
                warn!("Skipping {}: outside the adventure's media folder", name);
                continue;
            };
            self.media
                .write_file(&format!("{}/{}", destination, rest), bytes)
                .await?;
            written += 1;
        }

        info!(adventure_id = %imported.id, media = written, "Imported adventure");
        Ok(imported)
    }
}

fn write_zip(entries: Vec<(String, Vec<u8>)>) -> AppResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(&bytes)?;
        }
        writer.finish()?;
    }
    Ok(cursor.into_inner())
}

/// The parts of an archive an import consumes
#[derive(Debug)]
pub struct ArchiveContents {
    pub payload: Adventure,
    /// Entries under `upload`, keyed by their archive name
    pub uploads: Vec<(String, Vec<u8>)>,
}

pub fn read_archive(data: &[u8]) -> AppResult<ArchiveContents> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    // First `.json` entry wins
    let mut payload = None;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_file() && file.name().ends_with(".json") {
            let mut raw = Vec::new();
            file.read_to_end(&mut raw)
                .map_err(|e| AppError::ArchiveError(format!("Unreadable entry {}: {}", file.name(), e)))?;
            let adventure: Adventure = serde_json::from_slice(&raw).map_err(|e| {
                AppError::BadPayload(format!("error.adventure.payloaderror: {}", e))
            })?;
            payload = Some(adventure);
            break;
        }
    }
    let payload = payload.ok_or_else(|| {
        AppError::ArchiveError("Adventure file missing in archive.".to_string())
    })?;

    let mut uploads = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if !file.name().starts_with("upload") || file.is_dir() {
            continue;
        }
        let Some(enclosed) = file.enclosed_name() else {
            warn!("Skipping unsafe archive entry {}", file.name());
            continue;
        };
        let name = enclosed.to_string_lossy().replace('\\', "/");
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| AppError::ArchiveError(format!("Unreadable entry {}: {}", name, e)))?;
        uploads.push((name, bytes));
    }

    Ok(ArchiveContents { payload, uploads })
}
