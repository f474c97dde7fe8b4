//! Metadata resolver integration tests
//!
//! Drive and oEmbed lookups run against a wiremock server; concurrent
//! resolution is checked through the item ledger.

mod helpers;

use helpers::resolver_config;
use mbp_ingest::models::{
    DetectedType, FileHandle, ItemSource, ItemStatus, PendingItem, Preview, PreviewView,
    ResolveRequest, Resolution, LOADING_TITLE,
};
use mbp_ingest::services::resolvers::{PageRenderer, RenderedPage};
use mbp_ingest::services::{ItemLedger, MetadataResolver, ResolveError};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

fn resolver(server: &MockServer) -> Arc<MetadataResolver> {
    Arc::new(MetadataResolver::new(resolver_config(&server.uri(), Some(API_KEY))).unwrap())
}

fn link_request(url: &str, detected_type: DetectedType, needs_title: bool) -> ResolveRequest {
    ResolveRequest {
        item_id: Uuid::new_v4(),
        generation: 0,
        source: ItemSource::Link {
            url: url.to_string(),
            detected_type,
        },
        fallback_title: "fallback".to_string(),
        needs_title,
        needs_preview: true,
    }
}

fn remote_url(resolution: &Resolution) -> Option<&str> {
    match &resolution.preview {
        Some(Preview::Remote(url)) => Some(url.as_str()),
        _ => None,
    }
}

async fn mount_file_name(server: &MockServer, file_id: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", file_id)))
        .and(query_param("key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": name })))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, folder_id: &str, files: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param(
            "q",
            format!("'{}' in parents and trashed=false", folder_id),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(server)
        .await;
}

fn folder(id: &str) -> serde_json::Value {
    json!({ "id": id, "name": id, "mimeType": "application/vnd.google-apps.folder" })
}

fn file(id: &str, thumbnail: Option<&str>) -> serde_json::Value {
    match thumbnail {
        Some(link) => json!({ "id": id, "name": id, "mimeType": "application/pdf", "thumbnailLink": link }),
        None => json!({ "id": id, "name": id, "mimeType": "application/pdf" }),
    }
}

#[tokio::test]
async fn test_cloud_document_title_and_derived_thumbnail() {
    let server = MockServer::start().await;
    mount_file_name(&server, "DOC123", "Syllabus").await;

    let resolution = resolver(&server)
        .resolve(&link_request(
            "https://docs.google.com/document/d/DOC123/edit",
            DetectedType::CloudDocument,
            true,
        ))
        .await;

    assert_eq!(resolution.title.as_deref(), Some("Syllabus"));
    assert_eq!(
        remote_url(&resolution),
        Some(format!("{}/thumbnail?id=DOC123&sz=w320", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_cloud_document_without_key_keeps_thumbnail() {
    let server = MockServer::start().await;
    let resolver = MetadataResolver::new(resolver_config(&server.uri(), None)).unwrap();

    let resolution = resolver
        .resolve(&link_request(
            "https://drive.google.com/file/d/DOC9/view",
            DetectedType::CloudDocument,
            true,
        ))
        .await;

    assert!(resolution.title.is_none());
    assert!(remote_url(&resolution).is_some());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_folder_preview_searches_depth_first() {
    let server = MockServer::start().await;
    mount_file_name(&server, "ROOT", "Week 1").await;
    mount_listing(&server, "ROOT", json!([folder("A"), folder("B")])).await;
    mount_listing(&server, "A", json!([])).await;
    mount_listing(
        &server,
        "B",
        json!([file("F1", Some("https://thumbs.example/f1")), file("F2", None)]),
    )
    .await;

    let resolution = resolver(&server)
        .resolve(&link_request(
            "https://drive.google.com/drive/folders/ROOT",
            DetectedType::CloudFolder,
            true,
        ))
        .await;

    assert_eq!(resolution.title.as_deref(), Some("Week 1"));
    assert_eq!(remote_url(&resolution), Some("https://thumbs.example/f1"));
}

#[tokio::test]
async fn test_folder_files_win_over_subfolders() {
    let server = MockServer::start().await;
    mount_listing(&server, "ROOT", json!([folder("A"), file("TOP", None)])).await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", "'A' in parents and trashed=false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let resolution = resolver(&server)
        .resolve(&link_request(
            "https://drive.google.com/drive/folders/ROOT",
            DetectedType::CloudFolder,
            false,
        ))
        .await;

    assert_eq!(
        remote_url(&resolution),
        Some(format!("{}/thumbnail?id=TOP&sz=w320", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_folder_search_respects_depth_bound() {
    let server = MockServer::start().await;
    mount_listing(&server, "ROOT", json!([folder("A")])).await;
    mount_listing(&server, "A", json!([folder("B")])).await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", "'B' in parents and trashed=false"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "files": [file("DEEP", None)] })),
        )
        .expect(0)
        .mount(&server)
        .await;

    let mut config = resolver_config(&server.uri(), Some(API_KEY));
    config.folder_depth = 1;
    let resolver = MetadataResolver::new(config).unwrap();

    let resolution = resolver
        .resolve(&link_request(
            "https://drive.google.com/drive/folders/ROOT",
            DetectedType::CloudFolder,
            false,
        ))
        .await;

    assert!(resolution.preview.is_none());
}

#[tokio::test]
async fn test_empty_folder_still_gets_its_name() {
    let server = MockServer::start().await;
    mount_file_name(&server, "EMPTY", "Empty folder").await;
    mount_listing(&server, "EMPTY", json!([])).await;

    let resolution = resolver(&server)
        .resolve(&link_request(
            "https://drive.google.com/drive/folders/EMPTY",
            DetectedType::CloudFolder,
            true,
        ))
        .await;

    assert_eq!(resolution.title.as_deref(), Some("Empty folder"));
    assert!(resolution.preview.is_none());
}

#[tokio::test]
async fn test_failed_root_listing_degrades_to_no_preview() {
    let server = MockServer::start().await;
    mount_file_name(&server, "ROOT", "Week 2").await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let resolution = resolver(&server)
        .resolve(&link_request(
            "https://drive.google.com/drive/folders/ROOT",
            DetectedType::CloudFolder,
            true,
        ))
        .await;

    assert_eq!(resolution.title.as_deref(), Some("Week 2"));
    assert!(resolution.preview.is_none());
}

#[tokio::test]
async fn test_video_title_from_oembed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Lecture 1",
            "author_name": "Dept",
            "thumbnail_url": "https://img.example/other.jpg"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resolution = resolver(&server)
        .resolve(&link_request(
            "https://www.youtube.com/watch?v=abcdefghijk",
            DetectedType::VideoEmbed,
            true,
        ))
        .await;

    assert_eq!(resolution.title.as_deref(), Some("Lecture 1"));
    assert_eq!(
        remote_url(&resolution),
        Some(format!("{}/vi/abcdefghijk/hqdefault.jpg", server.uri()).as_str())
    );
}

#[tokio::test]
async fn test_titled_video_skips_oembed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "title": "unused" })))
        .expect(0)
        .mount(&server)
        .await;

    let resolution = resolver(&server)
        .resolve(&link_request(
            "https://youtu.be/abcdefghijk",
            DetectedType::VideoEmbed,
            false,
        ))
        .await;

    assert!(resolution.title.is_none());
    assert!(remote_url(&resolution).is_some());
}

#[tokio::test]
async fn test_one_failed_lookup_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_file_name(&server, "DOC123", "Syllabus").await;

    let ledger = ItemLedger::new(Uuid::new_v4(), 50);
    let ids = ledger
        .insert_all(vec![
            PendingItem::from_link(
                None,
                "https://youtu.be/abcdefghijk".into(),
                DetectedType::VideoEmbed,
                "abcdefghijk".into(),
            ),
            PendingItem::from_link(
                None,
                "https://docs.google.com/document/d/DOC123/edit".into(),
                DetectedType::CloudDocument,
                "DOC123".into(),
            ),
        ])
        .await
        .unwrap();

    let tickets = ledger.begin_pending().await;
    assert_eq!(tickets.len(), 2);
    resolver(&server).spawn_all(&ledger, tickets);

    tokio::time::timeout(Duration::from_secs(5), ledger.wait_settled())
        .await
        .expect("resolution should settle");

    let video = ledger.get(ids[0]).await.unwrap();
    assert_eq!(video.status, ItemStatus::Ready);
    assert_eq!(video.title, "abcdefghijk");
    assert_eq!(
        video.preview,
        Some(PreviewView::Remote {
            url: format!("{}/vi/abcdefghijk/hqdefault.jpg", server.uri())
        })
    );

    let document = ledger.get(ids[1]).await.unwrap();
    assert_eq!(document.status, ItemStatus::Ready);
    assert_eq!(document.title, "Syllabus");
}

#[tokio::test]
async fn test_url_edit_discards_slow_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/SLOW"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "Old name" }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    mount_file_name(&server, "FAST", "New name").await;

    let ledger = ItemLedger::new(Uuid::new_v4(), 50);
    let ids = ledger
        .insert_all(vec![PendingItem::from_link(
            None,
            "https://docs.google.com/document/d/SLOW/edit".into(),
            DetectedType::CloudDocument,
            "SLOW".into(),
        )])
        .await
        .unwrap();

    let resolver = resolver(&server);
    resolver.spawn_all(&ledger, ledger.begin_pending().await);

    let edited = ledger
        .edit_link(ids[0], "https://docs.google.com/document/d/FAST/edit")
        .await
        .unwrap();
    assert_eq!(edited.status, ItemStatus::Pending);
    assert_eq!(edited.title, LOADING_TITLE);
    resolver.spawn_all(&ledger, ledger.begin_pending().await);

    tokio::time::timeout(Duration::from_secs(5), ledger.wait_settled())
        .await
        .expect("resolution should settle");
    // Give the slow response time to arrive; it must not land
    tokio::time::sleep(Duration::from_millis(700)).await;

    let item = ledger.get(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Ready);
    assert_eq!(item.title, "New name");
}

#[tokio::test]
async fn test_stale_generation_is_discarded() {
    let server = MockServer::start().await;
    mount_file_name(&server, "DOC1", "First").await;

    let ledger = ItemLedger::new(Uuid::new_v4(), 50);
    let ids = ledger
        .insert_all(vec![PendingItem::from_link(
            None,
            "https://docs.google.com/document/d/DOC1/edit".into(),
            DetectedType::CloudDocument,
            "DOC1".into(),
        )])
        .await
        .unwrap();
    let ticket = ledger.begin_pending().await.remove(0);

    ledger
        .edit_link(ids[0], "https://docs.google.com/document/d/DOC2/edit")
        .await
        .unwrap();

    let late = resolver(&server).resolve(&ticket.request).await;
    assert_eq!(late.title.as_deref(), Some("First"));
    assert!(
        !ledger
            .apply_resolution(ids[0], ticket.request.generation, late)
            .await
    );

    let item = ledger.get(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(item.title, LOADING_TITLE);
}

struct FixedRenderer;

impl PageRenderer for FixedRenderer {
    fn render_first_page(&self, _path: &Path, _width: u32) -> Result<RenderedPage, ResolveError> {
        Ok(RenderedPage {
            png: b"\x89PNG\r\n\x1a\nfake".to_vec(),
            page_count: 12,
        })
    }
}

#[tokio::test]
async fn test_local_pdf_gets_owned_thumbnail_and_page_count() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("handout.pdf");
    std::fs::write(&pdf, b"%PDF-1.4\n%fake\n").unwrap();
    let handle = FileHandle::from_path(&pdf).unwrap();
    assert!(handle.is_document());

    let resolver = Arc::new(
        MetadataResolver::with_renderer(
            resolver_config(helpers::UNREACHABLE, None),
            Arc::new(FixedRenderer),
        )
        .unwrap(),
    );
    let ledger = ItemLedger::new(Uuid::new_v4(), 20);
    let ids = ledger
        .insert_all(vec![PendingItem::from_file(handle, "handout".into())])
        .await
        .unwrap();
    resolver.spawn_all(&ledger, ledger.begin_pending().await);

    tokio::time::timeout(Duration::from_secs(5), ledger.wait_settled())
        .await
        .expect("resolution should settle");

    let item = ledger.get(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Ready);
    assert_eq!(item.page_count, Some(12));
    let Some(PreviewView::Local { path, bytes }) = item.preview else {
        panic!("expected a local preview, got {:?}", item.preview);
    };
    assert!(path.exists());
    assert_eq!(bytes, 12);

    ledger.clear().await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_folder_search_stops_at_its_deadline() {
    let server = MockServer::start().await;
    mount_file_name(&server, "ROOT", "Shared drive").await;
    let subfolders: Vec<serde_json::Value> = (0..20).map(|i| folder(&format!("S{}", i))).collect();
    mount_listing(&server, "ROOT", json!(subfolders)).await;
    // Every subfolder is empty and slow to list
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "files": [] }))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let mut config = resolver_config(&server.uri(), Some(API_KEY));
    config.folder_depth = 1;
    config.folder_search_timeout = Duration::from_secs(1);
    let resolver = MetadataResolver::new(config).unwrap();

    let started = Instant::now();
    let resolution = resolver
        .resolve(&link_request(
            "https://drive.google.com/drive/folders/ROOT",
            DetectedType::CloudFolder,
            true,
        ))
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(3), "folder search took {:?}", elapsed);
    assert_eq!(resolution.title.as_deref(), Some("Shared drive"));
    assert!(resolution.preview.is_none());
}

#[tokio::test]
async fn test_lookups_past_their_timeout_still_settle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "title": "Too late" }))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/DOC123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "Too late" }))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    let ledger = ItemLedger::new(Uuid::new_v4(), 50);
    let ids = ledger
        .insert_all(vec![
            PendingItem::from_link(
                None,
                "https://youtu.be/abcdefghijk".into(),
                DetectedType::VideoEmbed,
                "abcdefghijk".into(),
            ),
            PendingItem::from_link(
                None,
                "https://docs.google.com/document/d/DOC123/edit".into(),
                DetectedType::CloudDocument,
                "DOC123".into(),
            ),
        ])
        .await
        .unwrap();

    resolver(&server).spawn_all(&ledger, ledger.begin_pending().await);

    // Request timeout is 2s; both lookups must give up well before the mocks answer
    tokio::time::timeout(Duration::from_millis(3500), ledger.wait_settled())
        .await
        .expect("resolution should settle after the request timeout");

    let video = ledger.get(ids[0]).await.unwrap();
    assert_eq!(video.status, ItemStatus::Ready);
    assert_eq!(video.title, "abcdefghijk");
    assert!(video.preview.is_some());

    let document = ledger.get(ids[1]).await.unwrap();
    assert_eq!(document.status, ItemStatus::Ready);
    assert_eq!(document.title, "DOC123");
    assert_ne!(document.title, LOADING_TITLE);
}
