use albumsync_disk::{ApiErrorClass, DiskClient, DiskError, Link, ResourceType};
use reqwest::StatusCode;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dir_entry(parent: &str, name: &str) -> serde_json::Value {
    json!({
        "path": format!("{parent}/{name}"),
        "name": name,
        "type": "dir"
    })
}

#[tokio::test]
async fn list_directory_page_sends_oauth_header_and_paging() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Photos"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "0"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "limit": 100,
                "offset": 0,
                "total": 2,
                "items": [
                    dir_entry("disk:/Photos", "2023-trip"),
                    {
                        "path": "disk:/Photos/readme.txt",
                        "name": "readme.txt",
                        "type": "file",
                        "size": 12,
                        "mime_type": "text/plain"
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let page = client
        .list_directory_page("disk:/Photos", 100, 0)
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].resource_type, ResourceType::Dir);
    assert_eq!(page.items[1].resource_type, ResourceType::File);
    assert_eq!(page.items[1].name, "readme.txt");
}

#[tokio::test]
async fn list_directory_all_follows_offsets() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "limit": 1,
                "offset": 0,
                "total": 2,
                "items": [dir_entry("disk:/Photos", "a")]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "limit": 1,
                "offset": 1,
                "total": 2,
                "items": [dir_entry("disk:/Photos", "b")]
            }
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let items = client
        .list_directory_all("disk:/Photos", 1)
        .await
        .unwrap();

    let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn list_directory_without_embedded_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "disk:/Photos/a.jpg",
            "name": "a.jpg",
            "type": "file"
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client
        .list_directory_page("disk:/Photos/a.jpg", 10, 0)
        .await
        .expect_err("file listing has no _embedded");
    assert!(matches!(err, DiskError::MissingEmbedded));
}

#[tokio::test]
async fn create_folder_uses_put() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Photos/2023-trip"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "href": "https://cloud-api.yandex.net/v1/disk/resources?path=disk%3A%2FPhotos%2F2023-trip",
            "method": "GET",
            "templated": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let link = client.create_folder("disk:/Photos/2023-trip").await.unwrap();
    assert_eq!(link.method, "GET");
}

#[tokio::test]
async fn create_existing_folder_reports_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "DiskPathPointsToExistentDirectoryError"
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client
        .create_folder("disk:/Photos/2023-trip")
        .await
        .expect_err("expected conflict");

    assert_eq!(err.classification(), Some(ApiErrorClass::Conflict));
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
}

#[tokio::test]
async fn get_upload_link_never_overwrites_when_asked() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/upload"))
        .and(query_param("path", "disk:/Photos/a.jpg"))
        .and(query_param("overwrite", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": "https://uploader.example/a.jpg",
            "method": "PUT",
            "templated": false
        })))
        .mount(&server)
        .await;

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let link = client
        .get_upload_link("disk:/Photos/a.jpg", false)
        .await
        .unwrap();

    assert_eq!(link.href.as_str(), "https://uploader.example/a.jpg");
    assert_eq!(link.method, "PUT");
}

#[tokio::test]
async fn upload_from_path_streams_file_contents() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload/a.jpg"))
        .and(body_bytes(b"jpeg-bytes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("a.jpg");
    std::fs::write(&source, b"jpeg-bytes").unwrap();

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let link = Link {
        href: format!("{}/upload/a.jpg", server.uri()).parse().unwrap(),
        method: "PUT".into(),
        templated: false,
    };
    client.upload_from_path(&link, &source).await.unwrap();
}

#[tokio::test]
async fn upload_rejection_surfaces_status() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload/a.jpg"))
        .respond_with(ResponseTemplate::new(507))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("a.jpg");
    std::fs::write(&source, b"jpeg-bytes").unwrap();

    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let link = Link {
        href: format!("{}/upload/a.jpg", server.uri()).parse().unwrap(),
        method: "PUT".into(),
        templated: false,
    };
    let err = client
        .upload_from_path(&link, &source)
        .await
        .expect_err("expected insufficient storage");
    assert_eq!(err.status(), Some(StatusCode::INSUFFICIENT_STORAGE));
}

#[tokio::test]
async fn upload_from_missing_file_is_io_error() {
    let server = MockServer::start().await;
    let client = DiskClient::with_base_url(&server.uri(), "test-token").unwrap();
    let link = Link {
        href: format!("{}/upload/a.jpg", server.uri()).parse().unwrap(),
        method: "PUT".into(),
        templated: false,
    };
    let err = client
        .upload_from_path(&link, std::path::Path::new("/definitely/not/here.jpg"))
        .await
        .expect_err("expected io error");
    assert!(matches!(err, DiskError::Io(_)));
}
