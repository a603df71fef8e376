use std::net::SocketAddr;
use std::path::Path;

use lan_media_server::server::{self, AppState, StatusResponse};
use lan_media_server::ServerConfig;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;

fn fixture(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn start(root: &Path) -> SocketAddr {
    start_with(ServerConfig::new(root)).await
}

async fn start_with(config: ServerConfig) -> SocketAddr {
    let state = AppState::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });
    addr
}

fn header<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).map(|v| v.to_str().unwrap())
}

#[tokio::test]
async fn test_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start(dir.path()).await;
    let client = reqwest::Client::new();

    let files: Value = client
        .get(format!("http://{addr}/api/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(serde_json::json!([]), files);

    let status: StatusResponse = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(0, status.files_count);
    assert_eq!("LAN Media Server", status.title);
    assert_eq!("LAN Media Server is running", status.message);
    assert_eq!(env!("CARGO_PKG_VERSION"), status.version);
}

#[tokio::test]
async fn test_missing_root_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("files");
    let addr = start(&root).await;
    assert!(root.is_dir());

    let response = reqwest::get(format!("http://{addr}/api/files")).await.unwrap();
    assert_eq!(StatusCode::OK, response.status());
}

#[tokio::test]
async fn test_listing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b-side.mp3"), fixture(300)).unwrap();
    std::fs::write(dir.path().join("Attack.mp4"), fixture(100)).unwrap();
    std::fs::write(dir.path().join(".secret"), b"hidden").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("nested/deep.mkv"), fixture(5)).unwrap();
    let addr = start(dir.path()).await;

    let files: Value = reqwest::get(format!("http://{addr}/api/files"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let files = files.as_array().unwrap();
    assert_eq!(2, files.len());
    assert_eq!("Attack.mp4", files[0]["name"]);
    assert_eq!(100, files[0]["size"]);
    assert_eq!("b-side.mp3", files[1]["name"]);
    assert_eq!(300, files[1]["size"]);
    assert!(files[0]["lastModified"].is_string());

    let status: StatusResponse = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(2, status.files_count);
}

#[tokio::test]
async fn test_recursive_listing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("nested/deep.mkv"), fixture(5)).unwrap();
    let mut config = ServerConfig::new(dir.path());
    config.recursive_listing = true;
    let addr = start_with(config).await;

    let files: Value = reqwest::get(format!("http://{addr}/api/files"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!("nested/deep.mkv", files[0]["name"]);
}

#[tokio::test]
async fn test_resume_video() {
    let dir = tempfile::tempdir().unwrap();
    let data = fixture(1_000_000);
    std::fs::write(dir.path().join("video.mp4"), &data).unwrap();
    let addr = start(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/api/files/video.mp4"))
        .header("Range", "bytes=500000-")
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!(Some("bytes 500000-999999/1000000"), header(&response, "content-range"));
    assert_eq!(Some("500000"), header(&response, "content-length"));
    assert_eq!(Some("bytes"), header(&response, "accept-ranges"));
    assert_eq!(Some("video/mp4"), header(&response, "content-type"));
    assert_eq!(Some("inline; filename=\"video.mp4\""), header(&response, "content-disposition"));

    let body = response.bytes().await.unwrap();
    assert_eq!(&data[500_000..], &body[..]);
}

#[tokio::test]
async fn test_full_download() {
    let dir = tempfile::tempdir().unwrap();
    let data = fixture(3 * 1024 * 1024 + 5);
    std::fs::write(dir.path().join("album.flac"), &data).unwrap();
    let addr = start(dir.path()).await;

    let response = reqwest::get(format!("http://{addr}/api/files/album.flac?download=true"))
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(Some("bytes"), header(&response, "accept-ranges"));
    assert_eq!(Some(data.len().to_string().as_str()), header(&response, "content-length"));
    assert_eq!(None, header(&response, "content-range"));
    assert_eq!(Some("attachment; filename=\"album.flac\""), header(&response, "content-disposition"));

    let body = response.bytes().await.unwrap();
    assert_eq!(data, body);
}

#[tokio::test]
async fn test_range_variants() {
    let dir = tempfile::tempdir().unwrap();
    let data = fixture(100);
    std::fs::write(dir.path().join("clip.webm"), &data).unwrap();
    let addr = start(dir.path()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/files/clip.webm");

    // suffix longer than the file clamps to the whole file
    let response = client.get(&url).header("Range", "bytes=-500").send().await.unwrap();
    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!(Some("bytes 0-99/100"), header(&response, "content-range"));
    assert_eq!(data, response.bytes().await.unwrap());

    let response = client.get(&url).header("Range", "bytes=10-19").send().await.unwrap();
    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!(Some("10"), header(&response, "content-length"));
    assert_eq!(&data[10..20], &response.bytes().await.unwrap()[..]);

    let response = client.get(&url).header("Range", "bytes=100-").send().await.unwrap();
    assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, response.status());
    assert_eq!(Some("bytes */100"), header(&response, "content-range"));
    assert!(response.bytes().await.unwrap().is_empty());

    let response = client.get(&url).header("Range", "bytes=abc-10").send().await.unwrap();
    assert_eq!(StatusCode::BAD_REQUEST, response.status());
    assert!(response.bytes().await.unwrap().is_empty());

    let response = client.get(&url).header("Range", "bytes=0-1,5-6").send().await.unwrap();
    assert_eq!(StatusCode::BAD_REQUEST, response.status());
}

#[tokio::test]
async fn test_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("empty.txt"), b"").unwrap();
    let addr = start(dir.path()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/files/empty.txt");

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(Some("0"), header(&response, "content-length"));
    assert!(response.bytes().await.unwrap().is_empty());

    let response = client.get(&url).header("Range", "bytes=0-").send().await.unwrap();
    assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, response.status());
    assert_eq!(Some("bytes */0"), header(&response, "content-range"));
}

#[tokio::test]
async fn test_nested_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("shows/s01")).unwrap();
    std::fs::write(dir.path().join("shows/s01/e01.mkv"), fixture(64)).unwrap();
    let addr = start(dir.path()).await;

    let response = reqwest::get(format!("http://{addr}/api/files/shows/s01/e01.mkv")).await.unwrap();
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(Some("inline; filename=\"e01.mkv\""), header(&response, "content-disposition"));
    assert_eq!(fixture(64), response.bytes().await.unwrap());
}

#[tokio::test]
async fn test_errors() {
    let outer = tempfile::tempdir().unwrap();
    std::fs::write(outer.path().join("secret.txt"), b"secret").unwrap();
    let root = outer.path().join("media");
    std::fs::create_dir(&root).unwrap();
    std::fs::create_dir(root.join("folder")).unwrap();
    let addr = start(&root).await;

    let response = reqwest::get(format!("http://{addr}/api/files/missing.mp4")).await.unwrap();
    assert_eq!(StatusCode::NOT_FOUND, response.status());
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"].is_string());

    let response = reqwest::get(format!("http://{addr}/api/files/folder")).await.unwrap();
    assert_eq!(StatusCode::NOT_FOUND, response.status());

    // encoded so the client does not normalize it away
    let response = reqwest::get(format!("http://{addr}/api/files/..%2Fsecret.txt")).await.unwrap();
    assert_eq!(StatusCode::BAD_REQUEST, response.status());

    let response = reqwest::get(format!("http://{addr}/api/files/%2Fetc%2Fpasswd")).await.unwrap();
    assert_eq!(StatusCode::BAD_REQUEST, response.status());
}

#[tokio::test]
async fn test_download_flag_spellings() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("clip.mp4"), fixture(100)).unwrap();
    let addr = start(dir.path()).await;

    let response = reqwest::get(format!("http://{addr}/api/files/clip.mp4?download=1")).await.unwrap();
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(Some("attachment; filename=\"clip.mp4\""), header(&response, "content-disposition"));
    assert_eq!(fixture(100), response.bytes().await.unwrap());

    let response = reqwest::get(format!("http://{addr}/api/files/clip.mp4?download=0")).await.unwrap();
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(Some("inline; filename=\"clip.mp4\""), header(&response, "content-disposition"));

    let response = reqwest::get(format!("http://{addr}/api/files/clip.mp4?download=maybe")).await.unwrap();
    assert_eq!(StatusCode::BAD_REQUEST, response.status());
    assert_eq!(Some("application/json"), header(&response, "content-type"));
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("maybe"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_file_is_listed_and_served() {
    let dir = tempfile::tempdir().unwrap();
    let data = fixture(2_000);
    std::fs::write(dir.path().join("real.mp4"), &data).unwrap();
    std::os::unix::fs::symlink(dir.path().join("real.mp4"), dir.path().join("alias.mp4")).unwrap();
    let addr = start(dir.path()).await;

    let listing: Value = reqwest::get(format!("http://{addr}/api/files")).await.unwrap().json().await.unwrap();
    let names: Vec<_> = listing.as_array().unwrap().iter().map(|f| f["name"].as_str().unwrap()).collect();
    assert_eq!(vec!["alias.mp4", "real.mp4"], names);
    assert_eq!(2_000, listing[0]["size"]);

    let response = reqwest::get(format!("http://{addr}/api/files/alias.mp4")).await.unwrap();
    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(data, response.bytes().await.unwrap());
}
