use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use witokit_core::contract::{DumpLister, MockDumpLister};
use witokit_core::error::{FetchError, PipelineError, TaskError};
use witokit_core::pipeline::{download, RunOptions};
use witokit_core::wiki::HttpDumpClient;

const SHARD1: &str = "enwiki-20181120-pages-articles1.xml-p10p30302.bz2";
const SHARD2: &str = "enwiki-20181120-pages-articles2.xml-p30304p88444.bz2";

fn bz2(body: &str) -> Vec<u8> {
    let mut enc = BzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(body.as_bytes()).unwrap();
    enc.finish().unwrap()
}

fn index_page(names: &[&str]) -> String {
    let links: String = names
        .iter()
        .map(|n| format!("<li><a href=\"{n}\">{n}</a> 123 MB</li>\n"))
        .collect();
    format!("<html><body><ul>\n{links}<li><a href=\"../\">up</a></li></ul></body></html>")
}

async fn serve_dump(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/enwiki/20181120"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(&[
            SHARD2,
            SHARD1,
            "enwiki-20181120-pages-articles-multistream.xml.bz2",
        ])))
        .mount(server)
        .await;
    for (name, body) in [(SHARD1, "<mediawiki>one</mediawiki>"), (SHARD2, "<mediawiki>two</mediawiki>")] {
        Mock::given(method("GET"))
            .and(path(format!("/enwiki/20181120/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bz2(body)))
            .mount(server)
            .await;
    }
}

fn options(workers: usize, keep_archives: bool) -> RunOptions {
    RunOptions {
        workers,
        keep_archives,
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn lists_archives_in_natural_order() {
    let server = MockServer::start().await;
    serve_dump(&server).await;

    let client = HttpDumpClient::new(server.uri());
    let names = client.list_archives("en", "20181120").await.unwrap();
    assert_eq!(names, vec![SHARD1, SHARD2]);
}

#[tokio::test]
async fn downloads_and_decompresses_every_shard() {
    let server = MockServer::start().await;
    serve_dump(&server).await;
    let out = tempdir().unwrap();

    let client = Arc::new(HttpDumpClient::new(server.uri()));
    let report = download("20181120", out.path(), &options(2, false), &*client, client.clone())
        .await
        .unwrap();

    let xml1 = out.path().join("enwiki-20181120-pages-articles1.xml-p10p30302");
    let xml2 = out.path().join("enwiki-20181120-pages-articles2.xml-p30304p88444");
    assert_eq!(report.outputs, vec![xml1.clone(), xml2.clone()]);
    assert_eq!(fs::read_to_string(&xml1).unwrap(), "<mediawiki>one</mediawiki>");
    assert_eq!(fs::read_to_string(&xml2).unwrap(), "<mediawiki>two</mediawiki>");
    assert!(!out.path().join(SHARD1).exists());
    assert!(!out.path().join(SHARD2).exists());
}

#[tokio::test]
async fn keep_archives_leaves_the_bz2_files() {
    let server = MockServer::start().await;
    serve_dump(&server).await;
    let out = tempdir().unwrap();

    let client = Arc::new(HttpDumpClient::new(server.uri()));
    download("20181120", out.path(), &options(1, true), &*client, client.clone())
        .await
        .unwrap();
    assert!(out.path().join(SHARD1).exists());
}

#[tokio::test]
async fn missing_archive_aborts_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/enwiki/20181120"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(&[SHARD1])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/enwiki/20181120/{SHARD1}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let out = tempdir().unwrap();

    let client = Arc::new(HttpDumpClient::new(server.uri()));
    let err = download("20181120", out.path(), &options(2, false), &*client, client.clone())
        .await
        .unwrap_err();

    match err {
        PipelineError::Task {
            task,
            source: TaskError::Fetch(FetchError::Status { status, url }),
            ..
        } => {
            assert_eq!(task, "download");
            assert_eq!(status, 404);
            assert!(url.ends_with(SHARD1));
        }
        other => panic!("expected a download failure, got {other:?}"),
    }
}

#[tokio::test]
async fn dump_without_archives_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/enwiki/20181120"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(&["md5sums.txt"])))
        .mount(&server)
        .await;

    let client = HttpDumpClient::new(server.uri());
    let err = client.list_archives("en", "20181120").await.unwrap_err();
    assert!(matches!(err, FetchError::NoArchives { .. }));
}

#[tokio::test]
async fn listing_failure_stops_before_any_download() {
    let mut lister = MockDumpLister::new();
    lister.expect_list_archives().returning(|_, _| {
        Err(FetchError::Status {
            url: "https://dumps.example/enwiki/latest".into(),
            status: 503,
        })
    });
    let fetcher = Arc::new(HttpDumpClient::new("http://127.0.0.1:9"));
    let out = tempdir().unwrap();

    let err = download("latest", out.path(), &options(2, false), &lister, fetcher)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("https://dumps.example/enwiki/latest"));
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}
