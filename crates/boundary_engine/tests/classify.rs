use std::time::Duration;

use boundary_engine::{
    classify, is_network_url, ArchiveEndpoint, CdxClassifier, Classifier, ClassifyError,
    EngineSettings,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn archive_for(server: &MockServer) -> ArchiveEndpoint {
    ArchiveEndpoint::new(format!("{}/", server.uri()), "cdx")
}

fn classifier() -> CdxClassifier {
    CdxClassifier::new(&EngineSettings::default()).expect("client builds")
}

#[test]
fn query_url_encodes_the_href() {
    let archive = ArchiveEndpoint::new("http://test.com/", "cdx");
    let url = archive.query_url("http://result.com").expect("valid url");
    assert_eq!(
        url.as_str(),
        "http://test.com/cdx?output=json&limit=1&url=http%3A%2F%2Fresult.com"
    );
}

#[test]
fn default_archive_is_local() {
    let archive = ArchiveEndpoint::default();
    assert_eq!(archive.host, "http://localhost:8080/");
    assert_eq!(archive.endpoint, "cdx");
}

#[test]
fn only_http_schemes_are_network_urls() {
    assert!(is_network_url("http://example.com/a"));
    assert!(is_network_url("https://example.com/a"));
    assert!(!is_network_url("mailto:someone@example.com"));
    assert!(!is_network_url("javascript:void(0)"));
    assert!(!is_network_url("not a url"));
}

#[tokio::test]
async fn non_empty_body_means_archived() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .and(query_param("output", "json"))
        .and(query_param("limit", "1"))
        .and(query_param("url", "http://archived.test/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[[\"urlkey\"]]"))
        .expect(1)
        .mount(&server)
        .await;

    let present = classify(&classifier(), &archive_for(&server), "http://archived.test/page").await;
    assert!(present);
}

#[tokio::test]
async fn empty_body_means_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let present = classify(&classifier(), &archive_for(&server), "http://missing.test/").await;
    assert!(!present);
}

#[tokio::test]
async fn server_error_is_reported_and_classified_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let archive = archive_for(&server);
    let err = classifier()
        .lookup(&archive, "http://broken.test/")
        .await
        .unwrap_err();
    assert_eq!(err, ClassifyError::HttpStatus(500));
    assert!(!classify(&classifier(), &archive, "http://broken.test/").await);
}

#[tokio::test]
async fn non_network_href_never_reaches_the_archive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x"))
        .expect(0)
        .mount(&server)
        .await;

    let present = classify(&classifier(), &archive_for(&server), "mailto:a@b.test").await;
    assert!(!present);
}

#[tokio::test]
async fn request_timeout_is_classified_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("late"),
        )
        .mount(&server)
        .await;

    let settings = EngineSettings {
        request_timeout: Duration::from_millis(50),
        ..EngineSettings::default()
    };
    let classifier = CdxClassifier::new(&settings).expect("client builds");
    let archive = archive_for(&server);

    let err = classifier.lookup(&archive, "http://slow.test/").await.unwrap_err();
    assert_eq!(err, ClassifyError::Timeout);
    assert!(!classify(&classifier, &archive, "http://slow.test/").await);
}
