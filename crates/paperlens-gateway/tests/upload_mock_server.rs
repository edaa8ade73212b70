use paperlens_gateway::{Endpoint, UploadClient, UploadError};
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> UploadClient {
    UploadClient::new(Endpoint::parse(&server.uri()).unwrap())
}

#[tokio::test]
async fn upload_sends_bytes_and_filename() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/paper/upload"))
        .and(header("x-filename", "attention.pdf"))
        .and(body_bytes(b"%PDF-1.7 fake".to_vec()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"paper_id": "7f7c5d3e-paper"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let paper_id = client_for(&server)
        .upload("attention.pdf", b"%PDF-1.7 fake".to_vec())
        .await
        .unwrap();
    assert_eq!(paper_id, "7f7c5d3e-paper");
}

#[tokio::test]
async fn upload_file_uses_file_name() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("survey.pdf");
    std::fs::write(&file, b"%PDF").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/paper/upload"))
        .and(header("x-filename", "survey.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"paper_id": "p-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let paper_id = client_for(&server).upload_file(&file).await.unwrap();
    assert_eq!(paper_id, "p-1");
}

#[tokio::test]
async fn non_ascii_name_falls_back() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/paper/upload"))
        .and(header("x-filename", "uploaded.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"paper_id": "p-2"})))
        .expect(1)
        .mount(&server)
        .await;

    let paper_id = client_for(&server)
        .upload("论文.pdf", vec![1, 2, 3])
        .await
        .unwrap();
    assert_eq!(paper_id, "p-2");
}

#[tokio::test]
async fn rejected_upload_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/paper/upload"))
        .respond_with(ResponseTemplate::new(413).set_body_string("payload too large"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .upload("big.pdf", vec![0; 16])
        .await
        .unwrap_err();
    match err {
        UploadError::Rejected { status, body } => {
            assert_eq!(status.as_u16(), 413);
            assert_eq!(body, "payload too large");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_paper_id_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/paper/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .upload("a.pdf", vec![0])
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::MissingId));
}

#[tokio::test]
async fn missing_file_is_a_read_error() {
    let server = MockServer::start().await;
    let err = client_for(&server)
        .upload_file(std::path::Path::new("/definitely/not/here.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Read { .. }));
    assert!(err.to_string().contains("here.pdf"));
}
