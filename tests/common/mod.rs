//! Shared harness: the full router on an ephemeral port, backed by an in-memory
//! database and a temporary storage root.
#![allow(dead_code)]

use module_cdn::transport::http::{create_router, AppState};
use module_cdn::{DatabaseService, DiskStorage, DownloadTokenManager};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const LICENSE: &str = "TEST-LICENSE-001";
pub const REVOKED_LICENSE: &str = "TEST-LICENSE-REVOKED";

pub struct TestServer {
    pub base: String,
    pub client: reqwest::Client,
    pub storage_dir: tempfile::TempDir,
    pub db: Arc<DatabaseService>,
    pub tokens: Arc<DownloadTokenManager>,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn() -> TestServer {
    let storage_dir = tempfile::tempdir().expect("tempdir");
    let db = Arc::new(
        DatabaseService::connect("sqlite::memory:")
            .await
            .expect("in-memory database"),
    );
    db.seed_licenses(&[LICENSE, REVOKED_LICENSE])
        .await
        .expect("seed licenses");
    let revoked = db
        .list_licenses()
        .await
        .expect("list licenses")
        .into_iter()
        .find(|l| l.license_key == REVOKED_LICENSE)
        .expect("revoked key seeded");
    db.set_license_active(revoked.id, false)
        .await
        .expect("revoke");

    let tokens = Arc::new(DownloadTokenManager::default());
    let state = AppState {
        db_service: db.clone(),
        storage: Arc::new(DiskStorage::new(storage_dir.path())),
        tokens: tokens.clone(),
        admin_api_key: Some(Arc::from(ADMIN_KEY)),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = create_router(state);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });

    TestServer {
        base: format!("http://{}", addr),
        client: reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("client"),
        storage_dir,
        db,
        tokens,
        handle,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Uploads a module archive through the admin API and returns the stored record.
    pub async fn upload_module(
        &self,
        name: &str,
        kind: &str,
        filename: &str,
        price: &str,
        body: &[u8],
    ) -> Value {
        let resp = self
            .client
            .post(self.url("/modules"))
            .bearer_auth(ADMIN_KEY)
            .query(&[
                ("name", name),
                ("type", kind),
                ("filename", filename),
                ("price", price),
            ])
            .body(body.to_vec())
            .send()
            .await
            .expect("upload request");
        assert_eq!(resp.status(), 201, "upload of {} failed", filename);
        let json: Value = resp.json().await.expect("upload json");
        json["data"]["module"].clone()
    }

    pub async fn verify(&self, license: &str, module_filename: &str) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url("/license/verify"))
            .json(&serde_json::json!({
                "license": license,
                "moduleFilename": module_filename,
            }))
            .send()
            .await
            .expect("verify request");
        let status = resp.status().as_u16();
        (status, resp.json().await.expect("verify json"))
    }
}
