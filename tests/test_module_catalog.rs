//! Admin catalog operations over HTTP: auth gate, version grouping, edits,
//! install-command overrides, deletion, stored-file listings and application updates.

mod common;

use common::{spawn, ADMIN_KEY};
use serde_json::{json, Value};
use std::time::Duration;

async fn get_json(server: &common::TestServer, path: &str, admin: bool) -> (u16, Value) {
    let mut req = server.client.get(server.url(path));
    if admin {
        req = req.bearer_auth(ADMIN_KEY);
    }
    let resp = req.send().await.expect("request");
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn admin_routes_require_the_bearer_key() {
    let server = spawn().await;

    let (status, body) = get_json(&server, "/modules", false).await;
    assert_eq!(status, 401);
    assert_eq!(body, json!({ "success": false, "error": "unauthorized" }));

    let wrong = server
        .client
        .get(server.url("/licenses"))
        .bearer_auth("not-the-key")
        .send()
        .await
        .expect("request");
    assert_eq!(wrong.status(), 401);

    let upload = server
        .client
        .post(server.url("/modules"))
        .query(&[("name", "x"), ("type", "plugins"), ("filename", "x.zip")])
        .body(b"x".to_vec())
        .send()
        .await
        .expect("request");
    assert_eq!(upload.status(), 401);

    // Public routes stay open.
    let (status, _) = get_json(&server, "/marketplace", false).await;
    assert_eq!(status, 200);
    let (status, _) = get_json(&server, "/health", false).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn uploads_group_by_case_insensitive_name() {
    let server = spawn().await;
    let first = server
        .upload_module("Auth", "plugins", "auth.zip", "free", b"v1")
        .await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = server
        .upload_module("auth", "plugins", "auth.zip", "free", b"v2")
        .await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    server
        .upload_module("Payments", "plugins", "payments.zip", "premium", b"p")
        .await;

    let (status, body) = get_json(&server, "/modules", true).await;
    assert_eq!(status, 200);
    let groups = body["data"]["modules"].as_array().expect("groups");
    assert_eq!(groups.len(), 2);
    // Newest group first.
    assert_eq!(groups[0]["name"], "payments");
    assert_eq!(groups[1]["name"], "auth");
    assert_eq!(groups[1]["versionCount"], 2);
    assert_eq!(groups[1]["latest"]["id"], second["id"]);

    let (status, body) = get_json(&server, "/modules/AUTH/versions", false).await;
    assert_eq!(status, 200);
    let versions = body["data"]["versions"].as_array().expect("versions");
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["id"], second["id"]);
    assert_eq!(versions[0]["isCurrent"], true);
    assert_eq!(versions[1]["id"], first["id"]);
    assert_eq!(versions[1]["isCurrent"], false);

    let (status, _) = get_json(&server, "/modules/unknown/versions", false).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn upload_rejects_bad_input() {
    let server = spawn().await;
    let cases: [(&[(&str, &str)], &[u8]); 3] = [
        (&[("name", "x"), ("type", "plugins"), ("filename", "x.tar")], b"x"),
        (&[("type", "plugins"), ("filename", "x.zip")], b"x"),
        (&[("name", "x"), ("type", "plugins"), ("filename", "x.zip")], b""),
    ];
    for (query, body) in cases {
        let resp = server
            .client
            .post(server.url("/modules"))
            .bearer_auth(ADMIN_KEY)
            .query(query)
            .body(body.to_vec())
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 400, "{query:?}");
    }
    assert!(server.db.list_modules().await.expect("list").is_empty());
}

#[tokio::test]
async fn update_validates_and_reports_missing_modules() {
    let server = spawn().await;
    let module = server
        .upload_module("Auth", "plugins", "auth.zip", "free", b"v1")
        .await;
    let id = module["id"].as_i64().expect("id");

    let missing = server
        .client
        .put(server.url("/modules/999999"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "name": "Ghost", "type": "plugins" }))
        .send()
        .await
        .expect("request");
    assert_eq!(missing.status(), 404);
    assert_eq!(server.db.list_modules().await.expect("list").len(), 1);

    let no_type = server
        .client
        .put(server.url(&format!("/modules/{}", id)))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "name": "Auth" }))
        .send()
        .await
        .expect("request");
    assert_eq!(no_type.status(), 400);

    let updated = server
        .client
        .put(server.url(&format!("/modules/{}", id)))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "name": "Auth Suite", "type": "plugins", "description": "SSO" }))
        .send()
        .await
        .expect("request");
    assert_eq!(updated.status(), 200);
    let body: Value = updated.json().await.expect("json");
    let m = &body["data"]["module"];
    assert_eq!(m["name"], "Auth Suite");
    assert_eq!(m["version"], "1.0.0");
    assert_eq!(m["price"], "free");
    assert_eq!(m["description"], "SSO");
}

#[tokio::test]
async fn install_command_resolution_and_overrides() {
    let server = spawn().await;
    let module = server
        .upload_module("Auth", "plugins", "auth.zip", "free", b"v1")
        .await;
    let id = module["id"].as_i64().expect("id");
    let filename = module["filename"].as_str().expect("filename").to_string();
    let stem = filename.trim_end_matches(".zip");

    let (_, body) = get_json(&server, &format!("/modules/{}", id), false).await;
    assert_eq!(
        body["data"]["module"]["installCommand"],
        format!("cd src/{} && composer install", stem)
    );

    let resp = server
        .client
        .post(server.url("/module-metadata"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "filename": filename, "installCommand": "make install" }))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 201);

    let (_, body) = get_json(&server, &format!("/modules/{}", id), false).await;
    assert_eq!(body["data"]["module"]["installCommand"], "make install");

    let resp = server
        .client
        .post(server.url("/module-metadata"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "filename": filename, "installCommand": "make again" }))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);

    let (status, _) = get_json(&server, "/modules/not-an-id", false).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn delete_succeeds_even_when_file_is_gone() {
    let server = spawn().await;
    let module = server
        .upload_module("Auth", "plugins", "auth.zip", "free", b"v1")
        .await;
    let id = module["id"].as_i64().expect("id");
    let filename = module["filename"].as_str().expect("filename");

    std::fs::remove_file(server.storage_dir.path().join("plugins").join(filename))
        .expect("remove stored file");

    let resp = server
        .client
        .delete(server.url(&format!("/modules/{}", id)))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);

    let (status, _) = get_json(&server, &format!("/modules/{}", id), false).await;
    assert_eq!(status, 404);

    let again = server
        .client
        .delete(server.url(&format!("/modules/{}", id)))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .expect("request");
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn marketplace_groups_by_type_and_hides_premium_urls() {
    let server = spawn().await;
    server
        .upload_module("Auth", "plugins", "auth.zip", "free", b"a")
        .await;
    server
        .upload_module("Dark", "themes", "dark.zip", "premium", b"d")
        .await;

    let (status, body) = get_json(&server, "/marketplace", false).await;
    assert_eq!(status, 200);
    let modules = &body["data"]["modules"];
    assert_eq!(modules["plugins"].as_array().map(Vec::len), Some(1));
    assert!(modules["plugins"][0]["downloadUrl"].is_string());
    assert_eq!(modules["themes"][0]["price"], "premium");
    assert!(modules["themes"][0]["downloadUrl"].is_null());
}

#[tokio::test]
async fn licenses_can_be_revoked_and_restored() {
    let server = spawn().await;
    let (status, body) = get_json(&server, "/licenses", true).await;
    assert_eq!(status, 200);
    let licenses = body["data"]["licenses"].as_array().expect("licenses");
    let id = licenses
        .iter()
        .find(|l| l["license_key"] == common::LICENSE)
        .and_then(|l| l["id"].as_i64())
        .expect("seeded license");

    let module = server
        .upload_module("Billing", "plugins", "billing.zip", "premium", b"paid")
        .await;
    let filename = module["filename"].as_str().expect("filename").to_string();

    for (active, expected_status) in [(false, 403), (true, 200)] {
        let resp = server
            .client
            .patch(server.url(&format!("/licenses/{}", id)))
            .bearer_auth(ADMIN_KEY)
            .json(&json!({ "active": active }))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), 200);
        let (status, _) = server.verify(common::LICENSE, &filename).await;
        assert_eq!(status, expected_status, "active={active}");
    }

    let missing = server
        .client
        .patch(server.url("/licenses/424242"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "active": false }))
        .send()
        .await
        .expect("request");
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn application_release_and_update_check() {
    let server = spawn().await;

    let rejected = server
        .client
        .post(server.url("/applications"))
        .bearer_auth(ADMIN_KEY)
        .query(&[
            ("name", "Studio"),
            ("platform", "windows"),
            ("version", "2.0.0"),
            ("filename", "studio.txt"),
        ])
        .body(b"bin".to_vec())
        .send()
        .await
        .expect("request");
    assert_eq!(rejected.status(), 400);

    let resp = server
        .client
        .post(server.url("/applications"))
        .bearer_auth(ADMIN_KEY)
        .query(&[
            ("name", "Studio"),
            ("platform", "windows"),
            ("version", "2.0.0"),
            ("filename", "studio-setup.exe"),
            ("changelog", "faster"),
        ])
        .body(b"MZ-binary".to_vec())
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.expect("json");
    let app = &body["data"]["application"];
    let id = app["id"].as_i64().expect("id");
    let stored = app["filename"].as_str().expect("filename").to_string();

    let (status, body) = get_json(&server, "/applications?platform=windows", false).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["applications"].as_array().map(Vec::len), Some(1));
    let (_, body) = get_json(&server, "/applications?platform=linux", false).await;
    assert_eq!(body["data"]["applications"].as_array().map(Vec::len), Some(0));

    let (status, body) = get_json(&server, "/updates/windows/Studio/1.0.0", false).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["updateAvailable"], true);
    assert_eq!(body["data"]["latestVersion"], "2.0.0");
    assert_eq!(body["data"]["changelog"], "faster");
    let download_url = body["data"]["downloadUrl"].as_str().expect("url").to_string();
    assert_eq!(download_url, format!("/download/applications/{}", stored));

    let bytes = server
        .client
        .get(server.url(&download_url))
        .send()
        .await
        .expect("download")
        .bytes()
        .await
        .expect("bytes");
    assert_eq!(bytes.as_ref(), b"MZ-binary");

    let (_, body) = get_json(&server, "/updates/windows/Studio/2.0.0", false).await;
    assert_eq!(body["data"]["updateAvailable"], false);
    let (_, body) = get_json(&server, "/updates/macos/Studio/1.0.0", false).await;
    assert_eq!(body["data"]["updateAvailable"], false);

    let resp = server
        .client
        .delete(server.url(&format!("/applications/{}", id)))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 200);
    let (status, _) = get_json(&server, &format!("/applications/{}", id), false).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn module_info_covers_registered_unregistered_and_missing_files() {
    let server = spawn().await;
    let module = server
        .upload_module("Billing", "plugins", "billing.zip", "premium", b"paid")
        .await;
    let filename = module["filename"].as_str().expect("filename").to_string();

    let info_path = format!("/module-info/plugins/{}", filename);
    let (status, body) = get_json(&server, &info_path, false).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["registered"], true);
    assert_eq!(body["data"]["module"]["id"], module["id"]);
    assert_eq!(body["data"]["module"]["price"], "premium");
    assert!(body["data"]["module"]["downloadUrl"].is_null());

    // Dropped straight into the type directory, never registered.
    let plugins = server.storage_dir.path().join("plugins");
    std::fs::write(plugins.join("loose.zip"), b"loose").expect("write");
    let (status, body) = get_json(&server, "/module-info/plugins/loose.zip", false).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["registered"], false);
    let m = &body["data"]["module"];
    assert_eq!(m["name"], "loose");
    assert_eq!(m["type"], "plugins");
    assert_eq!(m["version"], "1.0.0");
    assert_eq!(m["price"], "free");
    assert_eq!(m["description"], "module not registered in database");
    assert_eq!(m["installCommand"], "cd src/loose && composer install");
    assert_eq!(m["downloadUrl"], "/download/plugins/loose.zip");

    let (status, body) = get_json(&server, "/module-info/plugins/ghost.zip", false).await;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    let (status, _) = get_json(&server, "/module-info/themes/loose.zip", false).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn type_listing_prices_stored_archives() {
    let server = spawn().await;
    let free = server
        .upload_module("Auth", "plugins", "auth.zip", "free", b"a")
        .await;
    let premium = server
        .upload_module("Billing", "plugins", "billing.zip", "premium", b"b")
        .await;
    let plugins = server.storage_dir.path().join("plugins");
    std::fs::write(plugins.join("loose.zip"), b"l").expect("write");
    std::fs::write(plugins.join("readme.txt"), b"r").expect("write");

    let (status, body) = get_json(&server, "/modules/type/plugins", false).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["moduleType"], "plugins");
    let modules = body["data"]["modules"].as_array().expect("modules");
    assert_eq!(modules.len(), 3);
    let entry = |name: &Value| {
        modules
            .iter()
            .find(|m| &m["filename"] == name)
            .cloned()
            .expect("listed")
    };

    let auth = entry(&free["filename"]);
    assert_eq!(auth["price"], "free");
    assert_eq!(auth["registered"], true);
    assert!(auth["downloadUrl"].is_string());

    let billing = entry(&premium["filename"]);
    assert_eq!(billing["price"], "premium");
    assert!(billing["downloadUrl"].is_null());

    let loose = entry(&json!("loose.zip"));
    assert_eq!(loose["registered"], false);
    assert_eq!(loose["downloadUrl"], "/download/plugins/loose.zip");

    let (status, body) = get_json(&server, "/modules/type/widgets", false).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"], json!({ "moduleType": "widgets", "modules": [] }));
}

#[tokio::test]
async fn non_numeric_ids_are_reported_verbatim() {
    let server = spawn().await;

    let (status, body) = get_json(&server, "/applications/abc", false).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "application not found: abc");

    let resp = server
        .client
        .delete(server.url("/applications/abc"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 404);

    let resp = server
        .client
        .patch(server.url("/licenses/abc"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "active": false }))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["error"], "license not found: abc");
}
