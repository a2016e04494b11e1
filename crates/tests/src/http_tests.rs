use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn health_reports_catalog_and_missing_keys() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["deepgram"], false);
    assert_eq!(json["openai"], false);
    assert_eq!(json["properties"], 8);
    assert_eq!(json["connections"], 0);
}

#[tokio::test]
async fn search_properties_returns_ranked_recommendations() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/search-properties"))
        .json(&serde_json::json!({
            "transcript": "Cliente: busco casa con 3 recámaras en zona norte, mi presupuesto es de 3 millones"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let json: Value = resp.json().await.unwrap();
    let recs = json["recommendations"].as_array().unwrap();
    assert!(!recs.is_empty());
    assert!(recs.len() <= 5);

    // the catalog's 3-bedroom house in Zona Norte must rank first
    assert_eq!(recs[0]["name"], "Residencial Los Pinos");
    assert_eq!(recs[0]["type"], "Casa");
    assert!(recs[0]["pitch"].as_str().unwrap().contains("Zona Norte"));
}

#[tokio::test]
async fn search_properties_with_empty_transcript_returns_featured() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/search-properties"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let json: Value = resp.json().await.unwrap();
    let recs = json["recommendations"].as_array().unwrap();
    // nothing matched: the first catalog entries stand in as featured
    assert_eq!(recs.len(), 5);
    assert!(recs.iter().all(|r| r["pitch"].as_str().is_some()));
}

#[tokio::test]
async fn search_properties_respects_budget() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/search-properties"))
        .json(&serde_json::json!({
            "transcript": "Cliente: algo económico, máximo 1.5 millones de pesos, 3 recámaras"
        }))
        .send()
        .await
        .unwrap();

    let json: Value = resp.json().await.unwrap();
    let recs = json["recommendations"].as_array().unwrap();
    assert!(!recs.is_empty());
    // the only catalog house under 1.8M with 3 bedrooms
    assert_eq!(recs[0]["name"], "Casa Jardines del Oriente");
}
