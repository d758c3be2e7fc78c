//! Router-level tests over an in-memory database.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use arguslm_api_rest::{create_app, AppState};
use arguslm_common::{AppConfig, CredentialVault};
use arguslm_domain::{
    Alert, AlertRule, AlertRuleKind, BenchmarkResult, BenchmarkResultId, BenchmarkRun, Model,
    ProviderAccount, ProviderKind, TriggerSource, UptimeCheck,
};
use arguslm_infrastructure::{
    run_migrations, AlertRepository as _, BenchmarkRepository as _, DatabaseConfig, DatabasePool,
    ModelRepository as _, MonitoringRepository as _, ProviderRepository as _,
};

struct TestApp {
    app: Router,
    state: AppState,
}

async fn test_app() -> TestApp {
    let pool = DatabasePool::new(&DatabaseConfig::in_memory()).await.unwrap();
    run_migrations(pool.pool()).await.unwrap();

    let config = AppConfig {
        database_url: "sqlite::memory:".to_string(),
        database_echo: false,
        encryption_key: CredentialVault::generate_key(),
        secret_key: "test-secret".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        log_level: "warn".to_string(),
    };
    let state = AppState::new(config, pool.pool().clone()).unwrap();
    TestApp {
        app: create_app(state.clone()),
        state,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_provider(app: &Router, kind: &str) -> serde_json::Value {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/v1/providers",
            serde_json::json!({
                "provider_kind": kind,
                "display_name": format!("{kind} account"),
                "credentials": {"api_key": "sk-secret-key", "base_url": "http://localhost:9999"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let test = test_app().await;
        let (status, body) = send(&test.app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}

mod providers {
    use super::*;

    #[tokio::test]
    async fn test_create_never_returns_credentials() {
        let test = test_app().await;
        let body = create_provider(&test.app, "openai").await;

        assert_eq!(body["provider_kind"], "openai");
        assert_eq!(body["display_name"], "openai account");
        assert_eq!(body["enabled"], true);
        // Display fields only; no key material anywhere in the response
        assert_eq!(body["base_url"], "http://localhost:9999");
        assert!(!body.to_string().contains("sk-secret-key"));
        assert!(body.get("credentials").is_none());
        assert!(body.get("api_key").is_none());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let test = test_app().await;
        let (status, _) = send(
            &test.app,
            json_request(
                "POST",
                "/api/v1/providers",
                serde_json::json!({
                    "provider_kind": "sagemaker",
                    "display_name": "bad",
                    "credentials": {}
                }),
            ),
        )
        .await;
        // Enum deserialization failure surfaces as a shape error
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_list_get_patch_delete_cycle() {
        let test = test_app().await;
        let created = create_provider(&test.app, "groq").await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) = send(&test.app, get_request("/api/v1/providers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);

        let (status, body) =
            send(&test.app, get_request(&format!("/api/v1/providers/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());

        let (status, body) = send(
            &test.app,
            json_request(
                "PATCH",
                &format!("/api/v1/providers/{id}"),
                serde_json::json!({"display_name": "renamed", "enabled": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["display_name"], "renamed");
        assert_eq!(body["enabled"], false);

        let (status, _) = send(
            &test.app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/providers/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) =
            send(&test.app, get_request(&format!("/api/v1/providers/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_with_benchmark_history_conflicts() {
        let test = test_app().await;
        let created = create_provider(&test.app, "openai").await;
        let provider_id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

        // Seed one model with one benchmark result behind the API's back
        let model = Model::discovered(provider_id.into(), "gpt-4o", serde_json::json!({}));
        test.state.models.create(&model).await.unwrap();
        let run = BenchmarkRun::new("r", vec![model.id], "reasoning", TriggerSource::User);
        test.state.benchmarks.create_run(&run).await.unwrap();
        let result = BenchmarkResult {
            id: BenchmarkResultId::new(),
            run_id: run.id,
            model_id: model.id,
            ttft_ms: 100.0,
            tps: 10.0,
            tps_excluding_ttft: 12.0,
            total_latency_ms: 900.0,
            input_tokens: 5,
            output_tokens: 9,
            estimated_cost: None,
            error: None,
            created_at: chrono::Utc::now(),
        };
        test.state
            .benchmarks
            .insert_results(run.id, &[result])
            .await
            .unwrap();

        let (status, body) = send(
            &test.app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/providers/{provider_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["detail"].as_str().unwrap().contains("benchmark history"));
    }

    #[tokio::test]
    async fn test_catalog_enumerates_all_kinds() {
        let test = test_app().await;
        let (status, body) = send(&test.app, get_request("/api/v1/providers/catalog")).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 16);
        assert!(entries.iter().any(|e| e["id"] == "custom_openai_compatible"));
        let bedrock = entries.iter().find(|e| e["id"] == "bedrock").unwrap();
        assert_eq!(bedrock["requires_region"], true);
    }

    #[tokio::test]
    async fn test_local_provider_test_requires_base_url() {
        let test = test_app().await;
        let (status, body) = send(
            &test.app,
            json_request(
                "POST",
                "/api/v1/providers/test-connection",
                serde_json::json!({
                    "provider_kind": "ollama",
                    "display_name": "local",
                    "credentials": {}
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("Base URL"));
    }
}

mod models {
    use super::*;

    async fn create_model(app: &Router, provider_id: &str, model_id: &str) -> (StatusCode, serde_json::Value) {
        send(
            app,
            json_request(
                "POST",
                "/api/v1/models",
                serde_json::json!({
                    "provider_account_id": provider_id,
                    "model_id": model_id,
                }),
            ),
        )
        .await
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let test = test_app().await;
        let provider = create_provider(&test.app, "openai").await;
        let provider_id = provider["id"].as_str().unwrap();

        let (status, body) = create_model(&test.app, provider_id, "gpt-4o").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["model_id"], "gpt-4o");
        assert_eq!(body["source"], "manual");
        assert_eq!(body["provider_name"], "openai account");

        let id = body["id"].as_str().unwrap();
        let (status, body) = send(&test.app, get_request(&format!("/api/v1/models/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_id"], "gpt-4o");
    }

    #[tokio::test]
    async fn test_invalid_model_id_rejected() {
        let test = test_app().await;
        let provider = create_provider(&test.app, "openai").await;
        let provider_id = provider["id"].as_str().unwrap();

        for bad in ["has space", "slash/in/it", "llama3:8b", ""] {
            let (status, _) = create_model(&test.app, provider_id, bad).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "model_id {bad:?} must be rejected");
        }
    }

    #[tokio::test]
    async fn test_unknown_provider_is_404() {
        let test = test_app().await;
        let (status, _) = create_model(&test.app, &Uuid::new_v4().to_string(), "gpt-4o").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_patch_clears_custom_name_with_explicit_null() {
        let test = test_app().await;
        let provider = create_provider(&test.app, "openai").await;
        let provider_id = provider["id"].as_str().unwrap();
        let (_, created) = create_model(&test.app, provider_id, "gpt-4o").await;
        let id = created["id"].as_str().unwrap();

        let (status, body) = send(
            &test.app,
            json_request(
                "PATCH",
                &format!("/api/v1/models/{id}"),
                serde_json::json!({"custom_name": "Production"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["custom_name"], "Production");

        // Absent field leaves the name untouched
        let (_, body) = send(
            &test.app,
            json_request(
                "PATCH",
                &format!("/api/v1/models/{id}"),
                serde_json::json!({"enabled_for_monitoring": true}),
            ),
        )
        .await;
        assert_eq!(body["custom_name"], "Production");
        assert_eq!(body["enabled_for_monitoring"], true);

        // Explicit null clears it
        let (_, body) = send(
            &test.app,
            json_request(
                "PATCH",
                &format!("/api/v1/models/{id}"),
                serde_json::json!({"custom_name": null}),
            ),
        )
        .await;
        assert!(body["custom_name"].is_null());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let test = test_app().await;
        let provider = create_provider(&test.app, "openai").await;
        let provider_id = provider["id"].as_str().unwrap();
        create_model(&test.app, provider_id, "gpt-4o").await;
        create_model(&test.app, provider_id, "gpt-4o-mini").await;

        let (status, body) = send(
            &test.app,
            get_request(&format!("/api/v1/models?provider_id={provider_id}&search=mini")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["model_id"], "gpt-4o-mini");
    }
}

mod monitoring {
    use super::*;

    #[tokio::test]
    async fn test_config_lazily_created_with_defaults() {
        let test = test_app().await;
        let (status, body) = send(&test.app, get_request("/api/v1/monitoring/config")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interval_minutes"], 15);
        assert_eq!(body["prompt_pack"], "health_check");
        assert_eq!(body["enabled"], true);
        assert!(body["last_run_at"].is_null());
    }

    #[tokio::test]
    async fn test_patch_validations() {
        let test = test_app().await;

        let (status, _) = send(
            &test.app,
            json_request(
                "PATCH",
                "/api/v1/monitoring/config",
                serde_json::json!({"interval_minutes": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &test.app,
            json_request(
                "PATCH",
                "/api/v1/monitoring/config",
                serde_json::json!({"prompt_pack": "nonexistent"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("prompt_pack"));
    }

    #[tokio::test]
    async fn test_patch_applies_and_reconfigures_scheduler() {
        let test = test_app().await;
        let (status, body) = send(
            &test.app,
            json_request(
                "PATCH",
                "/api/v1/monitoring/config",
                serde_json::json!({"interval_minutes": 5, "prompt_pack": "reasoning", "enabled": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["interval_minutes"], 5);
        assert_eq!(body["prompt_pack"], "reasoning");
        assert!(test.state.scheduler.is_scheduled());

        let (status, _) = send(
            &test.app,
            json_request(
                "PATCH",
                "/api/v1/monitoring/config",
                serde_json::json!({"enabled": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!test.state.scheduler.is_scheduled());
    }

    #[tokio::test]
    async fn test_manual_run_returns_run_id_immediately() {
        let test = test_app().await;
        let (status, body) = send(
            &test.app,
            json_request("POST", "/api/v1/monitoring/run", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        assert!(body["run_id"].as_str().unwrap().parse::<Uuid>().is_ok());
    }

    #[tokio::test]
    async fn test_prompt_packs() {
        let test = test_app().await;
        let (status, body) = send(&test.app, get_request("/api/v1/monitoring/prompt-packs")).await;
        assert_eq!(status, StatusCode::OK);
        let packs = body.as_array().unwrap();
        assert_eq!(packs.len(), 7);
        assert_eq!(packs[0]["id"], "health_check");
        assert!(packs.iter().all(|p| p["expected_tokens"].as_u64().unwrap() > 0));
    }

    #[tokio::test]
    async fn test_uptime_history_and_export_columns() {
        let test = test_app().await;
        let provider = create_provider(&test.app, "openai").await;
        let provider_id: Uuid = provider["id"].as_str().unwrap().parse().unwrap();
        let model = Model::discovered(provider_id.into(), "gpt-4o", serde_json::json!({}));
        test.state.models.create(&model).await.unwrap();

        let checks = vec![
            UptimeCheck::up(model.id, 900.0, 100.0, 30.0, 28),
            UptimeCheck::down(model.id, "connection refused"),
        ];
        test.state.monitoring.insert_checks(&checks).await.unwrap();

        let (status, body) = send(&test.app, get_request("/api/v1/monitoring/uptime")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"][0]["model_name"], "gpt-4o");

        let (status, body) = send(
            &test.app,
            get_request("/api/v1/monitoring/uptime?status=down"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["error"], "connection refused");

        let (status, _) = send(
            &test.app,
            get_request("/api/v1/monitoring/uptime?status=sideways"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // CSV export carries exactly the contract columns
        let response = test
            .app
            .clone()
            .oneshot(get_request("/api/v1/monitoring/uptime/export?format=csv"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("uptime_history.csv"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let header_line = text.lines().next().unwrap();
        assert_eq!(
            header_line,
            "model_name,provider,status,latency_ms,error,timestamp"
        );
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_export_rejects_unknown_format() {
        let test = test_app().await;
        let (status, _) = send(
            &test.app,
            get_request("/api/v1/monitoring/uptime/export?format=xml"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod benchmarks {
    use super::*;

    #[tokio::test]
    async fn test_create_with_unknown_models_is_rejected() {
        let test = test_app().await;
        let missing = Uuid::new_v4();
        let (status, body) = send(
            &test.app,
            json_request(
                "POST",
                "/api/v1/benchmarks",
                serde_json::json!({
                    "model_ids": [missing],
                    "prompt_pack": "reasoning",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains(&missing.to_string()));
    }

    #[tokio::test]
    async fn test_create_accepts_and_returns_202() {
        let test = test_app().await;
        let provider = create_provider(&test.app, "openai").await;
        let provider_id: Uuid = provider["id"].as_str().unwrap().parse().unwrap();
        let model = Model::discovered(provider_id.into(), "gpt-4o", serde_json::json!({}));
        test.state.models.create(&model).await.unwrap();

        let (status, body) = send(
            &test.app,
            json_request(
                "POST",
                "/api/v1/benchmarks",
                serde_json::json!({
                    "name": "smoke",
                    "model_ids": [model.id],
                    "prompt_pack": "reasoning",
                    "num_runs": 1,
                    "warmup_runs": 0,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");
        let run_id = body["id"].as_str().unwrap().to_string();

        // The run record exists immediately
        let (status, body) =
            send(&test.app, get_request(&format!("/api/v1/benchmarks/{run_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "smoke");
    }

    #[tokio::test]
    async fn test_unknown_run_is_404() {
        let test = test_app().await;
        let (status, _) = send(
            &test.app,
            get_request(&format!("/api/v1/benchmarks/{}", Uuid::new_v4())),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    async fn seed_completed_run(test: &TestApp) -> (BenchmarkRun, Model) {
        let provider = ProviderAccount::new(ProviderKind::Openai, "acct", "blob".to_string());
        test.state.providers.create(&provider).await.unwrap();
        let mut model = Model::discovered(provider.id, "gpt-4o", serde_json::json!({}));
        model.custom_name = Some("Prod GPT".to_string());
        test.state.models.create(&model).await.unwrap();

        let run = BenchmarkRun::new("done", vec![model.id], "reasoning", TriggerSource::User);
        test.state.benchmarks.create_run(&run).await.unwrap();
        let results: Vec<BenchmarkResult> = [100.0, 150.0, 200.0]
            .iter()
            .map(|ttft| BenchmarkResult {
                id: BenchmarkResultId::new(),
                run_id: run.id,
                model_id: model.id,
                ttft_ms: *ttft,
                tps: 42.0,
                tps_excluding_ttft: 55.0,
                total_latency_ms: ttft + 400.0,
                input_tokens: 10,
                output_tokens: 20,
                estimated_cost: Some(0.001),
                error: None,
                created_at: chrono::Utc::now(),
            })
            .collect();
        test.state
            .benchmarks
            .insert_results(run.id, &results)
            .await
            .unwrap();
        test.state
            .benchmarks
            .update_run_status(run.id, arguslm_domain::RunStatus::Completed, Some(chrono::Utc::now()))
            .await
            .unwrap();
        (run, model)
    }

    #[tokio::test]
    async fn test_detail_includes_percentile_statistics() {
        let test = test_app().await;
        let (run, _model) = seed_completed_run(&test).await;

        let (status, body) =
            send(&test.app, get_request(&format!("/api/v1/benchmarks/{}", run.id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result_count"], 3);
        assert_eq!(body["results"][0]["model_name"], "Prod GPT");

        let stats = &body["statistics"];
        assert_eq!(stats["ttft_p50"], 150.0);
        assert!((stats["ttft_p95"].as_f64().unwrap() - 190.0).abs() < 1e-9);
        assert!((stats["ttft_p99"].as_f64().unwrap() - 198.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_results_and_export() {
        let test = test_app().await;
        let (run, _model) = seed_completed_run(&test).await;

        let (status, body) = send(
            &test.app,
            get_request(&format!("/api/v1/benchmarks/{}/results", run.id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);

        let response = test
            .app
            .clone()
            .oneshot(get_request(&format!(
                "/api/v1/benchmarks/{}/export?format=csv",
                run.id
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "model_name,provider,ttft_ms,tps,tps_excluding_ttft,total_latency_ms,input_tokens,output_tokens,error,timestamp"
        );
        assert!(text.contains("Prod GPT,openai,100"));

        // JSON export round-trips through the schema
        let response = test
            .app
            .clone()
            .oneshot(get_request(&format!(
                "/api/v1/benchmarks/{}/export?format=json",
                run.id
            )))
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let export: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(export["run_name"], "done");
        assert_eq!(export["results"].as_array().unwrap().len(), 3);
        assert_eq!(export["results"][0]["provider"], "openai");
    }

    #[tokio::test]
    async fn test_list_with_status_filter() {
        let test = test_app().await;
        seed_completed_run(&test).await;

        let (status, body) = send(&test.app, get_request("/api/v1/benchmarks?status=completed")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);

        let (status, body) = send(&test.app, get_request("/api/v1/benchmarks?status=running")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }
}

mod alerts {
    use super::*;

    #[tokio::test]
    async fn test_rule_cross_field_validation() {
        let test = test_app().await;

        let (status, body) = send(
            &test.app,
            json_request(
                "POST",
                "/api/v1/alerts/rules",
                serde_json::json!({"name": "watch", "rule_kind": "specific_model_down"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("target_model_id"));

        let (status, _) = send(
            &test.app,
            json_request(
                "POST",
                "/api/v1/alerts/rules",
                serde_json::json!({"name": "everywhere", "rule_kind": "model_unavailable_everywhere"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &test.app,
            json_request(
                "POST",
                "/api/v1/alerts/rules",
                serde_json::json!({"name": "any", "rule_kind": "any_model_down"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["enabled"], true);
        assert_eq!(body["notify_in_app"], true);
    }

    #[tokio::test]
    async fn test_rule_update_and_delete() {
        let test = test_app().await;
        let (_, rule) = send(
            &test.app,
            json_request(
                "POST",
                "/api/v1/alerts/rules",
                serde_json::json!({"name": "any", "rule_kind": "any_model_down"}),
            ),
        )
        .await;
        let id = rule["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &test.app,
            json_request(
                "PATCH",
                &format!("/api/v1/alerts/rules/{id}"),
                serde_json::json!({"enabled": false, "name": "renamed"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);
        assert_eq!(body["name"], "renamed");

        let (status, _) = send(
            &test.app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/alerts/rules/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            &test.app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/alerts/rules/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let test = test_app().await;
        let rule = AlertRule::new("any", AlertRuleKind::AnyModelDown);
        test.state.alerts.create_rule(&rule).await.unwrap();
        let alert = Alert::new(rule.id, None, "Model is down: timeout");
        test.state.alerts.insert_alerts(&[alert.clone()]).await.unwrap();

        let (status, body) = send(&test.app, get_request("/api/v1/alerts/unread-count")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let uri = format!("/api/v1/alerts/{}/acknowledge", alert.id);
        let (status, body) =
            send(&test.app, json_request("PATCH", &uri, serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["acknowledged"], true);
        let message = body["message"].clone();

        // Second acknowledge changes nothing
        let (status, body) =
            send(&test.app, json_request("PATCH", &uri, serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["acknowledged"], true);
        assert_eq!(body["message"], message);

        let (_, body) = send(&test.app, get_request("/api/v1/alerts/unread-count")).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_list_and_recent() {
        let test = test_app().await;
        let rule = AlertRule::new("any", AlertRuleKind::AnyModelDown);
        test.state.alerts.create_rule(&rule).await.unwrap();
        let a = Alert::new(rule.id, None, "first");
        let b = Alert::new(rule.id, None, "second");
        test.state.alerts.insert_alerts(&[a.clone(), b]).await.unwrap();
        test.state.alerts.acknowledge(a.id).await.unwrap();

        let (status, body) = send(&test.app, get_request("/api/v1/alerts?acknowledged=false")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["unacknowledged_count"], 1);

        let (status, body) = send(&test.app, get_request("/api/v1/alerts/recent?limit=10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["total_unread"], 1);
    }
}
