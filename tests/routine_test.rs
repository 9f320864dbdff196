mod common;

use common::{date, entity, monthly_rows, row, FakeApi, FakeNarrative};
use piezo_monitor::api::wire::DailySeries;
use piezo_monitor::error::AppError;
use piezo_monitor::model::{fields, Category, DateRange, Granularity, Variant};
use piezo_monitor::routine::{EntityRoutine, GroundwaterRoutine, RoutineRequest, WaterQualityRoutine};
use piezo_monitor::stats::summarize;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn request(id: i64, range: DateRange, granularity: Granularity) -> RoutineRequest {
    RoutineRequest {
        id,
        label: format!("{} - Poço {}", id, id),
        range,
        granularity,
        parameters: Vec::new(),
        catalog: Arc::new(vec![entity(id, "Poço", Category::DepthPiezometer)]),
    }
}

fn first_quarter() -> DateRange {
    DateRange::new(date(2024, 1, 15), date(2024, 3, 10)).unwrap()
}

fn groundwater(api: &Arc<FakeApi>, narrative: &Arc<FakeNarrative>) -> GroundwaterRoutine {
    GroundwaterRoutine::new(api.clone(), narrative.clone())
}

#[tokio::test]
async fn test_monthly_readings_sorted_without_duplicates() {
    let rows = vec![
        row(json!({ "mes_ano": "03/2024", "nivel_estatico": 5.0 })),
        row(json!({ "mes_ano": "1/2024", "nivel_estatico": 5.1, "precipitacao": "12,5" })),
        row(json!({ "mes_ano": "02/2024", "nivel_estatico": 5.3 })),
        row(json!({ "mes_ano": "02/2024", "vazao_calha": 0.8 })),
        row(json!({ "nivel_estatico": 9.9 })),
    ];
    let api = Arc::new(FakeApi::new().with_monthly(101, rows));
    let narrative = Arc::new(FakeNarrative::new());

    let result = groundwater(&api, &narrative)
        .run(&request(101, first_quarter(), Granularity::Monthly))
        .await
        .unwrap();

    let periods: Vec<&str> = result.readings.iter().map(|r| r.period.as_str()).collect();
    assert_eq!(periods, vec!["2024-01", "2024-02", "2024-03"]);
    assert_eq!(result.readings[0].get(fields::PRECIPITATION), Some(12.5));
    assert_eq!(result.readings[1].get(fields::STATIC_LEVEL), Some(5.3));
    assert_eq!(result.readings[1].get(fields::CHANNEL_FLOW), Some(0.8));

    assert_eq!(result.summary.count, 3);
    assert_eq!(result.summary.mean(fields::STATIC_LEVEL), 5.1);
    assert_eq!(result.summary, summarize(&result.readings));
    assert_eq!(result.category, Some(Category::DepthPiezometer));
    assert_eq!(result.label, "101 - Poço 101");
    assert!(result.raw.is_none());

    assert_eq!(
        result.narrative.current(),
        Some("Static level stable over the period.")
    );
    assert_eq!(result.narrative.original(), result.narrative.current());
}

#[tokio::test]
async fn test_monthly_calls_use_month_format_and_month_bounds() {
    let api = Arc::new(FakeApi::new().with_monthly(
        101,
        vec![
            row(json!({ "mes_ano": "02/2024", "nivel_estatico": 5.3, "situacao": "seco" })),
            row(json!({ "mes_ano": "01/2024", "nivel_estatico": 5.1 })),
        ],
    ));
    let narrative = Arc::new(FakeNarrative::new());

    groundwater(&api, &narrative)
        .run(&request(101, first_quarter(), Granularity::Monthly))
        .await
        .unwrap();

    assert_eq!(
        api.calls(),
        vec![
            "monthly:101:01/2024-03/2024".to_string(),
            "photos:101:2024-01-01:2024-03-31".to_string(),
        ]
    );

    let requests = narrative.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (variant, body) = &requests[0];
    assert_eq!(*variant, Variant::Groundwater);
    assert_eq!(body.entity_id, 101);
    assert_eq!(
        body.data,
        json!([
            { "mes_ano": "01/2024", "nivel_estatico": 5.1 },
            { "mes_ano": "02/2024", "nivel_estatico": 5.3, "situacao": "seco" }
        ])
    );
    assert_eq!(body.history[0]["mes_ano"], "10/2008");
}

#[tokio::test]
async fn test_daily_series_merged_by_day_with_elevations() {
    let series: DailySeries = serde_json::from_value(json!({
        "precipitacao": [
            { "data": "02/01/2024", "precipitacao": 3.5 },
            { "data": "01/01/2024", "precipitacao": 0.0 }
        ],
        "nivel_estatico": [
            { "data": "01/01/2024", "nivel_estatico": 5.2 }
        ],
        "vazao_bombeamento": null,
        "cota_superficie": 812.4,
        "cota_base": 790.0
    }))
    .unwrap();
    let api = Arc::new(FakeApi::new().with_daily(101, series));
    let narrative = Arc::new(FakeNarrative::new());
    let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 2)).unwrap();

    let result = groundwater(&api, &narrative)
        .run(&request(101, range, Granularity::Daily))
        .await
        .unwrap();

    let periods: Vec<&str> = result.readings.iter().map(|r| r.period.as_str()).collect();
    assert_eq!(periods, vec!["2024-01-01", "2024-01-02"]);
    assert_eq!(result.readings[0].get(fields::STATIC_LEVEL), Some(5.2));
    assert_eq!(result.readings[1].get(fields::STATIC_LEVEL), None);
    for reading in &result.readings {
        assert_eq!(reading.get(fields::SURFACE_ELEVATION), Some(812.4));
        assert_eq!(reading.get(fields::BASE_ELEVATION), Some(790.0));
    }

    assert_eq!(
        api.calls(),
        vec![
            "daily:101:01/01/2024-02/01/2024".to_string(),
            "photos:101:2024-01-01:2024-01-02".to_string(),
        ]
    );
    assert_eq!(narrative.calls(), 1);
}

#[tokio::test]
async fn test_daily_without_data_skips_narrative() {
    let api = Arc::new(FakeApi::new().with_daily(101, DailySeries::default()));
    let narrative = Arc::new(FakeNarrative::new());
    let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();

    let result = groundwater(&api, &narrative)
        .run(&request(101, range, Granularity::Daily))
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(narrative.calls(), 0);
    assert_eq!(result.narrative.current(), None);
    assert_eq!(result.summary.count, 0);
    assert_eq!(result.summary.mean(fields::STATIC_LEVEL), 0.0);
    assert_eq!(result.photos.as_ref().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_monthly_without_data_skips_narrative() {
    let api = Arc::new(FakeApi::new());
    let narrative = Arc::new(FakeNarrative::new());

    let result = groundwater(&api, &narrative)
        .run(&request(102, first_quarter(), Granularity::Monthly))
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(narrative.calls(), 0);
    assert_eq!(result.summary.count, 0);
}

#[tokio::test]
async fn test_narrative_failure_degrades_to_none() {
    let api = Arc::new(FakeApi::new().with_monthly(101, monthly_rows(&[("01/2024", 5.1)])));
    let narrative = Arc::new(FakeNarrative::failing());

    let result = groundwater(&api, &narrative)
        .run(&request(101, first_quarter(), Granularity::Monthly))
        .await
        .unwrap();

    assert_eq!(narrative.calls(), 1);
    assert_eq!(result.narrative.current(), None);
    assert_eq!(result.readings.len(), 1);
    assert!(result.photos.is_some());
}

#[tokio::test]
async fn test_photo_failure_yields_empty_list() {
    let api = Arc::new(FakeApi::new().with_monthly(101, monthly_rows(&[("01/2024", 5.1)])));
    api.photos_fail.store(true, Ordering::SeqCst);
    let narrative = Arc::new(FakeNarrative::new());

    let result = groundwater(&api, &narrative)
        .run(&request(101, first_quarter(), Granularity::Monthly))
        .await
        .unwrap();

    assert_eq!(result.photos, Some(Vec::new()));
    assert!(result.narrative.current().is_some());
}

#[tokio::test]
async fn test_primary_fetch_failure_is_fatal() {
    let api = Arc::new(FakeApi::new().failing_for(101));
    let narrative = Arc::new(FakeNarrative::new());

    let err = groundwater(&api, &narrative)
        .run(&request(101, first_quarter(), Granularity::Monthly))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Api { status: 500, .. }));
    assert_eq!(narrative.calls(), 0);
    assert_eq!(api.count("photos:"), 0);
}

fn collection() -> serde_json::Value {
    json!({
        "amostras": [
            {
                "dataColeta": "2024-02-10T09:30:00",
                "ph": 7.2,
                "parametros": [
                    { "parametro": "turbidez", "valor": "1,5" },
                    { "nome": "cor", "valor": 12 }
                ]
            },
            { "dataColeta": "2024-01-05", "ph": "6.8" }
        ],
        "legislacoes": [{ "parametro": "ph", "minimo": 6.0, "maximo": 9.5 }]
    })
}

#[tokio::test]
async fn test_water_quality_samples_and_narrative() {
    let api = Arc::new(FakeApi::new().with_collection(7, collection()));
    let narrative = Arc::new(FakeNarrative::new());
    let routine = WaterQualityRoutine::new(api.clone(), narrative.clone());

    let mut req = request(7, first_quarter(), Granularity::Daily);
    req.parameters = vec!["ph".to_string(), "turbidez".to_string()];
    let result = routine.run(&req).await.unwrap();

    let periods: Vec<&str> = result.readings.iter().map(|r| r.period.as_str()).collect();
    assert_eq!(periods, vec!["2024-01-05", "2024-02-10"]);
    assert_eq!(result.readings[0].get("ph"), Some(6.8));
    assert_eq!(result.readings[1].get("turbidez"), Some(1.5));
    assert_eq!(result.readings[1].get("cor"), Some(12.0));
    assert_eq!(result.summary.mean("ph"), 7.0);

    assert!(result.photos.is_none());
    assert_eq!(result.raw, Some(collection()));
    assert_eq!(
        api.calls(),
        vec![
            "collection:7:01/2024-03/2024:ph,turbidez".to_string(),
            "history:7".to_string(),
        ]
    );

    let requests = narrative.requests.lock().unwrap();
    let (variant, body) = &requests[0];
    assert_eq!(*variant, Variant::WaterQuality);
    assert_eq!(body.parameters, vec!["ph".to_string(), "turbidez".to_string()]);
    assert_eq!(body.data, collection());
}

#[tokio::test]
async fn test_water_quality_without_samples_skips_history_and_narrative() {
    let api = Arc::new(FakeApi::new());
    let narrative = Arc::new(FakeNarrative::new());
    let routine = WaterQualityRoutine::new(api.clone(), narrative.clone());

    let result = routine
        .run(&request(7, first_quarter(), Granularity::Monthly))
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(api.count("history:"), 0);
    assert_eq!(narrative.calls(), 0);
}

#[tokio::test]
async fn test_water_quality_history_failure_drops_narrative() {
    let api = Arc::new(FakeApi::new().with_collection(7, collection()));
    api.history_fails.store(true, Ordering::SeqCst);
    let narrative = Arc::new(FakeNarrative::new());
    let routine = WaterQualityRoutine::new(api.clone(), narrative.clone());

    let result = routine
        .run(&request(7, first_quarter(), Granularity::Monthly))
        .await
        .unwrap();

    assert_eq!(result.readings.len(), 2);
    assert_eq!(result.narrative.current(), None);
    assert_eq!(narrative.calls(), 0);
}
