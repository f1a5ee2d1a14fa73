use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::arbitrage::ArbitrageEngine;
use crate::connectors::QuoteService;
use crate::enrichment::EnrichmentService;
use crate::filters::{apply_filters, FilteredOpportunity};
use crate::fx::FxRateService;
use crate::models::{
    Exchange, FilterSettings, OpportunityType, PremiumOpportunity, Quote,
};
use crate::premium::{calculate_multi_exchange_premiums, PremiumQuery};

/// Shared application state, built once in the composition root.
#[derive(Clone)]
pub struct AppState {
    pub quotes: Arc<QuoteService>,
    pub fx: Arc<FxRateService>,
    pub arbitrage: Arc<ArbitrageEngine>,
    pub enrichment: Arc<EnrichmentService>,
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/opportunities", get(get_opportunities))
        .route("/api/premiums", get(get_premiums))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Same-currency cross-exchange gaps, enriched and filtered.
async fn get_opportunities(
    State(state): State<AppState>,
    Query(params): Query<OpportunityQuery>,
) -> Result<Json<OpportunitiesResponse>, ApiError> {
    let settings = params.filter_settings()?;
    let min_gap_pct = params.min_gap_pct.unwrap_or(0.1);
    let limit = params.limit.unwrap_or(50).min(500);

    let by_exchange = state
        .quotes
        .quotes_by_exchange()
        .await
        .map_err(ApiError::AllSourcesFailed)?;
    let all_quotes: Vec<Quote> = by_exchange.into_values().flatten().collect();

    // FX is only needed here to express KRW prices and volumes in USD; the
    // scan itself never crosses currency families. Missing FX degrades the
    // normalization, it does not fail the request.
    let fx = state.fx.current().await.ok();

    let mut opportunities =
        state
            .arbitrage
            .calculate(&all_quotes, min_gap_pct, limit, fx.as_ref());
    state.enrichment.enrich(&mut opportunities);

    let quotes_by_leg: HashMap<(Exchange, String), Quote> = all_quotes
        .into_iter()
        .map(|q| ((q.exchange, q.market.clone()), q))
        .collect();
    let outcome = apply_filters(opportunities, &settings, &quotes_by_leg, Utc::now());

    Ok(Json(OpportunitiesResponse {
        count: outcome.data.len(),
        total: outcome.total,
        filtered_out: outcome.filtered_out,
        data: outcome.data,
        applied_filters: settings,
    }))
}

/// Cross-currency premiums over every requested exchange pair.
async fn get_premiums(
    State(state): State<AppState>,
    Query(params): Query<PremiumsQuery>,
) -> Result<Json<PremiumsResponse>, ApiError> {
    let krw_allow = parse_exchange_list(params.krw_exchanges.as_deref(), true)?;
    let global_allow = parse_exchange_list(params.global_exchanges.as_deref(), false)?;

    let by_exchange = state
        .quotes
        .quotes_by_exchange()
        .await
        .map_err(ApiError::AllSourcesFailed)?;
    let fx = state.fx.current().await.map_err(ApiError::FxUnavailable)?;

    let mut krw_by_exchange = HashMap::new();
    let mut global_by_exchange = HashMap::new();
    for (exchange, quotes) in by_exchange {
        if exchange.is_krw() && krw_allow.contains(&exchange) {
            krw_by_exchange.insert(exchange, quotes);
        } else if !exchange.is_krw() && global_allow.contains(&exchange) {
            global_by_exchange.insert(exchange, quotes);
        }
    }

    let query = PremiumQuery {
        include_negative: params.include_negative.unwrap_or(true),
        limit: params.limit.unwrap_or(50).min(500),
        offset: params.offset.unwrap_or(0),
        symbol: params.symbol.clone(),
    };
    let data =
        calculate_multi_exchange_premiums(&krw_by_exchange, &global_by_exchange, &fx, &query);

    Ok(Json(PremiumsResponse {
        count: data.len(),
        limit: query.limit,
        offset: query.offset,
        fx_rate: fx.mid,
        fx_rate_bid: fx.bid,
        fx_rate_ask: fx.ask,
        fx_source: fx.source.clone(),
        fx_rate_timestamp: fx.timestamp,
        fx_stale: fx.stale,
        data,
    }))
}

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpportunityQuery {
    min_gap_pct: Option<f64>,
    limit: Option<usize>,
    min_volume_usd_24h: Option<f64>,
    exclude_if_volume_missing: Option<bool>,
    min_price_usd: Option<f64>,
    max_gap_pct: Option<f64>,
    max_spread_pct: Option<f64>,
    max_quote_age_seconds: Option<i64>,
    require_common_open_network: Option<bool>,
    require_deposit_address: Option<bool>,
    /// Comma-separated `OpportunityType` names.
    allowed_types: Option<String>,
    /// Comma-separated exchange names.
    exclude_exchanges: Option<String>,
    debug_mode: Option<bool>,
}

impl OpportunityQuery {
    fn filter_settings(&self) -> Result<FilterSettings, ApiError> {
        let defaults = FilterSettings::default();

        let allowed_types = self
            .allowed_types
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| {
                        OpportunityType::parse(s).ok_or_else(|| {
                            ApiError::BadRequest(format!("unknown strategy type: {:?}", s.trim()))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let exclude_exchanges = self
            .exclude_exchanges
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| {
                        Exchange::parse(s).ok_or_else(|| {
                            ApiError::BadRequest(format!("unknown exchange: {:?}", s.trim()))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(FilterSettings {
            min_volume_usd_24h: self.min_volume_usd_24h.unwrap_or(defaults.min_volume_usd_24h),
            exclude_if_volume_missing: self
                .exclude_if_volume_missing
                .unwrap_or(defaults.exclude_if_volume_missing),
            min_price_usd: self.min_price_usd.unwrap_or(defaults.min_price_usd),
            max_gap_pct: self.max_gap_pct.unwrap_or(defaults.max_gap_pct),
            max_spread_pct: self.max_spread_pct.unwrap_or(defaults.max_spread_pct),
            max_quote_age_seconds: self
                .max_quote_age_seconds
                .unwrap_or(defaults.max_quote_age_seconds),
            require_common_open_network: self
                .require_common_open_network
                .unwrap_or(defaults.require_common_open_network),
            require_deposit_address: self
                .require_deposit_address
                .unwrap_or(defaults.require_deposit_address),
            // One knob drives both the scan threshold and the filter floor.
            min_gap_pct: self.min_gap_pct.unwrap_or(defaults.min_gap_pct),
            allowed_types,
            exclude_exchanges,
            debug_mode: self.debug_mode.unwrap_or(defaults.debug_mode),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumsQuery {
    krw_exchanges: Option<String>,
    global_exchanges: Option<String>,
    include_negative: Option<bool>,
    limit: Option<usize>,
    offset: Option<usize>,
    symbol: Option<String>,
}

fn parse_exchange_list(raw: Option<&str>, krw: bool) -> Result<Vec<Exchange>, ApiError> {
    let Some(raw) = raw else {
        let all = if krw {
            crate::models::KRW_EXCHANGES
        } else {
            crate::models::GLOBAL_EXCHANGES
        };
        return Ok(all.to_vec());
    };

    let mut exchanges = Vec::new();
    for part in raw.split(',').filter(|s| !s.trim().is_empty()) {
        let exchange = Exchange::parse(part)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown exchange: {:?}", part.trim())))?;
        if exchange.is_krw() != krw {
            return Err(ApiError::BadRequest(format!(
                "{} is not a {} exchange",
                exchange,
                if krw { "KRW" } else { "global" }
            )));
        }
        exchanges.push(exchange);
    }
    Ok(exchanges)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OpportunitiesResponse {
    count: usize,
    total: usize,
    filtered_out: usize,
    data: Vec<FilteredOpportunity>,
    applied_filters: FilterSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PremiumsResponse {
    count: usize,
    limit: usize,
    offset: usize,
    fx_rate: f64,
    fx_rate_bid: f64,
    fx_rate_ask: f64,
    fx_source: String,
    fx_rate_timestamp: DateTime<Utc>,
    fx_stale: bool,
    data: Vec<PremiumOpportunity>,
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    /// Every quote source failed; there is nothing to compute over.
    AllSourcesFailed(anyhow::Error),
    /// No fresh or fallback FX rate; premiums cannot be computed.
    FxUnavailable(anyhow::Error),
    BadRequest(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::AllSourcesFailed(_) => "ALL_SOURCES_FAILED",
            ApiError::FxUnavailable(_) => "FX_UNAVAILABLE",
            ApiError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::AllSourcesFailed(e) | ApiError::FxUnavailable(e) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };
        let body = Json(json!({
            "code": self.code(),
            "message": message,
        }));
        (status, body).into_response()
    }
}
