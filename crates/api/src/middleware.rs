use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use coachgate_auth::{AccessDecision, AccessPipeline, RequestMeta, RoutePolicy};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Per-route-group state: the shared pipeline plus the group's policy.
#[derive(Clone)]
pub struct AccessState {
    pub pipeline: Arc<AccessPipeline>,
    pub policy: Arc<RoutePolicy>,
}

impl AccessState {
    pub fn new(pipeline: Arc<AccessPipeline>, policy: RoutePolicy) -> Self {
        Self {
            pipeline,
            policy: Arc::new(policy),
        }
    }
}

pub async fn access_middleware(
    State(state): State<AccessState>,
    mut req: Request,
    next: Next,
) -> Response {
    // A header that is not valid UTF-8 is treated as absent.
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let meta = RequestMeta::new(req.method().as_str(), req.uri().path());

    match state
        .pipeline
        .evaluate(authorization.as_deref(), &meta, &state.policy)
        .await
    {
        AccessDecision::Allowed(principal) => {
            req.extensions_mut().insert(PrincipalContext::new(principal));
            next.run(req).await
        }
        AccessDecision::Denied { denial, .. } => errors::denial_to_response(&denial),
    }
}
