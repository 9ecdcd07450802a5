use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{
    api::state::AppState,
    auth::{Claims, Role},
    domain::Beneficiary,
    error::AppError,
};

#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub claims: Claims,
}

impl CurrentUser {
    /// Wallet routes are only open to roles that earn commissions.
    pub fn beneficiary(&self) -> Result<Beneficiary, AppError> {
        self.claims
            .beneficiary()
            .ok_or_else(|| AppError::Forbidden("Only sellers and delivery partners have wallets".to_string()))
    }
}

fn authenticate(state: &AppState, request: &Request) -> Result<CurrentUser, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = state.tokens.verify(token.trim())?;
    Ok(CurrentUser { claims })
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &request)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &request)?;

    if user.claims.role != Role::Admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
