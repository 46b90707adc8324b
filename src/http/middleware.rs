//! Player token authentication

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::app::AppState;
use crate::game::Token;

use super::routes::AppError;

/// Player behind the request's bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedPlayer {
    pub token: Token,
}

/// Middleware to require a live player token
pub async fn require_token(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(auth) = auth.ok_or(AppError::InvalidToken)?;
    let token = Token::parse(auth.token()).ok_or(AppError::InvalidToken)?;
    state.game.find_player(token.as_str())?;

    // Insert into request extensions for handlers to access
    request
        .extensions_mut()
        .insert(AuthenticatedPlayer { token });

    Ok(next.run(request).await)
}
