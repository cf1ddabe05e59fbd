use crate::error::AppError;

/// Caller identity as asserted by the upstream gateway. Authentication and
/// role issuance live in the external identity service; this subsystem only
/// trusts the forwarded headers.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub id: i64,
    pub moderator: bool,
}

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

fn parse_identity(headers: &axum::http::HeaderMap) -> Result<Identity, AppError> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?
        .parse::<i64>()
        .map_err(|_| AppError::Validation("invalid user id header".into()))?;

    let moderator = headers
        .get(USER_ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|roles| roles.split(',').any(|r| r.trim() == "moderator"))
        .unwrap_or(false);

    Ok(Identity { id, moderator })
}

/// Middleware that resolves the caller identity and stores it in request
/// extensions for the guard extractors.
pub async fn auth_middleware(
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, AppError> {
    // Introspection endpoints stay public for healthchecks
    let path = req.uri().path();
    if matches!(path, "/health" | "/openapi.json") {
        return Ok(next.run(req).await);
    }

    let identity = parse_identity(req.headers())?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn identity_requires_user_id_header() {
        let headers = HeaderMap::new();
        assert!(matches!(
            parse_identity(&headers),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn moderator_role_is_detected_in_role_list() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "42".parse().unwrap());
        headers.insert(USER_ROLES_HEADER, "developer, moderator".parse().unwrap());
        let identity = parse_identity(&headers).unwrap();
        assert_eq!(identity.id, 42);
        assert!(identity.moderator);
    }

    #[test]
    fn non_moderator_roles_do_not_grant_capability() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, "7".parse().unwrap());
        headers.insert(USER_ROLES_HEADER, "project-owner".parse().unwrap());
        assert!(!parse_identity(&headers).unwrap().moderator);
    }
}
