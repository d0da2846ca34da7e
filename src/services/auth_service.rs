use crate::{
    error::{AppError, Result},
    models::{AuthResponse, LoginRequest},
    utils::jwt::JwtKeys,
};

pub const DEMO_EMAIL: &str = "admin@example.com";
pub const DEMO_PASSWORD: &str = "admin123";
pub const DEMO_SUBJECT: &str = "f47ac10b-58cc-4372-a567-0e02b2c3d479";

/// Single hard-coded account. There is no user store behind this.
pub fn validate_credentials(email: &str, password: &str) -> Option<&'static str> {
    (email == DEMO_EMAIL && password == DEMO_PASSWORD).then_some(DEMO_SUBJECT)
}

pub fn login(keys: &JwtKeys, request: &LoginRequest) -> Result<AuthResponse> {
    let subject = validate_credentials(&request.email, &request.password)
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    let token = keys.generate_token(subject, &request.email)?;

    tracing::info!(subject, "Issued access token");

    Ok(AuthResponse { token })
}
