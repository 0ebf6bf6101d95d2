/**
 * Account Routes
 *
 * Route descriptors for the account service layer. Password reset requires
 * an authenticated caller; impersonation requires staff. Email verification
 * is the one redirect-configured route: its success payload carries the
 * target under `redirect_url`.
 */

use axum::http::Method;

use crate::routing::RouteSpec;

use super::service::AccountService;

/// Route descriptors for every account endpoint.
pub fn account_routes(service: AccountService) -> Vec<RouteSpec> {
    let signup = service.clone();
    let login = service.clone();
    let reset = service.clone();
    let forgot = service.clone();
    let verify = service.clone();
    let delete = service.clone();
    let hijack = service;

    vec![
        RouteSpec::service("/signup", vec![Method::POST], move |request| {
            let service = signup.clone();
            async move { service.signup(request).await }
        }),
        RouteSpec::service("/login", vec![Method::POST], move |request| {
            let service = login.clone();
            async move { service.login(request).await }
        }),
        RouteSpec::service("/reset-password", vec![Method::POST], move |request| {
            let service = reset.clone();
            async move { service.reset_password(request).await }
        })
        .auth("authenticated"),
        RouteSpec::service("/forgot-password", vec![Method::GET], move |request| {
            let service = forgot.clone();
            async move { service.forgot_password(request).await }
        }),
        RouteSpec::service("/verify-email", vec![Method::GET], move |request| {
            let service = verify.clone();
            async move { service.verify_email(request).await }
        })
        .redirect("redirect_url"),
        RouteSpec::service("/delete-user", vec![Method::POST], move |request| {
            let service = delete.clone();
            async move { service.delete_user(request).await }
        }),
        RouteSpec::service("/hijack-user", vec![Method::GET], move |request| {
            let service = hijack.clone();
            async move { service.hijack_user(request).await }
        })
        .auth("staff"),
    ]
}
