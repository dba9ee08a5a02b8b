use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{Method, StatusCode};
use juniper::http::{GraphQLBatchRequest, graphiql::graphiql_source};
use std::{sync::Arc, time::Instant};

use crate::{api, auth::AuthContext, db, prelude::*};
use super::{Context, Request, Response, response};


/// This is the main HTTP entry point, called for each incoming request.
pub(super) async fn handle(req: Request, ctx: Arc<Context>) -> Response {
    trace!(
        "Incoming HTTP {:?} request to '{}{}'",
        req.method(),
        req.uri().path(),
        req.uri().query().map(|q| format!("?{}", q)).unwrap_or_default(),
    );
    if ctx.config.log.log_http_headers {
        for (name, value) in req.headers() {
            trace!("  {name}: {}", String::from_utf8_lossy(value.as_bytes()));
        }
    }

    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/');

    match path {
        // The GraphQL endpoint. This is the only path for which POST is
        // allowed.
        "/graphql" if method == Method::POST => handle_api(req, &ctx).await,

        // The interactive GraphQL API explorer/IDE. It does not expose anything
        // the API itself doesn't, so it's fine to keep it in production.
        "/~graphiql" if method == Method::GET || method == Method::HEAD => {
            response::with_body(
                StatusCode::OK,
                "text/html; charset=UTF-8",
                graphiql_source("/graphql", None),
            )
        }

        "/graphql" | "/~graphiql" => response::method_not_allowed(),

        _ => {
            debug!("Responding with 404 to {:?} '{}'", method, path);
            response::not_found()
        }
    }
}

/// Handles a request to `/graphql`.
async fn handle_api(req: Request, ctx: &Context) -> Response {
    let before = Instant::now();
    let auth = AuthContext::from_headers(req.headers(), &ctx.config.auth);
    trace!("Auth: {:?}", auth);

    // Read and parse the body. Both single and batched requests are accepted.
    let body = match Limited::new(req.into_body(), ctx.config.http.max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return response::payload_too_large();
        }
        Err(e) => {
            warn!("Failed to read body of API request: {e}");
            return response::bad_request("Failed to read request body");
        }
    };
    let request = match serde_json::from_slice::<GraphQLBatchRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Received invalid GraphQL request: {e}");
            return response::bad_request(format!("Invalid GraphQL request: {e}"));
        }
    };

    let mut connection = match db::get_conn_or_service_unavailable(&ctx.db_pool).await {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    let result = api::execute(
        &request,
        &ctx.api_root,
        &mut connection,
        auth,
        Arc::clone(&ctx.config),
    ).await;

    match result {
        Ok(out) => {
            info!(
                "Finished API request in {:.2?} (with {} SQL queries)",
                before.elapsed(),
                out.num_queries,
            );

            let status = if out.is_ok { StatusCode::OK } else { StatusCode::BAD_REQUEST };
            response::with_body(status, "application/json", out.body)
        }
        Err(e) => {
            error!("Failed to execute API request: {e:?}");
            response::service_unavailable()
        }
    }
}
