use std::sync::Arc;

use keyhole_core::Slug;
use keyhole_proto_schema::v1 as proto;
use keyhole_proto_schema::v1::shortener_server::Shortener;
use keyhole_shortener::{Mediator, RequestError};
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::grpc::auth::{GrpcAuth, GrpcUser};

/// The gRPC front, mirroring the HTTP surface one-for-one.
pub struct ShortenerGrpcServer {
    mediator: Arc<Mediator>,
    auth: GrpcAuth,
}

impl ShortenerGrpcServer {
    pub fn new(mediator: Arc<Mediator>, auth: GrpcAuth) -> Self {
        Self { mediator, auth }
    }

    fn respond<T>(&self, body: T, user: &GrpcUser) -> Response<T> {
        let mut response = Response::new(body);
        self.auth.attach_issued(&mut response, user);
        response
    }
}

/// Maps the request taxonomy onto stable gRPC codes.
fn status_from(err: RequestError) -> Status {
    match err {
        RequestError::InvalidUrl(msg) => Status::invalid_argument(msg),
        RequestError::InvalidAuth => Status::permission_denied("token authentication failed"),
        RequestError::NotFound(msg) => Status::not_found(msg),
        RequestError::Deleted(msg) => Status::not_found(msg),
        // The previously stored short URL rides in the status message.
        RequestError::Conflict { short_url } => Status::already_exists(short_url),
        RequestError::Timeout => Status::deadline_exceeded("request deadline exceeded"),
        RequestError::Internal(msg) => Status::internal(msg),
    }
}

#[tonic::async_trait]
impl Shortener for ShortenerGrpcServer {
    async fn shorten(
        &self,
        request: Request<proto::ShortenRequest>,
    ) -> Result<Response<proto::ShortenResponse>, Status> {
        let user = self.auth.authenticate(&request)?;
        debug!(url = %request.get_ref().url, "grpc shorten request");

        let short_url = self
            .mediator
            .shorten(&request.get_ref().url, &user.user_id)
            .await
            .map_err(status_from)?;
        Ok(self.respond(proto::ShortenResponse { short_url }, &user))
    }

    async fn shorten_batch(
        &self,
        request: Request<proto::ShortenBatchRequest>,
    ) -> Result<Response<proto::ShortenBatchResponse>, Status> {
        let user = self.auth.authenticate(&request)?;
        let entries = &request.get_ref().entries;
        if entries.is_empty() {
            return Err(Status::invalid_argument("empty batch"));
        }

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let short_url = match self
                .mediator
                .shorten(&entry.original_url, &user.user_id)
                .await
            {
                Ok(short_url) => short_url,
                // Per-entry conflict reuse, as on the HTTP surface.
                Err(RequestError::Conflict { short_url }) => short_url,
                Err(err) => return Err(status_from(err)),
            };
            results.push(proto::ShortenBatchResult {
                correlation_id: entry.correlation_id.clone(),
                short_url,
            });
        }
        Ok(self.respond(proto::ShortenBatchResponse { results }, &user))
    }

    async fn resolve(
        &self,
        request: Request<proto::ResolveRequest>,
    ) -> Result<Response<proto::ResolveResponse>, Status> {
        let user = self.auth.authenticate(&request)?;
        let slug = Slug::new(request.get_ref().slug.clone());

        let redirect_to = self.mediator.resolve(&slug).await.map_err(status_from)?;
        Ok(self.respond(proto::ResolveResponse { redirect_to }, &user))
    }

    async fn list_user_urls(
        &self,
        request: Request<proto::ListUserUrlsRequest>,
    ) -> Result<Response<proto::ListUserUrlsResponse>, Status> {
        let user = self.auth.authenticate(&request)?;

        let urls = self
            .mediator
            .urls_for_user(&user.user_id)
            .await
            .map_err(status_from)?;
        if urls.is_empty() {
            return Err(Status::not_found("no content available"));
        }

        let urls = urls
            .into_iter()
            .map(|pair| proto::UserUrlPair {
                original_url: pair.original_url,
                short_url: pair.short_url,
            })
            .collect();
        Ok(self.respond(proto::ListUserUrlsResponse { urls }, &user))
    }

    async fn delete_urls(
        &self,
        request: Request<proto::DeleteUrlsRequest>,
    ) -> Result<Response<proto::DeleteUrlsResponse>, Status> {
        let user = self.auth.authenticate(&request)?;
        let slugs = request
            .get_ref()
            .slugs
            .iter()
            .map(|slug| Slug::from(slug.as_str()))
            .collect::<Vec<_>>();

        self.mediator
            .delete(slugs, &user.user_id)
            .await
            .map_err(status_from)?;
        Ok(self.respond(proto::DeleteUrlsResponse {}, &user))
    }

    async fn ping(
        &self,
        request: Request<proto::PingRequest>,
    ) -> Result<Response<proto::PingResponse>, Status> {
        let user = self.auth.authenticate(&request)?;
        self.mediator.ping().await.map_err(status_from)?;
        Ok(self.respond(proto::PingResponse {}, &user))
    }

    async fn get_stats(
        &self,
        request: Request<proto::GetStatsRequest>,
    ) -> Result<Response<proto::GetStatsResponse>, Status> {
        let user = self.auth.authenticate(&request)?;
        let stats = self.mediator.stats().await.map_err(status_from)?;
        Ok(self.respond(
            proto::GetStatsResponse {
                urls: stats.urls,
                users: stats.users,
            },
            &user,
        ))
    }
}
