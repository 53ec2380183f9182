use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tonic::{Request, Response, Status};

use crate::error::DispatchError;
use crate::models::notification::Notification as DomainNotification;
use crate::models::request::{DispatchSnapshot as DomainSnapshot, RequestId};
use crate::models::settings::DispatchSettings;
use crate::state::AppState;

pub mod pb {
    tonic::include_proto!("dispatch");
}

use pb::coordinate_dispatch_server::CoordinateDispatch;
use pb::{
    ActivateRequest, ActivateResponse, CancelAllRequest, CancelAllResponse, CancelRequest,
    CancelResponse, DeactivateRequest, DeactivateResponse, DispatchRequest, DispatchSnapshot,
    GetCurrentRequest, GetCurrentResponse, Notification, Settings, WatchNotificationsRequest,
};

pub struct GrpcDispatchService {
    state: Arc<AppState>,
}

impl GrpcDispatchService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

fn snapshot_to_proto(s: &DomainSnapshot) -> DispatchSnapshot {
    DispatchSnapshot {
        id: s.id.to_string(),
        latitude: s.coordinates.latitude,
        longitude: s.coordinates.longitude,
        status: format!("{:?}", s.status),
        remaining_seconds: s.remaining_seconds,
        failure: s.failure.as_ref().map(|err| err.to_string()),
        created_at: s.created_at.to_rfc3339(),
        resolved_at: s.resolved_at.map(|at| at.to_rfc3339()),
    }
}

fn notification_to_proto(n: &DomainNotification) -> Notification {
    Notification {
        message: n.message.clone(),
        level: n.level.as_str().to_string(),
        request_id: n.request_id.map(|id| id.to_string()),
        at: n.at.to_rfc3339(),
    }
}

fn settings_from_proto(s: Settings) -> DispatchSettings {
    DispatchSettings {
        endpoint_url: s.endpoint_url,
        tracker_id: s.tracker_id,
        bearer_id: s.bearer_id,
        send_bearer_id: s.send_bearer_id,
    }
}

fn dispatch_error_to_status(err: DispatchError) -> Status {
    match err {
        DispatchError::Configuration(_) | DispatchError::InvalidCoordinates(_) => {
            Status::invalid_argument(err.to_string())
        }
        DispatchError::Inactive => Status::failed_precondition(err.to_string()),
        other => Status::internal(other.to_string()),
    }
}

#[tonic::async_trait]
impl CoordinateDispatch for GrpcDispatchService {
    async fn activate(
        &self,
        request: Request<ActivateRequest>,
    ) -> Result<Response<ActivateResponse>, Status> {
        let settings = match request.into_inner().settings {
            Some(settings) => {
                let settings = settings_from_proto(settings);
                settings.validate().map_err(dispatch_error_to_status)?;
                settings
            }
            None => self.state.settings.get().await.unwrap_or_default(),
        };

        self.state.coordinator.activate(settings);
        Ok(Response::new(ActivateResponse { active: true }))
    }

    async fn deactivate(
        &self,
        _request: Request<DeactivateRequest>,
    ) -> Result<Response<DeactivateResponse>, Status> {
        self.state.coordinator.deactivate();
        Ok(Response::new(DeactivateResponse { active: false }))
    }

    async fn dispatch(
        &self,
        request: Request<DispatchRequest>,
    ) -> Result<Response<DispatchSnapshot>, Status> {
        let req = request.into_inner();
        let handle = self
            .state
            .coordinator
            .dispatch(req.latitude, req.longitude)
            .map_err(dispatch_error_to_status)?;

        Ok(Response::new(snapshot_to_proto(&handle.snapshot())))
    }

    async fn cancel(
        &self,
        request: Request<CancelRequest>,
    ) -> Result<Response<CancelResponse>, Status> {
        let id: RequestId = request
            .into_inner()
            .id
            .parse()
            .map_err(|err| Status::invalid_argument(format!("invalid request id: {err}")))?;

        Ok(Response::new(CancelResponse {
            cancelled: self.state.coordinator.cancel(id),
        }))
    }

    async fn cancel_all(
        &self,
        _request: Request<CancelAllRequest>,
    ) -> Result<Response<CancelAllResponse>, Status> {
        let cancelled = self.state.coordinator.cancel_all();
        Ok(Response::new(CancelAllResponse {
            cancelled: cancelled as u32,
        }))
    }

    async fn get_current(
        &self,
        _request: Request<GetCurrentRequest>,
    ) -> Result<Response<GetCurrentResponse>, Status> {
        Ok(Response::new(GetCurrentResponse {
            current: self.state.coordinator.current().as_ref().map(snapshot_to_proto),
        }))
    }

    type WatchNotificationsStream =
        Pin<Box<dyn Stream<Item = Result<Notification, Status>> + Send>>;

    async fn watch_notifications(
        &self,
        _request: Request<WatchNotificationsRequest>,
    ) -> Result<Response<Self::WatchNotificationsStream>, Status> {
        let rx = self.state.coordinator.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|result| match result {
            Ok(notification) => Some(Ok(notification_to_proto(&notification))),
            Err(_) => None,
        });

        Ok(Response::new(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::{dispatch_error_to_status, settings_from_proto, pb};
    use crate::error::DispatchError;

    #[test]
    fn inactive_maps_to_failed_precondition() {
        let status = dispatch_error_to_status(DispatchError::Inactive);
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status = dispatch_error_to_status(DispatchError::Configuration("empty".to_string()));
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn proto_settings_keep_bearer_choice() {
        let settings = settings_from_proto(pb::Settings {
            endpoint_url: "https://tracking.example.com".to_string(),
            tracker_id: "tracker-7".to_string(),
            bearer_id: Some("bearer".to_string()),
            send_bearer_id: true,
        });

        assert_eq!(settings.payload_bearer_id(), Some("bearer"));
    }
}
