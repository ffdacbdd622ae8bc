use utoipa::OpenApi;

use crate::client::{FcmMessage, Message, Notification};
use crate::handlers::{
    DeviceResponse, DeviceView, DevicesResponse, RegisterDeviceRequest, RegisterDeviceResponse,
    SendNotificationRequest, SendNotificationResponse, StatusResponse,
};
use pushgate_dispatch::{DeliveryOutcome, DispatchResult, TargetFailure};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::status_handler,
        crate::handlers::register_device_handler,
        crate::handlers::list_devices_handler,
        crate::handlers::get_device_handler,
        crate::handlers::send_notification_handler,
    ),
    components(
        schemas(
            StatusResponse,
            RegisterDeviceRequest,
            RegisterDeviceResponse,
            DeviceView,
            DevicesResponse,
            DeviceResponse,
            SendNotificationRequest,
            SendNotificationResponse,
            DispatchResult,
            TargetFailure,
            DeliveryOutcome,
            FcmMessage,
            Message,
            Notification,
        )
    ),
    tags(
        (name = "Pushgate", description = "Device registration and push notification dispatch")
    ),
    servers(
        (url = "/api", description = "Pushgate API server")
    )
)]
pub struct FirebaseApiDoc;
