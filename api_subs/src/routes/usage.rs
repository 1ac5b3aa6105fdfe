use actix_web::{Responder, get, post, web};
use common::{
    error::{AppError, Res},
    http::Success,
    identity::Identity,
};

use crate::{
    billing::Billing,
    dtos::usage::{ImageUsageRequest, ImageUsageResponse},
    services::metering::current_period_key,
};

/// Usage of the current month with the limits that apply to the caller.
///
/// # Output
/// - Success: `{ periodKey, plan, usage, limits: { canUpload, canUploadImage, reason? } }`
#[get("")]
pub async fn get_usage(
    identity: web::ReqData<Identity>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    let entitlement = billing
        .meter
        .entitlement(identity.user_id, &current_period_key())
        .await?;
    Success::ok(entitlement)
}

/// Records an uploaded image. 403 once the month's image allowance is used up.
#[post("/image")]
pub async fn post_image_usage(
    identity: web::ReqData<Identity>,
    req: web::Json<ImageUsageRequest>,
    billing: web::Data<Billing>,
) -> Res<impl Responder> {
    if req.size_bytes <= 0 {
        return Err(AppError::BadRequest("sizeBytes must be positive".to_string()));
    }

    let period = current_period_key();
    let entitlement = billing.meter.entitlement(identity.user_id, &period).await?;
    if !entitlement.limits.can_upload_image {
        return Err(AppError::Forbidden(
            entitlement
                .limits
                .reason
                .unwrap_or_else(|| "Image storage limit reached".to_string()),
        ));
    }

    let usage = billing
        .meter
        .increment_image_usage(identity.user_id, &period, req.size_bytes)
        .await?;
    Success::ok(ImageUsageResponse { usage })
}
