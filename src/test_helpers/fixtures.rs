//! Route, form and checkpoint fixtures.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::{
    Address, ConfirmationAnswer, EncodedImage, OperatorId, PendingCheckpoint, Route, RouteId,
    SkipReason, Stop, StopId, StopType, UnloadingAnswer,
};
use crate::state_machine::{
    ConfirmationForm, DestinationForm, ExecutionStatus, IntermediateForm, OriginForm,
};

/// Operator most fixtures assign their routes to
pub const OPERATOR: &str = "driver-1";

/// Fixed reference instant so derived checkpoint ids are reproducible
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 18, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Origin, two intermediate stops and a destination around Criciúma, SC
pub fn sample_route(id: &str, operator: &str) -> Route {
    let origin = Stop::origin(
        "o",
        Address::new("Depot, Rua Henrique Lage 100").with_coordinates(-28.67750, -49.36970),
    );
    let intermediates = vec![
        Stop::intermediate(
            "i1",
            Address::new("Shop, Av. Centenário 2500").with_coordinates(-28.68510, -49.37320),
        ),
        Stop::intermediate(
            "i2",
            Address::new("Pharmacy, Rua Cel. Pedro Benedet 30").with_coordinates(-28.67920, -49.37010),
        ),
    ];
    let destination = Stop::destination(
        "d",
        Address::new("Warehouse, Rodovia Luiz Rosso 1200").with_coordinates(-28.71980, -49.38850),
    );

    Route::new(id, operator, "client-1", origin, intermediates, destination)
        .map(|route| route.with_name(format!("Order {id}")))
        .unwrap_or_else(|error| panic!("fixture route layout is invalid: {error}"))
}

/// Origin, one intermediate stop and a destination
pub fn three_stop_route(id: &str, operator: &str) -> Route {
    let mut route = sample_route(id, operator);
    route.stops.retain(|stop| stop.id.as_str() != "i2");
    route
}

/// [`sample_route`] already started by the operator
pub fn in_progress_route(id: &str, operator: &str) -> Route {
    let mut route = sample_route(id, operator);
    route.execution_status = ExecutionStatus::InProgress;
    route.started_at = Some(base_time());
    route
}

pub fn origin_form() -> ConfirmationForm {
    ConfirmationForm::Origin(OriginForm {
        loading_confirmed: Some(ConfirmationAnswer::Yes),
        loading_photos: vec![EncodedImage::new("aW1hZ2UtbG9hZGluZw==")],
    })
}

pub fn intermediate_form() -> ConfirmationForm {
    ConfirmationForm::Intermediate(IntermediateForm {
        delivery_confirmed: Some(ConfirmationAnswer::Yes),
        delivery_photos: Vec::new(),
        collection_confirmed: Some(ConfirmationAnswer::NotApplicable),
        collection_photos: Vec::new(),
    })
}

pub fn destination_form() -> ConfirmationForm {
    ConfirmationForm::Destination(DestinationForm {
        unloading_confirmed: Some(UnloadingAnswer::Yes),
        unloading_photos: Vec::new(),
        signature: Some(EncodedImage::new("c2lnbmF0dXJl")),
    })
}

/// A complete, valid form for a stop of `stop_type`
pub fn filled_form(stop_type: StopType) -> ConfirmationForm {
    match stop_type {
        StopType::Origin => origin_form(),
        StopType::Intermediate => intermediate_form(),
        StopType::Destination => destination_form(),
    }
}

/// Completion checkpoint for `stop_id`, created `offset_secs` after [`base_time`]
pub fn completed_checkpoint(route: &Route, stop_id: &str, offset_secs: i64) -> PendingCheckpoint {
    let stop_id = StopId::new(stop_id);
    let stop_type = route
        .stop(&stop_id)
        .map(|stop| stop.stop_type)
        .unwrap_or(StopType::Intermediate);
    let confirmation = filled_form(stop_type)
        .build(stop_type)
        .unwrap_or_else(|error| panic!("fixture form is invalid: {error}"));

    PendingCheckpoint::completed(
        route.id.clone(),
        stop_id,
        route.assigned_operator_id.clone(),
        confirmation,
        None,
        base_time() + Duration::seconds(offset_secs),
    )
}

pub fn skipped_checkpoint(
    route: &Route,
    stop_id: &str,
    reason: SkipReason,
    offset_secs: i64,
) -> PendingCheckpoint {
    PendingCheckpoint::skipped(
        route.id.clone(),
        StopId::new(stop_id),
        route.assigned_operator_id.clone(),
        reason,
        base_time() + Duration::seconds(offset_secs),
    )
}

pub fn route_id(id: &str) -> RouteId {
    RouteId::new(id)
}

pub fn operator(id: &str) -> OperatorId {
    OperatorId::new(id)
}
