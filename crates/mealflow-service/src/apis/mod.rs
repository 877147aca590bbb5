//! HTTP API surface for the marketplace actors.
//!
//! One module per actor concern. All handlers translate core errors into
//! a uniform error body with a machine-readable code; recoverable
//! conditions (busy driver, invalid transition) map to 409 so clients can
//! branch on them.

pub mod checkout;
pub mod dispatch;
pub mod orders;
pub mod restaurants;
pub mod views;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use mealflow_core::{CheckoutError, DispatchError, LifecycleError};
use mealflow_core::views::ViewError;
use serde::Serialize;

/// Uniform error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

/// An API error: HTTP status plus the serialized body.
#[derive(Debug)]
pub struct ApiError {
	pub status: StatusCode,
	pub code: &'static str,
	pub message: String,
}

impl ApiError {
	pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
		Self {
			status,
			code,
			message: message.into(),
		}
	}

	pub fn internal(message: impl Into<String>) -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = Json(ErrorResponse {
			error: self.code.to_string(),
			message: self.message,
		});
		(self.status, body).into_response()
	}
}

impl From<LifecycleError> for ApiError {
	fn from(e: LifecycleError) -> Self {
		match &e {
			LifecycleError::InvalidTransition { .. } => {
				Self::new(StatusCode::CONFLICT, "INVALID_TRANSITION", e.to_string())
			},
			LifecycleError::RoleNotPermitted { .. } => {
				Self::new(StatusCode::FORBIDDEN, "ROLE_NOT_PERMITTED", e.to_string())
			},
			LifecycleError::OrderNotFound(_) => {
				Self::new(StatusCode::NOT_FOUND, "ORDER_NOT_FOUND", e.to_string())
			},
			_ => Self::internal(e.to_string()),
		}
	}
}

impl From<DispatchError> for ApiError {
	fn from(e: DispatchError) -> Self {
		let message = e.to_string();
		match e {
			DispatchError::DriverBusy { .. } => {
				Self::new(StatusCode::CONFLICT, "DRIVER_BUSY", message)
			},
			DispatchError::DriverNotFound(_) => {
				Self::new(StatusCode::NOT_FOUND, "DRIVER_NOT_FOUND", message)
			},
			DispatchError::Lifecycle(inner) => Self::from(inner),
			DispatchError::Store(_) => Self::internal(message),
		}
	}
}

impl From<CheckoutError> for ApiError {
	fn from(e: CheckoutError) -> Self {
		match &e {
			CheckoutError::RestaurantNotFound(_) => {
				Self::new(StatusCode::NOT_FOUND, "RESTAURANT_NOT_FOUND", e.to_string())
			},
			CheckoutError::RestaurantClosed(_) => {
				Self::new(StatusCode::CONFLICT, "RESTAURANT_CLOSED", e.to_string())
			},
			CheckoutError::EmptyCart => {
				Self::new(StatusCode::BAD_REQUEST, "EMPTY_CART", e.to_string())
			},
			CheckoutError::MissingAddress => {
				Self::new(StatusCode::BAD_REQUEST, "MISSING_ADDRESS", e.to_string())
			},
			CheckoutError::UnsupportedTip(_) => {
				Self::new(StatusCode::BAD_REQUEST, "UNSUPPORTED_TIP", e.to_string())
			},
			CheckoutError::PaymentDeclined(_) => {
				Self::new(StatusCode::PAYMENT_REQUIRED, "PAYMENT_DECLINED", e.to_string())
			},
			CheckoutError::PaymentFailed(_) => {
				Self::new(StatusCode::BAD_GATEWAY, "PAYMENT_FAILED", e.to_string())
			},
			CheckoutError::Store(_) => Self::internal(e.to_string()),
		}
	}
}

impl From<ViewError> for ApiError {
	fn from(e: ViewError) -> Self {
		Self::internal(e.to_string())
	}
}
