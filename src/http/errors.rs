use crate::types::FieldErrors;

pub type ClientResult<T> = Result<T, ClientError>;

pub const NETWORK_MESSAGE: &str = "Không thể kết nối đến máy chủ. Vui lòng kiểm tra kết nối mạng.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Phiên đăng nhập đã hết hạn. Vui lòng đăng nhập lại.";
pub const REFRESH_FAILED_MESSAGE: &str = "Làm mới phiên đăng nhập thất bại.";
pub const DEFAULT_MESSAGE: &str = "Đã xảy ra lỗi. Vui lòng thử lại.";

/// Every failure the client surfaces. `Display` is the human-readable,
/// already-localized message; callers are not expected to re-interpret codes.
///
/// `Clone` so one refresh outcome can be handed to every queued request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// No response reached the client (connect failure, timeout, reset).
    #[error("{message}")]
    Network { message: String, detail: String },

    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        field_errors: FieldErrors,
    },

    /// `success: false` inside an otherwise successful response.
    #[error("{message}")]
    Application {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionExpired,

    #[error("{}", REFRESH_FAILED_MESSAGE)]
    TokenRefreshFailed { reason: String },

    #[error("Phản hồi từ máy chủ không hợp lệ: {0}")]
    Decode(String),

    #[error("Dữ liệu không hợp lệ: {0}")]
    Validation(String),
}

impl ClientError {
    pub fn network(detail: impl Into<String>) -> Self {
        ClientError::Network {
            message: NETWORK_MESSAGE.to_string(),
            detail: detail.into(),
        }
    }

    /// Translate an HTTP status failure. A backend-supplied message wins over
    /// the fixed table.
    pub fn from_status(status: u16, backend_message: Option<&str>, field_errors: FieldErrors) -> Self {
        let message = backend_message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| status_message(status));
        ClientError::Status {
            status,
            message,
            field_errors,
        }
    }

    /// Translate an application-level failure envelope.
    pub fn application(
        backend_message: Option<&str>,
        fallback: Option<&str>,
        field_errors: FieldErrors,
    ) -> Self {
        let non_blank = |m: &&str| !m.trim().is_empty();
        let message = backend_message
            .filter(non_blank)
            .or(fallback.filter(non_blank))
            .map(str::trim)
            .unwrap_or(DEFAULT_MESSAGE)
            .to_string();
        ClientError::Application {
            message,
            field_errors,
        }
    }

    pub fn refresh_failed(reason: impl Into<String>) -> Self {
        ClientError::TokenRefreshFailed {
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ClientError::Status { field_errors, .. }
            | ClientError::Application { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }
}

impl From<garde::Report> for ClientError {
    fn from(report: garde::Report) -> Self {
        ClientError::Validation(report.to_string())
    }
}

/// Fixed localized message for an HTTP status code.
pub fn status_message(status: u16) -> String {
    let fixed = match status {
        400 => "Yêu cầu không hợp lệ. Vui lòng kiểm tra lại thông tin.",
        401 => "Phiên đăng nhập không hợp lệ. Vui lòng đăng nhập lại.",
        403 => "Bạn không có quyền thực hiện thao tác này.",
        404 => "Không tìm thấy tài nguyên yêu cầu.",
        409 => "Dữ liệu bị xung đột với dữ liệu hiện có.",
        422 => "Dữ liệu gửi lên không hợp lệ.",
        429 => "Quá nhiều yêu cầu. Vui lòng thử lại sau.",
        500 => "Lỗi máy chủ. Vui lòng thử lại sau.",
        502..=504 => "Máy chủ tạm thời không khả dụng. Vui lòng thử lại sau.",
        _ => return format!("Lỗi {status}: {DEFAULT_MESSAGE}"),
    };
    fixed.to_string()
}
