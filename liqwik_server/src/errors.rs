use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use liqwik_engine::{
    mailer::MailerError,
    traits::{AssetApiError, AuthApiError, BidApiError, NotificationApiError, OrganizationError, PaymentTrackingError},
};
use log::error;
use thiserror::Error;

const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NoRecordFound(String),
    #[error("{0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::CouldNotIssueToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("💻️ {self}");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Session token is invalid or has expired. {0}")]
    ValidationError(String),
    #[error("Session token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Could not issue a session token. {0}")]
    CouldNotIssueToken(String),
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        use AuthApiError::*;
        let msg = e.to_string();
        match e {
            DatabaseError(_) | PasswordError(_) => Self::BackendError(msg),
            MissingFields |
            InvalidEmail |
            PasswordTooShort |
            InvalidRole |
            EmailMismatch |
            InvalidVerificationCode |
            VerificationCodeExpired |
            InvalidOtp |
            OtpExpired |
            RoleMismatch |
            NotFirstLogin |
            RoleNotGrantable(_) => Self::ValidationError(msg),
            InvalidCredentials | OtpUserUnavailable => Self::Unauthorized(msg),
            UserNotFound | UserRoleNotFound => Self::NoRecordFound(msg),
            UserInactive | EmailNotVerified | RoleNotOwned | RoleNotVerified | NoVerifiedRoles => {
                Self::InsufficientPermissions(msg)
            },
            AlreadyRegistered(_) | OrganizationNameTaken(_) | RoleAlreadyVerified | RoleAlreadyGranted(_) |
            UserHasDependents => Self::Conflict(msg),
            OrganizationError(e) => e.into(),
        }
    }
}

impl From<OrganizationError> for ServerError {
    fn from(e: OrganizationError) -> Self {
        let msg = e.to_string();
        match e {
            OrganizationError::DatabaseError(_) => Self::BackendError(msg),
            OrganizationError::BillToPartyNotFound | OrganizationError::ContactNotFound => Self::NoRecordFound(msg),
            OrganizationError::BillToPartyNameTaken => Self::Conflict(msg),
        }
    }
}

impl From<AssetApiError> for ServerError {
    fn from(e: AssetApiError) -> Self {
        use AssetApiError::*;
        let msg = e.to_string();
        match e {
            DatabaseError(_) | DocumentStorageError(_) => Self::BackendError(msg),
            NotAnOrgMember(_) | Forbidden => Self::InsufficientPermissions(msg),
            AssetNotFound | BillToPartyNotFound | DocumentNotFound | InvalidValidationToken => Self::NoRecordFound(msg),
            MissingInvoiceNumber |
            MissingInvoiceDate |
            MissingPaymentDate |
            MissingTermMonths |
            ValidationError(_) |
            DuplicateInvoice |
            FeeNotApproved |
            InvalidFileType |
            FileTooLarge |
            InvalidFileName => Self::ValidationError(msg),
            NotEditable |
            BillToPartyLocked |
            FeeAlreadyApproved |
            FeeApprovalOnCancelledAsset |
            AlreadyPosted |
            PostOnCancelledAsset |
            AlreadyCancelled => Self::Conflict(msg),
            OrganizationError(e) => e.into(),
        }
    }
}

impl From<BidApiError> for ServerError {
    fn from(e: BidApiError) -> Self {
        use BidApiError::*;
        let msg = e.to_string();
        match e {
            DatabaseError(_) => Self::BackendError(msg),
            NotAnOrgMember(_) | Forbidden => Self::InsufficientPermissions(msg),
            AssetNotFound | BidNotFound | InvalidPaymentToken => Self::NoRecordFound(msg),
            AssetNotOpen | InvalidAmount | InvalidAction | PaymentDeadlinePassed | PaymentApprovalRequired |
            BidNotAccepted => Self::ValidationError(msg),
            BidAlreadyAccepted | PaymentAlreadyApproved | BidLapsed | AnotherBidAccepted => Self::Conflict(msg),
            OrganizationError(e) => e.into(),
        }
    }
}

impl From<NotificationApiError> for ServerError {
    fn from(e: NotificationApiError) -> Self {
        let msg = e.to_string();
        match e {
            NotificationApiError::DatabaseError(_) => Self::BackendError(msg),
            NotificationApiError::NotificationNotFound => Self::NoRecordFound(msg),
            NotificationApiError::InvalidAction => Self::ValidationError(msg),
        }
    }
}

impl From<PaymentTrackingError> for ServerError {
    fn from(e: PaymentTrackingError) -> Self {
        let msg = e.to_string();
        match e {
            PaymentTrackingError::DatabaseError(_) => Self::BackendError(msg),
            PaymentTrackingError::AlreadyRunning | PaymentTrackingError::AlreadyPaid => Self::Conflict(msg),
            PaymentTrackingError::PaymentNotFound => Self::NoRecordFound(msg),
        }
    }
}

impl From<MailerError> for ServerError {
    fn from(e: MailerError) -> Self {
        Self::BackendError(e.to_string())
    }
}
