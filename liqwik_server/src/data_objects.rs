use std::fmt::Display;

use liqwik_engine::{
    asset_objects::{DocumentUpload, NewAssetRequest},
    db_types::{DocumentType, Role},
};
use serde::{Deserialize, Serialize};

use crate::{auth::JwtClaims, errors::ServerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A freshly issued session token, along with the claims it carries so that clients need not decode it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub claims: JwtClaims,
}

/// A document embedded in an asset payload. `data` is base64 encoded, and may be given as a `data:` URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub content_type: String,
    pub data: String,
}

impl UploadedFile {
    pub fn decode(self) -> Result<DocumentUpload, ServerError> {
        let encoded = match self.data.split_once("base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => self.data.as_str(),
        };
        let data = base64::decode(encoded.trim())
            .map_err(|e| ServerError::InvalidRequestBody(format!("{} is not valid base64. {e}", self.file_name)))?;
        Ok(DocumentUpload { file_name: self.file_name, content_type: self.content_type, data })
    }
}

/// The body of a new asset submission: the asset fields plus up to three supporting documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssetPayload {
    #[serde(flatten)]
    pub asset: NewAssetRequest,
    pub invoice: Option<UploadedFile>,
    pub bank_statement: Option<UploadedFile>,
    pub bill_to_party_history: Option<UploadedFile>,
}

impl NewAssetPayload {
    pub fn into_parts(self) -> Result<(NewAssetRequest, Vec<(DocumentType, DocumentUpload)>), ServerError> {
        let files = [
            (DocumentType::Invoice, self.invoice),
            (DocumentType::BankStatement, self.bank_statement),
            (DocumentType::BillToPartyHistory, self.bill_to_party_history),
        ];
        let uploads = files
            .into_iter()
            .filter_map(|(t, f)| f.map(|f| f.decode().map(|u| (t, u))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((self.asset, uploads))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceQuery {
    #[serde(default)]
    pub filter_by_bids: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusUpdate {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrantRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstLoginStatus {
    pub is_first_login: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationUpdateResult {
    pub success: bool,
    pub updated: u64,
}
