use chrono::{DateTime, NaiveDate, Utc};
use liqwik_common::Cents;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Asset, AssetBid, AssetStatus, AssetUpdate, DocumentType, NewAsset},
    traits::AssetApiError,
};

/// Largest accepted document, in bytes.
pub const MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024;

const ALLOWED_DOCUMENT_TYPES: [(&str, &str); 5] = [
    ("application/pdf", "pdf"),
    ("application/msword", "doc"),
    ("application/vnd.openxmlformats-officedocument.wordprocessingml.document", "docx"),
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
];

fn money(amount: f64, field: &str) -> Result<Cents, AssetApiError> {
    let cents = Cents::from_currency_units(amount).map_err(|e| AssetApiError::ValidationError(e.to_string()))?;
    if cents.value() < 0 {
        return Err(AssetApiError::ValidationError(format!("{field} must not be negative")));
    }
    Ok(cents)
}

/// A new asset as submitted by a seller. Amounts are in currency units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAssetRequest {
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDate>,
    pub face_value: Option<f64>,
    pub payment_date: Option<NaiveDate>,
    pub term_months: Option<i64>,
    pub apy: Option<f64>,
    pub fees: Option<f64>,
    pub bill_to_party_id: Option<i64>,
}

impl NewAssetRequest {
    pub fn into_new_asset(self, seller_id: i64) -> Result<NewAsset, AssetApiError> {
        let invoice_number = self.invoice_number.trim().to_string();
        if invoice_number.is_empty() {
            return Err(AssetApiError::MissingInvoiceNumber);
        }
        let invoice_date = self.invoice_date.ok_or(AssetApiError::MissingInvoiceDate)?;
        let payment_date = self.payment_date.ok_or(AssetApiError::MissingPaymentDate)?;
        let term_months = self.term_months.ok_or(AssetApiError::MissingTermMonths)?;
        let bill_to_party_id = self.bill_to_party_id.ok_or(AssetApiError::BillToPartyNotFound)?;
        Ok(NewAsset {
            invoice_number,
            invoice_date,
            face_value_in_cents: money(self.face_value.unwrap_or_default(), "Face value")?,
            payment_date,
            term_months,
            apy: self.apy.unwrap_or_default(),
            fees_in_cents: money(self.fees.unwrap_or_default(), "Fees")?,
            seller_id,
            bill_to_party_id,
        })
    }
}

/// Changes to a draft asset. Omitted fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAssetRequest {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub face_value: Option<f64>,
    pub payment_date: Option<NaiveDate>,
    pub term_months: Option<i64>,
    pub apy: Option<f64>,
    pub fees: Option<f64>,
    pub bill_to_party_id: Option<i64>,
}

impl TryFrom<UpdateAssetRequest> for AssetUpdate {
    type Error = AssetApiError;

    fn try_from(req: UpdateAssetRequest) -> Result<Self, Self::Error> {
        let invoice_number = match req.invoice_number.map(|s| s.trim().to_string()) {
            Some(s) if s.is_empty() => return Err(AssetApiError::MissingInvoiceNumber),
            other => other,
        };
        Ok(AssetUpdate {
            invoice_number,
            invoice_date: req.invoice_date,
            face_value_in_cents: req.face_value.map(|v| money(v, "Face value")).transpose()?,
            payment_date: req.payment_date,
            term_months: req.term_months,
            apy: req.apy,
            fees_in_cents: req.fees.map(|v| money(v, "Fees")).transpose()?,
            bill_to_party_id: req.bill_to_party_id,
        })
    }
}

/// A decoded document upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl DocumentUpload {
    /// Checks the type and size of the upload, returning the file extension to store it under.
    pub fn validate(&self) -> Result<&'static str, AssetApiError> {
        let ext = extension_for_content_type(&self.content_type).ok_or(AssetApiError::InvalidFileType)?;
        if self.data.len() > MAX_DOCUMENT_SIZE {
            return Err(AssetApiError::FileTooLarge);
        }
        Ok(ext)
    }
}

pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let content_type = content_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_DOCUMENT_TYPES.iter().find(|(mime, _)| mime.eq_ignore_ascii_case(content_type)).map(|(_, ext)| *ext)
}

/// The MIME type to serve a stored document with, judged by its extension.
pub fn content_type_for_file_name(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Rejects names that could escape the asset's document folder.
pub fn is_safe_file_name(file_name: &str) -> bool {
    !file_name.is_empty() && !file_name.contains(['/', '\\']) && !file_name.contains("..")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub name: String,
    pub path: String,
    pub file_name: String,
}

impl DocumentInfo {
    pub fn new(doc_type: DocumentType, invoice_number: &str, path: &str) -> Self {
        let name = match doc_type {
            DocumentType::Invoice => format!("Invoice_{invoice_number}"),
            DocumentType::BankStatement => "12 Months Bank Statement".to_string(),
            DocumentType::BillToPartyHistory => doc_type.label().to_string(),
        };
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        Self { doc_type: doc_type.label().to_string(), name, path: path.to_string(), file_name }
    }

    /// The documents recorded on the asset, in a fixed order.
    pub fn for_asset(asset: &Asset) -> Vec<Self> {
        [
            (DocumentType::Invoice, &asset.invoice_file_path),
            (DocumentType::BankStatement, &asset.bank_statement_file_path),
            (DocumentType::BillToPartyHistory, &asset.bill_to_party_history_file_path),
        ]
        .into_iter()
        .filter_map(|(t, p)| p.as_deref().map(|p| Self::new(t, &asset.invoice_number, p)))
        .collect()
    }
}

/// A downloaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContent {
    pub info: DocumentInfo,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

/// An asset as its seller sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerAssetView {
    #[serde(flatten)]
    pub asset: Asset,
    pub face_value: f64,
    pub status: AssetStatus,
    pub bill_to_party_name: Option<String>,
    pub num_days_for_payment: i64,
    pub bids: Vec<AssetBid>,
}

impl SellerAssetView {
    pub fn new(asset: Asset, bill_to_party_name: Option<String>, bids: Vec<AssetBid>, today: NaiveDate) -> Self {
        Self {
            face_value: asset.face_value_in_cents.as_currency_units(),
            status: asset.status(),
            num_days_for_payment: asset.days_until_payment(today),
            bill_to_party_name,
            bids,
            asset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatus {
    pub validated_by_bill_to_party: bool,
    pub bill_to_party_validated_at: Option<DateTime<Utc>>,
}

impl From<&Asset> for ValidationStatus {
    fn from(asset: &Asset) -> Self {
        Self {
            validated_by_bill_to_party: asset.validated_by_bill_to_party,
            bill_to_party_validated_at: asset.bill_to_party_validated_at,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn request() -> NewAssetRequest {
        NewAssetRequest {
            invoice_number: "INV-001".into(),
            invoice_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            face_value: Some(1000.0),
            payment_date: NaiveDate::from_ymd_opt(2025, 4, 1),
            term_months: Some(3),
            apy: None,
            fees: Some(12.345),
            bill_to_party_id: Some(7),
        }
    }

    #[test]
    fn face_value_and_fees_become_cents() {
        let asset = request().into_new_asset(3).unwrap();
        assert_eq!(asset.face_value_in_cents, Cents::from(100_000));
        assert_eq!(asset.fees_in_cents, Cents::from(1235));
        assert_eq!(asset.apy, 0.0);
        assert_eq!(asset.seller_id, 3);
    }

    #[test]
    fn required_asset_fields() {
        let err = NewAssetRequest { invoice_date: None, ..request() }.into_new_asset(1).unwrap_err();
        assert_eq!(err.to_string(), "Invoice Date is required");
        let err = NewAssetRequest { payment_date: None, ..request() }.into_new_asset(1).unwrap_err();
        assert_eq!(err.to_string(), "Payment Date is required");
        let err = NewAssetRequest { term_months: None, ..request() }.into_new_asset(1).unwrap_err();
        assert_eq!(err.to_string(), "Term Months is required");
        let err = NewAssetRequest { face_value: Some(-1.0), ..request() }.into_new_asset(1).unwrap_err();
        assert!(matches!(err, AssetApiError::ValidationError(_)));
    }

    #[test]
    fn upload_validation() {
        let mut upload = DocumentUpload {
            file_name: "invoice.pdf".into(),
            content_type: "application/pdf".into(),
            data: vec![0u8; 16],
        };
        assert_eq!(upload.validate().unwrap(), "pdf");
        upload.content_type = "text/plain".into();
        assert!(matches!(upload.validate(), Err(AssetApiError::InvalidFileType)));
        upload.content_type = "image/jpeg".into();
        upload.data = vec![0u8; MAX_DOCUMENT_SIZE + 1];
        assert!(matches!(upload.validate(), Err(AssetApiError::FileTooLarge)));
    }

    #[test]
    fn file_names() {
        assert!(is_safe_file_name("invoice_1700000000000.pdf"));
        assert!(!is_safe_file_name("../secrets.txt"));
        assert!(!is_safe_file_name("a/b.pdf"));
        assert!(!is_safe_file_name("a\\b.pdf"));
        assert!(!is_safe_file_name(""));
        assert_eq!(content_type_for_file_name("x.DOCX"), extension_mime("docx"));
        assert_eq!(content_type_for_file_name("x"), "application/octet-stream");
    }

    fn extension_mime(ext: &str) -> &'static str {
        ALLOWED_DOCUMENT_TYPES.iter().find(|(_, e)| *e == ext).map(|(m, _)| *m).unwrap()
    }

    #[test]
    fn document_info_names() {
        let info = DocumentInfo::new(DocumentType::Invoice, "INV-9", "uploads/assets/4/invoice_17.pdf");
        assert_eq!(info.name, "Invoice_INV-9");
        assert_eq!(info.file_name, "invoice_17.pdf");
        assert_eq!(info.doc_type, "Invoice");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "Invoice");
    }
}
