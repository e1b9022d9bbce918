use chrono::{DateTime, Utc};
use liqwik_common::Cents;

use crate::db_types::Role;

pub const APP_NAME: &str = "Liqwik";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailKind {
    Verification,
    LoginOtp,
    FirstLoginSuccess,
    Welcome,
    SellerFeeConfirmation,
    BillToPartyValidation,
    BidAccepted,
    BuyerPaymentConfirmation,
    SellerPaymentNotification,
    AssetPosted,
    AssetCancelled,
    PaymentReminder,
    PaymentOverdue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub kind: EmailKind,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

struct Body {
    paragraphs: Vec<String>,
    link: Option<(String, String)>,
}

impl Body {
    fn new() -> Self {
        Self { paragraphs: Vec::new(), link: None }
    }

    fn para<S: Into<String>>(mut self, p: S) -> Self {
        self.paragraphs.push(p.into());
        self
    }

    fn link<S1: Into<String>, S2: Into<String>>(mut self, label: S1, url: S2) -> Self {
        self.link = Some((label.into(), url.into()));
        self
    }

    fn into_message(self, kind: EmailKind, to: &str, subject: String) -> EmailMessage {
        let mut text = self.paragraphs.join("\n\n");
        let mut html = self.paragraphs.iter().map(|p| format!("<p>{}</p>", escape(p))).collect::<Vec<_>>().join("\n");
        if let Some((label, url)) = self.link {
            text.push_str(&format!("\n\n{label}: {url}"));
            html.push_str(&format!("\n<p><a href=\"{}\">{}</a></p>", escape(&url), escape(&label)));
        }
        text.push_str(&format!("\n\nThe {APP_NAME} team"));
        html.push_str(&format!("\n<p>The {APP_NAME} team</p>"));
        EmailMessage { kind, to: to.to_string(), subject, text, html }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

impl EmailMessage {
    pub fn verification(to: &str, first_name: &str, code: &str, role: Role) -> Self {
        Body::new()
            .para(format!("Hi {first_name},"))
            .para(format!("Your verification code for your {role} account is {code}."))
            .para("Enter this code to verify your email address. The code expires soon, so use it promptly.")
            .into_message(EmailKind::Verification, to, format!("Verify your email - {APP_NAME}"))
    }

    pub fn login_otp(to: &str, first_name: &str, otp: &str) -> Self {
        Body::new()
            .para(format!("Hi {first_name},"))
            .para(format!("Your login code is {otp}. It expires in 10 minutes."))
            .para("If you did not try to log in, you can ignore this email.")
            .into_message(EmailKind::LoginOtp, to, format!("Your login code - {APP_NAME}"))
    }

    pub fn first_login_success(to: &str, first_name: &str) -> Self {
        Body::new()
            .para(format!("Hi {first_name},"))
            .para(format!("You have logged in to {APP_NAME} for the first time. Welcome aboard!"))
            .into_message(EmailKind::FirstLoginSuccess, to, format!("First login successful - {APP_NAME}"))
    }

    pub fn welcome(to: &str, first_name: &str, role: Role) -> Self {
        Body::new()
            .para(format!("Hi {first_name},"))
            .para(format!("Your email has been verified and your {role} account is ready to use."))
            .into_message(EmailKind::Welcome, to, format!("Welcome to {APP_NAME}"))
    }

    pub fn seller_fee_confirmation(to: &str, seller_name: &str, invoice_number: &str, fees: Cents) -> Self {
        Body::new()
            .para(format!("Dear {seller_name},"))
            .para(format!("You have approved the fee of {fees} for invoice {invoice_number}."))
            .para("We have asked the bill-to party to validate the invoice. You will be notified once they do.")
            .into_message(EmailKind::SellerFeeConfirmation, to, format!("Fee approved for invoice {invoice_number}"))
    }

    pub fn bill_to_party_validation(
        to: &str,
        bill_to_party_name: &str,
        seller_name: &str,
        invoice_number: &str,
        face_value: Cents,
        link: &str,
    ) -> Self {
        Body::new()
            .para(format!("Dear {bill_to_party_name},"))
            .para(format!(
                "{seller_name} has listed invoice {invoice_number} for {face_value} on {APP_NAME} and named you as the \
                 bill-to party."
            ))
            .para("Please confirm that the invoice is genuine by following the link below.")
            .link("Validate invoice", link)
            .into_message(
                EmailKind::BillToPartyValidation,
                to,
                format!("Please validate invoice {invoice_number} - {APP_NAME}"),
            )
    }

    pub fn bid_accepted(
        to: &str,
        buyer_name: &str,
        invoice_number: &str,
        amount: Cents,
        deadline: DateTime<Utc>,
        link: &str,
    ) -> Self {
        let deadline = deadline.format("%Y-%m-%d %H:%M UTC");
        Body::new()
            .para(format!("Dear {buyer_name},"))
            .para(format!("Your bid of {amount} for invoice {invoice_number} has been accepted."))
            .para(format!("Please approve the payment before {deadline}. After that the bid lapses."))
            .link("Approve payment", link)
            .into_message(EmailKind::BidAccepted, to, format!("Bid accepted for invoice {invoice_number}"))
    }

    pub fn buyer_payment_confirmation(to: &str, buyer_name: &str, invoice_number: &str, amount: Cents) -> Self {
        Body::new()
            .para(format!("Dear {buyer_name},"))
            .para(format!("Your payment of {amount} for invoice {invoice_number} has been confirmed."))
            .into_message(
                EmailKind::BuyerPaymentConfirmation,
                to,
                format!("Payment confirmed for invoice {invoice_number}"),
            )
    }

    pub fn seller_payment_notification(
        to: &str,
        seller_name: &str,
        buyer_name: &str,
        invoice_number: &str,
        amount: Cents,
    ) -> Self {
        Body::new()
            .para(format!("Dear {seller_name},"))
            .para(format!("{buyer_name} has approved payment of {amount} for invoice {invoice_number}."))
            .into_message(
                EmailKind::SellerPaymentNotification,
                to,
                format!("Payment approved for invoice {invoice_number}"),
            )
    }

    pub fn asset_posted(to: &str, seller_name: &str, invoice_number: &str) -> Self {
        Body::new()
            .para(format!("Dear {seller_name},"))
            .para(format!("Invoice {invoice_number} is now posted to {APP_NAME} and open for bids."))
            .into_message(EmailKind::AssetPosted, to, format!("Invoice {invoice_number} posted"))
    }

    pub fn asset_cancelled(to: &str, seller_name: &str, invoice_number: &str) -> Self {
        Body::new()
            .para(format!("Dear {seller_name},"))
            .para(format!("Invoice {invoice_number} has been cancelled and is no longer available."))
            .into_message(EmailKind::AssetCancelled, to, format!("Invoice {invoice_number} cancelled"))
    }

    pub fn payment_reminder(
        to: &str,
        bill_to_party_name: &str,
        invoice_number: &str,
        amount: Cents,
        days_until_due: i64,
        reminder_number: i64,
    ) -> Self {
        Body::new()
            .para(format!("Dear {bill_to_party_name},"))
            .para(format!("Reminder: Payment of {amount} due in {days_until_due} days for invoice {invoice_number}."))
            .into_message(
                EmailKind::PaymentReminder,
                to,
                format!("Payment reminder #{reminder_number} for invoice {invoice_number}"),
            )
    }

    pub fn payment_overdue(
        to: &str,
        bill_to_party_name: &str,
        invoice_number: &str,
        amount: Cents,
        days_overdue: i64,
    ) -> Self {
        Body::new()
            .para(format!("Dear {bill_to_party_name},"))
            .para(format!(
                "Your payment of {amount} for invoice {invoice_number} is overdue by {days_overdue} days. Please \
                 settle it as soon as possible."
            ))
            .into_message(EmailKind::PaymentOverdue, to, format!("Payment overdue for invoice {invoice_number}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn links_appear_in_both_bodies() {
        let msg = EmailMessage::bill_to_party_validation(
            "ap@acme.test",
            "Acme",
            "Seller & Co",
            "INV-1",
            Cents::from(100_000),
            "https://liqwik.test/api/validate-bill-to-party/abc",
        );
        assert_eq!(msg.kind, EmailKind::BillToPartyValidation);
        assert!(msg.text.contains("https://liqwik.test/api/validate-bill-to-party/abc"));
        assert!(msg.text.contains("€1000.00"));
        assert!(msg.html.contains(r#"<a href="https://liqwik.test/api/validate-bill-to-party/abc">"#));
        assert!(msg.html.contains("Seller &amp; Co"));
    }

    #[test]
    fn reminder_wording() {
        let msg = EmailMessage::payment_reminder("ap@acme.test", "Acme", "INV-7", Cents::from(5050), 12, 2);
        assert!(msg.text.contains("Reminder: Payment of €50.50 due in 12 days for invoice INV-7."));
        assert_eq!(msg.subject, "Payment reminder #2 for invoice INV-7");
    }
}
