use liqwik_common::Cents;
use liqwik_engine::{
    asset_objects::{DocumentUpload, UpdateAssetRequest},
    auth_objects::SessionInfo,
    db_types::{AssetStatus, DocumentType, NotificationType, Role},
    mailer::EmailKind,
    traits::{AssetApiError, TokenOutcome},
};

mod support;

use support::{asset_request, days_from_today, Marketplace, PUBLIC_URL};

fn session(user_id: i64, role: Role) -> SessionInfo {
    SessionInfo {
        user_id,
        email: "someone@example.com".into(),
        first_name: "Someone".into(),
        roles: vec![role],
        selected_role: Some(role),
        selected_user_role_id: None,
    }
}

fn pdf(name: &str) -> DocumentUpload {
    DocumentUpload { file_name: name.into(), content_type: "application/pdf".into(), data: b"%PDF-1.4 test".to_vec() }
}

#[tokio::test]
async fn amounts_are_stored_in_cents() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    let req = asset_request("INV-1000", btp.id, 1000.0, days_from_today(30));
    let view = mkt.assets.create_asset(seller.id(), req, vec![]).await.unwrap();
    assert_eq!(view.asset.face_value_in_cents, Cents::from(100_000));
    assert_eq!(view.asset.fees_in_cents, Cents::from(2500));
    assert_eq!(view.face_value, 1000.0);
    assert_eq!(view.status, AssetStatus::Draft);
    assert_eq!(view.bill_to_party_name.as_deref(), Some("Acme Corp"));
    assert_eq!(view.num_days_for_payment, 30);
    assert_eq!(view.asset.seller_id, seller.org_id);

    let notes = mkt.notifications.notifications(seller.id(), Some(Role::Seller), None).await.unwrap();
    assert_eq!(notes.notifications.len(), 1);
    assert_eq!(notes.notifications[0].notification_type, NotificationType::AssetCreated);
    mkt.tear_down().await;
}

#[tokio::test]
async fn duplicate_invoices_and_unknown_bill_to_parties_are_rejected() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    mkt.draft_asset(&seller, &btp, "INV-1").await;
    let req = asset_request("INV-1", btp.id, 10.0, days_from_today(30));
    let err = mkt.assets.create_asset(seller.id(), req, vec![]).await.unwrap_err();
    assert!(matches!(err, AssetApiError::DuplicateInvoice), "{err:?}");

    let req = asset_request("INV-2", btp.id + 100, 10.0, days_from_today(30));
    let err = mkt.assets.create_asset(seller.id(), req, vec![]).await.unwrap_err();
    assert!(matches!(err, AssetApiError::BillToPartyNotFound), "{err:?}");

    let buyer = mkt.buyer("bob").await;
    let req = asset_request("INV-3", btp.id, 10.0, days_from_today(30));
    let err = mkt.assets.create_asset(buyer.id(), req, vec![]).await.unwrap_err();
    assert!(matches!(err, AssetApiError::NotAnOrgMember(_)), "{err:?}");
    mkt.tear_down().await;
}

#[tokio::test]
async fn fee_approval_validation_and_posting() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    let view = mkt.draft_asset(&seller, &btp, "INV-7").await;
    let id = view.asset.id;

    let err = mkt.assets.post_asset(seller.id(), id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::FeeNotApproved), "{err:?}");

    let asset = mkt.assets.approve_fee(seller.id(), id).await.unwrap();
    assert!(asset.fee_approved_by_seller);
    assert!(asset.fee_approved_at.is_some());
    let token = asset.bill_to_party_validation_token.clone().expect("No validation token issued");
    let err = mkt.assets.approve_fee(seller.id(), id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::FeeAlreadyApproved), "{err:?}");

    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::SellerFeeConfirmation).len(), 1);
    let validation = mkt.mailer.last_of_kind(EmailKind::BillToPartyValidation).expect("No validation email");
    assert_eq!(validation.to, btp.email);
    assert!(validation.html.contains(&format!("{PUBLIC_URL}/api/validate-bill-to-party/{token}")));

    let status = mkt.assets.check_validation(seller.id(), id).await.unwrap();
    assert!(!status.validated_by_bill_to_party);
    let outcome = mkt.assets.validate_bill_to_party(&token).await.unwrap();
    assert!(outcome.was_redeemed());
    let outcome = mkt.assets.validate_bill_to_party(&token).await.unwrap();
    assert!(matches!(outcome, TokenOutcome::AlreadyRedeemed(_)));
    let status = mkt.assets.check_validation(seller.id(), id).await.unwrap();
    assert!(status.validated_by_bill_to_party);
    assert!(status.bill_to_party_validated_at.is_some());
    let err = mkt.assets.validate_bill_to_party("no-such-token").await.unwrap_err();
    assert!(matches!(err, AssetApiError::InvalidValidationToken), "{err:?}");

    let asset = mkt.assets.post_asset(seller.id(), id).await.unwrap();
    assert!(asset.is_posted);
    let err = mkt.assets.post_asset(seller.id(), id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::AlreadyPosted), "{err:?}");
    let err = mkt.assets.update_asset(seller.id(), id, UpdateAssetRequest::default()).await.unwrap_err();
    assert!(matches!(err, AssetApiError::NotEditable), "{err:?}");
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::AssetPosted).len(), 1);

    let notes = mkt.notifications.notifications(seller.id(), None, None).await.unwrap();
    let kinds = notes.notifications.iter().map(|n| n.notification_type).collect::<Vec<_>>();
    for kind in [
        NotificationType::AssetCreated,
        NotificationType::FeeApproved,
        NotificationType::BillToPartyValidated,
        NotificationType::AssetPosted,
    ] {
        assert_eq!(kinds.iter().filter(|k| **k == kind).count(), 1, "{kind:?} in {kinds:?}");
    }
    mkt.tear_down().await;
}

#[tokio::test]
async fn cancellation_conflicts() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    let view = mkt.draft_asset(&seller, &btp, "INV-9").await;
    let id = view.asset.id;

    let asset = mkt.assets.cancel_asset(seller.id(), id).await.unwrap();
    assert!(asset.is_cancelled);
    assert_eq!(asset.status(), AssetStatus::Cancelled);
    let err = mkt.assets.cancel_asset(seller.id(), id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::AlreadyCancelled), "{err:?}");
    let err = mkt.assets.approve_fee(seller.id(), id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::FeeApprovalOnCancelledAsset), "{err:?}");
    let err = mkt.assets.post_asset(seller.id(), id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::PostOnCancelledAsset), "{err:?}");
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::AssetCancelled).len(), 1);
    mkt.tear_down().await;
}

#[tokio::test]
async fn only_the_owner_may_change_an_asset() {
    let mkt = Marketplace::new().await;
    let owner = mkt.seller("sally").await;
    let other = mkt.seller("sam").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    let view = mkt.draft_asset(&owner, &btp, "INV-10").await;
    let err = mkt.assets.approve_fee(other.id(), view.asset.id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::Forbidden), "{err:?}");
    let err = mkt.assets.seller_asset(other.id(), view.asset.id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::Forbidden), "{err:?}");
    assert!(mkt.assets.seller_assets(other.id()).await.unwrap().is_empty());
    assert_eq!(mkt.assets.seller_assets(owner.id()).await.unwrap().len(), 1);
    let err = mkt.assets.seller_asset(owner.id(), 9999).await.unwrap_err();
    assert!(matches!(err, AssetApiError::AssetNotFound), "{err:?}");
    mkt.tear_down().await;
}

#[tokio::test]
async fn drafts_can_be_edited() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    let view = mkt.draft_asset(&seller, &btp, "INV-11").await;
    let req = UpdateAssetRequest { face_value: Some(1234.56), apy: Some(9.25), ..Default::default() };
    let updated = mkt.assets.update_asset(seller.id(), view.asset.id, req).await.unwrap();
    assert_eq!(updated.asset.face_value_in_cents, Cents::from(123_456));
    assert_eq!(updated.asset.apy, 9.25);
    assert_eq!(updated.asset.invoice_number, "INV-11");

    let req = UpdateAssetRequest { fees: Some(-1.0), ..Default::default() };
    let err = mkt.assets.update_asset(seller.id(), view.asset.id, req).await.unwrap_err();
    assert!(matches!(err, AssetApiError::ValidationError(_)), "{err:?}");
    mkt.tear_down().await;
}

#[tokio::test]
async fn documents_are_stored_and_access_controlled() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let buyer = mkt.buyer("bob").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    let req = asset_request("INV-DOC", btp.id, 500.0, days_from_today(45));
    let uploads = vec![(DocumentType::Invoice, pdf("invoice.pdf")), (DocumentType::BankStatement, pdf("bank.pdf"))];
    let view = mkt.assets.create_asset(seller.id(), req, uploads).await.unwrap();
    let id = view.asset.id;
    let invoice_path = view.asset.invoice_file_path.clone().expect("Invoice not stored");
    assert!(invoice_path.starts_with(&format!("uploads/assets/{id}/invoice_")));
    assert!(invoice_path.ends_with(".pdf"));
    assert!(view.asset.bill_to_party_history_file_path.is_none());
    assert_eq!(mkt.store.paths().len(), 2);

    let owner = session(seller.id(), Role::Seller);
    let docs = mkt.assets.documents(&owner, id).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].name, "Invoice_INV-DOC");
    assert_eq!(docs[1].name, "12 Months Bank Statement");
    let content = mkt.assets.document(&owner, id, &docs[0].file_name).await.unwrap();
    assert_eq!(content.content_type, "application/pdf");
    assert_eq!(content.data, b"%PDF-1.4 test".to_vec());

    let err = mkt.assets.document(&owner, id, "../secrets.pdf").await.unwrap_err();
    assert!(matches!(err, AssetApiError::InvalidFileName), "{err:?}");
    let err = mkt.assets.document(&owner, id, "other.pdf").await.unwrap_err();
    assert!(matches!(err, AssetApiError::DocumentNotFound), "{err:?}");

    // Buyers see documents only once the asset is posted
    let as_buyer = session(buyer.id(), Role::Buyer);
    let err = mkt.assets.documents(&as_buyer, id).await.unwrap_err();
    assert!(matches!(err, AssetApiError::Forbidden), "{err:?}");
    mkt.assets.approve_fee(seller.id(), id).await.unwrap();
    mkt.assets.post_asset(seller.id(), id).await.unwrap();
    assert_eq!(mkt.assets.documents(&as_buyer, id).await.unwrap().len(), 2);

    let admin = session(buyer.id(), Role::Admin);
    assert_eq!(mkt.assets.documents(&admin, id).await.unwrap().len(), 2);
    mkt.tear_down().await;
}

#[tokio::test]
async fn bad_uploads_are_rejected_before_anything_is_written() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    let exe = DocumentUpload {
        file_name: "payload.exe".into(),
        content_type: "application/x-msdownload".into(),
        data: vec![0x4d, 0x5a],
    };
    let req = asset_request("INV-BAD", btp.id, 500.0, days_from_today(45));
    let err = mkt.assets.create_asset(seller.id(), req, vec![(DocumentType::Invoice, exe)]).await.unwrap_err();
    assert!(matches!(err, AssetApiError::InvalidFileType), "{err:?}");
    assert!(mkt.assets.seller_assets(seller.id()).await.unwrap().is_empty());
    assert!(mkt.store.paths().is_empty());
    mkt.tear_down().await;
}

#[tokio::test]
async fn bill_to_party_is_fixed_once_the_fee_is_approved() {
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let acme = mkt.bill_to_party("Acme Corp").await;
    let globex = mkt.bill_to_party("Globex").await;
    let id = mkt.draft_asset(&seller, &acme, "INV-12").await.asset.id;

    let req = UpdateAssetRequest { bill_to_party_id: Some(globex.id), ..Default::default() };
    let view = mkt.assets.update_asset(seller.id(), id, req).await.unwrap();
    assert_eq!(view.asset.bill_to_party_id, globex.id);

    let asset = mkt.assets.approve_fee(seller.id(), id).await.unwrap();
    let token = asset.bill_to_party_validation_token.clone().expect("No validation token issued");
    let req = UpdateAssetRequest { bill_to_party_id: Some(acme.id), ..Default::default() };
    let err = mkt.assets.update_asset(seller.id(), id, req).await.unwrap_err();
    assert!(matches!(err, AssetApiError::BillToPartyLocked), "{err:?}");

    // Other fields stay editable, and naming the same bill-to party is not a change
    let req = UpdateAssetRequest { bill_to_party_id: Some(globex.id), apy: Some(7.5), ..Default::default() };
    let view = mkt.assets.update_asset(seller.id(), id, req).await.unwrap();
    assert_eq!(view.asset.apy, 7.5);
    assert_eq!(view.asset.bill_to_party_id, globex.id);
    assert_eq!(view.asset.bill_to_party_validation_token.as_deref(), Some(token.as_str()));
    let validation = mkt.mailer.last_of_kind(EmailKind::BillToPartyValidation).expect("No validation email");
    assert_eq!(validation.to, globex.email);
    mkt.tear_down().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fee_approvals_conflict() {
    let _ = env_logger::try_init();
    let mkt = Marketplace::new().await;
    let seller = mkt.seller("sally").await;
    let btp = mkt.bill_to_party("Acme Corp").await;
    for round in 0..5 {
        let id = mkt.draft_asset(&seller, &btp, &format!("INV-R{round}")).await.asset.id;
        let (first, second) =
            tokio::join!(mkt.assets.approve_fee(seller.id(), id), mkt.assets.approve_fee(seller.id(), id));
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "round {round}: {results:?}");
        let err = results.into_iter().find_map(Result::err).expect("One approval should lose");
        assert!(matches!(err, AssetApiError::FeeAlreadyApproved), "round {round}: {err:?}");
    }
    assert_eq!(mkt.mailer.sent_of_kind(EmailKind::BillToPartyValidation).len(), 5);
    mkt.tear_down().await;
}
