//! End-to-end checks of the funnel rules, import validation, and response
//! envelope shape through the crate's public API.

use chrono::Utc;
use crmserver::core::error::ApiError;
use crmserver::core::shared::enums::{Currency, LeadSource, LeadStatus, LeadType};
use crmserver::core::shared::{ApiResponse, Pagination};
use crmserver::leads::import::{validate_row, ImportRow};
use crmserver::leads::{apply_transition, Lead, TransitionOutcome};
use uuid::Uuid;

fn new_lead() -> Lead {
    let now = Utc::now();
    Lead {
        id: Uuid::new_v4(),
        name: "Globex".to_string(),
        email: "buyer@globex.com".to_string(),
        phone: None,
        company: Some("Globex".to_string()),
        source: LeadSource::Referral,
        status: LeadStatus::Open,
        lead_type: LeadType::Hot,
        assigned_to: None,
        location: None,
        preferred_language: "English".to_string(),
        notes: None,
        value: 1200.0,
        currency: Currency::Usd,
        tags: vec!["enterprise".to_string()],
        scheduled_call_date: None,
        scheduled_call_type: None,
        scheduled_call_notes: None,
        assigned_date: None,
        closed_date: None,
        last_contact: None,
        next_follow_up: None,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn full_funnel_walk_closes_exactly_once() {
    let mut lead = new_lead();
    let steps = [
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::Proposal,
        LeadStatus::Negotiation,
    ];
    for step in steps {
        let outcome = apply_transition(&mut lead, step, Utc::now()).unwrap();
        assert_eq!(outcome, TransitionOutcome::Moved);
        assert!(lead.closed_date.is_none());
    }

    let closed_at = Utc::now();
    assert_eq!(
        apply_transition(&mut lead, LeadStatus::Closed, closed_at).unwrap(),
        TransitionOutcome::Terminal
    );
    assert_eq!(lead.closed_date, Some(closed_at));

    // No transition out of a terminal state, and the close date stays put.
    for target in [
        LeadStatus::Open,
        LeadStatus::Contacted,
        LeadStatus::Lost,
    ] {
        assert!(matches!(
            apply_transition(&mut lead, target, Utc::now()),
            Err(ApiError::IllegalTransition { .. })
        ));
    }
    assert_eq!(lead.closed_date, Some(closed_at));
}

#[test]
fn import_batch_counts_match_row_outcomes() {
    // 5 rows, 2 invalid: successCount would be N - M once duplicates are
    // checked against the store by the handler.
    let rows = vec![
        ("Acme", "a@x.com"),
        ("", "missing-name@x.com"),
        ("Globex", "g@x.com"),
        ("No Email", ""),
        ("Initech", "i@x.com"),
    ];

    let mut ok = 0;
    let mut failed = Vec::new();
    for (i, (name, email)) in rows.iter().enumerate() {
        let row = ImportRow {
            name: (!name.is_empty()).then(|| name.to_string()),
            email: (!email.is_empty()).then(|| email.to_string()),
            ..Default::default()
        };
        match validate_row(i + 1, &row) {
            Ok(_) => ok += 1,
            Err(e) => failed.push(e),
        }
    }

    assert_eq!(ok, 3);
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0], "Row 2: Name and email are required");
    assert_eq!(failed[1], "Row 4: Name and email are required");
}

#[test]
fn envelope_serializes_to_the_documented_shape() {
    let body = ApiResponse::paginated(vec![1, 2, 3], Pagination::new(2, 10, 25));
    let json = serde_json::to_value(&body).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
    assert_eq!(json["pagination"]["currentPage"], 2);
    assert_eq!(json["pagination"]["totalPages"], 3);
    assert_eq!(json["pagination"]["totalItems"], 25);
    assert_eq!(json["pagination"]["itemsPerPage"], 10);
    assert_eq!(json["pagination"]["hasNextPage"], true);
    assert_eq!(json["pagination"]["hasPrevPage"], true);
    // Absent fields are omitted, not null.
    assert!(json.get("message").is_none());
    assert!(json.get("errors").is_none());
}

#[test]
fn lead_serializes_with_api_field_names() {
    let lead = new_lead();
    let json = serde_json::to_value(&lead).unwrap();

    assert_eq!(json["status"], "open");
    assert_eq!(json["type"], "hot");
    assert_eq!(json["source"], "Referral");
    assert_eq!(json["currency"], "USD");
    assert_eq!(json["preferredLanguage"], "English");
    assert!(json["assignedTo"].is_null());
}
