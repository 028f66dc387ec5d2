//! A pulled Tracker issue whose status/type have no enum mapping falls back
//! to the documented default status/type ids instead of failing the pull.

use sync_core::enums::HubProjectCatalog;
use sync_core::types::{
    Comment, IdName, TrackerIssue, DEFAULT_REQUIREMENT_STATUS_ID, DEFAULT_REQUIREMENT_TYPE_ID,
};
use sync_transform::{tracker_issue_to_hub_requirement, IncidentDefaults};

fn requirement_issue() -> TrackerIssue {
    TrackerIssue {
        key: "DEMO-11".into(),
        project_key: "DEMO".into(),
        issue_type: IdName { id: 7, name: "Story".into() },
        status: IdName { id: 3, name: "Unmapped Status".into() },
        priority: None,
        resolution: None,
        reporter: "alice".into(),
        assignee: None,
        summary: "Add a reporting dashboard".into(),
        description: String::new(),
        environment: None,
        created: chrono::Utc::now(),
        updated: chrono::Utc::now(),
        due_date: None,
        resolution_date: None,
        versions: vec![],
        fix_versions: vec![],
        components: vec![],
        attachments: vec![],
        comments: vec![],
        custom_fields: Default::default(),
        security_level_id: None,
    }
}

#[test]
fn unmapped_status_and_type_default_on_pull() {
    let issue = requirement_issue();
    let catalog = HubProjectCatalog::default();
    let defaults = IncidentDefaults { opener_id: 1, owner_id: None, detected_release_id: None, resolved_release_id: None };

    let requirement = tracker_issue_to_hub_requirement(&issue, &catalog, 7, defaults, &[]);

    assert_eq!(requirement.status_id, DEFAULT_REQUIREMENT_STATUS_ID);
    assert_eq!(requirement.requirement_type_id, DEFAULT_REQUIREMENT_TYPE_ID);
    assert_eq!(requirement.name, "Add a reporting dashboard");
}

#[test]
fn mapped_status_and_type_are_not_defaulted() {
    let issue = requirement_issue();
    let mut catalog = HubProjectCatalog::default();
    catalog.requirement_status = sync_core::enums::EnumMapping::from_pairs([(9, "Unmapped Status".to_string())]);
    catalog.requirement_type = sync_core::enums::EnumMapping::from_pairs([(2, "Story".to_string())]);
    let defaults = IncidentDefaults { opener_id: 1, owner_id: None, detected_release_id: None, resolved_release_id: None };

    let requirement = tracker_issue_to_hub_requirement(&issue, &catalog, 7, defaults, &[]);

    assert_eq!(requirement.status_id, 9);
    assert_eq!(requirement.requirement_type_id, 2);
}

#[test]
fn requirement_keeps_comments_not_already_present() {
    let mut issue = requirement_issue();
    issue.comments = vec![
        Comment { author_login: "bob".into(), body: "needs a mockup".into(), created: chrono::Utc::now() },
    ];
    let catalog = HubProjectCatalog::default();
    let defaults = IncidentDefaults { opener_id: 1, owner_id: None, detected_release_id: None, resolved_release_id: None };

    let requirement = tracker_issue_to_hub_requirement(&issue, &catalog, 7, defaults, &[]);
    assert_eq!(requirement.comments.len(), 1);
    assert_eq!(requirement.comments[0].body, "needs a mockup");
}
