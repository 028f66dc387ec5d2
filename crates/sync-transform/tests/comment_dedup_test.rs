//! When a Tracker issue's comments are folded into a Hub artifact, any
//! comment whose body already exists on the Hub side must not be
//! duplicated — only genuinely new bodies come through.

use sync_core::enums::HubProjectCatalog;
use sync_core::types::{Comment, IdName, TrackerIssue};
use sync_transform::{tracker_issue_to_hub_incident, IncidentDefaults};

fn issue_with_comments(bodies: &[&str]) -> TrackerIssue {
    TrackerIssue {
        key: "DEMO-7".into(),
        project_key: "DEMO".into(),
        issue_type: IdName { id: 1, name: "Bug".into() },
        status: IdName { id: 1, name: "Open".into() },
        priority: None,
        resolution: None,
        reporter: "alice".into(),
        assignee: None,
        summary: "Login crash".into(),
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
        comments: bodies
            .iter()
            .map(|body| Comment { author_login: "bob".into(), body: body.to_string(), created: chrono::Utc::now() })
            .collect(),
        custom_fields: Default::default(),
        security_level_id: None,
    }
}

#[test]
fn only_the_unseen_comment_body_is_added() {
    let issue = issue_with_comments(&["fixed", "verified"]);
    let existing = vec![Comment { author_login: "alice".into(), body: "fixed".into(), created: chrono::Utc::now() }];
    let catalog = HubProjectCatalog::default();
    let defaults = IncidentDefaults { opener_id: 1, owner_id: None, detected_release_id: None, resolved_release_id: None };

    let incident = tracker_issue_to_hub_incident(&issue, &catalog, 7, defaults, &existing);

    assert_eq!(incident.comments.len(), 2);
    assert_eq!(incident.comments[0].body, "fixed");
    assert_eq!(incident.comments[1].body, "verified");
}

#[test]
fn no_new_comments_when_every_body_already_exists() {
    let issue = issue_with_comments(&["fixed"]);
    let existing = vec![Comment { author_login: "alice".into(), body: "fixed".into(), created: chrono::Utc::now() }];
    let catalog = HubProjectCatalog::default();
    let defaults = IncidentDefaults { opener_id: 1, owner_id: None, detected_release_id: None, resolved_release_id: None };

    let incident = tracker_issue_to_hub_incident(&issue, &catalog, 7, defaults, &existing);
    assert_eq!(incident.comments.len(), 1);
}
