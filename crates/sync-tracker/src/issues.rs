//! Typed REST operations against the Tracker.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use sync_core::metadata::{CreateMetadata, FieldMeta, IssueTypeMeta};
use sync_core::types::{Attachment, Comment, IdName, ReleaseVersion, TrackerIssue};

use crate::client::{Result, TrackerClient, TrackerError};
use crate::reconstruct::reconstruct_custom_fields;

/// Fetch the create-metadata field catalog, optionally scoped to one
/// project.
pub async fn get_create_metadata(client: &TrackerClient, project_key: Option<&str>) -> Result<CreateMetadata> {
    let mut req = client.request(Method::GET, "issue/createmeta");
    req = req.query(&[("expand", "projects.issuetypes.fields")]);
    if let Some(key) = project_key {
        req = req.query(&[("projectKeys", key)]);
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
        return Err(TrackerError::Api {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    let body: Value = resp.json().await?;
    Ok(parse_create_metadata(&body))
}

fn parse_create_metadata(body: &Value) -> CreateMetadata {
    let mut meta = CreateMetadata::default();
    let Some(projects) = body.get("projects").and_then(Value::as_array) else {
        return meta;
    };

    for project in projects {
        let Some(project_key) = project.get("key").and_then(Value::as_str) else {
            continue;
        };
        let mut issue_types = BTreeMap::new();
        let Some(types) = project.get("issuetypes").and_then(Value::as_array) else {
            continue;
        };
        for t in types {
            let Some(id) = t.get("id").and_then(Value::as_str).and_then(|s| s.parse::<i64>().ok()) else {
                continue;
            };
            let name = t.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let mut fields = BTreeMap::new();
            if let Some(field_map) = t.get("fields").and_then(Value::as_object) {
                for (key, field) in field_map {
                    let required = field.get("required").and_then(Value::as_bool).unwrap_or(false);
                    let allowed_values = field
                        .get("allowedValues")
                        .and_then(Value::as_array)
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|v| {
                                    let id = v
                                        .get("id")
                                        .and_then(Value::as_str)
                                        .and_then(|s| s.parse::<i64>().ok())?;
                                    let name = v.get("value").or_else(|| v.get("name")).and_then(Value::as_str)?;
                                    Some(IdName { id, name: name.to_string() })
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    fields.insert(
                        key.clone(),
                        FieldMeta {
                            key: key.clone(),
                            required,
                            allowed_values,
                        },
                    );
                }
            }
            issue_types.insert(id, IssueTypeMeta { id, name, fields });
        }
        meta.projects.insert(project_key.to_string(), issue_types);
    }
    meta
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TrackerProject {
    pub key: String,
    pub name: String,
}

pub async fn list_projects(client: &TrackerClient) -> Result<Vec<TrackerProject>> {
    let resp = client.request(Method::GET, "project").send().await?;
    Ok(resp.json().await?)
}

pub async fn list_versions(client: &TrackerClient, project_key: &str) -> Result<Vec<ReleaseVersion>> {
    let resp = client
        .request(Method::GET, &format!("project/{project_key}/versions"))
        .send()
        .await?;
    let raw: Vec<Value> = resp.json().await?;
    Ok(raw.iter().map(parse_version).collect())
}

fn parse_version(v: &Value) -> ReleaseVersion {
    ReleaseVersion {
        hub_id: None,
        external_key: v.get("id").and_then(Value::as_str).map(str::to_string),
        name: v.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        version_number: v.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        active: !v.get("archived").and_then(Value::as_bool).unwrap_or(false),
        start_date: v
            .get("startDate")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc)),
        end_date: v
            .get("releaseDate")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc)),
        released: v.get("released").and_then(Value::as_bool),
        archived: v.get("archived").and_then(Value::as_bool),
    }
}

pub async fn list_components(client: &TrackerClient, project_key: &str) -> Result<Vec<String>> {
    let resp = client
        .request(Method::GET, &format!("project/{project_key}/components"))
        .send()
        .await?;
    let raw: Vec<Value> = resp.json().await?;
    Ok(raw
        .iter()
        .filter_map(|c| c.get("name").and_then(Value::as_str).map(str::to_string))
        .collect())
}

/// One page of a paginated JQL search: the engine pages until
/// fewer than `page_size` keys come back.
pub async fn search(
    client: &TrackerClient,
    jql: &str,
    start_at: u32,
    page_size: u32,
) -> Result<Vec<String>> {
    let resp = client
        .request(Method::GET, "search")
        .query(&[
            ("jql", jql),
            ("startAt", &start_at.to_string()),
            ("maxResults", &page_size.to_string()),
            ("fields", "key"),
        ])
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(TrackerError::Api {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }

    let body: Value = resp.json().await?;
    let keys = body
        .get("issues")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|i| i.get("key").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    Ok(keys)
}

/// Fetch the full record for one issue, including comments, attachments,
/// and dynamically-reconstructed custom fields.
pub async fn get_issue_by_key(
    client: &TrackerClient,
    key: &str,
    metadata: &CreateMetadata,
) -> Result<TrackerIssue> {
    let resp = client
        .request(Method::GET, &format!("issue/{key}"))
        .query(&[("expand", "renderedFields")])
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(TrackerError::Api {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }

    let body: Value = resp.json().await?;
    Ok(parse_issue(&body, metadata))
}

fn parse_id_name(v: &Value) -> Option<IdName> {
    let id = v.get("id")?.as_str()?.parse::<i64>().ok()?;
    let name = v.get("name")?.as_str()?.to_string();
    Some(IdName { id, name })
}

fn parse_timestamp(v: &Value, field: &str) -> Option<DateTime<Utc>> {
    v.get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn parse_issue(body: &Value, metadata: &CreateMetadata) -> TrackerIssue {
    let key = body.get("key").and_then(Value::as_str).unwrap_or_default().to_string();
    let fields = body.get("fields").and_then(Value::as_object).cloned().unwrap_or_default();

    let project_key = fields
        .get("project")
        .and_then(|p| p.get("key"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let issue_type = fields
        .get("issuetype")
        .and_then(parse_id_name)
        .unwrap_or(IdName { id: 0, name: String::new() });

    let comments = fields
        .get("comment")
        .and_then(|c| c.get("comments"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|c| Comment {
                    author_login: c
                        .get("author")
                        .and_then(|a| a.get("name"))
                        .and_then(Value::as_str)
                        .or_else(|| c.get("updateAuthor").and_then(|a| a.get("name")).and_then(Value::as_str))
                        .unwrap_or_default()
                        .to_string(),
                    body: c.get("body").and_then(Value::as_str).unwrap_or_default().to_string(),
                    created: parse_timestamp(c, "created").unwrap_or_else(Utc::now),
                })
                .collect()
        })
        .unwrap_or_default();

    let attachments = fields
        .get("attachment")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|a| {
                    let filename = a.get("filename").and_then(Value::as_str)?.to_string();
                    Some(Attachment::Url {
                        url: a.get("content").and_then(Value::as_str).unwrap_or_default().to_string(),
                        label: filename,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let components = fields
        .get("components")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|c| c.get("name").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let versions = fields
        .get("versions")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(parse_version).collect())
        .unwrap_or_default();
    let fix_versions = fields
        .get("fixVersions")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(parse_version).collect())
        .unwrap_or_default();

    let custom_fields = reconstruct_custom_fields(metadata, &project_key, issue_type.id, &fields);
    let fields_value = Value::Object(fields.clone());

    TrackerIssue {
        key,
        project_key,
        issue_type,
        status: fields.get("status").and_then(parse_id_name).unwrap_or(IdName { id: 0, name: String::new() }),
        priority: fields.get("priority").and_then(parse_id_name),
        resolution: fields.get("resolution").and_then(parse_id_name),
        reporter: fields
            .get("reporter")
            .and_then(|r| r.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        assignee: fields
            .get("assignee")
            .filter(|a| !a.is_null())
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string),
        summary: fields.get("summary").and_then(Value::as_str).unwrap_or_default().to_string(),
        description: fields.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
        environment: fields.get("environment").and_then(Value::as_str).map(str::to_string),
        created: parse_timestamp(&fields_value, "created").unwrap_or_else(Utc::now),
        updated: parse_timestamp(&fields_value, "updated").unwrap_or_else(Utc::now),
        due_date: parse_timestamp(&fields_value, "duedate"),
        resolution_date: parse_timestamp(&fields_value, "resolutiondate"),
        versions,
        fix_versions,
        components,
        attachments,
        comments,
        custom_fields,
        security_level_id: fields
            .get("security")
            .and_then(|s| s.get("id"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
    }
}

/// Create an issue from an already-shaped `fields` JSON object (produced by
/// `sync-transform`'s metadata-driven validator). Returns the assigned key.
pub async fn create_issue(client: &TrackerClient, fields: Value) -> Result<String> {
    let payload = json!({ "fields": fields });
    let resp = client.request(Method::POST, "issue").json(&payload).send().await?;

    if !resp.status().is_success() {
        return Err(TrackerError::Api {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }

    let body: Value = resp.json().await?;
    body.get("key")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TrackerError::Connectivity("create response missing key".into()))
}

pub async fn add_attachment(client: &TrackerClient, key: &str, filename: &str, bytes: Vec<u8>) -> Result<()> {
    let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
    let form = reqwest::multipart::Form::new().part("file", part);

    let resp = client
        .request(Method::POST, &format!("issue/{key}/attachments"))
        .header("X-Atlassian-Token", "nocheck")
        .multipart(form)
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(TrackerError::Api {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(())
}

pub async fn add_web_link(client: &TrackerClient, key: &str, url: &str, label: &str) -> Result<()> {
    let payload = json!({ "object": { "url": url, "title": label } });
    let resp = client
        .request(Method::POST, &format!("issue/{key}/remotelink"))
        .json(&payload)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(TrackerError::Api {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(())
}

pub async fn add_issue_link(
    client: &TrackerClient,
    link_type: &str,
    from_key: &str,
    to_key: &str,
    comment: Option<&str>,
) -> Result<()> {
    let mut payload = json!({
        "type": { "name": link_type },
        "inwardIssue": { "key": from_key },
        "outwardIssue": { "key": to_key },
    });
    if let Some(body) = comment {
        payload["comment"] = json!({ "body": body });
    }

    let resp = client.request(Method::POST, "issueLink").json(&payload).send().await?;
    if !resp.status().is_success() {
        return Err(TrackerError::Api {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(())
}

/// Create a Tracker version. Returns the assigned id.
pub async fn create_version(client: &TrackerClient, project_key: &str, version: &ReleaseVersion) -> Result<String> {
    let payload = json!({
        "project": project_key,
        "name": version.name,
        "archived": version.archived.unwrap_or(false),
        "released": version.released.unwrap_or(false),
        "startDate": version.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
        "releaseDate": version.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
    });
    let resp = client.request(Method::POST, "version").json(&payload).send().await?;
    if !resp.status().is_success() {
        return Err(TrackerError::Api {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    let body: Value = resp.json().await?;
    body.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TrackerError::Connectivity("version response missing id".into()))
}
