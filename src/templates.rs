//! Fixed request templates, one per delivery operation.
//!
//! Each builder turns validated table records into [`PreparedRequest`]s. Any
//! malformed row fails the whole build before a single call is made.

use reqwest::Url;
use serde_json::{Value, json};

use crate::client::{ApiRequest, Method};
use crate::config::Endpoints;
use crate::domain::{AccessLevel, EntityHeader, ObjectUri, Service, WorkspaceRef, parse_bool};
use crate::error::DeliveryError;
use crate::normalize::{is_list_literal, normalize_cell, normalize_delimited};
use crate::submit::PreparedRequest;
use crate::table::{Record, Table};

pub const ACL_COLUMNS: &[&str] = &["workspace", "email", "access_level"];
pub const SNAPSHOT_COLUMNS: &[&str] = &["snapshot_id", "email"];
pub const OBJECT_COLUMNS: &[&str] = &["uri"];
pub const QUERY_COLUMNS: &[&str] = &["project", "query"];

pub fn service_url(
    endpoints: &Endpoints,
    service: Service,
    segments: &[&str],
    query: &[(&str, &str)],
) -> Result<String, DeliveryError> {
    let base = endpoints.base(service);
    let mut url = Url::parse(base)
        .map_err(|err| DeliveryError::InvalidConfig(format!("{service} endpoint {base}: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| DeliveryError::InvalidConfig(format!("{service} endpoint {base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url.to_string())
}

/// Batch upsert of an entity table whose first column is `entity:<type>_id`.
pub fn entity_upsert(
    endpoints: &Endpoints,
    workspace: &WorkspaceRef,
    table: &Table,
    batch_size: usize,
) -> Result<Vec<PreparedRequest>, DeliveryError> {
    let id_column = table
        .headers
        .first()
        .ok_or_else(|| DeliveryError::MissingColumn("entity:<type>_id".to_string()))?;
    let header: EntityHeader = id_column.parse()?;

    let entities = table
        .records
        .iter()
        .map(|record| -> Result<(String, Value), DeliveryError> {
            let name = record.require(id_column)?;
            let operations = attribute_operations(record, id_column);
            Ok((
                name.to_string(),
                json!({
                    "name": name,
                    "entityType": header.entity_type(),
                    "operations": operations,
                }),
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let url = service_url(
        endpoints,
        Service::Workspace,
        &[
            "api",
            "workspaces",
            workspace.namespace(),
            workspace.name(),
            "entities",
            "batchUpsert",
        ],
        &[],
    )?;

    Ok(entities
        .chunks(batch_size.max(1))
        .map(|chunk| PreparedRequest {
            records: chunk.iter().map(|(name, _)| name.clone()).collect(),
            request: ApiRequest {
                method: Method::Post,
                service: Service::Workspace,
                url: url.clone(),
                body: Some(Value::Array(
                    chunk.iter().map(|(_, entity)| entity.clone()).collect(),
                )),
            },
        })
        .collect())
}

fn attribute_operations(record: &Record, id_column: &str) -> Vec<Value> {
    let mut operations = Vec::new();
    for (column, value) in &record.values {
        if column == id_column || value.trim().is_empty() {
            continue;
        }
        if is_list_literal(value) {
            operations.push(json!({"op": "RemoveAttribute", "attributeName": column}));
            operations.push(json!({"op": "CreateAttributeValueList", "attributeName": column}));
            for member in normalize_cell(value) {
                operations.push(json!({
                    "op": "AddListMember",
                    "attributeListName": column,
                    "newMember": member,
                }));
            }
        } else {
            operations.push(json!({
                "op": "AddUpdateAttribute",
                "attributeName": column,
                "addUpdateAttribute": value.trim(),
            }));
        }
    }
    operations
}

/// One ACL patch per workspace, in the order workspaces first appear.
pub fn workspace_acl(
    endpoints: &Endpoints,
    table: &Table,
    invite_users_not_found: bool,
) -> Result<Vec<PreparedRequest>, DeliveryError> {
    table.require_columns(ACL_COLUMNS)?;

    let mut groups: Vec<(WorkspaceRef, Vec<String>, Vec<Value>)> = Vec::new();
    for record in &table.records {
        let workspace: WorkspaceRef = record.require("workspace")?.parse()?;
        let emails = normalize_delimited(record.require("email")?);
        if emails.is_empty() {
            return Err(DeliveryError::MissingValue {
                row: record.row,
                column: "email".to_string(),
            });
        }
        let access_level: AccessLevel = record.require("access_level")?.parse()?;
        let can_share = optional_bool(record, "can_share")?;
        let can_compute = optional_bool(record, "can_compute")?;

        let label = format!("{workspace}:{}", emails.join(","));
        let entries = emails.iter().map(|email| {
            json!({
                "email": email,
                "accessLevel": access_level.as_str(),
                "canShare": can_share,
                "canCompute": can_compute,
            })
        });

        match groups.iter_mut().find(|(ws, _, _)| *ws == workspace) {
            Some((_, labels, acl)) => {
                labels.push(label);
                acl.extend(entries);
            }
            None => {
                let acl = entries.collect();
                groups.push((workspace, vec![label], acl));
            }
        }
    }

    let invite = if invite_users_not_found { "true" } else { "false" };
    groups
        .into_iter()
        .map(|(workspace, records, acl)| -> Result<PreparedRequest, DeliveryError> {
            let url = service_url(
                endpoints,
                Service::Workspace,
                &["api", "workspaces", workspace.namespace(), workspace.name(), "acl"],
                &[("inviteUsersNotFound", invite)],
            )?;
            Ok(PreparedRequest {
                records,
                request: ApiRequest {
                    method: Method::Patch,
                    service: Service::Workspace,
                    url,
                    body: Some(Value::Array(acl)),
                },
            })
        })
        .collect()
}

fn optional_bool(record: &Record, column: &str) -> Result<bool, DeliveryError> {
    match record.get(column) {
        Some(value) => parse_bool(column, value),
        None => Ok(false),
    }
}

pub fn snapshot_members(
    endpoints: &Endpoints,
    table: &Table,
) -> Result<Vec<PreparedRequest>, DeliveryError> {
    table.require_columns(SNAPSHOT_COLUMNS)?;
    table
        .records
        .iter()
        .map(|record| -> Result<PreparedRequest, DeliveryError> {
            let snapshot_id = record.require("snapshot_id")?;
            let email = record.require("email")?;
            let policy = record
                .get("policy")
                .map(str::trim)
                .filter(|policy| !policy.is_empty())
                .unwrap_or("reader");
            let url = service_url(
                endpoints,
                Service::Datarepo,
                &[
                    "api",
                    "repository",
                    "v1",
                    "snapshots",
                    snapshot_id,
                    "policies",
                    policy,
                    "members",
                ],
                &[],
            )?;
            Ok(PreparedRequest::single(
                format!("{snapshot_id}:{policy}:{email}"),
                ApiRequest {
                    method: Method::Post,
                    service: Service::Datarepo,
                    url,
                    body: Some(json!({ "email": email })),
                },
            ))
        })
        .collect()
}

pub fn object_checks(
    endpoints: &Endpoints,
    table: &Table,
) -> Result<Vec<PreparedRequest>, DeliveryError> {
    table.require_columns(OBJECT_COLUMNS)?;
    table
        .records
        .iter()
        .map(|record| -> Result<PreparedRequest, DeliveryError> {
            let uri: ObjectUri = record.require("uri")?.parse()?;
            let url = service_url(
                endpoints,
                Service::Storage,
                &["storage", "v1", "b", uri.bucket(), "o", uri.object()],
                &[("fields", "name,size,updated")],
            )?;
            Ok(PreparedRequest::single(
                uri.to_string(),
                ApiRequest {
                    method: Method::Get,
                    service: Service::Storage,
                    url,
                    body: None,
                },
            ))
        })
        .collect()
}

pub fn warehouse_queries(
    endpoints: &Endpoints,
    table: &Table,
) -> Result<Vec<PreparedRequest>, DeliveryError> {
    table.require_columns(QUERY_COLUMNS)?;
    table
        .records
        .iter()
        .map(|record| -> Result<PreparedRequest, DeliveryError> {
            let project = record.require("project")?;
            let query = record.require("query")?;
            let label = record
                .get("label")
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{project}:row {}", record.row));
            let url = service_url(
                endpoints,
                Service::Warehouse,
                &["bigquery", "v2", "projects", project, "queries"],
                &[],
            )?;
            Ok(PreparedRequest::single(
                label,
                ApiRequest {
                    method: Method::Post,
                    service: Service::Warehouse,
                    url,
                    body: Some(json!({ "query": query, "useLegacySql": false })),
                },
            ))
        })
        .collect()
}
