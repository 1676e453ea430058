use assert_matches::assert_matches;
use serde_json::json;

use delivery_toolkit::client::Method;
use delivery_toolkit::config::Endpoints;
use delivery_toolkit::domain::{Environment, WorkspaceRef};
use delivery_toolkit::error::DeliveryError;
use delivery_toolkit::table::{Table, read_table};
use delivery_toolkit::templates;

fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
    Table::from_rows(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
    )
}

fn endpoints() -> Endpoints {
    Endpoints::for_environment(Environment::Prod)
}

#[test]
fn entity_upsert_builds_operations_and_chunks() {
    let input = table(
        &["entity:sample_id", "participant", "files", "note"],
        &[
            &["S1", "P1", r#""gs://b/1.bam", "gs://b/1.bai""#, ""],
            &["S2", "P2", "gs://b/2.bam", "ok"],
            &["S3", "P3", "", ""],
        ],
    );
    let workspace: WorkspaceRef = "ns/ws".parse().unwrap();
    let prepared = templates::entity_upsert(&endpoints(), &workspace, &input, 2).unwrap();

    assert_eq!(prepared.len(), 2);
    assert_eq!(prepared[0].records, vec!["S1", "S2"]);
    assert_eq!(prepared[1].records, vec!["S3"]);
    assert_eq!(prepared[0].request.method, Method::Post);
    assert_eq!(
        prepared[0].request.url,
        "https://api.firecloud.org/api/workspaces/ns/ws/entities/batchUpsert"
    );

    let body = prepared[0].request.body.as_ref().unwrap();
    assert_eq!(
        body[0],
        json!({
            "name": "S1",
            "entityType": "sample",
            "operations": [
                {"op": "AddUpdateAttribute", "attributeName": "participant", "addUpdateAttribute": "P1"},
                {"op": "RemoveAttribute", "attributeName": "files"},
                {"op": "CreateAttributeValueList", "attributeName": "files"},
                {"op": "AddListMember", "attributeListName": "files", "newMember": "gs://b/1.bam"},
                {"op": "AddListMember", "attributeListName": "files", "newMember": "gs://b/1.bai"},
            ],
        })
    );
    assert_eq!(body[1]["operations"].as_array().unwrap().len(), 3);
}

#[test]
fn entity_upsert_rejects_bad_header() {
    let input = table(&["sample", "x"], &[&["S1", "1"]]);
    let workspace: WorkspaceRef = "ns/ws".parse().unwrap();
    assert_matches!(
        templates::entity_upsert(&endpoints(), &workspace, &input, 10),
        Err(DeliveryError::InvalidEntityHeader(_))
    );
}

#[test]
fn acl_rows_are_grouped_per_workspace() {
    let input = table(
        &["workspace", "email", "access_level", "can_share"],
        &[
            &["ns/a", "one@example.org", "reader", ""],
            &["ns/b", "two@example.org", "WRITER", "yes"],
            &["ns/a", r#""three@example.org", "four@example.org""#, "owner", "true"],
        ],
    );
    let prepared = templates::workspace_acl(&endpoints(), &input, true).unwrap();

    assert_eq!(prepared.len(), 2);
    assert_eq!(
        prepared[0].records,
        vec![
            "ns/a:one@example.org",
            "ns/a:three@example.org,four@example.org"
        ]
    );
    assert_eq!(prepared[0].request.method, Method::Patch);
    assert_eq!(
        prepared[0].request.url,
        "https://api.firecloud.org/api/workspaces/ns/a/acl?inviteUsersNotFound=true"
    );
    let acl = prepared[0].request.body.as_ref().unwrap().as_array().unwrap();
    assert_eq!(acl.len(), 3);
    assert_eq!(
        acl[2],
        json!({"email": "four@example.org", "accessLevel": "OWNER", "canShare": true, "canCompute": false})
    );
    assert_eq!(prepared[1].records, vec!["ns/b:two@example.org"]);
}

#[test]
fn acl_splits_comma_separated_email_cell_from_csv() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("acl.csv");
    std::fs::write(
        &path,
        "workspace,email,access_level\nns/a,\"x@example.org, y@example.org\",READER\n",
    )
    .unwrap();
    let input = read_table(&path).unwrap();

    let prepared = templates::workspace_acl(&endpoints(), &input, false).unwrap();
    assert_eq!(prepared.len(), 1);
    assert_eq!(prepared[0].records, vec!["ns/a:x@example.org,y@example.org"]);
    let acl = prepared[0].request.body.as_ref().unwrap().as_array().unwrap();
    assert_eq!(acl.len(), 2);
    assert_eq!(acl[0]["email"], "x@example.org");
    assert_eq!(acl[1]["email"], "y@example.org");
}

#[test]
fn entity_attribute_keeps_unquoted_commas() {
    let input = table(&["entity:sample_id", "note"], &[&["S1", "low depth, rerun"]]);
    let workspace: WorkspaceRef = "ns/ws".parse().unwrap();
    let prepared = templates::entity_upsert(&endpoints(), &workspace, &input, 10).unwrap();
    let body = prepared[0].request.body.as_ref().unwrap();
    assert_eq!(
        body[0]["operations"],
        json!([{"op": "AddUpdateAttribute", "attributeName": "note", "addUpdateAttribute": "low depth, rerun"}])
    );
}

#[test]
fn acl_email_cell_of_only_commas_is_missing() {
    let input = table(&["workspace", "email", "access_level"], &[&["ns/a", " , ", "READER"]]);
    assert_matches!(
        templates::workspace_acl(&endpoints(), &input, false),
        Err(DeliveryError::MissingValue { row: 2, ref column }) if column == "email"
    );
}

#[test]
fn acl_requires_columns() {
    let input = table(&["workspace", "email"], &[&["ns/a", "x@example.org"]]);
    assert_matches!(
        templates::workspace_acl(&endpoints(), &input, false),
        Err(DeliveryError::MissingColumn(column)) if column == "access_level"
    );
}

#[test]
fn acl_reports_row_of_missing_value() {
    let input = table(
        &["workspace", "email", "access_level"],
        &[&["ns/a", "x@example.org", "READER"], &["ns/a", "", "READER"]],
    );
    assert_matches!(
        templates::workspace_acl(&endpoints(), &input, false),
        Err(DeliveryError::MissingValue { row: 3, .. })
    );
}

#[test]
fn snapshot_members_default_to_reader_policy() {
    let input = table(
        &["snapshot_id", "email", "policy"],
        &[&["abc-123", "a@example.org", ""], &["def-456", "b@example.org", "steward"]],
    );
    let prepared = templates::snapshot_members(&endpoints(), &input).unwrap();
    assert_eq!(
        prepared[0].request.url,
        "https://data.terra.bio/api/repository/v1/snapshots/abc-123/policies/reader/members"
    );
    assert_eq!(prepared[0].request.body, Some(json!({"email": "a@example.org"})));
    assert_eq!(prepared[1].records, vec!["def-456:steward:b@example.org"]);
}

#[test]
fn object_checks_parse_uris() {
    let input = table(&["uri"], &[&["gs://bucket/a/b.cram"], &["s3://nope/x"]]);
    assert_matches!(
        templates::object_checks(&endpoints(), &input),
        Err(DeliveryError::InvalidObjectUri(_))
    );

    let input = table(&["uri"], &[&["gs://bucket/a/b.cram"]]);
    let prepared = templates::object_checks(&endpoints(), &input).unwrap();
    assert_eq!(prepared[0].request.method, Method::Get);
    assert!(
        prepared[0]
            .request
            .url
            .starts_with("https://storage.googleapis.com/storage/v1/b/bucket/o/a%2Fb.cram?")
    );
    assert_eq!(prepared[0].records, vec!["gs://bucket/a/b.cram"]);
}

#[test]
fn warehouse_queries_use_label_or_row() {
    let input = table(
        &["project", "query", "label"],
        &[
            &["proj-1", "SELECT 1", "smoke"],
            &["proj-2", "SELECT 2", ""],
        ],
    );
    let prepared = templates::warehouse_queries(&endpoints(), &input).unwrap();
    assert_eq!(prepared[0].records, vec!["smoke"]);
    assert_eq!(prepared[1].records, vec!["proj-2:row 3"]);
    assert_eq!(
        prepared[1].request.url,
        "https://bigquery.googleapis.com/bigquery/v2/projects/proj-2/queries"
    );
    assert_eq!(
        prepared[1].request.body,
        Some(json!({"query": "SELECT 2", "useLegacySql": false}))
    );
}
