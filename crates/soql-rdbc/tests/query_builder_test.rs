//! Integration tests for the query builder

mod common;

use common::{connection, MockHttpClient};
use pretty_assertions::assert_eq;
use serde_json::json;
use soql_rdbc::http::HttpResponse;
use soql_rdbc::query_builder::QueryBuilder;
use soql_rdbc::throttle::HEADER;
use soql_rdbc::types::Value;

fn contacts_of_account() -> QueryBuilder {
    QueryBuilder::new()
        .select(["Id"])
        .from("Account")
        .join("Contact", &["Name"], "Id = :id", "")
        .unwrap()
        .set_max_results(1)
}

#[test]
fn test_execute_binds_numbers_unquoted() {
    let mock = MockHttpClient::new();
    let conn = connection(&mock);

    let result = contacts_of_account()
        .set_parameter("id", 123)
        .execute_query(&conn)
        .unwrap();

    assert_eq!(
        result.sql(),
        "SELECT Id, (SELECT Name FROM Contact WHERE Id = 123) FROM Account LIMIT 1"
    );
}

#[test]
fn test_execute_binds_strings_quoted_inside_join() {
    let mock = MockHttpClient::new();
    let conn = connection(&mock);

    let result = contacts_of_account()
        .set_parameter("id", "123")
        .execute_query(&conn)
        .unwrap();

    assert_eq!(
        result.sql(),
        "SELECT Id, (SELECT Name FROM Contact WHERE Id = '123') FROM Account LIMIT 1"
    );
}

#[tokio::test]
async fn test_fetch_runs_builder_statement() {
    let mock = MockHttpClient::new();
    mock.push(
        HttpResponse::new(
            200,
            json!({
                "done": true,
                "totalSize": 1,
                "records": [{
                    "attributes": {"type": "Account"},
                    "Id": "001",
                    "Contacts": {"totalSize": 1, "done": true, "records": [{"Name": "Jane"}]}
                }]
            })
            .to_string(),
        )
        .with_header(HEADER, "api-usage=1/100"),
    );

    let conn = connection(&mock);
    let rows = conn
        .create_query_builder()
        .select(["Id"])
        .from("Account")
        .join("Contacts", &["Name"], "Id = :id", "")
        .unwrap()
        .set_parameter("id", "123")
        .set_max_results(1)
        .execute_query(&conn)
        .unwrap()
        .fetch_all_associative()
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Contacts"]["records"][0]["Name"], json!("Jane"));
    assert_eq!(
        mock.requests()[0].url,
        "/services/data/v59.0/query?q=SELECT%20Id,%20(SELECT%20Name%20FROM%20Contacts%20WHERE%20Id%20=%20'123')%20FROM%20Account%20LIMIT%201"
    );
}

#[test]
fn test_encoded_parameter_survives_query_escaping() {
    let mock = MockHttpClient::new();
    let conn = connection(&mock);

    let result = QueryBuilder::new()
        .select(["Id"])
        .from("Contact")
        .where_("Phone = :phone")
        .set_parameter("phone", "+(000) 0000-0000")
        .execute_query(&conn)
        .unwrap();

    assert_eq!(
        result.sql(),
        "SELECT Id FROM Contact WHERE Phone = '%2B%28000%29+0000-0000'"
    );
    assert_eq!(
        soql_rdbc::http::escape_query(result.sql()),
        "SELECT%20Id%20FROM%20Contact%20WHERE%20Phone%20=%20'%2B%28000%29+0000-0000'"
    );
}

#[test]
fn test_list_parameter() {
    let mock = MockHttpClient::new();
    let conn = connection(&mock);

    let result = QueryBuilder::new()
        .select(["Id"])
        .from("Contact")
        .where_("Id IN (:ids)")
        .set_parameter("ids", Value::from(vec!["003A", "003B"]))
        .execute_query(&conn)
        .unwrap();

    assert_eq!(
        result.sql(),
        "SELECT Id FROM Contact WHERE Id IN ('003A', '003B')"
    );
}
