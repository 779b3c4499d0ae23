use crate::common::{self, MockTransport, SERVICE_URI};
use odata_client::api::HttpMethod;
use odata_client::api::models::SerializeMode;
use odata_client::{
    Argument, Entity, Error, Invocation, SaveResult, Service, ServiceOptions, UpdateMethod,
};
use serde_json::json;
use rust_decimal::Decimal;
use std::str::FromStr;

fn new_product(service: &Service) -> Entity {
    let descriptor = service.registry().resolve("Product").unwrap();
    Entity::new(descriptor)
        .with("Name", "Widget")
        .unwrap()
        .with("Price", Decimal::from_str("9.99").unwrap())
        .unwrap()
}

fn fetch_category(service: &mut Service, transport: &MockTransport) -> Entity {
    transport.respond(200, common::CATEGORY);
    service.collection_with_key("Categories", 1);
    service.execute().unwrap().into_entities().remove(0)
}

fn fetch_products(service: &mut Service, transport: &MockTransport) -> Vec<Entity> {
    transport.respond(200, common::CATEGORY_PRODUCTS);
    service.collection("Products");
    service.execute().unwrap().into_entities()
}

fn batch_response(parts: &[(u32, &str, &str)]) -> String {
    let mut body = String::from(
        "--batchresponse_1\r\nContent-Type: multipart/mixed; boundary=changesetresponse_1\r\n\r\n",
    );
    for (content_id, status_line, part_body) in parts {
        body.push_str("--changesetresponse_1\r\n");
        body.push_str("Content-Type: application/http\r\n");
        body.push_str("Content-Transfer-Encoding: binary\r\n");
        body.push_str(&format!("Content-ID: {}\r\n\r\n", content_id));
        body.push_str(&format!("HTTP/1.1 {}\r\n", status_line));
        body.push_str("Content-Type: application/atom+xml;charset=utf-8\r\n\r\n");
        body.push_str(part_body);
        body.push_str("\r\n");
    }
    body.push_str("--changesetresponse_1--\r\n--batchresponse_1--\r\n");
    body
}

#[test]
fn test_single_add_marks_instance_tracked() {
    let (mut service, transport) = common::service();
    let product = new_product(&service);
    assert!(!product.is_tracked());

    service.add_to("Products", &product).unwrap();
    assert_eq!(service.pending_operations().len(), 1);

    transport.respond(201, common::PRODUCT_CREATED);
    let result = service.save_changes().unwrap().unwrap();

    let request = transport.last_request();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, format!("{}/Products", SERVICE_URI));
    assert_eq!(request.header_value("Content-Type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["Name"], "Widget");
    assert_eq!(body["Price"], "9.99");

    let added = result.as_entity().unwrap();
    assert!(added.ptr_eq(&product));
    assert!(product.is_tracked());
    assert_eq!(
        product.uri().as_deref(),
        Some("http://test.local/OData.svc/Products(9)")
    );
    assert_eq!(product.get("ID"), Some(odata_client::Value::Int(9)));
    assert!(service.pending_operations().is_empty());
}

#[test]
fn test_update_uses_configured_method() {
    let (mut service, transport) =
        common::open_service(ServiceOptions::new().update_method(UpdateMethod::Merge));
    let category = fetch_category(&mut service, &transport);
    category.set("Name", "Drinks").unwrap();

    service.update_object(&category).unwrap();
    transport.respond(204, "");
    let result = service.save_changes().unwrap().unwrap();
    assert!(matches!(result, SaveResult::Succeeded(true)));

    let request = transport.last_request();
    assert_eq!(request.method, HttpMethod::Merge);
    assert_eq!(request.url, format!("{}/Categories(1)", SERVICE_URI));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["__metadata"]["uri"], format!("{}/Categories(1)", SERVICE_URI));
    assert_eq!(body["Name"], "Drinks");
}

const PRODUCT_NAME_ONLY: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<entry xml:base="http://test.local/OData.svc/" xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata" xmlns="http://www.w3.org/2005/Atom">
  <id>http://test.local/OData.svc/Products(0)</id>
  <title type="text">Bread</title>
  <category term="ODataDemo.Product" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme" />
  <content type="application/xml">
    <m:properties />
  </content>
</entry>"#;

#[test]
fn test_merge_of_partially_loaded_entity_sends_only_loaded_fields() {
    let (mut service, transport) =
        common::open_service(ServiceOptions::new().update_method(UpdateMethod::Merge));
    transport.respond(200, PRODUCT_NAME_ONLY);
    service
        .collection_with_key("Products", 0)
        .select(["Name"])
        .unwrap();
    let bread = service.execute().unwrap().into_entities().remove(0);
    assert!(!bread.is_loaded("Price"));

    bread.set("Name", "Rye bread").unwrap();
    service.update_object(&bread).unwrap();
    transport.respond(204, "");
    service.save_changes().unwrap();

    let request = transport.last_request();
    assert_eq!(request.method, HttpMethod::Merge);
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(
        body,
        json!({
            "__metadata": { "uri": "http://test.local/OData.svc/Products(0)" },
            "Name": "Rye bread"
        })
    );
}

#[test]
fn test_add_leaves_out_unset_properties() {
    let (mut service, transport) = common::service();
    let descriptor = service.registry().resolve("Product").unwrap();
    let product = Entity::new(descriptor).with("Name", "Milk").unwrap();

    service.add_to("Products", &product).unwrap();
    transport.respond(201, common::PRODUCT_CREATED);
    service.save_changes().unwrap();

    let body: serde_json::Value =
        serde_json::from_str(transport.last_request().body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({ "Name": "Milk" }));
}

#[test]
fn test_parsed_entries_reserialize_every_scalar() {
    let (mut service, transport) = common::service();

    let category = fetch_category(&mut service, &transport);
    assert_eq!(
        category.to_json(SerializeMode::Update),
        json!({
            "__metadata": { "uri": "http://test.local/OData.svc/Categories(1)" },
            "ID": 1,
            "Name": "Beverages"
        })
    );

    let products = fetch_products(&mut service, &transport);
    let milk = &products[0];
    let body = milk.to_json(SerializeMode::Update);
    assert_eq!(
        body,
        json!({
            "__metadata": { "uri": "http://test.local/OData.svc/Products(1)" },
            "ID": 1,
            "Name": "Milk",
            "Description": "Low fat milk",
            "ReleaseDate": "1995-10-01T00:00:00.000",
            "DiscontinuedDate": null,
            "Rating": 3,
            "Price": "3.5"
        })
    );
    for property in milk.descriptor().value_properties() {
        assert!(body.get(&property.name).is_some(), "{} was dropped", property.name);
    }
}

#[test]
fn test_only_no_content_counts_as_success() {
    let (mut service, transport) = common::service();
    let category = fetch_category(&mut service, &transport);

    service.delete_object(&category).unwrap();
    transport.respond(200, "");
    let result = service.save_changes().unwrap().unwrap();

    assert!(matches!(result, SaveResult::Succeeded(false)));
    assert_eq!(transport.last_request().method, HttpMethod::Delete);
    assert!(transport.last_request().body.is_none());
}

#[test]
fn test_untracked_entities_are_rejected() {
    let (mut service, transport) = common::service();
    let product = new_product(&service);
    let category = fetch_category(&mut service, &transport);

    let err = service.update_object(&product).unwrap_err();
    assert_eq!(
        err.to_string(),
        "You cannot update a non-tracked Product entity"
    );
    assert!(service.delete_object(&product).unwrap_err().is_not_supported());
    assert!(service
        .add_link(&product, "Category", &category)
        .unwrap_err()
        .is_not_supported());
    assert!(service
        .add_link(&category, "Products", &product)
        .unwrap_err()
        .is_not_supported());

    assert!(service.pending_operations().is_empty());
}

#[test]
fn test_add_link_to_unknown_navigation_property() {
    let (mut service, transport) = common::service();
    let category = fetch_category(&mut service, &transport);
    let products = fetch_products(&mut service, &transport);

    let err = service.add_link(&category, "Name", &products[0]).unwrap_err();
    assert!(matches!(err, Error::InvalidNavigationProperty { .. }));
}

#[test]
fn test_single_link_updates_both_sides() {
    let (mut service, transport) = common::service();
    let category = fetch_category(&mut service, &transport);
    let products = fetch_products(&mut service, &transport);
    let milk = &products[0];

    service.add_link(&category, "Products", milk).unwrap();
    transport.respond(204, "");
    assert!(service.save_changes().unwrap().unwrap().is_success());

    let request = transport.last_request();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, format!("{}/Categories(1)/$links/Products", SERVICE_URI));
    let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["uri"], format!("{}/Products(1)", SERVICE_URI));

    let linked = category.get("Products").unwrap();
    let linked = linked.as_entities().unwrap();
    assert_eq!(linked.len(), 1);
    assert!(linked[0].ptr_eq(milk));

    let back = milk.get("Category").unwrap();
    assert_eq!(back.as_entity().unwrap().uri(), category.uri());
}

#[test]
fn test_several_operations_go_out_as_one_batch() {
    let (mut service, transport) = common::service();
    let category = fetch_category(&mut service, &transport);
    let products = fetch_products(&mut service, &transport);
    let product = new_product(&service);

    service.add_to("Products", &product).unwrap();
    service.add_link(&category, "Products", &products[0]).unwrap();
    service.delete_object(&products[1]).unwrap();

    let response = batch_response(&[
        (1, "201 Created", common::PRODUCT_CREATED),
        (2, "204 No Content", ""),
        (3, "204 No Content", ""),
    ]);
    transport.respond_with_header(
        202,
        &response,
        "Content-Type",
        "multipart/mixed; boundary=batchresponse_1",
    );

    let result = service.save_changes().unwrap().unwrap();

    let request = transport.last_request();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, format!("{}/$batch", SERVICE_URI));
    let content_type = request.header_value("Content-Type").unwrap();
    assert!(content_type.starts_with("multipart/mixed; boundary=batch_"));

    let body = request.body.unwrap();
    let add = body
        .find(&format!("POST {}/Products HTTP/1.1", SERVICE_URI))
        .unwrap();
    let link = body
        .find(&format!("POST {}/Categories(1)/$links/Products HTTP/1.1", SERVICE_URI))
        .unwrap();
    let delete = body
        .find(&format!("DELETE {}/Products(2) HTTP/1.1", SERVICE_URI))
        .unwrap();
    assert!(add < link && link < delete);
    assert!(body.contains("Content-ID: 3"));

    match result {
        SaveResult::Batch(items) => {
            assert_eq!(items.len(), 3);
            assert_eq!(items[0].status_code, 201);
            assert_eq!(items[2].content_id, Some(3));
        }
        other => panic!("expected a batch result, got {:?}", other),
    }

    assert_eq!(
        product.uri().as_deref(),
        Some("http://test.local/OData.svc/Products(9)")
    );
    assert_eq!(
        category.get("Products").unwrap().as_entities().map(|p| p.len()),
        Some(1)
    );
    assert!(service.pending_operations().is_empty());
}

#[test]
fn test_failed_batch_part_keeps_the_queue() {
    let (mut service, transport) = common::service();
    let products = fetch_products(&mut service, &transport);

    service.delete_object(&products[0]).unwrap();
    service.delete_object(&products[1]).unwrap();

    let response = batch_response(&[(1, "400 Bad Request", common::ERROR)]);
    transport.respond(202, &response);

    match service.save_changes().unwrap_err() {
        Error::Service { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Resource not found for the segment 'Categories'.");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(service.pending_operations().len(), 2);

    service.clear_pending();
    assert!(service.pending_operations().is_empty());
}

#[test]
fn test_failed_single_save_is_an_error() {
    let (mut service, transport) = common::service();
    let category = fetch_category(&mut service, &transport);

    service.delete_object(&category).unwrap();
    transport.respond(404, common::ERROR);

    let err = service.save_changes().unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(service.pending_operations().len(), 1);
}

#[test]
fn test_save_with_nothing_queued() {
    let (mut service, transport) = common::service();
    assert!(service.save_changes().unwrap().is_none());
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_add_to_through_invoke() {
    let (mut service, _) = common::service();
    let descriptor = service.registry().resolve("Category").unwrap();
    let category = Entity::new(descriptor).with("Name", "Toys").unwrap();

    let outcome = service
        .invoke("AddToCategories", vec![Argument::from(category)])
        .unwrap();
    assert!(matches!(outcome, Invocation::Queued));
    assert_eq!(service.pending_operations()[0].kind(), "Add");

    assert!(matches!(
        service.invoke("AddToCategories", vec![Argument::from("Toys")]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        service.invoke("AddToCategories", vec![]),
        Err(Error::ArgumentCount { given: 0, expected: 1 })
    ));
    let product = new_product(&service);
    assert!(matches!(
        service.add_to("Widgets", &product),
        Err(Error::UnknownOperation(_))
    ));
}
