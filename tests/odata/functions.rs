use crate::common::{self, SERVICE_URI};
use odata_client::api::HttpMethod;
use odata_client::{Argument, Error, FunctionResult, Invocation, Value};

const PRODUCT_NAMES: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<ProductNames xmlns="http://schemas.microsoft.com/ado/2007/08/dataservices">
  <element>Bread</element>
  <element>Milk</element>
</ProductNames>"#;

#[test]
fn test_primitive_collection_result() {
    let (service, transport) = common::service();
    transport.respond(200, PRODUCT_NAMES);

    let result = service.call_function("ProductNames", &[]).unwrap();
    assert_eq!(transport.last_request().url, format!("{}/ProductNames", SERVICE_URI));
    assert_eq!(transport.last_request().method, HttpMethod::Get);

    match result {
        FunctionResult::Value(Value::List(names)) => {
            assert_eq!(names, vec![Value::from("Bread"), Value::from("Milk")]);
        }
        other => panic!("expected a list, got {:?}", other),
    }
}

#[test]
fn test_json_primitive_collection_result() {
    let (service, transport) = common::service();
    transport.respond(200, r#"{"d": ["Bread", "Milk"]}"#);

    let result = service.call_function("ProductNames", &[]).unwrap();
    assert!(matches!(
        result,
        FunctionResult::Value(Value::List(ref names)) if names.len() == 2
    ));
}

#[test]
fn test_entity_collection_result_through_invoke() {
    let (mut service, transport) = common::service();
    transport.respond(200, common::CATEGORY_PRODUCTS);

    let outcome = service
        .invoke("GetProductsByRating", vec![Argument::from(4)])
        .unwrap();
    assert_eq!(
        transport.last_request().url,
        format!("{}/GetProductsByRating?rating=4", SERVICE_URI)
    );

    match outcome {
        Invocation::Function(FunctionResult::Entities(products)) => {
            assert_eq!(products.len(), 2);
            assert_eq!(products[0].type_name(), "Product");
            assert!(products[0].is_tracked());
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_string_arguments_are_quoted_literals() {
    let (service, transport) = common::service();
    transport.respond(200, common::CATEGORY_PRODUCTS);

    service
        .call_function("GetProductsByRating", &[Value::from("it's")])
        .unwrap();
    assert_eq!(
        transport.last_request().url,
        format!("{}/GetProductsByRating?rating=%27it%27%27s%27", SERVICE_URI)
    );
}

#[test]
fn test_too_many_arguments_sends_nothing() {
    let (service, transport) = common::service();

    let err = service
        .call_function("ProductNames", &[Value::Int(1)])
        .unwrap_err();
    assert!(matches!(err, Error::ArgumentCount { given: 1, expected: 0 }));
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_no_content_and_status_results() {
    let (service, transport) = common::service();

    transport.respond(204, "");
    let result = service.call_function("CleanDatabase", &[]).unwrap();
    assert!(matches!(result, FunctionResult::NoContent));
    assert_eq!(transport.last_request().method, HttpMethod::Post);

    transport.respond(200, "");
    let result = service.call_function("CleanDatabase", &[]).unwrap();
    assert!(matches!(result, FunctionResult::Status(true)));
}

#[test]
fn test_failed_function_call() {
    let (service, transport) = common::service();
    transport.respond(500, common::ERROR);

    let err = service.call_function("CleanDatabase", &[]).unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[test]
fn test_collection_names_start_queries() {
    let (mut service, transport) = common::service();

    assert!(matches!(
        service.invoke("Products", vec![]).unwrap(),
        Invocation::Query
    ));
    assert_eq!(service.pending_query().unwrap().root(), "Products");

    service
        .invoke("Categories", vec![Argument::from(1)])
        .unwrap();
    assert_eq!(service.pending_query().unwrap().root(), "Categories(1)");

    // Nothing is sent until the query runs
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_invoke_errors() {
    let (mut service, transport) = common::service();

    assert!(matches!(
        service.invoke("Frobnicate", vec![]),
        Err(Error::UnknownOperation(name)) if name == "Frobnicate"
    ));
    assert!(matches!(
        service.invoke("GetProductsByRating", vec![Argument::named("rating", 4)]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        service.call_function("Frobnicate", &[]),
        Err(Error::UnknownOperation(_))
    ));
    assert_eq!(transport.request_count(), 2);
}
