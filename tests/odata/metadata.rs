use crate::common::{self, MockTransport, METADATA, SERVICE_DOCUMENT, SERVICE_URI};
use odata_client::api::metadata::Multiplicity;
use odata_client::api::Capability;
use odata_client::{Error, Service, ServiceOptions};

#[test]
fn test_open_fetches_service_document_then_metadata() {
    let (service, transport) = common::service();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, SERVICE_URI);
    assert_eq!(requests[1].url, format!("{}/$metadata", SERVICE_URI));
    assert_eq!(
        requests[0].header_value("Accept"),
        Some("*/*; q=0.5, application/xml")
    );
    assert_eq!(requests[0].header_value("Accept-Encoding"), Some("gzip, deflate"));

    assert_eq!(service.uri(), SERVICE_URI);
    assert_eq!(service.collections(), ["Products", "Categories", "Suppliers"]);
}

#[test]
fn test_trailing_slash_is_stripped() {
    let transport = MockTransport::new();
    transport.respond(200, SERVICE_DOCUMENT).respond(200, METADATA);

    let service = Service::with_transport(
        &format!("{}/", SERVICE_URI),
        ServiceOptions::default(),
        Box::new(transport.clone()),
    )
    .unwrap();

    assert_eq!(service.uri(), SERVICE_URI);
    assert_eq!(transport.requests()[1].url, format!("{}/$metadata", SERVICE_URI));
}

#[test]
fn test_registry_holds_complex_and_entity_types() {
    let (service, _) = common::service();

    // 1 complex type + 3 entity types
    assert_eq!(service.registry().len(), 4);
    let mut classes = service.classes();
    classes.sort();
    assert_eq!(classes.len(), 4);
    assert!(classes.iter().any(|c| c.ends_with("Address")));
    assert!(classes.iter().any(|c| c.ends_with("Product")));

    let address = service.registry().resolve("Address").unwrap();
    assert!(address.is_complex);
    let supplier = service.registry().resolve("Supplier").unwrap();
    assert!(!supplier.is_complex);
    assert_eq!(
        supplier.key_properties().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["ID"]
    );
}

#[test]
fn test_associations_and_navigation_multiplicity() {
    let (service, _) = common::service();

    assert_eq!(service.associations().len(), 2);

    let category = service.registry().resolve("Category").unwrap();
    let products = category.navigation_property("Products").unwrap();
    assert_eq!(products.multiplicity(), Some(Multiplicity::Many));

    let product = service.registry().resolve("Product").unwrap();
    let category_nav = product.navigation_property("Category").unwrap();
    assert_eq!(category_nav.multiplicity(), Some(Multiplicity::ZeroOrOne));
}

#[test]
fn test_capability_table() {
    let (service, _) = common::service();
    let capabilities = service.capabilities();

    assert_eq!(
        capabilities.get("Products"),
        Some(&Capability::Collection("Products".to_string()))
    );
    assert_eq!(
        capabilities.get("AddToCategories"),
        Some(&Capability::AddTo("Categories".to_string()))
    );
    assert_eq!(
        capabilities.get("ProductNames"),
        Some(&Capability::Function("ProductNames".to_string()))
    );
    assert!(capabilities.get("AddToNothing").is_none());
    assert_eq!(service.function_imports().len(), 3);
}

#[test]
fn test_additional_params_reach_metadata() {
    let (_, transport) =
        common::open_service(ServiceOptions::new().additional_param("sap-client", "100"));

    let requests = transport.requests();
    assert_eq!(requests[0].url, format!("{}?sap-client=100", SERVICE_URI));
    assert_eq!(requests[1].url, format!("{}/$metadata?sap-client=100", SERVICE_URI));
}

#[test]
fn test_custom_headers_are_sent() {
    let (_, transport) = common::open_service(ServiceOptions::new().header("X-Requested-By", "tests"));
    assert_eq!(transport.requests()[1].header_value("X-Requested-By"), Some("tests"));
}

#[test]
fn test_metadata_failure_aborts_open() {
    common::init_logging();
    let transport = MockTransport::new();
    transport
        .respond(200, SERVICE_DOCUMENT)
        .respond(500, common::ERROR);

    let err = Service::with_transport(SERVICE_URI, ServiceOptions::default(), Box::new(transport))
        .err()
        .unwrap();
    assert_eq!(err.status(), Some(500));
}

#[test]
fn test_broken_association_is_a_metadata_error() {
    common::init_logging();
    let broken = METADATA.replace(
        r#"<Association Name="Product_Supplier_Supplier_Products">"#,
        r#"<Association Name="Renamed">"#,
    );
    let transport = MockTransport::new();
    transport.respond(200, SERVICE_DOCUMENT).respond(200, &broken);

    let err = Service::with_transport(SERVICE_URI, ServiceOptions::default(), Box::new(transport))
        .err()
        .unwrap();
    assert!(matches!(err, Error::MetadataParse(_)));
}
