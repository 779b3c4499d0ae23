use crate::common::{self, SERVICE_URI};
use odata_client::api::models::Entity;
use odata_client::{Error, Filter, Key, NotSupported, OrderBy, Payload, ServiceOptions, Value};
use rust_decimal::Decimal;
use std::str::FromStr;

#[test]
fn test_keyed_fetch_then_load_property() {
    let (mut service, transport) = common::service();
    transport.respond(200, common::CATEGORY);

    service.collection_with_key("Categories", 1);
    let payload = service.execute().unwrap();
    assert_eq!(transport.last_request().url, format!("{}/Categories(1)", SERVICE_URI));

    let category = match payload {
        Payload::Entity(category) => category,
        other => panic!("expected a single entity, got {:?}", other),
    };
    assert_eq!(category.type_name(), "Category");
    assert!(category.is_tracked());
    assert!(category.uri().unwrap().ends_with("Categories(1)"));
    assert_eq!(category.get("Name"), Some(Value::from("Beverages")));
    assert_eq!(category.get("ID"), Some(Value::Int(1)));
    assert!(!category.is_loaded("Products"));

    transport.respond(200, common::CATEGORY_PRODUCTS);
    let products = service.load_property(&category, "Products").unwrap();
    assert_eq!(
        transport.last_request().url,
        format!("{}/Categories(1)/Products", SERVICE_URI)
    );

    let products = products.as_entities().unwrap().to_vec();
    assert_eq!(products.len(), 2);
    assert!(products.iter().all(Entity::is_tracked));
    assert_eq!(category.uri().as_deref(), Some("http://test.local/OData.svc/Categories(1)"));
    assert_eq!(
        category.get("Products").unwrap().as_entities().map(|p| p.len()),
        Some(2)
    );

    let milk = &products[0];
    assert_eq!(milk.get("Name"), Some(Value::from("Milk")));
    assert_eq!(milk.get("Description"), Some(Value::from("Low fat milk")));
    assert_eq!(milk.get("Price"), Some(Value::Decimal(Decimal::from_str("3.5").unwrap())));
    assert_eq!(milk.get("DiscontinuedDate"), Some(Value::Null));
    let released = milk.get("ReleaseDate").unwrap();
    let released = released.as_datetime().unwrap();
    assert_eq!(released.offset().local_minus_utc(), 0);
    assert_eq!(released.to_rfc3339(), "1995-10-01T00:00:00+00:00");
}

#[test]
fn test_expanded_many_navigation_is_always_a_list() {
    let (mut service, transport) = common::service();
    transport.respond(200, common::CATEGORIES_EXPANDED);

    service.collection("Categories").expand("Products");
    let categories = service.execute().unwrap().into_entities();
    assert_eq!(
        transport.last_request().url,
        format!("{}/Categories?$expand=Products", SERVICE_URI)
    );
    assert_eq!(categories.len(), 2);

    let food = categories[0].get("Products").unwrap();
    let food = food.as_entities().unwrap();
    assert_eq!(food.len(), 1);
    assert_eq!(food[0].get("Name"), Some(Value::from("Bread")));

    let electronics = categories[1].get("Products").unwrap();
    assert_eq!(electronics.as_entities().map(|p| p.len()), Some(0));

    // The inline feed's next link doesn't make the outer query partial
    assert!(!service.is_partial());
    assert_eq!(transport.request_count(), 3);
}

#[test]
fn test_expanded_single_navigation_is_an_entity() {
    let (mut service, transport) = common::service();
    transport.respond(200, common::PRODUCT_WITH_CATEGORY);

    service
        .collection_with_key("Products", 1)
        .expand("Category")
        .expand("Supplier");
    let product = service.execute().unwrap();
    let product = product.as_entity().unwrap();

    let category = product.get("Category").unwrap();
    let category = category.as_entity().expect("singular navigation should not be a list");
    assert_eq!(category.type_name(), "Category");
    assert!(category.uri().unwrap().ends_with("Categories(1)"));
    assert_eq!(product.get("Supplier"), Some(Value::Null));
}

#[test]
fn test_entries_without_category_use_the_collection_type() {
    let (mut service, transport) = common::service();
    transport.respond(200, common::SUPPLIERS_WITHOUT_CATEGORY);

    service.collection("Suppliers");
    let suppliers = service.execute().unwrap().into_entities();
    assert_eq!(suppliers.len(), 2);

    let first = &suppliers[0];
    assert_eq!(first.type_name(), "Supplier");
    assert_eq!(first.get("ID"), Some(Value::Int(0)));
    let address = first.get("Address").unwrap();
    let address = address.as_entity().unwrap();
    assert!(address.is_complex());
    assert!(!address.is_tracked());
    assert_eq!(address.get("City"), Some(Value::from("Sammamish")));
}

#[test]
fn test_eager_paging_follows_skip_tokens() {
    let (mut service, transport) = common::service();
    transport
        .respond(200, common::PRODUCTS_PAGE_1)
        .respond(200, common::PRODUCTS_PAGE_2);

    service.collection("Products");
    let products = service.execute().unwrap().into_entities();

    assert_eq!(products.len(), 3);
    let requests = transport.requests();
    assert_eq!(requests[2].url, format!("{}/Products", SERVICE_URI));
    assert_eq!(requests[3].url, format!("{}/Products?$skiptoken=2", SERVICE_URI));
    assert!(!service.is_partial());
}

#[test]
fn test_lazy_paging() {
    let (mut service, transport) = common::open_service(
        ServiceOptions::new()
            .eager_partial(false)
            .additional_param("sap-client", "100"),
    );
    transport
        .respond(200, common::PRODUCTS_PAGE_1)
        .respond(200, common::PRODUCTS_PAGE_2);

    service.collection("Products");
    let first_page = service.execute().unwrap();
    assert_eq!(first_page.len(), 2);
    assert!(service.is_partial());

    let second_page = service.next_page().unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(
        transport.last_request().url,
        format!("{}/Products?sap-client=100&$skiptoken=2", SERVICE_URI)
    );
    assert!(!service.is_partial());

    assert!(service.next_page().unwrap().is_empty());
    assert_eq!(transport.request_count(), 4);
}

#[test]
fn test_count_and_links() {
    let (mut service, transport) = common::service();

    transport.respond(200, "3");
    service.collection("Products").count().unwrap();
    assert_eq!(service.execute().unwrap().count(), Some(3));
    assert_eq!(transport.last_request().url, format!("{}/Products/$count", SERVICE_URI));

    transport.respond(200, common::PRODUCT_LINKS);
    service
        .collection_with_key("Categories", 1)
        .links("Products")
        .unwrap();
    let links = service.execute().unwrap();
    assert_eq!(
        transport.last_request().url,
        format!("{}/Categories(1)/$links/Products", SERVICE_URI)
    );
    assert_eq!(
        links.links().unwrap(),
        [
            "http://test.local/OData.svc/Products(1)",
            "http://test.local/OData.svc/Products(2)"
        ]
    );
}

#[test]
fn test_query_options_are_rendered() {
    let (mut service, transport) = common::open_service(ServiceOptions::new().additional_param("x", "1"));
    transport.respond(200, common::PRODUCTS_PAGE_2);

    service
        .collection("Products")
        .filter(Filter::gt("Price", 10))
        .order_by(OrderBy::desc("Rating"))
        .skip(5)
        .top(2)
        .select(["Name", "Price"])
        .unwrap();
    service.execute().unwrap();

    assert_eq!(
        transport.last_request().url,
        format!(
            "{}/Products?$select=Name,Price&$filter=Price%20gt%2010&$orderby=Rating%20desc&$skip=5&$top=2&x=1",
            SERVICE_URI
        )
    );
}

#[test]
fn test_string_keys_are_quoted_and_escaped() {
    let (mut service, transport) = common::service();
    transport.respond(404, common::ERROR);

    service.collection_with_key("Categories", "Cool Stuff");
    let err = service.execute().unwrap_err();

    assert_eq!(
        transport.last_request().url,
        format!("{}/Categories('Cool%20Stuff')", SERVICE_URI)
    );
    match err {
        Error::Service { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Resource not found for the segment 'Categories'.");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_reserved_characters_in_keys_are_escaped() {
    let (mut service, transport) = common::service();

    transport.respond(404, common::ERROR);
    service.collection_with_key("Categories", "100% Cotton");
    assert!(service.execute().is_err());
    assert_eq!(
        transport.last_request().url,
        format!("{}/Categories('100%25%20Cotton')", SERVICE_URI)
    );

    transport.respond(200, common::SUPPLIERS_WITHOUT_CATEGORY);
    service.collection_with_key("Suppliers", "a/b");
    assert_eq!(service.pending_query().unwrap().root(), "Suppliers('a%2Fb')");
    let suppliers = service.execute().unwrap().into_entities();
    assert_eq!(
        transport.last_request().url,
        format!("{}/Suppliers('a%2Fb')", SERVICE_URI)
    );

    // Entries without a category still get the collection's type
    assert_eq!(suppliers.len(), 2);
    assert!(suppliers.iter().all(|s| s.type_name() == "Supplier"));
}

#[test]
fn test_unknown_collection_names() {
    let (mut service, transport) = common::service();
    transport.respond(404, common::ERROR);

    // Only invoke checks names; a direct query goes to the service as written
    assert!(matches!(
        service.invoke("Widgets", vec![]),
        Err(Error::UnknownOperation(_))
    ));
    service.collection("Widgets");
    assert_eq!(service.execute().unwrap_err().status(), Some(404));
    assert_eq!(transport.last_request().url, format!("{}/Widgets", SERVICE_URI));
}

#[test]
fn test_composite_key() {
    let (mut service, transport) = common::service();
    transport.respond(200, common::PRODUCTS_PAGE_2);

    service.collection_with_key("Products", Key::named([("ID", 3)]));
    service.execute().unwrap();
    assert_eq!(transport.last_request().url, format!("{}/Products(ID=3)", SERVICE_URI));
}

#[test]
fn test_select_then_count_is_rejected() {
    let (mut service, _) = common::service();
    let err = service
        .collection("Products")
        .select(["Price"])
        .unwrap()
        .count()
        .unwrap_err();

    assert!(matches!(
        err,
        Error::NotSupported(NotSupported::QueryCombination {
            first: "select",
            second: "count"
        })
    ));
}

#[test]
fn test_execute_without_query() {
    let (mut service, _) = common::service();
    assert!(matches!(service.execute(), Err(Error::NoPendingQuery)));
}

#[test]
fn test_load_property_preconditions() {
    let (mut service, transport) = common::service();
    let descriptor = service.registry().resolve("Category").unwrap();

    let untracked = Entity::new(descriptor);
    let err = service.load_property(&untracked, "Products").unwrap_err();
    assert!(err.is_not_supported());
    assert!(err.to_string().contains("Category"));

    transport.respond(200, common::CATEGORY);
    service.collection_with_key("Categories", 1);
    let category = service.execute().unwrap().into_entities().remove(0);

    let err = service.load_property(&category, "Name").unwrap_err();
    assert!(matches!(err, Error::InvalidNavigationProperty { .. }));
    assert_eq!(transport.request_count(), 3);
}

#[test]
fn test_first() {
    let (mut service, transport) = common::service();

    transport.respond(200, common::CATEGORY);
    let found = service.first("Category", 1).unwrap().unwrap();
    assert_eq!(found.get("Name"), Some(Value::from("Beverages")));

    transport.respond(404, common::ERROR);
    assert!(service.first("Category", 99).unwrap().is_none());

    assert!(matches!(
        service.first("Unicorn", 1),
        Err(Error::UnknownOperation(_))
    ));
}

#[test]
fn test_namespace_option_qualifies_classes() {
    let (service, _) = common::open_service(ServiceOptions::new().namespace("Demo.Model"));
    assert!(service.classes().contains(&"Demo::Model::Product"));
    assert!(service.registry().has_namespace("Demo::Model"));
    assert!(service.registry().resolve("ODataDemo.Product").is_some());
}
