//! Shared test helpers: a scripted transport and the fixture service

use odata_client::api::{HttpRequest, HttpResponse, HttpTransport};
use odata_client::{Error, Result, Service, ServiceOptions};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub const SERVICE_URI: &str = "http://test.local/OData.svc";

pub const SERVICE_DOCUMENT: &str = include_str!("../fixtures/service_document.xml");
pub const METADATA: &str = include_str!("../fixtures/metadata.xml");
pub const CATEGORY: &str = include_str!("../fixtures/category.xml");
pub const CATEGORY_PRODUCTS: &str = include_str!("../fixtures/category_products.xml");
pub const CATEGORIES_EXPANDED: &str = include_str!("../fixtures/categories_expanded.xml");
pub const PRODUCT_WITH_CATEGORY: &str = include_str!("../fixtures/product_with_category.xml");
pub const PRODUCT_CREATED: &str = include_str!("../fixtures/product_created.xml");
pub const PRODUCT_LINKS: &str = include_str!("../fixtures/product_links.xml");
pub const PRODUCTS_PAGE_1: &str = include_str!("../fixtures/products_page1.xml");
pub const PRODUCTS_PAGE_2: &str = include_str!("../fixtures/products_page2.xml");
pub const SUPPLIERS_WITHOUT_CATEGORY: &str = include_str!("../fixtures/supplier_no_category.xml");
pub const ERROR: &str = include_str!("../fixtures/error.xml");

#[derive(Default)]
struct MockState {
    requests: RefCell<Vec<HttpRequest>>,
    responses: RefCell<VecDeque<HttpResponse>>,
}

/// Records every request and answers from a queue of canned responses.
///
/// Clones share state, so a test keeps one handle after moving another into
/// the service.
#[derive(Clone, Default)]
pub struct MockTransport(Rc<MockState>);

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: &str) -> &Self {
        self.push(HttpResponse::new(status, body))
    }

    pub fn respond_with_header(&self, status: u16, body: &str, name: &str, value: &str) -> &Self {
        let mut response = HttpResponse::new(status, body);
        response.headers.push((name.to_string(), value.to_string()));
        self.push(response)
    }

    fn push(&self, response: HttpResponse) -> &Self {
        self.0.responses.borrow_mut().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.0.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.0.requests.borrow().len()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.0
            .requests
            .borrow()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.0.requests.borrow_mut().push(request);
        self.0
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::InvalidResponse("no canned response left".to_string()))
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A service opened against the fixture metadata
pub fn open_service(options: ServiceOptions) -> (Service, MockTransport) {
    init_logging();
    let transport = MockTransport::new();
    transport
        .respond(200, SERVICE_DOCUMENT)
        .respond(200, METADATA);

    let service = Service::with_transport(SERVICE_URI, options, Box::new(transport.clone()))
        .expect("fixture service should open");
    (service, transport)
}

pub fn service() -> (Service, MockTransport) {
    open_service(ServiceOptions::default())
}
