use super::*;
use crate::backend::model::{EntityPayload, Group, Principal, SaveResponse};
use crate::backend::testing::{asset, connected_gateway, Call, StubBackend};
use crate::backend::SearchPage;
use crate::report::{BufferedReporter, Level};
use crate::settings::default_settings;

fn search_settings() -> SearchSettings {
    default_settings().search
}

fn catalog_over(backend: Rc<dyn CatalogBackend>) -> (Catalog, WorkflowContext, Rc<BufferedReporter>) {
    let reporter = Rc::new(BufferedReporter::new());
    let (gateway, ctx) = connected_gateway(backend, reporter.clone());
    let catalog = Catalog::new(Rc::new(gateway), reporter.clone(), search_settings());
    (catalog, ctx, reporter)
}

fn application(index: usize) -> AssetSummary {
    asset(APPLICATION, &format!("c/orders-{index}"), &format!("Orders {index}"))
}

#[test]
fn application_search_truncates_in_server_order() {
    let backend = StubBackend::with_entities((1..=25).map(application).collect());
    let found = search_applications_in(&backend, &search_settings(), "orders").expect("search");

    assert_eq!(found.len(), 20);
    assert_eq!(found.label_at(0), Some("Orders 1"));
    assert_eq!(found.label_at(19), Some("Orders 20"));
}

#[test]
fn application_labels_carry_id_and_description_snippet() {
    let long = "x".repeat(80);
    let backend = StubBackend::with_entities(vec![
        application(1)
            .with_attr(attr::APP_ID, "A-1")
            .with_attr(attr::DESCRIPTION, long.as_str()),
        asset(APPLICATION, "c/billing", "Billing"),
    ]);
    let found = search_applications_in(&backend, &search_settings(), "ORDERS").expect("search");

    let expected = format!("Orders 1 (ID: A-1) - {}...", "x".repeat(50));
    assert_eq!(found.len(), 1, "billing does not match");
    let summary = found.get(&expected).expect("labelled application");
    assert_eq!(summary.app_id.as_deref(), Some("A-1"));
}

#[test]
fn application_search_pages_until_cap() {
    let backend = StubBackend::with_entities((1..=120).map(application).collect());
    let mut settings = search_settings();
    settings.max_application_results = 70;
    let found = search_applications_in(&backend, &settings, "orders").expect("search");

    assert_eq!(found.len(), 70);
    let offsets: Vec<usize> = backend.searches.borrow().iter().map(|(_, from)| *from).collect();
    assert_eq!(offsets, vec![0, 50], "third page never requested");
}

#[test]
fn fields_load_as_existing_records() {
    let backend = StubBackend::with_entities(vec![
        asset(APPLICATION_FIELD, "c/app/id", "id")
            .with_attr(attr::APPLICATION_PARENT_QUALIFIED_NAME, "c/app")
            .with_attr(attr::APPLICATION_FIELD_TYPE, "string"),
        asset(APPLICATION_FIELD, "c/other/id", "id")
            .with_attr(attr::APPLICATION_PARENT_QUALIFIED_NAME, "c/other"),
    ]);
    let fields = load_fields_in(&backend, &search_settings(), "c/app").expect("fields");

    assert_eq!(fields, vec![FieldRecord::existing("id", "string", "", "c/app/id")]);
}

/// Broad scans come back empty; only exact-name queries hit.
struct ExactOnly(StubBackend);

impl CatalogBackend for ExactOnly {
    fn search_page(&self, query: &SearchQuery, from: usize) -> Result<SearchPage, BackendError> {
        if query.equals.is_none() {
            return Ok(SearchPage::default());
        }
        self.0.search_page(query, from)
    }

    fn save(&self, entities: &[EntityPayload]) -> Result<SaveResponse, BackendError> {
        self.0.save(entities)
    }

    fn add_tags(&self, t: &str, qn: &str, tags: &[String], propagate: bool) -> Result<(), BackendError> {
        self.0.add_tags(t, qn, tags, propagate)
    }

    fn current_user(&self) -> Result<Principal, BackendError> {
        self.0.current_user()
    }

    fn list_users(&self) -> Result<Vec<Principal>, BackendError> {
        self.0.list_users()
    }

    fn list_groups(&self) -> Result<Vec<Group>, BackendError> {
        self.0.list_groups()
    }

    fn list_type_definitions(&self, category: TypeCategory) -> Result<Vec<TypeDefinition>, BackendError> {
        self.0.list_type_definitions(category)
    }

    fn find_role_id(&self, name: &str) -> Result<Option<String>, BackendError> {
        self.0.find_role_id(name)
    }
}

#[test]
fn asset_search_falls_back_to_exact_name() {
    let backend = ExactOnly(StubBackend::with_entities(vec![asset(
        "Table",
        "db/sales/orders",
        "orders",
    )]));
    let (catalog, mut ctx, reporter) = catalog_over(Rc::new(backend));

    let results = catalog.search_assets(&mut ctx, "orders");

    assert_eq!(results.len(), 1);
    let found = results.get("Table: orders").expect("fallback hit");
    assert_eq!(found.qualified_name, "db/sales/orders");
    assert!(reporter.contains(Level::Info, "trying exact match"));
}

#[test]
fn failed_asset_search_skips_the_exact_name_fallback() {
    let backend = Rc::new(StubBackend::with_entities(vec![asset(
        "Table",
        "db/sales/orders",
        "orders",
    )]));
    let (catalog, mut ctx, reporter) = catalog_over(backend.clone());
    backend.fail_next(
        Call::Search,
        BackendError::Api {
            status: 500,
            message: "index unavailable".into(),
        },
    );

    let results = catalog.search_assets(&mut ctx, "orders");

    assert!(results.is_empty());
    assert_eq!(backend.count(Call::Search), 1, "no second query");
    assert_eq!(reporter.at(Level::Warning).len(), 1);
    assert!(!reporter.contains(Level::Info, "trying exact match"));
}

#[test]
fn asset_search_disambiguates_duplicate_labels() {
    let backend = StubBackend::with_entities(vec![
        asset("Table", "db/a/orders", "orders"),
        asset("Table", "db/b/orders", "orders"),
    ]);
    let (catalog, mut ctx, _) = catalog_over(Rc::new(backend));

    let results = catalog.search_assets(&mut ctx, "ord");

    assert_eq!(results.len(), 2);
    assert_eq!(
        results.get("Table: orders (2)").map(|r| r.qualified_name.as_str()),
        Some("db/b/orders")
    );
}

#[test]
fn failed_reads_degrade_to_empty_with_warning() {
    let backend = Rc::new(StubBackend::with_entities(vec![application(1)]));
    let (catalog, mut ctx, reporter) = catalog_over(backend.clone());
    backend.fail_next(
        Call::Search,
        BackendError::Api {
            status: 500,
            message: "index unavailable".into(),
        },
    );

    let found = catalog.search_applications(&mut ctx, "orders");

    assert!(found.is_empty());
    assert!(reporter.contains(Level::Warning, "index unavailable"));
}

#[test]
fn connection_scan_respects_target_and_iteration_cap() {
    let mut entities: Vec<AssetSummary> = (0..30)
        .map(|i| asset(CONNECTION, &format!("default/api/{i}"), &format!("conn {i}")).with_attr(attr::CONNECTOR_NAME, "api"))
        .collect();
    let backend = StubBackend::with_entities(entities.clone());
    let scan = list_connections_in(&backend, &search_settings()).expect("scan");
    assert_eq!(scan.connections.len(), 20);
    assert!(!scan.hit_iteration_cap);

    entities.truncate(3);
    let backend = StubBackend::with_entities(entities);
    let mut settings = search_settings();
    settings.max_connection_iterations = 2;
    let scan = list_connections_in(&backend, &settings).expect("scan");
    assert_eq!(scan.connections.len(), 2);
    assert!(scan.hit_iteration_cap);
}

#[test]
fn api_filter_keeps_only_api_connectors() {
    let connections = vec![
        ConnectionSummary {
            qualified_name: "default/api/1".into(),
            name: "payments".into(),
            connector_name: Some("api".into()),
        },
        ConnectionSummary {
            qualified_name: "default/snowflake/2".into(),
            name: "warehouse".into(),
            connector_name: Some("snowflake".into()),
        },
    ];
    let api = filter_api_connections(&connections);
    assert_eq!(api.len(), 1);
    assert_eq!(api[0].label(), "api - payments");
}

#[test]
fn owners_are_cached_per_client_handle() {
    let backend = Rc::new(StubBackend {
        users: vec![Principal {
            id: Some("1".into()),
            username: Some("jdoe".into()),
        }],
        groups: vec![Group {
            id: Some("g".into()),
            alias: Some("data-team".into()),
            name: None,
        }],
        ..StubBackend::default()
    });
    let (catalog, mut ctx, _) = catalog_over(backend.clone());

    let owners = catalog.list_owners(&mut ctx);
    assert_eq!(owners.get("User: jdoe"), Some(&Owner::User("jdoe".into())));
    assert_eq!(owners.get("Group: data-team"), Some(&Owner::Group("data-team".into())));
    catalog.list_owners(&mut ctx);
    assert_eq!(backend.count(Call::ListUsers), 1, "second call served from cache");

    ctx.set_client(crate::backend::ClientHandle::new(backend.clone()));
    catalog.list_owners(&mut ctx);
    assert_eq!(backend.count(Call::ListUsers), 2, "new handle invalidates the cache");
}

#[test]
fn tags_are_labelled_by_display_name() {
    let backend = Rc::new(StubBackend {
        tags: vec![
            TypeDefinition {
                name: "h4sh".into(),
                display_name: Some("PII".into()),
            },
            TypeDefinition {
                name: "n0name".into(),
                display_name: None,
            },
        ],
        ..StubBackend::default()
    });
    let (catalog, mut ctx, _) = catalog_over(backend);

    let tags = catalog.list_tags(&mut ctx);
    assert_eq!(tags.len(), 1);
    assert_eq!(tags.get("PII").map(|def| def.name.as_str()), Some("h4sh"));
}
