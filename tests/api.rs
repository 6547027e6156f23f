use std::sync::Arc;

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::test::{self, TestRequest};
use chrono::Duration;
use serde_json::{json, Value};

use nilhub::db::{AccountRepository, ProductRepository};
use nilhub::images::MemoryImageHost;
use nilhub::models::account::hash_password;
use nilhub::models::{Account, Role};
use nilhub::state::AppState;
use nilhub::token::TokenService;

const SECRET: &str = "integration-secret-long-enough-for-hs256";

fn tokens() -> TokenService {
    TokenService::new(SECRET, Duration::days(7))
}

fn state() -> AppState {
    AppState::in_memory(tokens(), false)
}

async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(app, req).await;
    let status = res.status();
    let bytes = test::read_body(res).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn authed(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
}

struct Seller {
    token: String,
    user_id: String,
    store_id: String,
    slug: String,
}

async fn register<S, B>(app: &S, email: &str, store_name: &str, whatsapp: Option<&str>) -> Seller
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "name": "Vendedora",
            "email": email,
            "password": "secreto123",
            "store_name": store_name,
            "whatsapp": whatsapp,
        }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let data = &body["data"];
    Seller {
        token: data["token"].as_str().unwrap().to_string(),
        user_id: data["user"]["id"].as_str().unwrap().to_string(),
        store_id: data["store"]["id"].as_str().unwrap().to_string(),
        slug: data["store"]["slug"].as_str().unwrap().to_string(),
    }
}

async fn create_product<S, B>(app: &S, seller: &Seller, name: &str, stock: i64) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = authed(TestRequest::post(), &seller.token)
        .uri(&format!("/api/stores/{}/products", seller.store_id))
        .set_json(json!({
            "name": name,
            "description": "Algodón",
            "price": 1000.0,
            "stock": stock,
            "category": "ropa",
        }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn seed_admin(state: &AppState) -> String {
    let mut admin = Account::new(
        "Admin".to_string(),
        "admin@nilhub.com",
        hash_password("admin1234").unwrap(),
    );
    admin.role = Role::Admin;
    state.accounts.insert(&admin).await.unwrap();
    state.tokens.issue(&admin.id.to_hex()).unwrap()
}

fn multipart(parts: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "nilhub-test-boundary";
    let mut body = Vec::new();
    for (i, (field, content_type, bytes)) in parts.iter().enumerate() {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"img{i}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[actix_web::test]
async fn health_needs_no_token() {
    let app = test::init_service(nilhub::app(state())).await;
    let (status, body) = send(&app, TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": { "status": "ok" } }));
}

#[actix_web::test]
async fn unknown_route_uses_error_envelope() {
    let app = test::init_service(nilhub::app(state())).await;
    let (status, body) = send(&app, TestRequest::get().uri("/api/nope").to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body.get("stack").is_none());
}

#[actix_web::test]
async fn missing_token_is_rejected_before_the_handler() {
    let state = state();
    let app = test::init_service(nilhub::app(state.clone())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;

    let req = TestRequest::post()
        .uri(&format!("/api/stores/{}/products", seller.store_id))
        .set_json(json!({ "name": "Remera", "price": 10.0, "category": "ropa" }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No autorizado, no se proporcionó token");
    assert_eq!(state.products.count().await.unwrap(), 0);
}

#[actix_web::test]
async fn malformed_and_forged_tokens() {
    let app = test::init_service(nilhub::app(state())).await;

    let req = authed(TestRequest::get(), "garbage").uri("/api/auth/me").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No autorizado, token con formato inválido");

    for _ in 0..2 {
        let req = authed(TestRequest::get(), "a.b.c").uri("/api/auth/me").to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token inválido");
    }

    let forged = TokenService::new("another-secret-that-is-also-long-enough", Duration::days(1))
        .issue("64b0a0a0a0a0a0a0a0a0a0a0")
        .unwrap();
    let req = authed(TestRequest::get(), &forged).uri("/api/auth/me").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token inválido");
}

#[actix_web::test]
async fn expired_token_says_expired() {
    let app = test::init_service(nilhub::app(state())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;

    let expired = TokenService::new(SECRET, Duration::seconds(-60))
        .issue(&seller.user_id)
        .unwrap();
    let req = authed(TestRequest::get(), &expired).uri("/api/auth/me").to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("expirada"));
}

#[actix_web::test]
async fn token_for_deleted_account_is_rejected() {
    let app = test::init_service(nilhub::app(state())).await;
    let token = tokens().issue("64b0a0a0a0a0a0a0a0a0a0a0").unwrap();
    let req = authed(TestRequest::get(), &token).uri("/api/auth/me").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No autorizado, usuario no encontrado");
}

#[actix_web::test]
async fn register_login_and_me() {
    let app = test::init_service(nilhub::app(state())).await;
    let seller = register(&app, "Ana@Tienda.com", "Tienda de Ana", Some("+54 11 5555 1234")).await;
    assert_eq!(seller.slug, "tienda-de-ana");

    let second = register(&app, "otra@tienda.com", "Tienda de Ana", None).await;
    assert_eq!(second.slug, "tienda-de-ana-2");

    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "ana@tienda.com", "password": "secreto123" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let req = authed(TestRequest::get(), &token).uri("/api/auth/me").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "ana@tienda.com");
    assert_eq!(body["data"]["store"]["slug"], "tienda-de-ana");
    assert!(body["data"]["user"].get("password_hash").is_none());
}

#[actix_web::test]
async fn login_failures_are_generic() {
    let app = test::init_service(nilhub::app(state())).await;
    register(&app, "ana@tienda.com", "Tienda Ana", None).await;

    for (email, password) in [("ana@tienda.com", "incorrecta"), ("nadie@tienda.com", "secreto123")] {
        let req = TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": email, "password": password }))
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Credenciales inválidas");
    }
}

#[actix_web::test]
async fn duplicate_email_names_field_and_value() {
    let app = test::init_service(nilhub::app(state())).await;
    register(&app, "a@b.com", "Primera", None).await;

    let req = TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "name": "Otra",
            "email": "a@b.com",
            "password": "secreto123",
            "store_name": "Segunda",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("email"), "{message}");
    assert!(message.contains("a@b.com"), "{message}");
}

#[actix_web::test]
async fn invalid_registration_lists_every_problem() {
    let app = test::init_service(nilhub::app(state())).await;
    let req = TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "name": "Ana",
            "email": "no-es-email",
            "password": "123",
            "store_name": "Tienda",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Email inválido, La contraseña debe tener al menos 6 caracteres"
    );
}

#[actix_web::test]
async fn malformed_json_is_a_bad_request() {
    let app = test::init_service(nilhub::app(state())).await;
    let req = TestRequest::post()
        .uri("/api/auth/login")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn profile_password_change_requires_current_password() {
    let app = test::init_service(nilhub::app(state())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;

    let req = authed(TestRequest::put(), &seller.token)
        .uri("/api/auth/profile")
        .set_json(json!({ "current_password": "mal", "new_password": "nuevo123" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "La contraseña actual es incorrecta");

    let req = authed(TestRequest::put(), &seller.token)
        .uri("/api/auth/profile")
        .set_json(json!({ "name": "Ana María", "current_password": "secreto123", "new_password": "nuevo123" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ana María");

    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "ana@tienda.com", "password": "nuevo123" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn non_admin_is_forbidden_from_admin_routes() {
    let state = state();
    let app = test::init_service(nilhub::app(state.clone())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;

    let req = authed(TestRequest::get(), &seller.token)
        .uri("/api/admin/accounts")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Acceso denegado, se requiere rol de administrador");

    let admin = seed_admin(&state).await;
    let req = authed(TestRequest::get(), &admin)
        .uri("/api/admin/accounts?limit=1")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["pages"], 2);

    let req = authed(TestRequest::get(), &admin).uri("/api/admin/stats").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accounts"], 2);
    assert_eq!(body["data"]["stores"], 1);
}

#[actix_web::test]
async fn deactivated_account_is_rejected_on_next_request() {
    let state = state();
    let app = test::init_service(nilhub::app(state.clone())).await;
    let admin = seed_admin(&state).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;

    let me = || authed(TestRequest::get(), &seller.token).uri("/api/auth/me").to_request();
    assert_eq!(send(&app, me()).await.0, StatusCode::OK);

    let req = authed(TestRequest::patch(), &admin)
        .uri(&format!("/api/admin/accounts/{}/status", seller.user_id))
        .set_json(json!({ "active": false }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["stores_updated"], 1);

    let (status, body) = send(&app, me()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Cuenta desactivada, contacta al administrador");

    let req = TestRequest::get()
        .uri(&format!("/api/public/stores/{}", seller.slug))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "ana@tienda.com", "password": "secreto123" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_cannot_deactivate_themselves() {
    let state = state();
    let app = test::init_service(nilhub::app(state.clone())).await;
    let admin = seed_admin(&state).await;
    let id = state.tokens.verify(&admin).unwrap();

    let req = authed(TestRequest::patch(), &admin)
        .uri(&format!("/api/admin/accounts/{id}/status"))
        .set_json(json!({ "active": false }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn ownership_is_enforced_after_existence() {
    let state = state();
    let app = test::init_service(nilhub::app(state.clone())).await;
    let owner = register(&app, "ana@tienda.com", "Tienda Ana", None).await;
    let other = register(&app, "bea@tienda.com", "Tienda Bea", None).await;
    let product = create_product(&app, &owner, "Remera", 3).await;

    let update = |token: &str, id: &str| {
        authed(TestRequest::put(), token)
            .uri(&format!("/api/products/{id}"))
            .set_json(json!({ "price": 1200.0 }))
            .to_request()
    };

    let (status, body) = send(&app, update(&other.token, &product)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "No tienes permiso para realizar esta acción");

    let (status, body) = send(&app, update(&other.token, "64b0a0a0a0a0a0a0a0a0a0a0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Producto no encontrado");

    let (status, body) = send(&app, update(&other.token, "not-an-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not-an-id"));

    let req = authed(TestRequest::post(), &other.token)
        .uri(&format!("/api/stores/{}/products", owner.store_id))
        .set_json(json!({ "name": "Intruso", "price": 1.0, "category": "otros" }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, update(&owner.token, &product)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], 1200.0);

    let admin = seed_admin(&state).await;
    let (status, _) = send(&app, update(&admin, &product)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn product_lifecycle_keeps_store_count() {
    let state = state();
    let app = test::init_service(nilhub::app(state.clone())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;
    let product = create_product(&app, &seller, "Remera", 0).await;
    create_product(&app, &seller, "Buzo", 2).await;

    let store = |token: &str| authed(TestRequest::get(), token).uri("/api/stores/mine").to_request();
    let (_, body) = send(&app, store(&seller.token)).await;
    assert_eq!(body["data"]["product_count"], 2);

    let req = authed(TestRequest::patch(), &seller.token)
        .uri(&format!("/api/products/{product}/stock"))
        .set_json(json!({ "delta": 4 }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 4);
    assert_eq!(body["data"]["in_stock"], true);

    let req = authed(TestRequest::patch(), &seller.token)
        .uri(&format!("/api/products/{product}/stock"))
        .set_json(json!({ "delta": -10 }))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"]["stock"], 0);

    let req = authed(TestRequest::patch(), &seller.token)
        .uri(&format!("/api/products/{product}/stock"))
        .set_json(json!({}))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::BAD_REQUEST);

    let req = authed(TestRequest::patch(), &seller.token)
        .uri(&format!("/api/products/{product}/toggle"))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"]["active"], false);

    let req = authed(TestRequest::get(), &seller.token)
        .uri("/api/products?category=ropa")
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["pagination"]["total"], 2);

    let req = authed(TestRequest::put(), &seller.token)
        .uri(&format!("/api/products/{product}"))
        .set_json(json!({ "sale_price": 5000.0 }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "El precio de oferta debe ser menor al precio regular");

    let req = authed(TestRequest::delete(), &seller.token)
        .uri(&format!("/api/products/{product}"))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);

    let (_, body) = send(&app, store(&seller.token)).await;
    assert_eq!(body["data"]["product_count"], 1);
    assert_eq!(state.products.count().await.unwrap(), 1);
}

#[actix_web::test]
async fn store_update_is_validated() {
    let app = test::init_service(nilhub::app(state())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;

    let req = authed(TestRequest::put(), &seller.token)
        .uri(&format!("/api/stores/{}", seller.store_id))
        .set_json(json!({ "name": "X", "branding": { "primary_color": "rojo" } }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "El nombre de la tienda debe tener entre 2 y 60 caracteres, El color debe tener formato #RRGGBB"
    );

    let req = authed(TestRequest::put(), &seller.token)
        .uri(&format!("/api/stores/{}", seller.store_id))
        .set_json(json!({ "description": "Ropa linda", "whatsapp": "5491155551234" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "Ropa linda");
    assert_eq!(body["data"]["slug"], seller.slug);
}

#[actix_web::test]
async fn public_catalog_shows_only_active_products() {
    let app = test::init_service(nilhub::app(state())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", Some("5491155551234")).await;
    let visible = create_product(&app, &seller, "Remera", 1).await;
    let hidden = create_product(&app, &seller, "Buzo", 1).await;

    let req = authed(TestRequest::patch(), &seller.token)
        .uri(&format!("/api/products/{hidden}/toggle"))
        .to_request();
    send(&app, req).await;

    let req = TestRequest::get()
        .uri(&format!("/api/public/stores/{}?search=reme", seller.slug))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 1);
    assert!(body["data"]["store"].get("owner").is_none());

    let req = TestRequest::get()
        .uri(&format!("/api/public/stores/{}/products/{hidden}", seller.slug))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::NOT_FOUND);

    let req = TestRequest::get()
        .uri(&format!("/api/public/stores/{}/products/{visible}", seller.slug))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["product"]["views"], 1);

    let req = TestRequest::post()
        .uri(&format!("/api/public/products/{visible}/click"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["whatsapp_url"]
        .as_str()
        .unwrap()
        .starts_with("https://wa.me/5491155551234?text="));

    let req = authed(TestRequest::get(), &seller.token).uri("/api/stats/mine").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_products"], 2);
    assert_eq!(body["data"]["active_products"], 1);
    assert_eq!(body["data"]["total_views"], 1);
    assert_eq!(body["data"]["total_clicks"], 1);
    assert_eq!(body["data"]["top_products"][0]["id"], visible.as_str());
}

#[actix_web::test]
async fn click_without_whatsapp_is_a_bad_request() {
    let app = test::init_service(nilhub::app(state())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;
    let product = create_product(&app, &seller, "Remera", 1).await;

    let req = TestRequest::post()
        .uri(&format!("/api/public/products/{product}/click"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "La tienda no tiene WhatsApp configurado");
}

#[actix_web::test]
async fn uploads_are_checked_and_scoped_to_the_store() {
    let images = Arc::new(MemoryImageHost::new());
    let state = AppState::in_memory_with_images(tokens(), false, images.clone());
    let app = test::init_service(nilhub::app(state)).await;
    let owner = register(&app, "ana@tienda.com", "Tienda Ana", None).await;
    let other = register(&app, "bea@tienda.com", "Tienda Bea", None).await;

    let upload = |token: &str, parts: &[(&str, &str, &[u8])]| {
        let (content_type, body) = multipart(parts);
        authed(TestRequest::post(), token)
            .uri("/api/uploads/images")
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request()
    };

    let (status, body) = send(&app, upload(&owner.token, &[("images", "image/png", &b"png"[..])])).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let public_id = body["data"][0]["public_id"].as_str().unwrap().to_string();
    assert!(public_id.starts_with(&format!("nilhub/{}/", owner.store_id)));
    assert!(images.contains(&public_id).await);

    let (status, body) = send(&app, upload(&owner.token, &[("images", "text/plain", &b"hola"[..])])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Tipo de archivo no permitido. Usa JPG, PNG, WEBP o GIF");

    let six = [("images", "image/png", &b"x"[..]); 6];
    let (status, body) = send(&app, upload(&owner.token, &six)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Demasiados archivos. Máximo 5");

    let big = vec![0u8; 5 * 1024 * 1024 + 1];
    let (status, body) = send(&app, upload(&owner.token, &[("images", "image/jpeg", big.as_slice())])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "El archivo es demasiado grande. Máximo 5MB");

    let delete = |token: &str| {
        authed(TestRequest::delete(), token)
            .uri(&format!("/api/uploads/images/{public_id}"))
            .to_request()
    };
    assert_eq!(send(&app, delete(&other.token)).await.0, StatusCode::FORBIDDEN);
    assert!(images.contains(&public_id).await);

    assert_eq!(send(&app, delete(&owner.token)).await.0, StatusCode::OK);
    assert!(!images.contains(&public_id).await);
}

#[actix_web::test]
async fn products_cannot_claim_another_stores_images() {
    let images = Arc::new(MemoryImageHost::new());
    let state = AppState::in_memory_with_images(tokens(), false, images.clone());
    let app = test::init_service(nilhub::app(state)).await;
    let thief = register(&app, "ana@tienda.com", "Tienda Ana", None).await;
    let victim = register(&app, "bea@tienda.com", "Tienda Bea", None).await;

    let (content_type, payload) = multipart(&[("images", "image/png", &b"png"[..])]);
    let req = authed(TestRequest::post(), &victim.token)
        .uri("/api/uploads/images")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(payload)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let foreign = body["data"][0].clone();
    let public_id = foreign["public_id"].as_str().unwrap().to_string();

    let req = authed(TestRequest::post(), &thief.token)
        .uri(&format!("/api/stores/{}/products", thief.store_id))
        .set_json(json!({
            "name": "Remera",
            "price": 100.0,
            "stock": 1,
            "category": "ropa",
            "images": [foreign.clone()],
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Las imágenes deben pertenecer a la tienda del producto");

    let product = create_product(&app, &thief, "Remera", 1).await;
    let req = authed(TestRequest::put(), &thief.token)
        .uri(&format!("/api/products/{product}"))
        .set_json(json!({ "images": [foreign] }))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::BAD_REQUEST);

    let req = authed(TestRequest::delete(), &thief.token)
        .uri(&format!("/api/products/{product}"))
        .to_request();
    assert_eq!(send(&app, req).await.0, StatusCode::OK);
    assert!(images.contains(&public_id).await);
}

#[actix_web::test]
async fn huge_page_numbers_return_an_empty_page() {
    let app = test::init_service(nilhub::app(state())).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;
    create_product(&app, &seller, "Remera", 1).await;

    let req = TestRequest::get()
        .uri(&format!(
            "/api/public/stores/{}?page=18446744073709551615&limit=100",
            seller.slug
        ))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["products"], json!([]));
    assert_eq!(body["pagination"]["total"], 1);
}

#[actix_web::test]
async fn provider_failures_are_hidden() {
    let state = AppState::in_memory_with_images(tokens(), false, Arc::new(MemoryImageHost::failing()));
    let app = test::init_service(nilhub::app(state)).await;
    let seller = register(&app, "ana@tienda.com", "Tienda Ana", None).await;

    let (content_type, body) = multipart(&[("images", "image/png", &b"png"[..])]);
    let req = authed(TestRequest::post(), &seller.token)
        .uri("/api/uploads/images")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error al subir la imagen. Intenta nuevamente");
    assert!(!body.to_string().contains("service unavailable"));
}

#[actix_web::test]
async fn detailed_mode_adds_diagnostics() {
    let app = test::init_service(nilhub::app(AppState::in_memory(tokens(), true))).await;
    let req = authed(TestRequest::get(), "a.b.c").uri("/api/auth/me").to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token inválido");
    assert_eq!(body["originalError"], "JsonWebTokenError");
    assert!(body["stack"].as_str().is_some());
}
