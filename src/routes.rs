use actix_web::{web, HttpResponse};
use bson::oid::ObjectId;
use chrono::Utc;
use tracing::info;

use crate::balance::compute_balances;
use crate::error::ApiError;
use crate::exchange::{pairwise_exchanges, simplify};
use crate::export::balances_to_csv;
use crate::repository::Repository;
use crate::schemas::{ExpenseRecord, Member, NewExpense, NewMember};
use crate::summary::summarize;

// Handlers are generic over the store, so they are registered by route
// rather than through the `#[get]`/`#[post]` attribute macros.
pub fn configure<R: Repository + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/members", web::get().to(list_members::<R>))
        .route("/members", web::post().to(add_member::<R>))
        .route("/members/{name}", web::delete().to(remove_member::<R>))
        .route("/expenses", web::get().to(list_expenses::<R>))
        .route("/expenses", web::post().to(add_expense::<R>))
        .route("/expenses/{id}", web::delete().to(remove_expense::<R>))
        .route("/balances", web::get().to(get_balances::<R>))
        .route("/balances.csv", web::get().to(export_balances::<R>))
        .route("/settlements", web::get().to(get_settlements::<R>))
        .route("/settlements/pairwise", web::get().to(get_pairwise::<R>))
        .route("/summary", web::get().to(get_summary::<R>));
}

async fn snapshot<R: Repository>(repo: &R) -> Result<(Vec<Member>, Vec<ExpenseRecord>), ApiError> {
    let members = repo.list_members().await?;
    let expenses = repo.list_expenses().await?;
    Ok((members, expenses))
}

async fn list_members<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(repo.list_members().await?))
}

async fn add_member<R: Repository>(
    repo: web::Data<R>,
    json: web::Json<NewMember>,
) -> Result<HttpResponse, ApiError> {
    let member = json.into_inner().validate()?;
    repo.add_member(member.clone()).await?;
    info!(member = %member.name, "member added");
    Ok(HttpResponse::Created().json(member))
}

async fn remove_member<R: Repository>(
    repo: web::Data<R>,
    name: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = name.into_inner();
    repo.remove_member(&name).await?;
    info!(member = %name, "member removed");
    Ok(HttpResponse::NoContent().finish())
}

async fn list_expenses<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(repo.list_expenses().await?))
}

async fn add_expense<R: Repository>(
    repo: web::Data<R>,
    expense: web::Json<NewExpense>,
) -> Result<HttpResponse, ApiError> {
    let record = expense
        .into_inner()
        .into_record(ObjectId::new().to_hex(), Utc::now())?;
    repo.add_expense(record.clone()).await?;
    info!(expense = %record.id, amount = record.amount, payer = %record.payer, "expense added");
    Ok(HttpResponse::Created().json(record))
}

async fn remove_expense<R: Repository>(
    repo: web::Data<R>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    repo.remove_expense(&id).await?;
    info!(expense = %id, "expense removed");
    Ok(HttpResponse::NoContent().finish())
}

async fn get_balances<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ApiError> {
    let (members, expenses) = snapshot(repo.get_ref()).await?;
    Ok(HttpResponse::Ok().json(compute_balances(&members, &expenses)?))
}

async fn export_balances<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ApiError> {
    let (members, expenses) = snapshot(repo.get_ref()).await?;
    let csv = balances_to_csv(&compute_balances(&members, &expenses)?)?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(("Content-Disposition", "attachment; filename=\"balances.csv\""))
        .body(csv))
}

async fn get_settlements<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ApiError> {
    let (members, expenses) = snapshot(repo.get_ref()).await?;
    let balance = compute_balances(&members, &expenses)?;
    Ok(HttpResponse::Ok().json(simplify(&balance)))
}

async fn get_pairwise<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ApiError> {
    let (members, expenses) = snapshot(repo.get_ref()).await?;
    Ok(HttpResponse::Ok().json(pairwise_exchanges(&members, &expenses)?))
}

async fn get_summary<R: Repository>(repo: web::Data<R>) -> Result<HttpResponse, ApiError> {
    let expenses = repo.list_expenses().await?;
    Ok(HttpResponse::Ok().json(summarize(&expenses)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(MemoryRepository::new()))
                    .configure(configure::<MemoryRepository>),
            )
            .await
        };
    }

    macro_rules! post {
        ($app:expr, $path:expr, $body:expr) => {
            test::call_service(
                &$app,
                test::TestRequest::post().uri($path).set_json($body).to_request(),
            )
            .await
        };
    }

    macro_rules! get_json {
        ($app:expr, $path:expr) => {{
            let req = test::TestRequest::get().uri($path).to_request();
            let body: Value = test::call_and_read_body_json(&$app, req).await;
            body
        }};
    }

    #[actix_web::test]
    async fn members_and_expenses_produce_settlements() {
        let app = app!();
        for name in ["Alice", "Bob", "Carol"] {
            let resp = post!(app, "/members", json!({ "name": name }));
            assert_eq!(resp.status(), StatusCode::CREATED);
        }
        let resp = post!(
            app,
            "/expenses",
            json!({ "name": "Groceries", "amount": 30.0, "category": "Food", "payer": "Alice",
                    "assignees": ["Alice", "Bob", "Carol"] })
        );
        assert_eq!(resp.status(), StatusCode::CREATED);

        let balances = get_json!(app, "/balances");
        assert_eq!(balances, json!({ "Alice": 20.0, "Bob": -10.0, "Carol": -10.0 }));

        let settlements = get_json!(app, "/settlements");
        assert_eq!(
            settlements,
            json!([
                { "from": "Bob", "to": "Alice", "amount": 10.0 },
                { "from": "Carol", "to": "Alice", "amount": 10.0 }
            ])
        );

        let pairwise = get_json!(app, "/settlements/pairwise");
        assert_eq!(pairwise.as_array().map(Vec::len), Some(2));

        let summary = get_json!(app, "/summary");
        assert_eq!(summary, json!({ "total": 30.0, "by_category": { "Food": 30.0 } }));
    }

    #[actix_web::test]
    async fn expense_without_assignees_is_split_among_everyone() {
        let app = app!();
        for name in ["Alice", "Bob", "Carol"] {
            post!(app, "/members", json!({ "name": name }));
        }
        let resp = post!(
            app,
            "/expenses",
            json!({ "name": "Eggs", "amount": 9.0, "payer": "Bob" })
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        let record: Value = test::read_body_json(resp).await;
        assert_eq!(record["category"], "Uncategorized");
        assert_eq!(record["assignees"], json!([]));

        let balances = get_json!(app, "/balances");
        assert_eq!(balances, json!({ "Alice": -3.0, "Bob": 6.0, "Carol": -3.0 }));
    }

    #[actix_web::test]
    async fn balances_export_as_csv() {
        let app = app!();
        for name in ["Alice", "Bob"] {
            post!(app, "/members", json!({ "name": name }));
        }
        post!(
            app,
            "/expenses",
            json!({ "name": "Rice", "amount": 20.0, "payer": "Alice", "assignees": ["Alice", "Bob"] })
        );

        let req = test::TestRequest::get().uri("/balances.csv").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/csv; charset=utf-8"
        );
        let body = test::read_body(resp).await;
        assert_eq!(body, "member,balance\nAlice,10.00\nBob,-10.00\n");
    }

    #[actix_web::test]
    async fn invalid_input_is_rejected() {
        let app = app!();
        let resp = post!(app, "/members", json!({ "name": "  " }));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        post!(app, "/members", json!({ "name": "Alice" }));
        let resp = post!(app, "/members", json!({ "name": "Alice" }));
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = post!(
            app,
            "/expenses",
            json!({ "name": "Milk", "amount": -1.0, "payer": "Alice" })
        );
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("positive"));
    }

    #[actix_web::test]
    async fn deleting_missing_entries_is_not_found() {
        let app = app!();
        for uri in ["/members/Nobody", "/expenses/000000000000000000000000"] {
            let req = test::TestRequest::delete().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[actix_web::test]
    async fn splitting_after_every_member_left_is_a_conflict() {
        let app = app!();
        post!(app, "/members", json!({ "name": "Alice" }));
        post!(
            app,
            "/expenses",
            json!({ "name": "Bread", "amount": 3.0, "payer": "Alice" })
        );
        let req = test::TestRequest::delete().uri("/members/Alice").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NO_CONTENT
        );

        let req = test::TestRequest::get().uri("/balances").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("invalid state"));
    }

    #[actix_web::test]
    async fn removed_expense_no_longer_counts() {
        let app = app!();
        for name in ["Alice", "Bob"] {
            post!(app, "/members", json!({ "name": name }));
        }
        let resp = post!(
            app,
            "/expenses",
            json!({ "name": "Cheese", "amount": 8.0, "payer": "Bob", "assignees": ["Alice"] })
        );
        let record: Value = test::read_body_json(resp).await;
        let id = record["id"].as_str().unwrap().to_string();
        assert_eq!(get_json!(app, "/expenses").as_array().map(Vec::len), Some(1));

        let req = test::TestRequest::delete()
            .uri(&format!("/expenses/{id}"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NO_CONTENT
        );
        assert_eq!(get_json!(app, "/settlements"), json!([]));
        assert_eq!(get_json!(app, "/balances"), json!({ "Alice": 0.0, "Bob": 0.0 }));
    }
}
