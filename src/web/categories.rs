use super::{PageQuery, Repo};
use crate::articles::view::CategoryPage;
use crate::error::{Error, Result};
use crate::middleware::ClientCtx;
use actix_web::{get, web, HttpResponse};

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(list_categories).service(category_articles);
}

#[get("/api/categories")]
pub async fn list_categories(repo: Repo) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(repo.categories().await?))
}

#[get("/api/categories/{slug}/articles")]
pub async fn category_articles(
    client: ClientCtx,
    repo: Repo,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let category = repo
        .category_by_slug(&path)
        .await?
        .ok_or_else(|| Error::not_found("Category not found"))?;

    let page = repo
        .by_category(category.id, query.page(), client.get_id())
        .await?;
    Ok(HttpResponse::Ok().json(CategoryPage { category, page }))
}
