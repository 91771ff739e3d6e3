use env_logger::Env;
use newsroom::app_config;
use newsroom::articles::Limits;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    app_config::init();
    let config = app_config::get_config();

    let db = newsroom::db::connect(&config.database).await?;
    newsroom::db::create_schema(&db).await?;
    let repo = newsroom::storage::open(&config.storage, Limits::from(&config.limits), &db)?;

    let report = newsroom::seed::run(&db, repo.as_ref()).await?;
    println!(
        "Seeded: admin {}, {} categories, {} articles",
        if report.admin_created { "created" } else { "kept" },
        report.categories_created,
        report.articles_created
    );
    Ok(())
}
