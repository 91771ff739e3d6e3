use actix::Actor;
use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use env_logger::Env;
use newsroom::app_config;
use newsroom::articles::{ArticleRepository, Limits};
use newsroom::middleware::ClientCtx;
use newsroom::settings::create_settings;
use newsroom::web::live::ChangeFeed;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_lib_mods();
    app_config::init();
    let config = app_config::get_config();

    let db = newsroom::db::connect(&config.database)
        .await
        .expect("Failed to connect to the database");
    if config.database.create_schema {
        newsroom::db::create_schema(&db)
            .await
            .expect("Failed to create the database schema");
    }

    // Load settings from database
    let settings = create_settings();
    settings
        .load_from_database(&db)
        .await
        .expect("Failed to load settings from database");

    let repo: Arc<dyn ArticleRepository> =
        newsroom::storage::open(&config.storage, Limits::from(&config.limits), &db)
            .expect("Failed to open the content store");

    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(key) if key.len() >= 64 => Key::from(key.as_bytes()),
        other => {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!("SECRET_KEY was invalid. Reason: {:?}\r\nThis means the key used for signing session cookies will invalidate every time the application is restarted. A secret key must be at least 64 bytes to be accepted.", other.map(|k| format!("only {} bytes", k.len())));
            Key::from(random_string.as_bytes())
        }
    };

    let feed = ChangeFeed::new().start();
    let secure_cookie = config.identity.secure_cookie;

    log::info!("{} listening on {}", config.site.name, config.server.bind);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(repo.clone()))
            .app_data(Data::new(settings.clone()))
            .app_data(Data::new(feed.clone()))
            // Security headers - applied to all responses
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .wrap(ClientCtx::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_same_site(SameSite::Lax)
                    .cookie_secure(secure_cookie)
                    .session_lifecycle(PersistentSession::default())
                    .build(),
            )
            .wrap(Logger::new("%a %r %s %Dms"))
            .configure(newsroom::web::configure)
    })
    .bind(config.server.bind.as_str())?
    .run()
    .await
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
