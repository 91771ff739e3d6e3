//! Default content for a fresh installation.
//!
//! Every step checks before it inserts, so seeding twice is harmless.

use crate::articles::view::{AdminFilter, NewArticle, NewCategory};
use crate::articles::ArticleRepository;
use crate::error::Result;
use crate::orm::articles::ArticleStatus;
use crate::orm::users::{self, Role};
use crate::slug::slugify;
use chrono::Utc;
use sea_orm::{entity::*, DatabaseConnection};

pub const ADMIN_ID: &str = "admin";

const CATEGORIES: [(&str, &str); 8] = [
    ("Politics", "Latest political news and updates"),
    ("Business", "Business and economic news"),
    ("Technology", "Latest tech updates and innovations"),
    ("Health", "Health and wellness articles"),
    ("Entertainment", "Entertainment and celebrity news"),
    ("Sports", "Sports news and match updates"),
    ("Science", "Scientific discoveries and research"),
    ("Environment", "Climate and environmental news"),
];

struct Sample {
    title: &'static str,
    excerpt: &'static str,
    content: &'static str,
    image: &'static str,
    category: &'static str,
    is_breaking: bool,
    tags: &'static [&'static str],
}

const SAMPLES: [Sample; 2] = [
    Sample {
        title: "Global Economy Faces Unprecedented Challenges Amid Shifting Geopolitical Landscape",
        excerpt: "World economic leaders gather to address growing concerns about inflation, supply chain issues, and trade tensions.",
        content: "<p>In a high-stakes summit that concluded yesterday, finance ministers from G20 nations acknowledged the complex challenges facing the global economy. The meeting took place against a backdrop of rising inflation and persistent supply chain disruptions.</p>\
<p>The summit concluded with a joint statement emphasizing commitment to open trade channels and support for vulnerable economies. Markets responded cautiously, with modest gains across major indices.</p>",
        image: "https://images.unsplash.com/photo-1506744038136-46273834b3fb?auto=format&fit=crop&w=1200&q=80",
        category: "Business",
        is_breaking: true,
        tags: &["World", "Finance", "Economy", "Markets"],
    },
    Sample {
        title: "Breakthrough in Quantum Computing Promises to Revolutionize Data Processing",
        excerpt: "Scientists achieve stable quantum entanglement at room temperature, potentially making quantum computers more practical for everyday use.",
        content: "<p>A team of researchers has announced a significant breakthrough in quantum computing: quantum coherence maintained at room temperature for over 10 milliseconds, a thousand-fold improvement over previous efforts.</p>\
<p>Potential applications include accelerated drug discovery, more efficient logistics optimization and better climate modeling.</p>",
        image: "https://images.unsplash.com/photo-1464983953574-0892a716854b?auto=format&fit=crop&w=1200&q=80",
        category: "Technology",
        is_breaking: false,
        tags: &["AI", "Innovation", "Space"],
    },
];

/// What a seeding run inserted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub admin_created: bool,
    pub categories_created: usize,
    pub articles_created: usize,
}

async fn ensure_admin(db: &DatabaseConnection) -> Result<(users::Model, bool)> {
    if let Some(admin) = users::Entity::find_by_id(ADMIN_ID.to_owned()).one(db).await? {
        return Ok((admin, false));
    }

    let now = Utc::now().naive_utc();
    let admin = users::ActiveModel {
        id: Set(ADMIN_ID.to_owned()),
        email: Set(Some("admin@example.com".to_owned())),
        first_name: Set(Some("Admin".to_owned())),
        last_name: Set(Some("User".to_owned())),
        profile_image_url: Set(Some(
            "https://ui-avatars.com/api/?name=Admin+User&background=1A237E&color=fff".to_owned(),
        )),
        username: Set(Some("admin".to_owned())),
        bio: Set(None),
        role: Set(Role::Admin),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok((admin, true))
}

pub async fn run(db: &DatabaseConnection, repo: &dyn ArticleRepository) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let (admin, created) = ensure_admin(db).await?;
    report.admin_created = created;
    repo.mirror_user(&admin).await?;

    for (name, description) in CATEGORIES {
        if repo.category_by_slug(&slugify(name)).await?.is_none() {
            repo.create_category(&NewCategory {
                name: name.to_owned(),
                description: Some(description.to_owned()),
            })
            .await?;
            report.categories_created += 1;
        }
    }

    for sample in &SAMPLES {
        let category = match repo.category_by_slug(&slugify(sample.category)).await? {
            Some(category) => category,
            None => continue,
        };

        let existing = repo
            .admin_articles(&AdminFilter {
                page: 1,
                search: Some(sample.title.to_owned()),
                category: Some(category.id),
            })
            .await?;
        if existing.articles.iter().any(|a| a.title == sample.title) {
            continue;
        }

        repo.create_article(
            &admin.id,
            &NewArticle {
                title: sample.title.to_owned(),
                excerpt: sample.excerpt.to_owned(),
                content: sample.content.to_owned(),
                image: sample.image.to_owned(),
                category_id: category.id,
                is_breaking: sample.is_breaking,
                status: ArticleStatus::Published,
                tags: sample.tags.iter().map(|t| t.to_string()).collect(),
            },
        )
        .await?;
        report.articles_created += 1;
    }

    log::info!(
        "Seeding finished: admin created {}, {} categories, {} articles",
        report.admin_created,
        report.categories_created,
        report.articles_created
    );
    Ok(report)
}
