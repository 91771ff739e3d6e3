use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// URL-safe slug: lowercase ASCII alphanumerics joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "article".to_owned()
    } else {
        slug.to_owned()
    }
}

/// Candidate slugs for a base: `base`, `base-2`, `base-3`, ...
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_owned()).chain((2..).map(move |n| format!("{}-{}", base, n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Breaking: Markets Rally 5%!"), "breaking-markets-rally-5");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("Café au lait"), "caf-au-lait");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("!!!"), "article");
        assert_eq!(slugify(""), "article");
    }

    #[test]
    fn test_candidates() {
        let got: Vec<String> = candidates("news").take(3).collect();
        assert_eq!(got, vec!["news", "news-2", "news-3"]);
    }
}
